use super::StoreError;

/// Per-username failure counter with lockout.
///
/// A username moves from clean, through accumulating failures, to locked once
/// the counter reaches the policy maximum. The lock expires on its own; a
/// successful login resets both counter and lock.
#[async_trait::async_trait]
pub trait LoginAttemptGuard: Send + Sync {
    /// Count a failure and return the new total. Locks the account when the
    /// total reaches the configured maximum.
    async fn increment_attempts(&self, username: &str) -> Result<u32, StoreError>;

    async fn attempts(&self, username: &str) -> Result<u32, StoreError>;

    async fn is_locked(&self, username: &str) -> Result<bool, StoreError>;

    /// Seconds until the lock lifts, 0 when not locked.
    async fn remaining_lock_time(&self, username: &str) -> Result<u64, StoreError>;

    async fn lock(&self, username: &str) -> Result<(), StoreError>;

    async fn reset_attempts(&self, username: &str) -> Result<(), StoreError>;
}
