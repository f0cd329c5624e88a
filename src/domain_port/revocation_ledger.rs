use super::StoreError;
use crate::domain_model::*;
use std::time::Duration;

/// Blacklisted JTIs plus the per-user set of live JTIs.
#[async_trait::async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Blacklist a JTI for `ttl` (clamped to at least one second).
    async fn blacklist(&self, jti: &Jti, ttl: Duration) -> Result<(), StoreError>;

    /// Errors must propagate: callers deny access when the lookup fails.
    async fn is_blacklisted(&self, jti: &Jti) -> Result<bool, StoreError>;

    /// Add a JTI to the user's live set. The set TTL only ever grows.
    async fn track_user_token(
        &self,
        user: UserId,
        jti: &Jti,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn untrack_user_token(&self, user: UserId, jti: &Jti) -> Result<(), StoreError>;

    /// Blacklist and untrack in one atomic step. Returns `false` when the JTI
    /// was already blacklisted, i.e. another caller won the race.
    async fn revoke(&self, user: UserId, jti: &Jti, ttl: Duration) -> Result<bool, StoreError>;

    /// Blacklist every tracked JTI and drop the set. Returns how many were revoked.
    async fn revoke_all_user_tokens(&self, user: UserId) -> Result<usize, StoreError>;

    /// Tracked JTIs that are not blacklisted.
    async fn active_tokens(&self, user: UserId) -> Result<Vec<Jti>, StoreError>;

    async fn active_token_count(&self, user: UserId) -> Result<usize, StoreError> {
        Ok(self.active_tokens(user).await?.len())
    }
}
