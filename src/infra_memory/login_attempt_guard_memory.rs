use super::{KeyTtl, MemoryTtlStore};
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

pub struct MemoryLoginAttemptGuard {
    store: Arc<MemoryTtlStore>,
    keys: KeySpace,
    policy: LockoutPolicy,
}

impl MemoryLoginAttemptGuard {
    pub fn new(store: Arc<MemoryTtlStore>, policy: LockoutPolicy) -> Self {
        MemoryLoginAttemptGuard {
            store,
            keys: KeySpace::default(),
            policy,
        }
    }
}

#[async_trait::async_trait]
impl LoginAttemptGuard for MemoryLoginAttemptGuard {
    async fn increment_attempts(&self, username: &str) -> Result<u32, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        let key = self.keys.login_attempts(username);
        let n = self.store.incr(&key);
        self.store.expire(&key, self.policy.attempt_window);

        let n = u32::try_from(n).unwrap_or(u32::MAX);
        if n >= self.policy.max_attempts {
            self.lock(username).await?;
        }
        Ok(n)
    }

    async fn attempts(&self, username: &str) -> Result<u32, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        let n = self
            .store
            .get_int(&self.keys.login_attempts(username))
            .unwrap_or(0);
        Ok(u32::try_from(n).unwrap_or(0))
    }

    async fn is_locked(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.policy.enabled && self.store.exists(&self.keys.account_lock(username)))
    }

    async fn remaining_lock_time(&self, username: &str) -> Result<u64, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        match self.store.ttl(&self.keys.account_lock(username)) {
            KeyTtl::Remaining(d) => Ok(ttl_secs(d)),
            KeyTtl::NoExpiry | KeyTtl::Missing => Ok(0),
        }
    }

    async fn lock(&self, username: &str) -> Result<(), StoreError> {
        if self.policy.enabled {
            self.store.set_ex(
                &self.keys.account_lock(username),
                "1",
                self.policy.lockout_duration,
            );
            info!(
                lockout_secs = self.policy.lockout_duration.as_secs(),
                "account locked"
            );
        }
        Ok(())
    }

    async fn reset_attempts(&self, username: &str) -> Result<(), StoreError> {
        if self.policy.enabled {
            self.store.del(&self.keys.login_attempts(username));
            self.store.del(&self.keys.account_lock(username));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn guard(max_attempts: u32) -> MemoryLoginAttemptGuard {
        MemoryLoginAttemptGuard::new(
            Arc::new(MemoryTtlStore::new()),
            LockoutPolicy {
                max_attempts,
                ..LockoutPolicy::default()
            },
        )
    }

    #[tokio::test]
    async fn locks_on_the_max_attempt() {
        let guard = guard(3);
        assert_eq!(guard.increment_attempts("alice").await.unwrap(), 1);
        assert_eq!(guard.increment_attempts("alice").await.unwrap(), 2);
        assert!(!guard.is_locked("alice").await.unwrap());

        assert_eq!(guard.increment_attempts("alice").await.unwrap(), 3);
        assert!(guard.is_locked("alice").await.unwrap());
        assert_eq!(guard.remaining_lock_time("alice").await.unwrap(), 15 * 60);
    }

    #[tokio::test]
    async fn counters_are_case_insensitive() {
        let guard = guard(5);
        guard.increment_attempts("Alice").await.unwrap();
        guard.increment_attempts("alice").await.unwrap();
        assert_eq!(guard.attempts("ALICE").await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_lifts_after_the_lockout_duration() {
        let guard = guard(1);
        guard.increment_attempts("bob").await.unwrap();
        assert!(guard.is_locked("bob").await.unwrap());

        tokio::time::advance(Duration::from_secs(15 * 60 - 1)).await;
        assert_eq!(guard.remaining_lock_time("bob").await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!guard.is_locked("bob").await.unwrap());
        assert_eq!(guard.remaining_lock_time("bob").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_expires_after_the_window() {
        let guard = guard(5);
        guard.increment_attempts("carol").await.unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;
        assert_eq!(guard.attempts("carol").await.unwrap(), 0);
        assert_eq!(guard.increment_attempts("carol").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_clears_counter_and_lock() {
        let guard = guard(2);
        guard.increment_attempts("dave").await.unwrap();
        guard.increment_attempts("dave").await.unwrap();
        assert!(guard.is_locked("dave").await.unwrap());

        guard.reset_attempts("dave").await.unwrap();
        assert!(!guard.is_locked("dave").await.unwrap());
        assert_eq!(guard.attempts("dave").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn disabled_guard_never_counts_or_locks() {
        let guard = MemoryLoginAttemptGuard::new(
            Arc::new(MemoryTtlStore::new()),
            LockoutPolicy {
                enabled: false,
                max_attempts: 1,
                ..LockoutPolicy::default()
            },
        );
        assert_eq!(guard.increment_attempts("erin").await.unwrap(), 0);
        guard.lock("erin").await.unwrap();
        assert!(!guard.is_locked("erin").await.unwrap());
        assert_eq!(guard.remaining_lock_time("erin").await.unwrap(), 0);
    }
}
