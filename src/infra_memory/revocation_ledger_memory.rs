use super::MemoryTtlStore;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;

pub struct MemoryRevocationLedger {
    store: Arc<MemoryTtlStore>,
    keys: KeySpace,
    policy: RevocationPolicy,
}

impl MemoryRevocationLedger {
    pub fn new(store: Arc<MemoryTtlStore>, policy: RevocationPolicy) -> Self {
        MemoryRevocationLedger {
            store,
            keys: KeySpace::default(),
            policy,
        }
    }

    fn clamp(ttl: Duration) -> Duration {
        Duration::from_secs(ttl_secs(ttl))
    }
}

#[async_trait::async_trait]
impl RevocationLedger for MemoryRevocationLedger {
    async fn blacklist(&self, jti: &Jti, ttl: Duration) -> Result<(), StoreError> {
        if self.policy.enabled {
            self.store
                .set_ex(&self.keys.blacklist(jti), "1", Self::clamp(ttl));
        }
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &Jti) -> Result<bool, StoreError> {
        Ok(self.policy.enabled && self.store.exists(&self.keys.blacklist(jti)))
    }

    async fn track_user_token(
        &self,
        user: UserId,
        jti: &Jti,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if self.policy.enabled {
            self.store.sadd_extending(
                &self.keys.user_tokens(user),
                jti.as_str(),
                Self::clamp(ttl),
            );
        }
        Ok(())
    }

    async fn untrack_user_token(&self, user: UserId, jti: &Jti) -> Result<(), StoreError> {
        if self.policy.enabled {
            self.store.srem(&self.keys.user_tokens(user), jti.as_str());
        }
        Ok(())
    }

    async fn revoke(&self, user: UserId, jti: &Jti, ttl: Duration) -> Result<bool, StoreError> {
        if !self.policy.enabled {
            return Ok(true);
        }
        let fresh = self
            .store
            .set_nx_ex(&self.keys.blacklist(jti), "1", Self::clamp(ttl));
        self.store.srem(&self.keys.user_tokens(user), jti.as_str());
        Ok(fresh)
    }

    async fn revoke_all_user_tokens(&self, user: UserId) -> Result<usize, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        let members = self.store.take_set(&self.keys.user_tokens(user));
        let ttl = Self::clamp(self.policy.revoke_all_ttl);
        for jti in &members {
            self.store
                .set_ex(&self.keys.blacklist(&Jti(jti.clone())), "1", ttl);
        }
        Ok(members.len())
    }

    async fn active_tokens(&self, user: UserId) -> Result<Vec<Jti>, StoreError> {
        if !self.policy.enabled {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .smembers(&self.keys.user_tokens(user))
            .into_iter()
            .map(Jti)
            .filter(|jti| !self.store.exists(&self.keys.blacklist(jti)))
            .collect())
    }
}
