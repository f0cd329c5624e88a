use super::{KeyTtl, MemoryTtlStore};
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

const TOKEN_BYTES: usize = 32;

pub struct MemoryEmailVerificationLedger {
    store: Arc<MemoryTtlStore>,
    keys: KeySpace,
    policy: VerificationPolicy,
}

impl MemoryEmailVerificationLedger {
    pub fn new(store: Arc<MemoryTtlStore>, policy: VerificationPolicy) -> Self {
        MemoryEmailVerificationLedger {
            store,
            keys: KeySpace::default(),
            policy,
        }
    }
}

#[async_trait::async_trait]
impl EmailVerificationLedger for MemoryEmailVerificationLedger {
    fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    async fn generate_token(&self, user: UserId) -> Result<String, VerificationError> {
        if !self.policy.enabled {
            return Err(VerificationError::Disabled);
        }
        let token = random_token_hex(TOKEN_BYTES);
        let digest = digest_hex(&token);
        self.store.set_ex(
            &self.keys.verification(&digest),
            &user.to_string(),
            self.policy.token_ttl,
        );
        self.store.sadd_extending(
            &self.keys.user_verifications(user),
            &digest,
            self.policy.token_ttl,
        );
        Ok(token)
    }

    async fn validate_token(&self, token: &str) -> Result<UserId, VerificationError> {
        if !self.policy.enabled {
            return Err(VerificationError::Disabled);
        }
        let raw = self
            .store
            .get_str(&self.keys.verification(&digest_hex(token)))
            .ok_or(VerificationError::InvalidOrExpired)?;
        raw.parse::<UserId>()
            .map_err(|e| StoreError::Corrupt(e.to_string()).into())
    }

    async fn invalidate_token(&self, token: &str) -> Result<(), VerificationError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let digest = digest_hex(token);
        let key = self.keys.verification(&digest);
        if let Some(user) = self.store.get_str(&key).and_then(|s| s.parse::<UserId>().ok()) {
            self.store
                .srem(&self.keys.user_verifications(user), &digest);
        }
        self.store.del(&key);
        Ok(())
    }

    async fn invalidate_all_user_tokens(&self, user: UserId) -> Result<(), VerificationError> {
        if !self.policy.enabled {
            return Ok(());
        }
        for digest in self.store.take_set(&self.keys.user_verifications(user)) {
            self.store.del(&self.keys.verification(&digest));
        }
        Ok(())
    }

    async fn can_resend(&self, user: UserId) -> Result<ResendStatus, VerificationError> {
        if !self.policy.enabled {
            return Ok(ResendStatus::Ready);
        }
        match self.store.ttl(&self.keys.resend_cooldown(user)) {
            KeyTtl::Remaining(d) => Ok(ResendStatus::CoolingDown {
                remaining_secs: ttl_secs(d),
            }),
            KeyTtl::NoExpiry | KeyTtl::Missing => Ok(ResendStatus::Ready),
        }
    }

    async fn set_resend_cooldown(&self, user: UserId) -> Result<(), VerificationError> {
        if self.policy.enabled {
            self.store.set_ex(
                &self.keys.resend_cooldown(user),
                "1",
                self.policy.resend_cooldown,
            );
        }
        Ok(())
    }
}
