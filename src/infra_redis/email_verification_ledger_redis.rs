use super::{bounded, remaining_secs};
use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

const TOKEN_BYTES: usize = 32;

pub struct RedisEmailVerificationLedger {
    conn: ConnectionManager,
    keys: KeySpace,
    policy: VerificationPolicy,
    op_timeout: Duration,
}

impl RedisEmailVerificationLedger {
    pub fn new(
        conn: ConnectionManager,
        keys: KeySpace,
        policy: VerificationPolicy,
        op_timeout: Duration,
    ) -> Self {
        RedisEmailVerificationLedger {
            conn,
            keys,
            policy,
            op_timeout,
        }
    }

    fn parse_user(raw: &str) -> Result<UserId, VerificationError> {
        raw.parse::<UserId>()
            .map_err(|e| StoreError::Corrupt(format!("verification owner: {e}")).into())
    }
}

#[async_trait::async_trait]
impl EmailVerificationLedger for RedisEmailVerificationLedger {
    fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    async fn generate_token(&self, user: UserId) -> Result<String, VerificationError> {
        if !self.policy.enabled {
            return Err(VerificationError::Disabled);
        }
        let token = random_token_hex(TOKEN_BYTES);
        let digest = digest_hex(&token);
        let ttl = ttl_secs(self.policy.token_ttl);
        let index = self.keys.user_verifications(user);

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(self.keys.verification(&digest), user, ttl)
            .ignore()
            .sadd(&index, &digest)
            .ignore()
            .expire(&index, ttl as i64)
            .ignore();
        let _: () = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;
        Ok(token)
    }

    async fn validate_token(&self, token: &str) -> Result<UserId, VerificationError> {
        if !self.policy.enabled {
            return Err(VerificationError::Disabled);
        }
        let mut conn = self.conn.clone();
        let raw: Option<String> = bounded(
            self.op_timeout,
            conn.get(self.keys.verification(&digest_hex(token))),
        )
        .await?;
        let raw = raw.ok_or(VerificationError::InvalidOrExpired)?;
        Self::parse_user(&raw)
    }

    async fn invalidate_token(&self, token: &str) -> Result<(), VerificationError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let digest = digest_hex(token);
        let key = self.keys.verification(&digest);
        let mut conn = self.conn.clone();
        let owner: Option<String> = bounded(self.op_timeout, conn.get(&key)).await?;

        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if let Some(user) = owner.as_deref().map(Self::parse_user).transpose()? {
            pipe.srem(self.keys.user_verifications(user), &digest).ignore();
        }
        let _: () = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn invalidate_all_user_tokens(&self, user: UserId) -> Result<(), VerificationError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let index = self.keys.user_verifications(user);
        let mut conn = self.conn.clone();
        let digests: Vec<String> = bounded(self.op_timeout, conn.smembers(&index)).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for digest in &digests {
            pipe.del(self.keys.verification(digest)).ignore();
        }
        pipe.del(&index).ignore();
        let _: () = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn can_resend(&self, user: UserId) -> Result<ResendStatus, VerificationError> {
        if !self.policy.enabled {
            return Ok(ResendStatus::Ready);
        }
        let mut conn = self.conn.clone();
        let ttl: i64 =
            bounded(self.op_timeout, conn.ttl(self.keys.resend_cooldown(user))).await?;
        match remaining_secs(ttl) {
            0 => Ok(ResendStatus::Ready),
            secs => Ok(ResendStatus::CoolingDown {
                remaining_secs: secs,
            }),
        }
    }

    async fn set_resend_cooldown(&self, user: UserId) -> Result<(), VerificationError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = bounded(
            self.op_timeout,
            conn.set_ex(
                self.keys.resend_cooldown(user),
                1,
                ttl_secs(self.policy.resend_cooldown),
            ),
        )
        .await?;
        Ok(())
    }
}
