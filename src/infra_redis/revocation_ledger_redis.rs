use super::bounded;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

const REVOKE_ALL: &str = include_str!("revoke_all.lua");

pub struct RedisRevocationLedger {
    conn: ConnectionManager,
    keys: KeySpace,
    policy: RevocationPolicy,
    op_timeout: Duration,
    revoke_all: Script,
}

impl RedisRevocationLedger {
    pub fn new(
        conn: ConnectionManager,
        keys: KeySpace,
        policy: RevocationPolicy,
        op_timeout: Duration,
    ) -> Self {
        RedisRevocationLedger {
            conn,
            keys,
            policy,
            op_timeout,
            revoke_all: Script::new(REVOKE_ALL),
        }
    }
}

#[async_trait::async_trait]
impl RevocationLedger for RedisRevocationLedger {
    async fn blacklist(&self, jti: &Jti, ttl: Duration) -> Result<(), StoreError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = bounded(
            self.op_timeout,
            conn.set_ex(self.keys.blacklist(jti), 1, ttl_secs(ttl)),
        )
        .await?;
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &Jti) -> Result<bool, StoreError> {
        if !self.policy.enabled {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        bounded(self.op_timeout, conn.exists(self.keys.blacklist(jti))).await
    }

    async fn track_user_token(
        &self,
        user: UserId,
        jti: &Jti,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let key = self.keys.user_tokens(user);
        let secs = ttl_secs(ttl);
        let mut conn = self.conn.clone();

        // -2 missing, -1 no expiry; either way the set needs a deadline.
        let current: i64 = bounded(self.op_timeout, conn.ttl(&key)).await?;

        let mut pipe = redis::pipe();
        pipe.atomic().sadd(&key, jti).ignore();
        if current < 0 || (current as u64) < secs {
            pipe.expire(&key, secs as i64).ignore();
        }
        let _: () = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn untrack_user_token(&self, user: UserId, jti: &Jti) -> Result<(), StoreError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = bounded(
            self.op_timeout,
            conn.srem(self.keys.user_tokens(user), jti),
        )
        .await?;
        Ok(())
    }

    async fn revoke(&self, user: UserId, jti: &Jti, ttl: Duration) -> Result<bool, StoreError> {
        if !self.policy.enabled {
            return Ok(true);
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(self.keys.blacklist(jti))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .srem(self.keys.user_tokens(user), jti)
            .ignore();
        // SET NX replies nil when the JTI was already blacklisted.
        let (set,): (redis::Value,) =
            bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;
        Ok(!matches!(set, redis::Value::Nil))
    }

    async fn revoke_all_user_tokens(&self, user: UserId) -> Result<usize, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let mut invocation = self.revoke_all.prepare_invoke();
        invocation
            .key(self.keys.user_tokens(user))
            .arg(self.keys.blacklist_prefix())
            .arg(ttl_secs(self.policy.revoke_all_ttl));
        let revoked: usize =
            bounded(self.op_timeout, invocation.invoke_async(&mut conn)).await?;
        debug!(%user, revoked, "revoke-all script ran");
        Ok(revoked)
    }

    async fn active_tokens(&self, user: UserId) -> Result<Vec<Jti>, StoreError> {
        if !self.policy.enabled {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let members: Vec<String> =
            bounded(self.op_timeout, conn.smembers(self.keys.user_tokens(user))).await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let jtis: Vec<Jti> = members.into_iter().map(Jti).collect();
        let mut pipe = redis::pipe();
        for jti in &jtis {
            pipe.exists(self.keys.blacklist(jti));
        }
        let revoked: Vec<bool> = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;

        Ok(jtis
            .into_iter()
            .zip(revoked)
            .filter_map(|(jti, revoked)| (!revoked).then_some(jti))
            .collect())
    }
}
