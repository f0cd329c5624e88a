use super::{bounded, remaining_secs};
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

pub struct RedisLoginAttemptGuard {
    conn: ConnectionManager,
    keys: KeySpace,
    policy: LockoutPolicy,
    op_timeout: Duration,
}

impl RedisLoginAttemptGuard {
    pub fn new(
        conn: ConnectionManager,
        keys: KeySpace,
        policy: LockoutPolicy,
        op_timeout: Duration,
    ) -> Self {
        RedisLoginAttemptGuard {
            conn,
            keys,
            policy,
            op_timeout,
        }
    }
}

#[async_trait::async_trait]
impl LoginAttemptGuard for RedisLoginAttemptGuard {
    async fn increment_attempts(&self, username: &str) -> Result<u32, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        let key = self.keys.login_attempts(username);
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .incr(&key, 1)
            .expire(&key, ttl_secs(self.policy.attempt_window) as i64)
            .ignore();
        let (n,): (i64,) = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;

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
        let mut conn = self.conn.clone();
        let n: Option<u32> =
            bounded(self.op_timeout, conn.get(self.keys.login_attempts(username))).await?;
        Ok(n.unwrap_or(0))
    }

    async fn is_locked(&self, username: &str) -> Result<bool, StoreError> {
        if !self.policy.enabled {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        bounded(self.op_timeout, conn.exists(self.keys.account_lock(username))).await
    }

    async fn remaining_lock_time(&self, username: &str) -> Result<u64, StoreError> {
        if !self.policy.enabled {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let ttl: i64 =
            bounded(self.op_timeout, conn.ttl(self.keys.account_lock(username))).await?;
        Ok(remaining_secs(ttl))
    }

    async fn lock(&self, username: &str) -> Result<(), StoreError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = bounded(
            self.op_timeout,
            conn.set_ex(
                self.keys.account_lock(username),
                1,
                ttl_secs(self.policy.lockout_duration),
            ),
        )
        .await?;
        info!(
            lockout_secs = self.policy.lockout_duration.as_secs(),
            "account locked"
        );
        Ok(())
    }

    async fn reset_attempts(&self, username: &str) -> Result<(), StoreError> {
        if !self.policy.enabled {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.keys.login_attempts(username))
            .ignore()
            .del(self.keys.account_lock(username))
            .ignore();
        let _: () = bounded(self.op_timeout, pipe.query_async(&mut conn)).await?;
        Ok(())
    }
}
