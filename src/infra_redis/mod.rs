mod email_verification_ledger_redis;
mod login_attempt_guard_redis;
mod revocation_ledger_redis;

pub use email_verification_ledger_redis::*;
pub use login_attempt_guard_redis::*;
pub use revocation_ledger_redis::*;

use crate::domain_model::*;
use crate::domain_port::*;
use redis::{FromRedisValue, RedisError, RedisResult, RedisWrite, ToRedisArgs, Value};
use std::future::Future;
use std::time::Duration;

/// Run one store round trip under `deadline`.
pub(crate) async fn bounded<T>(
    deadline: Duration,
    fut: impl Future<Output = RedisResult<T>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}

/// Redis `TTL` reply to whole remaining seconds; -1 and -2 map to 0.
pub(crate) fn remaining_secs(ttl: i64) -> u64 {
    u64::try_from(ttl).unwrap_or(0)
}

impl ToRedisArgs for UserId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

impl FromRedisValue for UserId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        let user_id = s.parse::<UserId>().map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid UserId string",
                e.to_string(),
            ))
        })?;
        Ok(user_id)
    }
}

impl ToRedisArgs for Jti {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.as_str().as_bytes())
    }
}
