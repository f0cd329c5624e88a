use super::{Role, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unique token identifier, carried in the `jti` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jti(pub String);

impl Jti {
    pub fn generate() -> Self {
        Jti(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

pub type ExtraClaims = serde_json::Map<String, serde_json::Value>;

/// Signed token payload. Refresh tokens carry no role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub jti: Jti,
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    #[serde(flatten)]
    pub extra: ExtraClaims,
}

impl Claims {
    /// Lifetime left before `exp`; zero once the token has expired.
    pub fn remaining(&self) -> Duration {
        let secs = self.exp - Utc::now().timestamp();
        if secs <= 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(secs as u64)
        }
    }
}

/// A freshly minted token together with the metadata needed to track it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Jti,
    pub ttl: Duration,
}
