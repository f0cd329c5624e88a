use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, wrong issuer or audience, malformed, or expired.
    #[error("token invalid")]
    Invalid,
    #[error("token malformed")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Signs and checks bearer tokens. Pure: no I/O.
pub trait TokenCodec: Send + Sync {
    fn issue_access(
        &self,
        subject: UserId,
        role: Role,
        extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError>;

    fn issue_refresh(&self, subject: UserId) -> Result<IssuedToken, TokenError>;

    fn validate(&self, token: &str) -> Result<Claims, TokenError>;

    /// Verify the signature but skip the expiry check. Only for recovering
    /// the JTI of a token that is about to be revoked.
    fn parse_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError>;

    fn access_ttl(&self) -> Duration;

    fn refresh_ttl(&self) -> Duration;
}
