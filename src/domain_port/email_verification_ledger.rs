use super::StoreError;
use crate::domain_model::*;

#[derive(Debug, Clone, thiserror::Error)]
pub enum VerificationError {
    #[error("verification token is invalid or expired")]
    InvalidOrExpired,
    #[error("email verification is disabled")]
    Disabled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendStatus {
    Ready,
    CoolingDown { remaining_secs: u64 },
}

/// Single-use email verification tokens and the resend cooldown.
///
/// Tokens are only ever stored by digest.
#[async_trait::async_trait]
pub trait EmailVerificationLedger: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn generate_token(&self, user: UserId) -> Result<String, VerificationError>;

    async fn validate_token(&self, token: &str) -> Result<UserId, VerificationError>;

    async fn invalidate_token(&self, token: &str) -> Result<(), VerificationError>;

    async fn invalidate_all_user_tokens(&self, user: UserId) -> Result<(), VerificationError>;

    async fn can_resend(&self, user: UserId) -> Result<ResendStatus, VerificationError>;

    async fn set_resend_cooldown(&self, user: UserId) -> Result<(), VerificationError>;
}
