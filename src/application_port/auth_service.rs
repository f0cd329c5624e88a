use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user is inactive")]
    UserInactive,
    #[error("account locked for {remaining_secs}s")]
    AccountLocked { remaining_secs: u64 },
    #[error("token invalid")]
    InvalidToken,
    #[error("verification token invalid or expired")]
    InvalidOrExpiredVerificationToken,
    #[error("email already verified")]
    AlreadyVerified,
    #[error("resend available in {remaining_secs}s")]
    ResendCooldown { remaining_secs: u64 },
    #[error("{field} already taken")]
    Conflict { field: &'static str },
    #[error("user not found")]
    UserNotFound,
    #[error("insufficient role")]
    Forbidden,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email verification unavailable")]
    VerificationUnavailable,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::StoreUnavailable(e.to_string())
    }
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Duplicate(field) => AuthError::Conflict { field },
            RepoError::NotFound(_) => AuthError::UserNotFound,
            RepoError::Unavailable(msg) => AuthError::StoreUnavailable(msg),
            RepoError::Corrupt(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid | TokenError::Malformed => AuthError::InvalidToken,
            TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<VerificationError> for AuthError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::InvalidOrExpired => AuthError::InvalidOrExpiredVerificationToken,
            VerificationError::Disabled => AuthError::VerificationUnavailable,
            VerificationError::Store(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RefreshInput {
    pub refresh_token: String,
    /// The access token being replaced, possibly already expired.
    pub access_token: Option<String>,
}

/// What callers may see of a principal. Never carries the password digest.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalView {
    fn from(p: &Principal) -> Self {
        PrincipalView {
            id: p.id,
            username: p.username.clone(),
            email: p.email.clone(),
            role: p.role,
            is_active: p.is_active,
            is_email_verified: p.is_email_verified,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResult {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub principal: PrincipalView,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<AuthResult, AuthError>;
    async fn login(&self, input: LoginInput) -> Result<AuthResult, AuthError>;
    /// Rotate a refresh token. The presented refresh token, and the old access
    /// token when supplied, are revoked before the new pair is issued.
    async fn refresh(&self, input: RefreshInput) -> Result<AuthResult, AuthError>;
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;
    async fn logout_all_devices(&self, user: UserId) -> Result<usize, AuthError>;
    async fn active_session_count(&self, user: UserId) -> Result<usize, AuthError>;
    async fn profile(&self, user: UserId) -> Result<PrincipalView, AuthError>;
    async fn verify_email(&self, token: &str) -> Result<(), AuthError>;
    async fn resend_verification_email(&self, user: UserId) -> Result<(), AuthError>;

    /// Admit a request: the token must be a valid, unrevoked access token.
    async fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError>;

    fn authorize(&self, claims: &Claims, min_role: Role) -> Result<(), AuthError> {
        match claims.role {
            Some(role) if role.at_least(min_role) => Ok(()),
            _ => Err(AuthError::Forbidden),
        }
    }
}
