use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;
use tokio::sync::OnceCell;

const USERNAME_LEN: (usize, usize) = (3, 50);
const PASSWORD_LEN: (usize, usize) = (6, 100);
const DECOY_PASSWORD: &str = "tokenward-decoy-password";

pub struct RealAuthService {
    principal_repo: Arc<dyn PrincipalRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    revocation_ledger: Arc<dyn RevocationLedger>,
    login_guard: Arc<dyn LoginAttemptGuard>,
    verification_ledger: Arc<dyn EmailVerificationLedger>,
    email_dispatcher: Arc<dyn EmailDispatcher>,
    decoy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        principal_repo: Arc<dyn PrincipalRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        revocation_ledger: Arc<dyn RevocationLedger>,
        login_guard: Arc<dyn LoginAttemptGuard>,
        verification_ledger: Arc<dyn EmailVerificationLedger>,
        email_dispatcher: Arc<dyn EmailDispatcher>,
    ) -> Self {
        Self {
            principal_repo,
            credential_hasher,
            token_codec,
            revocation_ledger,
            login_guard,
            verification_ledger,
            email_dispatcher,
            decoy_hash: OnceCell::new(),
        }
    }

    fn validate_registration(input: &RegisterInput) -> Result<(), AuthError> {
        let username_len = input.username.chars().count();
        if username_len < USERNAME_LEN.0 || username_len > USERNAME_LEN.1 {
            return Err(AuthError::Validation(format!(
                "username must be {}-{} characters",
                USERNAME_LEN.0, USERNAME_LEN.1
            )));
        }
        if !is_email_shaped(&input.email) {
            return Err(AuthError::Validation("email is not valid".to_string()));
        }
        let password_len = input.password.chars().count();
        if password_len < PASSWORD_LEN.0 || password_len > PASSWORD_LEN.1 {
            return Err(AuthError::Validation(format!(
                "password must be {}-{} characters",
                PASSWORD_LEN.0, PASSWORD_LEN.1
            )));
        }
        Ok(())
    }

    /// Unknown and inactive usernames pay for one password verification, the
    /// same as a wrong password against a real digest.
    async fn verify_against_decoy(&self, password: &str) {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DECOY_PASSWORD))
            .await;
        match decoy {
            Ok(digest) => {
                if let Err(e) = self.credential_hasher.verify_password(password, digest).await {
                    warn!("verifying against decoy digest: {}", e);
                }
            }
            Err(e) => warn!("preparing decoy digest: {}", e),
        }
    }

    async fn record_failed_attempt(&self, username: &str) {
        match self.login_guard.increment_attempts(username).await {
            Ok(n) => debug!(attempts = n, "failed login recorded"),
            Err(e) => warn!("recording failed login: {}", e),
        }
    }

    async fn track(&self, user: UserId, issued: &IssuedToken) {
        if let Err(e) = self
            .revocation_ledger
            .track_user_token(user, &issued.jti, issued.ttl)
            .await
        {
            warn!(%user, jti = %issued.jti, "tracking issued token: {}", e);
        }
    }

    /// Mint and track a fresh access/refresh pair.
    async fn issue_pair(&self, principal: &Principal) -> Result<AuthResult, AuthError> {
        let access = self
            .token_codec
            .issue_access(principal.id, principal.role, ExtraClaims::new())?;
        let refresh = self.token_codec.issue_refresh(principal.id)?;

        self.track(principal.id, &access).await;
        self.track(principal.id, &refresh).await;

        Ok(AuthResult {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
            expires_in: self.token_codec.access_ttl().as_secs(),
            principal: PrincipalView::from(principal),
        })
    }

    async fn send_verification(&self, principal: &Principal) {
        match self.verification_ledger.generate_token(principal.id).await {
            Ok(token) => {
                if let Err(e) = self
                    .email_dispatcher
                    .send_verification(&principal.email, &token)
                    .await
                {
                    warn!(user = %principal.id, "sending verification email: {}", e);
                }
            }
            Err(e) => warn!(user = %principal.id, "generating verification token: {}", e),
        }
    }
}

fn is_email_shaped(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, input: RegisterInput) -> Result<AuthResult, AuthError> {
        Self::validate_registration(&input)?;
        let RegisterInput {
            username,
            email,
            password,
        } = input;

        if self.principal_repo.exists_by_username(&username).await? {
            return Err(AuthError::Conflict { field: "username" });
        }
        if self.principal_repo.exists_by_email(&email).await? {
            return Err(AuthError::Conflict { field: "email" });
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let principal = Principal::new(
            UserId::new_v4(),
            username,
            email,
            password_hash,
            Role::Customer,
        );
        self.principal_repo.create(&principal).await?;
        info!(user = %principal.id, "principal registered");

        if self.verification_ledger.is_enabled() {
            self.send_verification(&principal).await;
        }

        self.issue_pair(&principal).await
    }

    async fn login(&self, input: LoginInput) -> Result<AuthResult, AuthError> {
        let LoginInput { username, password } = input;

        if self.login_guard.is_locked(&username).await? {
            let remaining = self.login_guard.remaining_lock_time(&username).await?;
            debug!(remaining_secs = remaining, "login refused, account locked");
            return Err(AuthError::AccountLocked {
                remaining_secs: remaining.max(1),
            });
        }

        let Some(principal) = self.principal_repo.find_by_username(&username).await? else {
            self.verify_against_decoy(&password).await;
            self.record_failed_attempt(&username).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !principal.is_active {
            self.verify_against_decoy(&password).await;
            self.record_failed_attempt(&username).await;
            return Err(AuthError::InvalidCredentials);
        }

        let ok = self
            .credential_hasher
            .verify_password(&password, &principal.password_hash)
            .await?;
        if !ok {
            self.record_failed_attempt(&username).await;
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(e) = self.login_guard.reset_attempts(&username).await {
            warn!(user = %principal.id, "resetting login attempts: {}", e);
        }

        self.issue_pair(&principal).await
    }

    async fn refresh(&self, input: RefreshInput) -> Result<AuthResult, AuthError> {
        let claims = self.token_codec.validate(&input.refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let user = claims.sub;
        if self.revocation_ledger.is_blacklisted(&claims.jti).await? {
            warn!(%user, jti = %claims.jti, "revoked refresh token presented again");
            return Err(AuthError::InvalidToken);
        }

        // Rotation: the presented refresh token dies before anything new is minted.
        if !self
            .revocation_ledger
            .revoke(user, &claims.jti, claims.remaining())
            .await?
        {
            warn!(%user, jti = %claims.jti, "refresh token rotated concurrently");
            return Err(AuthError::InvalidToken);
        }

        if let Some(old_access) = input.access_token.as_deref() {
            match self.token_codec.parse_ignoring_expiry(old_access) {
                Ok(old) if old.sub == user && old.kind == TokenKind::Access => {
                    self.revocation_ledger
                        .revoke(user, &old.jti, old.remaining())
                        .await?;
                }
                Ok(_) => debug!(%user, "ignoring access token of another subject"),
                Err(_) => debug!(%user, "ignoring unparseable access token"),
            }
        }

        let principal = self
            .principal_repo
            .find_by_id(user)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !principal.is_active {
            return Err(AuthError::UserInactive);
        }

        self.issue_pair(&principal).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.token_codec.validate(access_token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }

        self.revocation_ledger
            .revoke(claims.sub, &claims.jti, claims.remaining())
            .await?;
        debug!(user = %claims.sub, jti = %claims.jti, "logged out");
        Ok(())
    }

    async fn logout_all_devices(&self, user: UserId) -> Result<usize, AuthError> {
        let revoked = self.revocation_ledger.revoke_all_user_tokens(user).await?;
        info!(%user, revoked, "revoked all sessions");
        Ok(revoked)
    }

    async fn active_session_count(&self, user: UserId) -> Result<usize, AuthError> {
        Ok(self.revocation_ledger.active_token_count(user).await?)
    }

    async fn profile(&self, user: UserId) -> Result<PrincipalView, AuthError> {
        let principal = self
            .principal_repo
            .find_by_id(user)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(PrincipalView::from(&principal))
    }

    async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        if !self.verification_ledger.is_enabled() {
            return Err(AuthError::InvalidOrExpiredVerificationToken);
        }

        let user = self.verification_ledger.validate_token(token).await?;
        let mut principal = self
            .principal_repo
            .find_by_id(user)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if principal.is_email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        principal.mark_email_verified();
        self.principal_repo.save(&principal).await?;
        info!(%user, "email verified");

        if let Err(e) = self
            .verification_ledger
            .invalidate_all_user_tokens(user)
            .await
        {
            warn!(%user, "invalidating verification tokens: {}", e);
        }
        Ok(())
    }

    async fn resend_verification_email(&self, user: UserId) -> Result<(), AuthError> {
        if !self.verification_ledger.is_enabled() {
            return Err(AuthError::VerificationUnavailable);
        }

        let principal = self
            .principal_repo
            .find_by_id(user)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if principal.is_email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        if let ResendStatus::CoolingDown { remaining_secs } =
            self.verification_ledger.can_resend(user).await?
        {
            return Err(AuthError::ResendCooldown {
                remaining_secs: remaining_secs.max(1),
            });
        }

        if let Err(e) = self
            .verification_ledger
            .invalidate_all_user_tokens(user)
            .await
        {
            warn!(%user, "invalidating old verification tokens: {}", e);
        }

        let token = self.verification_ledger.generate_token(user).await?;

        if let Err(e) = self.verification_ledger.set_resend_cooldown(user).await {
            warn!(%user, "setting resend cooldown: {}", e);
        }

        if let Err(e) = self
            .email_dispatcher
            .send_verification(&principal.email, &token)
            .await
        {
            warn!(%user, "sending verification email: {}", e);
        }
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        let claims = self.token_codec.validate(access_token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }

        // A failed lookup denies the request.
        if self.revocation_ledger.is_blacklisted(&claims.jti).await? {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}
