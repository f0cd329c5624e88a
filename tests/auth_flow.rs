use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokenward::application_impl::*;
use tokenward::application_port::*;
use tokenward::domain_model::*;
use tokenward::domain_port::*;
use tokenward::infra_memory::*;

struct Harness {
    service: Arc<dyn AuthService>,
    store: Arc<MemoryTtlStore>,
    repo: Arc<InMemoryPrincipalRepo>,
    revocation: Arc<dyn RevocationLedger>,
    guard: Arc<MemoryLoginAttemptGuard>,
    mailer: Arc<RecordingEmailDispatcher>,
}

struct HarnessBuilder {
    lockout: LockoutPolicy,
    verification: VerificationPolicy,
    revocation: Option<Arc<dyn RevocationLedger>>,
    guard: Option<Arc<dyn LoginAttemptGuard>>,
    hasher: Option<Arc<dyn CredentialHasher>>,
    mailer: Arc<RecordingEmailDispatcher>,
}

impl HarnessBuilder {
    fn new() -> Self {
        HarnessBuilder {
            lockout: LockoutPolicy::default(),
            verification: VerificationPolicy::default(),
            revocation: None,
            guard: None,
            hasher: None,
            mailer: Arc::new(RecordingEmailDispatcher::new()),
        }
    }

    fn verification(mut self, policy: VerificationPolicy) -> Self {
        self.verification = policy;
        self
    }

    fn revocation(mut self, ledger: Arc<dyn RevocationLedger>) -> Self {
        self.revocation = Some(ledger);
        self
    }

    fn guard(mut self, guard: Arc<dyn LoginAttemptGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    fn hasher(mut self, hasher: Arc<dyn CredentialHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    fn mailer(mut self, mailer: RecordingEmailDispatcher) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    fn build(self) -> Harness {
        let store = Arc::new(MemoryTtlStore::new());
        let repo = Arc::new(InMemoryPrincipalRepo::new());
        let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "tokenward".to_string(),
            audience: "tokenward-api".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(2 * 60 * 60),
            signing_key: b"flow-test-key".to_vec(),
        }));
        let revocation: Arc<dyn RevocationLedger> = match self.revocation {
            Some(ledger) => ledger,
            None => Arc::new(MemoryRevocationLedger::new(
                store.clone(),
                RevocationPolicy::default(),
            )),
        };
        let guard = Arc::new(MemoryLoginAttemptGuard::new(store.clone(), self.lockout));
        let guard_port: Arc<dyn LoginAttemptGuard> = match self.guard {
            Some(guard) => guard,
            None => guard.clone(),
        };
        let verification = Arc::new(MemoryEmailVerificationLedger::new(
            store.clone(),
            self.verification,
        ));
        let hasher: Arc<dyn CredentialHasher> = match self.hasher {
            Some(hasher) => hasher,
            None => Arc::new(cheap_argon2()),
        };

        let service = Arc::new(RealAuthService::new(
            repo.clone(),
            hasher,
            codec,
            revocation.clone(),
            guard_port,
            verification,
            self.mailer.clone(),
        ));

        Harness {
            service,
            store,
            repo,
            revocation,
            guard,
            mailer: self.mailer,
        }
    }
}

fn cheap_argon2() -> Argon2PasswordHasher {
    Argon2PasswordHasher::with_params(8, 1, 1).unwrap()
}

/// Argon2 underneath, counting every verification.
struct CountingHasher {
    inner: Argon2PasswordHasher,
    verifies: AtomicUsize,
}

impl CountingHasher {
    fn new() -> Self {
        CountingHasher {
            inner: cheap_argon2(),
            verifies: AtomicUsize::new(0),
        }
    }

    fn take(&self) -> usize {
        self.verifies.swap(0, Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialHasher for CountingHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.inner.hash_password(password).await
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_password(password, password_hash).await
    }
}

fn harness() -> Harness {
    HarnessBuilder::new().build()
}

impl Harness {
    async fn register(&self, username: &str) -> AuthResult {
        self.service
            .register(RegisterInput {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthResult, AuthError> {
        self.service
            .login(LoginInput {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
    }

    async fn refresh(&self, refresh: &str, access: Option<&str>) -> Result<AuthResult, AuthError> {
        self.service
            .refresh(RefreshInput {
                refresh_token: refresh.to_string(),
                access_token: access.map(str::to_string),
            })
            .await
    }
}

/// Every call fails with the same store error.
struct UnreachableStore(StoreError);

impl UnreachableStore {
    fn refused() -> Self {
        UnreachableStore(StoreError::Unavailable("connection refused".to_string()))
    }

    fn stalled() -> Self {
        UnreachableStore(StoreError::Timeout(Duration::from_millis(500)))
    }

    fn down(&self) -> StoreError {
        self.0.clone()
    }
}

#[async_trait::async_trait]
impl RevocationLedger for UnreachableStore {
    async fn blacklist(&self, _: &Jti, _: Duration) -> Result<(), StoreError> {
        Err(self.down())
    }
    async fn is_blacklisted(&self, _: &Jti) -> Result<bool, StoreError> {
        Err(self.down())
    }
    async fn track_user_token(&self, _: UserId, _: &Jti, _: Duration) -> Result<(), StoreError> {
        Err(self.down())
    }
    async fn untrack_user_token(&self, _: UserId, _: &Jti) -> Result<(), StoreError> {
        Err(self.down())
    }
    async fn revoke(&self, _: UserId, _: &Jti, _: Duration) -> Result<bool, StoreError> {
        Err(self.down())
    }
    async fn revoke_all_user_tokens(&self, _: UserId) -> Result<usize, StoreError> {
        Err(self.down())
    }
    async fn active_tokens(&self, _: UserId) -> Result<Vec<Jti>, StoreError> {
        Err(self.down())
    }
}

#[async_trait::async_trait]
impl LoginAttemptGuard for UnreachableStore {
    async fn increment_attempts(&self, _: &str) -> Result<u32, StoreError> {
        Err(self.down())
    }
    async fn attempts(&self, _: &str) -> Result<u32, StoreError> {
        Err(self.down())
    }
    async fn is_locked(&self, _: &str) -> Result<bool, StoreError> {
        Err(self.down())
    }
    async fn remaining_lock_time(&self, _: &str) -> Result<u64, StoreError> {
        Err(self.down())
    }
    async fn lock(&self, _: &str) -> Result<(), StoreError> {
        Err(self.down())
    }
    async fn reset_attempts(&self, _: &str) -> Result<(), StoreError> {
        Err(self.down())
    }
}

// region login

#[tokio::test]
async fn registered_credentials_log_in_as_the_same_principal() {
    let h = harness();
    let registered = h.register("alice").await;
    assert_eq!(registered.token_type, "Bearer");
    assert_eq!(registered.expires_in, 15 * 60);
    assert_eq!(registered.principal.role, Role::Customer);
    assert!(!registered.principal.is_email_verified);

    let logged_in = h.login("alice", "correct-horse").await.unwrap();
    let claims = h.service.authenticate(&logged_in.access_token).await.unwrap();
    assert_eq!(claims.sub, registered.principal.id);
    assert_eq!(claims.role, Some(Role::Customer));
    assert_eq!(logged_in.principal.id, registered.principal.id);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let h = harness();
    h.register("alice").await;

    assert!(matches!(
        h.login("alice", "wrong-horse").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        h.login("mallory", "whatever").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert_eq!(h.guard.attempts("mallory").await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn five_failures_lock_out_even_the_correct_password() {
    let h = harness();
    h.register("alice").await;

    for _ in 0..5 {
        assert!(matches!(
            h.login("alice", "wrong-horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
    assert!(h.guard.is_locked("alice").await.unwrap());

    match h.login("alice", "correct-horse").await {
        Err(AuthError::AccountLocked { remaining_secs }) => assert!(remaining_secs > 0),
        other => panic!("expected AccountLocked, got {:?}", other.map(|r| r.principal.id)),
    }

    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    assert!(h.login("alice", "correct-horse").await.is_ok());
}

#[tokio::test]
async fn successful_login_clears_the_failure_counter() {
    let h = harness();
    h.register("alice").await;
    for _ in 0..4 {
        let _ = h.login("alice", "wrong-horse").await;
    }
    assert_eq!(h.guard.attempts("alice").await.unwrap(), 4);

    h.login("alice", "correct-horse").await.unwrap();
    assert_eq!(h.guard.attempts("alice").await.unwrap(), 0);

    let _ = h.login("alice", "wrong-horse").await;
    assert!(!h.guard.is_locked("alice").await.unwrap());
}

#[tokio::test]
async fn inactive_principal_cannot_log_in() {
    let h = harness();
    let registered = h.register("alice").await;
    let mut principal = h
        .repo
        .find_by_id(registered.principal.id)
        .await
        .unwrap()
        .unwrap();
    principal.deactivate();
    h.repo.save(&principal).await.unwrap();

    assert!(matches!(
        h.login("alice", "correct-horse").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert_eq!(h.guard.attempts("alice").await.unwrap(), 1);
}

#[tokio::test]
async fn failures_under_any_casing_count_against_one_account() {
    let h = harness();
    h.register("åsa").await;

    for name in ["ÅSA", "Åsa", "åsa"] {
        assert!(matches!(
            h.login(name, "wrong-horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
    assert_eq!(h.guard.attempts("åsa").await.unwrap(), 3);
    assert!(h.login("ÅSA", "correct-horse").await.is_ok());
    assert_eq!(h.guard.attempts("åsa").await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_and_inactive_users_cost_one_verification() {
    let hasher = Arc::new(CountingHasher::new());
    let h = HarnessBuilder::new().hasher(hasher.clone()).build();
    h.register("alice").await;
    let bob = h.register("bob").await;
    let mut inactive = h.repo.find_by_id(bob.principal.id).await.unwrap().unwrap();
    inactive.deactivate();
    h.repo.save(&inactive).await.unwrap();
    hasher.take();

    assert!(h.login("alice", "wrong-horse").await.is_err());
    let known = hasher.take();
    assert!(h.login("nobody", "wrong-horse").await.is_err());
    let unknown = hasher.take();
    assert!(h.login("nobody-else", "wrong-horse").await.is_err());
    let unknown_again = hasher.take();
    assert!(h.login("bob", "correct-horse").await.is_err());
    let deactivated = hasher.take();

    assert_eq!(known, 1);
    assert_eq!(unknown, known);
    assert_eq!(unknown_again, known);
    assert_eq!(deactivated, known);
}

#[tokio::test]
async fn lock_check_outage_refuses_login() {
    let h = HarnessBuilder::new()
        .guard(Arc::new(UnreachableStore::refused()))
        .build();
    h.register("alice").await;

    assert!(matches!(
        h.login("alice", "correct-horse").await,
        Err(AuthError::StoreUnavailable(_))
    ));
}

// endregion

// region registration

#[tokio::test]
async fn registration_rejects_taken_names_and_bad_input() {
    let h = harness();
    h.register("alice").await;

    let taken_username = h
        .service
        .register(RegisterInput {
            username: "alice".to_string(),
            email: "other@example.com".to_string(),
            password: "password".to_string(),
        })
        .await;
    assert!(matches!(
        taken_username,
        Err(AuthError::Conflict { field: "username" })
    ));

    let taken_email = h
        .service
        .register(RegisterInput {
            username: "alicia".to_string(),
            email: "alice@example.com".to_string(),
            password: "password".to_string(),
        })
        .await;
    assert!(matches!(taken_email, Err(AuthError::Conflict { field: "email" })));

    let bad_email = h
        .service
        .register(RegisterInput {
            username: "bob".to_string(),
            email: "not-an-email".to_string(),
            password: "password".to_string(),
        })
        .await;
    assert!(matches!(bad_email, Err(AuthError::Validation(_))));
}

#[tokio::test]
async fn registration_survives_a_failing_mailer() {
    let h = HarnessBuilder::new()
        .mailer(RecordingEmailDispatcher::failing())
        .build();
    let registered = h.register("alice").await;
    assert!(h.service.authenticate(&registered.access_token).await.is_ok());
}

// endregion

// region tokens

#[tokio::test]
async fn rotated_refresh_token_cannot_be_replayed() {
    let h = harness();
    let r0 = h.register("alice").await;

    let r1 = h.refresh(&r0.refresh_token, None).await.unwrap();
    assert!(matches!(
        h.refresh(&r0.refresh_token, None).await,
        Err(AuthError::InvalidToken)
    ));

    let r2 = h.refresh(&r1.refresh_token, None).await.unwrap();
    assert!(h.service.authenticate(&r2.access_token).await.is_ok());
}

#[tokio::test]
async fn refresh_revokes_the_supplied_access_token() {
    let h = harness();
    let r0 = h.register("alice").await;

    let r1 = h
        .refresh(&r0.refresh_token, Some(&r0.access_token))
        .await
        .unwrap();
    assert!(matches!(
        h.service.authenticate(&r0.access_token).await,
        Err(AuthError::InvalidToken)
    ));
    assert!(h.service.authenticate(&r1.access_token).await.is_ok());
    assert_eq!(
        h.service
            .active_session_count(r0.principal.id)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn refresh_leaves_another_subjects_access_token_alone() {
    let h = harness();
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;

    h.refresh(&alice.refresh_token, Some(&bob.access_token))
        .await
        .unwrap();
    assert!(h.service.authenticate(&bob.access_token).await.is_ok());
}

#[tokio::test]
async fn token_kinds_are_not_interchangeable() {
    let h = harness();
    let r0 = h.register("alice").await;

    assert!(matches!(
        h.service.authenticate(&r0.refresh_token).await,
        Err(AuthError::InvalidToken)
    ));
    assert!(matches!(
        h.refresh(&r0.access_token, None).await,
        Err(AuthError::InvalidToken)
    ));
    assert!(matches!(
        h.service.logout(&r0.refresh_token).await,
        Err(AuthError::InvalidToken)
    ));
}

#[tokio::test]
async fn refresh_for_a_deactivated_principal_fails() {
    let h = harness();
    let r0 = h.register("alice").await;
    let mut principal = h.repo.find_by_id(r0.principal.id).await.unwrap().unwrap();
    principal.deactivate();
    h.repo.save(&principal).await.unwrap();

    assert!(matches!(
        h.refresh(&r0.refresh_token, None).await,
        Err(AuthError::UserInactive)
    ));
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let h = harness();
    let r0 = h.register("alice").await;

    h.service.logout(&r0.access_token).await.unwrap();
    assert!(matches!(
        h.service.authenticate(&r0.access_token).await,
        Err(AuthError::InvalidToken)
    ));
    // Logging out twice is harmless.
    h.service.logout(&r0.access_token).await.unwrap();
}

#[tokio::test]
async fn logout_all_devices_blacklists_every_tracked_token() {
    let h = harness();
    let user = h.register("alice").await.principal.id;
    h.service.logout_all_devices(user).await.unwrap();

    let jtis: Vec<Jti> = (0..3).map(|_| Jti::generate()).collect();
    for jti in &jtis {
        h.revocation
            .track_user_token(user, jti, Duration::from_secs(900))
            .await
            .unwrap();
    }
    assert_eq!(h.service.active_session_count(user).await.unwrap(), 3);

    assert_eq!(h.service.logout_all_devices(user).await.unwrap(), 3);
    for jti in &jtis {
        assert!(h.revocation.is_blacklisted(jti).await.unwrap());
    }
    assert_eq!(h.service.active_session_count(user).await.unwrap(), 0);
}

#[tokio::test]
async fn logout_all_devices_ends_every_session() {
    let h = harness();
    let first = h.register("alice").await;
    let second = h.login("alice", "correct-horse").await.unwrap();

    let revoked = h
        .service
        .logout_all_devices(first.principal.id)
        .await
        .unwrap();
    assert_eq!(revoked, 4);
    for token in [&first.access_token, &second.access_token] {
        assert!(h.service.authenticate(token).await.is_err());
    }
    assert!(h.refresh(&second.refresh_token, None).await.is_err());
}

#[tokio::test]
async fn untracking_twice_is_harmless() {
    let h = harness();
    let user = UserId::new_v4();
    let kept = Jti::generate();
    let dropped = Jti::generate();
    for jti in [&kept, &dropped] {
        h.revocation
            .track_user_token(user, jti, Duration::from_secs(60))
            .await
            .unwrap();
    }

    h.revocation.untrack_user_token(user, &dropped).await.unwrap();
    h.revocation.untrack_user_token(user, &dropped).await.unwrap();
    assert_eq!(h.revocation.active_tokens(user).await.unwrap(), vec![kept]);
}

#[tokio::test(start_paused = true)]
async fn user_set_ttl_is_the_longest_tracked_ttl_in_either_order() {
    let short = Duration::from_secs(900);
    let long = Duration::from_secs(7200);

    for order in [[short, long], [long, short]] {
        let h = harness();
        let user = UserId::new_v4();
        for ttl in order {
            h.revocation
                .track_user_token(user, &Jti::generate(), ttl)
                .await
                .unwrap();
        }
        let key = KeySpace::default().user_tokens(user);
        assert_eq!(h.store.ttl(&key), KeyTtl::Remaining(long));
    }
}

#[tokio::test]
async fn authorize_enforces_role_thresholds() {
    let h = harness();
    let r0 = h.register("alice").await;
    let claims = h.service.authenticate(&r0.access_token).await.unwrap();

    assert!(h.service.authorize(&claims, Role::Customer).is_ok());
    assert!(matches!(
        h.service.authorize(&claims, Role::Admin),
        Err(AuthError::Forbidden)
    ));
}

#[tokio::test]
async fn blacklist_outage_fails_closed_but_login_still_works() {
    let h = HarnessBuilder::new()
        .revocation(Arc::new(UnreachableStore::refused()))
        .build();
    let registered = h.register("alice").await;

    let logged_in = h.login("alice", "correct-horse").await.unwrap();
    assert!(matches!(
        h.service.authenticate(&logged_in.access_token).await,
        Err(AuthError::StoreUnavailable(_))
    ));
    assert!(matches!(
        h.refresh(&registered.refresh_token, None).await,
        Err(AuthError::StoreUnavailable(_))
    ));
    assert!(matches!(
        h.service.logout(&registered.access_token).await,
        Err(AuthError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn blacklist_timeout_fails_closed() {
    let h = HarnessBuilder::new()
        .revocation(Arc::new(UnreachableStore::stalled()))
        .build();
    h.register("alice").await;

    let logged_in = h.login("alice", "correct-horse").await.unwrap();
    assert!(matches!(
        h.service.authenticate(&logged_in.access_token).await,
        Err(AuthError::StoreUnavailable(_))
    ));
}

// endregion

// region email verification

#[tokio::test]
async fn emailed_token_verifies_once() {
    let h = harness();
    let registered = h.register("alice").await;
    let token = h
        .mailer
        .last_token_for("alice@example.com")
        .await
        .expect("verification email sent on registration");

    h.service.verify_email(&token).await.unwrap();
    let profile = h.service.profile(registered.principal.id).await.unwrap();
    assert!(profile.is_email_verified);

    assert!(matches!(
        h.service.verify_email(&token).await,
        Err(AuthError::InvalidOrExpiredVerificationToken)
    ));
    assert!(matches!(
        h.service
            .resend_verification_email(registered.principal.id)
            .await,
        Err(AuthError::AlreadyVerified)
    ));
}

#[tokio::test]
async fn resend_within_cooldown_is_refused() {
    let h = harness();
    let user = h.register("alice").await.principal.id;

    h.service.resend_verification_email(user).await.unwrap();
    match h.service.resend_verification_email(user).await {
        Err(AuthError::ResendCooldown { remaining_secs }) => assert!(remaining_secs > 0),
        other => panic!("expected ResendCooldown, got {:?}", other),
    }
    assert_eq!(h.mailer.sent().await.len(), 2);
}

#[tokio::test]
async fn resend_replaces_the_outstanding_token() {
    let h = harness();
    let user = h.register("alice").await.principal.id;
    let first = h.mailer.last_token_for("alice@example.com").await.unwrap();

    h.service.resend_verification_email(user).await.unwrap();
    let second = h.mailer.last_token_for("alice@example.com").await.unwrap();
    assert_ne!(first, second);

    assert!(matches!(
        h.service.verify_email(&first).await,
        Err(AuthError::InvalidOrExpiredVerificationToken)
    ));
    h.service.verify_email(&second).await.unwrap();
}

#[tokio::test]
async fn resend_for_unknown_user_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.service.resend_verification_email(UserId::new_v4()).await,
        Err(AuthError::UserNotFound)
    ));
}

#[tokio::test]
async fn disabled_verification_skips_the_whole_lifecycle() {
    let h = HarnessBuilder::new()
        .verification(VerificationPolicy {
            enabled: false,
            ..VerificationPolicy::default()
        })
        .build();
    let user = h.register("alice").await.principal.id;

    assert!(h.mailer.sent().await.is_empty());
    assert!(matches!(
        h.service.verify_email("anything").await,
        Err(AuthError::InvalidOrExpiredVerificationToken)
    ));
    assert!(matches!(
        h.service.resend_verification_email(user).await,
        Err(AuthError::VerificationUnavailable)
    ));
}

// endregion
