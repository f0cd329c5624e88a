//! Runs against a live Redis when `REDIS_URL` is set; otherwise each test
//! returns early. Every test uses its own key prefix.

use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokenward::domain_model::*;
use tokenward::domain_port::*;
use tokenward::infra_redis::*;

const OP_TIMEOUT: Duration = Duration::from_secs(2);

async fn connect() -> Option<ConnectionManager> {
    let url = std::env::var("REDIS_URL").ok()?;
    let client = redis::Client::open(url).unwrap();
    Some(ConnectionManager::new(client).await.unwrap())
}

fn keyspace() -> KeySpace {
    KeySpace::new(format!("tokenward-test-{}", uuid::Uuid::new_v4()))
}

async fn ledger() -> Option<Arc<RedisRevocationLedger>> {
    let conn = connect().await?;
    Some(Arc::new(RedisRevocationLedger::new(
        conn,
        keyspace(),
        RevocationPolicy::default(),
        OP_TIMEOUT,
    )))
}

#[tokio::test]
async fn revoke_has_exactly_one_winner() {
    let Some(ledger) = ledger().await else { return };
    let user = UserId::new_v4();
    let jti = Jti::generate();
    let ttl = Duration::from_secs(60);
    ledger.track_user_token(user, &jti, ttl).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        let jti = jti.clone();
        tasks.push(tokio::spawn(async move {
            ledger.revoke(user, &jti, ttl).await.unwrap()
        }));
    }
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert!(ledger.is_blacklisted(&jti).await.unwrap());
    assert_eq!(ledger.active_token_count(user).await.unwrap(), 0);
}

#[tokio::test]
async fn revoke_all_blacklists_every_tracked_jti() {
    let Some(ledger) = ledger().await else { return };
    let user = UserId::new_v4();
    let jtis: Vec<Jti> = (0..3).map(|_| Jti::generate()).collect();
    for jti in &jtis {
        ledger
            .track_user_token(user, jti, Duration::from_secs(60))
            .await
            .unwrap();
    }
    assert_eq!(ledger.active_token_count(user).await.unwrap(), 3);

    assert_eq!(ledger.revoke_all_user_tokens(user).await.unwrap(), 3);
    for jti in &jtis {
        assert!(ledger.is_blacklisted(jti).await.unwrap());
    }
    assert!(ledger.active_tokens(user).await.unwrap().is_empty());
    assert_eq!(ledger.revoke_all_user_tokens(user).await.unwrap(), 0);
}

#[tokio::test]
async fn user_set_ttl_never_shrinks() {
    let Some(conn) = connect().await else { return };
    let keys = keyspace();
    let ledger = RedisRevocationLedger::new(
        conn.clone(),
        keys.clone(),
        RevocationPolicy::default(),
        OP_TIMEOUT,
    );
    let user = UserId::new_v4();

    ledger
        .track_user_token(user, &Jti::generate(), Duration::from_secs(7200))
        .await
        .unwrap();
    ledger
        .track_user_token(user, &Jti::generate(), Duration::from_secs(900))
        .await
        .unwrap();

    let mut conn = conn;
    let ttl: i64 = redis::cmd("TTL")
        .arg(keys.user_tokens(user))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(ttl > 900, "set ttl shrank to {ttl}");
}

#[tokio::test]
async fn untracking_a_missing_jti_is_fine() {
    let Some(ledger) = ledger().await else { return };
    let user = UserId::new_v4();
    ledger.untrack_user_token(user, &Jti::generate()).await.unwrap();
    assert_eq!(ledger.active_token_count(user).await.unwrap(), 0);
}

#[tokio::test]
async fn lockout_after_max_attempts() {
    let Some(conn) = connect().await else { return };
    let guard = RedisLoginAttemptGuard::new(
        conn,
        keyspace(),
        LockoutPolicy {
            max_attempts: 3,
            ..LockoutPolicy::default()
        },
        OP_TIMEOUT,
    );

    for expected in 1..=2 {
        assert_eq!(guard.increment_attempts("Alice").await.unwrap(), expected);
        assert!(!guard.is_locked("alice").await.unwrap());
    }
    assert_eq!(guard.increment_attempts("alice").await.unwrap(), 3);
    assert!(guard.is_locked("ALICE").await.unwrap());
    let remaining = guard.remaining_lock_time("alice").await.unwrap();
    assert!(remaining > 0 && remaining <= 15 * 60);

    guard.reset_attempts("alice").await.unwrap();
    assert!(!guard.is_locked("alice").await.unwrap());
    assert_eq!(guard.attempts("alice").await.unwrap(), 0);
    assert_eq!(guard.remaining_lock_time("alice").await.unwrap(), 0);
}

#[tokio::test]
async fn verification_tokens_die_on_invalidation() {
    let Some(conn) = connect().await else { return };
    let ledger = RedisEmailVerificationLedger::new(
        conn,
        keyspace(),
        VerificationPolicy::default(),
        OP_TIMEOUT,
    );
    let user = UserId::new_v4();

    let first = ledger.generate_token(user).await.unwrap();
    assert_eq!(ledger.validate_token(&first).await.unwrap(), user);

    ledger.invalidate_all_user_tokens(user).await.unwrap();
    assert!(matches!(
        ledger.validate_token(&first).await,
        Err(VerificationError::InvalidOrExpired)
    ));

    let second = ledger.generate_token(user).await.unwrap();
    assert_eq!(ledger.validate_token(&second).await.unwrap(), user);

    ledger.invalidate_token(&second).await.unwrap();
    assert!(matches!(
        ledger.validate_token(&second).await,
        Err(VerificationError::InvalidOrExpired)
    ));
}

#[tokio::test]
async fn resend_cooldown_reports_remaining_time() {
    let Some(conn) = connect().await else { return };
    let ledger = RedisEmailVerificationLedger::new(
        conn,
        keyspace(),
        VerificationPolicy::default(),
        OP_TIMEOUT,
    );
    let user = UserId::new_v4();

    assert_eq!(ledger.can_resend(user).await.unwrap(), ResendStatus::Ready);
    ledger.set_resend_cooldown(user).await.unwrap();
    match ledger.can_resend(user).await.unwrap() {
        ResendStatus::CoolingDown { remaining_secs } => {
            assert!(remaining_secs > 0 && remaining_secs <= 60)
        }
        ResendStatus::Ready => panic!("cooldown not recorded"),
    }
}
