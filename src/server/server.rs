use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_email::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;

struct Ledgers {
    revocation: Arc<dyn RevocationLedger>,
    login_guard: Arc<dyn LoginAttemptGuard>,
    verification: Arc<dyn EmailVerificationLedger>,
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        if settings.jwt.secret.is_empty() {
            return Err(anyhow!(
                "jwt.secret is empty; set it in the settings file or TOKENWARD__JWT__SECRET"
            ));
        }

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.jwt.issuer.clone(),
            audience: settings.jwt.audience.clone(),
            access_ttl: settings.jwt.access_ttl(),
            refresh_ttl: settings.jwt.refresh_ttl(),
            signing_key: settings.jwt.secret.clone().into_bytes(),
        }));

        let ledgers = Self::build_ledgers(settings, token_codec.as_ref()).await?;

        let (principal_repo, pool): (Arc<dyn PrincipalRepo>, Option<Pool<MySql>>) =
            match settings.principals.backend.as_str() {
                "mysql" => {
                    let pool = Pool::<MySql>::connect(&settings.principals.mysql_url).await?;
                    (Arc::new(MySqlPrincipalRepo::new(pool.clone())), Some(pool))
                }
                "memory" => (Arc::new(InMemoryPrincipalRepo::new()), None),
                other => return Err(anyhow!("Unknown principals backend: {}", other)),
            };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher::new());
        let email_dispatcher: Arc<dyn EmailDispatcher> = Arc::new(ConsoleEmailDispatcher::new(
            settings.email.base_url.clone(),
            settings.email.enabled,
        ));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            principal_repo,
            credential_hasher,
            token_codec,
            ledgers.revocation,
            ledgers.login_guard,
            ledgers.verification,
            email_dispatcher,
        ));

        info!(
            store = %settings.store.backend,
            principals = %settings.principals.backend,
            "server started"
        );

        Ok(Self { auth_service, pool })
    }

    async fn build_ledgers(
        settings: &Settings,
        token_codec: &dyn TokenCodec,
    ) -> anyhow::Result<Ledgers> {
        let revocation_policy = RevocationPolicy {
            enabled: settings.blacklist.enabled,
            ..RevocationPolicy::covering(token_codec.access_ttl(), token_codec.refresh_ttl())
        };
        let lockout_policy = LockoutPolicy::from(&settings.lockout);
        let verification_policy = VerificationPolicy::from(&settings.verification);

        match settings.store.backend.as_str() {
            "redis" => {
                let redis_client = redis::Client::open(settings.store.redis_url.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                let keys = KeySpace::new(settings.store.key_prefix.clone());
                let op_timeout = settings.store.op_timeout();
                Ok(Ledgers {
                    revocation: Arc::new(RedisRevocationLedger::new(
                        redis_manager.clone(),
                        keys.clone(),
                        revocation_policy,
                        op_timeout,
                    )),
                    login_guard: Arc::new(RedisLoginAttemptGuard::new(
                        redis_manager.clone(),
                        keys.clone(),
                        lockout_policy,
                        op_timeout,
                    )),
                    verification: Arc::new(RedisEmailVerificationLedger::new(
                        redis_manager,
                        keys,
                        verification_policy,
                        op_timeout,
                    )),
                })
            }
            "memory" => {
                warn!("memory store is process-local; revocations are not shared between instances");
                let store = Arc::new(MemoryTtlStore::new());
                Ok(Ledgers {
                    revocation: Arc::new(MemoryRevocationLedger::new(
                        store.clone(),
                        revocation_policy,
                    )),
                    login_guard: Arc::new(MemoryLoginAttemptGuard::new(
                        store.clone(),
                        lockout_policy,
                    )),
                    verification: Arc::new(MemoryEmailVerificationLedger::new(
                        store,
                        verification_policy,
                    )),
                })
            }
            other => Err(anyhow!("Unknown store backend: {}", other)),
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
