use super::util::dup_key_field;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

// CREATE TABLE principal (
//     user_id           BINARY(16)   NOT NULL PRIMARY KEY,
//     username          VARCHAR(50)  NOT NULL UNIQUE,
//     email             VARCHAR(255) NOT NULL UNIQUE,
//     password_hash     VARCHAR(255) NOT NULL,
//     role              VARCHAR(16)  NOT NULL,
//     is_active         BOOLEAN      NOT NULL,
//     is_email_verified BOOLEAN      NOT NULL,
//     created_at        DATETIME(6)  NOT NULL,
//     updated_at        DATETIME(6)  NOT NULL
// );

const SELECT_PRINCIPAL: &str = r#"
SELECT user_id, username, email, password_hash, role, is_active, is_email_verified,
       created_at, updated_at
FROM principal
"#;

pub struct MySqlPrincipalRepo {
    pool: MySqlPool,
}

impl MySqlPrincipalRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlPrincipalRepo { pool }
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, RepoError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| RepoError::Corrupt(e.to_string()))?,
        ))
    }

    fn row_to_principal(row: MySqlRow) -> Result<Principal, RepoError> {
        let corrupt = |e: sqlx::Error| RepoError::Corrupt(e.to_string());

        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(corrupt)?;
        let role: String = row.try_get("role").map_err(corrupt)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(corrupt)?;

        Ok(Principal {
            id: Self::uid_from_bytes(&user_id_bytes)?,
            username: row.try_get("username").map_err(corrupt)?,
            email: row.try_get("email").map_err(corrupt)?,
            password_hash: row.try_get("password_hash").map_err(corrupt)?,
            role: role
                .parse::<Role>()
                .map_err(|e| RepoError::Corrupt(e.to_string()))?,
            is_active: row.try_get("is_active").map_err(corrupt)?,
            is_email_verified: row.try_get("is_email_verified").map_err(corrupt)?,
            created_at,
            updated_at,
        })
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<Principal>, RepoError> {
        let sql = format!("{SELECT_PRINCIPAL} WHERE {filter} = ?");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        row.map(Self::row_to_principal).transpose()
    }

    async fn exists_where(&self, filter: &str, value: &str) -> Result<bool, RepoError> {
        let sql = format!("SELECT COUNT(1) FROM principal WHERE {filter} = ?");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        Ok(count > 0)
    }
}

#[async_trait::async_trait]
impl PrincipalRepo for MySqlPrincipalRepo {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, RepoError> {
        let sql = format!("{SELECT_PRINCIPAL} WHERE user_id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0.as_bytes() as &[u8])
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        row.map(Self::row_to_principal).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, RepoError> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, RepoError> {
        self.find_one("email", email).await
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError> {
        self.exists_where("username", username).await
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, RepoError> {
        self.exists_where("email", email).await
    }

    async fn create(&self, principal: &Principal) -> Result<(), RepoError> {
        sqlx::query(
            r#"
INSERT INTO principal
    (user_id, username, email, password_hash, role, is_active, is_email_verified,
     created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(principal.id.0.as_bytes() as &[u8])
        .bind(&principal.username)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(principal.is_active)
        .bind(principal.is_email_verified)
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match dup_key_field(&e) {
            Some(field) => RepoError::Duplicate(field),
            None => RepoError::Unavailable(e.to_string()),
        })?;

        Ok(())
    }

    async fn save(&self, principal: &Principal) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
UPDATE principal
SET email = ?, password_hash = ?, role = ?, is_active = ?, is_email_verified = ?,
    updated_at = ?
WHERE user_id = ?
"#,
        )
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(principal.is_active)
        .bind(principal.is_email_verified)
        .bind(principal.updated_at)
        .bind(principal.id.0.as_bytes() as &[u8])
        .execute(&self.pool)
        .await
        .map_err(|e| match dup_key_field(&e) {
            Some(field) => RepoError::Duplicate(field),
            None => RepoError::Unavailable(e.to_string()),
        })?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(principal.id));
        }
        Ok(())
    }
}
