use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("no principal {0}")]
    NotFound(UserId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait::async_trait]
pub trait PrincipalRepo: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, RepoError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, RepoError>;
    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError>;
    async fn exists_by_email(&self, email: &str) -> Result<bool, RepoError>;
    /// Fails with `Duplicate` when the username or email is taken.
    async fn create(&self, principal: &Principal) -> Result<(), RepoError>;
    /// Fails with `NotFound` when no row has the principal's id.
    async fn save(&self, principal: &Principal) -> Result<(), RepoError>;
}
