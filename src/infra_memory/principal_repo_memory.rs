use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::Mutex;

/// Username and email uniqueness is case-insensitive, matching the default
/// collation of the MySQL table.
#[derive(Default)]
pub struct InMemoryPrincipalRepo {
    principals: DashMap<UserId, Principal>,
    write_lock: Mutex<()>,
}

impl InMemoryPrincipalRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn same(a: &str, b: &str) -> bool {
        fold_case(a) == fold_case(b)
    }

    fn find(&self, pred: impl Fn(&Principal) -> bool) -> Option<Principal> {
        self.principals
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait::async_trait]
impl PrincipalRepo for InMemoryPrincipalRepo {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, RepoError> {
        Ok(self.principals.get(&id).map(|p| p.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, RepoError> {
        Ok(self.find(|p| Self::same(&p.username, username)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, RepoError> {
        Ok(self.find(|p| Self::same(&p.email, email)))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, RepoError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn create(&self, principal: &Principal) -> Result<(), RepoError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;

        for entry in self.principals.iter() {
            let p = entry.value();
            if Self::same(&p.username, &principal.username) {
                return Err(RepoError::Duplicate("username"));
            }
            if Self::same(&p.email, &principal.email) {
                return Err(RepoError::Duplicate("email"));
            }
        }
        self.principals.insert(principal.id, principal.clone());
        Ok(())
    }

    async fn save(&self, principal: &Principal) -> Result<(), RepoError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| RepoError::Unavailable(e.to_string()))?;
        match self.principals.get_mut(&principal.id) {
            Some(mut existing) => {
                *existing = principal.clone();
                Ok(())
            }
            None => Err(RepoError::NotFound(principal.id)),
        }
    }
}
