use super::{Jti, UserId, fold_case};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `input`.
pub fn digest_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// `len` bytes from the OS RNG, hex encoded.
pub fn random_token_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Usernames are case-folded and hashed before they reach a key, so the
/// attempt keyspace never stores raw user input.
pub fn username_digest(username: &str) -> String {
    digest_hex(&fold_case(username))
}

/// Builds every key the ledgers write, under one namespace prefix.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        KeySpace {
            prefix: prefix.into(),
        }
    }

    fn key(&self, family: &str, id: impl std::fmt::Display) -> String {
        if self.prefix.is_empty() {
            format!("{}:{}", family, id)
        } else {
            format!("{}:{}:{}", self.prefix, family, id)
        }
    }

    pub fn blacklist(&self, jti: &Jti) -> String {
        self.key("token_blacklist", jti)
    }

    /// Blacklist key with an empty id; the revoke-all script appends JTIs to it.
    pub fn blacklist_prefix(&self) -> String {
        self.key("token_blacklist", "")
    }

    pub fn user_tokens(&self, user: UserId) -> String {
        self.key("user_tokens", user)
    }

    pub fn login_attempts(&self, username: &str) -> String {
        self.key("login_attempts", username_digest(username))
    }

    pub fn account_lock(&self, username: &str) -> String {
        self.key("account_locked", username_digest(username))
    }

    pub fn verification(&self, token_digest: &str) -> String {
        self.key("email_verify", token_digest)
    }

    pub fn user_verifications(&self, user: UserId) -> String {
        self.key("email_verify_user", user)
    }

    pub fn resend_cooldown(&self, user: UserId) -> String {
        self.key("email_verify_cd", user)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        KeySpace::new("")
    }
}
