use crate::application_port::*;
use crate::domain_model::*;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::Duration;

/// Claim names the codec owns; caller-supplied extras may not shadow them.
const RESERVED_CLAIMS: [&str; 8] = ["sub", "jti", "kind", "role", "iat", "exp", "iss", "aud"];

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&cfg.signing_key);
        let decoding_key = DecodingKey::from_secret(&cfg.signing_key);
        JwtHs256Codec {
            cfg,
            encoding_key,
            decoding_key,
        }
    }

    fn validation(&self, check_expiry: bool) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 0;
        v.validate_exp = check_expiry;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }

    fn issue(
        &self,
        subject: UserId,
        kind: TokenKind,
        role: Option<Role>,
        ttl: Duration,
        mut extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError> {
        for name in RESERVED_CLAIMS {
            extra.remove(name);
        }

        let iat_dt = Utc::now();
        let exp_dt = iat_dt
            + chrono::Duration::from_std(ttl).map_err(|e| TokenError::Signing(e.to_string()))?;
        let jti = Jti::generate();
        let claims = Claims {
            sub: subject,
            jti: jti.clone(),
            kind,
            role,
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            extra,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            ttl,
        })
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access(
        &self,
        subject: UserId,
        role: Role,
        extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(
            subject,
            TokenKind::Access,
            Some(role),
            self.cfg.access_ttl,
            extra,
        )
    }

    fn issue_refresh(&self, subject: UserId) -> Result<IssuedToken, TokenError> {
        self.issue(
            subject,
            TokenKind::Refresh,
            None,
            self.cfg.refresh_ttl,
            ExtraClaims::new(),
        )
    }

    fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation(true))
            .map_err(|_| TokenError::Invalid)?;
        Ok(data.claims)
    }

    fn parse_ignoring_expiry(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation(false))
            .map_err(|_| TokenError::Malformed)?;
        Ok(data.claims)
    }

    fn access_ttl(&self) -> Duration {
        self.cfg.access_ttl
    }

    fn refresh_ttl(&self) -> Duration {
        self.cfg.refresh_ttl
    }
}
