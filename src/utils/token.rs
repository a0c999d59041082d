use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::middleware::auth::{Claims, Role};

/// Signs and verifies bearer tokens with the configured HS256 secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days.max(1)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_days)
    }

    pub fn issue(&self, subject: Uuid, role: Role) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let issuer = TokenIssuer::new("unit-secret", 7);
        let id = Uuid::new_v4();
        let issued = issuer.issue(id, Role::Staff).unwrap();
        let claims = issuer.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Staff);
        let days = (issued.expires_at - Utc::now()).num_hours();
        assert!((7 * 24 - 1..=7 * 24).contains(&days));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let issued = TokenIssuer::new("one", 7)
            .issue(Uuid::new_v4(), Role::Admin)
            .unwrap();
        let err = TokenIssuer::new("two", 7).verify(&issued.token).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
