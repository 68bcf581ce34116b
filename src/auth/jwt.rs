use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::Role;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            config.jwt_expiry_minutes,
        ))
    }

    pub fn new(secret: &str, issuer: &str, audience: &str, expiry_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
            expiry: Duration::minutes(expiry_minutes),
        }
    }

    pub fn expires_in_seconds(&self) -> i64 {
        self.expiry.num_seconds()
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        session_id: Uuid,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            email: email.to_owned(),
            role,
            sid: session_id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub sid: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", "test-issuer", "test-audience", 5)
    }

    #[test]
    fn issued_token_verifies() {
        let jwt = service();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let token = jwt
            .generate_token(user_id, "admin@example.com", Role::Admin, session_id)
            .expect("token");

        let claims = jwt.verify_token(&token).expect("claims");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email, "admin@example.com");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = JwtService::new("other-secret", "test-issuer", "test-audience", 5);
        let token = other
            .generate_token(Uuid::new_v4(), "a@b.ru", Role::User, Uuid::new_v4())
            .expect("token");
        assert!(service().verify_token(&token).is_err());
    }

    #[test]
    fn rejects_token_for_other_audience() {
        let other = JwtService::new("test-secret", "test-issuer", "someone-else", 5);
        let token = other
            .generate_token(Uuid::new_v4(), "a@b.ru", Role::User, Uuid::new_v4())
            .expect("token");
        assert!(service().verify_token(&token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(service().verify_token("not-a-token").is_err());
    }
}
