//! HMAC-signed access tokens.
//!
//! Tokens use the standard JWT wire format (`header.payload.signature`, base64url, HS256). Issuance happens
//! at `POST /auth`; validation happens in the ACL middleware, which stashes the verified [`JwtClaims`] in the
//! request extensions for handlers to extract.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use course_payment_engine::db_types::{Actor, Role};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{config::AuthConfig, errors::AuthError, errors::ServerError};

/// The request header carrying the access token.
pub const AUTH_HEADER: &str = "cpg_access_token";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The authenticated user id.
    pub sub: i64,
    pub role: Role,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.sub, self.role)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(req.extensions().get::<JwtClaims>().cloned().ok_or(ServerError::CouldNotDeserializeAuthToken))
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: cpg_common::Secret<String>,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { secret: config.jwt_secret.clone(), expiry: config.token_expiry }
    }

    /// Issues a new access token for the given user. The caller is responsible for verifying that the user
    /// exists and is allowed to log in before calling this.
    pub fn issue_token(&self, user_id: i64, role: Role) -> Result<String, AuthError> {
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
        let claims = JwtClaims { sub: user_id, role, exp: (Utc::now() + self.expiry).timestamp() };
        let header = encode_part(&header)?;
        let payload = encode_part(&claims)?;
        let signature = self.sign(&format!("{header}.{payload}"))?;
        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Verifies the token's signature and expiry and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let mut parts = token.split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(AuthError::PoorlyFormattedToken("Expected three dot-separated parts".to_string())),
        };
        let mut mac = self.mac()?;
        mac.update(format!("{header}.{payload}").as_bytes());
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        mac.verify_slice(&signature).map_err(|e| AuthError::ValidationError(e.to_string()))?;
        let payload = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let claims: JwtClaims =
            serde_json::from_slice(&payload).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }

    fn sign(&self, message: &str) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        Ok(base64::encode_config(mac.finalize().into_bytes(), base64::URL_SAFE_NO_PAD))
    }
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let bytes = serde_json::to_vec(value).map_err(|e| AuthError::ValidationError(e.to_string()))?;
    Ok(base64::encode_config(bytes, base64::URL_SAFE_NO_PAD))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::AuthConfig;

    fn issuer() -> TokenIssuer {
        let config = AuthConfig {
            jwt_secret: cpg_common::Secret::new("a-very-long-test-secret-that-is-not-short".to_string()),
            token_expiry: Duration::hours(1),
        };
        TokenIssuer::new(&config)
    }

    #[test]
    fn tokens_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_token(42, Role::Instructor).unwrap();
        let claims = issuer.validate_token(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Instructor);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let issuer = issuer();
        let token = issuer.issue_token(42, Role::Student).unwrap();
        // Swap the payload for one claiming the admin role, keeping the original signature.
        let forged_payload = encode_part(&JwtClaims { sub: 42, role: Role::Admin, exp: i64::MAX }).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_payload;
        let forged = parts.join(".");
        assert!(matches!(issuer.validate_token(&forged), Err(AuthError::ValidationError(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let config = AuthConfig {
            jwt_secret: cpg_common::Secret::new("a-very-long-test-secret-that-is-not-short".to_string()),
            token_expiry: Duration::hours(-1),
        };
        let issuer = TokenIssuer::new(&config);
        let token = issuer.issue_token(1, Role::Student).unwrap();
        assert!(matches!(issuer.validate_token(&token), Err(AuthError::TokenExpired)));
    }
}
