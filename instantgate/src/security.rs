//! JWT token management.
//!
//! Tokens are HS256-signed with claims for user id, username and roles.
//! Validation is stateless: signature, expiry and issuer are checked with no
//! database lookup. When `security.require_auth` is off, tokens are still
//! validated when present but their absence is not an error; that decision
//! lives in the auth middleware.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// User id, duplicated for clients that read `uid`
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Token kind, always "access" for tokens we mint
    #[serde(rename = "type", default)]
    pub token_type: String,
    pub iss: String,
    /// Token id
    #[serde(default)]
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    /// True when the claims carry any of the given roles.
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.roles.iter().any(|r| r == role))
    }
}

/// Token validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed")]
    MalformedToken,
    #[error("invalid token issuer")]
    InvalidIssuer,
    #[error("token generation failed")]
    GenerationFailed,
}

/// Issues and validates HS256 tokens.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_secs: u64,
    issuer: String,
}

impl JwtManager {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiry_secs: config.expiry,
            issuer: config.issuer.clone(),
        }
    }

    /// Generates an access token for a user.
    pub fn generate_token(
        &self,
        user_id: &str,
        username: &str,
        roles: Vec<String>,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            uid: user_id.to_string(),
            username: username.to_string(),
            roles,
            token_type: "access".to_string(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now + self.expiry_secs as i64,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::GenerationFailed)
    }

    /// Validates a token and extracts its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                _ => AuthError::MalformedToken,
            }
        })?;

        Ok(data.claims)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    fn test_manager() -> JwtManager {
        JwtManager::new(&JwtConfig {
            secret: "test-secret-key".to_string(),
            expiry: 900,
            issuer: "test".to_string(),
        })
    }

    #[test]
    fn test_token_round_trip() {
        let manager = test_manager();
        let token = manager
            .generate_token("7", "alice", vec!["admin".to_string()])
            .unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = manager.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.uid, "7");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.roles, vec!["admin"]);
        assert_eq!(claims.token_type, "access");
        assert!(claims.has_any_role(&["admin", "editor"]));
        assert!(!claims.has_any_role(&["editor"]));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let manager = test_manager();
        let result = manager.validate_token("not.a.token");
        assert!(matches!(
            result,
            Err(AuthError::MalformedToken) | Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager = test_manager();
        let other = JwtManager::new(&JwtConfig {
            secret: "different-secret".to_string(),
            expiry: 900,
            issuer: "test".to_string(),
        });

        let token = manager.generate_token("1", "bob", Vec::new()).unwrap();
        assert_eq!(
            other.validate_token(&token),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let manager = test_manager();
        let other = JwtManager::new(&JwtConfig {
            secret: "test-secret-key".to_string(),
            expiry: 900,
            issuer: "someone-else".to_string(),
        });

        let token = other.generate_token("1", "bob", Vec::new()).unwrap();
        assert_eq!(
            manager.validate_token(&token),
            Err(AuthError::InvalidIssuer)
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = test_manager();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1".to_string(),
            uid: "1".to_string(),
            username: "bob".to_string(),
            roles: Vec::new(),
            token_type: "access".to_string(),
            iss: "test".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            nbf: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key"),
        )
        .unwrap();

        assert_eq!(manager.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(extract_bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer"));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
