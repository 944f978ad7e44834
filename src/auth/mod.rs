//! Authentication and identity resolution.
//!
//! Bearer JWTs are decoded into an [`AuthUser`] by the auth middleware; the
//! [`scope::IdentityService`] then resolves the caller's capabilities
//! ([`scope::Caller`]) once per request for the workflow engines.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

mod scope;

pub use scope::{Caller, IdentityService};

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub token_id: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": "Unauthorized",
            "message": self.to_string(),
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: String,
    issuer: String,
    audience: String,
    expiration_secs: usize,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        issuer: String,
        audience: String,
        expiration_secs: usize,
    ) -> Self {
        Self {
            jwt_secret,
            issuer,
            audience,
            expiration_secs,
        }
    }
}

/// Validates bearer tokens and mints tokens for known users.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for the given user id.
    pub fn issue_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.expiration_secs as i64,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Decodes and validates a bearer token.
    pub fn validate_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(AuthUser {
            user_id: data.claims.sub,
            token_id: data.claims.jti,
        })
    }
}

/// Axum middleware validating the bearer token and inserting [`AuthUser`]
/// into the request extensions.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let auth_user = auth.validate_token(token)?;
    debug!(user_id = %auth_user.user_id, "Authenticated request");
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            "loomline-api".into(),
            "loomline".into(),
            3600,
        ))
    }

    #[test]
    fn issued_tokens_validate() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.issue_token(user_id).unwrap();
        let auth_user = svc.validate_token(&token).unwrap();
        assert_eq!(auth_user.user_id, user_id.to_string());
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let svc = service();
        assert!(matches!(
            svc.validate_token("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
