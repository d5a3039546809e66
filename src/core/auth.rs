//! Authentication and scope-based authorization
//!
//! Callers log in with mail and password and receive an HS256 bearer token
//! carrying their scopes. Every resource route extracts an [`AuthContext`]
//! from that token and checks a single required scope with
//! [`AuthContext::authorize`]. The `admin` scope satisfies every check.

use crate::core::error::{ManagerError, ManagerResult};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Scope that bypasses every scope check
pub const ADMIN_SCOPE: &str = "admin";

/// Hex-encoded SHA-512 digest of a password
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse a stored scope string ("admin, user event") into a set
pub fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    pub user_mail: String,
    pub scopes: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies access tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenService {
    /// Create a service signing with HS256 and the given secret
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Sign a token for a user
    pub fn issue(&self, user_id: i64, mail: &str, scopes: &BTreeSet<String>) -> ManagerResult<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            user_mail: mail.to_string(),
            scopes: scopes.iter().cloned().collect(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ManagerError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature and expiry and return the claims
    pub fn verify(&self, token: &str) -> ManagerResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => ManagerError::unauthorized("Token has expired"),
                    _ => ManagerError::unauthorized("Could not validate credentials"),
                }
            })
    }
}

/// Identity and scopes of an authenticated caller
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: i64,
    pub mail: String,
    pub scopes: BTreeSet<String>,
}

impl AuthContext {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            mail: claims.user_mail,
            scopes: claims.scopes.into_iter().collect(),
        }
    }

    /// Check if the caller holds the admin scope
    pub fn is_admin(&self) -> bool {
        self.scopes.contains(ADMIN_SCOPE)
    }

    /// Succeeds if the caller is admin or holds `required_scope`
    pub fn authorize(&self, required_scope: &str) -> ManagerResult<()> {
        if self.is_admin() || self.scopes.contains(required_scope) {
            return Ok(());
        }
        tracing::warn!(
            user_id = self.user_id,
            scope = required_scope,
            "rejected request lacking scope"
        );
        Err(ManagerError::forbidden(format!(
            "Missing required scope '{}'",
            required_scope
        )))
    }
}

/// Extract the raw token from an `Authorization: Bearer ...` header
pub fn bearer_token(parts: &Parts) -> ManagerResult<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ManagerError::unauthorized("Not authenticated"))?
        .to_str()
        .map_err(|_| ManagerError::unauthorized("Malformed authorization header"))?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ManagerError::unauthorized("Expected a bearer token")),
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ManagerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);
        let claims = tokens.verify(bearer_token(parts)?)?;
        Ok(AuthContext::from_claims(claims))
    }
}
