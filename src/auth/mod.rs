pub mod password;

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request header carrying the access token
pub const AUTHENTICATION_HEADER: &str = "Authentication";

/// User id of anonymous requests
pub const GUEST_USER_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: u64, session_id: Option<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            user_id,
            session_id,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("Missing {} header", AUTHENTICATION_HEADER)]
    MissingHeader,

    #[error("{} header must use bearer token format", AUTHENTICATION_HEADER)]
    InvalidFormat,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token secret not configured")]
    InvalidSecret,

    #[error("Token generation error: {0}")]
    TokenGeneration(String),
}

/// The user a request acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: u64,
    pub session_id: Option<String>,
}

impl Principal {
    pub fn guest() -> Self {
        Self {
            user_id: GUEST_USER_ID,
            session_id: None,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id == GUEST_USER_ID
    }
}

/// Resolves the principal of a request from its headers
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError>;
}

/// HS256 tokens signed with a shared secret
pub struct TokenAuthenticator {
    key: DecodingKey,
    allow_guest: bool,
}

impl TokenAuthenticator {
    pub fn new(secret: &str, allow_guest: bool) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            allow_guest,
        })
    }

    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.key, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(token_data.claims)
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let Some(header) = headers.get(AUTHENTICATION_HEADER) else {
            return if self.allow_guest {
                Ok(Principal::guest())
            } else {
                Err(AuthError::MissingHeader)
            };
        };

        let token = extract_token(header.to_str().map_err(|_| AuthError::InvalidFormat)?)?;
        let claims = self.decode(token)?;
        tracing::debug!("Authenticated user {}", claims.user_id);
        Ok(Principal {
            user_id: claims.user_id,
            session_id: claims.session_id,
        })
    }
}

/// Strip the case-insensitive `bearer` prefix
fn extract_token(value: &str) -> Result<&str, AuthError> {
    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::InvalidFormat)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidFormat);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }
    Ok(token)
}

pub fn generate_token(secret: &str, claims: &Claims) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHENTICATION_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = generate_token(SECRET, &Claims::new(7, Some("s1".to_string()), 1)).unwrap();
        let auth = TokenAuthenticator::new(SECRET, false).unwrap();

        let principal = auth.authenticate(&headers(&format!("bearer {}", token))).await.unwrap();
        assert_eq!(principal.user_id, 7);
        assert_eq!(principal.session_id.as_deref(), Some("s1"));

        let principal = auth.authenticate(&headers(&format!("Bearer {}", token))).await.unwrap();
        assert_eq!(principal.user_id, 7);
    }

    #[tokio::test]
    async fn test_claims_use_camel_case() {
        let claims = Claims::new(3, None, 1);
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["userId"], 3);
        assert!(value.get("sessionId").is_none());
    }

    #[tokio::test]
    async fn test_missing_header() {
        let guest = TokenAuthenticator::new(SECRET, true).unwrap();
        assert_eq!(guest.authenticate(&HeaderMap::new()).await, Ok(Principal::guest()));

        let strict = TokenAuthenticator::new(SECRET, false).unwrap();
        assert_eq!(strict.authenticate(&HeaderMap::new()).await, Err(AuthError::MissingHeader));
    }

    #[tokio::test]
    async fn test_rejects_bad_tokens() {
        let auth = TokenAuthenticator::new(SECRET, true).unwrap();
        assert_eq!(auth.authenticate(&headers("token abc")).await, Err(AuthError::InvalidFormat));
        assert!(matches!(
            auth.authenticate(&headers("bearer not-a-jwt")).await,
            Err(AuthError::InvalidToken(_))
        ));

        let foreign = generate_token("other-secret", &Claims::new(7, None, 1)).unwrap();
        assert!(matches!(
            auth.authenticate(&headers(&format!("bearer {}", foreign))).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let mut claims = Claims::new(7, None, 1);
        claims.exp = Utc::now().timestamp() - 3600;
        let token = generate_token(SECRET, &claims).unwrap();
        let auth = TokenAuthenticator::new(SECRET, true).unwrap();
        assert!(matches!(
            auth.authenticate(&headers(&format!("bearer {}", token))).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_empty_secret() {
        assert!(matches!(TokenAuthenticator::new("", true), Err(AuthError::InvalidSecret)));
    }
}
