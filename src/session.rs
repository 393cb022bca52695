//! Resolves the caller of a request.
//!
//! The `Authorization` header is forwarded verbatim to an
//! [`IdentityProvider`]; nothing is cached, every request resolves afresh.
//! A missing header and a rejected one both yield an anonymous [`Session`].
use std::{collections::HashMap, convert::Infallible, fmt};

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{error::ApiError, ids::UserId, AppState};

/// Raw `Authorization` header value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Empty and non-UTF-8 values count as absent.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token with any `Bearer ` scheme prefix removed.
    pub fn token(&self) -> &str {
        let value = self.0.trim();
        value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .unwrap_or(value)
            .trim()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity service rejected the credential with {0}")]
    Rejected(StatusCode),

    #[error("identity service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unknown credential")]
    Unknown,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_for(&self, credential: &Credential) -> Result<UserId, AuthError>;
}

/// Hosted auth service (GoTrue API): `GET {base}/auth/v1/user`.
pub struct SupabaseIdentity {
    client: reqwest::Client,
    user_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct AuthUser {
    id: Uuid,
}

impl SupabaseIdentity {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn user_for(&self, credential: &Credential) -> Result<UserId, AuthError> {
        let response = self
            .client
            .get(&self.user_url)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, credential.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status));
        }

        let user: AuthUser = response.json().await?;
        Ok(UserId::new(user.id))
    }
}

/// Fixed token table, for running without the hosted service.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, UserId>,
}

impl StaticIdentity {
    pub fn new(tokens: impl IntoIterator<Item = (String, UserId)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn user_for(&self, credential: &Credential) -> Result<UserId, AuthError> {
        self.tokens
            .get(credential.token())
            .copied()
            .ok_or(AuthError::Unknown)
    }
}

/// Outcome of resolving a request's credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<UserId>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    pub async fn resolve(identity: &dyn IdentityProvider, headers: &HeaderMap) -> Self {
        let Some(credential) = Credential::from_headers(headers) else {
            return Self::anonymous();
        };

        match identity.user_for(&credential).await {
            Ok(user) => Self::authenticated(user),
            Err(err) => {
                debug!(%err, "credential not accepted");
                Self::anonymous()
            }
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<UserId, ApiError> {
        self.user.ok_or(ApiError::Unauthorized)
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session::resolve(state.identity.as_ref(), &parts.headers).await)
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn credential_is_taken_verbatim() {
        let credential = Credential::from_headers(&headers("Bearer abc.def")).unwrap();
        assert_eq!(credential.as_str(), "Bearer abc.def");
        assert_eq!(credential.token(), "abc.def");
        assert_eq!(Credential::new("abc").token(), "abc");
    }

    #[test]
    fn empty_header_is_absent() {
        assert!(Credential::from_headers(&headers("")).is_none());
        assert!(Credential::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let rendered = format!("{:?}", Credential::new("Bearer secret"));
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn resolves_known_tokens_only() {
        let user = UserId::new(Uuid::new_v4());
        let identity = StaticIdentity::new([("good".to_string(), user)]);

        let session = Session::resolve(&identity, &headers("Bearer good")).await;
        assert_eq!(session.require_user().unwrap(), user);

        let session = Session::resolve(&identity, &headers("Bearer bad")).await;
        assert!(matches!(session.require_user(), Err(ApiError::Unauthorized)));

        let session = Session::resolve(&identity, &HeaderMap::new()).await;
        assert_eq!(session, Session::anonymous());
    }

    #[test]
    fn supabase_user_url_tolerates_trailing_slash() {
        let identity = SupabaseIdentity::new("https://example.supabase.co/", "anon");
        assert_eq!(identity.user_url, "https://example.supabase.co/auth/v1/user");
    }
}
