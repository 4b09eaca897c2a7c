use crate::auth::AuthFailure;
use crate::errors::ApiError;
use crate::handlers::AppState;
use crate::loader::Loaders;
use crate::models::Person;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use std::net::SocketAddr;
use std::sync::Arc;

/// Everything a handler needs that is derived per request: the acting
/// identity (if any), its privilege tier, the reason identity resolution
/// failed, a fresh loader pair, and the rate-limit client key.
///
/// Construction order is fixed: rate check first (request-fatal), then
/// identity resolution (never fatal by itself — handlers decide at the leaf
/// whether an identity is required), then loader instantiation.
pub struct RequestContext {
    pub person: Option<Person>,
    pub is_admin: bool,
    pub auth_failure: Option<AuthFailure>,
    pub loaders: Loaders,
    pub client_key: String,
}

impl RequestContext {
    /// Per-leaf authorization gate: yields the resolved person or the
    /// structured unauthenticated error carrying the specific cause.
    pub fn require_person(&self) -> Result<&Person, ApiError> {
        self.person.as_ref().ok_or_else(|| {
            ApiError::Unauthenticated(self.auth_failure.unwrap_or(AuthFailure::MissingHeader))
        })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let client_key = client_key(parts);
        state.rate_limiter.check(&client_key)?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let (person, auth_failure) = match state.auth.resolve_identity(auth_header) {
            Ok(person) => (Some(person), None),
            Err(failure) => (None, Some(failure)),
        };
        let is_admin = person
            .as_ref()
            .map(|p| state.auth.is_admin(p))
            .unwrap_or(false);

        if state.config.log_auth {
            tracing::debug!(
                client_key = %client_key,
                person_id = person.as_ref().map(|p| p.id),
                is_admin,
                failure = auth_failure.map(|f| f.reason()),
                "Request context built"
            );
        }

        Ok(Self {
            person,
            is_admin,
            auth_failure,
            loaders: Loaders::new(Arc::clone(&state.store)),
            client_key,
        })
    }
}

/// Rate-limit key: explicit API key header, else peer address, else a shared
/// anonymous bucket.
fn client_key(parts: &Parts) -> String {
    if let Some(key) = parts.headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        if !key.is_empty() {
            return key.to_string();
        }
    }
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    "anon".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(builder: axum::http::request::Builder) -> Parts {
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn api_key_header_wins_over_peer_address() {
        let mut parts = parts_for(Request::builder().header("x-api-key", "partner-7"));
        parts.extensions.insert(ConnectInfo(SocketAddr::from((
            [10, 0, 0, 1],
            55000,
        ))));
        assert_eq!(client_key(&parts), "partner-7");
    }

    #[test]
    fn peer_address_used_without_api_key() {
        let mut parts = parts_for(Request::builder());
        parts.extensions.insert(ConnectInfo(SocketAddr::from((
            [10, 0, 0, 1],
            55000,
        ))));
        assert_eq!(client_key(&parts), "10.0.0.1");
    }

    #[test]
    fn anonymous_bucket_is_the_last_resort() {
        let parts = parts_for(Request::builder());
        assert_eq!(client_key(&parts), "anon");
    }

    #[test]
    fn empty_api_key_falls_through() {
        let parts = parts_for(Request::builder().header("x-api-key", ""));
        assert_eq!(client_key(&parts), "anon");
    }
}
