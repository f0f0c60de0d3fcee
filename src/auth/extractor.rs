// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for session credentials and client metadata.
//!
//! Use the `Auth` extractor in handlers to require a valid session:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(session): Auth) -> impl IntoResponse {
//!     // session is SessionInfo
//! }
//! ```
//!
//! The token is read from `Authorization: Bearer <token>` first and from
//! the `session_token` cookie otherwise. A present but malformed header is
//! rejected rather than falling back to the cookie.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{AUTHORIZATION, USER_AGENT},
        request::Parts,
        HeaderMap,
    },
};
use axum_extra::extract::cookie::CookieJar;

use super::error::AuthError;
use super::protocol::SessionInfo;
use super::run_blocking;
use crate::models::ClientMeta;
use crate::state::AppState;

/// Name of the session cookie set on login.
pub const SESSION_COOKIE: &str = "session_token";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The raw bearer token of the request, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let token = value
                .to_str()
                .map_err(|_| AuthError::InvalidAuthHeader)?
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(AuthError::InvalidAuthHeader)?;
            return Ok(SessionToken(token.to_string()));
        }

        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(SessionToken)
            .ok_or(AuthError::MissingCredentials)
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        SessionToken::from_headers(&parts.headers)
    }
}

/// Extractor for authenticated requests.
///
/// # Example
///
/// ```rust,ignore
/// async fn current_session(Auth(session): Auth) -> Json<SessionInfoResponse> {
///     // session.user_id, session.address
/// }
/// ```
pub struct Auth(pub SessionInfo);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // First check if an earlier extractor already validated the session
        if let Some(session) = parts.extensions.get::<SessionInfo>().cloned() {
            return Ok(Auth(session));
        }

        let SessionToken(token) = SessionToken::from_headers(&parts.headers)?;
        let auth = state.auth.clone();
        let session = run_blocking(move || auth.validate_session(&token)).await?;

        parts.extensions.insert(session.clone());
        Ok(Auth(session))
    }
}

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);
        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(ClientMeta {
            ip_address: forwarded.or_else(peer),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::protocol::tests::{memory_harness, signed_attempt, test_config};
    use crate::auth::signature::tests::test_key;
    use crate::config::AppConfig;
    use axum::http::Request;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/session");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn state_with_session() -> (AppState, String) {
        let h = memory_harness(test_config());
        let (_, attempt) = signed_attempt(&h.protocol, &test_key(21));
        let login = h
            .protocol
            .verify_and_login(&attempt, &ClientMeta::default(), &CancellationToken::new())
            .unwrap();
        let config = AppConfig::from_lookup(|_| None).unwrap();
        (AppState::new(h.protocol.clone(), Arc::new(config)), login.session_token)
    }

    #[test]
    fn header_beats_cookie() {
        let headers = parts(&[
            ("Authorization", "Bearer from-header"),
            ("Cookie", "session_token=from-cookie"),
        ])
        .headers;
        assert_eq!(
            SessionToken::from_headers(&headers).unwrap().0,
            "from-header"
        );
    }

    #[test]
    fn cookie_is_used_without_header() {
        let headers = parts(&[("Cookie", "theme=dark; session_token=abc")]).headers;
        assert_eq!(SessionToken::from_headers(&headers).unwrap().0, "abc");
    }

    #[test]
    fn malformed_or_missing_credentials() {
        let basic = parts(&[("Authorization", "Basic dXNlcg==")]).headers;
        assert_eq!(
            SessionToken::from_headers(&basic),
            Err(AuthError::InvalidAuthHeader)
        );
        assert_eq!(
            SessionToken::from_headers(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
    }

    #[tokio::test]
    async fn auth_extractor_validates_session() {
        let (state, token) = state_with_session();
        let bearer = format!("Bearer {token}");
        let mut request = parts(&[("Authorization", bearer.as_str())]);

        let Auth(session) = Auth::from_request_parts(&mut request, &state).await.unwrap();
        assert!(request.extensions.get::<SessionInfo>().is_some());

        state.auth.revoke_session(&token).unwrap();
        let cookie = format!("session_token={token}");
        let mut fresh = parts(&[("Cookie", cookie.as_str())]);
        let result = Auth::from_request_parts(&mut fresh, &state).await;
        assert!(matches!(result, Err(AuthError::SessionRevoked)));
        assert!(session.user_id > 0);
    }

    #[tokio::test]
    async fn client_meta_prefers_forwarded_for() {
        let mut with_proxy = parts(&[
            ("X-Forwarded-For", "203.0.113.9, 10.0.0.1"),
            ("User-Agent", "wallet/2.0"),
        ]);
        with_proxy
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        let meta = ClientMeta::from_request_parts(&mut with_proxy, &()).await.unwrap();
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("wallet/2.0"));

        let mut direct = parts(&[]);
        direct
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        let meta = ClientMeta::from_request_parts(&mut direct, &()).await.unwrap();
        assert_eq!(meta.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(meta.user_agent.is_none());
    }
}
