// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, logout and session endpoints.

use std::time::Duration;

use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tokio_util::sync::CancellationToken;

use crate::auth::{run_blocking, Auth, AuthError, LoginAttempt, SessionToken, SESSION_COOKIE};
use crate::error::ApiError;
use crate::models::{
    ClientMeta, LoginMessageRequest, LoginMessageResponse, LoginRequest, LoginResponse,
    LogoutResponse, SessionInfoResponse,
};
use crate::state::AppState;

/// Request a login challenge.
///
/// Any previously issued, unused challenge for the address stops working.
/// Unknown addresses get a challenge exactly like known ones.
#[utoipa::path(
    post,
    path = "/login/message",
    tag = "Auth",
    request_body = LoginMessageRequest,
    responses(
        (status = 200, description = "Message to sign", body = LoginMessageResponse),
        (status = 400, description = "Malformed wallet address"),
        (status = 503, description = "Storage unavailable, retry later"),
    )
)]
pub async fn request_login_message(
    State(state): State<AppState>,
    Json(request): Json<LoginMessageRequest>,
) -> Result<Json<LoginMessageResponse>, ApiError> {
    let address = request.address;
    if !address.is_well_formed() {
        return Err(ApiError::bad_request("invalid wallet address"));
    }

    let auth = state.auth.clone();
    let issued = run_blocking(move || auth.issue_challenge(&address)).await?;

    Ok(Json(LoginMessageResponse {
        message: issued.message,
        nonce: issued.nonce,
        expires_at: issued.expires_at,
    }))
}

/// Log in with a signed challenge.
///
/// Sets the `session_token` cookie in addition to returning the token.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Malformed wallet address"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Storage unavailable, retry later"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientMeta,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    // Cancelled when this future is dropped, e.g. on client disconnect
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    if !request.address.is_well_formed() {
        return Err(ApiError::bad_request("invalid wallet address"));
    }

    let auth = state.auth.clone();
    let attempt = LoginAttempt::from(request);
    let login = run_blocking(move || auth.verify_and_login(&attempt, &client, &cancel)).await?;
    guard.disarm();

    let cookie = session_cookie(
        &login.session_token,
        state.config.auth.session_ttl,
        state.config.auth.cookie_secure,
    )?;

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user_id: login.user_id,
            address: login.address,
            session_token: login.session_token,
            expires_at: login.expires_at,
        }),
    ))
}

/// Revoke the current session and clear the cookie.
///
/// Revoking an unknown or already revoked token still succeeds.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
        (status = 400, description = "No session token supplied"),
        (status = 401, description = "Malformed authorization header"),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    token: Result<SessionToken, AuthError>,
) -> Result<(CookieJar, Json<LogoutResponse>), ApiError> {
    let SessionToken(token) = match token {
        Ok(token) => token,
        Err(AuthError::MissingCredentials) => {
            return Err(ApiError::bad_request("missing session token"))
        }
        Err(err) => return Err(err.into()),
    };

    let auth = state.auth.clone();
    run_blocking(move || auth.revoke_session(&token)).await?;

    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");
    Ok((jar.remove(removal), Json(LogoutResponse { ok: true })))
}

/// The session behind the request's bearer token or cookie.
#[utoipa::path(
    get,
    path = "/session",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current session", body = SessionInfoResponse),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Storage unavailable, retry later"),
    )
)]
pub async fn current_session(
    State(state): State<AppState>,
    Auth(session): Auth,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let auth = state.auth.clone();
    let lookup = session.clone();
    let user = run_blocking(move || auth.session_user(&lookup)).await?;

    Ok(Json(SessionInfoResponse {
        user_id: session.user_id,
        username: user.username,
        address: session.address,
        expires_at: session.expires_at,
    }))
}

fn session_cookie(token: &str, ttl: Duration, secure: bool) -> Result<Cookie<'static>, ApiError> {
    let mut cookie = Cookie::parse(format!(
        "{SESSION_COOKIE}={token}; Max-Age={}",
        ttl.as_secs()
    ))
    .map_err(|e| ApiError::internal(format!("failed to build session cookie: {e}")))?;
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    Ok(cookie)
}
