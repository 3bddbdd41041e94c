//! Session, login and venue settings routes.

use super::AppState;
use super::error::ApiMessage;
use super::session::{expired_session_cookie, session_cookie, session_id};
use crate::core::auth;
use crate::core::settings::{self, VenueSettings};
use crate::errors::{Error, Result};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Session state handed to the browser
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    /// Whether the admin is logged in on this session
    pub authenticated: bool,
    /// Token to send back in `X-CSRF-Token`
    pub csrf_token: String,
}

/// Body of `POST /api/login`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Admin username
    pub username: String,
    /// Admin password, plain text over the wire
    pub password: String,
}

/// Reply to a successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Always true
    pub success: bool,
    /// Human-readable confirmation
    pub message: String,
    /// Fresh anti-forgery token for this session
    pub csrf_token: String,
}

/// `GET /api/session`: returns (and if needed, starts) the caller's session.
pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, info) = state
        .sessions
        .with_session(session_id(&headers), |s| SessionInfo {
            authenticated: s.authenticated,
            csrf_token: s.csrf_token.clone(),
        })
        .await;

    ([(header::SET_COOKIE, session_cookie(id))], Json(info)).into_response()
}

/// `POST /api/login`
///
/// The password is checked before the session store is locked. The session
/// cookie is set on failure too, so the failure count sticks to it.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Response {
    let requested = session_id(&headers);

    // A locked-out session gets no more password checks
    let locked = match requested {
        Some(id) => state
            .sessions
            .get(id)
            .await
            .is_some_and(|s| s.is_locked_out()),
        None => false,
    };
    let verified = if locked {
        false
    } else {
        match auth::verify_in_background(
            Arc::clone(&state.admin),
            request.username,
            request.password,
        )
        .await
        {
            Ok(verified) => verified,
            Err(e) => return e.into_response(),
        }
    };

    let (id, outcome) = state
        .sessions
        .with_session(requested, |s| {
            s.record_login(verified).map(|()| s.csrf_token.clone())
        })
        .await;

    let cookie = [(header::SET_COOKIE, session_cookie(id))];
    match outcome {
        Ok(csrf_token) => (
            cookie,
            Json(LoginResponse {
                success: true,
                message: "Logged in".to_string(),
                csrf_token,
            }),
        )
            .into_response(),
        Err(e) => (cookie, e).into_response(),
    }
}

/// `POST /api/logout`: forgets the session, including its failure count.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.remove(id).await;
    }
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(ApiMessage::ok("Logged out")),
    )
        .into_response()
}

/// `GET /api/settings`
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<VenueSettings>> {
    Ok(Json(settings::get_all_settings(&state.db).await?))
}

/// `POST /api/settings` (admin): overwrites the given keys.
pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<BTreeMap<String, String>>, JsonRejection>,
) -> Result<Json<ApiMessage>> {
    state.sessions.require_admin(&headers).await?;

    let Json(updates) = payload.map_err(|e| Error::InvalidRequest {
        message: e.body_text(),
    })?;
    let changed = settings::update_settings(&state.db, &updates).await?;
    Ok(Json(ApiMessage::ok(format!("{changed} settings updated"))))
}
