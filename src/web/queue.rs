//! Queue routes: read the queue, draw a ticket, move a ticket, reset everything.

use super::AppState;
use super::error::ApiMessage;
use crate::core::ticket::{self, QueueSnapshot};
use crate::errors::{Error, Result};
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of `POST /api/take_ticket`
#[derive(Debug, Deserialize)]
pub struct TakeTicketRequest {
    /// Kept raw so numeric strings from plain forms are accepted too
    #[serde(default)]
    pub party_size: JsonValue,
}

/// Reply to a successful ticket draw
#[derive(Debug, Serialize)]
pub struct TakeTicketResponse {
    /// Always true
    pub success: bool,
    /// The number the customer waits for
    pub ticket_number: i64,
    /// Human-readable confirmation
    pub message: String,
}

/// Body of `POST /api/update_status/{ticket_id}`
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Requested status
    #[serde(default)]
    pub status: String,
}

/// `GET /api/queue`
pub async fn get_queue(State(state): State<AppState>) -> Result<Json<QueueSnapshot>> {
    Ok(Json(ticket::list_all(&state.db).await?))
}

/// `POST /api/take_ticket`
pub async fn take_ticket(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TakeTicketRequest>, JsonRejection>,
) -> Result<Json<TakeTicketResponse>> {
    // An unreadable body is just another invalid party size
    let raw = payload.map_or(JsonValue::Null, |Json(body)| body.party_size);

    let issued = ticket::take_ticket(&state.db, &raw).await?;
    Ok(Json(TakeTicketResponse {
        success: true,
        ticket_number: issued.ticket_number,
        message: format!("Your number is {}.", issued.ticket_number),
    }))
}

/// `POST /api/update_status/{ticket_id}` (admin)
///
/// Path and body are only looked at once the caller is known to be the admin.
pub async fn update_status(
    State(state): State<AppState>,
    ticket_id: std::result::Result<Path<i64>, PathRejection>,
    headers: HeaderMap,
    payload: std::result::Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ApiMessage>> {
    state.sessions.require_admin(&headers).await?;

    let Path(ticket_id) = ticket_id.map_err(|e| Error::InvalidRequest {
        message: e.body_text(),
    })?;
    let Ok(Json(body)) = payload else {
        return Err(Error::InvalidStatus {
            value: String::new(),
        });
    };

    let updated = ticket::set_status(&state.db, ticket_id, &body.status).await?;
    Ok(Json(ApiMessage::ok(format!(
        "Ticket {} is now {}",
        updated.ticket_number, updated.status
    ))))
}

/// `POST /api/reset_queue` (admin)
pub async fn reset_queue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiMessage>> {
    state.sessions.require_admin(&headers).await?;

    let removed = ticket::reset_all(&state.db).await?;
    Ok(Json(ApiMessage::ok(format!(
        "Queue reset, {removed} tickets removed"
    ))))
}
