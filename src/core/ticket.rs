//! Ticket business logic - Status machine, queue listing and ticket intake.
//!
//! Status lifecycle:
//!
//! ```text
//! waiting ──> called ──> seated
//!    │  <──(re-queue)──┘    │
//!    └──────> cancelled <───┘ (from waiting or called)
//! ```
//!
//! `seated` and `cancelled` are terminal. The table is enforced against the
//! stored status, and the write is a compare-and-set on that status, so two staff
//! members acting on the same ticket cannot both succeed with conflicting moves.

use crate::{
    core::sequence,
    entities::{Ticket, ticket},
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Lifecycle state of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// In line, not yet called
    Waiting,
    /// Called to the counter
    Called,
    /// Party has been seated (terminal)
    Seated,
    /// Ticket abandoned (terminal)
    Cancelled,
}

impl TicketStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 4] = [Self::Waiting, Self::Called, Self::Seated, Self::Cancelled];

    /// Stored text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::Seated => "seated",
            Self::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal status
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Seated | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Called | Self::Cancelled)
                | (Self::Called, Self::Waiting | Self::Seated | Self::Cancelled)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidStatus {
                value: s.to_string(),
            })
    }
}

/// The public view of the queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    /// Tickets still waiting, oldest first
    pub waiting: Vec<ticket::Model>,
    /// Tickets that have been called, oldest first
    pub called: Vec<ticket::Model>,
    /// Length of `waiting`
    pub total_waiting: usize,
}

/// Validates a party size as received from a client.
///
/// Accepts a positive JSON integer or a string made only of ASCII digits with a
/// positive value. Everything else, including floats, signs, whitespace, booleans
/// and null, is rejected.
///
/// # Errors
/// Returns [`Error::InvalidPartySize`] carrying the raw input.
pub fn parse_party_size(raw: &JsonValue) -> Result<i32> {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<i64>().ok()
        }
        _ => None,
    };

    parsed
        .and_then(|n| i32::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| Error::InvalidPartySize {
            value: raw.to_string(),
        })
}

/// Validates the raw party size and draws a ticket for it.
///
/// # Errors
/// [`Error::InvalidPartySize`] before touching the store, otherwise whatever
/// [`sequence::allocate`] reports.
pub async fn take_ticket(db: &DatabaseConnection, raw_party_size: &JsonValue) -> Result<ticket::Model> {
    let party_size = parse_party_size(raw_party_size)?;
    sequence::allocate(db, party_size).await
}

/// Retrieves a ticket by its row id.
pub async fn get_ticket(db: &DatabaseConnection, ticket_id: i64) -> Result<Option<ticket::Model>> {
    Ticket::find_by_id(ticket_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Moves a ticket to `new_status`.
///
/// # Errors
/// - [`Error::InvalidStatus`] for a value outside the four statuses; nothing is read.
/// - [`Error::TicketNotFound`] if no ticket has this id.
/// - [`Error::IllegalTransition`] if the stored status may not move to `new_status`.
/// - [`Error::StorageContention`] if the status changed between read and write.
#[instrument(skip(db))]
pub async fn set_status(
    db: &DatabaseConnection,
    ticket_id: i64,
    new_status: &str,
) -> Result<ticket::Model> {
    let target: TicketStatus = new_status.parse()?;

    let current = Ticket::find_by_id(ticket_id)
        .one(db)
        .await?
        .ok_or(Error::TicketNotFound { id: ticket_id })?;
    let from: TicketStatus = current.status.parse()?;

    if !from.can_transition_to(target) {
        return Err(Error::IllegalTransition {
            from: from.to_string(),
            to: target.to_string(),
        });
    }

    let updated = Ticket::update_many()
        .col_expr(ticket::Column::Status, Expr::value(target.as_str()))
        .filter(ticket::Column::Id.eq(ticket_id))
        .filter(ticket::Column::Status.eq(from.as_str()))
        .exec(db)
        .await?;

    if updated.rows_affected != 1 {
        return Err(Error::StorageContention {
            message: format!("ticket {ticket_id} changed while being updated"),
        });
    }

    info!(
        "Ticket {} (number {}) moved {} -> {}",
        ticket_id, current.ticket_number, from, target
    );
    Ok(ticket::Model {
        status: target.as_str().to_string(),
        ..current
    })
}

/// Lists waiting and called tickets, each ordered by creation time.
///
/// Seated and cancelled tickets stay in the store but are not part of the queue.
#[instrument(skip(db))]
pub async fn list_all(db: &DatabaseConnection) -> Result<QueueSnapshot> {
    let active = Ticket::find()
        .filter(ticket::Column::Status.is_in([
            TicketStatus::Waiting.as_str(),
            TicketStatus::Called.as_str(),
        ]))
        .order_by_asc(ticket::Column::CreatedAt)
        .order_by_asc(ticket::Column::TicketNumber)
        .all(db)
        .await?;

    let (waiting, called): (Vec<_>, Vec<_>) = active
        .into_iter()
        .partition(|t| t.status == TicketStatus::Waiting.as_str());

    debug!("Queue has {} waiting, {} called", waiting.len(), called.len());
    Ok(QueueSnapshot {
        total_waiting: waiting.len(),
        waiting,
        called,
    })
}

/// Clears the queue and restarts numbering at 1.
pub async fn reset_all(db: &DatabaseConnection) -> Result<u64> {
    sequence::reset(db).await
}
