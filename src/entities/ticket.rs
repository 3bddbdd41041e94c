//! Ticket entity - One customer's place in the queue.
//!
//! `ticket_number` comes from the sequence allocator and never changes after insert.
//! `status` holds one of `waiting`, `called`, `seated`, `cancelled` as text; see
//! [`crate::core::ticket::TicketStatus`] for the typed view.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ticket database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    /// Row identifier, never reused
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Number shown to the customer
    pub ticket_number: i64,
    /// Number of people in the party
    pub party_size: i32,
    /// Lifecycle state
    pub status: String,
    /// When the ticket was drawn
    pub created_at: DateTimeUtc,
}

/// Tickets have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
