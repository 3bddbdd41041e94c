//! Ticket sequence entity - Singleton counter holding the last issued ticket number.
//! Only the allocator and the queue reset write to it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Primary key of the one and only counter row.
pub const SEQUENCE_ROW_ID: i32 = 1;

/// Ticket sequence database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_sequence")]
pub struct Model {
    /// Always [`SEQUENCE_ROW_ID`]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// Last ticket number handed out, 0 when the queue is empty after a reset
    pub last_number: i64,
    /// When the counter last moved
    pub updated_at: DateTimeUtc,
}

/// The counter has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
