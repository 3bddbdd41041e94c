//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables. Each entity has a Model struct
//! for data and an Entity struct for operations.

pub mod setting;
pub mod ticket;
pub mod ticket_sequence;

// Re-export specific types to avoid conflicts
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};
pub use ticket::{Column as TicketColumn, Entity as Ticket, Model as TicketModel};
pub use ticket_sequence::{
    Column as TicketSequenceColumn, Entity as TicketSequence, Model as TicketSequenceModel,
};
