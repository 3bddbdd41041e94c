//! Core business logic - framework-agnostic queue, settings and auth operations.

/// Admin credential check and per-session login state
pub mod auth;
/// Ticket number allocation and queue reset
pub mod sequence;
/// Allow-listed venue display settings
pub mod settings;
/// Ticket status machine and queue listing
pub mod ticket;
