//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models.
//! Creation is idempotent: every statement is `IF NOT EXISTS` and the sequence
//! counter row is only inserted when missing.

use crate::core::sequence;
use crate::entities::{Setting, Ticket, TicketColumn, TicketSequence};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Fallback used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://queue_buddy.sqlite?mode=rwc";

/// How long a request may wait for a pooled connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection pool to the given `SQLite` URL.
///
/// The acquire timeout is bounded so a saturated pool surfaces as a retryable
/// contention error instead of hanging the request.
#[instrument]
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url);
    options
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    debug!("Connected to {}", database_url);
    Ok(db)
}

/// Connects using `DATABASE_URL` (or the default file) and makes sure the schema exists.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let db = connect(&get_database_url()).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Creates all tables, the status index, and the sequence counter row.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut ticket_table = schema.create_table_from_entity(Ticket);
    let mut sequence_table = schema.create_table_from_entity(TicketSequence);
    let mut setting_table = schema.create_table_from_entity(Setting);

    ticket_table.if_not_exists();
    sequence_table.if_not_exists();
    setting_table.if_not_exists();

    db.execute(builder.build(&ticket_table)).await?;
    db.execute(builder.build(&sequence_table)).await?;
    db.execute(builder.build(&setting_table)).await?;

    // The queue read path filters on status and orders by creation time
    let status_index = Index::create()
        .if_not_exists()
        .name("idx_tickets_status_created_at")
        .table(Ticket)
        .col(TicketColumn::Status)
        .col(TicketColumn::CreatedAt)
        .to_owned();
    db.execute(builder.build(&status_index)).await?;

    sequence::ensure_counter(db).await?;

    info!("Database tables ensured.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SettingModel, TicketModel, TicketSequenceModel};
    use crate::test_utils::setup_test_db;
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = setup_test_db().await?;

        // Test that tables exist by querying them
        let _: Vec<TicketModel> = Ticket::find().limit(1).all(&db).await?;
        let _: Vec<SettingModel> = Setting::find().limit(1).all(&db).await?;
        let counters: Vec<TicketSequenceModel> = TicketSequence::find().all(&db).await?;

        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].last_number, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        crate::core::sequence::allocate(&db, 2).await?;

        create_tables(&db).await?;

        let counters: Vec<TicketSequenceModel> = TicketSequence::find().all(&db).await?;
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].last_number, 1, "re-running setup must not reset the counter");
        Ok(())
    }
}
