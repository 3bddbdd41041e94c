//! Shared test utilities.
//!
//! Helpers for setting up test databases and drawing tickets without going
//! through the party size parser.

use crate::{
    config::database::{connect, create_tables},
    core::sequence,
    entities,
    errors::Result,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction,
    TransactionTrait,
};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness so it shows up only for failing tests.
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool is pinned to one connection: every new `:memory:` connection would
/// otherwise open a separate, empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed database at `path` with a real connection pool.
///
/// Use this when a test needs several connections contending for the write lock.
pub async fn setup_file_test_db(path: &Path, max_connections: u32) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(max_connections)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Opens a second handle onto an existing file database, as a restarted process would.
pub async fn reopen_file_test_db(path: &Path) -> Result<DatabaseConnection> {
    let db = connect(&format!("sqlite://{}?mode=rwc", path.display())).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Opens a single-connection handle onto the file database at `path` that waits at
/// most `busy_timeout` for a lock held by someone else.
///
/// `PRAGMA busy_timeout` is per connection, so the pool is pinned to exactly one.
pub async fn setup_impatient_file_db(
    path: &Path,
    busy_timeout: Duration,
) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    db.execute_unprepared(&format!(
        "PRAGMA busy_timeout = {}",
        busy_timeout.as_millis()
    ))
    .await?;
    Ok(db)
}

/// Begins a transaction that takes the database write lock and keeps it until the
/// returned transaction is committed or dropped.
pub async fn hold_write_lock(db: &DatabaseConnection) -> Result<DatabaseTransaction> {
    let txn = db.begin().await?;
    txn.execute_unprepared("UPDATE ticket_sequence SET last_number = last_number + 1")
        .await?;
    Ok(txn)
}

/// Draws a ticket for `party_size` guests.
pub async fn create_test_ticket(
    db: &DatabaseConnection,
    party_size: i32,
) -> Result<entities::ticket::Model> {
    sequence::allocate(db, party_size).await
}
