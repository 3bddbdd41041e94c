//! Sequence allocator - Issues ticket numbers.
//!
//! The counter lives in a single row of `ticket_sequence`. Allocation opens a
//! transaction whose *first* statement is
//! `UPDATE ticket_sequence SET last_number = last_number + 1`, so the store's write
//! lock is held before anything is read. The incremented value is then read back
//! and the ticket row inserted under the same lock, and the whole unit commits or
//! rolls back together. Concurrent allocators serialize on that lock; none of them
//! can observe a stale counter, and a failed insert never burns a number.
//!
//! The next number is never derived from `MAX(ticket_number)`.

use crate::{
    entities::{Ticket, TicketSequence, ticket, ticket_sequence},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{DbErr, Set, TransactionTrait, prelude::*};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::ticket::TicketStatus;

/// Attempts made before a contended allocation is reported to the caller.
const ALLOCATION_ATTEMPTS: u32 = 3;

/// Base delay between contended attempts; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Inserts the counter row with value 0 if it does not exist yet.
///
/// Safe to call on every start; an existing counter is left untouched.
pub async fn ensure_counter<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = TicketSequence::find_by_id(ticket_sequence::SEQUENCE_ROW_ID)
        .one(db)
        .await?;

    if existing.is_none() {
        let counter = ticket_sequence::ActiveModel {
            id: Set(ticket_sequence::SEQUENCE_ROW_ID),
            last_number: Set(0),
            updated_at: Set(Utc::now()),
        };
        counter.insert(db).await?;
        info!("Ticket sequence counter initialized at 0");
    }

    Ok(())
}

/// Returns the last issued ticket number (0 if none since the last reset).
pub async fn current_number<C>(db: &C) -> Result<i64>
where
    C: ConnectionTrait,
{
    TicketSequence::find_by_id(ticket_sequence::SEQUENCE_ROW_ID)
        .one(db)
        .await?
        .map(|counter| counter.last_number)
        .ok_or_else(missing_counter)
}

/// Draws the next ticket for a party of `party_size`.
///
/// The returned ticket has been committed before this function returns.
///
/// # Errors
/// - [`Error::InvalidPartySize`] if `party_size` is not positive; nothing is touched.
/// - [`Error::StorageContention`] if the write lock could not be obtained after
///   [`ALLOCATION_ATTEMPTS`] tries; every attempt was rolled back.
/// - [`Error::Database`] for any other storage failure, also rolled back.
#[instrument(skip(db))]
pub async fn allocate(db: &DatabaseConnection, party_size: i32) -> Result<ticket::Model> {
    if party_size <= 0 {
        return Err(Error::InvalidPartySize {
            value: party_size.to_string(),
        });
    }

    let mut attempt = 1;
    loop {
        match allocate_once(db, party_size).await {
            Ok(ticket) => {
                info!(
                    "Issued ticket {} (party of {})",
                    ticket.ticket_number, ticket.party_size
                );
                return Ok(ticket);
            }
            Err(e) if e.is_retryable() && attempt < ALLOCATION_ATTEMPTS => {
                warn!("Allocation attempt {} contended: {}", attempt, e);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn allocate_once(db: &DatabaseConnection, party_size: i32) -> Result<ticket::Model> {
    // Dropping `txn` on any early return rolls back both the counter and the insert
    let txn = db.begin().await?;

    let ticket_number = advance_counter(&txn).await?;

    let new_ticket = ticket::ActiveModel {
        ticket_number: Set(ticket_number),
        party_size: Set(party_size),
        status: Set(TicketStatus::Waiting.as_str().to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let inserted = new_ticket.insert(&txn).await?;

    txn.commit().await?;
    Ok(inserted)
}

/// Increments the counter and returns the new value.
///
/// Must run inside the transaction that consumes the number.
async fn advance_counter<C>(txn: &C) -> Result<i64>
where
    C: ConnectionTrait,
{
    // Write first: the lock is taken before the value is read
    let updated = TicketSequence::update_many()
        .col_expr(
            ticket_sequence::Column::LastNumber,
            Expr::col(ticket_sequence::Column::LastNumber).add(1),
        )
        .col_expr(ticket_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(ticket_sequence::Column::Id.eq(ticket_sequence::SEQUENCE_ROW_ID))
        .exec(txn)
        .await?;

    if updated.rows_affected != 1 {
        return Err(missing_counter());
    }

    let number = current_number(txn).await?;
    debug!("Sequence advanced to {}", number);
    Ok(number)
}

/// Deletes every ticket and rewinds the counter to 0 in one transaction.
#[instrument(skip(db))]
pub async fn reset(db: &DatabaseConnection) -> Result<u64> {
    let txn = db.begin().await?;

    // Counter first, so the write lock is held before the delete
    let updated = TicketSequence::update_many()
        .col_expr(ticket_sequence::Column::LastNumber, Expr::value(0))
        .col_expr(ticket_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(ticket_sequence::Column::Id.eq(ticket_sequence::SEQUENCE_ROW_ID))
        .exec(&txn)
        .await?;
    if updated.rows_affected != 1 {
        return Err(missing_counter());
    }

    let deleted = Ticket::delete_many().exec(&txn).await?;

    txn.commit().await?;
    info!("Queue reset, {} tickets removed", deleted.rows_affected);
    Ok(deleted.rows_affected)
}

fn missing_counter() -> Error {
    Error::Database(DbErr::RecordNotFound(
        "ticket sequence counter row".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_allocate_rejects_non_positive_party_size() -> Result<()> {
        let db = setup_test_db().await?;

        for bad in [0, -3, i32::MIN] {
            let result = allocate(&db, bad).await;
            assert!(matches!(result, Err(Error::InvalidPartySize { .. })));
        }

        assert_eq!(current_number(&db).await?, 0);
        assert_eq!(Ticket::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_first_ticket_is_number_one() -> Result<()> {
        let db = setup_test_db().await?;

        let ticket = allocate(&db, 4).await?;

        assert_eq!(ticket.ticket_number, 1);
        assert_eq!(ticket.party_size, 4);
        assert_eq!(ticket.status, "waiting");
        assert_eq!(current_number(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_numbers_increase_by_one() -> Result<()> {
        let db = setup_test_db().await?;

        let mut numbers = Vec::new();
        for size in 1..=5 {
            numbers.push(allocate(&db, size).await?.ticket_number);
        }

        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_party_size_leaves_counter_alone() -> Result<()> {
        let db = setup_test_db().await?;
        allocate(&db, 2).await?;

        assert!(allocate(&db, 0).await.is_err());
        assert!(allocate(&db, -3).await.is_err());

        assert_eq!(current_number(&db).await?, 1);
        assert_eq!(allocate(&db, 2).await?.ticket_number, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_restarts_sequence() -> Result<()> {
        let db = setup_test_db().await?;
        for _ in 0..3 {
            allocate(&db, 2).await?;
        }

        let removed = reset(&db).await?;

        assert_eq!(removed, 3);
        assert_eq!(current_number(&db).await?, 0);
        assert_eq!(Ticket::find().count(&db).await?, 0);
        assert_eq!(allocate(&db, 1).await?.ticket_number, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_reset() -> Result<()> {
        let db = setup_test_db().await?;
        let before = allocate(&db, 2).await?;
        reset(&db).await?;

        let after = allocate(&db, 2).await?;

        assert_eq!(after.ticket_number, 1);
        assert!(after.id > before.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_counter() -> Result<()> {
        let db = setup_test_db().await?;
        allocate(&db, 2).await?;

        // Advance the counter, then abandon the transaction without committing
        {
            let txn = db.begin().await?;
            let number = advance_counter(&txn).await?;
            assert_eq!(number, 2);
            txn.rollback().await?;
        }

        assert_eq!(current_number(&db).await?, 1);
        assert_eq!(allocate(&db, 2).await?.ticket_number, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_counter_does_not_overwrite() -> Result<()> {
        let db = setup_test_db().await?;
        allocate(&db, 2).await?;

        ensure_counter(&db).await?;

        assert_eq!(current_number(&db).await?, 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_unique_and_gapless() -> Result<()> {
        let db = setup_test_db().await?;
        let n: i64 = 40;

        let mut handles = Vec::new();
        for i in 0..n {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                allocate(&db, i32::try_from(i % 6 + 1).unwrap()).await
            }));
        }

        let mut numbers = BTreeSet::new();
        for handle in handles {
            let ticket = handle.await.unwrap()?;
            assert!(numbers.insert(ticket.ticket_number), "duplicate number issued");
        }

        assert_eq!(numbers, (1..=n).collect::<BTreeSet<_>>());
        assert_eq!(current_number(&db).await?, n);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_across_connections() -> Result<()> {
        // A file-backed store gives every pooled connection its own SQLite handle,
        // so allocators really do race for the write lock
        let dir = tempfile::tempdir()?;
        let db = setup_file_test_db(&dir.path().join("queue.sqlite"), 8).await?;
        let n: i64 = 24;

        let mut handles = Vec::new();
        for _ in 0..n {
            let db = db.clone();
            handles.push(tokio::spawn(async move { allocate(&db, 2).await }));
        }

        let mut numbers = BTreeSet::new();
        for handle in handles {
            let ticket = handle.await.unwrap()?;
            assert!(numbers.insert(ticket.ticket_number), "duplicate number issued");
        }

        assert_eq!(numbers, (1..=n).collect::<BTreeSet<_>>());
        assert_eq!(Ticket::find().count(&db).await?, u64::try_from(n).unwrap());
        Ok(())
    }

    #[tokio::test]
    async fn test_sequence_survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("queue.sqlite");
        {
            let db = setup_file_test_db(&path, 2).await?;
            allocate(&db, 2).await?;
            allocate(&db, 3).await?;
            db.close().await?;
        }

        let db = reopen_file_test_db(&path).await?;

        assert_eq!(current_number(&db).await?, 2);
        assert_eq!(allocate(&db, 1).await?.ticket_number, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_timeout_is_contention_and_rolls_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("queue.sqlite");
        let holder = setup_file_test_db(&path, 1).await?;
        let db = setup_impatient_file_db(&path, Duration::from_millis(50)).await?;
        allocate(&db, 2).await?;

        let lock = hold_write_lock(&holder).await?;
        let result = allocate(&db, 4).await;
        lock.rollback().await?;

        assert!(matches!(result, Err(Error::StorageContention { .. })));
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(current_number(&db).await?, 1);
        assert_eq!(Ticket::find().count(&db).await?, 1);

        // Once the lock is released numbering continues without a gap
        assert_eq!(allocate(&db, 4).await?.ticket_number, 2);
        Ok(())
    }
}
