//! # Service Module
//!
//! The transactional services of the ledger:
//!
//! - [`sale::SaleProcessor`] - commits and voids multi-line sales
//! - [`purchase::PurchaseProcessor`] - commits supplier intake
//! - [`layaway::LayawayEngine`] - plan creation, abonos, cancellation
//!
//! Every mutating operation here runs as one SQLite transaction: either all
//! line mutations and the record inserts commit, or none do. Services hold a
//! cloned [`Database`](crate::pool::Database) handle and are constructed via
//! its accessors.
//!
//! ## Conflict Retry
//! SQLite rejects a transaction that read under a snapshot another writer
//! has since moved past (SQLITE_BUSY on upgrade). That is contention, not a
//! business failure, so [`with_conflict_retry`] replays the attempt a
//! bounded number of times before surfacing `ConflictRetryExhausted`.
//! Business errors pass through on the first occurrence, untouched.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{DbError, LedgerError, LedgerResult};

pub mod layaway;
pub mod purchase;
pub mod sale;

/// Maximum transparent replays of a contended write transaction.
pub(crate) const MAX_CONFLICT_RETRIES: u32 = 3;

/// Base backoff between replays; grows linearly with the attempt number.
pub(crate) const CONFLICT_BACKOFF: Duration = Duration::from_millis(25);

/// Runs a write transaction, replaying it on writer contention.
///
/// The closure must build a fresh transaction per call: each attempt starts
/// from a new snapshot, which is exactly what resolves the conflict.
pub(crate) async fn with_conflict_retry<T, F, Fut>(operation: &str, mut attempt_fn: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match attempt_fn().await {
            Err(LedgerError::Db(err)) if err.is_conflict() => {
                attempt += 1;
                if attempt > MAX_CONFLICT_RETRIES {
                    return Err(DbError::ConflictRetryExhausted { attempts: attempt }.into());
                }
                warn!(operation, attempt, "write conflict, retrying");
                tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
            }
            other => return other,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
