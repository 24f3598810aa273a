use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;

use tailor_core::{
    plan_next, CounterState, IssuedIdentifier, OrderIdentifier, Period, SequencePreview,
    ORDER_COUNTER_KEY,
};

use crate::to_rfc3339;

/// Creates, advances or restarts the counter in a single statement.
///
/// Period labels are fixed-width `YYYY-MM`, so `MAX` and `>` on the text pick
/// the later month. A current month older than the stored one keeps counting
/// in the stored month.
const ADVANCE_COUNTER: &str = "INSERT INTO sequence_counters \
     (key, period_label, count, issued_total, last_reset_at, updated_at) \
     VALUES (?1, ?2, 1, 1, ?3, ?3) \
     ON CONFLICT(key) DO UPDATE SET \
         count = CASE WHEN excluded.period_label > sequence_counters.period_label \
             THEN 1 ELSE sequence_counters.count + 1 END, \
         last_reset_at = CASE WHEN excluded.period_label > sequence_counters.period_label \
             THEN excluded.last_reset_at ELSE sequence_counters.last_reset_at END, \
         period_label = MAX(sequence_counters.period_label, excluded.period_label), \
         issued_total = sequence_counters.issued_total + 1, \
         updated_at = excluded.updated_at \
     RETURNING period_label, count, issued_total";

/// Repository owning the single monthly order counter row.
///
/// Issuance is one atomic upsert, and SQLite's write lock (with the pool's
/// busy timeout) serializes concurrent issuers, in this process or another
/// one sharing the database file.
#[derive(Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Loads the stored counter, if it was ever created.
    pub async fn load(&self) -> Result<Option<CounterState>, SequenceError> {
        let row = sqlx::query(
            "SELECT period_label, count, last_reset_at FROM sequence_counters WHERE key = ?",
        )
        .bind(ORDER_COUNTER_KEY)
        .fetch_optional(&self.pool)
        .await
        .map_err(SequenceError::StorageUnavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let period = parse_period(row.get("period_label"))?;
        let count = non_negative(row.get("count"), "count")?;
        let last_reset_at: DateTime<Utc> = row
            .try_get("last_reset_at")
            .map_err(|err| SequenceError::CorruptState(err.to_string()))?;

        Ok(Some(CounterState {
            period,
            count,
            last_reset_at,
        }))
    }

    /// Computes what the next issuance would return without writing anything.
    pub async fn preview(&self, current: Period) -> Result<SequencePreview, SequenceError> {
        let stored = self.load().await?;
        Ok(SequencePreview::from(plan_next(stored.as_ref(), current)))
    }

    /// Issues the next identifier and commits the counter on its own.
    ///
    /// Once this returns the identifier is consumed, whether or not the caller
    /// ever stores an order under it.
    pub async fn issue(
        &self,
        current: Period,
        now: DateTime<Utc>,
    ) -> Result<IssuedIdentifier, SequenceError> {
        self.begin_issue(current, now).await?.commit().await
    }

    /// Advances the counter inside a fresh transaction and hands it back.
    ///
    /// The upsert is the transaction's first statement, so a writer that finds
    /// the lock taken waits in SQLite's busy handler rather than failing. The
    /// caller writes whatever depends on the identifier into
    /// [`PendingIssue::transaction`] and then commits; dropping or abandoning
    /// the pending issue rolls the counter back together with those writes.
    pub async fn begin_issue(
        &self,
        current: Period,
        now: DateTime<Utc>,
    ) -> Result<PendingIssue, SequenceError> {
        let started = Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(SequenceError::StorageUnavailable)?;

        let row = sqlx::query(ADVANCE_COUNTER)
            .bind(ORDER_COUNTER_KEY)
            .bind(current.to_string())
            .bind(to_rfc3339(now))
            .fetch_one(&mut *tx)
            .await
            .map_err(SequenceError::StorageUnavailable)?;

        let period = parse_period(row.get("period_label"))?;
        let count = non_negative(row.get("count"), "count")?;
        let issued_total = non_negative(row.get("issued_total"), "issued_total")?;

        Ok(PendingIssue {
            tx,
            issued: IssuedIdentifier {
                identifier: OrderIdentifier::new(count),
                period,
                reset: count == 1 && issued_total > 1,
            },
            requested: current,
            started,
        })
    }
}

/// A counter advance that is written but not yet committed.
pub struct PendingIssue {
    tx: Transaction<'static, Sqlite>,
    issued: IssuedIdentifier,
    requested: Period,
    started: Instant,
}

impl PendingIssue {
    pub fn issued(&self) -> IssuedIdentifier {
        self.issued
    }

    /// Month the caller asked to issue in.
    pub fn requested_period(&self) -> Period {
        self.requested
    }

    /// The requested month was earlier than the stored one.
    pub fn clock_behind(&self) -> bool {
        self.issued.period > self.requested
    }

    /// Time since the advance was requested, lock wait included.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn transaction(&mut self) -> &mut Transaction<'static, Sqlite> {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<IssuedIdentifier, SequenceError> {
        self.tx
            .commit()
            .await
            .map_err(SequenceError::StorageUnavailable)?;
        Ok(self.issued)
    }

    /// Rolls back the counter advance and everything written alongside it.
    pub async fn abandon(self) -> Result<(), SequenceError> {
        self.tx
            .rollback()
            .await
            .map_err(SequenceError::StorageUnavailable)
    }
}

fn parse_period(label: String) -> Result<Period, SequenceError> {
    label
        .parse::<Period>()
        .map_err(|err| SequenceError::CorruptState(err.to_string()))
}

fn non_negative(value: i64, column: &str) -> Result<u64, SequenceError> {
    u64::try_from(value)
        .map_err(|_| SequenceError::CorruptState(format!("negative {column} {value}")))
}

/// Failures of the order identifier sequencer.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence storage unavailable: {0}")]
    StorageUnavailable(sqlx::Error),
    #[error("stored sequence counter is corrupt: {0}")]
    CorruptState(String),
}
