use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics::{counter, histogram};
use tracing::{error, info, warn};

use tailor_core::{IssuedIdentifier, Period, SequencePreview};
use tailor_storage::{Database, PendingIssue, SequenceError};

/// Hands out monthly order identifiers against the shared counter row.
///
/// The current month is derived from the injected clock in the shop's
/// timezone. All coordination happens in the database, so any number of
/// server instances may share one counter.
#[derive(Clone)]
pub struct OrderSequencer {
    database: Database,
    timezone: Tz,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl OrderSequencer {
    pub fn new(
        database: Database,
        timezone: Tz,
        clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            database,
            timezone,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn current_period(&self) -> Period {
        Period::containing(self.now(), self.timezone)
    }

    /// Local calendar date (`YYYY-MM-DD`) of `at` in the shop's timezone.
    pub fn local_day(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Reports what the next issuance would return. Never writes.
    pub async fn peek_next(&self) -> Result<SequencePreview, SequenceError> {
        self.database
            .sequence()
            .preview(self.current_period())
            .await
            .inspect_err(|err| {
                error!(stage = "sequencer", error = %err, "failed to preview next order id");
            })
    }

    /// Issues and commits the next identifier on its own.
    ///
    /// The identifier is consumed even if the caller never stores an order
    /// under it; such gaps are never filled.
    pub async fn issue_next(&self) -> Result<IssuedIdentifier, SequenceError> {
        let pending = self.begin().await?;
        self.commit(pending).await
    }

    /// Advances the counter inside a transaction the caller finishes with
    /// [`OrderSequencer::commit`].
    pub async fn begin(&self) -> Result<PendingIssue, SequenceError> {
        let now = self.now();
        let period = Period::containing(now, self.timezone);
        self.database
            .sequence()
            .begin_issue(period, now)
            .await
            .inspect_err(|err| {
                error!(stage = "sequencer", %period, error = %err, "failed to issue order id");
            })
    }

    /// Commits a pending issue. Metrics and logs describe committed
    /// identifiers only.
    pub async fn commit(&self, pending: PendingIssue) -> Result<IssuedIdentifier, SequenceError> {
        let elapsed = pending.elapsed();
        let requested = pending.requested_period();
        let clock_behind = pending.clock_behind();
        let issued = pending.commit().await.inspect_err(|err| {
            error!(stage = "sequencer", error = %err, "failed to commit order id");
        })?;

        histogram!("order_id_issue_seconds").record(elapsed.as_secs_f64());
        counter!("order_ids_issued_total").increment(1);
        if issued.reset {
            counter!("order_id_period_resets_total").increment(1);
            info!(
                stage = "sequencer",
                period = %issued.period,
                "order numbering restarted for new month"
            );
        }
        if clock_behind {
            warn!(
                stage = "sequencer",
                clock_period = %requested,
                stored_period = %issued.period,
                "clock is behind the stored period; continuing the stored sequence"
            );
        }

        Ok(issued)
    }
}
