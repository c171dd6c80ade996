//! One monitoring run: load watermark, check each candidate quarter, alert,
//! advance watermark.
//!
//! Watermark policy: confirmed-only advance. The watermark moves only to the
//! latest month that actually returned records in this run; if nothing was
//! found it stays put and the same window is checked again next run. FISIS
//! publishes a quarter weeks after it ends, so marking an empty month as done
//! would skip it for good.
//!
//! The advance is also capped below the earliest month whose fetch failed or
//! came back as an API error. Everything from that month on is still in the
//! window next run, so a month that could not be checked is never skipped.
//!
//! Nothing in a run is fatal. Fetch, API and delivery failures are logged,
//! recorded in the [`RunReport`] and the loop moves on.

use tracing::{debug, error, info, warn};

use crate::assess::{classify, Assessment};
use crate::clock::Clock;
use crate::fisis::{FetchError, Record, StatisticsSource};
use crate::month::{quarter_months, SequenceOrder, YearMonth};
use crate::notify::AlertSink;
use crate::watermark::{Watermark, WatermarkStore};

/// What happened for one candidate month.
#[derive(Debug, Clone, PartialEq)]
pub enum MonthOutcome {
    NewData { records: Vec<Record>, notified: bool },
    NoData,
    ApiError { code: String, message: String },
    FetchFailed { config: bool, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthCheck {
    pub month: YearMonth,
    pub outcome: MonthOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Watermark already at or past the current month.
    NothingToCheck,
    Completed,
}

/// Watermark write result at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkUpdate {
    Unchanged,
    Advanced(YearMonth),
    SaveFailed { target: YearMonth, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub current: YearMonth,
    pub watermark: Watermark,
    pub candidates: Vec<YearMonth>,
    pub checks: Vec<MonthCheck>,
    pub update: WatermarkUpdate,
    pub status: RunStatus,
}

impl RunReport {
    pub fn months_with_data(&self) -> Vec<YearMonth> {
        self.checks
            .iter()
            .filter(|c| matches!(c.outcome, MonthOutcome::NewData { .. }))
            .map(|c| c.month)
            .collect()
    }

    pub fn alerts_sent(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.outcome, MonthOutcome::NewData { notified: true, .. }))
            .count()
    }
}

pub struct Monitor<S, N, C> {
    source: S,
    sink: N,
    clock: C,
    store: WatermarkStore,
    order: SequenceOrder,
}

impl<S, N, C> Monitor<S, N, C>
where
    S: StatisticsSource,
    N: AlertSink,
    C: Clock,
{
    pub fn new(source: S, sink: N, clock: C, store: WatermarkStore) -> Self {
        Self {
            source,
            sink,
            clock,
            store,
            order: SequenceOrder::Ascending,
        }
    }

    pub fn with_order(mut self, order: SequenceOrder) -> Self {
        self.order = order;
        self
    }

    pub async fn run(&self) -> RunReport {
        let current = self.clock.current_month();
        let watermark = self.store.load(current);
        info!(current = %current, watermark = %watermark.value, "starting FISIS check");

        let candidates = quarter_months(watermark.value, current, self.order);
        if candidates.is_empty() {
            info!(
                current = %current,
                watermark = %watermark.value,
                "no quarter-end months to check"
            );
            return RunReport {
                current,
                watermark,
                candidates,
                checks: Vec::new(),
                update: WatermarkUpdate::Unchanged,
                status: RunStatus::NothingToCheck,
            };
        }

        let listed: Vec<String> = candidates.iter().map(|m| m.to_string()).collect();
        info!(months = ?listed, "checking quarter-end months");

        let mut checks = Vec::with_capacity(candidates.len());
        for &month in &candidates {
            let outcome = self.check_month(month).await;
            checks.push(MonthCheck { month, outcome });
        }

        let update = self.advance(watermark.value, advance_target(&checks));
        let report = RunReport {
            current,
            watermark,
            candidates,
            checks,
            update,
            status: RunStatus::Completed,
        };
        info!(
            checked = report.checks.len(),
            with_data = report.months_with_data().len(),
            alerts_sent = report.alerts_sent(),
            update = ?report.update,
            "FISIS check complete"
        );
        report
    }

    async fn check_month(&self, month: YearMonth) -> MonthOutcome {
        debug!(month = %month, "fetching");
        let response = match self.source.fetch(month).await {
            Ok(r) => r,
            Err(e) => {
                log_fetch_error(month, &e);
                return MonthOutcome::FetchFailed {
                    config: e.is_config(),
                    reason: e.to_string(),
                };
            }
        };

        match classify(&response) {
            Assessment::HasNewData(records) => {
                info!(month = %month, records = records.len(), "new data published");
                let notified = self.sink.notify(month, &records).await;
                MonthOutcome::NewData { records, notified }
            }
            Assessment::NoNewData => {
                info!(month = %month, "no data yet");
                MonthOutcome::NoData
            }
            Assessment::ApiError { code, message } => {
                warn!(month = %month, code = %code, message = %message, "FISIS API error");
                MonthOutcome::ApiError { code, message }
            }
        }
    }

    fn advance(&self, watermark: YearMonth, latest_found: Option<YearMonth>) -> WatermarkUpdate {
        let target = match latest_found {
            Some(m) if m > watermark => m,
            _ => {
                info!(watermark = %watermark, "no new data confirmed, watermark unchanged");
                return WatermarkUpdate::Unchanged;
            }
        };
        match self.store.save(target) {
            Ok(()) => WatermarkUpdate::Advanced(target),
            Err(e) => {
                error!(target = %target, error = %e, "failed to persist watermark");
                WatermarkUpdate::SaveFailed {
                    target,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Latest month with data that is earlier than every unresolved month.
///
/// Unresolved means the fetch failed or FISIS answered with an error code.
/// Independent of visiting order.
fn advance_target(checks: &[MonthCheck]) -> Option<YearMonth> {
    let first_unresolved = checks
        .iter()
        .filter(|c| {
            matches!(
                c.outcome,
                MonthOutcome::FetchFailed { .. } | MonthOutcome::ApiError { .. }
            )
        })
        .map(|c| c.month)
        .min();
    let found: Vec<YearMonth> = checks
        .iter()
        .filter(|c| matches!(c.outcome, MonthOutcome::NewData { .. }))
        .map(|c| c.month)
        .collect();

    let Some(cap) = first_unresolved else {
        return found.into_iter().max();
    };
    if found.iter().any(|m| *m > cap) {
        warn!(unresolved = %cap, "holding watermark below a month that could not be checked");
    }
    found.into_iter().filter(|m| *m < cap).max()
}

fn log_fetch_error(month: YearMonth, e: &FetchError) {
    match e {
        FetchError::MissingApiKey => {
            error!(month = %month, error = %e, "cannot query FISIS without an API key")
        }
        FetchError::Network(source) if source.is_timeout() => {
            warn!(month = %month, error = %e, "FISIS request timed out, treating as no data")
        }
        FetchError::Network(_) | FetchError::Status { .. } | FetchError::Decode(_) => {
            warn!(month = %month, error = %e, "FISIS fetch failed, treating as no data")
        }
    }
}
