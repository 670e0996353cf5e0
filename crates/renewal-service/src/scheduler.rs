//! Periodic job scheduling.
//!
//! Three tasks run until the shutdown signal flips: daily billing and the
//! reminder check at a fixed local time, and the outbox sweep on a fixed
//! interval. A failing run is logged, recorded on the [`JobBoard`] and
//! reported to operators; the next trigger always gets a fresh attempt.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{
    messages, BillingEngine, BillingRunReport, DeliveryReport, EngineError, ReminderRunReport,
};

/// The periodic jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Charge accounts due today.
    DailyBilling,
    /// Remind debtors of upcoming charges.
    ReminderCheck,
    /// Deliver pending notifications.
    OutboxSweep,
}

impl JobKind {
    /// Stable job name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DailyBilling => "daily_billing",
            Self::ReminderCheck => "reminder_check",
            Self::OutboxSweep => "outbox_sweep",
        }
    }
}

/// Run history of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    /// Completed runs, successful or not.
    pub runs: u64,
    /// Runs that returned an error.
    pub failures: u64,
    /// When the last run started.
    pub last_started_at: Option<DateTime<Utc>>,
    /// When the last run finished.
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Error of the last failed run.
    pub last_error: Option<String>,
    /// Short summary of the last successful run.
    pub last_summary: Option<String>,
}

/// Shared record of job runs.
#[derive(Debug, Default)]
pub struct JobBoard {
    jobs: RwLock<BTreeMap<JobKind, JobStatus>>,
}

impl JobBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a run.
    pub fn started(&self, kind: JobKind) {
        self.update(kind, |status| status.last_started_at = Some(Utc::now()));
    }

    /// Record a successful run.
    pub fn succeeded(&self, kind: JobKind, summary: String) {
        self.update(kind, |status| {
            status.runs += 1;
            status.last_finished_at = Some(Utc::now());
            status.last_summary = Some(summary);
        });
    }

    /// Record a failed run.
    pub fn failed(&self, kind: JobKind, error: String) {
        self.update(kind, |status| {
            status.runs += 1;
            status.failures += 1;
            status.last_finished_at = Some(Utc::now());
            status.last_error = Some(error);
        });
    }

    /// Record the outcome of a run, summarizing a success with `summary`.
    pub fn record<T>(
        &self,
        kind: JobKind,
        outcome: &Result<T, EngineError>,
        summary: impl FnOnce(&T) -> String,
    ) {
        match outcome {
            Ok(report) => self.succeeded(kind, summary(report)),
            Err(e) => self.failed(kind, e.to_string()),
        }
    }

    /// Run `job`, recording its start and outcome under `kind`.
    ///
    /// Scheduled and manual runs both go through here, so the board reads
    /// the same whoever triggered the run.
    ///
    /// # Errors
    ///
    /// Returns the engine error of a failed run after recording it.
    pub async fn track<T, F>(&self, kind: JobKind, job: F) -> Result<T, EngineError>
    where
        T: JobSummary,
        F: Future<Output = Result<T, EngineError>>,
    {
        self.started(kind);
        let outcome = job.await;
        self.record(kind, &outcome, T::summary);
        outcome
    }

    /// Status of one job.
    #[must_use]
    pub fn status(&self, kind: JobKind) -> JobStatus {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Status of every job keyed by job name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<&'static str, JobStatus> {
        [JobKind::DailyBilling, JobKind::ReminderCheck, JobKind::OutboxSweep]
            .into_iter()
            .map(|kind| (kind.as_str(), self.status(kind)))
            .collect()
    }

    fn update(&self, kind: JobKind, f: impl FnOnce(&mut JobStatus)) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        f(jobs.entry(kind).or_default());
    }
}

/// One-line description of a finished run for the job board.
pub trait JobSummary {
    /// Summary shown as `last_summary`.
    fn summary(&self) -> String;
}

impl JobSummary for BillingRunReport {
    fn summary(&self) -> String {
        format!(
            "{}: {} charged, {} insufficient, {} errors",
            self.date,
            self.charged.len(),
            self.insufficient.len(),
            self.errors.len()
        )
    }
}

impl JobSummary for ReminderRunReport {
    fn summary(&self) -> String {
        format!("{}: {} reminded", self.date, self.reminded.len())
    }
}

impl JobSummary for DeliveryReport {
    fn summary(&self) -> String {
        format!(
            "{} delivered, {} failed, {} awaiting address",
            self.delivered.len(),
            self.failed.len(),
            self.awaiting_address
        )
    }
}

/// When the jobs run.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    /// Local time of the daily billing and reminder runs.
    pub daily_at: NaiveTime,
    /// Offset that defines "local".
    pub utc_offset: FixedOffset,
    /// Pause between outbox sweeps.
    pub sweep_interval: Duration,
}

impl ScheduleConfig {
    /// Today's date in the schedule's time zone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// The local date at `now`.
    #[must_use]
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.utc_offset).date_naive()
    }

    /// Time left until the next daily run after `now`.
    #[must_use]
    pub fn until_next_daily_run(&self, now: DateTime<Utc>) -> Duration {
        let local_now = now.with_timezone(&self.utc_offset).naive_local();
        let today_at = local_now.date().and_time(self.daily_at);
        let next = if today_at > local_now {
            today_at
        } else {
            today_at + chrono::Duration::days(1)
        };
        (next - local_now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Run one job now and record it on the board.
///
/// # Errors
///
/// Returns the engine error of a failed run after recording it.
pub async fn run_job(
    engine: &BillingEngine,
    board: &JobBoard,
    kind: JobKind,
    date: NaiveDate,
    shutdown: Option<&watch::Receiver<bool>>,
) -> Result<String, EngineError> {
    let summary = match kind {
        JobKind::DailyBilling => board
            .track(kind, engine.run_daily_billing(date))
            .await?
            .summary(),
        JobKind::ReminderCheck => board
            .track(kind, engine.run_reminder_check(date))
            .await?
            .summary(),
        JobKind::OutboxSweep => board
            .track(kind, engine.run_outbox_sweep(shutdown))
            .await?
            .summary(),
    };
    Ok(summary)
}

/// Drives the periodic jobs.
pub struct Scheduler {
    engine: Arc<BillingEngine>,
    board: Arc<JobBoard>,
    config: ScheduleConfig,
}

impl Scheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(engine: Arc<BillingEngine>, board: Arc<JobBoard>, config: ScheduleConfig) -> Self {
        Self {
            engine,
            board,
            config,
        }
    }

    /// Spawn the daily and interval tasks.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let scheduler = Arc::new(self);

        tracing::info!(
            daily_at = %scheduler.config.daily_at,
            utc_offset = %scheduler.config.utc_offset,
            sweep_interval_secs = scheduler.config.sweep_interval.as_secs(),
            "Scheduler started"
        );

        vec![
            tokio::spawn(Arc::clone(&scheduler).daily_loop(JobKind::DailyBilling, shutdown.clone())),
            tokio::spawn(Arc::clone(&scheduler).daily_loop(JobKind::ReminderCheck, shutdown.clone())),
            tokio::spawn(scheduler.sweep_loop(shutdown)),
        ]
    }

    async fn daily_loop(self: Arc<Self>, kind: JobKind, mut shutdown: watch::Receiver<bool>) {
        loop {
            let wait = self.config.until_next_daily_run(Utc::now());
            tracing::debug!(job = kind.as_str(), wait_secs = wait.as_secs(), "Waiting for next run");

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            let date = self.config.today();
            self.execute(kind, date, None).await;
        }
        tracing::debug!(job = kind.as_str(), "Job loop stopped");
    }

    async fn sweep_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            let date = self.config.today();
            self.execute(JobKind::OutboxSweep, date, Some(&shutdown)).await;
        }
        tracing::debug!(job = JobKind::OutboxSweep.as_str(), "Job loop stopped");
    }

    async fn execute(
        &self,
        kind: JobKind,
        date: NaiveDate,
        shutdown: Option<&watch::Receiver<bool>>,
    ) {
        if let Err(e) = run_job(&self.engine, &self.board, kind, date, shutdown).await {
            tracing::error!(job = kind.as_str(), %date, error = %e, "Scheduled job failed");
            let alert = messages::job_failure_alert(kind.as_str(), &e.to_string());
            self.engine.alert_operators_directly(&alert).await;
        }
    }
}
