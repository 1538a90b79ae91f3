//! Scheduler - Cron-Driven Refresh and Status Jobs
//!
//! Holds a job table keyed by job id behind a tokio `RwLock`:
//! registration and removal take the write path, introspection and
//! firing take the read path. Cron expressions have six fields with
//! seconds first and are evaluated in UTC.
//!
//! A job that errors is logged and swallowed; a job whose previous run
//! is still in flight is skipped rather than stacked.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::orchestrator::RefreshOrchestrator;
use super::status::StatusRecomputer;
use crate::domain::platform::normalize_key;
use crate::domain::{NotFoundError, RefreshError, RefreshOutcome, SchedulerError};
use crate::ports::{Clock, Telemetry};

pub type JobId = u64;

/// Target of a manual refresh covering every platform.
pub const ALL_PLATFORMS: &str = "all";

pub const REFRESH_ALL_JOB: &str = "refresh-all";
pub const STATUS_JOB: &str = "status-recompute";

/// Cadence of the fixed jobs and of the firing loop.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Full refresh, once daily at a low-traffic hour.
    pub full_refresh: String,
    /// Status recomputation, hourly.
    pub status_recompute: String,
    /// How often the loop checks for due jobs.
    pub tick: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            full_refresh: "0 0 2 * * *".to_string(),
            status_recompute: "0 0 * * * *".to_string(),
            tick: Duration::from_secs(1),
        }
    }
}

/// What a job does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    RefreshAll,
    StatusRecompute,
    RefreshPlatform(String),
}

impl JobKind {
    fn label(&self) -> String {
        match self {
            Self::RefreshAll => REFRESH_ALL_JOB.to_string(),
            Self::StatusRecompute => STATUS_JOB.to_string(),
            Self::RefreshPlatform(p) => format!("refresh:{p}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct JobTiming {
    /// Next slot the job is due at; `None` once the schedule is exhausted.
    next: Option<DateTime<Utc>>,
    /// Slot of the most recent firing.
    prev: Option<DateTime<Utc>>,
}

struct JobEntry {
    id: JobId,
    kind: JobKind,
    /// Cron source text, echoed back by the admin API.
    expression: String,
    /// Parsed form of `expression`.
    schedule: Schedule,
    /// Advanced by the tick loop only.
    timing: Mutex<JobTiming>,
    /// Set while a run is in progress; a due slot is skipped while set.
    in_flight: Arc<AtomicBool>,
}

impl JobEntry {
    fn timing(&self) -> JobTiming {
        *self.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn info(&self) -> JobInfo {
        let timing = self.timing();
        JobInfo {
            id: self.id,
            name: self.kind.label(),
            platform: match &self.kind {
                JobKind::RefreshPlatform(p) => Some(p.clone()),
                _ => None,
            },
            schedule: self.expression.clone(),
            next: timing.next,
            prev: timing.prev,
            running: self.in_flight.load(Ordering::Acquire),
        }
    }
}

/// Introspection view of one registered job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub id: JobId,
    /// `refresh-all`, `status-recompute` or `refresh:<platform>`.
    pub name: String,
    /// Set for per-platform refresh jobs.
    pub platform: Option<String>,
    /// Six-field cron expression (seconds first), evaluated in UTC.
    pub schedule: String,
    pub next: Option<DateTime<Utc>>,
    pub prev: Option<DateTime<Utc>>,
    /// A run of this job is in flight.
    pub running: bool,
}

/// Clears a job's in-flight flag when the run ends, panics included.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Parse a six-field cron expression.
pub fn parse_schedule(expression: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(expression.trim()).map_err(|e| SchedulerError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

pub struct Scheduler {
    /// Runs refresh jobs, scheduled and manual alike.
    orchestrator: Arc<RefreshOrchestrator>,
    /// Runs the status-recompute job.
    status: Arc<StatusRecomputer>,
    /// Source of "now" when seeding next fire times.
    clock: Arc<dyn Clock>,
    /// Receives one event per finished job run.
    telemetry: Arc<dyn Telemetry>,
    /// Fixed-job expressions and the tick interval.
    settings: SchedulerSettings,
    /// Job table, ordered by id. Writers: register, add, remove.
    jobs: RwLock<BTreeMap<JobId, Arc<JobEntry>>>,
    /// Monotonic id source; ids are never reused.
    next_id: AtomicU64,
    /// Parent token for every job run; cancelled on shutdown.
    runs: CancellationToken,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<RefreshOrchestrator>,
        status: Arc<StatusRecomputer>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            orchestrator,
            status,
            clock,
            telemetry,
            settings,
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            runs: CancellationToken::new(),
        }
    }

    /// Register the fixed full-refresh and status jobs.
    pub async fn register_fixed_jobs(&self) -> Result<(), SchedulerError> {
        let refresh = parse_schedule(&self.settings.full_refresh)?;
        let status = parse_schedule(&self.settings.status_recompute)?;

        let mut jobs = self.jobs.write().await;
        jobs.retain(|_, j| !matches!(j.kind, JobKind::RefreshAll | JobKind::StatusRecompute));
        for (kind, expression, schedule) in [
            (JobKind::RefreshAll, self.settings.full_refresh.clone(), refresh),
            (JobKind::StatusRecompute, self.settings.status_recompute.clone(), status),
        ] {
            let entry = self.entry(kind, expression, schedule);
            jobs.insert(entry.id, Arc::new(entry));
        }
        Ok(())
    }

    fn entry(&self, kind: JobKind, expression: String, schedule: Schedule) -> JobEntry {
        let next = schedule.after(&self.clock.now()).next();
        JobEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            expression,
            schedule,
            timing: Mutex::new(JobTiming { next, prev: None }),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register the fixed jobs and spawn the firing loop.
    ///
    /// The loop exits when `shutdown` is cancelled; in-flight job runs
    /// are cancelled along with it.
    pub async fn start(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, SchedulerError> {
        self.register_fixed_jobs().await?;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let jobs = this.jobs.read().await.len();
            info!(jobs, "Scheduler started");
            let mut interval = tokio::time::interval(this.settings.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let now = this.clock.now();
                        this.fire_due(now).await;
                    }
                }
            }

            this.runs.cancel();
            info!("Scheduler stopped");
        });
        Ok(handle)
    }

    /// Fire every job whose next fire time is at or before `now`.
    ///
    /// Returns the spawned runs so callers can await them.
    pub async fn fire_due(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let due: Vec<Arc<JobEntry>> = {
            let jobs = self.jobs.read().await;
            jobs
                .values()
                .filter(|job| {
                    let mut timing = job.timing.lock().unwrap_or_else(PoisonError::into_inner);
                    match timing.next {
                        Some(next) if next <= now => {
                            timing.prev = Some(now);
                            timing.next = job.schedule.after(&now).next();
                            true
                        }
                        _ => false,
                    }
                })
                .cloned()
                .collect()
        };

        let mut handles = Vec::with_capacity(due.len());
        for job in due {
            if job.in_flight.swap(true, Ordering::AcqRel) {
                warn!(job = %job.kind.label(), "Previous run still in flight, skipping");
                continue;
            }
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                let _guard = InFlightGuard(Arc::clone(&job.in_flight));
                this.run_job(&job.kind).await;
            }));
        }
        handles
    }

    /// Execute one job body. Errors are logged, never propagated.
    #[instrument(skip(self), fields(job = %kind.label()))]
    async fn run_job(&self, kind: &JobKind) {
        let cancel = self.runs.child_token();
        let ok = match kind {
            JobKind::RefreshAll => {
                let outcomes = self.orchestrator.refresh_all(&cancel).await;
                let failed: Vec<&str> = outcomes
                    .values()
                    .filter(|o| !o.is_success())
                    .map(|o| o.platform.as_str())
                    .collect();
                if !failed.is_empty() {
                    warn!(?failed, "Scheduled refresh finished with failed platforms");
                }
                failed.is_empty()
            }
            JobKind::StatusRecompute => match self.status.run().await {
                Ok(_) => true,
                Err(e) => {
                    error!(error = %e, "Scheduled status recomputation failed");
                    false
                }
            },
            JobKind::RefreshPlatform(platform) => {
                match self.orchestrator.refresh_one(platform, &cancel).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!(
                            platform = %platform,
                            error = %e,
                            "Scheduled platform refresh failed"
                        );
                        false
                    }
                }
            }
        };
        self.telemetry.job_finished(&kind.label(), ok);
        debug!(ok, "Scheduled job finished");
    }

    /// Register (or replace) the refresh job for one platform.
    ///
    /// Unknown platforms fail with `NotFound` and leave the table untouched.
    #[instrument(skip(self))]
    pub async fn add_platform_job(
        &self,
        platform: &str,
        expression: &str,
    ) -> Result<JobInfo, SchedulerError> {
        let key = normalize_key(platform);
        if !self.orchestrator.registry().contains(&key) {
            return Err(NotFoundError::platform(platform).into());
        }
        let schedule = parse_schedule(expression)?;

        let mut jobs = self.jobs.write().await;
        let kind = JobKind::RefreshPlatform(key.clone());
        jobs.retain(|_, j| j.kind != kind);
        let entry = self.entry(kind, expression.trim().to_string(), schedule);
        let info = entry.info();
        jobs.insert(entry.id, Arc::new(entry));

        info!(
            platform = %key,
            schedule = %info.schedule,
            next = ?info.next,
            "Platform refresh job registered"
        );
        Ok(info)
    }

    /// Remove the refresh job for one platform.
    #[instrument(skip(self))]
    pub async fn remove_platform_job(&self, platform: &str) -> Result<(), SchedulerError> {
        let key = normalize_key(platform);
        let kind = JobKind::RefreshPlatform(key.clone());

        let mut jobs = self.jobs.write().await;
        let id = jobs
            .values()
            .find(|j| j.kind == kind)
            .map(|j| j.id)
            .ok_or_else(|| NotFoundError::job(&key))?;
        jobs.remove(&id);

        info!(platform = %key, "Platform refresh job removed");
        Ok(())
    }

    /// True when `platform` names a registered adapter.
    pub fn has_platform(&self, platform: &str) -> bool {
        self.orchestrator.registry().contains(platform)
    }

    /// Every registered job with its schedule and fire times.
    pub async fn jobs(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().map(|j| j.info()).collect()
    }

    /// Run a refresh now, outside the cron cadence.
    ///
    /// `target` is a platform key or `"all"`.
    #[instrument(skip(self, cancel))]
    pub async fn manual_refresh(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RefreshOutcome>, RefreshError> {
        if normalize_key(target) == ALL_PLATFORMS {
            let outcomes = self.orchestrator.refresh_all(cancel).await;
            return Ok(outcomes.into_values().collect());
        }
        let outcome = self.orchestrator.refresh_one(target, cancel).await?;
        Ok(vec![outcome])
    }
}
