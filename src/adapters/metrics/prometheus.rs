//! Prometheus Metrics Registry - Ingestion Observability
//!
//! Registers the refresh, reconcile, rate-limit and scheduler series
//! and renders them in text exposition format for `GET /metrics`.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::RefreshOutcome;
use crate::ports::{StatusTransitions, Telemetry};

/// Centralized Prometheus metrics.
///
/// All series are prefixed `contest_calendar_` and labelled by platform
/// key where one applies.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Refresh attempts by platform and outcome status.
    pub refresh_runs: IntCounterVec,
    /// Fetch plus reconcile wall time per platform.
    pub refresh_duration_seconds: HistogramVec,
    /// Rows returned by adapters.
    pub contests_fetched: IntCounterVec,
    /// Rows inserted (`kind=new`) or updated (`kind=updated`).
    pub contests_reconciled: IntCounterVec,
    /// Rows moved into each status by recomputation passes.
    pub status_transitions: IntCounterVec,
    /// Limiter denials by scope.
    pub rate_limit_denials: IntCounterVec,
    /// Scheduled job completions by job and result.
    pub scheduler_job_runs: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let refresh_runs = IntCounterVec::new(
            Opts::new("contest_calendar_refresh_runs_total", "Platform refresh attempts"),
            &["platform", "status"],
        )?;

        let refresh_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "contest_calendar_refresh_duration_seconds",
                "Fetch plus reconcile duration per platform",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0]),
            &["platform"],
        )?;

        let contests_fetched = IntCounterVec::new(
            Opts::new("contest_calendar_contests_fetched_total", "Contests returned by adapters"),
            &["platform"],
        )?;

        let contests_reconciled = IntCounterVec::new(
            Opts::new(
                "contest_calendar_contests_reconciled_total",
                "Contests inserted or updated by reconcile",
            ),
            &["platform", "kind"],
        )?;

        let status_transitions = IntCounterVec::new(
            Opts::new(
                "contest_calendar_status_transitions_total",
                "Rows moved into a status by recomputation",
            ),
            &["status"],
        )?;

        let rate_limit_denials = IntCounterVec::new(
            Opts::new(
                "contest_calendar_rate_limit_denials_total",
                "Requests denied by the limiter",
            ),
            &["scope"],
        )?;

        let scheduler_job_runs = IntCounterVec::new(
            Opts::new("contest_calendar_scheduler_job_runs_total", "Scheduled job completions"),
            &["job", "result"],
        )?;

        registry.register(Box::new(refresh_runs.clone()))?;
        registry.register(Box::new(refresh_duration_seconds.clone()))?;
        registry.register(Box::new(contests_fetched.clone()))?;
        registry.register(Box::new(contests_reconciled.clone()))?;
        registry.register(Box::new(status_transitions.clone()))?;
        registry.register(Box::new(rate_limit_denials.clone()))?;
        registry.register(Box::new(scheduler_job_runs.clone()))?;

        Ok(Self {
            registry,
            refresh_runs,
            refresh_duration_seconds,
            contests_fetched,
            contests_reconciled,
            status_transitions,
            rate_limit_denials,
            scheduler_job_runs,
        })
    }

    /// Text exposition of every registered series.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Telemetry for MetricsRegistry {
    fn refresh_finished(&self, outcome: &RefreshOutcome) {
        let platform = outcome.platform.as_str();
        self.refresh_runs
            .with_label_values(&[platform, outcome.status.as_str()])
            .inc();
        self.refresh_duration_seconds
            .with_label_values(&[platform])
            .observe(outcome.duration_ms as f64 / 1000.0);
        if outcome.is_success() {
            self.contests_fetched
                .with_label_values(&[platform])
                .inc_by(outcome.fetched);
            self.contests_reconciled
                .with_label_values(&[platform, "new"])
                .inc_by(outcome.new_count);
            self.contests_reconciled
                .with_label_values(&[platform, "updated"])
                .inc_by(outcome.updated_count);
        }
    }

    fn statuses_recomputed(&self, moved: &StatusTransitions) {
        self.status_transitions.with_label_values(&["running"]).inc_by(moved.running);
        self.status_transitions.with_label_values(&["finished"]).inc_by(moved.finished);
        self.status_transitions.with_label_values(&["upcoming"]).inc_by(moved.upcoming);
    }

    fn job_finished(&self, job: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.scheduler_job_runs.with_label_values(&[job, result]).inc();
    }

    fn rate_limited(&self, scope: &str) {
        self.rate_limit_denials.with_label_values(&[scope]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReconcileCounts;
    use chrono::Utc;

    #[test]
    fn outcomes_show_up_in_exposition() {
        let metrics = MetricsRegistry::new().unwrap();
        let counts = ReconcileCounts { new_count: 3, updated_count: 1 };
        let outcome = RefreshOutcome::success("codeforces", 4, counts, 250, Utc::now());
        metrics.refresh_finished(&outcome);
        metrics.refresh_finished(&RefreshOutcome::failed("luogu", "boom", 10, Utc::now()));
        metrics.rate_limited("refresh");

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"contest_calendar_refresh_runs_total{platform="codeforces",status="success"} 1"#));
        assert!(text.contains(r#"contest_calendar_refresh_runs_total{platform="luogu",status="failed"} 1"#));
        assert!(text.contains(r#"contest_calendar_contests_reconciled_total{kind="new",platform="codeforces"} 3"#));
        assert!(text.contains(r#"contest_calendar_rate_limit_denials_total{scope="refresh"} 1"#));
    }
}
