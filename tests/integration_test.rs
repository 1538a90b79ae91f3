//! Integration Tests - Refresh, Status, Scheduler and Limiter Workflows
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use tokio_util::sync::CancellationToken;

use contest_calendar::adapters::persistence::MemoryContestStore;
use contest_calendar::adapters::ratelimit::MemoryWindowStore;
use contest_calendar::adapters::sources::codeforces::parse_contest_list;
use contest_calendar::adapters::sources::luogu::parse_contest_page;
use contest_calendar::domain::{
    Contest, ContestDraft, ContestId, ContestStatus, FetchError, PersistenceError, ReconcileCounts,
    RefreshError, RefreshLogEntry, RefreshOutcome, RefreshStatus, SchedulerError,
};
use contest_calendar::ports::{
    Clock, ContestQuery, ContestStore, FetchContext, ManualClock, NoopTelemetry, SourceAdapter,
    StatusCount, StatusTransitions, Telemetry,
};
use contest_calendar::usecases::{
    AdapterRegistry, RefreshDecision, RefreshOrchestrator, Scheduler, SchedulerSettings,
    SlidingWindowLimiter, StatusRecomputer,
};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait]
    impl SourceAdapter for Source {
        fn name(&self) -> &'static str;
        fn display_name(&self) -> &'static str;
        fn fetch_timeout(&self) -> Duration;
        async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError>;
    }
}

mock! {
    pub Store {}

    #[async_trait]
    impl ContestStore for Store {
        async fn upsert_batch(
            &self,
            platform: &str,
            batch: &[ContestDraft],
        ) -> Result<ReconcileCounts, PersistenceError>;
        async fn recompute_statuses(
            &self,
            now: DateTime<Utc>,
        ) -> Result<StatusTransitions, PersistenceError>;
        async fn append_refresh_log(
            &self,
            outcome: &RefreshOutcome,
            at: DateTime<Utc>,
        ) -> Result<RefreshLogEntry, PersistenceError>;
        async fn recent_refresh_logs(
            &self,
            limit: usize,
        ) -> Result<Vec<RefreshLogEntry>, PersistenceError>;
        async fn list(&self, query: &ContestQuery) -> Result<Vec<Contest>, PersistenceError>;
        async fn get(&self, id: ContestId) -> Result<Option<Contest>, PersistenceError>;
        async fn delete(&self, id: ContestId) -> Result<bool, PersistenceError>;
        async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<StatusCount>, PersistenceError>;
        async fn is_healthy(&self) -> bool;
    }
}

// ---- Helpers ----

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_740_000_000, 0).unwrap()
}

fn source(
    name: &'static str,
    result: impl Fn() -> Result<Vec<ContestDraft>, FetchError> + Send + Sync + 'static,
) -> Arc<dyn SourceAdapter> {
    let mut mock = MockSource::new();
    mock.expect_name().return_const(name);
    mock.expect_display_name().return_const(name);
    mock.expect_fetch_timeout().return_const(Duration::from_secs(10));
    mock.expect_fetch().times(1).returning(move |_| result());
    Arc::new(mock)
}

fn draft(platform: &str, native: u32, now: DateTime<Utc>) -> ContestDraft {
    ContestDraft::from_range(
        platform,
        format!("{platform}-{native}"),
        format!("Contest {native}"),
        format!("https://example.com/{native}"),
        now + chrono::Duration::hours(1),
        now + chrono::Duration::hours(3),
        now,
    )
}

fn orchestrator(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: Arc<dyn ContestStore>,
    clock: Arc<dyn Clock>,
) -> Arc<RefreshOrchestrator> {
    let telemetry: Arc<dyn Telemetry> = Arc::new(NoopTelemetry);
    Arc::new(RefreshOrchestrator::new(
        Arc::new(AdapterRegistry::with_adapters(adapters)),
        store,
        clock,
        telemetry,
    ))
}

/// Adapter that never answers until cancelled.
struct Hanging {
    budget: Duration,
}

#[async_trait]
impl SourceAdapter for Hanging {
    fn name(&self) -> &'static str {
        "nowcoder"
    }

    fn display_name(&self) -> &'static str {
        "牛客"
    }

    fn fetch_timeout(&self) -> Duration {
        self.budget
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

// ---- Orchestrator ----

#[tokio::test]
async fn one_failing_platform_does_not_sink_the_others() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryContestStore::new());
    let now = t0();
    let orchestrator = orchestrator(
        vec![
            source("codeforces", move || {
                Ok(vec![draft("codeforces", 1, now), draft("codeforces", 2, now)])
            }),
            source("atcoder", || Err(FetchError::Transport("connection reset".into()))),
            source("luogu", move || Ok(vec![draft("luogu", 9, now)])),
        ],
        store.clone(),
        clock,
    );

    let outcomes = orchestrator.refresh_all(&CancellationToken::new()).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes["codeforces"].status, RefreshStatus::Success);
    assert_eq!(outcomes["codeforces"].new_count, 2);
    assert_eq!(outcomes["luogu"].status, RefreshStatus::Success);
    assert_eq!(outcomes["atcoder"].status, RefreshStatus::Failed);
    assert!(outcomes["atcoder"].message.contains("connection reset"));

    let logs = store.recent_refresh_logs(10).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn reconcile_twice_inserts_once() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryContestStore::new());
    let now = t0();

    let mut mock = MockSource::new();
    mock.expect_name().return_const("leetcode");
    mock.expect_display_name().return_const("LeetCode");
    mock.expect_fetch_timeout().return_const(Duration::from_secs(10));
    let mut calls = 0;
    mock.expect_fetch().times(2).returning(move |_| {
        calls += 1;
        let mut d = draft("leetcode", 7, now);
        if calls == 2 {
            d.name = "Weekly Contest 7 (renamed)".into();
        }
        Ok(vec![d])
    });

    let orchestrator = orchestrator(vec![Arc::new(mock)], store.clone(), clock);
    let cancel = CancellationToken::new();

    let first = orchestrator.refresh_one("leetcode", &cancel).await.unwrap();
    let second = orchestrator.refresh_one("LeetCode", &cancel).await.unwrap();

    assert_eq!((first.new_count, first.updated_count), (1, 0));
    assert_eq!((second.new_count, second.updated_count), (0, 1));
    let rows = store.list(&ContestQuery::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Weekly Contest 7 (renamed)");
}

#[tokio::test]
async fn unknown_platform_is_rejected_before_any_io() {
    // No expectations: any store call would panic.
    let store: Arc<dyn ContestStore> = Arc::new(MockStore::new());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let orchestrator = orchestrator(Vec::new(), store, clock);

    let err = orchestrator
        .refresh_one("topcoder", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RefreshError::NotFound(_)));
}

#[tokio::test]
async fn persistence_failure_is_logged_and_surfaced() {
    let mut store = MockStore::new();
    store
        .expect_upsert_batch()
        .times(1)
        .returning(|_, _| Err(PersistenceError::Backend("disk full".into())));
    store
        .expect_append_refresh_log()
        .times(1)
        .withf(|outcome, _| {
            outcome.status == RefreshStatus::Failed && outcome.message.contains("disk full")
        })
        .returning(|outcome, at| Ok(RefreshLogEntry::from_outcome(1, outcome, at)));

    let now = t0();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
    let orchestrator = orchestrator(
        vec![source("codeforces", move || Ok(vec![draft("codeforces", 1, now)]))],
        Arc::new(store),
        clock,
    );

    let err = orchestrator
        .refresh_one("codeforces", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RefreshError::Persistence(_)));
}

#[tokio::test]
async fn slow_adapter_times_out_on_its_own_budget() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryContestStore::new());
    let now = t0();
    let orchestrator = orchestrator(
        vec![
            Arc::new(Hanging { budget: Duration::from_millis(50) }),
            source("codeforces", move || Ok(vec![draft("codeforces", 1, now)])),
        ],
        store.clone(),
        clock,
    );

    let outcomes = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.refresh_all(&CancellationToken::new()),
    )
    .await
    .expect("barrier must not hang");

    assert_eq!(outcomes["nowcoder"].status, RefreshStatus::Failed);
    assert_eq!(outcomes["codeforces"].status, RefreshStatus::Success);
    assert_eq!(store.recent_refresh_logs(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn cancellation_turns_pending_fetches_into_failures() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryContestStore::new());
    let orchestrator = orchestrator(
        vec![Arc::new(Hanging { budget: Duration::from_secs(3600) })],
        store.clone(),
        clock,
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcomes = tokio::time::timeout(Duration::from_secs(5), orchestrator.refresh_all(&cancel))
        .await
        .expect("cancelled run must return");
    assert_eq!(outcomes["nowcoder"].status, RefreshStatus::Failed);
    assert_eq!(store.recent_refresh_logs(10).await.unwrap().len(), 1);
}

// ---- Status lifecycle ----

#[tokio::test]
async fn codeforces_contest_walks_through_its_lifecycle() {
    let clock = Arc::new(ManualClock::new(t0()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(MemoryContestStore::new());

    let start = t0().timestamp() + 3600;
    let body = format!(
        r#"{{"status":"OK","result":[{{"id":2050,"name":"Codeforces Round 2050","type":"CF","phase":"BEFORE","frozen":false,"durationSeconds":7200,"startTimeSeconds":{start}}}]}}"#
    );
    let drafts = parse_contest_list(&body, t0()).unwrap();

    let orchestrator = orchestrator(
        vec![source("codeforces", move || Ok(drafts.clone()))],
        store.clone(),
        dyn_clock.clone(),
    );
    let outcome = orchestrator
        .refresh_one("codeforces", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.new_count, 1);

    let rows = store.list(&ContestQuery::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ContestStatus::Upcoming);
    assert_eq!(rows[0].source_id, "codeforces-2050");
    let id = rows[0].id;

    let status = StatusRecomputer::new(store.clone(), dyn_clock, Arc::new(NoopTelemetry));

    clock.advance(chrono::Duration::minutes(61));
    let moved = status.run().await.unwrap();
    assert_eq!(moved.running, 1);
    assert_eq!(store.get(id).await.unwrap().unwrap().status, ContestStatus::Running);

    // Start is one hour in; the contest ends two hours after it.
    clock.set(t0() + chrono::Duration::hours(3) + chrono::Duration::seconds(1));
    status.run().await.unwrap();
    assert_eq!(store.get(id).await.unwrap().unwrap().status, ContestStatus::Finished);

    // Idempotent: nothing left to move.
    assert_eq!(status.run().await.unwrap().total(), 0);
}

#[tokio::test]
async fn bad_upstream_rows_cost_only_themselves() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryContestStore::new());
    let t = t0().timestamp();

    let codeforces = format!(
        r#"{{"status":"OK","result":[
            {{"id":1,"name":"Endless","phase":"BEFORE","durationSeconds":9223372036854775,"startTimeSeconds":{}}},
            {{"id":2,"name":"Rewound","phase":"BEFORE","durationSeconds":-60,"startTimeSeconds":{}}},
            {{"id":3,"name":"Round 3","phase":"BEFORE","durationSeconds":7200,"startTimeSeconds":{}}}
        ]}}"#,
        t + 60,
        t + 60,
        t + 60
    );
    let luogu = format!(
        r#"{{"currentData":{{"contests":{{"result":[
            {{"id":10,"name":"Backwards","startTime":{},"endTime":{}}},
            {{"id":11,"name":"Monthly","startTime":{},"endTime":{}}}
        ]}}}}}}"#,
        t + 3600,
        t + 60,
        t + 60,
        t + 3600
    );
    let cf_drafts = parse_contest_list(&codeforces, t0()).unwrap();
    let lg_drafts = parse_contest_page(&luogu, t0()).unwrap();

    let orchestrator = orchestrator(
        vec![
            source("codeforces", move || Ok(cf_drafts.clone())),
            source("luogu", move || Ok(lg_drafts.clone())),
        ],
        store.clone(),
        clock,
    );
    let outcomes = orchestrator.refresh_all(&CancellationToken::new()).await;

    assert_eq!(outcomes["codeforces"].status, RefreshStatus::Success);
    assert_eq!(outcomes["codeforces"].new_count, 1);
    assert_eq!(outcomes["luogu"].status, RefreshStatus::Success);
    assert_eq!(outcomes["luogu"].new_count, 1);

    let mut ids: Vec<String> = store
        .list(&ContestQuery::default())
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.source_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["codeforces-3", "luogu-11"]);
}

// ---- Scheduler ----

fn scheduler(adapters: Vec<Arc<dyn SourceAdapter>>) -> Arc<Scheduler> {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let store: Arc<dyn ContestStore> = Arc::new(MemoryContestStore::new());
    let telemetry: Arc<dyn Telemetry> = Arc::new(NoopTelemetry);
    let orchestrator = orchestrator(adapters, store.clone(), clock.clone());
    let status = Arc::new(StatusRecomputer::new(store, clock.clone(), telemetry.clone()));
    Arc::new(Scheduler::new(
        orchestrator,
        status,
        clock,
        telemetry,
        SchedulerSettings::default(),
    ))
}

#[tokio::test]
async fn scheduling_an_unregistered_platform_fails() {
    let scheduler = scheduler(Vec::new());

    let err = scheduler.add_platform_job("hackerrank", "0 0 * * * *").await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
    assert!(scheduler.jobs().await.is_empty());

    let err = scheduler.remove_platform_job("hackerrank").await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[tokio::test]
async fn fixed_jobs_are_listed_with_next_fire_times() {
    let scheduler = scheduler(Vec::new());
    scheduler.register_fixed_jobs().await.unwrap();

    let jobs = scheduler.jobs().await;
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.next.is_some_and(|n| n > t0()) && j.prev.is_none()));
}

#[tokio::test]
async fn manual_refresh_all_reuses_the_orchestrator() {
    let now = t0();
    let scheduler = scheduler(vec![
        source("codeforces", move || Ok(vec![draft("codeforces", 1, now)])),
        source("atcoder", || Err(FetchError::UpstreamStatus { status: 503 })),
    ]);

    let outcomes = scheduler
        .manual_refresh("ALL", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);

    let err = scheduler
        .manual_refresh("spoj", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RefreshError::NotFound(_)));
}

// ---- Rate limiter ----

fn limiter() -> (Arc<ManualClock>, SlidingWindowLimiter) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryWindowStore::new(clock.clone()));
    (clock.clone(), SlidingWindowLimiter::new(store, clock, Arc::new(NoopTelemetry)))
}

#[tokio::test]
async fn api_budget_allows_five_per_minute() {
    let (clock, limiter) = limiter();
    for _ in 0..5 {
        assert!(limiter.check_api("198.51.100.4").await.unwrap().is_allowed());
    }
    assert!(!limiter.check_api("198.51.100.4").await.unwrap().is_allowed());
    assert!(limiter.check_api("198.51.100.5").await.unwrap().is_allowed());

    clock.advance(chrono::Duration::seconds(61));
    assert!(limiter.check_api("198.51.100.4").await.unwrap().is_allowed());
}

#[tokio::test]
async fn refresh_retry_after_shrinks_as_time_passes() {
    let (clock, limiter) = limiter();
    for _ in 0..10 {
        assert!(limiter.check_refresh_limit("u1", "all").await.unwrap().is_allowed());
        clock.advance(chrono::Duration::seconds(5));
    }

    let mut last = Duration::MAX;
    for _ in 0..5 {
        let RefreshDecision::Denied { retry_after } =
            limiter.check_refresh_limit("u1", "all").await.unwrap()
        else {
            panic!("budget should be exhausted");
        };
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after < last);
        last = retry_after;
        clock.advance(chrono::Duration::seconds(30));
    }
}
