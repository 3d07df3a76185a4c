use crate::application::session_store::SessionStore;
use crate::domain::models::{Blocklist, NextSession, SessionState, SessionStatus, end_time_for};
use crate::infrastructure::relay_client::{
    ActiveBreakPayload, ActiveSessionPayload, LockInRemote, StatusResponse,
};
use crate::infrastructure::state_store::StateStore;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const SYNC_INTERVAL: Duration = Duration::from_secs(10);
const LOG_EVERY_N_FAILURES: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    Invalid(String),
    Apply {
        next: SessionState,
        sync_blocklist: Option<Blocklist>,
    },
}

pub fn reconcile(previous: &SessionState, status: &StatusResponse) -> Reconciliation {
    if let Some(session) = status.active_session.as_ref() {
        return reconcile_session(previous, session, status.blocklist.as_deref());
    }
    if let Some(active_break) = status.active_break.as_ref() {
        return reconcile_break(previous, active_break, status.blocklist.as_deref());
    }
    if previous.is_idle() {
        return Reconciliation::Unchanged;
    }
    Reconciliation::Apply {
        next: SessionState::idle(),
        sync_blocklist: Some(previous.blocklist.clone()),
    }
}

fn reconcile_session(
    previous: &SessionState,
    session: &ActiveSessionPayload,
    top_level_blocklist: Option<&[String]>,
) -> Reconciliation {
    let Some(start_time) = session
        .started_at
        .as_ref()
        .or(session.created_at.as_ref())
        .and_then(parse_timestamp)
    else {
        return Reconciliation::Invalid("activeSession has no readable start time".to_string());
    };
    let Some(duration_sec) = session.planned_duration_sec.as_ref().and_then(parse_seconds) else {
        return Reconciliation::Invalid(
            "activeSession has no readable planned_duration_sec".to_string(),
        );
    };
    let Some(subject) = session
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|subject| !subject.is_empty())
    else {
        return Reconciliation::Invalid("activeSession has no subject".to_string());
    };
    let Some(end_time) = end_time_for(start_time, duration_sec) else {
        return Reconciliation::Invalid("activeSession end time is out of range".to_string());
    };

    if previous.status == SessionStatus::Focusing
        && previous.subject.as_deref() == Some(subject)
        && previous.end_time == Some(end_time)
    {
        return Reconciliation::Unchanged;
    }

    let blocklist = top_level_blocklist
        .or(session.blocklist.as_deref())
        .map(Blocklist::new)
        .unwrap_or_default();
    let Some(next) = SessionState::focusing(subject, start_time, duration_sec, blocklist) else {
        return Reconciliation::Invalid("activeSession end time is out of range".to_string());
    };
    let sync_blocklist =
        (previous.status == SessionStatus::Break).then(|| next.blocklist.clone());

    Reconciliation::Apply {
        next,
        sync_blocklist,
    }
}

fn reconcile_break(
    previous: &SessionState,
    active_break: &ActiveBreakPayload,
    top_level_blocklist: Option<&[String]>,
) -> Reconciliation {
    let Some(start_time) = active_break.started_at.as_ref().and_then(parse_timestamp) else {
        return Reconciliation::Invalid("activeBreak has no readable start time".to_string());
    };
    let Some(duration_sec) = active_break.duration_sec.as_ref().and_then(parse_seconds) else {
        return Reconciliation::Invalid("activeBreak has no readable duration_sec".to_string());
    };
    let Some(next_payload) = active_break.next_session.as_ref() else {
        return Reconciliation::Invalid("activeBreak has no next_session".to_string());
    };
    let Some(next_subject) = next_payload
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|subject| !subject.is_empty())
    else {
        return Reconciliation::Invalid("activeBreak next_session has no subject".to_string());
    };
    let Some(end_time) = end_time_for(start_time, duration_sec) else {
        return Reconciliation::Invalid("activeBreak end time is out of range".to_string());
    };

    if previous.status == SessionStatus::Break
        && previous.end_time == Some(end_time)
        && previous
            .next_session
            .as_ref()
            .is_some_and(|queued| queued.subject == next_subject)
    {
        return Reconciliation::Unchanged;
    }

    let next_session = NextSession {
        subject: next_subject.to_string(),
        duration_sec: next_payload
            .planned_duration_sec
            .as_ref()
            .and_then(parse_seconds)
            .unwrap_or(0),
        blocklist: next_payload
            .blocklist
            .as_deref()
            .or(top_level_blocklist)
            .map(Blocklist::new)
            .unwrap_or_default(),
    };
    match SessionState::on_break(start_time, duration_sec, next_session) {
        Some(next) => Reconciliation::Apply {
            next,
            sync_blocklist: None,
        },
        None => Reconciliation::Invalid("activeBreak end time is out of range".to_string()),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            DateTime::parse_from_rfc3339(raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| seconds.round() as u64)
        }),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Updated(SessionStatus),
    Skipped,
    FetchFailed,
}

#[derive(Debug)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub blocklist_sync: Option<JoinHandle<()>>,
}

impl SyncReport {
    fn without_sync(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            blocklist_sync: None,
        }
    }
}

pub struct SessionSynchronizer<R, S>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    remote: Arc<R>,
    sessions: Arc<SessionStore<S>>,
    consecutive_errors: AtomicU64,
    consecutive_invalid: AtomicU64,
}

impl<R, S> SessionSynchronizer<R, S>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    pub fn new(remote: Arc<R>, sessions: Arc<SessionStore<S>>) -> Self {
        Self {
            remote,
            sessions,
            consecutive_errors: AtomicU64::new(0),
            consecutive_invalid: AtomicU64::new(0),
        }
    }

    pub fn consecutive_errors(&self) -> u64 {
        self.consecutive_errors.load(Ordering::Relaxed)
    }

    pub async fn sync_once(&self) -> SyncReport {
        let status = match self.remote.fetch_status().await {
            Ok(status) => {
                self.consecutive_errors.store(0, Ordering::Relaxed);
                status
            }
            Err(error) => {
                let failures = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if should_log(failures) {
                    warn!(%error, failures, "session sync failed");
                }
                return SyncReport::without_sync(SyncOutcome::FetchFailed);
            }
        };

        let applied = self.sessions.transition(|previous| match reconcile(previous, &status) {
            Reconciliation::Apply {
                next,
                sync_blocklist,
            } => {
                let status = next.status;
                (Some(next), Ok(Some((status, sync_blocklist))))
            }
            Reconciliation::Unchanged => (None, Ok(None)),
            Reconciliation::Invalid(reason) => (None, Err(reason)),
        });

        match applied {
            Ok(Ok(None)) => {
                self.consecutive_invalid.store(0, Ordering::Relaxed);
                SyncReport::without_sync(SyncOutcome::Unchanged)
            }
            Ok(Ok(Some((status, sync_blocklist)))) => {
                self.consecutive_invalid.store(0, Ordering::Relaxed);
                info!(status = status.as_str(), "session updated from server");
                SyncReport {
                    outcome: SyncOutcome::Updated(status),
                    blocklist_sync: sync_blocklist.map(|blocklist| self.spawn_blocklist_sync(blocklist)),
                }
            }
            Ok(Err(reason)) => {
                let skipped = self.consecutive_invalid.fetch_add(1, Ordering::Relaxed) + 1;
                if should_log(skipped) {
                    warn!(%reason, skipped, "ignoring unreadable server session");
                }
                SyncReport::without_sync(SyncOutcome::Skipped)
            }
            Err(error) => {
                warn!(%error, "failed to store synced session");
                SyncReport::without_sync(SyncOutcome::Skipped)
            }
        }
    }

    pub async fn run<F>(&self, mut visibility: watch::Receiver<Visibility>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(SYNC_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut visibility_open = true;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("session sync stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if *visibility.borrow() == Visibility::Visible {
                        self.sync_once().await;
                    }
                }
                changed = visibility.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                        continue;
                    }
                    if *visibility.borrow_and_update() == Visibility::Visible {
                        self.sync_once().await;
                        ticker.reset();
                    }
                }
            }
        }
    }

    fn spawn_blocklist_sync(&self, blocklist: Blocklist) -> JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            if let Err(error) = remote.sync_blocklist(blocklist.as_slice()).await {
                warn!(error = %error, "blocklist sync failed");
            }
        })
    }
}

fn should_log(consecutive: u64) -> bool {
    consecutive == 1 || consecutive % LOG_EVERY_N_FAILURES == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{EventEnvelope, SessionEvent};
    use crate::infrastructure::error::InfraError;
    use crate::infrastructure::relay_client::NextSessionStatusPayload;
    use crate::infrastructure::state_store::InMemoryStateStore;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct ScriptedRemote {
        statuses: Mutex<VecDeque<Result<StatusResponse, String>>>,
        fetches: AtomicUsize,
        sent: Mutex<Vec<EventEnvelope>>,
    }

    impl ScriptedRemote {
        fn with_statuses(statuses: Vec<Result<StatusResponse, String>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<EventEnvelope> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    #[async_trait]
    impl LockInRemote for ScriptedRemote {
        async fn fetch_status(&self) -> Result<StatusResponse, InfraError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.statuses.lock().expect("statuses lock").pop_front() {
                Some(Ok(status)) => Ok(status),
                Some(Err(message)) => Err(InfraError::Network(message)),
                None => Ok(StatusResponse::default()),
            }
        }

        async fn post_event(&self, envelope: &EventEnvelope) -> Result<Value, InfraError> {
            self.sent.lock().expect("sent lock").push(envelope.clone());
            Ok(json!({}))
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn focusing() -> SessionState {
        SessionState::focusing(
            "Write essay",
            fixed_time("2026-02-16T09:00:00Z"),
            1500,
            Blocklist::new(["x.com"]),
        )
        .expect("focusing")
    }

    fn on_break() -> SessionState {
        SessionState::on_break(
            fixed_time("2026-02-16T09:25:00Z"),
            600,
            NextSession {
                subject: "Review".to_string(),
                duration_sec: 1500,
                blocklist: Blocklist::new(["y.com"]),
            },
        )
        .expect("break")
    }

    fn active_session(started_at: Value, duration: Value) -> StatusResponse {
        StatusResponse {
            active_session: Some(ActiveSessionPayload {
                subject: Some("Review".to_string()),
                started_at: Some(started_at),
                created_at: None,
                planned_duration_sec: Some(duration),
                blocklist: None,
            }),
            active_break: None,
            blocklist: Some(vec!["y.com".to_string()]),
        }
    }

    fn active_break(
        started_at: Value,
        duration: Value,
        next_session: Option<NextSessionStatusPayload>,
    ) -> StatusResponse {
        StatusResponse {
            active_break: Some(ActiveBreakPayload {
                started_at: Some(started_at),
                duration_sec: Some(duration),
                next_session,
            }),
            ..StatusResponse::default()
        }
    }

    fn queued(subject: &str) -> Option<NextSessionStatusPayload> {
        Some(NextSessionStatusPayload {
            subject: Some(subject.to_string()),
            planned_duration_sec: Some(json!(1500)),
            blocklist: Some(vec!["y.com".to_string()]),
        })
    }

    fn synchronizer_with(
        previous: SessionState,
        statuses: Vec<Result<StatusResponse, String>>,
    ) -> (
        SessionSynchronizer<ScriptedRemote, InMemoryStateStore>,
        Arc<ScriptedRemote>,
        Arc<SessionStore<InMemoryStateStore>>,
    ) {
        let remote = Arc::new(ScriptedRemote::with_statuses(statuses));
        let sessions = Arc::new(
            SessionStore::load(Arc::new(InMemoryStateStore::default())).expect("load sessions"),
        );
        sessions.replace(previous).expect("seed session");
        (
            SessionSynchronizer::new(remote.clone(), sessions.clone()),
            remote,
            sessions,
        )
    }

    async fn settle(report: SyncReport) -> SyncOutcome {
        if let Some(handle) = report.blocklist_sync {
            handle.await.expect("blocklist sync task");
        }
        report.outcome
    }

    #[test]
    fn active_session_prefers_started_at_over_created_at() {
        let mut status = active_session(json!("2026-02-16T10:00:00Z"), json!(1500));
        if let Some(session) = status.active_session.as_mut() {
            session.created_at = Some(json!("2026-02-16T08:00:00Z"));
        }
        match reconcile(&SessionState::idle(), &status) {
            Reconciliation::Apply { next, sync_blocklist } => {
                assert_eq!(next.start_time, Some(fixed_time("2026-02-16T10:00:00Z")));
                assert_eq!(next.end_time, Some(fixed_time("2026-02-16T10:25:00Z")));
                assert_eq!(next.blocklist, Blocklist::new(["y.com"]));
                assert_eq!(sync_blocklist, None);
            }
            other => panic!("expected apply, got {other:?}"),
        }
    }

    #[test]
    fn active_session_falls_back_to_created_at_and_session_blocklist() {
        let status = StatusResponse {
            active_session: Some(ActiveSessionPayload {
                subject: Some("Review".to_string()),
                started_at: None,
                created_at: Some(json!("2026-02-16T10:00:00.000")),
                planned_duration_sec: Some(json!(60.4)),
                blocklist: Some(vec!["z.com".to_string()]),
            }),
            ..StatusResponse::default()
        };
        match reconcile(&SessionState::idle(), &status) {
            Reconciliation::Apply { next, .. } => {
                assert_eq!(next.start_time, Some(fixed_time("2026-02-16T10:00:00Z")));
                assert_eq!(next.duration_sec, Some(60));
                assert_eq!(next.blocklist, Blocklist::new(["z.com"]));
            }
            other => panic!("expected apply, got {other:?}"),
        }
    }

    #[test]
    fn matching_focus_session_is_unchanged() {
        let status = StatusResponse {
            active_session: Some(ActiveSessionPayload {
                subject: Some("Write essay".to_string()),
                started_at: Some(json!("2026-02-16T09:00:00Z")),
                planned_duration_sec: Some(json!(1500)),
                ..ActiveSessionPayload::default()
            }),
            ..StatusResponse::default()
        };
        assert_eq!(reconcile(&focusing(), &status), Reconciliation::Unchanged);
    }

    #[test]
    fn active_break_moves_to_break_with_next_session() {
        let status = StatusResponse {
            active_break: Some(ActiveBreakPayload {
                started_at: Some(json!("2026-02-16T09:25:00Z")),
                duration_sec: Some(json!(600)),
                next_session: Some(NextSessionStatusPayload {
                    subject: Some("Review".to_string()),
                    planned_duration_sec: Some(json!(1500)),
                    blocklist: Some(vec!["y.com".to_string()]),
                }),
            }),
            ..StatusResponse::default()
        };
        assert_eq!(
            reconcile(&focusing(), &status),
            Reconciliation::Apply {
                next: on_break(),
                sync_blocklist: None,
            }
        );
        assert_eq!(reconcile(&on_break(), &status), Reconciliation::Unchanged);
    }

    #[test]
    fn idle_without_server_session_is_unchanged() {
        assert_eq!(
            reconcile(&SessionState::idle(), &StatusResponse::default()),
            Reconciliation::Unchanged
        );
    }

    #[tokio::test]
    async fn break_to_server_session_syncs_new_blocklist_once() {
        let (synchronizer, remote, sessions) = synchronizer_with(
            on_break(),
            vec![
                Ok(active_session(json!("2026-02-16T09:35:00Z"), json!(1500))),
                Ok(active_session(json!("2026-02-16T09:35:00Z"), json!(1500))),
            ],
        );

        let outcome = settle(synchronizer.sync_once().await).await;
        assert_eq!(outcome, SyncOutcome::Updated(SessionStatus::Focusing));
        assert_eq!(
            remote.sent().into_iter().map(|sent| sent.event).collect::<Vec<_>>(),
            vec![SessionEvent::SyncBlocklist {
                blocklist: vec!["y.com".to_string()],
            }]
        );
        assert_eq!(
            sessions.snapshot().expect("snapshot").status,
            SessionStatus::Focusing
        );

        let repeat = settle(synchronizer.sync_once().await).await;
        assert_eq!(repeat, SyncOutcome::Unchanged);
        assert_eq!(remote.sent().len(), 1);
    }

    #[tokio::test]
    async fn server_end_of_focus_syncs_previous_blocklist_and_goes_idle() {
        let (synchronizer, remote, sessions) =
            synchronizer_with(focusing(), vec![Ok(StatusResponse::default())]);

        let outcome = settle(synchronizer.sync_once().await).await;
        assert_eq!(outcome, SyncOutcome::Updated(SessionStatus::Idle));
        assert!(sessions.snapshot().expect("snapshot").is_idle());
        assert_eq!(
            remote.sent().into_iter().map(|sent| sent.event).collect::<Vec<_>>(),
            vec![SessionEvent::SyncBlocklist {
                blocklist: vec!["x.com".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn server_end_of_break_syncs_queued_blocklist_and_goes_idle() {
        let (synchronizer, remote, sessions) =
            synchronizer_with(on_break(), vec![Ok(StatusResponse::default())]);

        let outcome = settle(synchronizer.sync_once().await).await;
        assert_eq!(outcome, SyncOutcome::Updated(SessionStatus::Idle));
        assert!(sessions.snapshot().expect("snapshot").is_idle());
        assert_eq!(
            remote.sent().into_iter().map(|sent| sent.event).collect::<Vec<_>>(),
            vec![SessionEvent::SyncBlocklist {
                blocklist: vec!["y.com".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn unreadable_server_break_is_skipped_and_counted() {
        let bad_break = active_break(json!("not a time"), json!(600), queued("Review"));
        let (synchronizer, remote, sessions) = synchronizer_with(
            focusing(),
            vec![
                Ok(bad_break.clone()),
                Ok(bad_break),
                Ok(active_session(json!("2026-02-16T09:00:00Z"), json!(1500))),
            ],
        );

        assert_eq!(synchronizer.sync_once().await.outcome, SyncOutcome::Skipped);
        assert_eq!(synchronizer.sync_once().await.outcome, SyncOutcome::Skipped);
        assert_eq!(synchronizer.consecutive_invalid.load(Ordering::Relaxed), 2);
        assert_eq!(sessions.snapshot().expect("snapshot"), focusing());
        assert!(remote.sent().is_empty());

        let outcome = settle(synchronizer.sync_once().await).await;
        assert_eq!(outcome, SyncOutcome::Updated(SessionStatus::Focusing));
        assert_eq!(synchronizer.consecutive_invalid.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn fetch_failures_are_counted_and_leave_state_alone() {
        let (synchronizer, remote, sessions) = synchronizer_with(
            focusing(),
            vec![
                Err("connection refused".to_string()),
                Err("connection refused".to_string()),
                Ok(active_session(json!("2026-02-16T09:00:00Z"), json!(1500))),
            ],
        );

        assert_eq!(synchronizer.sync_once().await.outcome, SyncOutcome::FetchFailed);
        assert_eq!(synchronizer.sync_once().await.outcome, SyncOutcome::FetchFailed);
        assert_eq!(synchronizer.consecutive_errors(), 2);
        assert_eq!(sessions.snapshot().expect("snapshot"), focusing());

        settle(synchronizer.sync_once().await).await;
        assert_eq!(synchronizer.consecutive_errors(), 0);
        assert!(remote.sent().is_empty());
    }

    #[test]
    fn failure_logging_is_rate_limited() {
        let logged: Vec<u64> = (1..=30).filter(|count| should_log(*count)).collect();
        assert_eq!(logged, vec![1, 10, 20, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_while_visible_and_resyncs_on_focus() {
        let (synchronizer, remote, _) = synchronizer_with(SessionState::idle(), Vec::new());
        let synchronizer = Arc::new(synchronizer);
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let worker = {
            let synchronizer = Arc::clone(&synchronizer);
            tokio::spawn(async move {
                synchronizer
                    .run(visibility_rx, async {
                        let _ = stop_rx.await;
                    })
                    .await;
            })
        };

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 3);

        visibility_tx.send(Visibility::Hidden).expect("send hidden");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 3);

        visibility_tx.send(Visibility::Visible).expect("send visible");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 4);

        stop_tx.send(()).expect("stop");
        worker.await.expect("worker");
    }

    proptest! {
        #[test]
        fn unreadable_active_session_leaves_state_unchanged(
            started_at in prop_oneof![
                Just(json!(null)),
                Just(json!(true)),
                "[a-z ]{0,12}".prop_map(Value::String),
            ],
            duration in prop_oneof![Just(json!(-5)), Just(json!("soon")), Just(json!(null))],
            use_bad_start in any::<bool>(),
        ) {
            let (start, duration) = if use_bad_start {
                (started_at, json!(1500))
            } else {
                (json!("2026-02-16T10:00:00Z"), duration)
            };
            let status = active_session(start, duration);

            for previous in [SessionState::idle(), focusing(), on_break()] {
                let outcome = reconcile(&previous, &status);
                prop_assert!(matches!(outcome, Reconciliation::Invalid(_)));
            }
        }

        #[test]
        fn unreadable_active_break_leaves_state_unchanged(
            defect in 0usize..5,
            blank_subject in "[ \t]{0,4}",
            bad_value in prop_oneof![
                Just(json!(null)),
                Just(json!(false)),
                Just(json!({ "at": 1 })),
                "[a-z ]{1,12}".prop_map(Value::String),
            ],
        ) {
            let start = json!("2026-02-16T09:25:00Z");
            let status = match defect {
                0 => active_break(bad_value, json!(600), queued("Review")),
                1 => active_break(start, bad_value, queued("Review")),
                2 => active_break(start, json!(600), None),
                3 => active_break(start, json!(600), queued(&blank_subject)),
                _ => active_break(start, json!(u64::MAX), queued("Review")),
            };

            for previous in [SessionState::idle(), focusing(), on_break()] {
                let outcome = reconcile(&previous, &status);
                prop_assert!(matches!(outcome, Reconciliation::Invalid(_)));
            }
        }
    }
}
