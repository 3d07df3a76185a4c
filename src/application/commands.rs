use crate::application::bootstrap::bootstrap_workspace;
use crate::application::forms::FormStore;
use crate::application::session_actions::SessionActions;
use crate::application::session_store::SessionStore;
use crate::application::session_sync::{SessionSynchronizer, SyncOutcome, Visibility};
use crate::domain::models::{
    Blocklist, DEFAULT_BREAK_MINUTES, DurationField, DurationFields, SessionState, SessionStatus,
    custom_break_seconds, find_preset, format_countdown,
};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::relay_client::{LockInRemote, ReqwestLockInRemote};
use crate::infrastructure::state_store::{SqliteStateStore, StateStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AppState<R = ReqwestLockInRemote, S = SqliteStateStore>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    relay_url: String,
    remote: Arc<R>,
    sessions: Arc<SessionStore<S>>,
    forms: FormStore<S>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&config.home)?;
        let store = Arc::new(SqliteStateStore::new(&bootstrap.database_path));
        let remote = Arc::new(ReqwestLockInRemote::new(config.relay_url.clone()));
        Self::from_parts(config.relay_url, remote, store)
    }
}

impl<R, S> AppState<R, S>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    pub fn from_parts(
        relay_url: String,
        remote: Arc<R>,
        store: Arc<S>,
    ) -> Result<Self, InfraError> {
        let sessions = Arc::new(SessionStore::load(Arc::clone(&store))?);
        Ok(Self {
            relay_url,
            remote,
            sessions,
            forms: FormStore::new(store),
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        if error.is_validation() {
            warn!(command, %error, "command rejected");
        } else {
            error!(command, %error, "command failed");
        }
        error.to_string()
    }

    fn actions(&self) -> SessionActions<R, S> {
        SessionActions::new(Arc::clone(&self.remote), Arc::clone(&self.sessions))
            .with_now_provider(Arc::clone(&self.now_provider))
    }

    fn synchronizer(&self) -> SessionSynchronizer<R, S> {
        SessionSynchronizer::new(Arc::clone(&self.remote), Arc::clone(&self.sessions))
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    fn view(&self, session: &SessionState) -> SessionView {
        SessionView::from_state(session, self.now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    pub subject: Option<String>,
    pub remaining_seconds: u64,
    pub countdown: String,
    pub progress_percent: f64,
    pub overtime: bool,
    pub end_time: Option<DateTime<Utc>>,
    pub next_subject: Option<String>,
    pub blocklist: Vec<String>,
}

impl SessionView {
    pub fn from_state(session: &SessionState, now: DateTime<Utc>) -> Self {
        let remaining_seconds = session.remaining_seconds(now);
        Self {
            status: session.status,
            subject: session.subject.clone(),
            remaining_seconds,
            countdown: format_countdown(remaining_seconds),
            progress_percent: session.progress_percent(now),
            overtime: session.is_overtime(now),
            end_time: session.end_time,
            next_subject: session
                .next_session
                .as_ref()
                .map(|next| next.subject.clone()),
            blocklist: session.blocklist.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationView {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    pub active_preset: Option<String>,
    pub total_seconds: u64,
}

impl From<&DurationFields> for DurationView {
    fn from(fields: &DurationFields) -> Self {
        Self {
            hours: fields.hours.clone(),
            minutes: fields.minutes.clone(),
            seconds: fields.seconds.clone(),
            active_preset: fields.active_preset.clone(),
            total_seconds: fields.total_seconds(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationUpdate {
    pub preset: Option<String>,
    pub hours: Option<String>,
    pub minutes: Option<String>,
    pub seconds: Option<String>,
}

impl DurationUpdate {
    fn is_empty(&self) -> bool {
        self.preset.is_none()
            && self.hours.is_none()
            && self.minutes.is_none()
            && self.seconds.is_none()
    }
}

pub fn get_session_impl<R, S>(state: &AppState<R, S>) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    Ok(state.view(&state.sessions.snapshot()?))
}

pub async fn refresh_session_impl<R, S>(state: &AppState<R, S>) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let report = state.synchronizer().sync_once().await;
    if report.outcome == SyncOutcome::FetchFailed {
        warn!(relay_url = state.relay_url(), "showing stored session, relay unreachable");
    }
    if let Some(handle) = report.blocklist_sync {
        if let Err(error) = handle.await {
            warn!(%error, "blocklist sync task did not finish");
        }
    }
    get_session_impl(state)
}

pub async fn start_session_impl<R, S>(
    state: &AppState<R, S>,
    subject: Option<String>,
    duration: DurationUpdate,
) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let subject = match subject {
        Some(subject) => {
            state.forms.save_subject(&subject)?;
            subject
        }
        None => state.forms.load_subject()?,
    };
    let fields = if duration.is_empty() {
        state.forms.load_duration()?
    } else {
        set_duration_fields(state, duration)?
    };
    let blocklist = state.forms.load_blocklist()?;
    let total_seconds = i64::try_from(fields.total_seconds()).unwrap_or(i64::MAX);

    let session = state.actions().start(&subject, total_seconds, &blocklist).await?;
    Ok(state.view(&session))
}

pub async fn stop_session_impl<R, S>(
    state: &AppState<R, S>,
    reason: Option<String>,
) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let session = state.actions().stop(reason.as_deref()).await?;
    Ok(state.view(&session))
}

pub async fn start_break_impl<R, S>(
    state: &AppState<R, S>,
    break_minutes: Option<String>,
    next_subject: Option<String>,
) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let break_seconds = break_minutes
        .as_deref()
        .map(custom_break_seconds)
        .unwrap_or(DEFAULT_BREAK_MINUTES * 60);
    let next_subject = match next_subject {
        Some(subject) => {
            state.forms.save_subject(&subject)?;
            subject
        }
        None => state.forms.load_subject()?,
    };
    let next_duration = state.forms.load_duration()?.total_seconds();
    let blocklist = state.forms.load_blocklist()?;

    let session = state
        .actions()
        .start_break(
            i64::try_from(break_seconds).unwrap_or(i64::MAX),
            &next_subject,
            i64::try_from(next_duration).unwrap_or(i64::MAX),
            &blocklist,
        )
        .await?;
    Ok(state.view(&session))
}

pub async fn end_break_impl<R, S>(
    state: &AppState<R, S>,
    reason: Option<String>,
) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let session = state.actions().stop_break(reason.as_deref()).await?;
    Ok(state.view(&session))
}

pub async fn skip_break_impl<R, S>(state: &AppState<R, S>) -> Result<SessionView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let session = state.actions().skip_break().await?;
    Ok(state.view(&session))
}

pub async fn watch_session_impl<R, S, F>(
    state: &AppState<R, S>,
    visibility: watch::Receiver<Visibility>,
    shutdown: F,
) where
    R: LockInRemote + 'static,
    S: StateStore,
    F: Future<Output = ()>,
{
    info!(relay_url = state.relay_url(), "watching session");
    state.synchronizer().run(visibility, shutdown).await;
}

pub fn get_subject_impl<R, S>(state: &AppState<R, S>) -> Result<String, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    state.forms.load_subject()
}

pub fn set_subject_impl<R, S>(state: &AppState<R, S>, subject: String) -> Result<String, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    state.forms.save_subject(&subject)?;
    Ok(subject)
}

pub fn get_duration_impl<R, S>(state: &AppState<R, S>) -> Result<DurationView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    Ok(DurationView::from(&state.forms.load_duration()?))
}

pub fn set_duration_impl<R, S>(
    state: &AppState<R, S>,
    update: DurationUpdate,
) -> Result<DurationView, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    Ok(DurationView::from(&set_duration_fields(state, update)?))
}

fn set_duration_fields<R, S>(
    state: &AppState<R, S>,
    update: DurationUpdate,
) -> Result<DurationFields, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let mut fields = state.forms.load_duration()?;

    if let Some(label) = update.preset.as_deref() {
        let preset = find_preset(label)
            .ok_or_else(|| InfraError::validation(format!("Unknown preset '{label}'")))?;
        fields.set_preset(preset);
    }

    let edits = [
        (DurationField::Hours, "Hours", update.hours),
        (DurationField::Minutes, "Minutes", update.minutes),
        (DurationField::Seconds, "Seconds", update.seconds),
    ];
    for (field, label, value) in edits {
        let Some(value) = value else {
            continue;
        };
        if !fields.handle_change(field, value.trim()) {
            return Err(InfraError::validation(format!(
                "{label} must be at most two digits"
            )));
        }
        fields.handle_blur(field);
    }

    state.forms.save_duration(&fields)?;
    Ok(fields)
}

pub fn list_blocklist_impl<R, S>(state: &AppState<R, S>) -> Result<Blocklist, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    state.forms.load_blocklist()
}

pub fn add_blocked_domain_impl<R, S>(
    state: &AppState<R, S>,
    domain: String,
) -> Result<Blocklist, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let mut blocklist = state.forms.load_blocklist()?;
    if !blocklist.add(&domain) {
        return Err(InfraError::validation(format!(
            "'{}' is empty or already blocked",
            domain.trim()
        )));
    }
    state.forms.save_blocklist(&blocklist)?;
    info!(domain = domain.trim(), "domain added to blocklist");
    Ok(blocklist)
}

pub fn remove_blocked_domain_impl<R, S>(
    state: &AppState<R, S>,
    domain: String,
) -> Result<Blocklist, InfraError>
where
    R: LockInRemote + 'static,
    S: StateStore,
{
    let mut blocklist = state.forms.load_blocklist()?;
    if !blocklist.remove(&domain) {
        return Err(InfraError::validation(format!(
            "'{}' is not in the blocklist",
            domain.trim()
        )));
    }
    state.forms.save_blocklist(&blocklist)?;
    info!(domain = domain.trim(), "domain removed from blocklist");
    Ok(blocklist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{EventEnvelope, SessionEvent};
    use crate::infrastructure::relay_client::{ActiveSessionPayload, StatusResponse};
    use crate::infrastructure::state_store::InMemoryStateStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRemote {
        status: Mutex<Option<StatusResponse>>,
        sent: Mutex<Vec<EventEnvelope>>,
    }

    impl FakeRemote {
        fn sent(&self) -> Vec<SessionEvent> {
            self.sent
                .lock()
                .expect("sent lock")
                .iter()
                .map(|envelope| envelope.event.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LockInRemote for FakeRemote {
        async fn fetch_status(&self) -> Result<StatusResponse, InfraError> {
            self.status
                .lock()
                .expect("status lock")
                .clone()
                .ok_or_else(|| InfraError::Network("relay unreachable".to_string()))
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

    fn app() -> (AppState<FakeRemote, InMemoryStateStore>, Arc<FakeRemote>) {
        let remote = Arc::new(FakeRemote::default());
        let now = fixed_time("2026-02-16T09:00:00Z");
        let state = AppState::from_parts(
            "http://127.0.0.1:3000/api/hia".to_string(),
            remote.clone(),
            Arc::new(InMemoryStateStore::default()),
        )
        .expect("app state")
        .with_now_provider(Arc::new(move || now));
        (state, remote)
    }

    #[tokio::test]
    async fn start_uses_stored_form_state() {
        let (state, remote) = app();
        set_subject_impl(&state, "Write essay".to_string()).expect("subject");
        add_blocked_domain_impl(&state, "X.com".to_string()).expect("add domain");

        let view = start_session_impl(&state, None, DurationUpdate::default())
            .await
            .expect("start");
        assert_eq!(view.status, SessionStatus::Focusing);
        assert_eq!(view.countdown, "50:00");
        assert_eq!(view.progress_percent, 100.0);

        match &remote.sent()[0] {
            SessionEvent::SessionStart {
                subject,
                planned_duration_sec,
                blocklist,
            } => {
                assert_eq!(subject, "Write essay");
                assert_eq!(*planned_duration_sec, 3000);
                assert!(blocklist.contains(&"x.com".to_string()));
                assert!(blocklist.contains(&"youtube.com".to_string()));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_without_subject_is_rejected_before_sending() {
        let (state, remote) = app();
        let error = start_session_impl(&state, None, DurationUpdate::default())
            .await
            .expect_err("subject missing");
        assert_eq!(error.to_string(), "Subject is required");
        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn break_defaults_to_ten_minutes_and_custom_minutes_fall_back() {
        let (state, remote) = app();
        set_subject_impl(&state, "Review".to_string()).expect("subject");

        let view = start_break_impl(&state, None, None).await.expect("break");
        assert_eq!(view.status, SessionStatus::Break);
        assert_eq!(view.countdown, "10:00");
        assert_eq!(view.next_subject.as_deref(), Some("Review"));

        start_break_impl(&state, Some("abc".to_string()), None)
            .await
            .expect("custom break");
        assert!(matches!(
            remote.sent().last(),
            Some(SessionEvent::BreakStart { duration_sec: 300, .. })
        ));
    }

    #[test]
    fn duration_updates_validate_and_persist() {
        let (state, _) = app();
        let view = set_duration_impl(
            &state,
            DurationUpdate {
                preset: Some("25m".to_string()),
                ..DurationUpdate::default()
            },
        )
        .expect("preset");
        assert_eq!(view.total_seconds, 1500);
        assert_eq!(view.active_preset.as_deref(), Some("25m"));

        let view = set_duration_impl(
            &state,
            DurationUpdate {
                seconds: Some("5".to_string()),
                ..DurationUpdate::default()
            },
        )
        .expect("seconds");
        assert_eq!(view.seconds, "05");
        assert_eq!(view.active_preset, None);
        assert_eq!(get_duration_impl(&state).expect("get").total_seconds, 1505);

        let error = set_duration_impl(
            &state,
            DurationUpdate {
                minutes: Some("120".to_string()),
                ..DurationUpdate::default()
            },
        )
        .expect_err("too long");
        assert!(error.is_validation());

        assert!(
            set_duration_impl(
                &state,
                DurationUpdate {
                    preset: Some("3h".to_string()),
                    ..DurationUpdate::default()
                },
            )
            .is_err()
        );
    }

    #[test]
    fn blocklist_commands_reject_duplicates_and_unknown_domains() {
        let (state, _) = app();
        assert_eq!(list_blocklist_impl(&state).expect("list"), Blocklist::defaults());
        assert!(add_blocked_domain_impl(&state, "Reddit.com".to_string()).is_err());
        let list = remove_blocked_domain_impl(&state, "reddit.com".to_string()).expect("remove");
        assert!(!list.contains("reddit.com"));
        assert!(remove_blocked_domain_impl(&state, "reddit.com".to_string()).is_err());
    }

    #[tokio::test]
    async fn refresh_falls_back_to_stored_session_when_relay_is_down() {
        let (state, _) = app();
        let view = refresh_session_impl(&state).await.expect("refresh");
        assert_eq!(view.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn refresh_adopts_server_session() {
        let (state, remote) = app();
        *remote.status.lock().expect("status lock") = Some(StatusResponse {
            active_session: Some(ActiveSessionPayload {
                subject: Some("Server side".to_string()),
                started_at: Some(json!("2026-02-16T08:50:00Z")),
                planned_duration_sec: Some(json!(1500)),
                ..ActiveSessionPayload::default()
            }),
            ..StatusResponse::default()
        });

        let view = refresh_session_impl(&state).await.expect("refresh");
        assert_eq!(view.status, SessionStatus::Focusing);
        assert_eq!(view.subject.as_deref(), Some("Server side"));
        assert_eq!(view.remaining_seconds, 900);
        assert!(remote.sent().is_empty());
    }
}
