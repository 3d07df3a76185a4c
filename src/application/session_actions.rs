use crate::application::session_store::SessionStore;
use crate::domain::events::NextSessionPayload;
use crate::domain::models::{
    BREAK_FINISHED_REASON, Blocklist, DEFAULT_STOP_REASON, NextSession, SessionState,
    validate_focus_request,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::relay_client::LockInRemote;
use crate::infrastructure::state_store::StateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct SessionActions<R, S>
where
    R: LockInRemote,
    S: StateStore,
{
    remote: Arc<R>,
    sessions: Arc<SessionStore<S>>,
    now_provider: NowProvider,
}

impl<R, S> SessionActions<R, S>
where
    R: LockInRemote,
    S: StateStore,
{
    pub fn new(remote: Arc<R>, sessions: Arc<SessionStore<S>>) -> Self {
        Self {
            remote,
            sessions,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn start(
        &self,
        subject: &str,
        duration_sec: i64,
        blocklist: &Blocklist,
    ) -> Result<SessionState, InfraError> {
        let duration_sec =
            validate_focus_request(subject, duration_sec).map_err(InfraError::Validation)?;
        let subject = subject.trim();

        self.remote
            .start_session(subject, duration_sec, blocklist.as_slice())
            .await?;

        let next = SessionState::focusing(subject, self.now(), duration_sec, blocklist.clone())
            .ok_or_else(|| InfraError::validation("Duration is too large"))?;
        self.sessions.replace(next.clone())?;
        info!(subject, duration_sec, "focus session started");
        Ok(next)
    }

    pub async fn stop(&self, reason: Option<&str>) -> Result<SessionState, InfraError> {
        let current = self.sessions.snapshot()?;
        let reason = non_blank(reason).unwrap_or(DEFAULT_STOP_REASON);

        self.remote
            .stop_session(current.blocklist.as_slice(), reason)
            .await?;

        self.sessions.replace(SessionState::idle())?;
        info!(reason, "focus session stopped");
        Ok(SessionState::idle())
    }

    pub async fn start_break(
        &self,
        break_duration_sec: i64,
        next_subject: &str,
        next_duration_sec: i64,
        next_blocklist: &Blocklist,
    ) -> Result<SessionState, InfraError> {
        if next_subject.trim().is_empty() {
            return Err(InfraError::validation(
                "Subject is required for the next session",
            ));
        }
        if break_duration_sec <= 0 {
            return Err(InfraError::validation(
                "Break duration must be greater than 0",
            ));
        }
        let next_duration_sec = validate_focus_request(next_subject, next_duration_sec)
            .map_err(InfraError::Validation)?;
        let break_duration_sec = break_duration_sec as u64;
        let next_subject = next_subject.trim();

        self.remote
            .start_break(
                break_duration_sec,
                NextSessionPayload {
                    subject: next_subject.to_string(),
                    planned_duration_sec: next_duration_sec,
                    blocklist: next_blocklist.to_vec(),
                },
            )
            .await?;

        let next = SessionState::on_break(
            self.now(),
            break_duration_sec,
            NextSession {
                subject: next_subject.to_string(),
                duration_sec: next_duration_sec,
                blocklist: next_blocklist.clone(),
            },
        )
        .ok_or_else(|| InfraError::validation("Break duration is too large"))?;
        self.sessions.replace(next.clone())?;
        info!(break_duration_sec, next_subject, "break started");
        Ok(next)
    }

    /// Ending a break early needs a reason. Once the break has run out the
    /// reason defaults to "Break finished".
    pub async fn stop_break(&self, reason: Option<&str>) -> Result<SessionState, InfraError> {
        let current = self.sessions.snapshot()?;
        let reason = match non_blank(reason) {
            Some(reason) => reason,
            None if current.is_overtime(self.now()) => BREAK_FINISHED_REASON,
            None => {
                return Err(InfraError::validation(
                    "A reason is required to end the break early",
                ));
            }
        };

        self.remote
            .stop_break(current.blocklist.as_slice(), reason)
            .await?;

        self.sessions.replace(SessionState::idle())?;
        info!(reason, "break stopped");
        Ok(SessionState::idle())
    }

    pub async fn skip_break(&self) -> Result<SessionState, InfraError> {
        let current = self.sessions.snapshot()?;

        self.remote.skip_break(current.blocklist.as_slice()).await?;

        self.sessions.replace(SessionState::idle())?;
        info!("break skipped");
        Ok(SessionState::idle())
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
