use crate::domain::models::SessionState;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::state_store::{SESSION_KEY, StateStore};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

pub struct SessionStore<S>
where
    S: StateStore,
{
    state: Mutex<SessionState>,
    store: Arc<S>,
}

impl<S> SessionStore<S>
where
    S: StateStore,
{
    pub fn load(store: Arc<S>) -> Result<Self, InfraError> {
        let restored = match store.get(SESSION_KEY)? {
            Some(raw) => match serde_json::from_str::<SessionState>(&raw) {
                Ok(session) if !session.is_idle() && session.validate().is_ok() => session,
                Ok(_) => SessionState::idle(),
                Err(error) => {
                    warn!(%error, "discarding unreadable persisted session");
                    store.remove(SESSION_KEY)?;
                    SessionState::idle()
                }
            },
            None => SessionState::idle(),
        };

        Ok(Self {
            state: Mutex::new(restored),
            store,
        })
    }

    pub fn snapshot(&self) -> Result<SessionState, InfraError> {
        Ok(self.lock()?.clone())
    }

    pub fn replace(&self, next: SessionState) -> Result<bool, InfraError> {
        let mut guard = self.lock()?;
        self.write(&mut guard, next)
    }

    pub fn transition<T, F>(&self, decide: F) -> Result<T, InfraError>
    where
        F: FnOnce(&SessionState) -> (Option<SessionState>, T),
    {
        let mut guard = self.lock()?;
        let (next, output) = decide(&guard);
        if let Some(next) = next {
            self.write(&mut guard, next)?;
        }
        Ok(output)
    }

    fn write(&self, current: &mut SessionState, next: SessionState) -> Result<bool, InfraError> {
        if *current == next {
            return Ok(false);
        }
        self.persist(&next)?;
        *current = next;
        Ok(true)
    }

    fn persist(&self, session: &SessionState) -> Result<(), InfraError> {
        if session.is_idle() {
            self.store.remove(SESSION_KEY)
        } else {
            let payload = serde_json::to_string(session)?;
            self.store.set(SESSION_KEY, &payload)
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("session state: {error}")))
    }
}
