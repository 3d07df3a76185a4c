use crate::domain::models::{Blocklist, DurationFields};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::state_store::{
    BLOCKLIST_KEY, HOURS_KEY, MINUTES_KEY, PRESET_KEY, SECONDS_KEY, StateStore, SUBJECT_KEY,
};
use std::sync::Arc;
use tracing::warn;

pub struct FormStore<S>
where
    S: StateStore,
{
    store: Arc<S>,
}

impl<S> FormStore<S>
where
    S: StateStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn load_duration(&self) -> Result<DurationFields, InfraError> {
        let mut fields = DurationFields::default();
        if let Some(hours) = self.store.get(HOURS_KEY)? {
            fields.hours = hours;
        }
        if let Some(minutes) = self.store.get(MINUTES_KEY)? {
            fields.minutes = minutes;
        }
        if let Some(seconds) = self.store.get(SECONDS_KEY)? {
            fields.seconds = seconds;
        }
        if let Some(preset) = self.store.get(PRESET_KEY)? {
            fields.active_preset = Some(preset).filter(|label| !label.is_empty());
        }
        Ok(fields)
    }

    pub fn save_duration(&self, fields: &DurationFields) -> Result<(), InfraError> {
        self.store.set(HOURS_KEY, &fields.hours)?;
        self.store.set(MINUTES_KEY, &fields.minutes)?;
        self.store.set(SECONDS_KEY, &fields.seconds)?;
        self.store
            .set(PRESET_KEY, fields.active_preset.as_deref().unwrap_or_default())
    }

    pub fn load_subject(&self) -> Result<String, InfraError> {
        Ok(self.store.get(SUBJECT_KEY)?.unwrap_or_default())
    }

    pub fn save_subject(&self, subject: &str) -> Result<(), InfraError> {
        self.store.set(SUBJECT_KEY, subject)
    }

    pub fn load_blocklist(&self) -> Result<Blocklist, InfraError> {
        let Some(raw) = self.store.get(BLOCKLIST_KEY)? else {
            return Ok(Blocklist::defaults());
        };
        match serde_json::from_str::<Blocklist>(&raw) {
            Ok(blocklist) => Ok(blocklist),
            Err(error) => {
                warn!(%error, "stored blocklist is unreadable, using defaults");
                Ok(Blocklist::defaults())
            }
        }
    }

    pub fn save_blocklist(&self, blocklist: &Blocklist) -> Result<(), InfraError> {
        let payload = serde_json::to_string(blocklist)?;
        self.store.set(BLOCKLIST_KEY, &payload)
    }
}
