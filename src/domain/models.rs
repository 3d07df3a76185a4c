use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BLOCKLIST: [&str; 4] = [
    "youtube.com",
    "reddit.com",
    "twitter.com",
    "instagram.com",
];

pub const DEFAULT_STOP_REASON: &str = "manual_end";
pub const BREAK_FINISHED_REASON: &str = "Break finished";

pub const BREAK_PRESET_MINUTES: [u64; 3] = [5, 10, 15];
pub const DEFAULT_BREAK_MINUTES: u64 = 10;
const CUSTOM_BREAK_FALLBACK_MINUTES: u64 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Idle,
    Focusing,
    Break,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Focusing => "FOCUSING",
            Self::Break => "BREAK",
        }
    }
}

/// Domains to block during a focus period. Entries are trimmed, lowercased
/// and deduplicated; equality ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Blocklist(Vec<String>);

impl Blocklist {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for domain in domains {
            list.add(domain.as_ref());
        }
        list
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_BLOCKLIST)
    }

    pub fn add(&mut self, domain: &str) -> bool {
        let clean = domain.trim().to_lowercase();
        if clean.is_empty() || self.0.contains(&clean) {
            return false;
        }
        self.0.push(clean);
        true
    }

    pub fn remove(&mut self, domain: &str) -> bool {
        let clean = domain.trim().to_lowercase();
        let before = self.0.len();
        self.0.retain(|existing| existing != &clean);
        self.0.len() != before
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.0.contains(&domain.trim().to_lowercase())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Blocklist {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut left: Vec<&String> = self.0.iter().collect();
        let mut right: Vec<&String> = other.0.iter().collect();
        left.sort();
        right.sort();
        left == right
    }
}

impl Eq for Blocklist {}

impl From<Vec<String>> for Blocklist {
    fn from(domains: Vec<String>) -> Self {
        Self::new(domains)
    }
}

impl From<Blocklist> for Vec<String> {
    fn from(list: Blocklist) -> Self {
        list.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NextSession {
    pub subject: String,
    pub duration_sec: u64,
    #[serde(default)]
    pub blocklist: Blocklist,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Blocklist::is_empty")]
    pub blocklist: Blocklist,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_session: Option<NextSession>,
}

impl SessionState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn focusing(
        subject: impl Into<String>,
        start_time: DateTime<Utc>,
        duration_sec: u64,
        blocklist: Blocklist,
    ) -> Option<Self> {
        let end_time = end_time_for(start_time, duration_sec)?;
        Some(Self {
            status: SessionStatus::Focusing,
            is_active: true,
            subject: Some(subject.into()),
            start_time: Some(start_time),
            duration_sec: Some(duration_sec),
            end_time: Some(end_time),
            blocklist,
            next_session: None,
        })
    }

    pub fn on_break(
        start_time: DateTime<Utc>,
        duration_sec: u64,
        next_session: NextSession,
    ) -> Option<Self> {
        let end_time = end_time_for(start_time, duration_sec)?;
        Some(Self {
            status: SessionStatus::Break,
            is_active: false,
            subject: None,
            start_time: Some(start_time),
            duration_sec: Some(duration_sec),
            end_time: Some(end_time),
            blocklist: next_session.blocklist.clone(),
            next_session: Some(next_session),
        })
    }

    pub fn is_idle(&self) -> bool {
        self.status == SessionStatus::Idle
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.end_time {
            Some(end_time) if !self.is_idle() => {
                u64::try_from((end_time - now).num_seconds()).unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn is_overtime(&self, now: DateTime<Utc>) -> bool {
        match self.end_time {
            Some(end_time) if !self.is_idle() => now >= end_time,
            _ => false,
        }
    }

    pub fn progress_percent(&self, now: DateTime<Utc>) -> f64 {
        match (self.duration_sec, self.end_time) {
            (Some(duration_sec), Some(end_time)) if duration_sec > 0 && !self.is_idle() => {
                let left_ms = (end_time - now).num_milliseconds().max(0) as f64;
                (left_ms / (duration_sec as f64 * 1000.0) * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self.status {
            SessionStatus::Idle => {
                if self.is_active {
                    return Err("session.is_active must be false while idle".to_string());
                }
                if self.next_session.is_some() {
                    return Err("session.next_session is only valid during a break".to_string());
                }
                Ok(())
            }
            SessionStatus::Focusing => {
                let subject = self.subject.as_deref().unwrap_or_default();
                validate_non_empty(subject, "session.subject")?;
                if !self.is_active {
                    return Err("session.is_active must be true while focusing".to_string());
                }
                if self.next_session.is_some() {
                    return Err("session.next_session is only valid during a break".to_string());
                }
                self.validate_window()
            }
            SessionStatus::Break => {
                if self.is_active {
                    return Err("session.is_active must be false during a break".to_string());
                }
                let Some(next_session) = self.next_session.as_ref() else {
                    return Err("session.next_session is required during a break".to_string());
                };
                validate_non_empty(&next_session.subject, "session.next_session.subject")?;
                self.validate_window()
            }
        }
    }

    fn validate_window(&self) -> Result<(), String> {
        let (Some(start_time), Some(duration_sec), Some(end_time)) =
            (self.start_time, self.duration_sec, self.end_time)
        else {
            return Err("session window requires start_time, duration_sec and end_time".to_string());
        };
        if end_time_for(start_time, duration_sec) != Some(end_time) {
            return Err("session.end_time must equal start_time + duration_sec".to_string());
        }
        Ok(())
    }
}

pub fn end_time_for(start_time: DateTime<Utc>, duration_sec: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(duration_sec).ok()?;
    start_time.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

pub fn validate_focus_request(subject: &str, duration_sec: i64) -> Result<u64, String> {
    if subject.trim().is_empty() {
        return Err("Subject is required".to_string());
    }
    if duration_sec <= 0 {
        return Err("Duration must be greater than 0".to_string());
    }
    Ok(duration_sec as u64)
}

pub fn format_countdown(remaining_seconds: u64) -> String {
    let hours = remaining_seconds / 3600;
    let minutes = (remaining_seconds % 3600) / 60;
    let seconds = remaining_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

pub fn custom_break_seconds(raw_minutes: &str) -> u64 {
    let digits: String = raw_minutes.chars().filter(char::is_ascii_digit).collect();
    let minutes = digits
        .parse::<u64>()
        .ok()
        .filter(|minutes| *minutes > 0)
        .unwrap_or(CUSTOM_BREAK_FALLBACK_MINUTES);
    minutes.saturating_mul(60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationField {
    Hours,
    Minutes,
    Seconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPreset {
    pub label: &'static str,
    pub hours: u32,
    pub minutes: u32,
}

pub const DURATION_PRESETS: [DurationPreset; 4] = [
    DurationPreset { label: "25m", hours: 0, minutes: 25 },
    DurationPreset { label: "50m", hours: 0, minutes: 50 },
    DurationPreset { label: "1h 30m", hours: 1, minutes: 30 },
    DurationPreset { label: "2h", hours: 2, minutes: 0 },
];

pub const DEFAULT_PRESET_LABEL: &str = "50m";

pub fn find_preset(label: &str) -> Option<&'static DurationPreset> {
    let label = label.trim();
    DURATION_PRESETS
        .iter()
        .find(|preset| preset.label.eq_ignore_ascii_case(label))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationFields {
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
    pub active_preset: Option<String>,
}

impl Default for DurationFields {
    fn default() -> Self {
        Self {
            hours: "00".to_string(),
            minutes: "50".to_string(),
            seconds: "00".to_string(),
            active_preset: Some(DEFAULT_PRESET_LABEL.to_string()),
        }
    }
}

impl DurationFields {
    pub fn handle_change(&mut self, field: DurationField, value: &str) -> bool {
        if value.len() > 2 || !value.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        *self.field_mut(field) = value.to_string();
        self.active_preset = None;
        true
    }

    pub fn handle_blur(&mut self, field: DurationField) {
        let slot = self.field_mut(field);
        *slot = format!("{slot:0>2}");
    }

    pub fn set_preset(&mut self, preset: &DurationPreset) {
        self.hours = format!("{:02}", preset.hours);
        self.minutes = format!("{:02}", preset.minutes);
        self.seconds = "00".to_string();
        self.active_preset = Some(preset.label.to_string());
    }

    pub fn total_seconds(&self) -> u64 {
        let parse = |value: &str| value.trim().parse::<u64>().unwrap_or(0);
        parse(&self.hours)
            .saturating_mul(3600)
            .saturating_add(parse(&self.minutes).saturating_mul(60))
            .saturating_add(parse(&self.seconds))
    }

    fn field_mut(&mut self, field: DurationField) -> &mut String {
        match field {
            DurationField::Hours => &mut self.hours,
            DurationField::Minutes => &mut self.minutes,
            DurationField::Seconds => &mut self.seconds,
        }
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
