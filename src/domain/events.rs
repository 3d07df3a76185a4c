use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SessionStart,
    SessionStop,
    BreakStart,
    BreakStop,
    BreakSkip,
    SyncBlocklist,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::SessionStart,
        EventType::SessionStop,
        EventType::BreakStart,
        EventType::BreakStop,
        EventType::BreakSkip,
        EventType::SyncBlocklist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "SESSION_START",
            Self::SessionStop => "SESSION_STOP",
            Self::BreakStart => "BREAK_START",
            Self::BreakStop => "BREAK_STOP",
            Self::BreakSkip => "BREAK_SKIP",
            Self::SyncBlocklist => "SYNC_BLOCKLIST",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == raw)
    }

    pub fn action_label(self) -> &'static str {
        match self {
            Self::SessionStart => "start session",
            Self::SessionStop => "stop session",
            Self::BreakStart => "start break",
            Self::BreakStop => "stop break",
            Self::BreakSkip => "skip break",
            Self::SyncBlocklist => "sync blocklist",
        }
    }

    /// Events after which blocking must be lifted. The relay notifies the
    /// webhook for these even when HIA rejects the event or is unreachable.
    pub fn is_stopping(self) -> bool {
        matches!(self, Self::SessionStop | Self::BreakStart)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextSessionPayload {
    pub subject: String,
    pub planned_duration_sec: u64,
    pub blocklist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    SessionStart {
        subject: String,
        planned_duration_sec: u64,
        blocklist: Vec<String>,
    },
    SessionStop {
        reason: String,
        blocklist: Vec<String>,
    },
    BreakStart {
        duration_sec: u64,
        next_session: NextSessionPayload,
    },
    BreakStop {
        reason: String,
        blocklist: Vec<String>,
    },
    BreakSkip {
        blocklist: Vec<String>,
    },
    SyncBlocklist {
        blocklist: Vec<String>,
    },
}

impl SessionEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::SessionStart { .. } => EventType::SessionStart,
            Self::SessionStop { .. } => EventType::SessionStop,
            Self::BreakStart { .. } => EventType::BreakStart,
            Self::BreakStop { .. } => EventType::BreakStop,
            Self::BreakSkip { .. } => EventType::BreakSkip,
            Self::SyncBlocklist { .. } => EventType::SyncBlocklist,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: SessionEvent,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: SessionEvent, timestamp: DateTime<Utc>) -> Self {
        Self { event, timestamp }
    }

    pub fn now(event: SessionEvent) -> Self {
        Self::new(event, Utc::now())
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub event: String,
    pub blocklist: Vec<String>,
}

/// Collapses every incoming event kind onto the two commands the blocking
/// webhook understands. Breaks lift blocking, so `BREAK_START` always sends
/// an empty list; ending or skipping a break resumes focus.
pub fn webhook_notification_for(event_type: &str, blocklist: Vec<String>) -> WebhookNotification {
    let (event, blocklist) = match EventType::parse(event_type) {
        Some(EventType::SyncBlocklist) if blocklist.is_empty() => {
            (EventType::SessionStop.as_str(), blocklist)
        }
        Some(EventType::SyncBlocklist) => (EventType::SessionStart.as_str(), blocklist),
        Some(EventType::BreakStop | EventType::BreakSkip) => {
            (EventType::SessionStart.as_str(), blocklist)
        }
        Some(EventType::BreakStart) => (EventType::SessionStop.as_str(), Vec::new()),
        Some(known) => (known.as_str(), blocklist),
        None => (event_type, blocklist),
    };
    WebhookNotification {
        event: event.to_string(),
        blocklist,
    }
}
