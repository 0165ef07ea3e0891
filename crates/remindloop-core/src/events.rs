use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distinguishes reminder traffic from ordinary conversation in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Nag,
    Conversation,
}

/// Outbound side effects. The controller only appends these to its outbox;
/// whoever drains the outbox performs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SpeakOrDisplay {
        text: String,
        at: DateTime<Utc>,
    },
    LogEvent {
        kind: LogKind,
        text: String,
        entity_title: Option<String>,
        at: DateTime<Utc>,
    },
    PauseSelfCareReminders {
        at: DateTime<Utc>,
    },
    ResumeSelfCareReminders {
        at: DateTime<Utc>,
    },
    TriggerCelebrationFeedback {
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SpeakOrDisplay { at, .. }
            | Event::LogEvent { at, .. }
            | Event::PauseSelfCareReminders { at }
            | Event::ResumeSelfCareReminders { at }
            | Event::TriggerCelebrationFeedback { at } => *at,
        }
    }

    /// Text for speak and log events.
    pub fn text(&self) -> Option<&str> {
        match self {
            Event::SpeakOrDisplay { text, .. } | Event::LogEvent { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Ordered queue of pending effects.
#[derive(Debug, Default, Clone)]
pub struct Outbox {
    events: Vec<Event>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn speak(&mut self, text: impl Into<String>, at: DateTime<Utc>) {
        self.push(Event::SpeakOrDisplay {
            text: text.into(),
            at,
        });
    }

    pub fn log(
        &mut self,
        kind: LogKind,
        text: impl Into<String>,
        entity_title: Option<&str>,
        at: DateTime<Utc>,
    ) {
        self.push(Event::LogEvent {
            kind,
            text: text.into(),
            entity_title: entity_title.map(str::to_string),
            at,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
