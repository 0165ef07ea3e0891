//! Reminder triggers and the store contract the lifecycle engine schedules into.
//!
//! A trigger is one scheduled, point-in-time prompt tied to an unresolved
//! entity. Its kind is carried by the payload tag, so the kind can never
//! disagree with the fields that come with it.

mod raw;
mod store;

pub use raw::RawDelivery;
pub use store::{MemoryTriggerStore, TriggerStore};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Identity of the obligation a trigger nags about.
///
/// Cancelling by entity id removes every outstanding trigger sharing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity, used when an inbound delivery carries none.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque handle for one scheduled trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerHandle(Uuid);

impl TriggerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TriggerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TriggerHandle {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Classification tag that decides exemption from the default reschedule policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    Task,
    Event,
    FocusCheckIn,
    Test,
    Daily,
    /// Fires when a break window runs out.
    BreakModeEnd,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        TriggerKind::Task,
        TriggerKind::Event,
        TriggerKind::FocusCheckIn,
        TriggerKind::Test,
        TriggerKind::Daily,
        TriggerKind::BreakModeEnd,
    ];

    /// Only tasks and events get a continuation when they fire unresolved.
    pub fn is_nag(self) -> bool {
        matches!(self, TriggerKind::Task | TriggerKind::Event)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Task => "task",
            TriggerKind::Event => "event",
            TriggerKind::FocusCheckIn => "focusCheckIn",
            TriggerKind::Test => "test",
            TriggerKind::Daily => "daily",
            TriggerKind::BreakModeEnd => "breakModeEnd",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "kind".into(),
                message: format!("unknown trigger kind '{s}'"),
            })
    }
}

/// Fields a task reminder carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub task_id: String,
    /// Per-task nag interval; wins over the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<i64>,
}

/// Fields an event reminder carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
}

/// Fields a focus check-in carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPayload {
    /// Position in the refill queue when it was created.
    #[serde(default)]
    pub sequence: u32,
}

/// Per-kind payload. The tag is the trigger's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TriggerPayload {
    Task(TaskPayload),
    Event(EventPayload),
    FocusCheckIn(CheckInPayload),
    Test,
    Daily,
    BreakModeEnd,
}

impl TriggerPayload {
    pub fn task(task_id: impl Into<String>) -> Self {
        TriggerPayload::Task(TaskPayload {
            task_id: task_id.into(),
            interval_minutes: None,
        })
    }

    pub fn event(event_id: impl Into<String>) -> Self {
        TriggerPayload::Event(EventPayload {
            event_id: event_id.into(),
            interval_minutes: None,
            starts_at: None,
        })
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerPayload::Task(_) => TriggerKind::Task,
            TriggerPayload::Event(_) => TriggerKind::Event,
            TriggerPayload::FocusCheckIn(_) => TriggerKind::FocusCheckIn,
            TriggerPayload::Test => TriggerKind::Test,
            TriggerPayload::Daily => TriggerKind::Daily,
            TriggerPayload::BreakModeEnd => TriggerKind::BreakModeEnd,
        }
    }

    /// Interval embedded in the payload itself, if any.
    pub fn interval_minutes(&self) -> Option<i64> {
        match self {
            TriggerPayload::Task(p) => p.interval_minutes,
            TriggerPayload::Event(p) => p.interval_minutes,
            _ => None,
        }
    }

    /// Builder-style override of the embedded interval. No-op for kinds
    /// that never carry one.
    pub fn with_interval(mut self, minutes: i64) -> Self {
        match &mut self {
            TriggerPayload::Task(p) => p.interval_minutes = Some(minutes),
            TriggerPayload::Event(p) => p.interval_minutes = Some(minutes),
            _ => {}
        }
        self
    }
}

/// A scheduled prompt as the store hands it back on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTrigger {
    pub handle: TriggerHandle,
    pub entity_id: EntityId,
    pub title: String,
    pub fire_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

impl ReminderTrigger {
    pub fn kind(&self) -> TriggerKind {
        self.payload.kind()
    }
}

/// Request to put one trigger into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub entity_id: EntityId,
    pub title: String,
    pub delay_minutes: i64,
    pub payload: TriggerPayload,
}

impl ScheduleRequest {
    pub fn new(
        entity_id: impl Into<EntityId>,
        title: impl Into<String>,
        delay_minutes: i64,
        payload: TriggerPayload,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            title: title.into(),
            delay_minutes,
            payload,
        }
    }

    /// Same entity, kind, title and payload as `trigger`, fired again later.
    pub fn continuation(trigger: &ReminderTrigger, delay_minutes: i64) -> Self {
        Self {
            entity_id: trigger.entity_id.clone(),
            title: trigger.title.clone(),
            delay_minutes,
            payload: trigger.payload.clone(),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        self.payload.kind()
    }

    /// `now` plus the delay, or an error when that is not a representable time.
    pub fn fire_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        Duration::try_minutes(self.delay_minutes)
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or(ValidationError::DelayOutOfRange {
                minutes: self.delay_minutes,
            })
    }

    /// Materialize as a stored trigger with a fresh handle.
    pub fn into_trigger(self, now: DateTime<Utc>) -> Result<ReminderTrigger, ValidationError> {
        let fire_at = self.fire_at(now)?;
        Ok(ReminderTrigger {
            handle: TriggerHandle::new(),
            entity_id: self.entity_id,
            title: self.title,
            fire_at,
            payload: self.payload,
        })
    }
}
