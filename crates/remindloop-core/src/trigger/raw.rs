//! Untyped deliveries from external reminder stores.
//!
//! Platform notification stores hand back a string identifier and a loose
//! dictionary. This is the only place the identifier-prefix convention is
//! understood; everything past this point works on the typed payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::{
    CheckInPayload, EntityId, EventPayload, ReminderTrigger, TaskPayload, TriggerHandle,
    TriggerPayload,
};

const FOCUS_PREFIX: &str = "focus-";
const TEST_PREFIX: &str = "test-";
const DAILY_PREFIX: &str = "daily-";
const BREAK_END_PREFIX: &str = "break-mode-end";

/// A delivery as an external store reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDelivery {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_info: Map<String, Value>,
}

impl RawDelivery {
    fn string_field(&self, key: &str) -> Option<String> {
        self.user_info
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn interval(&self) -> Option<i64> {
        self.user_info.get("intervalMinutes").and_then(Value::as_i64)
    }

    /// Classify and type the delivery.
    ///
    /// When neither the identifier nor the payload names the entity, a fresh
    /// id is synthesized. Such a trigger can never be cancelled by the
    /// identity its creator intended.
    pub fn into_trigger(self, now: DateTime<Utc>) -> ReminderTrigger {
        let identifier = self.identifier.clone().filter(|s| !s.is_empty());
        let prefixed = |p: &str| identifier.as_deref().is_some_and(|id| id.starts_with(p));

        let (payload, entity) = if prefixed(BREAK_END_PREFIX) {
            (TriggerPayload::BreakModeEnd, identifier.clone())
        } else if prefixed(FOCUS_PREFIX) {
            let sequence = identifier
                .as_deref()
                .and_then(|id| id.rsplit('-').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            (
                TriggerPayload::FocusCheckIn(CheckInPayload { sequence }),
                identifier.clone(),
            )
        } else if prefixed(TEST_PREFIX) {
            (TriggerPayload::Test, identifier.clone())
        } else if prefixed(DAILY_PREFIX) {
            (TriggerPayload::Daily, identifier.clone())
        } else if let Some(event_id) = self
            .string_field("eventId")
            .filter(|_| self.string_field("taskId").is_none())
        {
            (
                TriggerPayload::Event(EventPayload {
                    event_id: event_id.clone(),
                    interval_minutes: self.interval(),
                    starts_at: None,
                }),
                Some(event_id),
            )
        } else {
            let task_id = self.string_field("taskId").or_else(|| identifier.clone());
            (
                TriggerPayload::Task(TaskPayload {
                    task_id: task_id.clone().unwrap_or_default(),
                    interval_minutes: self.interval(),
                }),
                task_id,
            )
        };

        let entity_id = match entity {
            Some(id) => EntityId::new(id),
            None => {
                let id = EntityId::generate();
                warn!(entity_id = %id, title = %self.title, "delivery without entity id, synthesized one");
                id
            }
        };

        let payload = match payload {
            TriggerPayload::Task(mut p) if p.task_id.is_empty() => {
                p.task_id = entity_id.to_string();
                TriggerPayload::Task(p)
            }
            other => other,
        };

        ReminderTrigger {
            handle: TriggerHandle::new(),
            entity_id,
            title: self.title,
            fire_at: self.fire_at.unwrap_or(now),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerKind;
    use serde_json::json;

    fn raw(identifier: Option<&str>, info: Value) -> RawDelivery {
        RawDelivery {
            identifier: identifier.map(str::to_string),
            title: "Something".into(),
            fire_at: None,
            user_info: info.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn prefixes_classify_exempt_kinds() {
        let now = Utc::now();
        let cases = [
            ("focus-checkin-3", TriggerKind::FocusCheckIn),
            ("test-notification", TriggerKind::Test),
            ("daily-checkin-morning", TriggerKind::Daily),
            ("break-mode-end", TriggerKind::BreakModeEnd),
        ];
        for (id, kind) in cases {
            let t = raw(Some(id), json!({})).into_trigger(now);
            assert_eq!(t.kind(), kind, "{id}");
            assert_eq!(t.entity_id.as_str(), id);
        }
    }

    #[test]
    fn focus_sequence_is_parsed_from_suffix() {
        let t = raw(Some("focus-checkin-7"), json!({})).into_trigger(Utc::now());
        assert_eq!(t.payload, TriggerPayload::FocusCheckIn(CheckInPayload { sequence: 7 }));
    }

    #[test]
    fn payload_field_picks_task_or_event() {
        let now = Utc::now();
        let task = raw(Some("nag-1"), json!({"taskId": "task-42", "intervalMinutes": 7}))
            .into_trigger(now);
        assert_eq!(task.kind(), TriggerKind::Task);
        assert_eq!(task.entity_id.as_str(), "task-42");
        assert_eq!(task.payload.interval_minutes(), Some(7));

        let event = raw(Some("nag-2"), json!({"eventId": "ev-9"})).into_trigger(now);
        assert_eq!(event.kind(), TriggerKind::Event);
        assert_eq!(event.entity_id.as_str(), "ev-9");
    }

    #[test]
    fn both_ids_resolve_to_task_only() {
        let t = raw(None, json!({"taskId": "t", "eventId": "e"})).into_trigger(Utc::now());
        assert_eq!(t.kind(), TriggerKind::Task);
        assert_eq!(t.entity_id.as_str(), "t");
    }

    #[test]
    fn missing_identity_is_synthesized() {
        let a = raw(None, json!({})).into_trigger(Utc::now());
        let b = raw(Some(""), json!({})).into_trigger(Utc::now());
        assert_eq!(a.kind(), TriggerKind::Task);
        assert!(!a.entity_id.as_str().is_empty());
        assert_ne!(a.entity_id, b.entity_id);
        match &a.payload {
            TriggerPayload::Task(p) => assert_eq!(p.task_id, a.entity_id.as_str()),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
