//! The trigger store contract and an in-memory implementation.

use chrono::{DateTime, Utc};

use super::{EntityId, ReminderTrigger, ScheduleRequest, TriggerHandle, TriggerKind};
use crate::error::{CoreError, Result};

/// Schedules and cancels timed prompts keyed by entity identity.
///
/// Implementations must make `cancel_all` idempotent: cancelling an entity
/// with nothing pending is a no-op returning zero.
pub trait TriggerStore: Send {
    /// Put one trigger in the store, firing `request.delay_minutes` after `now`.
    fn schedule(&mut self, request: ScheduleRequest, now: DateTime<Utc>) -> Result<TriggerHandle>;

    /// Remove every pending trigger for `entity_id`. Returns how many were removed.
    fn cancel_all(&mut self, entity_id: &EntityId) -> Result<usize>;

    /// Pending triggers for one entity, earliest first.
    fn pending(&self, entity_id: &EntityId) -> Result<Vec<ReminderTrigger>>;

    /// Pending triggers of one kind, earliest first.
    fn pending_of_kind(&self, kind: TriggerKind) -> Result<Vec<ReminderTrigger>>;

    /// Everything pending, earliest first.
    fn all_pending(&self) -> Result<Vec<ReminderTrigger>>;

    /// Remove and return the triggers whose fire time has passed, earliest first.
    fn take_due(&mut self, now: DateTime<Utc>) -> Result<Vec<ReminderTrigger>>;
}

/// Vector-backed store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryTriggerStore {
    triggers: Vec<ReminderTrigger>,
    reject_schedules: bool,
}

impl MemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `schedule` call fail, to exercise the
    /// log-and-skip path.
    pub fn reject_schedules(&mut self, reject: bool) {
        self.reject_schedules = reject;
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Insert an already-built trigger, as an external collaborator would.
    pub fn insert(&mut self, trigger: ReminderTrigger) {
        self.triggers.push(trigger);
        self.triggers.sort_by_key(|t| t.fire_at);
    }

    fn filtered(&self, pred: impl Fn(&ReminderTrigger) -> bool) -> Vec<ReminderTrigger> {
        self.triggers.iter().filter(|t| pred(t)).cloned().collect()
    }
}

impl TriggerStore for MemoryTriggerStore {
    fn schedule(&mut self, request: ScheduleRequest, now: DateTime<Utc>) -> Result<TriggerHandle> {
        if self.reject_schedules {
            return Err(CoreError::Scheduling {
                entity_id: request.entity_id.to_string(),
                message: "store is rejecting schedules".into(),
            });
        }
        let trigger = request.into_trigger(now)?;
        let handle = trigger.handle;
        self.insert(trigger);
        Ok(handle)
    }

    fn cancel_all(&mut self, entity_id: &EntityId) -> Result<usize> {
        let before = self.triggers.len();
        self.triggers.retain(|t| &t.entity_id != entity_id);
        Ok(before - self.triggers.len())
    }

    fn pending(&self, entity_id: &EntityId) -> Result<Vec<ReminderTrigger>> {
        Ok(self.filtered(|t| &t.entity_id == entity_id))
    }

    fn pending_of_kind(&self, kind: TriggerKind) -> Result<Vec<ReminderTrigger>> {
        Ok(self.filtered(|t| t.kind() == kind))
    }

    fn all_pending(&self) -> Result<Vec<ReminderTrigger>> {
        Ok(self.triggers.clone())
    }

    fn take_due(&mut self, now: DateTime<Utc>) -> Result<Vec<ReminderTrigger>> {
        let (due, rest): (Vec<_>, Vec<_>) = self
            .triggers
            .drain(..)
            .partition(|t| t.fire_at <= now);
        self.triggers = rest;
        Ok(due)
    }
}
