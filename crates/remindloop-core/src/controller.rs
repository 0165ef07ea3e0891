//! Lifecycle controller: the single decision point for reminder triggers.
//!
//! Every delivery, user action and remote completion goes through here. The
//! controller consults break mode before scheduling anything, decides
//! whether the trigger ends, continues or refills, and appends the resulting
//! speech/log/feedback effects to its outbox. It never performs those effects
//! itself.
//!
//! ## Decision table
//!
//! ```text
//! delivery  breakModeEnd        -> clear break, "break over", nothing scheduled
//!           break active        -> nothing scheduled (check-ins included)
//!           focusCheckIn        -> refill the check-in queue
//!           test | daily        -> nothing scheduled
//!           task | event        -> one continuation at now + interval
//! action    Done                -> cancel all for entity, celebrate once
//!           Snooze(n)           -> replace with one trigger at now + n
//!           Open | Dismiss      -> task/event: continuation, else nothing
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::break_mode::{BreakMode, BreakModeState};
use crate::error::ValidationError;
use crate::events::{Event, LogKind, Outbox};
use crate::hyperfocus::{format_duration, HyperfocusNotice, HyperfocusSession, HyperfocusSnapshot, HyperfocusStage};
use crate::messages::{MessageContext, MessageKind, MessageTable, Personality};
use crate::relay::RemoteMessage;
use crate::storage::kv::KvStore;
use crate::trigger::{
    CheckInPayload, EntityId, ReminderTrigger, ScheduleRequest, TriggerHandle, TriggerKind,
    TriggerPayload, TriggerStore,
};

/// Interval used when neither the payload nor the configuration gives one.
pub const FALLBACK_INTERVAL_MINUTES: i64 = 5;

/// Snooze lengths offered to the user.
pub const SNOOZE_CHOICES: [i64; 3] = [5, 15, 30];

/// Entity id of the trigger that ends a break.
pub const BREAK_END_ENTITY: &str = "break-mode-end";

const CHECK_IN_PREFIX: &str = "focus-checkin-";

/// How many resolved entity ids are remembered for duplicate suppression.
const RESOLVED_MEMORY: usize = 256;

/// Kv key holding the resolved-id memory, so it outlives the process.
pub const RESOLVED_ENTITIES_KEY: &str = "resolved_entities";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Process-wide default nag interval. Non-positive values are ignored.
    pub default_interval_minutes: Option<i64>,
    pub personality: Personality,
    pub check_in_queue_size: usize,
    pub check_in_interval_minutes: i64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: Some(FALLBACK_INTERVAL_MINUTES),
            personality: Personality::default(),
            check_in_queue_size: 8,
            check_in_interval_minutes: 15,
        }
    }
}

/// User response to a delivered trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UserAction {
    Done,
    Snooze { minutes: i64 },
    /// Opened the host surface without choosing anything.
    Open,
    Dismiss,
}

/// What the controller decided for one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Break mode swallowed the continuation.
    Suppressed,
    RefilledCheckIns { scheduled: usize },
    /// Exempt kind; nothing follows.
    OneShot,
    Continued {
        entity_id: EntityId,
        handle: TriggerHandle,
        fire_at: DateTime<Utc>,
        interval_minutes: i64,
    },
    Snoozed {
        entity_id: EntityId,
        handle: TriggerHandle,
        fire_at: DateTime<Utc>,
    },
    Resolved {
        entity_id: EntityId,
        cancelled: usize,
        celebrated: bool,
    },
    BreakEnded,
    /// The store refused; logged, not retried.
    SchedulingFailed { entity_id: EntityId },
    NoAction,
}

/// Interval precedence: payload, then configured default, then the fallback.
/// Only positive values count.
pub fn resolve_interval(payload: &TriggerPayload, configured: Option<i64>) -> i64 {
    payload
        .interval_minutes()
        .filter(|m| *m > 0)
        .or(configured.filter(|m| *m > 0))
        .unwrap_or(FALLBACK_INTERVAL_MINUTES)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub break_mode: BreakModeState,
    pub break_active: bool,
    pub break_remaining_secs: i64,
    pub hyperfocus: HyperfocusSnapshot,
    pub pending_triggers: usize,
    pub personality: Personality,
}

pub struct LifecycleController {
    config: ControllerConfig,
    break_mode: BreakMode,
    hyperfocus: HyperfocusSession,
    messages: MessageTable,
    store: Box<dyn TriggerStore>,
    kv: Box<dyn KvStore>,
    outbox: Outbox,
    resolved: VecDeque<EntityId>,
}

impl LifecycleController {
    /// Build a controller around explicit suppression sources.
    pub fn new(
        config: ControllerConfig,
        store: Box<dyn TriggerStore>,
        kv: Box<dyn KvStore>,
        break_mode: BreakMode,
        hyperfocus: HyperfocusSession,
    ) -> Self {
        Self {
            config,
            break_mode,
            hyperfocus,
            messages: MessageTable::builtin(),
            store,
            kv,
            outbox: Outbox::new(),
            resolved: VecDeque::new(),
        }
    }

    /// Build a controller with break mode and hyperfocus restored from `kv`.
    pub fn restore(
        config: ControllerConfig,
        store: Box<dyn TriggerStore>,
        mut kv: Box<dyn KvStore>,
        now: DateTime<Utc>,
    ) -> Self {
        let break_mode = BreakMode::load(kv.as_ref());
        let hyperfocus = HyperfocusSession::restore(kv.as_mut(), now);
        let resolved = load_resolved(kv.as_ref());
        let mut controller = Self::new(config, store, kv, break_mode, hyperfocus);
        controller.resolved = resolved;
        controller
    }

    pub fn with_messages(mut self, messages: MessageTable) -> Self {
        self.messages = messages;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn TriggerStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn TriggerStore {
        self.store.as_mut()
    }

    pub fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    pub fn break_state(&self) -> BreakModeState {
        self.break_mode.state()
    }

    pub fn hyperfocus(&self) -> &HyperfocusSession {
        &self.hyperfocus
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Take the effects queued so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.outbox.drain()
    }

    /// Lazily-expiring break check.
    pub fn is_break_active(&mut self, now: DateTime<Utc>) -> bool {
        self.break_mode.is_active(self.kv.as_mut(), now)
    }

    pub fn snapshot(&mut self, now: DateTime<Utc>) -> ControllerSnapshot {
        let break_active = self.is_break_active(now);
        let pending_triggers = match self.store.all_pending() {
            Ok(p) => p.len(),
            Err(e) => {
                warn!(error = %e, "could not count pending triggers");
                0
            }
        };
        ControllerSnapshot {
            break_mode: self.break_mode.state(),
            break_active,
            break_remaining_secs: self.break_mode.state().remaining(now).num_seconds(),
            hyperfocus: self.hyperfocus.snapshot(now),
            pending_triggers,
            personality: self.config.personality,
        }
    }

    // ── Deliveries ───────────────────────────────────────────────────

    pub fn on_delivery(
        &mut self,
        trigger: &ReminderTrigger,
        foreground: bool,
        now: DateTime<Utc>,
    ) -> Decision {
        let kind = trigger.kind();
        if kind == TriggerKind::BreakModeEnd {
            return self.finish_break(now);
        }

        debug!(entity_id = %trigger.entity_id, %kind, foreground, "trigger delivered");
        let message_kind = match kind {
            TriggerKind::FocusCheckIn => MessageKind::CheckIn,
            TriggerKind::Test => MessageKind::TestNotification,
            TriggerKind::Daily => MessageKind::DailyCheckIn,
            _ => MessageKind::Reminder,
        };
        let log_kind = if kind.is_nag() { LogKind::Nag } else { LogKind::Conversation };
        self.say(message_kind, MessageContext::titled(&trigger.title), log_kind, Some(&trigger.title), now);

        if self.is_break_active(now) {
            debug!(entity_id = %trigger.entity_id, "break mode active, no continuation");
            return Decision::Suppressed;
        }

        match kind {
            TriggerKind::FocusCheckIn => Decision::RefilledCheckIns {
                scheduled: self.refill_check_ins(now),
            },
            TriggerKind::Test | TriggerKind::Daily | TriggerKind::BreakModeEnd => Decision::OneShot,
            TriggerKind::Task | TriggerKind::Event if self.resolved.contains(&trigger.entity_id) => {
                debug!(entity_id = %trigger.entity_id, "late delivery for a resolved obligation, no continuation");
                Decision::NoAction
            }
            TriggerKind::Task | TriggerKind::Event => self.continue_trigger(trigger, now),
        }
    }

    /// Top the check-in queue up to its configured size, spacing new
    /// check-ins after the latest pending one.
    pub fn refill_check_ins(&mut self, now: DateTime<Utc>) -> usize {
        let pending = match self.store.pending_of_kind(TriggerKind::FocusCheckIn) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "could not read pending check-ins, skipping refill");
                return 0;
            }
        };
        let missing = self.config.check_in_queue_size.saturating_sub(pending.len());
        if missing == 0 {
            return 0;
        }

        let spacing = self.config.check_in_interval_minutes.max(1);
        let latest = pending.iter().map(|t| t.fire_at).max().unwrap_or(now).max(now);
        let base_delay = ceil_minutes(latest - now);
        let mut sequence = pending
            .iter()
            .filter_map(|t| match &t.payload {
                TriggerPayload::FocusCheckIn(p) => Some(p.sequence),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        let mut scheduled = 0;
        for i in 1..=missing as i64 {
            sequence += 1;
            let request = ScheduleRequest::new(
                format!("{CHECK_IN_PREFIX}{sequence}"),
                "Focus check-in",
                base_delay.saturating_add(spacing.saturating_mul(i)),
                TriggerPayload::FocusCheckIn(CheckInPayload { sequence }),
            );
            if self.try_schedule(request, now).is_some() {
                scheduled += 1;
            }
        }
        debug!(scheduled, "check-in queue refilled");
        scheduled
    }

    fn continue_trigger(&mut self, trigger: &ReminderTrigger, now: DateTime<Utc>) -> Decision {
        let interval = resolve_interval(&trigger.payload, self.config.default_interval_minutes);
        let request = ScheduleRequest::continuation(trigger, interval);
        match self.replace_schedule(request, now) {
            Some((handle, fire_at)) => {
                info!(entity_id = %trigger.entity_id, interval_minutes = interval, "continuation scheduled");
                Decision::Continued {
                    entity_id: trigger.entity_id.clone(),
                    handle,
                    fire_at,
                    interval_minutes: interval,
                }
            }
            None => Decision::SchedulingFailed {
                entity_id: trigger.entity_id.clone(),
            },
        }
    }

    // ── Actions ──────────────────────────────────────────────────────

    pub fn on_action(
        &mut self,
        action: UserAction,
        trigger: &ReminderTrigger,
        now: DateTime<Utc>,
    ) -> Decision {
        match action {
            UserAction::Done => self.resolve(&trigger.entity_id, Some(&trigger.title), now),
            UserAction::Snooze { minutes } => self.snooze(trigger, minutes, now),
            UserAction::Open | UserAction::Dismiss => {
                if !trigger.kind().is_nag() {
                    return Decision::NoAction;
                }
                if self.resolved.contains(&trigger.entity_id) {
                    debug!(entity_id = %trigger.entity_id, "already resolved, not resurfacing");
                    return Decision::NoAction;
                }
                if self.is_break_active(now) {
                    return Decision::Suppressed;
                }
                self.continue_trigger(trigger, now)
            }
        }
    }

    /// Inbound message from another device.
    pub fn on_remote(&mut self, message: &RemoteMessage, now: DateTime<Utc>) -> Decision {
        match message {
            RemoteMessage::TaskCompleted { entity_id } => self.resolve(entity_id, None, now),
            RemoteMessage::Snooze { entity_id, minutes } => {
                let trigger = self.pending_or_placeholder(entity_id, now);
                self.snooze(&trigger, *minutes, now)
            }
        }
    }

    /// Cancel everything for the entity and celebrate, once per resolution.
    fn resolve(&mut self, entity_id: &EntityId, title: Option<&str>, now: DateTime<Utc>) -> Decision {
        let title = match title {
            Some(t) => t.to_string(),
            None => self
                .store
                .pending(entity_id)
                .ok()
                .and_then(|p| p.into_iter().next())
                .map(|t| t.title)
                .unwrap_or_default(),
        };
        let cancelled = self.store.cancel_all(entity_id).unwrap_or_else(|e| {
            warn!(%entity_id, error = %e, "cancel failed");
            0
        });

        if self.resolved.contains(entity_id) {
            debug!(%entity_id, cancelled, "duplicate completion, not celebrating again");
            return Decision::Resolved {
                entity_id: entity_id.clone(),
                cancelled,
                celebrated: false,
            };
        }
        self.remember_resolved(entity_id.clone());

        self.say(MessageKind::Celebration, MessageContext::titled(&title), LogKind::Nag, Some(&title), now);
        self.outbox.push(Event::TriggerCelebrationFeedback { at: now });
        info!(%entity_id, cancelled, "obligation resolved");
        Decision::Resolved {
            entity_id: entity_id.clone(),
            cancelled,
            celebrated: true,
        }
    }

    fn snooze(&mut self, trigger: &ReminderTrigger, minutes: i64, now: DateTime<Utc>) -> Decision {
        if minutes <= 0 {
            warn!(entity_id = %trigger.entity_id, minutes, "snooze length must be positive, ignoring");
            return Decision::NoAction;
        }
        let request = ScheduleRequest::continuation(trigger, minutes);
        match self.replace_schedule(request, now) {
            Some((handle, fire_at)) => {
                let ctx = MessageContext {
                    title: trigger.title.clone(),
                    minutes,
                    ..Default::default()
                };
                self.say(MessageKind::Snoozed, ctx, LogKind::Nag, Some(&trigger.title), now);
                Decision::Snoozed {
                    entity_id: trigger.entity_id.clone(),
                    handle,
                    fire_at,
                }
            }
            None => Decision::SchedulingFailed {
                entity_id: trigger.entity_id.clone(),
            },
        }
    }

    fn pending_or_placeholder(&self, entity_id: &EntityId, now: DateTime<Utc>) -> ReminderTrigger {
        self.store
            .pending(entity_id)
            .ok()
            .and_then(|p| p.into_iter().next())
            .unwrap_or_else(|| ReminderTrigger {
                handle: TriggerHandle::new(),
                entity_id: entity_id.clone(),
                title: String::new(),
                fire_at: now,
                payload: TriggerPayload::task(entity_id.as_str()),
            })
    }

    // ── Break mode ───────────────────────────────────────────────────

    /// Start (or restart) a break lasting `minutes`.
    pub fn start_break_for(&mut self, minutes: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        let end = self.break_mode.start_for(self.kv.as_mut(), minutes, now)?;
        self.after_break_started(end, now);
        Ok(end)
    }

    /// Start (or restart) a break ending at `until`.
    pub fn start_break_until(&mut self, until: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        let end = self.break_mode.start_until(self.kv.as_mut(), until, now)?;
        self.after_break_started(end, now);
        Ok(end)
    }

    fn after_break_started(&mut self, end: DateTime<Utc>, now: DateTime<Utc>) {
        let remaining = end - now;
        // The end trigger must never fire inside the window.
        let delay = ceil_minutes(remaining);
        let request = ScheduleRequest::new(BREAK_END_ENTITY, "Break over", delay, TriggerPayload::BreakModeEnd);
        if self.replace_schedule(request, now).is_none() {
            warn!("break end trigger not scheduled; break will still expire on next check");
        }
        let ctx = MessageContext {
            duration: format_duration(remaining),
            minutes: remaining.num_minutes(),
            ..Default::default()
        };
        self.say(MessageKind::BreakStarted, ctx, LogKind::Conversation, None, now);
        info!(end_time = %end, "break started");
    }

    /// User ends the break early. Returns whether one was running.
    pub fn end_break(&mut self, now: DateTime<Utc>) -> bool {
        let was_active = self.break_mode.end(self.kv.as_mut(), now);
        if let Err(e) = self.store.cancel_all(&EntityId::from(BREAK_END_ENTITY)) {
            warn!(error = %e, "could not cancel break end trigger");
        }
        if was_active {
            self.outbox.log(LogKind::Conversation, "Break ended early", None, now);
            info!("break ended by user");
        }
        was_active
    }

    fn finish_break(&mut self, now: DateTime<Utc>) -> Decision {
        self.break_mode.end(self.kv.as_mut(), now);
        if let Err(e) = self.store.cancel_all(&EntityId::from(BREAK_END_ENTITY)) {
            warn!(error = %e, "could not clear break end trigger");
        }
        self.say(MessageKind::BreakOver, MessageContext::default(), LogKind::Conversation, None, now);
        info!("break over");
        Decision::BreakEnded
    }

    // ── Hyperfocus ───────────────────────────────────────────────────

    pub fn toggle_hyperfocus(&mut self, now: DateTime<Utc>) -> bool {
        let notice = self.hyperfocus.toggle(self.kv.as_mut(), now);
        if let Some(notice) = notice {
            self.announce_hyperfocus(notice, now);
        }
        self.hyperfocus.is_active()
    }

    pub fn activate_hyperfocus(&mut self, now: DateTime<Utc>) -> bool {
        match self.hyperfocus.activate(self.kv.as_mut(), now) {
            Some(notice) => {
                self.announce_hyperfocus(notice, now);
                true
            }
            None => false,
        }
    }

    pub fn deactivate_hyperfocus(&mut self, now: DateTime<Utc>) -> bool {
        match self.hyperfocus.deactivate(self.kv.as_mut(), now) {
            Some(notice) => {
                self.announce_hyperfocus(notice, now);
                true
            }
            None => false,
        }
    }

    /// One hyperfocus tick. Returns how many notices it produced.
    pub fn tick_hyperfocus(&mut self, now: DateTime<Utc>) -> usize {
        let notices = self.hyperfocus.tick(now);
        let count = notices.len();
        for notice in notices {
            self.announce_hyperfocus(notice, now);
        }
        count
    }

    fn announce_hyperfocus(&mut self, notice: HyperfocusNotice, now: DateTime<Utc>) {
        let (kind, ctx) = match notice {
            HyperfocusNotice::Started => {
                self.outbox.push(Event::PauseSelfCareReminders { at: now });
                (MessageKind::HyperfocusStarted, MessageContext::default())
            }
            HyperfocusNotice::StageReached { stage, elapsed_minutes } => {
                let kind = match stage {
                    HyperfocusStage::Stage3 => MessageKind::HyperfocusStage3,
                    HyperfocusStage::Stage4 => MessageKind::HyperfocusStage4,
                    HyperfocusStage::Stage5 => MessageKind::HyperfocusStage5,
                    _ => return,
                };
                let ctx = MessageContext {
                    minutes: elapsed_minutes,
                    ..Default::default()
                };
                (kind, ctx)
            }
            HyperfocusNotice::StillGoing { elapsed_minutes } => (
                MessageKind::HyperfocusRepeat,
                MessageContext {
                    minutes: elapsed_minutes,
                    ..Default::default()
                },
            ),
            HyperfocusNotice::Ended { elapsed } => {
                self.outbox.push(Event::ResumeSelfCareReminders { at: now });
                (
                    MessageKind::HyperfocusSummary,
                    MessageContext {
                        duration: format_duration(elapsed),
                        minutes: elapsed.num_minutes(),
                        ..Default::default()
                    },
                )
            }
        };
        self.say(kind, ctx, LogKind::Conversation, None, now);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn say(
        &mut self,
        kind: MessageKind,
        ctx: MessageContext,
        log_kind: LogKind,
        entity_title: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let text = self.messages.compose(kind, self.config.personality, &ctx);
        self.outbox.speak(text.clone(), now);
        self.outbox.log(log_kind, text, entity_title, now);
    }

    /// Schedule, logging and swallowing a store failure.
    fn try_schedule(&mut self, request: ScheduleRequest, now: DateTime<Utc>) -> Option<(TriggerHandle, DateTime<Utc>)> {
        let entity_id = request.entity_id.clone();
        let fire_at = match request.fire_at(now) {
            Ok(at) => at,
            Err(e) => {
                warn!(%entity_id, error = %e, "not scheduling, obligation will not resurface on its own");
                return None;
            }
        };
        match self.store.schedule(request, now) {
            Ok(handle) => {
                let before = self.resolved.len();
                self.resolved.retain(|id| id != &entity_id);
                if self.resolved.len() != before {
                    self.persist_resolved();
                }
                Some((handle, fire_at))
            }
            Err(e) => {
                warn!(%entity_id, error = %e, "scheduling failed, obligation will not resurface on its own");
                None
            }
        }
    }

    /// Cancel whatever is pending for the entity, then schedule. The latest
    /// decision for an entity always wins.
    fn replace_schedule(&mut self, request: ScheduleRequest, now: DateTime<Utc>) -> Option<(TriggerHandle, DateTime<Utc>)> {
        if let Err(e) = request.fire_at(now) {
            warn!(entity_id = %request.entity_id, error = %e, "not rescheduling, keeping what is pending");
            return None;
        }
        if let Err(e) = self.store.cancel_all(&request.entity_id) {
            warn!(entity_id = %request.entity_id, error = %e, "cancel before reschedule failed");
        }
        self.try_schedule(request, now)
    }

    fn remember_resolved(&mut self, entity_id: EntityId) {
        if self.resolved.len() >= RESOLVED_MEMORY {
            self.resolved.pop_front();
        }
        self.resolved.push_back(entity_id);
        self.persist_resolved();
    }

    fn persist_resolved(&mut self) {
        let result = serde_json::to_string(&self.resolved)
            .map_err(crate::error::CoreError::from)
            .and_then(|json| self.kv.kv_set(RESOLVED_ENTITIES_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist resolved entities");
        }
    }
}

/// Whole minutes, rounded up.
fn ceil_minutes(d: Duration) -> i64 {
    let minutes = d.num_minutes();
    if d > Duration::minutes(minutes) {
        minutes + 1
    } else {
        minutes
    }
}

fn load_resolved(kv: &dyn KvStore) -> VecDeque<EntityId> {
    let raw = match kv.kv_get(RESOLVED_ENTITIES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return VecDeque::new(),
        Err(e) => {
            warn!(error = %e, "resolved entities unreadable, starting empty");
            return VecDeque::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "resolved entities corrupt, starting empty");
        VecDeque::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryKvStore;
    use crate::trigger::MemoryTriggerStore;

    fn controller(default_interval: Option<i64>) -> LifecycleController {
        let config = ControllerConfig {
            default_interval_minutes: default_interval,
            ..Default::default()
        };
        LifecycleController::new(
            config,
            Box::new(MemoryTriggerStore::new()),
            Box::new(MemoryKvStore::new()),
            BreakMode::new(),
            HyperfocusSession::new(),
        )
        .with_messages(MessageTable::builtin_with_seed(9))
    }

    fn trigger(id: &str, payload: TriggerPayload, now: DateTime<Utc>) -> ReminderTrigger {
        ScheduleRequest::new(id, "Email Alex", 0, payload).into_trigger(now).unwrap()
    }

    #[test]
    fn interval_precedence() {
        assert_eq!(resolve_interval(&TriggerPayload::task("a").with_interval(7), Some(5)), 7);
        assert_eq!(resolve_interval(&TriggerPayload::task("a"), Some(12)), 12);
        assert_eq!(resolve_interval(&TriggerPayload::task("a"), None), 5);
        assert_eq!(resolve_interval(&TriggerPayload::task("a"), Some(0)), 5);
        assert_eq!(resolve_interval(&TriggerPayload::task("a"), Some(-3)), 5);
        assert_eq!(resolve_interval(&TriggerPayload::task("a").with_interval(0), Some(9)), 9);
    }

    #[test]
    fn delivery_always_speaks_and_logs() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        c.on_delivery(&trigger("t", TriggerPayload::Test, now), false, now);
        let events = c.drain_events();
        assert!(matches!(events[0], Event::SpeakOrDisplay { .. }));
        assert!(matches!(events[1], Event::LogEvent { kind: LogKind::Conversation, .. }));
    }

    #[test]
    fn task_delivery_logs_as_nag() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        c.on_delivery(&trigger("task-1", TriggerPayload::task("task-1"), now), true, now);
        let events = c.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::LogEvent { kind: LogKind::Nag, entity_title: Some(t), .. } if t == "Email Alex"
        )));
    }

    #[test]
    fn open_after_done_does_not_resurface() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let t = trigger("task-1", TriggerPayload::task("task-1"), now);
        c.on_action(UserAction::Done, &t, now);
        assert_eq!(c.on_action(UserAction::Dismiss, &t, now), Decision::NoAction);
        assert!(c.store().pending(&t.entity_id).unwrap().is_empty());
    }

    #[test]
    fn snooze_after_done_reopens() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let t = trigger("task-1", TriggerPayload::task("task-1"), now);
        c.on_action(UserAction::Done, &t, now);
        assert!(matches!(c.on_action(UserAction::Snooze { minutes: 15 }, &t, now), Decision::Snoozed { .. }));
        let again = c.on_action(UserAction::Done, &t, now);
        assert!(matches!(again, Decision::Resolved { celebrated: true, cancelled: 1, .. }));
    }

    #[test]
    fn non_positive_snooze_is_ignored() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let t = trigger("task-1", TriggerPayload::task("task-1"), now);
        assert_eq!(c.on_action(UserAction::Snooze { minutes: 0 }, &t, now), Decision::NoAction);
        assert!(c.store().all_pending().unwrap().is_empty());
    }

    #[test]
    fn break_start_schedules_end_trigger_once() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        c.start_break_for(30, now).unwrap();
        c.start_break_for(45, now).unwrap();
        let pending = c.store().pending(&BREAK_END_ENTITY.into()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, now + Duration::minutes(45));
        assert_eq!(pending[0].kind(), TriggerKind::BreakModeEnd);
    }

    #[test]
    fn end_break_cancels_end_trigger() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        c.start_break_for(30, now).unwrap();
        assert!(c.end_break(now));
        assert!(c.store().pending(&BREAK_END_ENTITY.into()).unwrap().is_empty());
        assert!(!c.is_break_active(now));
    }

    #[test]
    fn hyperfocus_pauses_and_resumes_self_care() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        assert!(c.toggle_hyperfocus(now));
        assert!(!c.toggle_hyperfocus(now + Duration::minutes(75)));
        let events = c.drain_events();
        assert!(matches!(events[0], Event::PauseSelfCareReminders { .. }));
        assert!(events.iter().any(|e| matches!(e, Event::ResumeSelfCareReminders { .. })));
        let summary = events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::SpeakOrDisplay { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert!(summary.contains("1 hour and 15 minutes"), "{summary}");
    }

    #[test]
    fn check_in_refill_tops_up_queue() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let first = c.refill_check_ins(now);
        assert_eq!(first, 8);
        assert_eq!(c.refill_check_ins(now), 0);

        let pending = c.store().pending_of_kind(TriggerKind::FocusCheckIn).unwrap();
        assert_eq!(pending.last().unwrap().fire_at, now + Duration::minutes(15 * 8));
        let mut ids: Vec<_> = pending.iter().map(|t| t.entity_id.to_string()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn refill_keeps_spacing_after_partial_minute() {
        let mut c = controller(Some(5));
        let t0 = Utc::now();
        c.refill_check_ins(t0);

        let later = t0 + Duration::minutes(15) + Duration::seconds(30);
        assert_eq!(c.store_mut().take_due(later).unwrap().len(), 1);
        let latest = t0 + Duration::minutes(15 * 8);
        assert_eq!(c.refill_check_ins(later), 1);

        let newest = c
            .store()
            .pending_of_kind(TriggerKind::FocusCheckIn)
            .unwrap()
            .into_iter()
            .map(|t| t.fire_at)
            .max()
            .unwrap();
        assert!(newest - latest >= Duration::minutes(15), "{}", newest - latest);
    }

    #[test]
    fn oversized_payload_interval_fails_softly() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let payload = TriggerPayload::task("task-1").with_interval(9_000_000_000_000);
        let t = trigger("task-1", payload, now);
        assert_eq!(
            c.on_delivery(&t, true, now),
            Decision::SchedulingFailed { entity_id: "task-1".into() }
        );
        assert!(c.store().all_pending().unwrap().is_empty());
    }

    #[test]
    fn oversized_snooze_keeps_pending_reminder() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let t = trigger("task-1", TriggerPayload::task("task-1"), now);
        c.on_delivery(&t, true, now);

        let decision = c.on_action(UserAction::Snooze { minutes: i64::MAX }, &t, now);
        assert!(matches!(decision, Decision::SchedulingFailed { .. }));
        let remote = RemoteMessage::Snooze {
            entity_id: "task-1".into(),
            minutes: i64::MAX,
        };
        assert!(matches!(c.on_remote(&remote, now), Decision::SchedulingFailed { .. }));

        let pending = c.store().pending(&t.entity_id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, now + Duration::minutes(5));
    }

    #[test]
    fn late_delivery_after_done_stays_resolved() {
        let mut c = controller(Some(5));
        let now = Utc::now();
        let t = trigger("task-42", TriggerPayload::task("task-42"), now);
        c.on_delivery(&t, true, now);
        c.on_action(UserAction::Done, &t, now);

        let later = now + Duration::seconds(10);
        assert_eq!(c.on_delivery(&t, true, later), Decision::NoAction);
        assert!(c.store().pending(&t.entity_id).unwrap().is_empty());
        let again = c.on_action(UserAction::Done, &t, later);
        assert!(matches!(again, Decision::Resolved { celebrated: false, .. }));
    }

    #[test]
    fn ceil_minutes_rounds_partial_minutes_up() {
        assert_eq!(ceil_minutes(Duration::minutes(3)), 3);
        assert_eq!(ceil_minutes(Duration::minutes(3) + Duration::milliseconds(1)), 4);
        assert_eq!(ceil_minutes(Duration::zero()), 0);
    }
}
