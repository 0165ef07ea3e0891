use chrono::{DateTime, Duration, TimeZone, Utc};
use remindloop_core::break_mode::{BREAK_MODE_ENABLED_KEY, BREAK_MODE_END_TIME_KEY};
use remindloop_core::controller::BREAK_END_ENTITY;
use remindloop_core::{
    BreakMode, ControllerConfig, Decision, EntityId, Event, HyperfocusSession, KvStore,
    LifecycleController, LogKind, MemoryKvStore, MemoryTriggerStore, MessageTable, RawDelivery,
    ReminderTrigger, RemoteMessage, ScheduleRequest, TriggerKind, TriggerPayload, UserAction,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
}

fn controller_with(default_interval: Option<i64>) -> LifecycleController {
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
    .with_messages(MessageTable::builtin_with_seed(42))
}

fn delivered(id: &str, title: &str, payload: TriggerPayload) -> ReminderTrigger {
    ScheduleRequest::new(id, title, 0, payload).into_trigger(t0()).unwrap()
}

fn pending_for(c: &LifecycleController, id: &str) -> Vec<ReminderTrigger> {
    c.store().pending(&EntityId::from(id)).unwrap()
}

#[test]
fn email_alex_end_to_end() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("task-42", "Email Alex", TriggerPayload::task("task-42"));

    let decision = c.on_delivery(&trigger, false, t0());
    assert!(matches!(decision, Decision::Continued { interval_minutes: 5, .. }));

    let pending = pending_for(&c, "task-42");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fire_at, t0() + Duration::minutes(5));
    assert_eq!(pending[0].title, "Email Alex");
    assert_eq!(pending[0].kind(), TriggerKind::Task);

    let done = c.on_action(UserAction::Done, &pending[0], t0() + Duration::minutes(5));
    assert!(matches!(done, Decision::Resolved { cancelled: 1, celebrated: true, .. }));
    assert!(pending_for(&c, "task-42").is_empty());
}

#[test]
fn tasks_and_events_get_exactly_one_continuation() {
    for payload in [TriggerPayload::task("x"), TriggerPayload::event("x")] {
        let mut c = controller_with(Some(5));
        let trigger = delivered("x", "Thing", payload);
        c.on_delivery(&trigger, true, t0());
        // A second delivery of the same entity replaces, never stacks.
        c.on_delivery(&trigger, true, t0() + Duration::minutes(1));
        let pending = pending_for(&c, "x");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, t0() + Duration::minutes(6));
    }
}

#[test]
fn exempt_kinds_are_never_continued() {
    for (id, payload) in [("test-1", TriggerPayload::Test), ("daily-1", TriggerPayload::Daily)] {
        let mut c = controller_with(Some(5));
        let trigger = delivered(id, "", payload);
        assert_eq!(c.on_delivery(&trigger, false, t0()), Decision::OneShot);
        assert_eq!(c.on_action(UserAction::Dismiss, &trigger, t0()), Decision::NoAction);
        assert_eq!(c.on_action(UserAction::Open, &trigger, t0()), Decision::NoAction);
        assert!(c.store().all_pending().unwrap().is_empty());
    }
}

#[test]
fn break_mode_suppresses_every_kind() {
    let payloads = [
        TriggerPayload::task("a"),
        TriggerPayload::event("a"),
        TriggerPayload::FocusCheckIn(Default::default()),
        TriggerPayload::Test,
        TriggerPayload::Daily,
    ];
    for payload in payloads {
        let mut c = controller_with(Some(5));
        c.start_break_for(30, t0()).unwrap();
        let trigger = delivered("a", "A", payload);
        let decision = c.on_delivery(&trigger, false, t0() + Duration::minutes(10));
        assert_eq!(decision, Decision::Suppressed);

        let pending = c.store().all_pending().unwrap();
        assert_eq!(pending.len(), 1, "only the break end trigger should remain");
        assert_eq!(pending[0].entity_id.as_str(), BREAK_END_ENTITY);
    }
}

#[test]
fn delivery_still_speaks_and_logs_during_break() {
    let mut c = controller_with(Some(5));
    c.start_break_for(30, t0()).unwrap();
    c.drain_events();
    c.on_delivery(&delivered("a", "A", TriggerPayload::task("a")), false, t0());
    let events = c.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::SpeakOrDisplay { .. }));
    assert!(matches!(events[1], Event::LogEvent { kind: LogKind::Nag, .. }));
}

#[test]
fn done_cancels_everything_and_second_done_is_quiet() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("task-7", "Taxes", TriggerPayload::task("task-7"));
    c.on_action(UserAction::Snooze { minutes: 15 }, &trigger, t0());
    c.on_delivery(&trigger, false, t0());
    c.drain_events();

    let first = c.on_action(UserAction::Done, &trigger, t0());
    assert!(matches!(first, Decision::Resolved { celebrated: true, .. }));
    let celebrations = c
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::TriggerCelebrationFeedback { .. }))
        .count();
    assert_eq!(celebrations, 1);

    let second = c.on_action(UserAction::Done, &trigger, t0());
    assert!(matches!(second, Decision::Resolved { cancelled: 0, celebrated: false, .. }));
    assert!(c.drain_events().is_empty());
    assert!(pending_for(&c, "task-7").is_empty());
}

#[test]
fn done_schedules_nothing_for_any_kind() {
    for payload in [
        TriggerPayload::task("z"),
        TriggerPayload::event("z"),
        TriggerPayload::FocusCheckIn(Default::default()),
        TriggerPayload::Daily,
    ] {
        let mut c = controller_with(Some(5));
        let trigger = delivered("z", "Z", payload);
        c.on_action(UserAction::Done, &trigger, t0());
        assert!(c.store().all_pending().unwrap().is_empty());
    }
}

#[test]
fn snooze_targets_only_its_entity() {
    let mut c = controller_with(Some(5));
    let a = delivered("a", "A", TriggerPayload::task("a"));
    let b = delivered("b", "B", TriggerPayload::event("b"));
    c.on_delivery(&a, false, t0());
    c.on_delivery(&b, false, t0());

    let decision = c.on_action(UserAction::Snooze { minutes: 30 }, &a, t0());
    assert!(matches!(decision, Decision::Snoozed { .. }));

    let pending_a = pending_for(&c, "a");
    assert_eq!(pending_a.len(), 1);
    assert_eq!(pending_a[0].fire_at, t0() + Duration::minutes(30));

    let pending_b = pending_for(&c, "b");
    assert_eq!(pending_b.len(), 1);
    assert_eq!(pending_b[0].fire_at, t0() + Duration::minutes(5));
}

#[test]
fn payload_interval_beats_configured_default() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("t", "T", TriggerPayload::task("t").with_interval(7));
    c.on_delivery(&trigger, false, t0());
    assert_eq!(pending_for(&c, "t")[0].fire_at, t0() + Duration::minutes(7));

    let mut bare = controller_with(None);
    let trigger = delivered("t", "T", TriggerPayload::task("t"));
    bare.on_delivery(&trigger, false, t0());
    assert_eq!(pending_for(&bare, "t")[0].fire_at, t0() + Duration::minutes(5));
}

#[test]
fn open_and_dismiss_continue_nags() {
    let mut c = controller_with(Some(10));
    let trigger = delivered("ev", "Standup", TriggerPayload::event("ev"));
    assert!(matches!(
        c.on_action(UserAction::Open, &trigger, t0()),
        Decision::Continued { interval_minutes: 10, .. }
    ));
    assert!(matches!(
        c.on_action(UserAction::Dismiss, &trigger, t0() + Duration::minutes(1)),
        Decision::Continued { .. }
    ));
    assert_eq!(pending_for(&c, "ev").len(), 1);
}

#[test]
fn check_in_delivery_refills_queue() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("focus-checkin-0", "Focus check-in", TriggerPayload::FocusCheckIn(Default::default()));
    let decision = c.on_delivery(&trigger, false, t0());
    assert_eq!(decision, Decision::RefilledCheckIns { scheduled: 8 });
    assert_eq!(c.store().pending_of_kind(TriggerKind::FocusCheckIn).unwrap().len(), 8);
}

#[test]
fn expired_break_reads_inactive_and_normalizes() {
    let mut kv = MemoryKvStore::new();
    kv.kv_set(BREAK_MODE_ENABLED_KEY, "true").unwrap();
    kv.kv_set(BREAK_MODE_END_TIME_KEY, &(t0() - Duration::minutes(1)).to_rfc3339())
        .unwrap();

    let mut c = LifecycleController::restore(
        ControllerConfig::default(),
        Box::new(MemoryTriggerStore::new()),
        Box::new(kv),
        t0(),
    );
    assert!(c.break_state().enabled);
    assert!(!c.is_break_active(t0()));
    assert!(!c.break_state().enabled);
    assert_eq!(c.kv().kv_get(BREAK_MODE_ENABLED_KEY).unwrap().as_deref(), Some("false"));
    assert!(c.kv().kv_get(BREAK_MODE_END_TIME_KEY).unwrap().is_none());

    let trigger = delivered("task-1", "T", TriggerPayload::task("task-1"));
    assert!(matches!(c.on_delivery(&trigger, false, t0()), Decision::Continued { .. }));
}

#[test]
fn corrupt_break_state_fails_open() {
    let mut kv = MemoryKvStore::new();
    kv.kv_set(BREAK_MODE_ENABLED_KEY, "maybe").unwrap();
    let mut c = LifecycleController::restore(
        ControllerConfig::default(),
        Box::new(MemoryTriggerStore::new()),
        Box::new(kv),
        t0(),
    );
    assert!(!c.is_break_active(t0()));
}

#[test]
fn break_end_delivery_clears_break_and_says_so() {
    let mut c = controller_with(Some(5));
    c.start_break_for(20, t0()).unwrap();
    let end = c.store().pending(&BREAK_END_ENTITY.into()).unwrap().remove(0);
    c.drain_events();

    assert_eq!(c.on_delivery(&end, false, end.fire_at), Decision::BreakEnded);
    assert!(!c.break_state().enabled);
    let speech: Vec<_> = c
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::SpeakOrDisplay { .. }))
        .collect();
    assert_eq!(speech.len(), 1);
    assert!(c.store().all_pending().unwrap().is_empty());
}

#[test]
fn restarting_a_break_overwrites_end_time() {
    let mut c = controller_with(Some(5));
    c.start_break_for(60, t0()).unwrap();
    c.start_break_for(10, t0()).unwrap();
    assert_eq!(c.break_state().end_time, Some(t0() + Duration::minutes(10)));
    assert!(!c.is_break_active(t0() + Duration::minutes(11)));
}

#[test]
fn remote_completion_matches_local_done() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("task-42", "Email Alex", TriggerPayload::task("task-42"));
    c.on_delivery(&trigger, false, t0());
    c.drain_events();

    let msg = RemoteMessage::parse(r#"{"action":"taskCompleted","entityId":"task-42"}"#).unwrap();
    let first = c.on_remote(&msg, t0());
    assert!(matches!(first, Decision::Resolved { cancelled: 1, celebrated: true, .. }));
    let events = c.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::LogEvent { entity_title: Some(t), .. } if t == "Email Alex"
    )));

    // Duplicate relay delivery.
    let again = c.on_remote(&msg, t0());
    assert!(matches!(again, Decision::Resolved { celebrated: false, .. }));
    assert!(c.drain_events().is_empty());
}

#[test]
fn remote_snooze_uses_snooze_path() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("ev-3", "Dentist", TriggerPayload::event("ev-3"));
    c.on_delivery(&trigger, false, t0());

    let msg = RemoteMessage::Snooze {
        entity_id: "ev-3".into(),
        minutes: 15,
    };
    assert!(matches!(c.on_remote(&msg, t0()), Decision::Snoozed { .. }));
    let pending = pending_for(&c, "ev-3");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fire_at, t0() + Duration::minutes(15));
    assert_eq!(pending[0].kind(), TriggerKind::Event);
}

#[test]
fn scheduling_failure_is_logged_not_fatal() {
    let mut store = MemoryTriggerStore::new();
    store.reject_schedules(true);
    let mut c = LifecycleController::new(
        ControllerConfig::default(),
        Box::new(store),
        Box::new(MemoryKvStore::new()),
        BreakMode::new(),
        HyperfocusSession::new(),
    );
    let trigger = delivered("task-1", "T", TriggerPayload::task("task-1"));
    assert!(matches!(
        c.on_delivery(&trigger, false, t0()),
        Decision::SchedulingFailed { .. }
    ));
    // Still usable afterwards.
    assert!(matches!(c.on_action(UserAction::Done, &trigger, t0()), Decision::Resolved { .. }));
}

#[test]
fn raw_delivery_classifies_by_prefix_and_payload() {
    let raw: RawDelivery = serde_json::from_value(serde_json::json!({
        "identifier": "task-42",
        "title": "Email Alex",
        "userInfo": { "taskId": "task-42", "intervalMinutes": 7 }
    }))
    .unwrap();
    let trigger = raw.into_trigger(t0());
    assert_eq!(trigger.kind(), TriggerKind::Task);
    assert_eq!(trigger.payload.interval_minutes(), Some(7));

    let raw = RawDelivery {
        identifier: Some("daily-review".into()),
        ..Default::default()
    };
    assert_eq!(raw.into_trigger(t0()).kind(), TriggerKind::Daily);

    let anonymous = RawDelivery::default().into_trigger(t0());
    assert!(!anonymous.entity_id.as_str().is_empty());
}

#[test]
fn oversized_delivery_interval_does_not_schedule() {
    let mut c = controller_with(Some(5));
    let raw: RawDelivery = serde_json::from_value(serde_json::json!({
        "identifier": "task-9",
        "title": "Renew passport",
        "userInfo": { "taskId": "task-9", "intervalMinutes": 9_000_000_000_000_i64 }
    }))
    .unwrap();
    let trigger = raw.into_trigger(t0());

    assert_eq!(
        c.on_delivery(&trigger, true, t0()),
        Decision::SchedulingFailed { entity_id: "task-9".into() }
    );
    assert!(pending_for(&c, "task-9").is_empty());

    // The next ordinary delivery still gets its continuation.
    let next = delivered("task-10", "Water plants", TriggerPayload::task("task-10"));
    assert!(matches!(c.on_delivery(&next, true, t0()), Decision::Continued { .. }));
}

#[test]
fn duplicate_delivery_after_done_schedules_nothing() {
    let mut c = controller_with(Some(5));
    let trigger = delivered("task-42", "Email Alex", TriggerPayload::task("task-42"));
    c.on_delivery(&trigger, false, t0());
    assert!(matches!(
        c.on_action(UserAction::Done, &trigger, t0()),
        Decision::Resolved { celebrated: true, .. }
    ));
    c.drain_events();

    let late = t0() + Duration::seconds(10);
    assert_eq!(c.on_delivery(&trigger, false, late), Decision::NoAction);
    assert!(pending_for(&c, "task-42").is_empty());

    let events = c.drain_events();
    assert!(events.iter().any(|e| matches!(e, Event::SpeakOrDisplay { .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::TriggerCelebrationFeedback { .. })));
}
