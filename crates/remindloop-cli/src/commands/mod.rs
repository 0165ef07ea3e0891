pub mod action;
pub mod break_mode;
pub mod config;
pub mod deliver;
pub mod hyperfocus;
pub mod log;
pub mod run;
pub mod triggers;

use chrono::{DateTime, Utc};
use clap::Args;
use remindloop_core::{
    Config, Database, EntityId, Event, LifecycleController, ReminderTrigger, TriggerHandle,
    TriggerKind, TriggerPayload,
};
use serde::Serialize;
use tracing::warn;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Identifies a reminder on the command line.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Entity id (e.g. "task-42")
    #[arg(long)]
    pub id: String,
    /// Trigger kind: task, event, focusCheckIn, test, daily
    #[arg(long, default_value = "task")]
    pub kind: TriggerKind,
    /// Reminder title
    #[arg(long, default_value = "")]
    pub title: String,
    /// Per-reminder nag interval in minutes
    #[arg(long)]
    pub interval: Option<i64>,
}

impl TargetArgs {
    pub fn payload(&self) -> TriggerPayload {
        let payload = match self.kind {
            TriggerKind::Task => TriggerPayload::task(self.id.as_str()),
            TriggerKind::Event => TriggerPayload::event(self.id.as_str()),
            TriggerKind::FocusCheckIn => TriggerPayload::FocusCheckIn(Default::default()),
            TriggerKind::Test => TriggerPayload::Test,
            TriggerKind::Daily => TriggerPayload::Daily,
            TriggerKind::BreakModeEnd => TriggerPayload::BreakModeEnd,
        };
        match self.interval {
            Some(minutes) => payload.with_interval(minutes),
            None => payload,
        }
    }

    /// The trigger as it would arrive at `now`.
    pub fn trigger(&self, now: DateTime<Utc>) -> ReminderTrigger {
        ReminderTrigger {
            handle: TriggerHandle::new(),
            entity_id: EntityId::from(self.id.as_str()),
            title: self.title.clone(),
            fire_at: now,
            payload: self.payload(),
        }
    }

    /// The earliest pending trigger for this id, else one built from the arguments.
    pub fn resolve(&self, controller: &LifecycleController, now: DateTime<Utc>) -> ReminderTrigger {
        controller
            .store()
            .pending(&EntityId::from(self.id.as_str()))
            .ok()
            .and_then(|p| p.into_iter().next())
            .unwrap_or_else(|| self.trigger(now))
    }
}

/// Controller restored from the data directory, plus a connection for the nag log.
pub fn open_controller(now: DateTime<Utc>) -> Result<(LifecycleController, Database), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = Database::open()?;
    let kv = Database::open()?;
    let log = Database::open()?;
    let controller =
        LifecycleController::restore(config.controller_config(), Box::new(store), Box::new(kv), now);
    Ok((controller, log))
}

/// Drain the controller's effects, persisting log events.
pub fn drain_effects(controller: &mut LifecycleController, log: &Database) -> Vec<Event> {
    let events = controller.drain_events();
    for event in &events {
        if let Err(e) = log.append_log(event) {
            warn!(error = %e, "could not write nag log");
        }
    }
    events
}

#[derive(Serialize)]
struct Outcome<'a, T: Serialize> {
    result: &'a T,
    events: &'a [Event],
}

pub fn print_outcome<T: Serialize>(result: &T, events: &[Event]) -> CmdResult {
    let json = serde_json::to_string_pretty(&Outcome { result, events })?;
    println!("{json}");
    Ok(())
}
