use chrono::{DateTime, Utc};
use clap::Args;
use remindloop_core::{RawDelivery, TriggerKind};

use super::{drain_effects, open_controller, print_outcome, CmdResult, TargetArgs};

#[derive(Args)]
pub struct DeliverArgs {
    /// Entity id (e.g. "task-42")
    #[arg(long, required_unless_present = "raw")]
    id: Option<String>,
    /// Trigger kind: task, event, focusCheckIn, test, daily, breakModeEnd
    #[arg(long, default_value = "task")]
    kind: TriggerKind,
    /// Reminder title
    #[arg(long, default_value = "")]
    title: String,
    /// Per-reminder nag interval in minutes
    #[arg(long)]
    interval: Option<i64>,
    /// Raw delivery JSON from an external store:
    /// {"identifier": "...", "title": "...", "userInfo": {...}}
    #[arg(long, conflicts_with = "id")]
    raw: Option<String>,
    /// The host app was in the foreground when it fired
    #[arg(long)]
    foreground: bool,
}

pub fn run(args: DeliverArgs, now: DateTime<Utc>) -> CmdResult {
    let trigger = match (args.raw, args.id) {
        (Some(raw), _) => serde_json::from_str::<RawDelivery>(&raw)?.into_trigger(now),
        (None, Some(id)) => TargetArgs {
            id,
            kind: args.kind,
            title: args.title,
            interval: args.interval,
        }
        .trigger(now),
        (None, None) => return Err("either --id or --raw is required".into()),
    };

    let (mut controller, log) = open_controller(now)?;
    let decision = controller.on_delivery(&trigger, args.foreground, now);
    let events = drain_effects(&mut controller, &log);
    print_outcome(&decision, &events)
}
