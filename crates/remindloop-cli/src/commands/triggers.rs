use chrono::{DateTime, Utc};
use clap::Subcommand;
use remindloop_core::{Database, EntityId, ScheduleRequest, TriggerKind, TriggerStore};
use serde_json::json;

use super::{CmdResult, TargetArgs};

#[derive(Subcommand)]
pub enum TriggersAction {
    /// List pending reminders as JSON
    List {
        /// Only this entity
        #[arg(long)]
        entity: Option<String>,
        /// Only this kind
        #[arg(long, conflicts_with = "entity")]
        kind: Option<TriggerKind>,
    },
    /// Schedule a reminder, as an external reminder source would
    Add {
        #[command(flatten)]
        target: TargetArgs,
        /// Minutes from now until it fires
        #[arg(long, default_value = "0")]
        delay: i64,
    },
}

pub fn run(action: TriggersAction, now: DateTime<Utc>) -> CmdResult {
    let mut db = Database::open()?;

    match action {
        TriggersAction::List { entity, kind } => {
            let pending = match (entity, kind) {
                (Some(entity), _) => db.pending(&EntityId::new(entity))?,
                (None, Some(kind)) => db.pending_of_kind(kind)?,
                (None, None) => db.all_pending()?,
            };
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        TriggersAction::Add { target, delay } => {
            if delay < 0 {
                return Err("delay must not be negative".into());
            }
            let request = ScheduleRequest::new(
                target.id.as_str(),
                target.title.as_str(),
                delay,
                target.payload(),
            );
            let fire_at = request.fire_at(now)?;
            let handle = db.schedule(request, now)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "handle": handle, "fire_at": fire_at }))?
            );
        }
    }
    Ok(())
}
