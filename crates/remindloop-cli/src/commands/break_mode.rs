use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::json;

use super::{drain_effects, open_controller, print_outcome, CmdResult};

#[derive(Subcommand)]
pub enum BreakAction {
    /// Start a break; reminders stay quiet until it ends
    Start {
        /// Break length in minutes
        #[arg(long, required_unless_present = "until", conflicts_with = "until")]
        minutes: Option<i64>,
        /// End the break at this RFC 3339 instant
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
    /// End the current break early
    End,
    /// Print break state as JSON
    Status,
}

pub fn run(action: BreakAction, now: DateTime<Utc>) -> CmdResult {
    let (mut controller, log) = open_controller(now)?;

    match action {
        BreakAction::Start { minutes, until } => {
            let end = match (minutes, until) {
                (_, Some(until)) => controller.start_break_until(until, now)?,
                (Some(minutes), None) => controller.start_break_for(minutes, now)?,
                (None, None) => return Err("either --minutes or --until is required".into()),
            };
            let events = drain_effects(&mut controller, &log);
            print_outcome(&json!({ "end_time": end }), &events)?;
        }
        BreakAction::End => {
            let was_active = controller.end_break(now);
            let events = drain_effects(&mut controller, &log);
            print_outcome(&json!({ "ended": was_active }), &events)?;
        }
        BreakAction::Status => {
            let snapshot = controller.snapshot(now);
            let status = json!({
                "active": snapshot.break_active,
                "end_time": snapshot.break_mode.end_time,
                "remaining_secs": snapshot.break_remaining_secs,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
