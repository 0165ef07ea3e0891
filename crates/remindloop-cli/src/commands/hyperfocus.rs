use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::json;

use super::{drain_effects, open_controller, print_outcome, CmdResult};

#[derive(Subcommand)]
pub enum HyperfocusAction {
    /// Start a session, or end the running one
    Toggle,
    /// Print session state as JSON
    Status,
    /// Advance the session clock once and print any notices
    Tick,
}

pub fn run(action: HyperfocusAction, now: DateTime<Utc>) -> CmdResult {
    let (mut controller, log) = open_controller(now)?;

    match action {
        HyperfocusAction::Toggle => {
            let active = controller.toggle_hyperfocus(now);
            let events = drain_effects(&mut controller, &log);
            print_outcome(&json!({ "active": active }), &events)?;
        }
        HyperfocusAction::Status => {
            let snapshot = controller.hyperfocus().snapshot(now);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        HyperfocusAction::Tick => {
            let notices = controller.tick_hyperfocus(now);
            let events = drain_effects(&mut controller, &log);
            let stage = controller.hyperfocus().stage();
            print_outcome(&json!({ "notices": notices, "stage": stage }), &events)?;
        }
    }
    Ok(())
}
