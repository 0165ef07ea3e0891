use chrono::{DateTime, Utc};
use clap::Subcommand;
use remindloop_core::controller::SNOOZE_CHOICES;
use remindloop_core::{RemoteMessage, UserAction, ValidationError};

use super::{drain_effects, open_controller, print_outcome, CmdResult, TargetArgs};

#[derive(Subcommand)]
pub enum ActionCommand {
    /// Mark the obligation resolved; cancels every pending reminder for it
    Done(TargetArgs),
    /// Remind again after a delay
    Snooze {
        #[command(flatten)]
        target: TargetArgs,
        /// Minutes to wait (5, 15 or 30)
        #[arg(long, default_value = "5")]
        minutes: i64,
    },
    /// The reminder was opened without choosing anything
    Open(TargetArgs),
    /// The reminder was swiped away
    Dismiss(TargetArgs),
}

pub fn run(command: ActionCommand, now: DateTime<Utc>) -> CmdResult {
    let (action, target) = match command {
        ActionCommand::Done(target) => (UserAction::Done, target),
        ActionCommand::Snooze { target, minutes } => {
            if !SNOOZE_CHOICES.contains(&minutes) {
                return Err(ValidationError::InvalidSnooze { minutes }.into());
            }
            (UserAction::Snooze { minutes }, target)
        }
        ActionCommand::Open(target) => (UserAction::Open, target),
        ActionCommand::Dismiss(target) => (UserAction::Dismiss, target),
    };

    let (mut controller, log) = open_controller(now)?;
    let trigger = target.resolve(&controller, now);
    let decision = controller.on_action(action, &trigger, now);
    let events = drain_effects(&mut controller, &log);
    print_outcome(&decision, &events)
}

pub fn run_remote(message: &str, now: DateTime<Utc>) -> CmdResult {
    let message = RemoteMessage::parse(message)?;
    let (mut controller, log) = open_controller(now)?;
    let decision = controller.on_remote(&message, now);
    let events = drain_effects(&mut controller, &log);
    print_outcome(&decision, &events)
}
