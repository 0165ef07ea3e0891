use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "remindloop", version, about = "Reminders that keep nagging until you're done")]
struct Cli {
    /// Pretend the current time is this RFC 3339 instant
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report that a reminder fired
    Deliver(commands::deliver::DeliverArgs),
    /// Respond to a delivered reminder
    Action {
        #[command(subcommand)]
        action: commands::action::ActionCommand,
    },
    /// Apply a message from a paired device
    Remote {
        /// JSON such as {"action":"taskCompleted","entityId":"task-42"}
        message: String,
    },
    /// Break mode control
    Break {
        #[command(subcommand)]
        action: commands::break_mode::BreakAction,
    },
    /// Hyperfocus session control
    Hyperfocus {
        #[command(subcommand)]
        action: commands::hyperfocus::HyperfocusAction,
    },
    /// Inspect or create scheduled reminders
    Triggers {
        #[command(subcommand)]
        action: commands::triggers::TriggersAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show the nag log
    Log {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Run the reminder loop in the foreground, printing effects as JSON lines
    Run {
        /// Stop after this many seconds
        #[arg(long)]
        for_secs: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let now = cli.now.unwrap_or_else(Utc::now);
    let result = match cli.command {
        Commands::Deliver(args) => commands::deliver::run(args, now),
        Commands::Action { action } => commands::action::run(action, now),
        Commands::Remote { message } => commands::action::run_remote(&message, now),
        Commands::Break { action } => commands::break_mode::run(action, now),
        Commands::Hyperfocus { action } => commands::hyperfocus::run(action, now),
        Commands::Triggers { action } => commands::triggers::run(action, now),
        Commands::Config { action } => commands::config::run(action),
        Commands::Log { limit } => commands::log::run(limit),
        Commands::Run { for_secs } => commands::run::run(for_secs),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
