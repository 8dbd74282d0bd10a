mod cmd_blockers;
mod cmd_decisions;
mod cmd_feedback;
mod cmd_history;
mod cmd_init;
mod cmd_persona;
mod cmd_resolve;
mod cmd_run;
mod cmd_status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "skald", version, about = "Cross-team chat digest engine")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a .skald/ workspace with a default config
    Init,
    /// Run the digest pipeline once
    Run {
        /// Channel batches JSON (array of {team, channel, text, message_count});
        /// defaults to one empty batch per configured channel
        #[arg(long)]
        input: Option<std::path::PathBuf>,
        /// Pre-extracted events fixture JSON keyed by team (stands in for
        /// the extraction model)
        #[arg(long)]
        events: Option<std::path::PathBuf>,
    },
    /// Show last run and store counts
    Status,
    /// List active blockers, most severe and oldest first
    Blockers,
    /// Advance a blocker's status (forward only)
    Resolve {
        /// Blocker ID (see `skald blockers`)
        id: String,
        /// mitigated or resolved
        #[arg(long, default_value = "resolved")]
        status: String,
    },
    /// List recent decisions
    Decisions {
        /// Lookback in days
        #[arg(long, default_value = "7")]
        days: u64,
    },
    /// Record a reaction to a delivered digest item
    Feedback {
        /// Digest item ID (e.g. blk_3f2a91c04d11)
        item: String,
        /// Reacting user
        #[arg(long)]
        user: String,
        /// One of: accurate, wrong, missing-context, irrelevant
        #[arg(long)]
        category: String,
        /// Optional free-text comment
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show the resolved persona for a role/team pair
    Persona {
        role: String,
        team: String,
    },
    /// Show recent run history
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = std::env::current_dir()?;

    match cli.cmd {
        Command::Init => cmd_init::execute(&root),
        Command::Run { input, events } => {
            cmd_run::execute(&root, input.as_deref(), events.as_deref())
        }
        Command::Status => cmd_status::execute(&root),
        Command::Blockers => cmd_blockers::execute(&root),
        Command::Resolve { id, status } => cmd_resolve::execute(&root, &id, &status),
        Command::Decisions { days } => cmd_decisions::execute(&root, days),
        Command::Feedback {
            item,
            user,
            category,
            comment,
        } => cmd_feedback::execute(&root, &item, &user, &category, comment.as_deref()),
        Command::Persona { role, team } => cmd_persona::execute(&role, &team),
        Command::History { limit } => cmd_history::execute(&root, limit),
    }
}
