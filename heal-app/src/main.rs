use anyhow::Result;
use clap::{Parser, Subcommand};
use heal_common::observability::{LogConfig, LogFormat, init_logging};
use std::path::PathBuf;
mod wiring;

#[derive(Debug, Parser)]
#[command(name = "heal", version, about = "Self-healing selector resolution for UI suites")]
struct Cli {
    /// Mirror log events to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open a session and resolve element keys through the healing pipeline.
    Resolve {
        #[arg(long, env = "HEAL_SUITE")]
        suite: PathBuf,
        #[arg(long, default_value = "chrome")]
        browser: String,
        /// Click each element after resolving it.
        #[arg(long)]
        click: bool,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the durable override map.
    Overrides {
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
    },
    /// Print the most recent audit records.
    Audit {
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(LogConfig {
        emit_stderr: cli.verbose,
        format: LogFormat::from_env(),
        ..LogConfig::default()
    })?;
    tracing::debug!(log = %log_path.display(), "logging initialised");

    match cli.command {
        Command::Resolve {
            suite,
            browser,
            click,
            timeout_secs,
            keys,
        } => wiring::resolve(&suite, &browser, &keys, click, timeout_secs).await,
        Command::Overrides { artifacts } => wiring::print_overrides(&artifacts),
        Command::Audit { artifacts, tail } => wiring::print_audit(&artifacts, tail),
    }
}
