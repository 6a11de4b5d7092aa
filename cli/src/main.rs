use anyhow::Result;
use clap::Parser;
use clap::Subcommand;

mod check_cmd;
mod replay_cmd;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Chat-platform relay to an external assistant")]
struct CourierCli {
    #[command(subcommand)]
    command: CourierCommand,
}

#[derive(Debug, Subcommand)]
enum CourierCommand {
    /// Validate configuration and the platform credential.
    Check,
    /// Drive the engine end-to-end from a JSONL event transcript.
    Replay(replay_cmd::ReplayArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_tracing();

    let cli = CourierCli::parse();
    match cli.command {
        CourierCommand::Check => check_cmd::run(),
        CourierCommand::Replay(args) => replay_cmd::run(args).await,
    }
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
