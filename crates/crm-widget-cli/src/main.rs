//! CRM chat widget terminal host.
//!
//! Binary name: `crmw`
//!
//! Parses CLI arguments, sets up tracing, resolves configuration, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, SessionCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,crm_widget_core=debug,crm_widget_infra=debug",
        _ => "trace",
    };
    crm_widget_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    crm_widget_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "crmw", &mut std::io::stdout());
        }

        Commands::Chat { config } => {
            let state = AppState::init(&config).await?;
            cli::chat::loop_runner::run_chat_loop(&state).await?;
        }

        Commands::Status { config } => {
            let state = AppState::init(&config).await?;
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Session { action } => {
            let state = AppState::init(&cli::ConfigArgs::default()).await?;
            match action {
                SessionCommand::Show => cli::session::show_session(&state, cli.json).await?,
                SessionCommand::Clear => cli::session::clear_session(&state, cli.json).await?,
            }
        }
    }

    Ok(())
}
