//! CLI command definitions for the `crmw` binary.
//!
//! Uses clap derive macros for argument parsing. `crmw chat` mounts the
//! widget in the terminal; the remaining commands inspect local state.

pub mod chat;
pub mod session;
pub mod status;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crm_widget_types::config::{DispatchMode, WidgetConfig};

/// Talk to CRM support from your terminal.
#[derive(Parser)]
#[command(name = "crmw", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open an interactive support chat.
    Chat {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Inspect or forget the stored visitor session.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Show the effective widget configuration and stored session.
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Print the stored visitor session.
    Show,

    /// Delete the stored visitor session; the next chat starts fresh.
    Clear,
}

/// Overrides applied on top of `widget.toml`.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// CRM workspace id.
    #[arg(long, env = "CRM_WIDGET_WORKSPACE")]
    pub workspace: Option<String>,

    /// Public widget key.
    #[arg(long, env = "CRM_WIDGET_PUBLIC_KEY")]
    pub public_key: Option<String>,

    /// Base URL of the widget API.
    #[arg(long, env = "CRM_WIDGET_API_URL")]
    pub api_url: Option<String>,

    /// Base URL of the realtime endpoint (derived from the API URL if unset).
    #[arg(long)]
    pub ws_url: Option<String>,

    /// How messages are delivered: rest or socket.
    #[arg(long)]
    pub dispatch: Option<DispatchMode>,

    /// Always start a new conversation instead of resuming the stored one.
    #[arg(long)]
    pub no_resume: bool,
}

impl ConfigArgs {
    /// Apply the flags that were given to `config`.
    pub fn apply(&self, config: &mut WidgetConfig) {
        if let Some(workspace) = &self.workspace {
            config.workspace_id = workspace.clone();
        }
        if let Some(public_key) = &self.public_key {
            config.public_key = public_key.clone();
        }
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(ws_url) = &self.ws_url {
            config.ws_url = Some(ws_url.clone());
        }
        if let Some(dispatch) = self.dispatch {
            config.dispatch = dispatch;
        }
        if self.no_resume {
            config.resume_chat = false;
        }
    }
}
