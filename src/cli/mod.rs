pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, Component};

#[derive(Parser)]
#[command(name = "meeting-backend")]
#[command(about = "Action and presenter service of the meeting backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the action and/or presenter server")]
    Serve {
        #[arg(long, help = "Which server to run: action, presenter or all")]
        component: Option<Component>,
    },

    #[command(about = "List registered actions with kind and permission")]
    Actions,

    #[command(about = "Print the compiled instance schema of an action")]
    Schema {
        #[arg(help = "Action name, e.g. poll.start")]
        action: String,
    },

    #[command(about = "Print the permission tree")]
    Permissions,

    #[command(about = "Mint an access token signed with AUTH_TOKEN_SECRET")]
    Token {
        #[arg(help = "User id the token acts for")]
        user_id: u64,
        #[arg(long, help = "Session id claim")]
        session_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        None => commands::serve::handle(config, None).await,
        Some(Commands::Serve { component }) => commands::serve::handle(config, component).await,
        Some(Commands::Actions) => commands::inspect::actions(output_format),
        Some(Commands::Schema { action }) => commands::inspect::schema(&action),
        Some(Commands::Permissions) => commands::inspect::permissions(output_format),
        Some(Commands::Token { user_id, session_id }) => {
            commands::inspect::token(config, user_id, session_id, output_format)
        }
    }
}
