use clap::{Args, Subcommand};
use serde::Serialize;

use foreman::config::WorkflowConfig;

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display the effective workflow (file merged over built-in defaults)
    Show {
        /// Show only built-in defaults (ignore foreman.yml)
        #[arg(long)]
        builtin: bool,
    },
    /// Load and validate the workflow file
    Validate,
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<WorkflowConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid: Option<bool>,
}

pub fn run(args: ConfigArgs, global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { builtin: true } => Ok((
            ConfigOutput {
                command: "config.show".to_string(),
                path: None,
                config: Some(WorkflowConfig::default()),
                valid: None,
            },
            0,
        )),
        ConfigCommand::Show { builtin: false } => {
            let ws = Workspace::load(global)?;
            Ok((
                ConfigOutput {
                    command: "config.show".to_string(),
                    path: ws.source.map(|p| p.to_string_lossy().to_string()),
                    config: Some(ws.config),
                    valid: None,
                },
                0,
            ))
        }
        ConfigCommand::Validate => {
            // Loading validates; an invalid file surfaces as the error.
            let ws = Workspace::load(global)?;
            Ok((
                ConfigOutput {
                    command: "config.validate".to_string(),
                    path: ws.source.map(|p| p.to_string_lossy().to_string()),
                    config: None,
                    valid: Some(true),
                },
                0,
            ))
        }
    }
}
