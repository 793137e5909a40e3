//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::export::{ExportOptions, Selection};
use crate::processor::{DEFAULT_DIR, DEFAULT_FILE_NAME, ProcessorConfig};
use crate::spinnaker::{BASE_URL_ENV, ClientSettings};

/// mdctl - Manage Spinnaker delivery configs.
#[derive(Parser, Debug)]
#[command(name = "mdctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the delivery config.
    #[arg(short, long, global = true, env = "MD_CONFIG_DIR", default_value = DEFAULT_DIR)]
    pub dir: PathBuf,

    /// Delivery config file name.
    #[arg(short, long, global = true, env = "MD_CONFIG_FILE", default_value = DEFAULT_FILE_NAME)]
    pub file: String,

    /// Spinnaker API base URL.
    #[arg(long, global = true, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export deployed resources into the delivery config.
    Export {
        /// Spinnaker application to export.
        app: String,

        /// Service account the platform acts as.
        #[arg(long, env = "SPINNAKER_SERVICE_ACCOUNT", default_value = "")]
        service_account: String,

        /// Put every exported resource in this environment.
        #[arg(short, long)]
        env: Option<String>,

        /// Environment for resources not yet in the config.
        #[arg(long, default_value = "testing")]
        default_env: String,

        /// Only export resources in this account.
        #[arg(long)]
        account: Option<String>,

        /// Only export these clusters (comma separated).
        #[arg(long, value_delimiter = ',')]
        clusters: Vec<String>,
    },

    /// Publish the delivery config.
    Publish {
        /// Publish even if resources would be orphaned.
        #[arg(long)]
        force: bool,
    },

    /// Show how deployed resources differ from the delivery config.
    Diff {
        /// Include resources without differences.
        #[arg(short, long)]
        all: bool,
    },

    /// Validate the delivery config with the API.
    Validate,

    /// Delete the published delivery config.
    Delete {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Rewrite the delivery config in canonical form.
    Fmt {
        /// Exit with an error instead of writing if the file would change.
        #[arg(long)]
        check: bool,
    },

    /// Show the actions the platform plans to take.
    Plan,

    /// Pause management of an application.
    Pause {
        /// Spinnaker application.
        app: String,
    },

    /// Resume management of an application.
    Resume {
        /// Spinnaker application.
        app: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the processor configuration for the selected file.
    #[must_use]
    pub fn processor_config(&self) -> ProcessorConfig {
        let config = ProcessorConfig::default()
            .with_dir(&self.dir)
            .with_file_name(&self.file);
        match &self.command {
            Commands::Export {
                app,
                service_account,
                ..
            } => config
                .with_app_name(app)
                .with_service_account(service_account),
            _ => config,
        }
    }

    /// Returns the API client settings.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
        }
    }
}

impl Commands {
    /// Returns the export options for an `export` command.
    #[must_use]
    pub fn export_options(&self) -> Option<ExportOptions> {
        let Self::Export {
            service_account,
            env,
            default_env,
            account,
            clusters,
            ..
        } = self
        else {
            return None;
        };
        Some(ExportOptions {
            selection: if clusters.is_empty() {
                Selection::All
            } else {
                Selection::Clusters(clusters.clone())
            },
            only_account: account.clone(),
            env_name: env.clone(),
            default_env: default_env.clone(),
            service_account: service_account.clone(),
        })
    }
}
