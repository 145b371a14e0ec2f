use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use dpdash::api::HttpBackend;
use dpdash::cli::{self, OutputFormat, RuleChange};
use dpdash::{config, tracing_init, tui};

#[derive(Debug, Parser)]
#[command(name = "dpdash")]
#[command(about = "Terminal dashboard for the deeprotection web backend")]
struct App {
    /// Backend base URL (overrides config and DPDASH_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open the interactive dashboard (default)
    Ui,
    /// Show protection status
    Status {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List or edit protected paths and command rules
    Rules {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
        #[command(subcommand)]
        action: Option<RulesAction>,
    },
    /// Reload the backend configuration
    Reload,
    /// Restart the protection service
    Restart,
    /// Run a command on the backend host
    Exec {
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Follow the live log feed
    Logs {
        /// Stop after the first log line
        #[arg(long)]
        once: bool,
    },
    /// List UI languages offered by the backend
    Languages {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Client configuration: show, init, path
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum RulesAction {
    /// Protect a path
    AddPath { path: String },
    /// Add a command rule; without a replacement the command is blocked
    AddCommand {
        original: String,
        replacement: Option<String>,
    },
    /// Remove a protected path by its number
    RemovePath { number: usize },
    /// Remove a command rule by its number
    RemoveCommand { number: usize },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective merged configuration
    Show,
    /// Write a default config to ~/.dpdash/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print config file locations
    Path,
}

fn main() -> Result<()> {
    let app = App::parse();

    let loaded = config::load();
    tracing_init::init_tracing(&loaded.config.logging.level);
    loaded.log_skipped();

    let mut config = loaded.config;
    if let Some(url) = app.url {
        config.backend.url = url;
    }
    tracing::debug!(url = %config.backend.url, "starting");

    let backend = HttpBackend::from_config(&config.backend);

    match app.command.unwrap_or(Commands::Ui) {
        Commands::Ui => tui::run(Arc::new(backend), &config),
        Commands::Status { format } => {
            cli::run_status(&backend, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Rules { format, action } => match action {
            None => cli::run_rules(&backend, OutputFormat::from_str_opt(Some(&format))),
            Some(action) => {
                let change = match action {
                    RulesAction::AddPath { path } => RuleChange::AddPath(path),
                    RulesAction::AddCommand {
                        original,
                        replacement,
                    } => RuleChange::AddCommand {
                        original,
                        replacement: replacement.unwrap_or_default(),
                    },
                    RulesAction::RemovePath { number } => RuleChange::RemovePath(number),
                    RulesAction::RemoveCommand { number } => RuleChange::RemoveCommand(number),
                };
                cli::run_rule_change(&backend, change)
            }
        },
        Commands::Reload => cli::run_reload(&backend),
        Commands::Restart => cli::run_restart(&backend),
        Commands::Exec { args } => cli::run_exec(&backend, &args.join(" ")),
        Commands::Logs { once } => cli::run_logs(&backend, once),
        Commands::Languages { format } => {
            cli::run_languages(&backend, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(&config),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Path => cli::run_config_path(),
        },
    }
}
