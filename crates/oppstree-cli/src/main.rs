//! `ost` -- CLI binary for the oppstree synthesis pipeline.
//!
//! Provides the following subcommands:
//!
//! - `ost run` -- Synthesize an Opportunity Solution Tree from local files.
//! - `ost categories` -- List configured source categories and weights.
//! - `ost config` -- Show resolved configuration and providers.

use clap::{Parser, Subcommand};

mod commands;
mod config_loader;
mod loader;

/// oppstree product insight synthesis CLI.
#[derive(Parser)]
#[command(name = "ost", about = "Product insight synthesis into Opportunity Solution Trees", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Load sources, run the pipeline and write a session file.
    Run(commands::run::RunArgs),

    /// List configured source categories.
    Categories {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

/// Subcommands for `ost config`.
#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the full resolved configuration as JSON.
    Show {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },

    /// List LLM providers and whether their API keys are set.
    Providers {
        /// Config file path (overrides auto-discovery).
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Categories { config } => {
            let cfg = config_loader::load_config(config.as_deref()).await?;
            commands::categories::categories_list(&cfg.categories);
        }
        Commands::Config { action } => match action {
            ConfigCmd::Show { config } => {
                let cfg = config_loader::load_config(config.as_deref()).await?;
                commands::config_cmd::config_show(&cfg);
            }
            ConfigCmd::Providers { config } => {
                let cfg = config_loader::load_config(config.as_deref()).await?;
                commands::config_cmd::config_providers(&cfg)?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_without_error() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_help_contains_binary_name() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("ost"));
    }

    #[test]
    fn run_args_parse() {
        let cli = Cli::try_parse_from([
            "ost",
            "run",
            "-i",
            "customer_calls=./calls",
            "--input",
            "support_tickets=./tickets.csv",
            "--outcome",
            "Reduce onboarding time",
            "--batch-size",
            "5",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.inputs[1].category, "support_tickets");
                assert_eq!(args.outcomes, vec!["Reduce onboarding time"]);
                assert_eq!(args.batch_size, Some(5));
                assert_eq!(args.output, std::path::PathBuf::from("ost-session.json"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_requires_input() {
        assert!(Cli::try_parse_from(["ost", "run"]).is_err());
        assert!(Cli::try_parse_from(["ost", "run", "-i", "no-separator"]).is_err());
    }

    #[test]
    fn config_subcommands_parse() {
        assert!(Cli::try_parse_from(["ost", "config", "show"]).is_ok());
        assert!(Cli::try_parse_from(["ost", "config", "providers", "-c", "x.json"]).is_ok());
        assert!(Cli::try_parse_from(["ost", "categories"]).is_ok());
    }
}
