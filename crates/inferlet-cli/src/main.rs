//! inferlet CLI
//!
//! Deploys a local inference server container, supervises it until it exits,
//! and starts/stops compose service sets.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use inferlet_core::OrchestratorConfig;
use inferlet_runtime::ComposeAction;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// inferlet - local inference server deployment orchestrator
#[derive(Parser, Debug)]
#[command(name = "inferlet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy the inference server and supervise it until it exits
    ///
    /// Exits with the container's exit code. An interrupt exits with 130 and an
    /// elapsed --wait-timeout with 124; a container that itself exits with 124
    /// or 130 cannot be told apart from these.
    Run {
        /// Inference server image
        #[arg(long)]
        image: Option<String>,

        /// Host directory holding the model repository
        #[arg(long, alias = "path-to-models-root")]
        models: Option<PathBuf>,

        /// Build accelerator-specific models when the server starts
        #[arg(long)]
        build_accelerated_models: bool,

        /// Stop the container if it is still running after this many seconds
        #[arg(long)]
        wait_timeout: Option<u64>,
    },

    /// Start or stop the services of a compose file
    Compose {
        #[command(subcommand)]
        action: ComposeCommand,
    },

    /// Show accelerator detection and the resulting container environment
    Probe,
}

#[derive(Subcommand, Debug)]
enum ComposeCommand {
    /// Start services
    Start {
        /// Compose file
        file: PathBuf,

        /// Limit to these services (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,
    },

    /// Stop services
    Stop {
        /// Compose file
        file: PathBuf,

        /// Limit to these services (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<OrchestratorConfig> {
    match path {
        Some(path) => Ok(OrchestratorConfig::from_file(path)?),
        None => Ok(OrchestratorConfig::default()),
    }
}

async fn execute(command: Commands, config: OrchestratorConfig) -> anyhow::Result<u8> {
    match command {
        Commands::Run {
            image,
            models,
            build_accelerated_models,
            wait_timeout,
        } => {
            let options = commands::RunOptions {
                image,
                models,
                build_accelerated_models,
                wait_timeout,
            };
            commands::run(config, options).await
        }
        Commands::Compose { action } => match action {
            ComposeCommand::Start { file, services } => {
                commands::compose(ComposeAction::Start, file, services).await
            }
            ComposeCommand::Stop { file, services } => {
                commands::compose(ComposeAction::Stop, file, services).await
            }
        },
        Commands::Probe => commands::probe(&config),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.logging, cli.log_level.as_deref(), cli.verbose);

    match execute(cli.command, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["inferlet", "run"]).unwrap();
        match cli.command {
            Commands::Run {
                image,
                models,
                build_accelerated_models,
                wait_timeout,
            } => {
                assert!(image.is_none());
                assert!(models.is_none());
                assert!(!build_accelerated_models);
                assert!(wait_timeout.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "inferlet",
            "run",
            "--image",
            "nvcr.io/nvidia/tritonserver:24.01-py3",
            "--path-to-models-root",
            "/mnt/nas/models",
            "--build-accelerated-models",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                image,
                models,
                build_accelerated_models,
                ..
            } => {
                assert_eq!(image.as_deref(), Some("nvcr.io/nvidia/tritonserver:24.01-py3"));
                assert_eq!(models, Some(PathBuf::from("/mnt/nas/models")));
                assert!(build_accelerated_models);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_compose_services() {
        let cli = Cli::try_parse_from([
            "inferlet",
            "compose",
            "start",
            "docker-compose.yml",
            "--service",
            "svcA",
            "--service",
            "svcB",
        ])
        .unwrap();

        match cli.command {
            Commands::Compose {
                action: ComposeCommand::Start { file, services },
            } => {
                assert_eq!(file, PathBuf::from("docker-compose.yml"));
                assert_eq!(services, vec!["svcA", "svcB"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_help_notes_reserved_exit_codes() {
        let mut command = <Cli as clap::CommandFactory>::command();
        let run = command.find_subcommand_mut("run").unwrap();
        let help = run.render_long_help().to_string();
        assert!(help.contains("130"));
        assert!(help.contains("124"));
    }

    #[test]
    fn test_load_config_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config.container.image, inferlet_core::DEFAULT_IMAGE);
    }
}
