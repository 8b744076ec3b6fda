//! editgate CLI - Approval-gated file editing for AI agents and humans.

use clap::Parser;
use editgate::cli::{Cli, Commands, ConfigCommands, EditCommands, McpCommands};
use editgate::commands::{self, Output};
use editgate::config::{self, ConfigOverrides, OutputFormat, ResolvedConfig};
use editgate::mcp;
use editgate::models::ErrorDetails;
use editgate::service::EditService;
use std::process;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "EG_LOG";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut overrides = ConfigOverrides::new();
    for root in &cli.allowed_roots {
        overrides = overrides.with_allowed_root(root.clone());
    }
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }

    let resolved = match config::load_config(cli.config.as_deref(), &overrides) {
        Ok(resolved) => resolved,
        Err(e) => fail(&ErrorDetails::from(e), cli.human_readable),
    };
    let human = resolved.output_format() == OutputFormat::Human;
    debug!(
        build = env!("EG_BUILD_TIMESTAMP"),
        commit = env!("EG_GIT_COMMIT"),
        ttl_secs = resolved.pending_ttl_secs.value,
        "configuration loaded"
    );

    if let Err(e) = run_command(cli.command, &resolved, human) {
        fail(&e, human);
    }
}

/// Log to stderr only; stdout carries command output and the MCP channel.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn run_command(
    command: Commands,
    config: &ResolvedConfig,
    human: bool,
) -> Result<(), ErrorDetails> {
    match command {
        Commands::Mcp { command } => match command {
            McpCommands::Serve => {
                let svc = Arc::new(EditService::from_config(config));
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| ErrorDetails::from(editgate::Error::from(e)))?;
                runtime.block_on(mcp::serve(svc))?;
            }
            McpCommands::Manifest => {
                let manifest = mcp::manifest();
                let text = serde_json::to_string_pretty(&manifest)
                    .map_err(|e| ErrorDetails::from(editgate::Error::from(e)))?;
                println!("{}", text);
            }
        },
        Commands::VersionToken { path } => {
            let svc = EditService::from_config(config);
            output(&commands::version_token(&svc, &path)?, human);
        }
        Commands::Read { path, start, end } => {
            let svc = EditService::from_config(config);
            output(&commands::read(&svc, &path, start, end)?, human);
        }
        Commands::Edit { command } => {
            let svc = EditService::from_config(config);
            run_edit(&svc, command, human)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => output(&commands::config_show(config), human),
        },
    }
    Ok(())
}

/// Prepare an edit, print its preview, and apply it when `--confirm` is given.
fn run_edit(svc: &EditService, command: EditCommands, human: bool) -> Result<(), ErrorDetails> {
    debug!(command = command.name(), "running edit");
    let (args, op) = command.into_parts();
    let prepared = commands::prepare_edit(svc, &args.path, op, args.expect, args.backup)?;
    output(&prepared, human);

    if let Some(confirmation) = args.confirm {
        let applied = commands::approve(svc, &prepared.approval_token, &confirmation)?;
        output(&applied, human);
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn fail(error: &ErrorDetails, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", error);
    } else {
        eprintln!(
            "{}",
            serde_json::json!({ "error": error.message, "kind": error.kind })
        );
    }
    process::exit(1);
}
