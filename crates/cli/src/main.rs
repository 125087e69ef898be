//! `openmcp`: turn OpenAPI-described HTTP APIs into LLM tools from the command line.
//!
//! Usage:
//!   openmcp scan [DIR]
//!   openmcp specs --spec SRC...
//!   openmcp tools --spec SRC... [--function-format]
//!   openmcp call --spec SRC... TOOL [ARGS_JSON]
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod config;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand, ValueEnum};
use config::{CliConfig, default_config_path, load_config};
use openmcp_openapi_tools::catalog::ToolCatalog;
use openmcp_openapi_tools::loader::SpecSource;
use owo_colors::OwoColorize as _;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Debug, Parser)]
#[command(
    name = "openmcp",
    version,
    about = "Expose OpenAPI-described HTTP APIs as LLM-callable tools"
)]
struct Cli {
    /// Config file (YAML or JSON). Defaults to $XDG_CONFIG_HOME/openmcp/config.yaml.
    #[arg(long, global = true, env = "OPENMCP_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Timeout for one tool call, in seconds.
    #[arg(long, global = true, env = "OPENMCP_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan a directory for specs and report tool counts
    Scan {
        /// Directory to scan (defaults to `specsDir` from the config, then ./specs)
        #[arg(env = "OPENMCP_SPECS_DIR")]
        dir: Option<PathBuf>,
    },
    /// Load specs and list their metadata
    Specs {
        /// Spec file path or URL (repeatable)
        #[arg(long = "spec")]
        specs: Vec<String>,
    },
    /// Register specs and print the tool catalog
    Tools {
        /// Spec file path or URL (repeatable)
        #[arg(long = "spec")]
        specs: Vec<String>,
        /// Print tools in the chat-model function-calling shape
        #[arg(long)]
        function_format: bool,
    },
    /// Register specs and execute one tool
    Call {
        /// Spec file path or URL (repeatable)
        #[arg(long = "spec")]
        specs: Vec<String>,
        /// Tool name, e.g. post_calculate_add
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config_path = match cli.config.clone() {
        Some(p) => p,
        None => default_config_path()?,
    };
    let cfg = load_config(&config_path)?;
    tracing::debug!(config = %config_path.display(), "loaded CLI config");

    run(cli, &cfg).await
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("openmcp=info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run(cli: Cli, cfg: &CliConfig) -> anyhow::Result<()> {
    let catalog_config = cfg.catalog_config(cli.request_timeout_secs);

    match cli.command {
        Command::Scan { dir } => {
            let dir = dir.unwrap_or_else(|| cfg.specs_dir());
            let catalog = ToolCatalog::new(catalog_config)?;
            let report = catalog
                .scan(&dir)
                .await
                .with_context(|| format!("scan {}", dir.display()))?;
            print_json(&report)
        }
        Command::Specs { specs } => {
            let catalog = ToolCatalog::new(catalog_config)?;
            register_all(&catalog, cfg, &specs).await?;
            print_json(&catalog.specs())
        }
        Command::Tools {
            specs,
            function_format,
        } => {
            let catalog = ToolCatalog::new(catalog_config)?;
            register_all(&catalog, cfg, &specs).await?;
            let tools = catalog.list_tools();
            if function_format {
                let functions: Vec<Value> = tools.iter().map(|t| t.to_function_tool()).collect();
                print_json(&functions)
            } else {
                print_json(&tools)
            }
        }
        Command::Call { specs, tool, args } => {
            let arguments = parse_arguments(&args)?;
            let catalog = ToolCatalog::new(catalog_config)?;
            register_all(&catalog, cfg, &specs).await?;

            let result = catalog.execute_tool(&tool, &arguments).await;
            if result.success {
                eprintln!("{} {tool}", "ok".green().bold());
            } else {
                eprintln!("{} {tool}", "failed".red().bold());
            }
            print_json(&result)
        }
    }
}

/// Register config-file sources first, then command-line ones.
async fn register_all(
    catalog: &ToolCatalog,
    cfg: &CliConfig,
    specs: &[String],
) -> anyhow::Result<()> {
    let sources: Vec<&String> = cfg.specs.iter().chain(specs).collect();
    if sources.is_empty() {
        bail!("no specs given: pass --spec or list them under `specs` in the config file");
    }
    for location in sources {
        let source = SpecSource::parse(location)?;
        let summary = catalog
            .register_spec(&source)
            .await
            .with_context(|| format!("register {location}"))?;
        tracing::info!(
            spec = %summary.spec_title,
            tools = summary.tools_registered,
            "registered spec"
        );
    }
    Ok(())
}

fn parse_arguments(raw: &str) -> anyhow::Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("parse tool arguments as JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("tool arguments must be a JSON object, got {other}"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("serialize output as json")?;
    println!("{out}");
    Ok(())
}
