//! CLI for exploring and serving hostcall procedure trees.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod demo;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use hostcall::{LogLevel, LoggingOptions, Router};
use hostcall_proto::{Path, Request, Sender};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostcall", version, about = "Path-addressed RPC between a host and its clients")]
struct Cli {
    /// Diagnostic verbosity (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log every invocation request at this level.
    #[arg(long, global = true)]
    log_requests: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the catalog of callable paths.
    #[command(visible_alias = "ls")]
    Catalog {
        /// Output format.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Invoke a procedure by dotted path and print the reply.
    Invoke {
        /// Dotted path, e.g. `math.add`.
        path: String,

        /// Positional arguments as JSON values (bare words are strings).
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Sender id attached to the request.
        #[arg(long)]
        sender: Option<String>,
    },

    /// Serve the demo procedures over stdin/stdout frames.
    Serve,

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for the catalog.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// One dotted path per line.
    #[default]
    Table,
    /// The catalog tree as JSON.
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    if let Err(e) = cli.dispatch().await {
        eprintln!("hostcall: {e:#}");
        std::process::exit(1);
    }
}

/// Installs a stderr subscriber; `RUST_LOG` wins over `--log-level`.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    async fn dispatch(self) -> Result<()> {
        let logging = self
            .log_requests
            .map_or_else(LoggingOptions::disabled, LoggingOptions::enabled);
        let router = Router::builder(demo::tree()).logging(logging).build();

        match self.command {
            Command::Catalog { format } => catalog(&router, format),
            Command::Invoke { path, args, sender } => invoke(&router, &path, &args, sender).await,
            Command::Serve => {
                tracing::info!(
                    procedures = router.catalog().paths().len(),
                    "serving demo procedures on stdio"
                );
                hostcall::serve(router, tokio::io::stdin(), tokio::io::stdout())
                    .await
                    .context("serving on stdio")
            }
            Command::Completion { shell } => {
                clap_complete::generate(shell, &mut Self::command(), "hostcall", &mut std::io::stdout());
                Ok(())
            }
        }
    }
}

fn catalog(router: &Router, format: OutputFormat) -> Result<()> {
    let catalog = router.catalog();
    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }

    let paths = catalog.paths();
    if paths.is_empty() {
        println!("No procedures.");
        return Ok(());
    }
    for path in &paths {
        println!("{path}");
    }
    Ok(())
}

async fn invoke(router: &Router, path: &str, args: &[String], sender: Option<String>) -> Result<()> {
    let args: Vec<Value> = args.iter().map(|a| parse_arg(a)).collect();
    let request = Request::invoke(Path::parse_dotted(path), args).into_value();
    let sender = sender.map_or_else(Sender::default, |id| Sender::default().with_id(id));

    let Some(body) = router.handle(&request, &sender).settle().await else {
        bail!("no procedure registered at `{path}`");
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    if body.get("error").is_some() {
        std::process::exit(1);
    }
    Ok(())
}

/// Parses a CLI argument as JSON, falling back to a plain string.
fn parse_arg(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_owned()))
}
