use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use privd_core::utils::init_logging;
use privd_core::{AdminError, EngineConfig, Error, LogLevel, PolicyError};
use privd_policy::{AdminCaller, PolicyBatch, PrivilegeService};
use tracing::info;

mod commands;

/// privd command-line interface
///
/// Builds a privilege service from a configuration, applies policy batch
/// files as a trusted administrator, then runs one command against it.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Engine configuration file (TOML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Policy batch file (TOML, or JSON with a .json extension); repeatable
    #[clap(long = "batch", global = true)]
    batches: Vec<PathBuf>,

    /// Override the configured log level
    #[clap(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the batches and print store statistics
    Apply,

    /// Answer a privilege check
    Check {
        /// Client label
        #[clap(long)]
        client: String,

        /// User
        #[clap(long)]
        user: String,

        /// Privilege
        #[clap(long)]
        privilege: String,

        /// Session id recorded in the audit
        #[clap(long, default_value = "privd-cli")]
        session: String,
    },

    /// Resolve starting from any bucket
    #[clap(name = "admin-check")]
    AdminCheck {
        /// Bucket to start in (empty for the root bucket)
        #[clap(long, default_value = "")]
        bucket: String,

        /// Return a BUCKET result instead of following it
        #[clap(long)]
        no_recursive: bool,

        /// Client label
        #[clap(long)]
        client: String,

        /// User
        #[clap(long)]
        user: String,

        /// Privilege
        #[clap(long)]
        privilege: String,
    },

    /// List the policies of a bucket
    List {
        /// Bucket to list (empty for the root bucket)
        #[clap(long, default_value = "")]
        bucket: String,

        /// Client filter; '#' matches any
        #[clap(long, default_value = "#")]
        client: String,

        /// User filter; '#' matches any
        #[clap(long, default_value = "#")]
        user: String,

        /// Privilege filter; '#' matches any
        #[clap(long, default_value = "#")]
        privilege: String,
    },

    /// List the supported result types
    Describe,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = error_code(&err);
            eprintln!("error [{}]: {:#}", code, err);
            ExitCode::from(code.unsigned_abs().min(u8::MAX as u32) as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(level) = &cli.log_level {
        config.log_level = level
            .parse::<LogLevel>()
            .map_err(|_| anyhow!("unknown log level '{}'", level))?;
    }

    init_logging(config.log_level, config.log_json).context("initializing logging")?;

    let service =
        PrivilegeService::initialize(config).context("initializing the privilege service")?;

    for path in &cli.batches {
        let batch = PolicyBatch::from_file(path)
            .with_context(|| format!("reading batch {}", path.display()))?;
        service
            .set_policies(&AdminCaller::Trusted, &batch)
            .with_context(|| format!("applying batch {}", path.display()))?;
        info!(path = %path.display(), operations = batch.len(), "Applied batch file");
    }

    commands::run(&service, cli.command, cli.json)?;

    service.shutdown();
    Ok(())
}

/// The transport result code of the first privd error in the chain.
fn error_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<Error>() {
            return err.code();
        }
        if let Some(err) = cause.downcast_ref::<AdminError>() {
            return err.code();
        }
        if let Some(err) = cause.downcast_ref::<PolicyError>() {
            return err.code();
        }
    }
    privd_core::error::CODE_UNEXPECTED
}
