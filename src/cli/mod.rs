//! Command-line interface for docport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Log level selection

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;

/// Export document collections through pooled connections
#[derive(Parser, Debug)]
#[command(
    name = "docport",
    version,
    about = "Stream document collections into JSON array files",
    long_about = "Acquire a pooled connection by credential id, stream a filtered query page by \
page and write it to a single JSON array file with bounded memory. Ctrl+C cancels the export \
and deletes the partial file."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for docport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a collection to a JSON array file
    Export(ExportArgs),

    /// List credential ids from the config file
    Credentials,
}

/// Arguments of `docport export`
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Credential id to connect with
    #[arg(long, value_name = "ID")]
    pub credential: String,

    /// Database name
    #[arg(long = "db", value_name = "NAME")]
    pub database: String,

    /// Collection name
    #[arg(long, value_name = "NAME")]
    pub collection: String,

    /// Query filter as JSON; blank or invalid text matches all documents
    #[arg(long, value_name = "JSON")]
    pub filter: Option<String>,

    /// Documents to skip (0 or less means unset)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub skip: Option<i64>,

    /// Maximum documents to export (0 or less means unset)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Destination file (defaults to `<collection>-<timestamp>.json`)
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Do not render the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// CLI interface handler
pub struct CliInterface {
    args: CliArgs,
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already-parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Config::load_from_file(args.config_file.as_deref())?;
        Ok(Self { args, config })
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Log level after applying `-v` / `--vv`
    pub fn log_level(&self) -> tracing::Level {
        if self.args.very_verbose {
            tracing::Level::TRACE
        } else if self.args.verbose {
            tracing::Level::DEBUG
        } else {
            self.config.logging.level.to_tracing_level()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_args() {
        let args = CliArgs::try_parse_from([
            "docport",
            "export",
            "--credential",
            "local",
            "--db",
            "shop",
            "--collection",
            "orders",
            "--filter",
            "{\"status\":\"open\"}",
            "--skip",
            "-1",
            "-o",
            "orders.json",
        ])
        .unwrap();

        let Commands::Export(export) = args.command else {
            panic!("expected export subcommand");
        };
        assert_eq!(export.credential, "local");
        assert_eq!(export.database, "shop");
        assert_eq!(export.skip, Some(-1));
        assert_eq!(export.limit, None);
        assert_eq!(export.output, Some(PathBuf::from("orders.json")));
    }

    #[test]
    fn test_verbose_overrides_config_level() {
        let dir = tempfile::tempdir().unwrap();
        let args = CliArgs::try_parse_from([
            "docport",
            "-c",
            dir.path().join("none.toml").to_str().unwrap(),
            "-v",
            "credentials",
        ])
        .unwrap();

        let cli = CliInterface::from_args(args).unwrap();
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }
}
