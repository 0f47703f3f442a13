use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_CONFIG_PATH, env_help};

/// Authenticated HTTP gateway for mptcpkit router actions.
#[derive(Parser, Debug)]
#[command(name = "mptcpkit-api")]
#[command(version)]
#[command(after_help = env_help())]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}
