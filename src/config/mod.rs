pub mod options;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use crate::utils::{error::Result, validation::{validate_non_empty_string, Validate}};

/// How planned steps are printed.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One human-readable line per step
    #[default]
    Text,
    /// One JSON step record per line
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "pipette-plan")]
#[command(about = "Plans liquid transfers as a sequence of pipette steps")]
pub struct CliConfig {
    #[arg(short, long, default_value = "transfer.toml", help = "Transfer request file")]
    pub config: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, help = "Run the plan against a simulated pipette")]
    pub simulate: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("config", &self.config)
    }
}
