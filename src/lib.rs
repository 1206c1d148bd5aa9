pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, OutputFormat};

pub use adapters::{GridLabware, Pipette, RecordingExecutor, SimulatedPipette, WellRef};
pub use config::options::{
    BlowOutStrategy, DropTipStrategy, MixStrategy, TipPolicy, TouchTipStrategy, TransferOptions,
    TransferStrategy,
};
pub use config::toml_config::TomlRequest;
pub use core::{
    chunker::ChunkPolicy,
    engine::TransferEngine,
    plan::{TransferPlan, TransferRequest},
};
pub use domain::model::{CommandStep, TransferMode, VolumeSpec, WellSpec};
pub use utils::error::{PlanError, Result};
