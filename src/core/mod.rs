pub mod chunker;
pub mod engine;
pub mod plan;
pub mod wells;

pub use crate::domain::model::{CommandStep, StepRecord, TransferMode, VolumeSpec, WellSpec};
pub use crate::domain::ports::{CommandExecutor, Instrument, Labware};
pub use crate::utils::error::Result;
