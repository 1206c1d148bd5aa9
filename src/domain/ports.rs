use crate::domain::model::CommandStep;
use crate::utils::error::Result;
use async_trait::async_trait;

/// What the planner needs to know about the pipette doing the work.
pub trait Instrument {
    type Location;

    /// Largest volume the pipette can hold at once; the chunking ceiling.
    fn working_volume(&self) -> f64;

    fn channels(&self) -> usize {
        1
    }

    /// Where `trash` blow-outs go. Plans needing one fail to build without it.
    fn trash_location(&self) -> Option<Self::Location> {
        None
    }
}

/// Resolves human-readable well indices and exposes ordered well collections.
pub trait Labware {
    type Location;

    fn name(&self) -> &str;
    fn well(&self, index: &str) -> Result<Self::Location>;
    fn wells(&self) -> Vec<Self::Location>;
    fn rows(&self) -> Vec<Vec<Self::Location>>;
    fn columns(&self) -> Vec<Vec<Self::Location>>;
}

/// Carries out one planned step on a real or simulated instrument.
#[async_trait]
pub trait CommandExecutor<L: Send + Sync>: Send {
    async fn execute(&mut self, step: &CommandStep<L>) -> Result<()>;
}
