// Adapters layer: concrete labware, instruments and executors behind the domain ports.

pub mod executor;
pub mod instrument;
pub mod labware;

pub use executor::{RecordingExecutor, SimulatedPipette};
pub use instrument::Pipette;
pub use labware::{GridLabware, WellRef};
