use crate::domain::ports::Instrument;
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, validate_positive_volume, Validate};

/// A pipette described by its capacity and channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipette<L> {
    pub name: String,
    pub working_volume: f64,
    pub channels: usize,
    pub trash: Option<L>,
}

impl<L> Pipette<L> {
    pub fn single(name: impl Into<String>, working_volume: f64) -> Self {
        Self {
            name: name.into(),
            working_volume,
            channels: 1,
            trash: None,
        }
    }

    pub fn multi(name: impl Into<String>, working_volume: f64, channels: usize) -> Self {
        Self {
            channels,
            ..Self::single(name, working_volume)
        }
    }

    pub fn with_trash(mut self, trash: L) -> Self {
        self.trash = Some(trash);
        self
    }
}

impl<L: Clone> Instrument for Pipette<L> {
    type Location = L;

    fn working_volume(&self) -> f64 {
        self.working_volume
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn trash_location(&self) -> Option<L> {
        self.trash.clone()
    }
}

impl<L> Validate for Pipette<L> {
    fn validate(&self) -> Result<()> {
        validate_positive_volume("instrument.working_volume", self.working_volume)?;
        validate_positive_number("instrument.channels", self.channels, 1)
    }
}
