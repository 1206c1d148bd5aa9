use crate::config::options::TipPolicy;
use crate::domain::model::CommandStep;
use crate::domain::ports::CommandExecutor;
use crate::utils::error::{PlanError, Result};
use async_trait::async_trait;
use std::fmt::Debug;

const VOLUME_TOLERANCE: f64 = 1e-6;

/// Keeps every step it is given; optionally fails at a chosen step.
#[derive(Debug, Clone)]
pub struct RecordingExecutor<L> {
    pub steps: Vec<CommandStep<L>>,
    fail_at: Option<usize>,
}

impl<L> Default for RecordingExecutor<L> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            fail_at: None,
        }
    }
}

impl<L> RecordingExecutor<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            steps: Vec::new(),
            fail_at: Some(index),
        }
    }
}

#[async_trait]
impl<L: Clone + Send + Sync> CommandExecutor<L> for RecordingExecutor<L> {
    async fn execute(&mut self, step: &CommandStep<L>) -> Result<()> {
        if self.fail_at == Some(self.steps.len()) {
            return Err(PlanError::ExecutionError {
                index: self.steps.len(),
                method: step.method().to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.steps.push(step.clone());
        Ok(())
    }
}

/// Tracks tip and liquid state the way a physical pipette would and rejects
/// steps that could not happen on one.
#[derive(Debug, Clone)]
pub struct SimulatedPipette<L> {
    capacity: f64,
    has_tip: bool,
    current_volume: f64,
    tips_used: usize,
    steps_executed: usize,
    last_location: Option<L>,
}

impl<L> SimulatedPipette<L> {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity,
            has_tip: false,
            current_volume: 0.0,
            tips_used: 0,
            steps_executed: 0,
            last_location: None,
        }
    }

    /// Starts out already holding a tip, as callers of `TipPolicy::Never` must.
    pub fn with_tip(mut self) -> Self {
        self.has_tip = true;
        self
    }

    /// Starts with a tip only when the plan will never pick one up itself.
    pub fn for_tip_policy(capacity: f64, policy: TipPolicy) -> Self {
        let pipette = Self::new(capacity);
        match policy {
            TipPolicy::Never => pipette.with_tip(),
            TipPolicy::Once | TipPolicy::Always => pipette,
        }
    }

    pub fn has_tip(&self) -> bool {
        self.has_tip
    }

    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    pub fn tips_used(&self) -> usize {
        self.tips_used
    }

    pub fn steps_executed(&self) -> usize {
        self.steps_executed
    }

    pub fn last_location(&self) -> Option<&L> {
        self.last_location.as_ref()
    }

    fn reject(&self, step: &CommandStep<L>, message: impl Into<String>) -> PlanError {
        PlanError::ExecutionError {
            index: self.steps_executed,
            method: step.method().to_string(),
            message: message.into(),
        }
    }

    fn require_tip(&self, step: &CommandStep<L>) -> Result<()> {
        if self.has_tip {
            Ok(())
        } else {
            Err(self.reject(step, "no tip attached"))
        }
    }

    fn draw(&mut self, step: &CommandStep<L>, volume: f64) -> Result<()> {
        self.require_tip(step)?;
        if self.current_volume + volume > self.capacity + VOLUME_TOLERANCE {
            return Err(self.reject(
                step,
                format!(
                    "drawing {} uL on top of {} uL exceeds {} uL",
                    volume, self.current_volume, self.capacity
                ),
            ));
        }
        self.current_volume += volume;
        Ok(())
    }

    fn expel(&mut self, step: &CommandStep<L>, volume: f64) -> Result<()> {
        self.require_tip(step)?;
        if volume > self.current_volume + VOLUME_TOLERANCE {
            return Err(self.reject(
                step,
                format!("only {} uL held, cannot expel {} uL", self.current_volume, volume),
            ));
        }
        self.current_volume = (self.current_volume - volume).max(0.0);
        Ok(())
    }
}

#[async_trait]
impl<L: Clone + Debug + Send + Sync> CommandExecutor<L> for SimulatedPipette<L> {
    async fn execute(&mut self, step: &CommandStep<L>) -> Result<()> {
        match step {
            CommandStep::PickUpTip(_) => {
                if self.has_tip {
                    return Err(self.reject(step, "a tip is already attached"));
                }
                self.has_tip = true;
                self.tips_used += 1;
            }
            CommandStep::Aspirate {
                volume, location, ..
            } => {
                self.draw(step, *volume)?;
                self.last_location = Some(location.clone());
            }
            CommandStep::AirGap { volume } => self.draw(step, *volume)?,
            CommandStep::Dispense {
                volume, location, ..
            } => {
                self.expel(step, *volume)?;
                self.last_location = Some(location.clone());
            }
            CommandStep::DispenseAirGap { volume } => self.expel(step, *volume)?,
            CommandStep::BlowOut { location } => {
                self.require_tip(step)?;
                self.current_volume = 0.0;
                if let Some(location) = location {
                    self.last_location = Some(location.clone());
                }
            }
            CommandStep::TouchTip(_) | CommandStep::Mix(_) => self.require_tip(step)?,
            CommandStep::DropTip | CommandStep::ReturnTip => {
                self.require_tip(step)?;
                self.has_tip = false;
                self.current_volume = 0.0;
            }
        }

        tracing::debug!(
            "{} ok, holding {} uL (tip: {})",
            step.method(),
            self.current_volume,
            self.has_tip
        );
        self.steps_executed += 1;
        Ok(())
    }
}
