use crate::core::plan::TransferPlan;
use crate::domain::ports::CommandExecutor;
use crate::utils::error::Result;
use std::fmt::Debug;

/// Feeds a plan to an executor one step at a time, in plan order.
pub struct TransferEngine<E> {
    executor: E,
}

impl<E> TransferEngine<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Runs the plan to completion and returns the number of executed steps.
    ///
    /// Stops at the first failing step; the remaining steps are dropped.
    pub async fn run<L>(&mut self, plan: TransferPlan<L>) -> Result<usize>
    where
        L: Clone + Debug + Send + Sync,
        E: CommandExecutor<L>,
    {
        tracing::info!(
            "Starting {} of {} cycle(s)",
            plan.mode(),
            plan.cycle_count()
        );

        let mut executed = 0;
        for step in plan {
            tracing::debug!("Step {}: {:?}", executed, step);
            if let Err(e) = self.executor.execute(&step).await {
                tracing::error!("Step {} ({}) failed: {}", executed, step.method(), e);
                return Err(e);
            }
            executed += 1;
        }

        tracing::info!("Executed {} step(s)", executed);
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Pipette, RecordingExecutor};
    use crate::core::plan::TransferRequest;
    use crate::domain::model::{CommandStep, WellSpec};

    #[test]
    fn test_run_counts_steps() {
        let pipette: Pipette<&str> = Pipette::single("p20", 20.0);
        let request = TransferRequest::new(30.0, "A1", WellSpec::list(["B1", "B2"]));
        let plan = TransferPlan::new(request, &pipette).unwrap();

        let mut engine = TransferEngine::new(RecordingExecutor::new());
        let executed = tokio_test::block_on(engine.run(plan)).unwrap();

        // 30 uL per well splits into 15 + 15, one cycle each
        assert_eq!(executed, 10);
        assert_eq!(engine.executor().steps[0], CommandStep::PickUpTip(Default::default()));
    }
}
