//! Transfer planning.
//!
//! A [`TransferPlan`] turns a [`TransferRequest`] into the ordered list of
//! instrument commands that carries it out. All validation and volume
//! arithmetic happens in [`TransferPlan::new`]; iterating the plan then only
//! expands one cycle at a time into commands.

use crate::config::options::{
    BlowOutStrategy, DropTipStrategy, TipPolicy, TouchTipStrategy, TransferOptions,
};
use crate::core::chunker::{check_chunk_count, VOLUME_EPSILON};
use crate::core::wells::resolve_wells;
use crate::domain::model::{CommandStep, TransferMode, VolumeSpec, WellSpec};
use crate::domain::ports::Instrument;
use crate::utils::error::{PlanError, Result};
use crate::utils::validation::{validate_positive_volume, Validate};
use std::collections::VecDeque;
use std::iter::FusedIterator;

/// Everything a caller specifies about one transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest<L> {
    pub volume: VolumeSpec,
    pub sources: WellSpec<L>,
    pub dests: WellSpec<L>,
    /// Forces a pattern instead of deriving it from the well counts.
    pub mode: Option<TransferMode>,
    /// Overrides the instrument's working volume as the capacity ceiling.
    pub max_volume: Option<f64>,
    pub options: TransferOptions<L>,
}

impl<L> TransferRequest<L> {
    pub fn new(
        volume: impl Into<VolumeSpec>,
        sources: impl Into<WellSpec<L>>,
        dests: impl Into<WellSpec<L>>,
    ) -> Self {
        Self {
            volume: volume.into(),
            sources: sources.into(),
            dests: dests.into(),
            mode: None,
            max_volume: None,
            options: TransferOptions::default(),
        }
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_max_volume(mut self, max_volume: f64) -> Self {
        self.max_volume = Some(max_volume);
        self
    }

    pub fn with_options(mut self, options: TransferOptions<L>) -> Self {
        self.options = options;
        self
    }
}

/// One aspirate/dispense round trip; the unit a tip covers under `TipPolicy::Always`.
#[derive(Debug, Clone, PartialEq)]
enum Cycle<L> {
    Transfer { volume: f64, source: L, dest: L },
    Distribute { source: L, drops: Vec<(f64, L)> },
    Consolidate { draws: Vec<(f64, L)>, dest: L },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Cycles,
    Finish,
    Done,
}

/// Turns cycles into commands according to the options.
#[derive(Debug, Clone)]
struct StepEmitter<L> {
    mode: TransferMode,
    options: TransferOptions<L>,
    trash: Option<L>,
}

/// Lazily produced, single-pass sequence of commands for one transfer.
#[derive(Debug)]
pub struct TransferPlan<L> {
    mode: TransferMode,
    capacity: f64,
    emitter: StepEmitter<L>,
    cycles: Vec<Cycle<L>>,
    cursor: usize,
    phase: Phase,
    pending: VecDeque<CommandStep<L>>,
}

impl<L: Clone> TransferPlan<L> {
    /// Validates the request against `instrument` and lays out every cycle.
    ///
    /// Fails before producing any step when wells cannot be paired, a volume
    /// or capacity is not positive, or an option cannot be honoured.
    pub fn new<I>(request: TransferRequest<L>, instrument: &I) -> Result<Self>
    where
        I: Instrument<Location = L>,
    {
        let TransferRequest {
            volume,
            sources,
            dests,
            mode,
            max_volume,
            options,
        } = request;

        let capacity = max_volume.unwrap_or_else(|| instrument.working_volume());
        validate_positive_volume("max_volume", capacity)?;
        options.validate()?;

        let wells = resolve_wells(sources, dests, instrument.channels(), mode)?;
        let volumes = expand_volumes(&volume, wells.transfer_count())?;
        let strategy = options.transfer;

        let ceiling = match wells.mode {
            TransferMode::Distribute => capacity - strategy.disposal_volume - strategy.air_gap,
            TransferMode::Transfer | TransferMode::Consolidate => capacity - strategy.air_gap,
        };
        if ceiling <= 0.0 {
            return Err(PlanError::config(format!(
                "Air gap and disposal volume leave no room for liquid in a {} uL pipette",
                capacity
            )));
        }

        // Every cycle is laid out up front, so bound the whole plan first.
        check_chunk_count(volumes.iter().copied(), ceiling)?;

        let chunk = |volume: f64| -> Result<Vec<f64>> {
            if !strategy.carryover && volume > ceiling + VOLUME_EPSILON {
                return Err(PlanError::invalid_value(
                    "volume",
                    volume,
                    format!(
                        "exceeds the {} uL per-cycle limit and carryover is disabled",
                        ceiling
                    ),
                ));
            }
            options.chunking.chunk(volume, ceiling)
        };

        let cycles = match wells.mode {
            TransferMode::Transfer => {
                let mut cycles = Vec::new();
                for (volume, (source, dest)) in volumes
                    .into_iter()
                    .zip(wells.sources.into_iter().zip(wells.dests))
                {
                    for part in chunk(volume)? {
                        cycles.push(Cycle::Transfer {
                            volume: part,
                            source: source.clone(),
                            dest: dest.clone(),
                        });
                    }
                }
                cycles
            }
            TransferMode::Distribute => {
                let source = wells.sources[0].clone();
                let drops = split_targets(volumes, wells.dests, &chunk)?;
                let reserve = strategy.disposal_volume + strategy.air_gap;
                group_by_capacity(drops, |sum, _, next| sum + reserve + next <= capacity)
                    .into_iter()
                    .map(|drops| Cycle::Distribute {
                        source: source.clone(),
                        drops,
                    })
                    .collect()
            }
            TransferMode::Consolidate => {
                let dest = wells.dests[0].clone();
                let draws = split_targets(volumes, wells.sources, &chunk)?;
                let air_gap = strategy.air_gap;
                // Each draw, including the next one, is followed by its own air gap.
                group_by_capacity(draws, |sum, count, next| {
                    sum + air_gap * (count + 1) as f64 + next <= capacity
                })
                .into_iter()
                .map(|draws| Cycle::Consolidate {
                    draws,
                    dest: dest.clone(),
                })
                .collect()
            }
        };

        let trash = instrument.trash_location();
        let needs_trash = strategy.blow_out_strategy == BlowOutStrategy::Trash
            || (wells.mode == TransferMode::Distribute
                && strategy.disposal_volume > 0.0
                && strategy.blow_out_strategy != BlowOutStrategy::CustomLocation);
        if needs_trash && trash.is_none() {
            return Err(PlanError::config(
                "Blowing out to the trash needs an instrument with a trash location",
            ));
        }

        tracing::debug!(
            "Planned {} with {} cycle(s) at {} uL capacity (tips: {:?})",
            wells.mode,
            cycles.len(),
            capacity,
            strategy.new_tip
        );

        Ok(Self {
            mode: wells.mode,
            capacity,
            emitter: StepEmitter {
                mode: wells.mode,
                options,
                trash,
            },
            cycles,
            cursor: 0,
            phase: Phase::Start,
            pending: VecDeque::new(),
        })
    }
}

impl<L> TransferPlan<L> {
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Number of aspirate/dispense round trips in the whole plan.
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }
}

impl<L: Clone> Iterator for TransferPlan<L> {
    type Item = CommandStep<L>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(step) = self.pending.pop_front() {
                return Some(step);
            }
            match self.phase {
                Phase::Start => {
                    if self.emitter.tip_policy() == TipPolicy::Once {
                        self.pending.push_back(self.emitter.pick_up_tip());
                    }
                    self.phase = Phase::Cycles;
                }
                Phase::Cycles => match self.cycles.get(self.cursor) {
                    Some(cycle) => {
                        self.emitter.emit_cycle(cycle, &mut self.pending);
                        self.cursor += 1;
                    }
                    None => self.phase = Phase::Finish,
                },
                Phase::Finish => {
                    if self.emitter.tip_policy() == TipPolicy::Once {
                        self.pending.push_back(self.emitter.release_tip());
                    }
                    self.phase = Phase::Done;
                }
                Phase::Done => return None,
            }
        }
    }
}

impl<L: Clone> FusedIterator for TransferPlan<L> {}

impl<L: Clone> StepEmitter<L> {
    fn tip_policy(&self) -> TipPolicy {
        self.options.transfer.new_tip
    }

    fn pick_up_tip(&self) -> CommandStep<L> {
        CommandStep::PickUpTip(self.options.pick_up_tip)
    }

    fn release_tip(&self) -> CommandStep<L> {
        match self.options.transfer.drop_tip_strategy {
            DropTipStrategy::Return => CommandStep::ReturnTip,
            DropTipStrategy::Trash => CommandStep::DropTip,
        }
    }

    fn emit_cycle(&self, cycle: &Cycle<L>, out: &mut VecDeque<CommandStep<L>>) {
        let fresh_tip = self.tip_policy() == TipPolicy::Always;
        if fresh_tip {
            out.push_back(self.pick_up_tip());
        }

        match cycle {
            Cycle::Transfer {
                volume,
                source,
                dest,
            } => {
                self.aspirate(*volume, source, true, out);
                self.dispense(*volume, dest, true, out);
            }
            Cycle::Distribute { source, drops } => {
                let disposal = self.options.transfer.disposal_volume;
                let total: f64 = drops.iter().map(|(volume, _)| volume).sum();
                self.aspirate(total + disposal, source, true, out);
                for (i, (volume, dest)) in drops.iter().enumerate() {
                    self.dispense(*volume, dest, i + 1 == drops.len(), out);
                }
            }
            Cycle::Consolidate { draws, dest } => {
                let air_gap = self.options.transfer.air_gap;
                for (i, (volume, source)) in draws.iter().enumerate() {
                    self.aspirate(*volume, source, i == 0, out);
                }
                // Every air gap but the last sits between liquids and leaves with them.
                let total: f64 = draws.iter().map(|(volume, _)| volume + air_gap).sum();
                self.dispense(total - air_gap, dest, true, out);
            }
        }

        if fresh_tip {
            out.push_back(self.release_tip());
        }
    }

    fn aspirate(&self, volume: f64, source: &L, tip_empty: bool, out: &mut VecDeque<CommandStep<L>>) {
        let strategy = &self.options.transfer;
        if tip_empty && strategy.mix_strategy.mixes_before() {
            out.push_back(CommandStep::Mix(self.options.mix.mix_before));
        }
        out.push_back(CommandStep::Aspirate {
            volume,
            location: source.clone(),
            rate: self.options.aspirate.rate,
        });
        if strategy.air_gap > 0.0 {
            out.push_back(CommandStep::AirGap {
                volume: strategy.air_gap,
            });
        }
        self.touch_tip(out);
    }

    /// `last` marks the dispense that finishes the cycle; earlier distribute
    /// drops re-seal the tip with an air gap instead of mixing or blowing out.
    fn dispense(&self, volume: f64, dest: &L, last: bool, out: &mut VecDeque<CommandStep<L>>) {
        let strategy = &self.options.transfer;
        if strategy.air_gap > 0.0 {
            out.push_back(CommandStep::DispenseAirGap {
                volume: strategy.air_gap,
            });
        }
        out.push_back(CommandStep::Dispense {
            volume,
            location: dest.clone(),
            rate: self.options.dispense.rate,
        });

        if last {
            self.finish_cycle(dest, out);
        } else if strategy.air_gap > 0.0 {
            out.push_back(CommandStep::AirGap {
                volume: strategy.air_gap,
            });
        }
        self.touch_tip(out);
    }

    fn finish_cycle(&self, dest: &L, out: &mut VecDeque<CommandStep<L>>) {
        let strategy = &self.options.transfer;
        // Only distribute keeps liquid (the disposal volume) after its last drop.
        let tip_empty =
            self.mode != TransferMode::Distribute || strategy.disposal_volume <= 0.0;

        if tip_empty {
            if strategy.mix_strategy.mixes_after() {
                out.push_back(CommandStep::Mix(self.options.mix.mix_after));
            }
            if strategy.blow_out_strategy == BlowOutStrategy::DestIfEmpty {
                out.push_back(CommandStep::BlowOut {
                    location: Some(dest.clone()),
                });
            }
        }

        match strategy.blow_out_strategy {
            BlowOutStrategy::Trash => out.push_back(CommandStep::BlowOut {
                location: self.trash.clone(),
            }),
            BlowOutStrategy::CustomLocation => out.push_back(CommandStep::BlowOut {
                location: self.options.blow_out.location.clone(),
            }),
            BlowOutStrategy::None | BlowOutStrategy::DestIfEmpty if !tip_empty => {
                out.push_back(CommandStep::BlowOut {
                    location: self.trash.clone(),
                })
            }
            BlowOutStrategy::None | BlowOutStrategy::DestIfEmpty => {}
        }
    }

    fn touch_tip(&self, out: &mut VecDeque<CommandStep<L>>) {
        if self.options.transfer.touch_tip_strategy == TouchTipStrategy::Always {
            out.push_back(CommandStep::TouchTip(self.options.touch_tip));
        }
    }
}

/// Per-transfer volumes for `count` transfers.
pub fn expand_volumes(spec: &VolumeSpec, count: usize) -> Result<Vec<f64>> {
    let volumes = match spec {
        VolumeSpec::Uniform(volume) => vec![*volume; count],
        VolumeSpec::PerTransfer(volumes) => {
            if volumes.len() != count {
                return Err(PlanError::invalid_value(
                    "volume",
                    format!("{} volumes", volumes.len()),
                    format!("expected one volume per transfer ({})", count),
                ));
            }
            volumes.clone()
        }
        VolumeSpec::Gradient { start, end, curve } => {
            if count <= 1 {
                vec![*start; count]
            } else {
                (0..count)
                    .map(|i| {
                        let x = i as f64 / (count - 1) as f64;
                        let y = curve.map_or(x, |f| f(x));
                        start + y * (end - start)
                    })
                    .collect()
            }
        }
    };

    for volume in &volumes {
        validate_positive_volume("volume", *volume)?;
    }
    Ok(volumes)
}

fn split_targets<L: Clone>(
    volumes: Vec<f64>,
    targets: Vec<L>,
    chunk: &impl Fn(f64) -> Result<Vec<f64>>,
) -> Result<Vec<(f64, L)>> {
    let mut parts = Vec::with_capacity(targets.len());
    for (volume, target) in volumes.into_iter().zip(targets) {
        for part in chunk(volume)? {
            parts.push((part, target.clone()));
        }
    }
    Ok(parts)
}

/// Greedily packs consecutive parts while `fits(sum_so_far, count_so_far, next)` holds.
fn group_by_capacity<L>(
    parts: Vec<(f64, L)>,
    fits: impl Fn(f64, usize, f64) -> bool,
) -> Vec<Vec<(f64, L)>> {
    let mut groups = Vec::new();
    let mut current: Vec<(f64, L)> = Vec::new();
    let mut sum = 0.0;

    for (volume, target) in parts {
        if !current.is_empty() && !fits(sum - VOLUME_EPSILON, current.len(), volume) {
            groups.push(std::mem::take(&mut current));
            sum = 0.0;
        }
        sum += volume;
        current.push((volume, target));
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_volumes() {
        let volumes = expand_volumes(&VolumeSpec::gradient(10.0, 50.0), 5).unwrap();
        assert_eq!(volumes, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn test_gradient_with_step_curve() {
        fn step(x: f64) -> f64 {
            if x > 0.5 {
                1.0
            } else {
                0.0
            }
        }
        let volumes =
            expand_volumes(&VolumeSpec::gradient(10.0, 100.0).with_curve(step), 4).unwrap();
        assert_eq!(volumes, vec![10.0, 10.0, 100.0, 100.0]);
    }

    #[test]
    fn test_single_gradient_uses_start() {
        assert_eq!(
            expand_volumes(&VolumeSpec::gradient(25.0, 75.0), 1).unwrap(),
            vec![25.0]
        );
    }

    #[test]
    fn test_per_transfer_volumes_must_match_count() {
        assert!(expand_volumes(&VolumeSpec::PerTransfer(vec![10.0, 20.0]), 3).is_err());
        assert_eq!(
            expand_volumes(&VolumeSpec::PerTransfer(vec![10.0, 20.0]), 2).unwrap(),
            vec![10.0, 20.0]
        );
    }

    #[test]
    fn test_zero_volume_is_rejected() {
        assert!(expand_volumes(&VolumeSpec::Uniform(0.0), 3).is_err());
        assert!(expand_volumes(&VolumeSpec::gradient(0.0, 10.0), 3).is_err());
    }

    #[test]
    fn test_group_by_capacity() {
        let parts: Vec<(f64, usize)> = (0..8).map(|i| (50.0, i)).collect();
        let groups = group_by_capacity(parts, |sum, _, next| sum + next <= 300.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 6);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups[1][0].1, 6);
    }
}
