//! Strategy configuration for a transfer.
//!
//! Every option set is an immutable value. The `with_*` methods return a new
//! value with one field replaced and leave the receiver untouched, so a base
//! configuration can be shared between several plans.

use crate::core::chunker::ChunkPolicy;
use crate::domain::model::{MixParams, PickUpTipParams, TouchTipParams};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_negative_volume, validate_positive_volume, validate_range, Validate,
};
use serde::{Deserialize, Serialize};

/// When to pick up a fresh tip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipPolicy {
    /// The caller already holds a tip and disposes of it afterwards.
    Never,
    /// One tip for the whole plan.
    #[default]
    Once,
    /// A fresh tip for every aspirate/dispense cycle.
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropTipStrategy {
    #[default]
    Trash,
    /// Put the tip back into its rack.
    Return,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchTipStrategy {
    #[default]
    Never,
    /// After each aspirate and after each dispense.
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixStrategy {
    #[default]
    Never,
    /// Before each aspirate into an empty tip.
    Before,
    /// After each dispense that empties the tip.
    After,
    Both,
}

impl MixStrategy {
    pub fn mixes_before(self) -> bool {
        matches!(self, MixStrategy::Before | MixStrategy::Both)
    }

    pub fn mixes_after(self) -> bool {
        matches!(self, MixStrategy::After | MixStrategy::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlowOutStrategy {
    #[default]
    None,
    /// Into the instrument's trash location.
    Trash,
    /// Into the well just dispensed to, when the tip should now be empty.
    DestIfEmpty,
    /// Into `BlowOutOptions::location`.
    CustomLocation,
}

/// Transfer-level strategy switches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferStrategy {
    pub new_tip: TipPolicy,
    /// Air (uL) drawn after each aspirate and expelled before each dispense.
    pub air_gap: f64,
    /// Split volumes above the chunk ceiling into several cycles.
    pub carryover: bool,
    /// Extra liquid (uL) aspirated as a buffer when distributing.
    pub disposal_volume: f64,
    pub mix_strategy: MixStrategy,
    pub drop_tip_strategy: DropTipStrategy,
    pub blow_out_strategy: BlowOutStrategy,
    pub touch_tip_strategy: TouchTipStrategy,
}

impl Default for TransferStrategy {
    fn default() -> Self {
        Self {
            new_tip: TipPolicy::Once,
            air_gap: 0.0,
            carryover: true,
            disposal_volume: 0.0,
            mix_strategy: MixStrategy::Never,
            drop_tip_strategy: DropTipStrategy::Trash,
            blow_out_strategy: BlowOutStrategy::None,
            touch_tip_strategy: TouchTipStrategy::Never,
        }
    }
}

impl TransferStrategy {
    pub fn with_new_tip(self, new_tip: TipPolicy) -> Self {
        Self { new_tip, ..self }
    }

    pub fn with_air_gap(self, air_gap: f64) -> Self {
        Self { air_gap, ..self }
    }

    pub fn with_carryover(self, carryover: bool) -> Self {
        Self { carryover, ..self }
    }

    pub fn with_disposal_volume(self, disposal_volume: f64) -> Self {
        Self {
            disposal_volume,
            ..self
        }
    }

    pub fn with_mix_strategy(self, mix_strategy: MixStrategy) -> Self {
        Self {
            mix_strategy,
            ..self
        }
    }

    pub fn with_drop_tip_strategy(self, drop_tip_strategy: DropTipStrategy) -> Self {
        Self {
            drop_tip_strategy,
            ..self
        }
    }

    pub fn with_blow_out_strategy(self, blow_out_strategy: BlowOutStrategy) -> Self {
        Self {
            blow_out_strategy,
            ..self
        }
    }

    pub fn with_touch_tip_strategy(self, touch_tip_strategy: TouchTipStrategy) -> Self {
        Self {
            touch_tip_strategy,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixOptions {
    pub mix_before: MixParams,
    pub mix_after: MixParams,
}

impl MixOptions {
    pub fn with_mix_before(self, mix_before: MixParams) -> Self {
        Self { mix_before, ..self }
    }

    pub fn with_mix_after(self, mix_after: MixParams) -> Self {
        Self { mix_after, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlowOutOptions<L> {
    pub location: Option<L>,
}

impl<L> Default for BlowOutOptions<L> {
    fn default() -> Self {
        Self { location: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateOptions {
    /// Multiplier on the pipette's default flow rate.
    pub rate: f64,
}

impl Default for RateOptions {
    fn default() -> Self {
        Self { rate: 1.0 }
    }
}

impl RateOptions {
    pub fn with_rate(self, rate: f64) -> Self {
        Self { rate }
    }
}

/// All options consulted while planning a transfer, distribute or consolidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions<L> {
    pub transfer: TransferStrategy,
    pub pick_up_tip: PickUpTipParams,
    pub mix: MixOptions,
    pub blow_out: BlowOutOptions<L>,
    pub touch_tip: TouchTipParams,
    pub aspirate: RateOptions,
    pub dispense: RateOptions,
    pub chunking: ChunkPolicy,
}

impl<L> Default for TransferOptions<L> {
    fn default() -> Self {
        Self {
            transfer: TransferStrategy::default(),
            pick_up_tip: PickUpTipParams::default(),
            mix: MixOptions::default(),
            blow_out: BlowOutOptions::default(),
            touch_tip: TouchTipParams::default(),
            aspirate: RateOptions::default(),
            dispense: RateOptions::default(),
            chunking: ChunkPolicy::default(),
        }
    }
}

impl<L: Clone> TransferOptions<L> {
    pub fn with_transfer(&self, transfer: TransferStrategy) -> Self {
        Self {
            transfer,
            ..self.clone()
        }
    }

    pub fn with_pick_up_tip(&self, pick_up_tip: PickUpTipParams) -> Self {
        Self {
            pick_up_tip,
            ..self.clone()
        }
    }

    pub fn with_mix(&self, mix: MixOptions) -> Self {
        Self {
            mix,
            ..self.clone()
        }
    }

    pub fn with_blow_out(&self, blow_out: BlowOutOptions<L>) -> Self {
        Self {
            blow_out,
            ..self.clone()
        }
    }

    pub fn with_touch_tip(&self, touch_tip: TouchTipParams) -> Self {
        Self {
            touch_tip,
            ..self.clone()
        }
    }

    pub fn with_aspirate(&self, aspirate: RateOptions) -> Self {
        Self {
            aspirate,
            ..self.clone()
        }
    }

    pub fn with_dispense(&self, dispense: RateOptions) -> Self {
        Self {
            dispense,
            ..self.clone()
        }
    }

    pub fn with_chunking(&self, chunking: ChunkPolicy) -> Self {
        Self {
            chunking,
            ..self.clone()
        }
    }
}

impl<L> TransferOptions<L> {
    /// Resolves the custom blow-out location, e.g. from a well name to a labware well.
    pub fn try_map_location<M, E>(
        self,
        f: impl FnOnce(L) -> std::result::Result<M, E>,
    ) -> std::result::Result<TransferOptions<M>, E> {
        let location = match self.blow_out.location {
            Some(location) => Some(f(location)?),
            None => None,
        };
        Ok(TransferOptions {
            transfer: self.transfer,
            pick_up_tip: self.pick_up_tip,
            mix: self.mix,
            blow_out: BlowOutOptions { location },
            touch_tip: self.touch_tip,
            aspirate: self.aspirate,
            dispense: self.dispense,
            chunking: self.chunking,
        })
    }
}

impl<L> Validate for TransferOptions<L> {
    fn validate(&self) -> Result<()> {
        validate_non_negative_volume("transfer.air_gap", self.transfer.air_gap)?;
        validate_non_negative_volume("transfer.disposal_volume", self.transfer.disposal_volume)?;
        validate_positive_volume("aspirate.rate", self.aspirate.rate)?;
        validate_positive_volume("dispense.rate", self.dispense.rate)?;
        validate_range(
            "chunking.rebalance_below",
            self.chunking.rebalance_below,
            0.0,
            1.0,
        )?;
        for (field, params) in [
            ("mix.mix_before.volume", self.mix.mix_before),
            ("mix.mix_after.volume", self.mix.mix_after),
        ] {
            if let Some(volume) = params.volume {
                validate_positive_volume(field, volume)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options: TransferOptions<String> = TransferOptions::default();
        assert_eq!(options.transfer.new_tip, TipPolicy::Once);
        assert!(options.transfer.carryover);
        assert_eq!(options.aspirate.rate, 1.0);
        assert_eq!(options.dispense.rate, 1.0);
        assert!(options.blow_out.location.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_override_leaves_base_and_siblings_untouched() {
        let base: TransferOptions<String> = TransferOptions::default()
            .with_touch_tip(TouchTipParams {
                speed: Some(1.6),
                ..Default::default()
            });
        let changed = base.with_transfer(
            base.transfer
                .with_new_tip(TipPolicy::Never)
                .with_air_gap(10.0),
        );

        assert_eq!(base.transfer.new_tip, TipPolicy::Once);
        assert_eq!(base.transfer.air_gap, 0.0);
        assert_eq!(changed.transfer.new_tip, TipPolicy::Never);
        assert_eq!(changed.transfer.air_gap, 10.0);
        assert_eq!(changed.transfer.mix_strategy, base.transfer.mix_strategy);
        assert_eq!(changed.touch_tip, base.touch_tip);
        assert_eq!(changed.aspirate, base.aspirate);
    }

    #[test]
    fn test_deserialize_partial_options() {
        let options: TransferOptions<String> = serde_json::from_value(serde_json::json!({
            "transfer": { "new_tip": "always", "blow_out_strategy": "dest_if_empty" },
            "aspirate": { "rate": 1.5 }
        }))
        .unwrap();
        assert_eq!(options.transfer.new_tip, TipPolicy::Always);
        assert_eq!(
            options.transfer.blow_out_strategy,
            BlowOutStrategy::DestIfEmpty
        );
        assert_eq!(options.aspirate.rate, 1.5);
        assert_eq!(options.dispense.rate, 1.0);
        assert!(options.transfer.carryover);
    }

    #[test]
    fn test_negative_air_gap_is_rejected() {
        let options: TransferOptions<String> = TransferOptions::default();
        let bad = options.with_transfer(options.transfer.with_air_gap(-1.0));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_try_map_location() {
        let options: TransferOptions<&str> =
            TransferOptions::default().with_blow_out(BlowOutOptions {
                location: Some("A12"),
            });
        let mapped: TransferOptions<usize> = options
            .try_map_location(|name| Ok::<_, ()>(name.len()))
            .unwrap();
        assert_eq!(mapped.blow_out.location, Some(3));
    }
}
