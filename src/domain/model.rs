use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters forwarded to `pick_up_tip`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickUpTipParams {
    pub presses: Option<u32>,
    pub increment: Option<f64>,
}

/// Parameters forwarded to `touch_tip`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchTipParams {
    pub radius: Option<f64>,
    pub v_offset: Option<f64>,
    pub speed: Option<f64>,
}

/// Parameters forwarded to `mix`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixParams {
    pub repetitions: Option<u32>,
    pub volume: Option<f64>,
    pub rate: Option<f64>,
}

/// One atomic instrument command.
///
/// `L` is the caller's well reference; the planner only clones and compares it.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandStep<L> {
    PickUpTip(PickUpTipParams),
    Aspirate { volume: f64, location: L, rate: f64 },
    Dispense { volume: f64, location: L, rate: f64 },
    /// Expels an air gap; carries no location.
    DispenseAirGap { volume: f64 },
    AirGap { volume: f64 },
    TouchTip(TouchTipParams),
    Mix(MixParams),
    /// `None` blows out wherever the pipette currently is.
    BlowOut { location: Option<L> },
    DropTip,
    ReturnTip,
}

/// The `{method, args, kwargs}` shape an executor dispatches on by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub method: String,
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl<L> CommandStep<L> {
    pub fn method(&self) -> &'static str {
        match self {
            CommandStep::PickUpTip(_) => "pick_up_tip",
            CommandStep::Aspirate { .. } => "aspirate",
            CommandStep::Dispense { .. } | CommandStep::DispenseAirGap { .. } => "dispense",
            CommandStep::AirGap { .. } => "air_gap",
            CommandStep::TouchTip(_) => "touch_tip",
            CommandStep::Mix(_) => "mix",
            CommandStep::BlowOut { .. } => "blow_out",
            CommandStep::DropTip => "drop_tip",
            CommandStep::ReturnTip => "return_tip",
        }
    }

    pub fn is_tip_pickup(&self) -> bool {
        matches!(self, CommandStep::PickUpTip(_))
    }

    pub fn is_tip_release(&self) -> bool {
        matches!(self, CommandStep::DropTip | CommandStep::ReturnTip)
    }

    /// Rewrites every location carried by this step.
    pub fn map_location<M>(self, mut f: impl FnMut(L) -> M) -> CommandStep<M> {
        match self {
            CommandStep::PickUpTip(p) => CommandStep::PickUpTip(p),
            CommandStep::Aspirate {
                volume,
                location,
                rate,
            } => CommandStep::Aspirate {
                volume,
                location: f(location),
                rate,
            },
            CommandStep::Dispense {
                volume,
                location,
                rate,
            } => CommandStep::Dispense {
                volume,
                location: f(location),
                rate,
            },
            CommandStep::DispenseAirGap { volume } => CommandStep::DispenseAirGap { volume },
            CommandStep::AirGap { volume } => CommandStep::AirGap { volume },
            CommandStep::TouchTip(p) => CommandStep::TouchTip(p),
            CommandStep::Mix(p) => CommandStep::Mix(p),
            CommandStep::BlowOut { location } => CommandStep::BlowOut {
                location: location.map(f),
            },
            CommandStep::DropTip => CommandStep::DropTip,
            CommandStep::ReturnTip => CommandStep::ReturnTip,
        }
    }
}

impl<L: Serialize> CommandStep<L> {
    pub fn to_record(&self) -> serde_json::Result<StepRecord> {
        use serde_json::{json, to_value, Map, Value};

        let mut kwargs = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                kwargs.insert(key.to_string(), value);
            }
        };

        let args = match self {
            CommandStep::PickUpTip(p) => {
                put("presses", p.presses.map(|v| json!(v)));
                put("increment", p.increment.map(|v| json!(v)));
                vec![]
            }
            CommandStep::Aspirate {
                volume,
                location,
                rate,
            }
            | CommandStep::Dispense {
                volume,
                location,
                rate,
            } => vec![json!(volume), to_value(location)?, json!(rate)],
            CommandStep::DispenseAirGap { volume } | CommandStep::AirGap { volume } => {
                vec![json!(volume)]
            }
            CommandStep::TouchTip(p) => {
                put("radius", p.radius.map(|v| json!(v)));
                put("v_offset", p.v_offset.map(|v| json!(v)));
                put("speed", p.speed.map(|v| json!(v)));
                vec![]
            }
            CommandStep::Mix(p) => {
                put("repetitions", p.repetitions.map(|v| json!(v)));
                put("volume", p.volume.map(|v| json!(v)));
                put("rate", p.rate.map(|v| json!(v)));
                vec![]
            }
            CommandStep::BlowOut { location } => match location {
                Some(location) => vec![to_value(location)?],
                None => vec![],
            },
            CommandStep::DropTip | CommandStep::ReturnTip => vec![],
        };

        Ok(StepRecord {
            method: self.method().to_string(),
            args,
            kwargs,
        })
    }
}

impl<L: fmt::Display> fmt::Display for CommandStep<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStep::PickUpTip(p) => {
                write!(f, "pick_up_tip")?;
                if let Some(presses) = p.presses {
                    write!(f, " presses={}", presses)?;
                }
                if let Some(increment) = p.increment {
                    write!(f, " increment={}", increment)?;
                }
                Ok(())
            }
            CommandStep::Aspirate {
                volume,
                location,
                rate,
            } => write!(f, "aspirate {} uL from {} (rate {})", volume, location, rate),
            CommandStep::Dispense {
                volume,
                location,
                rate,
            } => write!(f, "dispense {} uL into {} (rate {})", volume, location, rate),
            CommandStep::DispenseAirGap { volume } => write!(f, "dispense {} uL air gap", volume),
            CommandStep::AirGap { volume } => write!(f, "air_gap {} uL", volume),
            CommandStep::TouchTip(p) => match p.speed {
                Some(speed) => write!(f, "touch_tip speed={}", speed),
                None => write!(f, "touch_tip"),
            },
            CommandStep::Mix(p) => match p.repetitions {
                Some(reps) => write!(f, "mix x{}", reps),
                None => write!(f, "mix"),
            },
            CommandStep::BlowOut { location } => match location {
                Some(location) => write!(f, "blow_out into {}", location),
                None => write!(f, "blow_out"),
            },
            CommandStep::DropTip => write!(f, "drop_tip"),
            CommandStep::ReturnTip => write!(f, "return_tip"),
        }
    }
}

/// The geometric shape of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Pairwise, source `i` into destination `i`.
    Transfer,
    /// One source into many destinations.
    Distribute,
    /// Many sources into one destination.
    Consolidate,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferMode::Transfer => "transfer",
            TransferMode::Distribute => "distribute",
            TransferMode::Consolidate => "consolidate",
        };
        f.write_str(name)
    }
}

/// Caller-side description of a set of wells.
#[derive(Debug, Clone, PartialEq)]
pub enum WellSpec<L> {
    Single(L),
    List(Vec<L>),
    /// Ordered groups, e.g. one entry per column.
    Groups(Vec<Vec<L>>),
}

impl<L> From<L> for WellSpec<L> {
    fn from(well: L) -> Self {
        WellSpec::Single(well)
    }
}

impl<L> WellSpec<L> {
    pub fn list(wells: impl IntoIterator<Item = L>) -> Self {
        WellSpec::List(wells.into_iter().collect())
    }

    pub fn groups(groups: impl IntoIterator<Item = Vec<L>>) -> Self {
        WellSpec::Groups(groups.into_iter().collect())
    }
}

/// Maps a position in `[0, 1]` onto the shape of a volume gradient.
pub type GradientCurve = fn(f64) -> f64;

/// How much liquid each individual transfer moves.
#[derive(Debug, Clone)]
pub enum VolumeSpec {
    Uniform(f64),
    /// One entry per transfer, in pairing order.
    PerTransfer(Vec<f64>),
    /// Linear (or curved) ramp from `start` to `end` across all transfers.
    Gradient {
        start: f64,
        end: f64,
        curve: Option<GradientCurve>,
    },
}

impl From<f64> for VolumeSpec {
    fn from(volume: f64) -> Self {
        VolumeSpec::Uniform(volume)
    }
}

impl From<Vec<f64>> for VolumeSpec {
    fn from(volumes: Vec<f64>) -> Self {
        VolumeSpec::PerTransfer(volumes)
    }
}

impl VolumeSpec {
    pub fn gradient(start: f64, end: f64) -> Self {
        VolumeSpec::Gradient {
            start,
            end,
            curve: None,
        }
    }

    pub fn with_curve(self, curve: GradientCurve) -> Self {
        match self {
            VolumeSpec::Gradient { start, end, .. } => VolumeSpec::Gradient {
                start,
                end,
                curve: Some(curve),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shape_for_aspirate() {
        let step = CommandStep::Aspirate {
            volume: 100.0,
            location: "A1".to_string(),
            rate: 1.0,
        };
        let record = step.to_record().unwrap();
        assert_eq!(record.method, "aspirate");
        assert_eq!(
            record.args,
            vec![
                serde_json::json!(100.0),
                serde_json::json!("A1"),
                serde_json::json!(1.0)
            ]
        );
        assert!(record.kwargs.is_empty());
    }

    #[test]
    fn test_record_omits_unset_kwargs() {
        let step: CommandStep<String> = CommandStep::PickUpTip(PickUpTipParams {
            presses: Some(4),
            increment: None,
        });
        let record = step.to_record().unwrap();
        assert_eq!(record.kwargs.len(), 1);
        assert_eq!(record.kwargs["presses"], serde_json::json!(4));
    }

    #[test]
    fn test_air_gap_dispense_is_named_dispense() {
        let step: CommandStep<String> = CommandStep::DispenseAirGap { volume: 10.0 };
        assert_eq!(step.method(), "dispense");
        assert_eq!(step.to_record().unwrap().args, vec![serde_json::json!(10.0)]);
    }

    #[test]
    fn test_display() {
        let step = CommandStep::Dispense {
            volume: 50.0,
            location: "plate:B2",
            rate: 1.0,
        };
        assert_eq!(step.to_string(), "dispense 50 uL into plate:B2 (rate 1)");
        let blow: CommandStep<&str> = CommandStep::BlowOut { location: None };
        assert_eq!(blow.to_string(), "blow_out");
    }

    #[test]
    fn test_gradient_curve_only_applies_to_gradients() {
        fn half(_: f64) -> f64 {
            0.5
        }
        assert!(matches!(
            VolumeSpec::gradient(10.0, 20.0).with_curve(half),
            VolumeSpec::Gradient { curve: Some(_), .. }
        ));
        assert!(matches!(
            VolumeSpec::Uniform(5.0).with_curve(half),
            VolumeSpec::Uniform(_)
        ));
    }
}
