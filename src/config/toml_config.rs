use crate::adapters::instrument::Pipette;
use crate::adapters::labware::{GridLabware, WellRef};
use crate::config::options::{BlowOutStrategy, TransferOptions};
use crate::core::plan::{TransferPlan, TransferRequest};
use crate::domain::model::{TransferMode, VolumeSpec, WellSpec};
use crate::domain::ports::Labware;
use crate::utils::error::{PlanError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_positive_volume, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A complete planning request as written in a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlRequest {
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub labware: Vec<GridLabware>,
    pub transfer: TransferConfig,
    #[serde(default)]
    pub options: TransferOptions<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub name: String,
    pub working_volume: f64,
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// `labware:well` used for trash blow-outs.
    pub trash: Option<String>,
}

fn default_channels() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub volume: Option<f64>,
    pub volumes: Option<Vec<f64>>,
    pub gradient: Option<GradientConfig>,
    pub source: WellSelector,
    pub dest: WellSelector,
    pub mode: Option<TransferMode>,
    pub max_volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GradientConfig {
    pub start: f64,
    pub end: f64,
}

/// Ways of naming wells in a request file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WellSelector {
    /// `"plate:A1"`
    Well(String),
    List(Vec<String>),
    /// 1-based column number.
    Column { labware: String, column: usize },
    /// Row letter.
    Row { labware: String, row: String },
    Columns { labware: String, columns: Vec<usize> },
    Rows { labware: String, rows: Vec<String> },
}

impl TomlRequest {
    /// 從 TOML 檔案載入請求
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析請求
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${PLATE_NAME})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PlanError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("instrument.name", &self.instrument.name)?;
        validate_positive_volume("instrument.working_volume", self.instrument.working_volume)?;
        validate_positive_number("instrument.channels", self.instrument.channels, 1)?;
        if let Some(max_volume) = self.transfer.max_volume {
            validate_positive_volume("transfer.max_volume", max_volume)?;
        }

        for labware in &self.labware {
            validate_non_empty_string("labware.name", &labware.name)?;
            validate_positive_number("labware.rows", labware.rows, 1)?;
            validate_positive_number("labware.columns", labware.columns, 1)?;
            if labware.rows > 26 {
                return Err(PlanError::invalid_value(
                    "labware.rows",
                    labware.rows,
                    "at most 26 rows (A-Z) are supported",
                ));
            }
        }

        let given = [
            self.transfer.volume.is_some(),
            self.transfer.volumes.is_some(),
            self.transfer.gradient.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if given != 1 {
            return Err(PlanError::config(
                "transfer needs exactly one of 'volume', 'volumes' or 'gradient'",
            ));
        }

        if self.options.transfer.blow_out_strategy == BlowOutStrategy::Trash
            && self.instrument.trash.is_none()
        {
            return Err(PlanError::MissingConfigError {
                field: "instrument.trash".to_string(),
            });
        }

        self.options.validate()
    }

    fn labware(&self, name: &str) -> Result<&GridLabware> {
        self.labware
            .iter()
            .find(|labware| labware.name == name)
            .ok_or_else(|| PlanError::invalid_value("labware", name, "no labware with this name"))
    }

    fn well(&self, name: &str) -> Result<WellRef> {
        let well = WellRef::parse(name)?;
        self.labware(&well.labware)?.well(&well.index)
    }

    fn column(&self, labware: &str, column: usize) -> Result<Vec<WellRef>> {
        let labware = self.labware(labware)?;
        column
            .checked_sub(1)
            .and_then(|index| labware.columns().into_iter().nth(index))
            .ok_or_else(|| PlanError::UnknownWell {
                labware: labware.name.clone(),
                index: format!("column {}", column),
            })
    }

    fn row(&self, labware: &str, row: &str) -> Result<Vec<WellRef>> {
        let labware = self.labware(labware)?;
        let index = row
            .chars()
            .next()
            .filter(|c| row.len() == 1 && c.is_ascii_alphabetic())
            .map(|c| (c.to_ascii_uppercase() as u8 - b'A') as usize);
        index
            .and_then(|index| labware.rows().into_iter().nth(index))
            .ok_or_else(|| PlanError::UnknownWell {
                labware: labware.name.clone(),
                index: format!("row {}", row),
            })
    }

    fn resolve(&self, selector: &WellSelector) -> Result<WellSpec<WellRef>> {
        Ok(match selector {
            WellSelector::Well(name) => WellSpec::Single(self.well(name)?),
            WellSelector::List(names) => WellSpec::List(
                names
                    .iter()
                    .map(|name| self.well(name))
                    .collect::<Result<_>>()?,
            ),
            WellSelector::Column { labware, column } => {
                WellSpec::List(self.column(labware, *column)?)
            }
            WellSelector::Row { labware, row } => WellSpec::List(self.row(labware, row)?),
            WellSelector::Columns { labware, columns } => WellSpec::Groups(
                columns
                    .iter()
                    .map(|column| self.column(labware, *column))
                    .collect::<Result<_>>()?,
            ),
            WellSelector::Rows { labware, rows } => WellSpec::Groups(
                rows.iter()
                    .map(|row| self.row(labware, row))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn volume_spec(&self) -> Result<VolumeSpec> {
        let transfer = &self.transfer;
        if let Some(volume) = transfer.volume {
            Ok(VolumeSpec::Uniform(volume))
        } else if let Some(volumes) = &transfer.volumes {
            Ok(VolumeSpec::PerTransfer(volumes.clone()))
        } else if let Some(gradient) = transfer.gradient {
            Ok(VolumeSpec::gradient(gradient.start, gradient.end))
        } else {
            Err(PlanError::MissingConfigError {
                field: "transfer.volume".to_string(),
            })
        }
    }

    pub fn pipette(&self) -> Result<Pipette<WellRef>> {
        let mut pipette = Pipette::multi(
            self.instrument.name.clone(),
            self.instrument.working_volume,
            self.instrument.channels,
        );
        if let Some(trash) = &self.instrument.trash {
            pipette = pipette.with_trash(WellRef::parse(trash)?);
        }
        Ok(pipette)
    }

    /// Resolves every well name against the declared labware.
    pub fn transfer_request(&self) -> Result<TransferRequest<WellRef>> {
        let options = self
            .options
            .clone()
            .try_map_location(|name| self.well(&name))?;

        let mut request = TransferRequest::new(
            self.volume_spec()?,
            self.resolve(&self.transfer.source)?,
            self.resolve(&self.transfer.dest)?,
        )
        .with_options(options);
        if let Some(mode) = self.transfer.mode {
            request = request.with_mode(mode);
        }
        if let Some(max_volume) = self.transfer.max_volume {
            request = request.with_max_volume(max_volume);
        }
        Ok(request)
    }

    pub fn build_plan(&self) -> Result<TransferPlan<WellRef>> {
        self.validate_config()?;
        TransferPlan::new(self.transfer_request()?, &self.pipette()?)
    }
}

impl Validate for TomlRequest {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
