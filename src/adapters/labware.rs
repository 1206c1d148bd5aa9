use crate::domain::ports::Labware;
use crate::utils::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A well on a named piece of labware, written `labware:A1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WellRef {
    pub labware: String,
    pub index: String,
}

impl WellRef {
    pub fn new(labware: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            labware: labware.into(),
            index: index.into(),
        }
    }

    /// Parses `labware:A1`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.split_once(':') {
            Some((labware, index)) if !labware.is_empty() && !index.is_empty() => {
                Ok(Self::new(labware.trim(), index.trim()))
            }
            _ => Err(PlanError::invalid_value(
                "well",
                value,
                "expected '<labware>:<well>', e.g. 'plate:A1'",
            )),
        }
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.labware, self.index)
    }
}

impl From<WellRef> for String {
    fn from(well: WellRef) -> Self {
        well.to_string()
    }
}

impl TryFrom<String> for WellRef {
    type Error = PlanError;

    fn try_from(value: String) -> Result<Self> {
        WellRef::parse(&value)
    }
}

/// A rectangular plate or reservoir with rows `A..` and columns `1..`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLabware {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

impl GridLabware {
    pub fn new(name: impl Into<String>, rows: usize, columns: usize) -> Self {
        Self {
            name: name.into(),
            rows,
            columns,
        }
    }

    /// Standard 8 x 12 plate.
    pub fn plate_96(name: impl Into<String>) -> Self {
        Self::new(name, 8, 12)
    }

    fn row_name(row: usize) -> char {
        (b'A' + row as u8) as char
    }

    fn at(&self, row: usize, column: usize) -> WellRef {
        WellRef::new(
            self.name.clone(),
            format!("{}{}", Self::row_name(row), column + 1),
        )
    }

    fn parse_index(&self, index: &str) -> Option<(usize, usize)> {
        let mut chars = index.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let row = (letter as u8 - b'A') as usize;
        let column: usize = chars.as_str().parse().ok()?;
        if row < self.rows && column >= 1 && column <= self.columns {
            Some((row, column - 1))
        } else {
            None
        }
    }
}

impl Labware for GridLabware {
    type Location = WellRef;

    fn name(&self) -> &str {
        &self.name
    }

    fn well(&self, index: &str) -> Result<WellRef> {
        self.parse_index(index)
            .map(|(row, column)| self.at(row, column))
            .ok_or_else(|| PlanError::UnknownWell {
                labware: self.name.clone(),
                index: index.to_string(),
            })
    }

    /// Column-major: A1, B1, ..., H1, A2, ...
    fn wells(&self) -> Vec<WellRef> {
        self.columns().into_iter().flatten().collect()
    }

    fn rows(&self) -> Vec<Vec<WellRef>> {
        (0..self.rows)
            .map(|row| (0..self.columns).map(|column| self.at(row, column)).collect())
            .collect()
    }

    fn columns(&self) -> Vec<Vec<WellRef>> {
        (0..self.columns)
            .map(|column| (0..self.rows).map(|row| self.at(row, column)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_index() {
        let plate = GridLabware::plate_96("plate");
        assert_eq!(plate.well("A1").unwrap(), WellRef::new("plate", "A1"));
        assert_eq!(plate.well("h12").unwrap(), WellRef::new("plate", "H12"));
        assert!(matches!(
            plate.well("I1"),
            Err(PlanError::UnknownWell { .. })
        ));
        assert!(plate.well("A13").is_err());
        assert!(plate.well("A0").is_err());
        assert!(plate.well("").is_err());
    }

    #[test]
    fn test_rows_and_columns_are_ordered() {
        let plate = GridLabware::plate_96("plate");
        let columns = plate.columns();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns[0][1].index, "B1");
        let rows = plate.rows();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0][1].index, "A2");
        assert_eq!(plate.wells()[8].index, "A2");
    }

    #[test]
    fn test_well_ref_round_trips_through_string() {
        let well = WellRef::parse("reservoir:A3").unwrap();
        assert_eq!(well.to_string(), "reservoir:A3");
        assert_eq!(
            serde_json::to_value(&well).unwrap(),
            serde_json::json!("reservoir:A3")
        );
        assert!(WellRef::parse("A3").is_err());
    }
}
