use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Cannot {mode} from {sources} source well(s) to {dests} destination well(s)")]
    IncompatibleWells {
        sources: usize,
        dests: usize,
        mode: String,
    },

    #[error("Well group {group} has {source_len} source well(s) but {dest_len} destination well(s)")]
    RaggedGroups {
        group: usize,
        source_len: usize,
        dest_len: usize,
    },

    #[error("No {side} wells were given")]
    EmptyWellSet { side: String },

    #[error("Unknown well '{index}' in labware '{labware}'")]
    UnknownWell { labware: String, index: String },

    #[error("Step {index} ({method}) failed: {message}")]
    ExecutionError {
        index: usize,
        method: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Labware,
    Execution,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PlanError {
    pub fn config(message: impl Into<String>) -> Self {
        PlanError::ConfigError {
            message: message.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PlanError::InvalidConfigValueError {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanError::ConfigError { .. }
            | PlanError::InvalidConfigValueError { .. }
            | PlanError::MissingConfigError { .. }
            | PlanError::IncompatibleWells { .. }
            | PlanError::RaggedGroups { .. }
            | PlanError::EmptyWellSet { .. }
            | PlanError::TomlError(_) => ErrorCategory::Configuration,
            PlanError::UnknownWell { .. } => ErrorCategory::Labware,
            PlanError::ExecutionError { .. } => ErrorCategory::Execution,
            PlanError::IoError(_) | PlanError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Labware => ErrorSeverity::High,
            ErrorCategory::Execution => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// True for every failure raised while building a plan, before any step exists.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Labware
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PlanError::IncompatibleWells { sources, dests, .. } => format!(
                "The transfer cannot pair {} source well(s) with {} destination well(s)",
                sources, dests
            ),
            PlanError::RaggedGroups { group, .. } => format!(
                "Source and destination group {} have different lengths",
                group
            ),
            PlanError::UnknownWell { labware, index } => {
                format!("Well {} does not exist on {}", index, labware)
            }
            PlanError::ExecutionError { index, method, .. } => {
                format!("The instrument rejected step {} ({})", index, method)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PlanError::IncompatibleWells { .. } => {
                "Use equal source and destination counts, a single source, or a single destination"
            }
            PlanError::RaggedGroups { .. } => {
                "Make every paired column/row the same length or pass flat well lists"
            }
            PlanError::EmptyWellSet { .. } => "Select at least one source and one destination well",
            PlanError::UnknownWell { .. } => "Check the labware name and the well index (e.g. A1)",
            PlanError::InvalidConfigValueError { .. } | PlanError::MissingConfigError { .. } => {
                "Fix the highlighted field in the configuration file"
            }
            PlanError::ConfigError { .. } | PlanError::TomlError(_) => {
                "Review the transfer request and options"
            }
            PlanError::ExecutionError { .. } => {
                "Inspect the instrument state before re-running the remaining steps"
            }
            PlanError::IoError(_) => "Check that the file exists and is readable",
            PlanError::SerializationError(_) => "Report this as a bug",
        }
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_high_severity() {
        let err = PlanError::IncompatibleWells {
            sources: 3,
            dests: 2,
            mode: "transfer".to_string(),
        };
        assert!(err.is_configuration_error());
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.to_string().contains("3 source"));
    }

    #[test]
    fn test_execution_error_category() {
        let err = PlanError::ExecutionError {
            index: 4,
            method: "aspirate".to_string(),
            message: "no tip".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Execution);
        assert!(!err.is_configuration_error());
        assert!(err.user_friendly_message().contains("step 4"));
    }
}
