use crate::utils::error::{PlanError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Volumes and capacities must be finite and strictly positive.
pub fn validate_positive_volume(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PlanError::invalid_value(
            field_name,
            value,
            "Value must be a finite number",
        ));
    }
    if value <= 0.0 {
        return Err(PlanError::invalid_value(
            field_name,
            value,
            "Value must be greater than 0",
        ));
    }
    Ok(())
}

pub fn validate_non_negative_volume(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PlanError::invalid_value(
            field_name,
            value,
            "Value must be a finite number of at least 0",
        ));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(PlanError::invalid_value(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| PlanError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PlanError::invalid_value(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PlanError::invalid_value(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}
