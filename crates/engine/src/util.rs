//! Internal helpers for input validation and conversion.
//!
//! These utilities are **not** part of the public API.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Validate a credit multiplier: finite and strictly positive.
pub(crate) fn validate_credit_multiplier(credit_multiplier: f64) -> ResultEngine<()> {
    if !credit_multiplier.is_finite() || credit_multiplier <= 0.0 {
        return Err(EngineError::InvalidAmount(
            "credit multiplier must be a positive number".to_string(),
        ));
    }
    Ok(())
}

/// Scale a base amount of points, rounding to the nearest point.
pub(crate) fn scaled_points(base_points: i64, factor: f64) -> ResultEngine<i64> {
    let scaled = (base_points as f64 * factor).round();
    if !scaled.is_finite() || scaled < 1.0 || scaled > i64::MAX as f64 {
        return Err(EngineError::InvalidAmount(format!(
            "scaled points out of range: {base_points} x {factor}"
        )));
    }
    Ok(scaled as i64)
}

/// Parse a UUID from storage or user input and return a labeled error on
/// failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidField(format!("invalid {label} id")))
}
