//! Configuration errors shared by the simulation clocks and the board.

use std::time::Duration;

/// An invalid parameter value, at startup or through a live control update.
///
/// Always recoverable: the caller rejects the value and keeps the previous one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{param} must be a positive, finite number of seconds (got {value})")]
    NonPositiveInterval { param: &'static str, value: f64 },

    #[error("{param} must be a finite number >= 0 (got {value})")]
    Negative { param: &'static str, value: f64 },

    #[error("{param} must be within {min}..={max} (got {value})")]
    OutOfRange {
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{param}: {reason}")]
    Invalid { param: &'static str, reason: String },
}

/// Convert a strictly positive number of seconds into a [`Duration`].
pub fn positive_seconds(param: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositiveInterval { param, value });
    }
    match Duration::try_from_secs_f64(value) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::NonPositiveInterval { param, value }),
    }
}

/// Convert a non-negative number of seconds into a [`Duration`].
pub fn non_negative_seconds(param: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Negative { param, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::OutOfRange {
        param,
        value,
        min: 0.0,
        max: u64::MAX as f64,
    })
}

/// Check that `value` lies in `min..=max` and is finite.
pub fn in_range(param: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            param,
            value,
            min,
            max,
        })
    }
}
