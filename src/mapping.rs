//! Duration Law
//!
//! Maps a duration knob plus an attenuated CV input onto a time in seconds,
//! either linearly or across four decades (1ms to 10s).

use libm::Libm;
use serde::{Deserialize, Serialize};

/// Lower bound of the logarithmic range, as a power of ten (1ms)
pub const MIN_EXPONENT: f64 = -3.0;

/// Upper bound of the logarithmic range, as a power of ten (10s)
pub const MAX_EXPONENT: f64 = 1.0;

/// Longest duration the law produces, in seconds
pub const MAX_DURATION: f64 = 10.0;

/// Full scale of the duration knob
pub const KNOB_MAX: f64 = 10.0;

/// How the duration knob is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DurationMode {
    /// Knob reads directly in seconds
    Linear,

    /// Knob sweeps 10^-3 to 10^1 seconds
    #[default]
    Logarithmic,
}

impl DurationMode {
    /// Decode a mode toggle parameter (0 = linear, 1 = logarithmic)
    pub fn from_param(value: f64) -> Self {
        if value < 0.5 {
            DurationMode::Linear
        } else {
            DurationMode::Logarithmic
        }
    }

    pub fn as_param(&self) -> f64 {
        match self {
            DurationMode::Linear => 0.0,
            DurationMode::Logarithmic => 1.0,
        }
    }
}

/// Result of one evaluation of the duration law
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DurationMapping {
    /// Duration in seconds, within `[0, MAX_DURATION]`
    pub duration: f64,

    /// Seconds added per volt of CV
    pub cv_scale: f64,
}

/// Linearly map `value` from `[in_min, in_max]` onto `[out_min, out_max]`
pub fn rescale(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    out_min + (value - in_min) / (in_max - in_min) * (out_max - out_min)
}

/// Sign of `value`, with zero (of either sign) mapping to zero
pub fn signum(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Clamp into `[0, MAX_DURATION]`, mapping NaN to zero
fn clamp_duration(duration: f64) -> f64 {
    if duration.is_nan() {
        0.0
    } else {
        duration.clamp(0.0, MAX_DURATION)
    }
}

/// Evaluate the duration law
///
/// * `knob` - duration knob position, 0–10
/// * `cv_amount` - CV attenuverter, -1–1
/// * `cv` - CV input voltage
///
/// In logarithmic mode the CV amount is itself exponential, attenuated by
/// one decade so that a full-scale amount with 10V of CV spans the whole
/// 10s range.
pub fn map_duration(knob: f64, cv_amount: f64, cv: f64, mode: DurationMode) -> DurationMapping {
    match mode {
        DurationMode::Linear => DurationMapping {
            duration: clamp_duration(knob + cv * cv_amount),
            cv_scale: cv_amount,
        },
        DurationMode::Logarithmic => {
            let exponent = rescale(knob, 0.0, KNOB_MAX, MIN_EXPONENT, MAX_EXPONENT);
            let cv_exponent = rescale(cv_amount.abs(), 0.0, 1.0, MIN_EXPONENT, MAX_EXPONENT);
            let cv_scale = Libm::<f64>::pow(10.0, cv_exponent - 1.0) * signum(cv_amount);
            let duration = Libm::<f64>::pow(10.0, exponent) + cv * cv_scale;

            DurationMapping {
                duration: clamp_duration(duration),
                cv_scale,
            }
        }
    }
}
