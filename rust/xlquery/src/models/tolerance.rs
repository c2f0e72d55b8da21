use crate::utils::TupleRange;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

const ONE_PPM: f64 = 1e-6;

/// Mass error model used to turn a target mass into a search window.
///
/// Example:
/// ```
/// use xlquery::ToleranceUnit;
///
/// let tol = ToleranceUnit::Ppm(10.0);
/// let window = tol.window(1000.0, None);
/// assert!((window.start() - 999.99).abs() < 1e-9);
/// assert!((window.end() - 1000.01).abs() < 1e-9);
/// ```
///
/// Convention:
/// The value is a half width, applied symmetrically. A tolerance of 0.5 Da
/// on a mass of 10 means the window (9.5, 10.5).
///
/// For relative tolerances the width is computed from a reference mass,
/// which defaults to the target mass. Passing the precursor mass as the
/// reference lets fragment windows share the precursor error budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ToleranceUnit {
    #[serde(rename = "da")]
    Absolute(f64),
    #[serde(rename = "ppm")]
    Ppm(f64),
}

impl Default for ToleranceUnit {
    fn default() -> Self {
        ToleranceUnit::Ppm(20.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToleranceParseError {
    #[error("Unable to parse tolerance value from '{0}'")]
    InvalidValue(String),
    #[error("Unknown tolerance unit '{0}', expected 'ppm' or 'da'")]
    UnknownUnit(String),
}

impl ToleranceUnit {
    pub const ZERO: ToleranceUnit = ToleranceUnit::Absolute(0.0);

    pub fn value(&self) -> f64 {
        match self {
            ToleranceUnit::Absolute(x) => *x,
            ToleranceUnit::Ppm(x) => *x,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ToleranceUnit::Absolute(_) => "da",
            ToleranceUnit::Ppm(_) => "ppm",
        }
    }

    /// Half width of the window around `reference_mass`.
    pub fn half_width(&self, reference_mass: f64) -> f64 {
        match self {
            ToleranceUnit::Absolute(x) => x.abs(),
            ToleranceUnit::Ppm(x) => (reference_mass * ONE_PPM * x).abs(),
        }
    }

    /// Search window for `mass`.
    ///
    /// The relative error is computed from `reference_mass` when given,
    /// otherwise from `mass` itself. Absolute tolerances ignore the reference.
    pub fn window(&self, mass: f64, reference_mass: Option<f64>) -> TupleRange<f64> {
        let reference = reference_mass.unwrap_or(mass);
        let half = self.half_width(reference);
        TupleRange::try_new(mass - half, mass + half)
            .unwrap_or_else(|_| TupleRange::try_new(mass, mass).unwrap_or_else(|_| nan_window()))
    }

    /// True if `observed` falls inside the window around `expected`.
    pub fn within(&self, expected: f64, observed: f64) -> bool {
        self.window(expected, None).contains(observed)
    }
}

// Only reached for NaN masses, which can not match anything anyway.
fn nan_window() -> TupleRange<f64> {
    TupleRange::try_new(f64::INFINITY, f64::INFINITY)
        .unwrap_or_else(|_| unreachable!("infinite bounds are always ordered"))
}

impl Display for ToleranceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToleranceUnit::Absolute(x) => write!(f, "{} da", x),
            ToleranceUnit::Ppm(x) => write!(f, "{} ppm", x),
        }
    }
}

impl FromStr for ToleranceUnit {
    type Err = ToleranceParseError;

    /// Parses strings such as `"20 ppm"`, `"20ppm"` or `"0.02 Da"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split_at = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(s.len());
        let (value_chunk, unit_chunk) = s.split_at(split_at);
        let value: f64 = value_chunk
            .trim()
            .parse()
            .map_err(|_| ToleranceParseError::InvalidValue(s.to_string()))?;
        match unit_chunk.trim().to_ascii_lowercase().as_str() {
            "ppm" => Ok(ToleranceUnit::Ppm(value)),
            "da" | "mz" | "m/z" => Ok(ToleranceUnit::Absolute(value)),
            other => Err(ToleranceParseError::UnknownUnit(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppm_uses_reference_mass() {
        let tol = ToleranceUnit::Ppm(10.0);
        let own = tol.window(100.0, None);
        let referenced = tol.window(100.0, Some(1000.0));
        assert!((own.width() - 0.002).abs() < 1e-12);
        assert!((referenced.width() - 0.02).abs() < 1e-12);
        assert!(referenced.covers(&own));
    }

    #[test]
    fn test_absolute_ignores_reference() {
        let tol = ToleranceUnit::Absolute(0.5);
        assert_eq!(tol.window(10.0, Some(5000.0)).as_tuple(), (9.5, 10.5));
        assert!(tol.within(10.0, 10.5));
        assert!(!tol.within(10.0, 10.51));
    }

    #[test]
    fn test_zero_tolerance_is_a_point() {
        let w = ToleranceUnit::ZERO.window(245.1026, None);
        assert_eq!(w.start(), 245.1026);
        assert_eq!(w.end(), 245.1026);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "20 ppm".parse::<ToleranceUnit>().unwrap(),
            ToleranceUnit::Ppm(20.0)
        );
        assert_eq!(
            "0.02Da".parse::<ToleranceUnit>().unwrap(),
            ToleranceUnit::Absolute(0.02)
        );
        assert!("20 furlongs".parse::<ToleranceUnit>().is_err());
        assert!("ppm".parse::<ToleranceUnit>().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let tol: ToleranceUnit = serde_json::from_str(r#"{"ppm": 6.0}"#).unwrap();
        assert_eq!(tol, ToleranceUnit::Ppm(6.0));
        let out = serde_json::to_string(&ToleranceUnit::Absolute(0.02)).unwrap();
        assert_eq!(out, r#"{"da":0.02}"#);
    }
}
