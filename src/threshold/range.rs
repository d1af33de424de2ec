//! Warning/critical range grammar.
//!
//! A threshold string takes one of five forms, tried in this order against
//! the whole string:
//!
//! | Form   | Alerts when                |
//! |--------|----------------------------|
//! | `N`    | `value > N` or `value < 0` |
//! | `N:`   | `value < N`                |
//! | `~:N`  | `value > N`                |
//! | `N:M`  | `value < N` or `value > M` |
//! | `@N:M` | `N <= value <= M`          |

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Range parsing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("improper warning/critical format: {0:?}")]
    InvalidRangeFormat(String),
}

/// A parsed threshold predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeSpec {
    /// `N`: above `N`, and any negative value.
    AboveOrNegative(f64),
    /// `N:`
    BelowExclusive(f64),
    /// `~:N`
    AboveExclusive(f64),
    /// `N:M`: outside the closed range.
    OutsideClosed(f64, f64),
    /// `@N:M`: inside the closed range.
    InsideClosedInverted(f64, f64),
}

const NUMBER: &str = r"-?[0-9]+(?:\.[0-9]+)?";

fn single_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^(?P<first>{NUMBER})$")).unwrap())
}

fn below_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^(?P<first>{NUMBER}):$")).unwrap())
}

fn above_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^~:(?P<first>{NUMBER})$")).unwrap())
}

fn outside_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^(?P<first>{NUMBER}):(?P<second>{NUMBER})$")).unwrap()
    })
}

fn inside_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^@(?P<first>{NUMBER}):(?P<second>{NUMBER})$")).unwrap()
    })
}

impl RangeSpec {
    /// Parse a non-empty threshold string.
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let bound = |caps: &Captures, name: &str| -> Result<f64, RangeError> {
            caps[name]
                .parse::<f64>()
                .map_err(|_| RangeError::InvalidRangeFormat(text.to_string()))
        };

        if let Some(caps) = single_pattern().captures(text) {
            return Ok(Self::AboveOrNegative(bound(&caps, "first")?));
        }
        if let Some(caps) = below_pattern().captures(text) {
            return Ok(Self::BelowExclusive(bound(&caps, "first")?));
        }
        if let Some(caps) = above_pattern().captures(text) {
            return Ok(Self::AboveExclusive(bound(&caps, "first")?));
        }
        if let Some(caps) = outside_pattern().captures(text) {
            return Ok(Self::OutsideClosed(
                bound(&caps, "first")?,
                bound(&caps, "second")?,
            ));
        }
        if let Some(caps) = inside_pattern().captures(text) {
            return Ok(Self::InsideClosedInverted(
                bound(&caps, "first")?,
                bound(&caps, "second")?,
            ));
        }

        Err(RangeError::InvalidRangeFormat(text.to_string()))
    }

    /// Whether `value` falls in the alerting region.
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Self::AboveOrNegative(t) => value > t || value < 0.0,
            Self::BelowExclusive(t) => value < t,
            Self::AboveExclusive(t) => value > t,
            Self::OutsideClosed(lo, hi) => value < lo || value > hi,
            Self::InsideClosedInverted(lo, hi) => !(value < lo || value > hi),
        }
    }
}

/// A parsed range together with the text it came from.
///
/// The raw text is echoed verbatim into performance data.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    raw: String,
    range: RangeSpec,
}

impl Threshold {
    /// Parse an optional threshold. Absent and empty strings yield `None`,
    /// which never alerts.
    pub fn parse(text: Option<&str>) -> Result<Option<Self>, RangeError> {
        match text {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(Self {
                raw: raw.to_string(),
                range: RangeSpec::parse(raw)?,
            })),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, value: f64) -> bool {
        self.range.matches(value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The warning/critical pair applied to every result of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Thresholds {
    pub warning: Option<Threshold>,
    pub critical: Option<Threshold>,
}

impl Thresholds {
    /// Parse both thresholds up front so bad input fails before any query runs.
    pub fn parse(warning: Option<&str>, critical: Option<&str>) -> Result<Self, RangeError> {
        Ok(Self {
            warning: Threshold::parse(warning)?,
            critical: Threshold::parse(critical)?,
        })
    }

    pub fn warning_matches(&self, value: f64) -> bool {
        self.warning.as_ref().is_some_and(|t| t.matches(value))
    }

    pub fn critical_matches(&self, value: f64) -> bool {
        self.critical.as_ref().is_some_and(|t| t.matches(value))
    }

    pub fn warning_raw(&self) -> &str {
        self.warning.as_ref().map_or("", Threshold::raw)
    }

    pub fn critical_raw(&self) -> &str {
        self.critical.as_ref().map_or("", Threshold::raw)
    }
}
