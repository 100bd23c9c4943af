//! Per-value type casts used during column alterations.
//!
//! A [`CastTarget`] describes what a column is being converted into. Backends
//! expose [`CastTarget::cast`] and [`CastTarget::try_cast`] to SQL as the
//! [`CAST_FUNCTION`](crate::executor::CAST_FUNCTION) and
//! [`TRY_CAST_FUNCTION`](crate::executor::TRY_CAST_FUNCTION) scalar
//! functions, passing the target in its textual form (see the [`fmt::Display`]
//! and [`FromStr`] implementations).
//!
//! Empty and whitespace-only strings are treated as empty cells: they cast to
//! `NULL` (or `false` for booleans) under every non-text target.
//!
//! Decimals are computed with [`rust_decimal`] and handed to the backend as
//! their canonical text (`"12.50"`), so no digit passes through `f64`.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use gridbase_core::GridbaseError;

use crate::value::Value;

/// Prefix of every cast error message. Backends use it to recognise cast
/// failures raised from inside SQL functions.
pub const CAST_ERROR_PREFIX: &str = "gridbase cast error";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("valid regex"));

const TRUTHY: &[&str] = &["t", "true", "y", "yes", "on", "1", "checked"];
const FALSY: &[&str] = &["f", "false", "n", "no", "off", "0", ""];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A value could not be represented in the target type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{CAST_ERROR_PREFIX}: cannot cast '{value}' to {target}")]
pub struct CastError {
    /// The offending value, rendered as text.
    pub value: String,
    /// The textual form of the target.
    pub target: String,
}

impl From<CastError> for GridbaseError {
    fn from(err: CastError) -> Self {
        Self::DataError(err.to_string())
    }
}

/// The logical type a column is being cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    /// Any value rendered as text.
    Text,
    /// Whole numbers. Negative values are rejected unless `negative` is set.
    Integer {
        /// Whether negative numbers are allowed.
        negative: bool,
    },
    /// Fixed-point numbers rounded half away from zero to `places` decimal
    /// places, produced as canonical text.
    Decimal {
        /// Number of decimal places kept.
        places: u8,
        /// Whether negative numbers are allowed.
        negative: bool,
    },
    /// Booleans. Never produces `NULL`.
    Boolean,
    /// Dates, or date-times when `include_time` is set.
    Date {
        /// Whether the time of day is kept.
        include_time: bool,
    },
    /// Text that must look like an email address.
    Email,
    /// Text that must look like an http(s) URL.
    Url,
}

impl CastTarget {
    /// The value an unconvertible or empty cell ends up with.
    pub const fn empty_value(&self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            _ => Value::Null,
        }
    }

    /// Strictly converts `value`, failing when it cannot be represented.
    pub fn cast(&self, value: &Value) -> Result<Value, CastError> {
        if value.is_null() {
            return Ok(self.empty_value());
        }
        if !matches!(self, Self::Text) {
            if let Value::String(s) = value {
                if s.trim().is_empty() {
                    return Ok(self.empty_value());
                }
            }
        }

        let converted = match self {
            Self::Text => Some(Value::String(value.to_string())),
            Self::Integer { negative } => to_integer(value)
                .filter(|i| *negative || *i >= 0)
                .map(Value::Int),
            Self::Decimal { places, negative } => to_decimal(value, *places)
                .filter(|d| *negative || *d >= Decimal::ZERO)
                .map(|d| Value::String(d.to_string())),
            Self::Boolean => to_bool(value).map(Value::Bool),
            Self::Date { include_time } => to_datetime(value).map(|dt| {
                if *include_time {
                    Value::DateTime(dt)
                } else {
                    Value::Date(dt.date())
                }
            }),
            Self::Email => matching_text(value, &EMAIL_RE),
            Self::Url => matching_text(value, &URL_RE),
        };

        converted.ok_or_else(|| CastError {
            value: value.to_string(),
            target: self.to_string(),
        })
    }

    /// Converts `value`, substituting [`empty_value`](Self::empty_value) when
    /// it cannot be represented.
    pub fn try_cast(&self, value: &Value) -> Value {
        self.cast(value).unwrap_or_else(|_| self.empty_value())
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Float(f) if f.is_finite() => {
            let rounded = f.round();
            (rounded >= i64::MIN as f64 && rounded <= i64::MAX as f64).then_some(rounded as i64)
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parses `value` and rounds it to exactly `places` decimal places.
///
/// Numbers outside the 96-bit range of [`Decimal`] are rejected.
fn to_decimal(value: &Value, places: u8) -> Option<Decimal> {
    let decimal = match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Float(f) => Decimal::try_from(*f).ok(),
        Value::Bool(b) => Some(Decimal::from(u8::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str_exact(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }?;
    let places = u32::from(places);
    let mut rounded =
        decimal.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    Some(rounded)
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        Value::Float(f) => Some(*f != 0.0),
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            if TRUTHY.contains(&lowered.as_str()) {
                Some(true)
            } else if FALSY.contains(&lowered.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn to_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::DateTime(dt) => Some(*dt),
        Value::String(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

/// Parses an ISO 8601 date or date-time (`YYYY-MM-DD[( |T)HH:MM[:SS[.fff]]]`).
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn matching_text(value: &Value, pattern: &Regex) -> Option<Value> {
    let text = value.to_string();
    let trimmed = text.trim();
    pattern
        .is_match(trimmed)
        .then(|| Value::String(trimmed.to_string()))
}

impl fmt::Display for CastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer { negative: false } => write!(f, "integer"),
            Self::Integer { negative: true } => write!(f, "integer:negative"),
            Self::Decimal {
                places,
                negative: false,
            } => write!(f, "decimal:{places}"),
            Self::Decimal {
                places,
                negative: true,
            } => write!(f, "decimal:{places}:negative"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date {
                include_time: false,
            } => write!(f, "date"),
            Self::Date { include_time: true } => write!(f, "datetime"),
            Self::Email => write!(f, "email"),
            Self::Url => write!(f, "url"),
        }
    }
}

impl FromStr for CastTarget {
    type Err = GridbaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let negative = parts.last() == Some(&"negative");
        let target = match parts.as_slice() {
            ["text"] => Self::Text,
            ["integer"] | ["integer", "negative"] => Self::Integer { negative },
            ["decimal", places] | ["decimal", places, "negative"] => Self::Decimal {
                places: places.parse().map_err(|_| {
                    GridbaseError::ProgrammingError(format!("Invalid decimal places in cast target '{s}'"))
                })?,
                negative,
            },
            ["boolean"] => Self::Boolean,
            ["date"] => Self::Date {
                include_time: false,
            },
            ["datetime"] => Self::Date { include_time: true },
            ["email"] => Self::Email,
            ["url"] => Self::Url,
            _ => {
                return Err(GridbaseError::ProgrammingError(format!(
                    "Unknown cast target '{s}'"
                )))
            }
        };
        Ok(target)
    }
}
