use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::PType;

/// The resolution of a time-based value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum TimeUnit {
    /// Seconds
    S,
    /// Milliseconds
    Ms,
    /// Microseconds
    Us,
    /// Nanoseconds
    Ns,
}

impl TimeUnit {
    /// The number of units in one second.
    pub const fn per_second(&self) -> i64 {
        match self {
            Self::S => 1,
            Self::Ms => 1_000,
            Self::Us => 1_000_000,
            Self::Ns => 1_000_000_000,
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S => write!(f, "s"),
            Self::Ms => write!(f, "ms"),
            Self::Us => write!(f, "us"),
            Self::Ns => write!(f, "ns"),
        }
    }
}

/// A time-based logical type, stored physically as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TemporalType {
    /// Days since the UNIX epoch, stored as `i32`.
    Date32,
    /// Time since midnight, stored as `i64`.
    Time64(TimeUnit),
    /// Time since the UNIX epoch, stored as `i64`, with an optional timezone name.
    Timestamp(TimeUnit, Option<Arc<str>>),
    /// An elapsed span of time, stored as `i64`.
    Duration(TimeUnit),
}

impl TemporalType {
    /// The physical type values of this temporal type are stored as.
    pub const fn storage_ptype(&self) -> PType {
        match self {
            Self::Date32 => PType::I32,
            Self::Time64(_) | Self::Timestamp(..) | Self::Duration(_) => PType::I64,
        }
    }

    /// The unit of the stored values, if any.
    pub fn time_unit(&self) -> Option<TimeUnit> {
        match self {
            Self::Date32 => None,
            Self::Time64(unit) | Self::Timestamp(unit, _) | Self::Duration(unit) => Some(*unit),
        }
    }
}

impl Display for TemporalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date32 => write!(f, "date32"),
            Self::Time64(unit) => write!(f, "time64[{unit}]"),
            Self::Timestamp(unit, None) => write!(f, "timestamp[{unit}]"),
            Self::Timestamp(unit, Some(tz)) => write!(f, "timestamp[{unit}, {tz}]"),
            Self::Duration(unit) => write!(f, "duration[{unit}]"),
        }
    }
}
