use std::fmt::{Display, Formatter};

use quarry_array::Array;
use quarry_array::compute::{count, count_all, max, mean, median, min, sum, sum_dtype};
use quarry_dtype::{DType, Nullability, PType};
use quarry_error::{QuarryResult, quarry_bail};
use quarry_scalar::Scalar;

/// A function reducing a column of values to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateFunction {
    /// The number of non-null values.
    Count,
    /// The number of values including nulls.
    CountAll,
    Sum,
    Min,
    Max,
    Mean,
    Median,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 7] = [
        Self::Count,
        Self::CountAll,
        Self::Sum,
        Self::Min,
        Self::Max,
        Self::Mean,
        Self::Median,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::CountAll => "count_all",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }

    /// Reduce `array` to a single value.
    pub fn evaluate(&self, array: &Array) -> QuarryResult<Scalar> {
        match self {
            Self::Count => Ok(count(array)),
            Self::CountAll => Ok(count_all(array)),
            Self::Sum => sum(array),
            Self::Min => min(array),
            Self::Max => max(array),
            Self::Mean => mean(array),
            Self::Median => median(array),
        }
    }

    /// The type of the value produced for an input of type `input`.
    pub fn return_dtype(&self, input: &DType) -> QuarryResult<DType> {
        match self {
            Self::Count | Self::CountAll => {
                Ok(DType::Primitive(PType::U64, Nullability::NonNullable))
            }
            Self::Sum => sum_dtype(input),
            Self::Min | Self::Max => Ok(input.as_nullable()),
            Self::Mean | Self::Median => {
                if !input.is_primitive() {
                    quarry_bail!(ComputeError: "{} expects numeric values, found {}", self, input);
                }
                Ok(DType::Primitive(PType::F64, Nullability::Nullable))
            }
        }
    }
}

impl Display for AggregateFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.name(), f)
    }
}
