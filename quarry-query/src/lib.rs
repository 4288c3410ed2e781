//! Lazy, dplyr-style queries over tables, datasets and engine sessions.
//!
//! A [`Query`] accumulates a [`LogicalPlan`] of verbs without touching any data. Calling
//! [`Query::collect`] or [`Query::compute`] validates the plan against the [`Capabilities`] of
//! the engine it targets and dispatches it:
//!
//! * every step translatable: the native engine runs it, pushing leading filters and
//!   projections into dataset scans;
//! * a step the native engine cannot run, over an in-memory table: the steps before it run
//!   natively, the rest is evaluated locally over the materialized table, and the result carries
//!   an [`EagerMaterialization`](quarry_error::WarningKind::EagerMaterialization) warning;
//! * the same over a dataset with an alternate [`ExecutionEngine`] configured: the whole plan is
//!   handed to that engine, sharing the source rather than copying it;
//! * the same over a dataset without one: `UnsupportedOperation`, before any I/O.
//!
//! ```
//! use quarry_array::{IntoArray, Table};
//! use quarry_array::arrays::{PrimitiveArray, VarBinArray};
//! use quarry_expr::{col, gt, lit, sum};
//! use quarry_query::Query;
//!
//! let table = Table::try_from_arrays(vec![
//!     ("team", VarBinArray::from_strs(["red", "blue", "red"]).into_array()),
//!     ("score", PrimitiveArray::from_iter([3i64, 5, 4]).into_array()),
//! ])?;
//! let result = Query::from_table(table)
//!     .filter(gt(col("score"), lit(2i64)))
//!     .group_by(["team"])
//!     .summarize([("total", sum(col("score")))])
//!     .collect()?;
//! assert_eq!(result.table.num_rows(), 2);
//! assert!(result.warnings.is_empty());
//! # Ok::<_, quarry_error::QuarryError>(())
//! ```

pub use capabilities::*;
pub use engine::*;
pub use plan::*;
pub use query::*;

mod capabilities;
mod engine;
mod exec;
mod ops;
mod plan;
mod query;
