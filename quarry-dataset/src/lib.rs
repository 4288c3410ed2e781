//! Datasets: a directory tree of files read as one logical table.
//!
//! A [`Dataset`] discovers its files once, when it is opened. The directories between the
//! dataset root and each file may encode partition columns in the Hive `key=value` style, for
//! example `year=2024/month=1/part-0.qry`. Partition values become ordinary columns of the
//! dataset schema and are used to skip whole files when a scan predicate rules them out.
//!
//! Files do not need to share a schema. With [`DatasetOptions::unify_schemas`] every file is
//! inspected and the dataset schema is the union of their schemas, columns missing from a file
//! reading as nulls. Otherwise the first file decides the schema and differences surface when
//! the offending file is scanned.
//!
//! ```no_run
//! use quarry_dataset::{Dataset, DatasetOptions, ScanOptions};
//! use quarry_expr::{col, eq, lit};
//!
//! let dataset = Dataset::open_local("/data/events", DatasetOptions::default())?;
//! let scan = dataset.scan(
//!     ScanOptions::default()
//!         .with_projection(["user", "year"])
//!         .with_predicate(eq(col("year"), lit(2024i64))),
//! )?;
//! for batch in scan.iter() {
//!     println!("{} rows", batch?.num_rows());
//! }
//! # Ok::<_, quarry_error::QuarryError>(())
//! ```

pub use dataset::*;
pub use format::*;
pub use partitioning::*;
pub use scan::*;

mod dataset;
mod format;
mod partitioning;
mod scan;
#[cfg(test)]
mod tests;
