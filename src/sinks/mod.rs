//! External collaborators that turn a schema + row stream into an output
//! format (component C12 and friends). The reader never depends on a sink;
//! sinks depend only on [`crate::metadata::DatasetMetadata`] and
//! [`crate::cell::Cell`].

pub mod csv;

use crate::cell::Cell;
use crate::error::Result;
use crate::metadata::DatasetMetadata;

/// Everything a sink needs to know about the dataset before the first row
/// arrives.
pub struct SinkContext<'a> {
    pub metadata: &'a DatasetMetadata,
}

/// A destination for decoded rows.
pub trait RowSink {
    /// Called once, before any row, with the frozen schema.
    ///
    /// # Errors
    ///
    /// Implementations may fail validation (e.g. column mismatch) here.
    fn begin(&mut self, context: SinkContext<'_>) -> Result<()>;

    /// Called once per row, in file order.
    ///
    /// # Errors
    ///
    /// Implementations may fail on write errors.
    fn write_row(&mut self, row: &[Cell]) -> Result<()>;

    /// Called once after the last row, to flush and release resources.
    ///
    /// # Errors
    ///
    /// Implementations may fail on a final flush.
    fn finish(&mut self) -> Result<()>;
}
