//! A reader for the SAS7BDAT binary dataset format: decodes the paged
//! container, its metadata subheaders, and the two SAS row-compression
//! schemes, and streams rows as typed cells.

pub mod cell;
pub mod error;
pub mod logger;
pub mod metadata;
pub mod parser;
pub mod sas_file;
pub mod sinks;

pub use cell::Cell;
pub use error::{Error, Result, Section};
pub use metadata::{Column, Compression, DatasetMetadata, Endianness, FileParameters, LogicalType, Platform};
pub use sas_file::{Row, SasFile};
