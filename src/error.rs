use std::path::PathBuf;

/// Where in the decoding pipeline a corruption was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Header,
    Page { index: u64 },
    Subheader { page_index: u64, signature: u64 },
    Row { index: u64 },
    Column { index: usize },
    Decompression { page_index: u64 },
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Page { index } => write!(f, "page {index}"),
            Self::Subheader {
                page_index,
                signature,
            } => write!(f, "subheader 0x{signature:x} on page {page_index}"),
            Self::Row { index } => write!(f, "row {index}"),
            Self::Column { index } => write!(f, "column {index}"),
            Self::Decompression { page_index } => write!(f, "decompression of page {page_index}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: not a SAS7BDAT file")]
    NotSas { path: PathBuf },

    #[error("{path}: truncated file at {section}")]
    TruncatedFile { path: PathBuf, section: Section },

    #[error("{path}: schema inconsistent at {section}: {details}")]
    SchemaInconsistent {
        path: PathBuf,
        section: Section,
        details: String,
    },

    #[error("{path}: unsupported compression signature {signature:?}")]
    UnsupportedCompression { path: PathBuf, signature: String },

    #[error("truncated field: needed {needed} bytes, got {available}")]
    TruncatedField { needed: usize, available: usize },

    #[error("{path}: unknown RLE control byte 0x{opcode:x} in {section}")]
    UnknownControl {
        path: PathBuf,
        section: Section,
        opcode: u8,
    },

    #[error("{path}: unknown RDC marker byte 0x{marker:x} in {section}")]
    UnknownMarker {
        path: PathBuf,
        section: Section,
        marker: u8,
    },

    #[error("{path}: projected row has {actual} columns, schema declares {expected}")]
    ColumnCountMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
