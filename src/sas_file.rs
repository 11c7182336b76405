//! The public reader: open a file, inspect its frozen schema, stream rows.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::metadata::DatasetMetadata;
use crate::parser::{parse_metadata, rows::RowStream};

/// An open SAS7BDAT file: schema and reader are fixed at construction time.
pub struct SasFile<R> {
    reader: R,
    metadata: DatasetMetadata,
    path: PathBuf,
}

impl SasFile<BufReader<File>> {
    /// Opens `path` and parses its schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened, or any decoding
    /// error raised while parsing the header and metadata subheaders.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> SasFile<R> {
    /// Parses the schema of an already-open reader.
    ///
    /// # Errors
    ///
    /// See [`SasFile::open`].
    pub fn from_reader(mut reader: R, path: &Path) -> Result<Self> {
        let metadata = parse_metadata(&mut reader, path)?;
        Ok(Self {
            reader,
            metadata,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub const fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    /// Rewinds and returns an iterator over every row, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if seeking back to the start of the row area
    /// fails.
    pub fn rows(&mut self) -> Result<RowStream<'_, &mut R>> {
        self.reader
            .seek(SeekFrom::Start(self.metadata.params.header_length))
            .map_err(|source| Error::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(RowStream::new(&mut self.reader, &self.metadata, &self.path))
    }
}

/// A single decoded row: one [`Cell`] per schema column (or fewer, for a
/// row truncated by a zero-length trailing column).
pub type Row = Vec<Cell>;
