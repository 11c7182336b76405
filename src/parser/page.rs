//! Sequential page fetch and classification (component C2).

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result, Section};
use crate::metadata::FileParameters;
use crate::parser::primitives::read_int;

pub const PAGE_TYPE_META: i16 = 0;
pub const PAGE_TYPE_DATA: i16 = 256;
pub const PAGE_TYPE_MIX: [i16; 2] = [512, 640];
pub const PAGE_TYPE_AMD: i16 = 1024;
pub const PAGE_TYPE_METC: i16 = 16384;
pub const PAGE_TYPE_COMP: i16 = -28672;

pub const SUBHEADER_POINTERS_OFFSET: u64 = 8;

/// Bit offset of the page header fields, in bytes: 16 for 32-bit files, 32
/// for 64-bit files.
#[must_use]
pub const fn page_bit_offset(word_width: u8) -> u64 {
    if word_width == 8 {
        32
    } else {
        16
    }
}

#[must_use]
pub const fn subheader_pointer_length(word_width: u8) -> u64 {
    if word_width == 8 {
        24
    } else {
        12
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub index: u64,
    pub buffer: Vec<u8>,
    pub page_type: i16,
    pub block_count: u16,
    pub subheader_count: u16,
}

impl Page {
    #[must_use]
    pub fn is_meta_mix_amd(&self) -> bool {
        self.page_type == PAGE_TYPE_META
            || PAGE_TYPE_MIX.contains(&self.page_type)
            || self.page_type == PAGE_TYPE_AMD
    }

    #[must_use]
    pub fn is_mix_or_data(&self) -> bool {
        PAGE_TYPE_MIX.contains(&self.page_type) || self.page_type == PAGE_TYPE_DATA
    }
}

/// Fetches pages sequentially from a file, given its frozen [`FileParameters`].
pub struct PageReader<'p, R> {
    reader: R,
    params: &'p FileParameters,
    path: std::path::PathBuf,
}

impl<'p, R: Read + Seek> PageReader<'p, R> {
    pub fn new(reader: R, params: &'p FileParameters, path: &Path) -> Self {
        Self {
            reader,
            params,
            path: path.to_path_buf(),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Reads page `index` (0-based) in its entirety and classifies it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedFile`] if fewer bytes than `page_length`
    /// are available.
    pub fn fetch(&mut self, index: u64) -> Result<Page> {
        let pos = self.params.header_length + index * self.params.page_length;
        self.reader
            .seek(SeekFrom::Start(pos))
            .map_err(|source| Error::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut buffer = vec![0u8; self.params.page_length as usize];
        self.reader.read_exact(&mut buffer).map_err(|source| {
            if source.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::TruncatedFile {
                    path: self.path.clone(),
                    section: Section::Page { index },
                }
            } else {
                Error::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        let bit_offset = page_bit_offset(self.params.word_width) as usize;
        let truncated = |_: Error| Error::TruncatedFile {
            path: self.path.clone(),
            section: Section::Page { index },
        };
        let page_type = read_int(self.params.endian, &buffer[bit_offset..bit_offset + 2], 2)
            .map_err(truncated)? as i16;
        let block_count =
            read_int(self.params.endian, &buffer[bit_offset + 2..bit_offset + 4], 2)
                .map_err(truncated)? as u16;
        let subheader_count =
            read_int(self.params.endian, &buffer[bit_offset + 4..bit_offset + 6], 2)
                .map_err(truncated)? as u16;

        Ok(Page {
            index,
            buffer,
            page_type,
            block_count,
            subheader_count,
        })
    }
}
