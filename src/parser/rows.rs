//! Drives pages and subheader pointers to yield typed rows in file order
//! (component C9).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::cell::Cell;
use crate::error::{Error, Result, Section};
use crate::metadata::{Compression, DatasetMetadata};
use crate::parser::compression::{decompress_rdc, decompress_rle};
use crate::parser::page::{
    page_bit_offset, subheader_pointer_length, Page, PageReader, PAGE_TYPE_DATA, PAGE_TYPE_MIX,
};
use crate::parser::projector::project_row;
use crate::parser::subheader::{classify_signature, parse_pointer, SubheaderPointer, SUBHEADER_POINTERS_OFFSET};

pub struct RowStream<'m, R> {
    page_reader: PageReader<'m, R>,
    metadata: &'m DatasetMetadata,
    path: PathBuf,
    row_in_file: u64,
    next_page_index: u64,
    current: Option<LoadedPage>,
}

struct LoadedPage {
    page: Page,
    row_on_page: u64,
    row_limit: u64,
    data_pointers: VecDeque<SubheaderPointer>,
}

impl<'m, R: std::io::Read + std::io::Seek> RowStream<'m, R> {
    pub fn new(reader: R, metadata: &'m DatasetMetadata, path: &Path) -> Self {
        Self {
            page_reader: PageReader::new(reader, &metadata.params, path),
            metadata,
            path: path.to_path_buf(),
            row_in_file: 0,
            next_page_index: 0,
            current: None,
        }
    }

    fn load_next_page(&mut self) -> Result<bool> {
        let params = &self.metadata.params;
        loop {
            if self.next_page_index >= params.page_count {
                return Ok(false);
            }
            let page = self.page_reader.fetch(self.next_page_index)?;
            self.next_page_index += 1;

            if PAGE_TYPE_MIX.contains(&page.page_type) {
                let remaining = self.metadata.row_count - self.row_in_file;
                let row_limit = remaining.min(self.metadata.mix_page_row_count);
                self.current = Some(LoadedPage {
                    page,
                    row_on_page: 0,
                    row_limit,
                    data_pointers: VecDeque::new(),
                });
                return Ok(true);
            } else if page.page_type == PAGE_TYPE_DATA {
                let row_limit = u64::from(self.current_block_count(&page));
                self.current = Some(LoadedPage {
                    page,
                    row_on_page: 0,
                    row_limit,
                    data_pointers: VecDeque::new(),
                });
                return Ok(true);
            } else if page.is_meta_mix_amd() {
                let pointers = self.collect_data_pointers(&page)?;
                let has_rows = !pointers.is_empty();
                self.current = Some(LoadedPage {
                    page,
                    row_on_page: 0,
                    row_limit: 0,
                    data_pointers: pointers,
                });
                if has_rows {
                    return Ok(true);
                }
                // META page with no data subheaders: keep scanning forward.
            }
            // Any other page type (AMD-only, METC, COMP) is skipped.
        }
    }

    fn current_block_count(&self, page: &Page) -> u16 {
        page.block_count
    }

    fn collect_data_pointers(&self, page: &Page) -> Result<VecDeque<SubheaderPointer>> {
        let params = &self.metadata.params;
        let bit_offset = page_bit_offset(params.word_width);
        let table_start = bit_offset + SUBHEADER_POINTERS_OFFSET;
        let mut out = VecDeque::new();
        for i in 0..u64::from(page.subheader_count) {
            let ptr = parse_pointer(&page.buffer, table_start, i, params.word_width, params.endian);
            if ptr.length == 0 || ptr.is_truncated() {
                continue;
            }
            let sig_len = params.word_width as usize;
            let sig_start = ptr.offset as usize;
            let Some(sig) = page.buffer.get(sig_start..sig_start + sig_len) else {
                continue;
            };
            if classify_signature(sig).is_none()
                && ptr.is_compressed_data()
                && self.metadata.compression != Compression::None
            {
                out.push_back(ptr);
            }
        }
        Ok(out)
    }

    fn next_row(&mut self) -> Result<Option<Vec<Cell>>> {
        loop {
            if self.row_in_file >= self.metadata.row_count {
                return Ok(None);
            }
            if self.current.is_none() && !self.load_next_page()? {
                return Ok(None);
            }
            let Some(loaded) = self.current.as_mut() else {
                return Ok(None);
            };

            if PAGE_TYPE_MIX.contains(&loaded.page.page_type) {
                let params = &self.metadata.params;
                let bit_offset = page_bit_offset(params.word_width);
                let ptr_len = subheader_pointer_length(params.word_width);
                let raw = bit_offset
                    + SUBHEADER_POINTERS_OFFSET
                    + u64::from(loaded.page.subheader_count) * ptr_len;
                let row_base = raw.div_ceil(8) * 8 + loaded.row_on_page * self.metadata.row_length;
                let row_len = self.metadata.row_length as usize;
                let start = row_base as usize;
                let slice = loaded.page.buffer.get(start..start + row_len).ok_or_else(|| {
                    Error::TruncatedFile {
                        path: self.path.clone(),
                        section: Section::Row {
                            index: self.row_in_file,
                        },
                    }
                })?;
                let cells = project_row(slice, &self.metadata.columns, params.endian);
                loaded.row_on_page += 1;
                self.row_in_file += 1;
                if loaded.row_on_page >= loaded.row_limit {
                    self.current = None;
                }
                return Ok(Some(cells));
            } else if loaded.page.page_type == PAGE_TYPE_DATA {
                let params = &self.metadata.params;
                let bit_offset = page_bit_offset(params.word_width);
                let row_base = bit_offset
                    + SUBHEADER_POINTERS_OFFSET
                    + loaded.row_on_page * self.metadata.row_length;
                let row_len = self.metadata.row_length as usize;
                let start = row_base as usize;
                let slice = loaded.page.buffer.get(start..start + row_len).ok_or_else(|| {
                    Error::TruncatedFile {
                        path: self.path.clone(),
                        section: Section::Row {
                            index: self.row_in_file,
                        },
                    }
                })?;
                let cells = project_row(slice, &self.metadata.columns, params.endian);
                loaded.row_on_page += 1;
                self.row_in_file += 1;
                if loaded.row_on_page >= loaded.row_limit {
                    self.current = None;
                }
                return Ok(Some(cells));
            } else {
                // META page: each row comes from one compressed-data pointer.
                let Some(ptr) = loaded.data_pointers.pop_front() else {
                    self.current = None;
                    continue;
                };
                let start = ptr.offset as usize;
                let len = ptr.length as usize;
                let page_index = loaded.page.index;
                let slice = loaded.page.buffer.get(start..start + len).ok_or_else(|| {
                    Error::TruncatedFile {
                        path: self.path.clone(),
                        section: Section::Row {
                            index: self.row_in_file,
                        },
                    }
                })?;
                let row_length = self.metadata.row_length as usize;
                let buffer = match self.metadata.compression {
                    Compression::Rle => decompress_rle(slice, row_length, &self.path, page_index)?,
                    Compression::Rdc => decompress_rdc(slice, row_length, &self.path, page_index)?,
                    Compression::None => slice.to_vec(),
                };
                let cells = project_row(&buffer, &self.metadata.columns, self.metadata.params.endian);
                self.row_in_file += 1;
                if loaded.data_pointers.is_empty() {
                    self.current = None;
                }
                return Ok(Some(cells));
            }
        }
    }
}

impl<'m, R: std::io::Read + std::io::Seek> Iterator for RowStream<'m, R> {
    type Item = Result<Vec<Cell>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
