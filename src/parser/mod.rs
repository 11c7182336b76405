pub mod compression;
pub mod header;
pub mod metadata_handlers;
pub mod page;
pub mod primitives;
pub mod projector;
pub mod rows;
pub mod subheader;

use std::io::{Read, Seek};
use std::path::Path;

use crate::error::Result;
use crate::logger::log_warn;
use crate::metadata::{DatasetMetadata, FileParameters};
use metadata_handlers::MetadataBuilder;
use page::{page_bit_offset, PageReader, SUBHEADER_POINTERS_OFFSET};
use subheader::{classify_signature, parse_pointer, SubheaderKind};

/// Walks the header and every metadata-bearing page, building the frozen
/// schema (the metadata half of component C5, orchestrating C2–C4).
///
/// # Errors
///
/// Propagates any [`crate::error::Error`] raised while reading the header,
/// a page, or a malformed subheader.
pub fn parse_metadata<R: Read + Seek>(mut reader: R, path: &Path) -> Result<DatasetMetadata> {
    let params: FileParameters = header::parse_header(&mut reader, path)?;
    let mut builder = MetadataBuilder::default();

    {
        let mut page_reader = PageReader::new(&mut reader, &params, path);
        for index in 0..params.page_count {
            let page = page_reader.fetch(index)?;
            if !page.is_meta_mix_amd() {
                continue;
            }
            let bit_offset = page_bit_offset(params.word_width);
            let table_start = bit_offset + SUBHEADER_POINTERS_OFFSET;
            for i in 0..u64::from(page.subheader_count) {
                let Ok(ptr) = parse_pointer(
                    &page.buffer,
                    table_start,
                    i,
                    params.word_width,
                    params.endian,
                ) else {
                    continue;
                };
                if ptr.length == 0 || ptr.is_truncated() {
                    continue;
                }
                let sig_len = params.word_width as usize;
                let sig_start = ptr.offset as usize;
                let Some(sig) = page.buffer.get(sig_start..sig_start + sig_len) else {
                    continue;
                };
                let Some(kind) = classify_signature(sig) else {
                    // A data pointer (handled by the row stream) looks the same as a
                    // genuinely unrecognized signature here; only warn on the latter.
                    if !ptr.is_compressed_data() {
                        log_warn(&format!(
                            "{}: unknown subheader signature {sig:02x?} at page {}, offset {}",
                            path.display(),
                            page.index,
                            ptr.offset
                        ));
                    }
                    continue;
                };

                let payload_start = ptr.offset as usize;
                let payload_end = (ptr.offset + ptr.length) as usize;
                let Some(payload) = page.buffer.get(payload_start..payload_end) else {
                    continue;
                };
                let length = ptr.length as usize;

                match kind {
                    SubheaderKind::RowSize => builder.parse_row_size(payload, &params)?,
                    SubheaderKind::ColumnSize => builder.parse_column_size(payload, &params)?,
                    SubheaderKind::SubheaderCounts => {
                        builder.parse_subheader_counts(payload, &params);
                    }
                    SubheaderKind::ColumnText => builder.parse_column_text(payload, &params)?,
                    SubheaderKind::ColumnName => {
                        builder.parse_column_name(payload, length, &params)?;
                    }
                    SubheaderKind::ColumnAttributes => {
                        builder.parse_column_attributes(payload, length, &params)?;
                    }
                    SubheaderKind::FormatAndLabel => {
                        builder.parse_format_and_label(payload, &params)?;
                    }
                    SubheaderKind::ColumnList => builder.parse_column_list(payload, &params),
                    SubheaderKind::Data => {}
                }
            }
        }
    }

    builder.finalize(params, path)
}
