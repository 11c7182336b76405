//! Subheader signature recognition and pointer-table walking (component C3).

use crate::error::{Error, Result};
use crate::metadata::Endianness;
use crate::parser::primitives::read_int;

pub const TRUNCATED_SUBHEADER_ID: i8 = 1;
pub const COMPRESSED_SUBHEADER_ID: i8 = 4;
pub const COMPRESSED_SUBHEADER_TYPE: i8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubheaderKind {
    RowSize,
    ColumnSize,
    SubheaderCounts,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    FormatAndLabel,
    ColumnList,
    Data,
}

/// Classifies a subheader by its signature bytes (4 or 8 bytes, matching
/// `word_width`). Returns `None` for an unrecognized signature.
///
/// The 8-byte forms are not simply the 4-byte pattern padded with zeros: a
/// 4-byte tail of `0xFF` can belong to either `ColumnName` or the
/// big-endian form of `ColumnText`/`ColumnAttributes`/`FormatAndLabel`/
/// `ColumnList`, which only differ in their very first byte. So the full
/// signature is matched, not just a 4-byte prefix.
#[must_use]
pub fn classify_signature(signature: &[u8]) -> Option<SubheaderKind> {
    match signature {
        [0xF7, 0xF7, 0xF7, 0xF7]
        | [0x00, 0x00, 0x00, 0x00, 0xF7, 0xF7, 0xF7, 0xF7]
        | [0xF7, 0xF7, 0xF7, 0xF7, 0x00, 0x00, 0x00, 0x00] => Some(SubheaderKind::RowSize),

        [0xF6, 0xF6, 0xF6, 0xF6]
        | [0x00, 0x00, 0x00, 0x00, 0xF6, 0xF6, 0xF6, 0xF6]
        | [0xF6, 0xF6, 0xF6, 0xF6, 0x00, 0x00, 0x00, 0x00] => Some(SubheaderKind::ColumnSize),

        [0x00, 0xFC, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFC, 0x00]
        | [0x00, 0xFC, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC, 0x00] => Some(SubheaderKind::SubheaderCounts),

        [0xFD, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFD]
        | [0xFD, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFD] => Some(SubheaderKind::ColumnText),

        [0xFF, 0xFF, 0xFF, 0xFF] | [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF] => {
            Some(SubheaderKind::ColumnName)
        }

        [0xFC, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFC]
        | [0xFC, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC] => Some(SubheaderKind::ColumnAttributes),

        [0xFE, 0xFB, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFB, 0xFE]
        | [0xFE, 0xFB, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFB, 0xFE] => Some(SubheaderKind::FormatAndLabel),

        [0xFE, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFE]
        | [0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        | [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE] => Some(SubheaderKind::ColumnList),

        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubheaderPointer {
    pub offset: u64,
    pub length: u64,
    pub compression: i8,
    pub type_flag: i8,
}

impl SubheaderPointer {
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.compression as i64 == TRUNCATED_SUBHEADER_ID as i64
    }

    #[must_use]
    pub const fn is_compressed_data(&self) -> bool {
        (self.compression == COMPRESSED_SUBHEADER_ID || self.compression == 0)
            && self.type_flag == COMPRESSED_SUBHEADER_TYPE
    }
}

/// Reads the `index`-th subheader pointer from a page buffer at
/// `table_start`, per `word_width`.
///
/// # Errors
///
/// Returns [`Error::TruncatedField`] if the pointer entry would read past
/// the end of `page`.
pub fn parse_pointer(
    page: &[u8],
    table_start: u64,
    index: u64,
    word_width: u8,
    endian: Endianness,
) -> Result<SubheaderPointer> {
    let len = u64::from(word_width);
    let entry_len = if word_width == 8 { 24 } else { 12 };
    let base = (table_start + index * entry_len) as usize;
    let len = len as usize;

    let slice_from = |at: usize| page.get(at..).ok_or(Error::TruncatedField {
        needed: at.saturating_sub(page.len()) + 1,
        available: 0,
    });

    let offset = read_int(endian, slice_from(base)?, len)? as u64;
    let length = read_int(endian, slice_from(base + len)?, len)? as u64;
    let flags_at = base + 2 * len;
    let flags = slice_from(flags_at)?;
    if flags.len() < 2 {
        return Err(Error::TruncatedField {
            needed: 2,
            available: flags.len(),
        });
    }
    let compression = flags[0] as i8;
    let type_flag = flags[1] as i8;

    Ok(SubheaderPointer {
        offset,
        length,
        compression,
        type_flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_row_size_signature() {
        assert_eq!(
            classify_signature(&[0xF7, 0xF7, 0xF7, 0xF7]),
            Some(SubheaderKind::RowSize)
        );
    }

    #[test]
    fn recognizes_column_text_signature_mirrored() {
        assert_eq!(
            classify_signature(&[0xFF, 0xFF, 0xFF, 0xFD]),
            Some(SubheaderKind::ColumnText)
        );
    }

    #[test]
    fn unknown_signature_returns_none() {
        assert_eq!(classify_signature(&[0x01, 0x02, 0x03, 0x04]), None);
    }

    #[test]
    fn distinguishes_big_endian_8_byte_column_text_from_column_name() {
        // Both share a 0xFF 0xFF 0xFF 0xFF prefix; only the last byte differs.
        assert_eq!(
            classify_signature(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFD]),
            Some(SubheaderKind::ColumnText)
        );
        assert_eq!(
            classify_signature(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            Some(SubheaderKind::ColumnName)
        );
    }
}
