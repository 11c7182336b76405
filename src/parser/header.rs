//! Decodes the 288-byte leading header plus its word-width-dependent
//! remainder (component C4).

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result, Section};
use crate::metadata::{Endianness, FileParameters, Platform};
use crate::parser::primitives::{read_double, read_int, read_string};

pub const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

const U64_BYTE_CHECKER_OFFSET: usize = 32;
const ALIGN_1_CHECKER_OFFSET: usize = 35;
const ENDIANNESS_OFFSET: usize = 37;
const PLATFORM_OFFSET: usize = 39;
const DATASET_OFFSET: usize = 92;
const DATASET_LENGTH: usize = 64;
const DATE_CREATED_OFFSET: usize = 164;
const DATE_MODIFIED_OFFSET: usize = 172;
const HEADER_SIZE_OFFSET: usize = 196;
const PAGE_SIZE_OFFSET: usize = 200;
const PAGE_COUNT_OFFSET: usize = 204;
const SAS_RELEASE_OFFSET: usize = 216;
const SAS_RELEASE_LENGTH: usize = 8;
const SAS_SERVER_TYPE_OFFSET: usize = 224;
const SAS_SERVER_TYPE_LENGTH: usize = 16;
const OS_NAME_OFFSET: usize = 272;
const OS_NAME_LENGTH: usize = 16;

/// Reads and validates the leading header of a SAS7BDAT file, leaving the
/// reader positioned at `header_length`.
///
/// # Errors
///
/// Returns [`Error::Io`] on a read failure and [`Error::NotSas`] if the
/// magic number does not match or the file is shorter than 288 bytes.
pub fn parse_header<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<FileParameters> {
    let mut head = [0u8; 288];
    read_exact_at(reader, path, 0, &mut head)?;

    if head[..32] != MAGIC {
        return Err(Error::NotSas {
            path: path.to_path_buf(),
        });
    }

    let endian = if head[ENDIANNESS_OFFSET] == 0x01 {
        Endianness::Little
    } else {
        Endianness::Big
    };
    let platform = match head[PLATFORM_OFFSET] {
        b'1' => Platform::Unix,
        b'2' => Platform::Windows,
        _ => Platform::Unknown,
    };

    // The corrected byte->field assignment (see DESIGN.md): align1 tracks
    // the byte-32 width flag, align2 tracks byte 35, and word_width only
    // widens to 8 on unix hosts that also carry the byte-32 flag.
    let has_u64_flag = head[U64_BYTE_CHECKER_OFFSET] == b'3';
    let word_width: u8 = if matches!(platform, Platform::Unix) && has_u64_flag {
        8
    } else {
        4
    };
    let align1: usize = if has_u64_flag { 4 } else { 0 };
    let align2: usize = if head[ALIGN_1_CHECKER_OFFSET] == b'3' { 4 } else { 0 };

    let dataset_name = read_string(&head[DATASET_OFFSET..DATASET_OFFSET + DATASET_LENGTH]);

    let field_truncated = |_: Error| Error::TruncatedFile {
        path: path.to_path_buf(),
        section: Section::Header,
    };
    let date_created =
        read_double(endian, &head[DATE_CREATED_OFFSET + align1..][..8]).map_err(field_truncated)?;
    let date_modified = read_double(endian, &head[DATE_MODIFIED_OFFSET + align1..][..8])
        .map_err(field_truncated)?;

    let header_length = read_int(endian, &head[HEADER_SIZE_OFFSET + align1..][..4], 4)
        .map_err(field_truncated)? as u64;
    let header_length = if word_width == 8 { 8192 } else { header_length };

    let page_length = read_int(endian, &head[PAGE_SIZE_OFFSET + align1..][..4], 4)
        .map_err(field_truncated)? as u64;

    // Fixed 4 bytes regardless of align2: the padding reserved after
    // page_count is never folded into the value itself.
    let page_count = read_int(endian, &head[PAGE_COUNT_OFFSET + align1..][..4], 4)
        .map_err(field_truncated)? as u64;

    // Release/host strings live at `base_offset + align1 + align2`. That
    // shifted position can fall before or after the first 288 bytes
    // (OS_NAME can spill past it once align1+align2 == 8), so read the
    // whole header into one buffer and index it directly rather than
    // splitting into a head/remainder pair with a hand-rolled offset.
    let mut full = head.to_vec();
    full.resize(header_length.max(288) as usize, 0);
    read_exact_at(reader, path, 288, &mut full[288..])?;

    let total_align = align1 + align2;
    let sas_release = string_at(&full, SAS_RELEASE_OFFSET, SAS_RELEASE_LENGTH, total_align);
    let server_type = string_at(
        &full,
        SAS_SERVER_TYPE_OFFSET,
        SAS_SERVER_TYPE_LENGTH,
        total_align,
    );
    let os_name = string_at(&full, OS_NAME_OFFSET, OS_NAME_LENGTH, total_align);

    if page_length == 0 || (page_length as i64) < 0 {
        return Err(Error::SchemaInconsistent {
            path: path.to_path_buf(),
            section: Section::Header,
            details: format!("invalid page_length {page_length}"),
        });
    }

    reader
        .seek(SeekFrom::Start(header_length))
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(FileParameters {
        word_width,
        endian,
        platform,
        header_length,
        page_length,
        page_count,
        dataset_name,
        sas_release,
        server_type,
        os_name,
        date_created,
        date_modified,
    })
}

fn string_at(buf: &[u8], offset: usize, length: usize, shift: usize) -> String {
    let start = offset + shift;
    buf.get(start..start + length).map_or_else(String::new, read_string)
}

fn read_exact_at<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    pos: u64,
    buf: &mut [u8],
) -> Result<()> {
    reader.seek(SeekFrom::Start(pos)).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    reader.read_exact(buf).map_err(|source| {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::NotSas {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_header(word_width: u8) -> Vec<u8> {
        let header_len: usize = if word_width == 8 { 8192 } else { 1024 };
        let mut buf = vec![0u8; header_len];
        buf[..32].copy_from_slice(&MAGIC);
        if word_width == 8 {
            buf[32] = b'3';
        }
        buf[37] = 0x01; // little endian
        buf[39] = b'1'; // unix
        let align1 = 0usize;
        let hs_off = HEADER_SIZE_OFFSET + align1;
        buf[hs_off..hs_off + 4].copy_from_slice(&(header_len as u32).to_le_bytes());
        let ps_off = PAGE_SIZE_OFFSET + align1;
        buf[ps_off..ps_off + 4].copy_from_slice(&4096u32.to_le_bytes());
        buf
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 288];
        let mut cur = Cursor::new(&mut buf);
        let err = parse_header(&mut cur, Path::new("x.sas7bdat")).unwrap_err();
        assert!(matches!(err, Error::NotSas { .. }));
    }

    #[test]
    fn parses_32_bit_little_endian_header() {
        let buf = minimal_header(4);
        let mut cur = Cursor::new(buf);
        let params = parse_header(&mut cur, Path::new("x.sas7bdat")).unwrap();
        assert_eq!(params.word_width, 4);
        assert_eq!(params.endian, Endianness::Little);
        assert_eq!(params.platform, Platform::Unix);
        assert_eq!(params.page_length, 4096);
    }

    #[test]
    fn parses_64_bit_header_length() {
        let buf = minimal_header(8);
        let mut cur = Cursor::new(buf);
        let params = parse_header(&mut cur, Path::new("x.sas7bdat")).unwrap();
        assert_eq!(params.word_width, 8);
        assert_eq!(params.header_length, 8192);
    }
}
