//! Decodes the seven metadata subheader kinds into a [`DatasetMetadata`]
//! (component C5).

use crate::error::{Error, Result, Section};
use crate::logger::log_warn;
use crate::metadata::{Column, Compression, DatasetMetadata, FileParameters, LogicalType};
use crate::parser::primitives::{read_int, read_uint};

const RLE_LITERAL: &[u8] = b"SASYZCRL";
const RDC_LITERAL: &[u8] = b"SASYZCR2";
/// Shared prefix of every known compression literal; a text blob carrying a
/// signature that starts this way but matches neither literal exactly names
/// a compression scheme this reader does not support.
const COMPRESSION_PREFIX: &[u8] = b"SASYZ";

/// Host strings recognized per the format's fixed platform table. Anything
/// else is logged as a warning, not treated as fatal.
const KNOWN_HOSTS: &[&str] = &[
    "WIN_PRO", "WIN_NT", "WIN_NTSV", "WIN_SRV", "WIN_ASRV", "XP_PRO", "XP_HOME",
    "NET_ASRV", "NET_DSRV", "NET_SRV", "WIN_98", "W32_VSPRO", "WIN", "WIN_95",
    "X64_VSPRO", "AIX", "X64_ESRV", "W32_ESRV", "W32_7PRO", "W32_VSHOME",
    "X64_7HOME", "X64_7PRO", "X64_SRV0", "W32_SRV0", "X64_ES08", "Linux", "HP-UX",
];

/// Accumulates the text blobs referenced by name/format/label pointers.
#[derive(Debug, Default)]
pub struct TextStore {
    blobs: Vec<Vec<u8>>,
}

impl TextStore {
    pub fn push_blob(&mut self, blob: Vec<u8>) {
        self.blobs.push(blob);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Resolves `(index, offset, length)` into a decoded string, clamping
    /// `index` to the last available blob — a tolerance for a known
    /// file-producer bug that emits out-of-range indices.
    #[must_use]
    pub fn resolve(&self, index: u16, offset: u16, length: u16) -> String {
        if self.blobs.is_empty() {
            return String::new();
        }
        let clamped = (index as usize).min(self.blobs.len() - 1);
        let blob = &self.blobs[clamped];
        let start = offset as usize;
        let end = (start + length as usize).min(blob.len());
        if start >= blob.len() {
            return String::new();
        }
        String::from_utf8_lossy(&blob[start..end]).to_string()
    }

    /// First blob only: scans for the embedded compression literal, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCompression`] when the blob carries a
    /// signature from the same family as the two recognized literals
    /// (shares their `SASYZ` prefix) but matches neither exactly.
    pub fn detect_compression(&self, path: &std::path::Path) -> Result<Compression> {
        let Some(first) = self.blobs.first() else {
            return Ok(Compression::None);
        };
        if contains(first, RLE_LITERAL) {
            return Ok(Compression::Rle);
        }
        if contains(first, RDC_LITERAL) {
            return Ok(Compression::Rdc);
        }
        if let Some(window) = first.windows(8).find(|w| w.starts_with(COMPRESSION_PREFIX)) {
            let signature = String::from_utf8_lossy(window).to_string();
            return Err(Error::UnsupportedCompression { path: path.to_path_buf(), signature });
        }
        Ok(Compression::None)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[derive(Debug, Default)]
pub struct MetadataBuilder {
    pub text_store: TextStore,
    pub row_length: u64,
    pub row_count: u64,
    pub mix_page_row_count: u64,
    pub column_count: usize,
    pub names: Vec<String>,
    pub offsets: Vec<u64>,
    pub lengths: Vec<u32>,
    pub types: Vec<LogicalType>,
    pub formats: Vec<String>,
    pub labels: Vec<String>,
    pub colcount_p1: u32,
    pub colcount_p2: u32,
}

impl MetadataBuilder {
    /// # Errors
    ///
    /// Returns [`Error::TruncatedField`] if a field read runs past the end
    /// of `payload` (unreachable in practice: the length guard above already
    /// covers every offset read here).
    pub fn parse_row_size(&mut self, payload: &[u8], p: &FileParameters) -> Result<()> {
        let w = u64::from(p.word_width) as usize;
        if payload.len() < 16 * w {
            return Ok(());
        }
        if self.row_length == 0 {
            self.row_length = read_uint(p.endian, &payload[5 * w..5 * w + w], w)?;
        }
        if self.row_count == 0 {
            self.row_count = read_uint(p.endian, &payload[6 * w..6 * w + w], w)?;
        }
        self.colcount_p1 = read_uint(p.endian, &payload[9 * w..9 * w + w], w)? as u32;
        self.colcount_p2 = read_uint(p.endian, &payload[10 * w..10 * w + w], w)? as u32;
        if self.mix_page_row_count == 0 {
            self.mix_page_row_count = read_uint(p.endian, &payload[15 * w..15 * w + w], w)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::TruncatedField`] if the count field runs past the
    /// end of `payload` (unreachable: guarded above).
    pub fn parse_column_size(&mut self, payload: &[u8], p: &FileParameters) -> Result<()> {
        let w = u64::from(p.word_width) as usize;
        if payload.len() < 2 * w {
            return Ok(());
        }
        self.column_count = read_uint(p.endian, &payload[w..2 * w], w)? as usize;
        Ok(())
    }

    pub fn parse_subheader_counts(&mut self, _payload: &[u8], _p: &FileParameters) {
        // Carried for signature recognition only; the stream derives row
        // locations from page walking rather than this subheader's content.
    }

    /// # Errors
    ///
    /// Returns [`Error::TruncatedField`] if the blob's own size prefix runs
    /// past the end of `payload`.
    pub fn parse_column_text(&mut self, payload: &[u8], p: &FileParameters) -> Result<()> {
        let w = u64::from(p.word_width) as usize;
        let Some(local) = payload.get(w..) else {
            return Ok(());
        };
        if local.len() < 2 {
            return Ok(());
        }
        let size = read_uint(p.endian, &local[..2], 2)? as usize;
        let end = size.min(local.len());
        self.text_store.push_blob(local[..end].to_vec());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::TruncatedField`] if an entry read runs past the end
    /// of `payload` (unreachable: the per-entry bounds check above covers
    /// every offset read here).
    pub fn parse_column_name(&mut self, payload: &[u8], length: usize, p: &FileParameters) -> Result<()> {
        let w = u64::from(p.word_width) as usize;
        let base = w;
        if length < 2 * w + 12 {
            return Ok(());
        }
        let count = (length - 2 * w - 12) / 8;
        for i in 0..count {
            let entry = base + 8 * (i + 1);
            if entry + 6 > payload.len() {
                break;
            }
            let idx = read_uint(p.endian, &payload[entry..entry + 2], 2)? as u16;
            let col_offset = read_uint(p.endian, &payload[entry + 2..entry + 4], 2)? as u16;
            let col_len = read_uint(p.endian, &payload[entry + 4..entry + 6], 2)? as u16;
            self.names.push(self.text_store.resolve(idx, col_offset, col_len));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::TruncatedField`] if an entry read runs past the end
    /// of `payload` (unreachable: guarded per-entry above).
    pub fn parse_column_attributes(&mut self, payload: &[u8], length: usize, p: &FileParameters) -> Result<()> {
        let w = u64::from(p.word_width) as usize;
        if length < 2 * w + 12 {
            return Ok(());
        }
        let count = (length - 2 * w - 12) / (w + 8);
        for i in 0..count {
            let stride = i * (w + 8);
            let data_offset_pos = w + 8 + stride;
            let data_len_pos = 2 * w + 8 + stride;
            let type_pos = 2 * w + 14 + stride;
            if type_pos + 1 > payload.len() {
                break;
            }
            let offset = read_uint(p.endian, &payload[data_offset_pos..data_offset_pos + w], w)?;
            let data_len =
                read_uint(p.endian, &payload[data_len_pos..data_len_pos + 4], 4)? as u32;
            let ctype = payload[type_pos];
            self.offsets.push(offset);
            self.lengths.push(data_len);
            self.types.push(if ctype == 1 {
                LogicalType::Number
            } else {
                LogicalType::String
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::TruncatedField`] if a field read runs past the end
    /// of `payload` (unreachable: guarded above).
    pub fn parse_format_and_label(&mut self, payload: &[u8], p: &FileParameters) -> Result<()> {
        let w = u64::from(p.word_width) as usize;
        let base = 3 * w;
        let need = base + 34;
        if payload.len() < need {
            return Ok(());
        }
        let format_idx = read_uint(p.endian, &payload[base + 22..base + 24], 2)? as u16;
        let format_start = read_uint(p.endian, &payload[base + 24..base + 26], 2)? as u16;
        let format_len = read_uint(p.endian, &payload[base + 26..base + 28], 2)? as u16;
        let label_idx = read_uint(p.endian, &payload[base + 28..base + 30], 2)? as u16;
        let label_start = read_uint(p.endian, &payload[base + 30..base + 32], 2)? as u16;
        let label_len = read_uint(p.endian, &payload[base + 32..base + 34], 2)? as u16;

        let format = self.text_store.resolve(format_idx, format_start, format_len);
        let label = self.text_store.resolve(label_idx, label_start, label_len);
        self.formats.push(format);
        self.labels.push(label);
        Ok(())
    }

    pub fn parse_column_list(&mut self, _payload: &[u8], _p: &FileParameters) {
        // Column ordering/grouping hints; not required to project rows.
    }

    /// Freezes the accumulated parallel arrays into a [`DatasetMetadata`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaInconsistent`] if the parallel arrays disagree
    /// in length with `column_count`.
    pub fn finalize(self, params: FileParameters, path: &std::path::Path) -> Result<DatasetMetadata> {
        let n = self.column_count;
        if self.names.len() != n || self.offsets.len() != n || self.types.len() != n {
            return Err(Error::SchemaInconsistent {
                path: path.to_path_buf(),
                section: Section::Header,
                details: format!(
                    "expected {n} columns, got {} names / {} attrs",
                    self.names.len(),
                    self.offsets.len()
                ),
            });
        }
        let has_labels = self.formats.len() == n;

        let mut columns = Vec::with_capacity(n);
        for i in 0..n {
            columns.push(Column {
                index: i,
                name: self.names[i].clone(),
                label: if has_labels {
                    self.labels[i].clone()
                } else {
                    String::new()
                },
                format: if has_labels {
                    self.formats[i].clone()
                } else {
                    String::new()
                },
                logical_type: self.types[i],
                byte_length: self.lengths[i],
                byte_offset: self.offsets[i],
            });
        }

        let compression = self.text_store.detect_compression(path)?;

        if self.colcount_p1 + self.colcount_p2 != n as u32 {
            log_warn(&format!(
                "{}: colcount_p1 ({}) + colcount_p2 ({}) != column_count ({n})",
                path.display(),
                self.colcount_p1,
                self.colcount_p2
            ));
        }

        let server_type = params.server_type.trim();
        if !server_type.is_empty() && !KNOWN_HOSTS.contains(&server_type) {
            log_warn(&format!("{}: unrecognized host string {server_type:?}", path.display()));
        }

        Ok(DatasetMetadata {
            params,
            compression,
            row_length: self.row_length,
            row_count: self.row_count,
            mix_page_row_count: self.mix_page_row_count,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Endianness, Platform};

    fn params() -> FileParameters {
        FileParameters {
            word_width: 4,
            endian: Endianness::Little,
            platform: Platform::Unix,
            header_length: 1024,
            page_length: 4096,
            page_count: 1,
            dataset_name: String::new(),
            sas_release: String::new(),
            server_type: String::new(),
            os_name: String::new(),
            date_created: 0.0,
            date_modified: 0.0,
        }
    }

    #[test]
    fn row_size_subheader_reads_lengths() {
        let p = params();
        let mut payload = vec![0u8; 16 * 4];
        payload[5 * 4..5 * 4 + 4].copy_from_slice(&100u32.to_le_bytes());
        payload[6 * 4..6 * 4 + 4].copy_from_slice(&10u32.to_le_bytes());
        payload[15 * 4..15 * 4 + 4].copy_from_slice(&5u32.to_le_bytes());
        let mut b = MetadataBuilder::default();
        b.parse_row_size(&payload, &p).unwrap();
        assert_eq!(b.row_length, 100);
        assert_eq!(b.row_count, 10);
        assert_eq!(b.mix_page_row_count, 5);
    }

    #[test]
    fn column_text_detects_rle_literal() {
        let p = params();
        let mut payload = vec![0u8; 4 + 2 + 16];
        let blob = b"SASYZCRL........";
        payload[6..6].copy_from_slice(&[]);
        payload[4..6].copy_from_slice(&(16u16).to_le_bytes());
        payload[4..4 + 16].copy_from_slice(&blob[..16]);
        let mut b = MetadataBuilder::default();
        b.parse_column_text(&payload, &p).unwrap();
        let path = std::path::Path::new("test.sas7bdat");
        assert_eq!(b.text_store.detect_compression(path).unwrap(), Compression::Rle);
    }

    #[test]
    fn column_text_rejects_unrecognized_signature() {
        let mut store = TextStore::default();
        store.push_blob(b"SASYZXXX........".to_vec());
        let path = std::path::Path::new("test.sas7bdat");
        let err = store.detect_compression(path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression { .. }));
    }

    #[test]
    fn row_size_subheader_reads_colcounts() {
        let p = params();
        let mut payload = vec![0u8; 16 * 4];
        payload[9 * 4..9 * 4 + 4].copy_from_slice(&3u32.to_le_bytes());
        payload[10 * 4..10 * 4 + 4].copy_from_slice(&2u32.to_le_bytes());
        let mut b = MetadataBuilder::default();
        b.parse_row_size(&payload, &p).unwrap();
        assert_eq!(b.colcount_p1, 3);
        assert_eq!(b.colcount_p2, 2);
    }

    #[test]
    fn resolve_clamps_out_of_range_index() {
        let mut store = TextStore::default();
        store.push_blob(b"hello".to_vec());
        assert_eq!(store.resolve(5, 0, 5), "hello");
    }
}
