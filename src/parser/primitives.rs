//! Endian- and width-aware decode of integers, doubles, and fixed strings
//! (component C1). Pure functions over byte slices; no I/O.

use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};
use crate::metadata::Endianness;

const SAS_EPOCH_OFFSET_SECONDS: f64 = -3653.0 * 86_400.0;

fn require(bytes: &[u8], size: usize) -> Result<()> {
    if bytes.len() < size {
        return Err(Error::TruncatedField {
            needed: size,
            available: bytes.len(),
        });
    }
    Ok(())
}

/// Reads a signed integer of `size` bytes (1, 2, 4, or 8) from the front of
/// `bytes`.
///
/// # Errors
///
/// Returns [`Error::TruncatedField`] if `bytes` is shorter than `size`.
///
/// # Panics
///
/// Panics if `size` is not one of the supported widths.
pub fn read_int(endian: Endianness, bytes: &[u8], size: usize) -> Result<i64> {
    require(bytes, size)?;
    Ok(match size {
        1 => i64::from(bytes[0] as i8),
        2 => {
            let v = [bytes[0], bytes[1]];
            i64::from(match endian {
                Endianness::Little => i16::from_le_bytes(v),
                Endianness::Big => i16::from_be_bytes(v),
            })
        }
        4 => {
            let v: [u8; 4] = bytes[0..4].try_into().unwrap();
            i64::from(match endian {
                Endianness::Little => i32::from_le_bytes(v),
                Endianness::Big => i32::from_be_bytes(v),
            })
        }
        8 => {
            let v: [u8; 8] = bytes[0..8].try_into().unwrap();
            match endian {
                Endianness::Little => i64::from_le_bytes(v),
                Endianness::Big => i64::from_be_bytes(v),
            }
        }
        other => panic!("unsupported integer width {other}"),
    })
}

/// Reads an unsigned integer of `size` bytes the same way as [`read_int`].
///
/// # Errors
///
/// Returns [`Error::TruncatedField`] if `bytes` is shorter than `size`.
pub fn read_uint(endian: Endianness, bytes: &[u8], size: usize) -> Result<u64> {
    require(bytes, size)?;
    Ok(match size {
        1 => u64::from(bytes[0]),
        2 => {
            let v = [bytes[0], bytes[1]];
            u64::from(match endian {
                Endianness::Little => u16::from_le_bytes(v),
                Endianness::Big => u16::from_be_bytes(v),
            })
        }
        4 => {
            let v: [u8; 4] = bytes[0..4].try_into().unwrap();
            u64::from(match endian {
                Endianness::Little => u32::from_le_bytes(v),
                Endianness::Big => u32::from_be_bytes(v),
            })
        }
        8 => {
            let v: [u8; 8] = bytes[0..8].try_into().unwrap();
            match endian {
                Endianness::Little => u64::from_le_bytes(v),
                Endianness::Big => u64::from_be_bytes(v),
            }
        }
        other => panic!("unsupported integer width {other}"),
    })
}

/// Reads a full 8-byte IEEE-754 double.
///
/// # Errors
///
/// Returns [`Error::TruncatedField`] if `bytes` is shorter than 8 bytes.
pub fn read_double(endian: Endianness, bytes: &[u8]) -> Result<f64> {
    require(bytes, 8)?;
    let v: [u8; 8] = bytes[0..8].try_into().unwrap();
    Ok(match endian {
        Endianness::Little => f64::from_le_bytes(v),
        Endianness::Big => f64::from_be_bytes(v),
    })
}

/// Decodes `size` bytes as a fixed-width string, stripping trailing NULs and
/// outer whitespace.
///
/// Tries strict UTF-8 first (the common case, checked with `simdutf8` for
/// speed) and falls back to Windows-1252 for the legacy single-byte
/// codepages older SAS datasets were written in.
#[must_use]
pub fn read_string(bytes: &[u8]) -> String {
    let trimmed = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    };
    let decoded = match simdutf8::basic::from_utf8(trimmed) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (cow, _, _) = encoding_rs::WINDOWS_1252.decode(trimmed);
            cow.into_owned()
        }
    };
    decoded.trim().to_string()
}

/// Reads a short SAS numeric (1..=8 bytes), zero-padded to a full double:
/// on the low side for little-endian files, the high side for big-endian.
///
/// This is how SAS stores "shortened" doubles to save space.
///
/// # Errors
///
/// Returns [`Error::TruncatedField`] if `bytes` is shorter than `size`.
///
/// # Panics
///
/// Panics if `size` is zero or greater than 8.
pub fn read_numeric(endian: Endianness, bytes: &[u8], size: usize) -> Result<f64> {
    assert!(size >= 1 && size <= 8, "numeric width out of range: {size}");
    require(bytes, size)?;
    let mut buf = [0u8; 8];
    match endian {
        Endianness::Little => buf[8 - size..].copy_from_slice(&bytes[..size]),
        Endianness::Big => buf[..size].copy_from_slice(&bytes[..size]),
    }
    Ok(match endian {
        Endianness::Little => f64::from_le_bytes(buf),
        Endianness::Big => f64::from_be_bytes(buf),
    })
}

#[must_use]
pub fn sas_seconds_to_datetime(seconds: f64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::seconds_f64(seconds + SAS_EPOCH_OFFSET_SECONDS)
}

#[must_use]
pub fn sas_days_to_datetime(days: f64) -> OffsetDateTime {
    sas_seconds_to_datetime(days * 86_400.0)
}

#[must_use]
pub fn sas_seconds_to_time(seconds: f64) -> Duration {
    Duration::seconds_f64(seconds)
}

/// Detects SAS's NaN-as-missing sentinel for a raw double.
#[must_use]
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_int_little_endian() {
        assert_eq!(read_int(Endianness::Little, &[1, 0, 0, 0], 4).unwrap(), 1);
    }

    #[test]
    fn read_int_big_endian() {
        assert_eq!(read_int(Endianness::Big, &[0, 0, 0, 1], 4).unwrap(), 1);
    }

    #[test]
    fn read_int_rejects_short_slice() {
        let err = read_int(Endianness::Little, &[1, 0], 4).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedField { needed: 4, available: 2 }
        ));
    }

    #[test]
    fn read_numeric_pads_low_side_little_endian() {
        // 2-byte short double: bytes represent the high-order bytes of an
        // 8-byte little-endian double, so they land at the top of the buffer.
        let full = 1.0_f64.to_le_bytes();
        let short = &full[6..8];
        let v = read_numeric(Endianness::Little, short, 2).unwrap();
        let mut expect = [0u8; 8];
        expect[6..8].copy_from_slice(short);
        assert_eq!(v, f64::from_le_bytes(expect));
    }

    #[test]
    fn epoch_zero_is_1960_01_01() {
        let dt = sas_days_to_datetime(0.0);
        assert_eq!(dt.date().to_string(), "1960-01-01");
        let dt2 = sas_seconds_to_datetime(0.0);
        assert_eq!(dt2.date().to_string(), "1960-01-01");
        assert_eq!(dt2.time().to_string(), "0:00:00.0");
    }

    #[test]
    fn nan_is_missing() {
        assert!(is_missing(f64::NAN));
        assert!(!is_missing(1.0));
    }
}
