//! Interprets a decoded row buffer as a list of typed cells (component C8).

use crate::cell::Cell;
use crate::error::Result;
use crate::metadata::{Column, Endianness, LogicalType};
use crate::parser::primitives::{
    is_missing, read_int, read_numeric, read_string, sas_days_to_datetime,
    sas_seconds_to_datetime, sas_seconds_to_time,
};

const TIME_FORMATS: &[&str] = &["TIME"];
const DATETIME_FORMATS: &[&str] = &["DATETIME"];
const DATE_FORMATS: &[&str] = &["YYMMDD", "MMDDYY", "DDMMYY", "DATE", "JULIAN", "MONYY"];

fn format_in(format: &str, set: &[&str]) -> bool {
    let upper = format.to_ascii_uppercase();
    set.iter().any(|candidate| upper.starts_with(candidate))
}

/// Projects `row` (a buffer at least `row_length` bytes long) into cells per
/// `columns`. Stops early — returning fewer than `columns.len()` cells — if
/// a zero-length column is encountered, per the trailing-column truncation
/// rule.
#[must_use]
pub fn project_row(row: &[u8], columns: &[Column], endian: Endianness) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(columns.len());
    for column in columns {
        let start = column.byte_offset as usize;
        let length = column.byte_length as usize;
        if length == 0 {
            break;
        }
        let Some(slice) = row.get(start..start + length) else {
            break;
        };

        let cell = match column.logical_type {
            LogicalType::Number => match project_number(slice, length, &column.format, endian) {
                Ok(cell) => cell,
                // A field too short for its own declared width truncates the
                // row the same way a zero-length column does.
                Err(_) => break,
            },
            LogicalType::String => Cell::String(read_string(slice)),
        };
        cells.push(cell);
    }
    cells
}

fn project_number(slice: &[u8], length: usize, format: &str, endian: Endianness) -> Result<Cell> {
    if length <= 2 {
        return Ok(Cell::Integer(read_int(endian, slice, 2)?));
    }

    let value = read_numeric(endian, slice, length.min(8))?;
    if is_missing(value) {
        return Ok(Cell::Missing);
    }
    Ok(if format_in(format, DATETIME_FORMATS) {
        Cell::DateTime(sas_seconds_to_datetime(value))
    } else if format_in(format, TIME_FORMATS) {
        Cell::Time(sas_seconds_to_time(value))
    } else if format_in(format, DATE_FORMATS) {
        Cell::Date(sas_days_to_datetime(value))
    } else {
        Cell::Double(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, format: &str, logical: LogicalType, offset: u64, len: u32) -> Column {
        Column {
            index: 0,
            name: name.to_string(),
            label: String::new(),
            format: format.to_string(),
            logical_type: logical,
            byte_length: len,
            byte_offset: offset,
        }
    }

    #[test]
    fn short_numeric_reads_as_integer() {
        let row = 7i16.to_le_bytes();
        let columns = vec![col("x", "", LogicalType::Number, 0, 2)];
        let cells = project_row(&row, &columns, Endianness::Little);
        assert_eq!(cells, vec![Cell::Integer(7)]);
    }

    #[test]
    fn date_format_decodes_epoch_zero() {
        let row = 0.0f64.to_le_bytes();
        let columns = vec![col("d", "DATE9.", LogicalType::Number, 0, 8)];
        let cells = project_row(&row, &columns, Endianness::Little);
        match &cells[0] {
            Cell::Date(dt) => assert_eq!(dt.date().to_string(), "1960-01-01"),
            other => panic!("expected Date, got {other:?}"),
        }
    }

    #[test]
    fn nan_double_is_missing() {
        let row = f64::NAN.to_le_bytes();
        let columns = vec![col("n", "", LogicalType::Number, 0, 8)];
        let cells = project_row(&row, &columns, Endianness::Little);
        assert_eq!(cells, vec![Cell::Missing]);
    }

    #[test]
    fn string_column_trims_trailing_nuls() {
        let row = b"hi\0\0";
        let columns = vec![col("s", "", LogicalType::String, 0, 4)];
        let cells = project_row(row, &columns, Endianness::Little);
        assert_eq!(cells, vec![Cell::String("hi".to_string())]);
    }

    #[test]
    fn zero_length_column_truncates_row() {
        let row = [0u8; 4];
        let columns = vec![
            col("a", "", LogicalType::String, 0, 0),
            col("b", "", LogicalType::String, 0, 4),
        ];
        let cells = project_row(&row, &columns, Endianness::Little);
        assert!(cells.is_empty());
    }
}
