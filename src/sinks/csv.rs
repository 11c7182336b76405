use std::io::Write;

use csv::{ByteRecord, Writer, WriterBuilder};
use itoa::Buffer as ItoaBuffer;
use ryu::Buffer as RyuBuffer;
use time::{Duration, OffsetDateTime};

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::logger::log_info;
use crate::sinks::{RowSink, SinkContext};

/// Writes decoded rows to a delimited text file.
///
/// `step_size` mirrors the original converter's progress-reporting knob:
/// every `step_size`-th row, an info line with percent complete is logged.
/// A `step_size` of 0 disables progress reporting.
pub struct CsvSink<W: Write> {
    output: Option<W>,
    writer: Option<Writer<W>>,
    delimiter: u8,
    write_headers: bool,
    step_size: usize,
    total_rows: u64,
    column_count: usize,
    record: ByteRecord,
    scratch: Vec<Vec<u8>>,
    rows_written: u64,
}

impl<W: Write> CsvSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            output: Some(writer),
            writer: None,
            delimiter: b',',
            write_headers: true,
            step_size: 100_000,
            total_rows: 0,
            column_count: 0,
            record: ByteRecord::new(),
            scratch: Vec::new(),
            rows_written: 0,
        }
    }

    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn with_headers(mut self, headers: bool) -> Self {
        self.write_headers = headers;
        self
    }

    #[must_use]
    pub const fn with_step_size(mut self, step_size: usize) -> Self {
        self.step_size = step_size;
        self
    }

    /// Reclaims the underlying writer after [`RowSink::finish`] has flushed
    /// and released it.
    pub fn into_inner(mut self) -> Option<W> {
        self.output.take()
    }

    fn build_writer(&mut self) -> Result<()> {
        let output = self.output.take().ok_or_else(|| Error::SchemaInconsistent {
            path: std::path::PathBuf::new(),
            section: crate::error::Section::Header,
            details: "CSV sink output already taken".to_string(),
        })?;
        let writer = WriterBuilder::new().delimiter(self.delimiter).from_writer(output);
        self.writer = Some(writer);
        Ok(())
    }

    fn write_header_row(&mut self, context: &SinkContext<'_>) -> Result<()> {
        if !self.write_headers {
            return Ok(());
        }
        let mut header = ByteRecord::new();
        for column in &context.metadata.columns {
            header.push_field(column.name.trim_end().as_bytes());
        }
        let writer = self.writer.as_mut().expect("csv writer must be present");
        writer.write_byte_record(&header).map_err(csv_err)?;
        Ok(())
    }

    fn encode_cell(cell: &Cell, out: &mut Vec<u8>, ryu: &mut RyuBuffer, itoa: &mut ItoaBuffer) {
        out.clear();
        match cell {
            Cell::Missing => {}
            Cell::Double(v) => out.extend_from_slice(ryu.format(*v).as_bytes()),
            Cell::Integer(v) => out.extend_from_slice(itoa.format(*v).as_bytes()),
            Cell::String(s) => out.extend_from_slice(s.as_bytes()),
            Cell::DateTime(dt) => write_datetime(dt, out),
            Cell::Date(dt) => write_date(dt, out),
            Cell::Time(dur) => write_time(dur, out),
        }
    }
}

fn csv_err(e: csv::Error) -> Error {
    Error::SchemaInconsistent {
        path: std::path::PathBuf::new(),
        section: crate::error::Section::Row { index: 0 },
        details: format!("csv write failed: {e}"),
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn begin(&mut self, context: SinkContext<'_>) -> Result<()> {
        self.build_writer()?;
        self.column_count = context.metadata.column_count();
        self.total_rows = context.metadata.row_count;
        self.record = ByteRecord::with_capacity(self.column_count, 0);
        self.scratch = (0..self.column_count).map(|_| Vec::with_capacity(32)).collect();
        self.write_header_row(&context)?;
        Ok(())
    }

    fn write_row(&mut self, row: &[Cell]) -> Result<()> {
        if row.len() != self.column_count {
            return Err(Error::ColumnCountMismatch {
                path: std::path::PathBuf::new(),
                expected: self.column_count,
                actual: row.len(),
            });
        }
        self.record.clear();
        let mut ryu = RyuBuffer::new();
        let mut itoa = ItoaBuffer::new();
        for (idx, cell) in row.iter().enumerate() {
            let buf = &mut self.scratch[idx];
            Self::encode_cell(cell, buf, &mut ryu, &mut itoa);
            self.record.push_field(buf);
        }
        let writer = self.writer.as_mut().expect("csv writer must be present");
        writer.write_byte_record(&self.record).map_err(csv_err)?;

        self.rows_written += 1;
        if self.step_size > 0 && self.rows_written % self.step_size as u64 == 0 && self.total_rows > 0 {
            let percent = self.rows_written as f64 / self.total_rows as f64 * 100.0;
            log_info(&format!("{percent:.1}% complete"));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| Error::Io {
                path: std::path::PathBuf::new(),
                source,
            })?;
            let out = writer.into_inner().map_err(|e| Error::SchemaInconsistent {
                path: std::path::PathBuf::new(),
                section: crate::error::Section::Header,
                details: format!("csv into_inner failed: {e}"),
            })?;
            self.output = Some(out);
        }
        self.column_count = 0;
        self.scratch.clear();
        self.record.clear();
        Ok(())
    }
}

fn write_date(dt: &OffsetDateTime, out: &mut Vec<u8>) {
    out.extend_from_slice(dt.date().to_string().as_bytes());
}

fn write_datetime(dt: &OffsetDateTime, out: &mut Vec<u8>) {
    let date = dt.date();
    let time = dt.time();
    out.extend_from_slice(date.to_string().as_bytes());
    out.push(b' ');
    write_two(time.hour(), out);
    out.push(b':');
    write_two(time.minute(), out);
    out.push(b':');
    write_two(time.second(), out);
    let nanos = time.nanosecond();
    if nanos != 0 {
        out.push(b'.');
        write_three((nanos / 1_000_000) as u16, out);
    }
}

fn write_time(dur: &Duration, out: &mut Vec<u8>) {
    let total_seconds = dur.whole_seconds();
    let hours = total_seconds.div_euclid(3600);
    let minutes = (total_seconds - hours * 3600).div_euclid(60);
    let seconds = total_seconds - hours * 3600 - minutes * 60;
    write_two(hours as u8, out);
    out.push(b':');
    write_two(minutes as u8, out);
    out.push(b':');
    write_two(seconds as u8, out);

    let nanos = dur.subsec_nanoseconds();
    if nanos != 0 {
        out.push(b'.');
        write_three((nanos / 1_000_000).unsigned_abs() as u16, out);
    }
}

fn write_two(v: u8, out: &mut Vec<u8>) {
    out.push(b'0' + v / 10);
    out.push(b'0' + v % 10);
}

fn write_three(v: u16, out: &mut Vec<u8>) {
    out.push(b'0' + (v / 100) as u8);
    out.push(b'0' + ((v / 10) % 10) as u8);
    out.push(b'0' + (v % 10) as u8);
}
