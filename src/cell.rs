use time::{Duration, OffsetDateTime};

/// A single decoded table cell.
///
/// Every variant is owned: strings are decoded (and, for the Windows-1252
/// fallback path, re-encoded) into a fresh `String` rather than borrowed from
/// the row buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Integer(i64),
    Double(f64),
    String(String),
    Date(OffsetDateTime),
    Time(Duration),
    DateTime(OffsetDateTime),
}

impl Cell {
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}
