// Order model shared by parsers, aggregator and renderer

use crate::error::{ErrorKind, ParseError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// CHANNEL
// ============================================================================

/// Channel - Which delivery platform an order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    UberEats,
    DoorDash,
    Grubhub,
}

impl Channel {
    /// All channels in report order
    pub const ALL: [Channel; 3] = [Channel::UberEats, Channel::DoorDash, Channel::Grubhub];

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            Channel::UberEats => "Uber Eats",
            Channel::DoorDash => "DoorDash",
            Channel::Grubhub => "Grubhub",
        }
    }

    /// Short code for internal use
    pub fn code(&self) -> &'static str {
        match self {
            Channel::UberEats => "uber",
            Channel::DoorDash => "doordash",
            Channel::Grubhub => "grubhub",
        }
    }

    /// Brand colour used by the charts
    pub fn color(&self) -> &'static str {
        match self {
            Channel::UberEats => "#06C167",
            Channel::DoorDash => "#FF3008",
            Channel::Grubhub => "#FF8000",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect channel from an export's filename
///
/// Strategy: case-insensitive substring match on the file name.
///
/// ```
/// use delivery_report::{detect_channel, Channel};
/// use std::path::Path;
///
/// assert_eq!(detect_channel(Path::new("uber_eats_march.csv")), Some(Channel::UberEats));
/// assert_eq!(detect_channel(Path::new("report.csv")), None);
/// ```
pub fn detect_channel(file_path: &Path) -> Option<Channel> {
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if filename.contains("uber") {
        return Some(Channel::UberEats);
    }

    if filename.contains("doordash") || filename.contains("door_dash") || filename.starts_with("dd_") {
        return Some(Channel::DoorDash);
    }

    if filename.contains("grubhub") || filename.starts_with("gh_") {
        return Some(Channel::Grubhub);
    }

    None
}

// ============================================================================
// ORDER RECORD
// ============================================================================

/// Location label used when the export leaves the store column blank
pub const UNKNOWN_STORE: &str = "Unknown Store";

/// OrderRecord - One logical order in canonical shape
///
/// Immutable once a parser emits it. For Grubhub this is already the
/// collapse of every row sharing the same order number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub date: NaiveDate,
    pub amount: f64,
    pub location: String,
    pub channel: Channel,
    pub completed: bool,
    pub cancelled: bool,
    pub external_id: Option<String>,

    /// 1-based line of the first source row
    pub line_number: usize,
}

impl OrderRecord {
    pub fn new(date: NaiveDate, amount: f64, channel: Channel, line_number: usize) -> Self {
        OrderRecord {
            date,
            amount,
            location: UNKNOWN_STORE.to_string(),
            channel,
            completed: false,
            cancelled: false,
            external_id: None,
            line_number,
        }
    }

    /// Builder pattern: set location (blank keeps the default)
    pub fn with_location(mut self, location: &str) -> Self {
        let location = location.trim();
        if !location.is_empty() {
            self.location = location.to_string();
        }
        self
    }

    /// Builder pattern: set status flags
    pub fn with_status(mut self, completed: bool, cancelled: bool) -> Self {
        self.completed = completed;
        self.cancelled = cancelled;
        self
    }

    /// Builder pattern: set external order id (blank means none)
    pub fn with_external_id(mut self, id: &str) -> Self {
        let id = id.trim();
        self.external_id = if id.is_empty() { None } else { Some(id.to_string()) };
        self
    }
}

// ============================================================================
// ORDER TABLE
// ============================================================================

/// A row the parser had to drop, kept so callers can report it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub line_number: usize,
    pub message: String,
}

/// Why a whole export was turned into an empty table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ParseError> for Rejection {
    fn from(err: &ParseError) -> Self {
        Rejection {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// OrderTable - Output of one parser run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTable {
    pub channel: Channel,
    pub orders: Vec<OrderRecord>,
    pub skipped: Vec<RowIssue>,
    /// Set when the export was rejected as a whole
    pub rejection: Option<Rejection>,
}

impl OrderTable {
    pub fn new(channel: Channel) -> Self {
        OrderTable {
            channel,
            orders: Vec::new(),
            skipped: Vec::new(),
            rejection: None,
        }
    }

    /// Empty table standing in for an export that failed to parse
    pub fn rejected(err: &ParseError) -> Self {
        OrderTable {
            rejection: Some(Rejection::from(err)),
            ..OrderTable::new(err.channel())
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.rejection.as_ref().map(|r| r.kind)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Merge several tables into one order list, sorted by date
    pub fn merge<'a, I>(tables: I) -> Vec<OrderRecord>
    where
        I: IntoIterator<Item = &'a OrderTable>,
    {
        let mut merged: Vec<OrderRecord> = tables
            .into_iter()
            .flat_map(|t| t.orders.iter().cloned())
            .collect();
        merged.sort_by_key(|o| o.date);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::UberEats.name(), "Uber Eats");
        assert_eq!(Channel::DoorDash.name(), "DoorDash");
        assert_eq!(Channel::Grubhub.name(), "Grubhub");
    }

    #[test]
    fn test_detect_channel() {
        assert_eq!(detect_channel(Path::new("Uber_Eats_Orders.csv")), Some(Channel::UberEats));
        assert_eq!(detect_channel(Path::new("/tmp/doordash-march.csv")), Some(Channel::DoorDash));
        assert_eq!(detect_channel(Path::new("dd_export.csv")), Some(Channel::DoorDash));
        assert_eq!(detect_channel(Path::new("GRUBHUB.csv")), Some(Channel::Grubhub));
        assert_eq!(detect_channel(Path::new("unknown.csv")), None);
    }

    #[test]
    fn test_order_builder_defaults() {
        let order = OrderRecord::new(day(1), 9.5, Channel::DoorDash, 2)
            .with_location("   ")
            .with_external_id("")
            .with_status(true, false);

        assert_eq!(order.location, UNKNOWN_STORE);
        assert_eq!(order.external_id, None);
        assert!(order.completed);
        assert!(!order.cancelled);
    }

    #[test]
    fn test_merge_sorts_by_date() {
        let mut a = OrderTable::new(Channel::UberEats);
        a.orders.push(OrderRecord::new(day(5), 1.0, Channel::UberEats, 2));
        let mut b = OrderTable::new(Channel::Grubhub);
        b.orders.push(OrderRecord::new(day(2), 2.0, Channel::Grubhub, 2));

        let merged = OrderTable::merge([&a, &b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].date, day(2));
        assert_eq!(merged[1].date, day(5));
    }
}
