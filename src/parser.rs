// 🏗️ Parser Framework
// Polymorphic parser system for 3 delivery platforms

use crate::currency::normalize_amount;
use crate::deduplication::{collapse_ledger, LedgerRow, RowKind};
use crate::error::ParseError;
use crate::order::{Channel, OrderRecord, OrderTable, RowIssue};
use crate::schema::{CanonicalField, ChannelSchema, ColumnMap};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// CORE TRAITS
// ============================================================================

/// ChannelParser - Core trait (minimal, required)
///
/// Takes the raw bytes of one export and returns canonical orders, or a
/// typed error saying why the whole file was rejected. Row-level problems
/// (bad dates) never fail the file; they land in `OrderTable::skipped`.
pub trait ChannelParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<OrderTable, ParseError>;

    /// Get the channel this parser handles
    fn channel(&self) -> Channel;

    /// Read a file from disk and parse it
    fn parse_file(&self, file_path: &Path) -> Result<OrderTable> {
        let bytes = std::fs::read(file_path)
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;
        Ok(self.parse(&bytes)?)
    }
}

/// Terminal state of an order as reported by a status column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Completed,
    Cancelled,
    Other,
}

impl OrderStatus {
    pub fn flags(&self) -> (bool, bool) {
        match self {
            OrderStatus::Completed => (true, false),
            OrderStatus::Cancelled => (false, true),
            OrderStatus::Other => (false, false),
        }
    }
}

/// StatusClassifier - Map a platform's status vocabulary onto OrderStatus
pub trait StatusClassifier {
    fn classify_status(&self, status: &str) -> OrderStatus;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Get appropriate parser for a channel
pub fn get_parser(channel: Channel) -> Box<dyn ChannelParser> {
    match channel {
        Channel::UberEats => Box::new(UberEatsParser::new()),
        Channel::DoorDash => Box::new(DoorDashParser::new()),
        Channel::Grubhub => Box::new(GrubhubParser::new()),
    }
}

/// Parse, degrading any file-level failure to an empty table.
///
/// The error is logged and kept on the table as a `Rejection`, so callers
/// can still tell "no data" from "malformed schema".
pub fn parse_or_empty(parser: &dyn ChannelParser, bytes: &[u8]) -> OrderTable {
    match parser.parse(bytes) {
        Ok(table) => table,
        Err(e) => {
            warn!(channel = %parser.channel(), kind = ?e.kind(), "{}", e);
            OrderTable::rejected(&e)
        }
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Parse an export's date cell, keeping only the calendar date.
///
/// Accepts ISO, RFC 3339, slash-separated US and ISO dates, 12h clock
/// variants and the Chinese `YYYY年MM月DD日` form.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    const DATETIME_FORMATS: [&str; 11] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %I:%M %p",
        "%m/%d/%Y %I:%M:%S %p",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y年%m月%d日"];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Header-resolved data rows of one export, with their source line numbers
struct PreparedInput {
    columns: ColumnMap,
    rows: Vec<(usize, csv::StringRecord)>,
}

fn prepare(schema: &ChannelSchema, bytes: &[u8]) -> Result<PreparedInput, ParseError> {
    let channel = schema.channel;

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|source| ParseError::Decode { channel, source })?;

    if text.trim().is_empty() {
        return Err(ParseError::EmptyInput {
            channel,
            reason: "file is empty",
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| ParseError::Csv { channel, source })?;
        records.push(record);
    }

    let header_at = schema.locate_header(&records).ok_or_else(|| {
        // No row carries a date header: report the date column as missing
        let date = &schema.columns[0];
        ParseError::MissingColumn {
            channel,
            field: date.field.name(),
            accepted: date.aliases.join(", "),
        }
    })?;

    let columns = schema.resolve(&records[header_at])?;

    let rows: Vec<(usize, csv::StringRecord)> = records
        .into_iter()
        .enumerate()
        .skip(header_at + 1)
        .filter(|(_, r)| r.iter().any(|cell| !cell.trim().is_empty()))
        .map(|(i, r)| {
            let line = r.position().map(|p| p.line() as usize).unwrap_or(i + 1);
            (line, r)
        })
        .collect();

    if rows.is_empty() {
        return Err(ParseError::EmptyInput {
            channel,
            reason: "no data rows after header",
        });
    }

    debug!(channel = %channel, header_line = header_at + 1, rows = rows.len(), "header resolved");

    Ok(PreparedInput { columns, rows })
}

/// Date cell of a row, or a RowIssue describing why it was dropped
fn row_date(columns: &ColumnMap, line: usize, record: &csv::StringRecord) -> Result<NaiveDate, RowIssue> {
    let raw = columns.get(record, CanonicalField::Date);
    parse_order_date(raw).ok_or_else(|| RowIssue {
        line_number: line,
        message: format!("unparseable date '{}'", raw),
    })
}

/// Reject a file whose every row lost its date; otherwise log what was dropped
fn finish(table: OrderTable, channel: Channel, data_rows: usize) -> Result<OrderTable, ParseError> {
    if table.orders.is_empty() && table.skipped.len() == data_rows {
        return Err(ParseError::DateParseFailure {
            channel,
            rows: data_rows,
        });
    }

    if !table.skipped.is_empty() {
        warn!(
            channel = %channel,
            dropped = table.skipped.len(),
            first_line = table.skipped[0].line_number,
            "rows dropped for unparseable dates"
        );
    }
    debug!(channel = %channel, orders = table.orders.len(), "parsed");

    Ok(table)
}

/// Shared body of the one-row-per-order parsers
fn parse_single_row_orders<P>(parser: &P, bytes: &[u8]) -> Result<OrderTable, ParseError>
where
    P: ChannelParser + StatusClassifier,
{
    let channel = parser.channel();
    let schema = ChannelSchema::for_channel(channel);
    let input = prepare(&schema, bytes)?;
    let columns = &input.columns;

    let mut table = OrderTable::new(channel);
    for (line, record) in &input.rows {
        let date = match row_date(columns, *line, record) {
            Ok(d) => d,
            Err(issue) => {
                table.skipped.push(issue);
                continue;
            }
        };

        let amount = normalize_amount(columns.get(record, CanonicalField::Amount));
        let (completed, cancelled) = parser
            .classify_status(columns.get(record, CanonicalField::Status))
            .flags();

        let order = OrderRecord::new(date, amount, channel, *line)
            .with_location(columns.get(record, CanonicalField::Location))
            .with_external_id(columns.get(record, CanonicalField::ExternalId))
            .with_status(completed, cancelled);

        table.orders.push(order);
    }

    finish(table, channel, input.rows.len())
}

// ============================================================================
// PARSERS
// ============================================================================

/// Uber Eats Parser (channel A)
///
/// Export has a title line above the header and Chinese or English headers.
pub struct UberEatsParser;

impl UberEatsParser {
    pub fn new() -> Self {
        UberEatsParser
    }
}

impl Default for UberEatsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelParser for UberEatsParser {
    fn parse(&self, bytes: &[u8]) -> Result<OrderTable, ParseError> {
        parse_single_row_orders(self, bytes)
    }

    fn channel(&self) -> Channel {
        Channel::UberEats
    }
}

impl StatusClassifier for UberEatsParser {
    fn classify_status(&self, status: &str) -> OrderStatus {
        match status.trim().to_lowercase().as_str() {
            "已完成" | "completed" => OrderStatus::Completed,
            "已取消" | "退款" | "未完成" | "cancelled" | "canceled" | "refunded" | "incomplete" => {
                OrderStatus::Cancelled
            }
            _ => OrderStatus::Other,
        }
    }
}

/// DoorDash Parser (channel B)
pub struct DoorDashParser;

impl DoorDashParser {
    pub fn new() -> Self {
        DoorDashParser
    }
}

impl Default for DoorDashParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelParser for DoorDashParser {
    fn parse(&self, bytes: &[u8]) -> Result<OrderTable, ParseError> {
        parse_single_row_orders(self, bytes)
    }

    fn channel(&self) -> Channel {
        Channel::DoorDash
    }
}

impl StatusClassifier for DoorDashParser {
    fn classify_status(&self, status: &str) -> OrderStatus {
        // "Merchant Cancelled", "MERCHANT_CANCELLED", "merchant  cancelled"
        let normalized = status
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        match normalized.as_str() {
            "delivered" => OrderStatus::Completed,
            "cancelled" | "canceled" | "merchant cancelled" | "merchant canceled" => {
                OrderStatus::Cancelled
            }
            _ => OrderStatus::Other,
        }
    }
}

/// Grubhub Parser (channel C)
///
/// One order spans several ledger rows; rows are collapsed by order number.
pub struct GrubhubParser;

impl GrubhubParser {
    pub fn new() -> Self {
        GrubhubParser
    }
}

impl Default for GrubhubParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelParser for GrubhubParser {
    fn parse(&self, bytes: &[u8]) -> Result<OrderTable, ParseError> {
        let channel = self.channel();
        let schema = ChannelSchema::for_channel(channel);
        let input = prepare(&schema, bytes)?;
        let columns = &input.columns;

        let mut table = OrderTable::new(channel);
        let mut ledger = Vec::with_capacity(input.rows.len());

        for (line, record) in &input.rows {
            let date = match row_date(columns, *line, record) {
                Ok(d) => d,
                Err(issue) => {
                    table.skipped.push(issue);
                    continue;
                }
            };

            let id = columns.get(record, CanonicalField::ExternalId);
            ledger.push(LedgerRow {
                date,
                amount: normalize_amount(columns.get(record, CanonicalField::Amount)),
                location: columns.get(record, CanonicalField::Location).to_string(),
                kind: RowKind::classify(columns.get(record, CanonicalField::Status)),
                external_id: if id.is_empty() { None } else { Some(id.to_string()) },
                line_number: *line,
            });
        }

        let rows = ledger.len();
        table.orders = collapse_ledger(channel, ledger);
        debug!(channel = %channel, rows, orders = table.orders.len(), "ledger collapsed");

        finish(table, channel, input.rows.len())
    }

    fn channel(&self) -> Channel {
        Channel::Grubhub
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_get_parser_channels() {
        for channel in Channel::ALL {
            assert_eq!(get_parser(channel).channel(), channel);
        }
    }

    #[test]
    fn test_parse_order_date_formats() {
        assert_eq!(parse_order_date("2025-03-01"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("2025-03-01 18:22:05"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("2025-03-01T18:22:05Z"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("2025/03/01 09:15"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("03/01/2025"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("3/1/2025 7:05 PM"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("2025年03月01日"), Some(date(2025, 3, 1)));
        assert_eq!(parse_order_date("yesterday"), None);
        assert_eq!(parse_order_date(""), None);
    }

    #[test]
    fn test_uber_parser_header_offset_and_status() {
        let csv = "Uber Eats Orders Report\n\
                   订单号,订单下单时的当地日期,餐厅名称,销售额（含税）,订单状态\n\
                   U-1,2025-03-01,Luckin Coffee Broadway,$12.50,已完成\n\
                   U-2,2025-03-01,Luckin Coffee Broadway,$8.00,已取消\n\
                   U-3,2025-03-02,,\"$1,004.25\",退款\n";

        let table = UberEatsParser::new().parse(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.orders[0].completed);
        assert!(table.orders[1].cancelled);
        assert!(table.orders[2].cancelled);
        assert_eq!(table.orders[2].amount, 1004.25);
        assert_eq!(table.orders[2].location, "Unknown Store");
        assert_eq!(table.orders[0].external_id.as_deref(), Some("U-1"));
        assert_eq!(table.orders[0].line_number, 3);
    }

    #[test]
    fn test_uber_parser_english_headers_without_title() {
        let csv = "Order ID,Order Date,Restaurant Name,Sales (incl. tax),Order Status\n\
                   U-1,03/05/2025,Midtown,4.50,Completed\n";

        let table = UberEatsParser::new().parse(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.orders[0].date, date(2025, 3, 5));
        assert!(table.orders[0].completed);
    }

    #[test]
    fn test_uber_status_vocabulary() {
        let p = UberEatsParser::new();
        assert_eq!(p.classify_status("已完成"), OrderStatus::Completed);
        assert_eq!(p.classify_status("未完成"), OrderStatus::Cancelled);
        assert_eq!(p.classify_status(" Refunded "), OrderStatus::Cancelled);
        assert_eq!(p.classify_status("配送中"), OrderStatus::Other);
    }

    #[test]
    fn test_doordash_parser() {
        let csv = "DoorDash 订单号,接单当地时间,店铺名称,小计,最终订单状态\n\
                   D-1,2025-03-01 11:00:00,Luckin Coffee Midtown,6.25,Delivered\n\
                   D-2,2025-03-01 12:00:00,Luckin Coffee Midtown,7.00,Merchant Cancelled\n\
                   D-3,not a date,Luckin Coffee Midtown,7.00,Delivered\n";

        let table = DoorDashParser::new().parse(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.orders[0].completed);
        assert!(table.orders[1].cancelled);
        assert_eq!(table.skipped.len(), 1);
        assert_eq!(table.skipped[0].line_number, 4);
    }

    #[test]
    fn test_doordash_header_must_be_first_line() {
        let csv = "export title\n接单当地时间,小计,最终订单状态\n2025-03-01,1,Delivered\n";

        let err = DoorDashParser::new().parse(csv.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingColumn);
    }

    #[test]
    fn test_doordash_status_vocabulary() {
        let p = DoorDashParser::new();
        assert_eq!(p.classify_status("MERCHANT_CANCELLED"), OrderStatus::Cancelled);
        assert_eq!(p.classify_status("delivered"), OrderStatus::Completed);
        assert_eq!(p.classify_status("Picked Up"), OrderStatus::Other);
    }

    #[test]
    fn test_grubhub_parser_collapses_rows() {
        let csv = "order_number,transaction_date,transaction_type,store_name,subtotal\n\
                   G-1,2025-03-02,Prepaid Order,Luckin Coffee Soho,$20.00\n\
                   G-1,2025-03-02,Sales Tax,Luckin Coffee Soho,$1.78\n\
                   G-1,2025-03-03,Refund,Luckin Coffee Soho,($20.00)\n\
                   G-2,2025-03-02,Prepaid Order,Luckin Coffee Soho,$9.00\n\
                   ,,Prepaid Order,Luckin Coffee Soho,$3.00\n";

        let table = GrubhubParser::new().parse(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let g1 = &table.orders[0];
        assert_eq!(g1.external_id.as_deref(), Some("G-1"));
        assert!(g1.cancelled);
        assert!(!g1.completed);

        let g2 = &table.orders[1];
        assert!(g2.completed);
        assert_eq!(g2.amount, 9.0);
        assert_eq!(table.skipped.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let err = GrubhubParser::new().parse(b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);

        let header_only = "transaction_date,subtotal,transaction_type\n";
        let err = GrubhubParser::new().parse(header_only.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn test_all_dates_bad_is_date_failure() {
        let csv = "transaction_date,subtotal,transaction_type\nxx,1,Prepaid Order\nyy,2,Prepaid Order\n";
        let err = GrubhubParser::new().parse(csv.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DateParseFailure);
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let bytes = [0xff, 0xfe, b'a', b',', b'b'];
        let err = DoorDashParser::new().parse(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_bom_is_stripped() {
        let csv = "\u{feff}transaction_date,subtotal,transaction_type\n2025-03-01,2.00,Prepaid Order\n";
        let table = GrubhubParser::new().parse(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_or_empty_swallows_errors() {
        let parser = UberEatsParser::new();
        let table = parse_or_empty(&parser, b"garbage,without,headers\n1,2,3\n");
        assert!(table.is_empty());
        assert_eq!(table.channel, Channel::UberEats);
        assert_eq!(table.error_kind(), Some(ErrorKind::MissingColumn));
        assert!(table.rejection.unwrap().message.contains("Uber Eats"));

        let empty = parse_or_empty(&parser, b"");
        assert_eq!(empty.error_kind(), Some(ErrorKind::EmptyInput));
    }

    #[test]
    fn test_parsed_table_is_not_rejected() {
        let csv = "transaction_date,subtotal,transaction_type\n2025-03-01,2.00,Prepaid Order\n";
        let table = parse_or_empty(&GrubhubParser::new(), csv.as_bytes());
        assert!(!table.is_rejected());
        assert_eq!(table.error_kind(), None);
    }

    #[test]
    fn test_parse_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Subtotal,Timestamp Local Time,Final Order Status\n$4.50,2025-03-02 08:00:00,Delivered\n").unwrap();

        let table = DoorDashParser::new().parse_file(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(DoorDashParser::new().parse_file(Path::new("/nonexistent/dd.csv")).is_err());
    }
}
