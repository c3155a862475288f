// Delivery Report - Core Library
// Exposes all modules for use in the CLI and tests

pub mod cache;
pub mod config;
pub mod currency;
pub mod deduplication;
pub mod error;
pub mod metrics;
pub mod order;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod schema;

// Re-export commonly used types
pub use cache::{content_hash, ParseCache};
pub use config::ReportConfig;
pub use currency::normalize_amount;
pub use deduplication::{collapse_ledger, LedgerRow, OrderKey, RowKind};
pub use error::{ConfigError, ErrorKind, ParseError};
pub use metrics::{
    aggregate, logical_orders, ChannelSeries, ChannelShare, DailyTrend, DateSpan, Metrics,
    PeakDay, StorePerformance, TopStore,
};
pub use order::{
    detect_channel, Channel, OrderRecord, OrderTable, Rejection, RowIssue, UNKNOWN_STORE,
};
pub use parser::{
    get_parser, parse_or_empty, parse_order_date, ChannelParser, DoorDashParser, GrubhubParser,
    OrderStatus, StatusClassifier, UberEatsParser,
};
pub use pipeline::{build_report, default_output_name, load_tables, ReportInputs, ReportOutput};
pub use report::{escape_html, render_placeholder, render_report, script_json};
pub use schema::{CanonicalField, ChannelSchema, ColumnMap, ColumnSpec};
