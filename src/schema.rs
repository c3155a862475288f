// 📐 Column Schema - declared alias tables per channel
// Maps source headers (Chinese and English exports) onto canonical fields

use crate::error::ParseError;
use crate::order::Channel;
use std::collections::HashMap;

// ============================================================================
// CANONICAL FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Date,
    Amount,
    Status,
    Location,
    ExternalId,
}

impl CanonicalField {
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Amount => "amount",
            CanonicalField::Status => "status",
            CanonicalField::Location => "location",
            CanonicalField::ExternalId => "external_id",
        }
    }
}

/// One canonical field with its accepted source headers.
///
/// Precedence: the first alias in `aliases` that is present in the header
/// row wins, regardless of where the columns sit in the file.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub field: CanonicalField,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

/// Full schema for one channel's export
#[derive(Debug, Clone)]
pub struct ChannelSchema {
    pub channel: Channel,
    pub columns: Vec<ColumnSpec>,

    /// How many leading lines may precede the header row (0 = header on line 1)
    pub max_header_offset: usize,
}

const UBER_DATE: &[&str] = &["订单下单时的当地日期", "订单日期", "Order Date (Local)", "Order Date"];
const UBER_AMOUNT: &[&str] = &["销售额（含税）", "Sales (incl. tax)", "Sales (Incl. Tax)"];
const UBER_STATUS: &[&str] = &["订单状态", "Order Status"];
const UBER_LOCATION: &[&str] = &["餐厅名称", "Restaurant Name", "Store Name"];
const UBER_ID: &[&str] = &["订单号", "Order ID"];

const DOORDASH_DATE: &[&str] = &["接单当地时间", "Timestamp Local Time", "Order Placed Time"];
const DOORDASH_AMOUNT: &[&str] = &["小计", "Subtotal"];
const DOORDASH_STATUS: &[&str] = &["最终订单状态", "Final Order Status"];
const DOORDASH_LOCATION: &[&str] = &["店铺名称", "Store Name"];
const DOORDASH_ID: &[&str] = &["DoorDash 订单号", "DoorDash Order ID"];

const GRUBHUB_DATE: &[&str] = &["transaction_date"];
const GRUBHUB_AMOUNT: &[&str] = &["subtotal"];
const GRUBHUB_TYPE: &[&str] = &["transaction_type"];
const GRUBHUB_LOCATION: &[&str] = &["store_name"];
const GRUBHUB_ID: &[&str] = &["order_number"];

fn spec(field: CanonicalField, aliases: &'static [&'static str], required: bool) -> ColumnSpec {
    ColumnSpec { field, aliases, required }
}

impl ChannelSchema {
    pub fn for_channel(channel: Channel) -> Self {
        use CanonicalField::*;

        match channel {
            Channel::UberEats => ChannelSchema {
                channel,
                columns: vec![
                    spec(Date, UBER_DATE, true),
                    spec(Amount, UBER_AMOUNT, true),
                    spec(Status, UBER_STATUS, true),
                    spec(Location, UBER_LOCATION, false),
                    spec(ExternalId, UBER_ID, false),
                ],
                // Uber puts a title line above the header
                max_header_offset: 5,
            },
            Channel::DoorDash => ChannelSchema {
                channel,
                columns: vec![
                    spec(Date, DOORDASH_DATE, true),
                    spec(Amount, DOORDASH_AMOUNT, true),
                    spec(Status, DOORDASH_STATUS, true),
                    spec(Location, DOORDASH_LOCATION, false),
                    spec(ExternalId, DOORDASH_ID, false),
                ],
                max_header_offset: 0,
            },
            Channel::Grubhub => ChannelSchema {
                channel,
                columns: vec![
                    spec(Date, GRUBHUB_DATE, true),
                    spec(Amount, GRUBHUB_AMOUNT, true),
                    spec(Status, GRUBHUB_TYPE, true),
                    spec(Location, GRUBHUB_LOCATION, false),
                    spec(ExternalId, GRUBHUB_ID, false),
                ],
                max_header_offset: 0,
            },
        }
    }

    fn column(&self, field: CanonicalField) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Find the header row among the first `max_header_offset + 1` records.
    ///
    /// A row is the header when it contains any alias of the date column.
    pub fn locate_header(&self, records: &[csv::StringRecord]) -> Option<usize> {
        let anchors = self.column(CanonicalField::Date).map(|c| c.aliases).unwrap_or(&[]);

        records
            .iter()
            .take(self.max_header_offset + 1)
            .position(|record| {
                record
                    .iter()
                    .any(|cell| anchors.contains(&clean_header(cell).as_str()))
            })
    }

    /// Resolve the header row into column positions, once per file.
    pub fn resolve(&self, header: &csv::StringRecord) -> Result<ColumnMap, ParseError> {
        // First occurrence of a duplicated header wins
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (i, h) in header.iter().enumerate() {
            positions.entry(clean_header(h)).or_insert(i);
        }

        let mut resolved = HashMap::new();
        for column in &self.columns {
            let hit = column
                .aliases
                .iter()
                .find_map(|alias| positions.get(*alias).copied());

            match hit {
                Some(index) => {
                    resolved.insert(column.field, index);
                }
                None if column.required => {
                    return Err(ParseError::MissingColumn {
                        channel: self.channel,
                        field: column.field.name(),
                        accepted: column.aliases.join(", "),
                    });
                }
                None => {}
            }
        }

        Ok(ColumnMap { resolved })
    }
}

/// Trim whitespace and a UTF-8 BOM from a header cell
fn clean_header(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}').trim().to_string()
}

// ============================================================================
// COLUMN MAP
// ============================================================================

/// Resolved positions of canonical fields within one file
#[derive(Debug, Clone)]
pub struct ColumnMap {
    resolved: HashMap<CanonicalField, usize>,
}

impl ColumnMap {
    pub fn index(&self, field: CanonicalField) -> Option<usize> {
        self.resolved.get(&field).copied()
    }

    /// Trimmed cell for a field; empty when the column or cell is absent
    pub fn get<'r>(&self, record: &'r csv::StringRecord, field: CanonicalField) -> &'r str {
        self.index(field)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }
}
