// 🔍 Order Reconciliation - one logical order per external id
// Grubhub exports itemization, tax, adjustment and refund lines as separate
// rows sharing an order number; counting rows over-counts orders.

use crate::order::{Channel, OrderRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// ORDER KEY
// ============================================================================

/// Identity of a logical order.
///
/// Orders carrying an external id are identified by it; the rest fall back
/// to their source line, so each such row stays its own order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderKey {
    External(Channel, String),
    Line(Channel, usize),
}

impl OrderKey {
    pub fn of(order: &OrderRecord) -> Self {
        match &order.external_id {
            Some(id) => OrderKey::External(order.channel, id.clone()),
            None => OrderKey::Line(order.channel, order.line_number),
        }
    }
}

// ============================================================================
// ROW CLASSIFICATION
// ============================================================================

/// What a single Grubhub transaction row represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    /// The paid order itself ("Prepaid Order", "Order", ...)
    PrimaryOrder,
    /// Cancellation or refund of an order
    Cancellation,
    /// Price adjustment; neither completes nor cancels
    Adjustment,
    /// Tax lines, fees, anything else
    Other,
}

impl RowKind {
    pub fn classify(transaction_type: &str) -> Self {
        let t = transaction_type.to_lowercase();

        // Cancellation first: "Order Cancellation" must not read as an order
        if t.contains("cancel") || t.contains("refund") {
            return RowKind::Cancellation;
        }

        if t.contains("adjust") {
            return RowKind::Adjustment;
        }

        if t.contains("order") {
            return RowKind::PrimaryOrder;
        }

        RowKind::Other
    }
}

/// One parsed Grubhub row before collapsing
#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub amount: f64,
    pub location: String,
    pub kind: RowKind,
    pub external_id: Option<String>,
    pub line_number: usize,
}

// ============================================================================
// COLLAPSE
// ============================================================================

/// Collapse ledger rows into logical orders.
///
/// Per order: amount = sum of primary rows, date = earliest row, location =
/// first non-empty, cancelled = any cancellation row, completed = any
/// primary row and not cancelled. Output keeps first-seen order.
pub fn collapse_ledger(channel: Channel, rows: Vec<LedgerRow>) -> Vec<OrderRecord> {
    let mut index: HashMap<OrderKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<LedgerRow>> = Vec::new();

    for row in rows {
        let key = match &row.external_id {
            Some(id) => OrderKey::External(channel, id.clone()),
            None => OrderKey::Line(channel, row.line_number),
        };

        match index.get(&key) {
            Some(&slot) => groups[slot].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }

    groups
        .into_iter()
        .map(|group| collapse_group(channel, group))
        .collect()
}

fn collapse_group(channel: Channel, group: Vec<LedgerRow>) -> OrderRecord {
    let has_primary = group.iter().any(|r| r.kind == RowKind::PrimaryOrder);
    let cancelled = group.iter().any(|r| r.kind == RowKind::Cancellation);

    let amount: f64 = group
        .iter()
        .filter(|r| r.kind == RowKind::PrimaryOrder)
        .map(|r| r.amount)
        .sum();

    // Groups are never empty
    let first = &group[0];
    let date = group.iter().map(|r| r.date).min().unwrap_or(first.date);
    let location = group
        .iter()
        .map(|r| r.location.as_str())
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    let mut order = OrderRecord::new(date, amount, channel, first.line_number)
        .with_location(location)
        .with_status(has_primary && !cancelled, cancelled);
    order.external_id = first.external_id.clone();
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Option<&str>, kind: RowKind, amount: f64, day: u32, line: usize) -> LedgerRow {
        LedgerRow {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            amount,
            location: String::new(),
            kind,
            external_id: id.map(|s| s.to_string()),
            line_number: line,
        }
    }

    #[test]
    fn test_classify_transaction_types() {
        assert_eq!(RowKind::classify("Prepaid Order"), RowKind::PrimaryOrder);
        assert_eq!(RowKind::classify("ORDER"), RowKind::PrimaryOrder);
        assert_eq!(RowKind::classify("Refund"), RowKind::Cancellation);
        assert_eq!(RowKind::classify("Order Cancellation"), RowKind::Cancellation);
        assert_eq!(RowKind::classify("Order Adjustment"), RowKind::Adjustment);
        assert_eq!(RowKind::classify("Sales Tax"), RowKind::Other);
    }

    #[test]
    fn test_refunded_order_collapses_to_one_cancelled() {
        let rows = vec![
            row(Some("G-1"), RowKind::PrimaryOrder, 20.0, 3, 2),
            row(Some("G-1"), RowKind::Other, 1.8, 3, 3),
            row(Some("G-1"), RowKind::Cancellation, -20.0, 4, 4),
        ];

        let orders = collapse_ledger(Channel::Grubhub, rows);
        assert_eq!(orders.len(), 1);
        assert!(orders[0].cancelled);
        assert!(!orders[0].completed);
        assert_eq!(orders[0].date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(orders[0].line_number, 2);
    }

    #[test]
    fn test_adjustment_does_not_cancel() {
        let rows = vec![
            row(Some("G-2"), RowKind::PrimaryOrder, 15.0, 5, 2),
            row(Some("G-2"), RowKind::Adjustment, -2.0, 5, 3),
        ];

        let orders = collapse_ledger(Channel::Grubhub, rows);
        assert_eq!(orders.len(), 1);
        assert!(orders[0].completed);
        assert_eq!(orders[0].amount, 15.0);
    }

    #[test]
    fn test_rows_without_id_stay_separate() {
        let rows = vec![
            row(None, RowKind::PrimaryOrder, 5.0, 1, 2),
            row(None, RowKind::PrimaryOrder, 6.0, 1, 3),
        ];

        let orders = collapse_ledger(Channel::Grubhub, rows);
        assert_eq!(orders.len(), 2);
        assert_eq!(OrderKey::of(&orders[0]), OrderKey::Line(Channel::Grubhub, 2));
    }

    #[test]
    fn test_order_key_uses_external_id() {
        let orders = collapse_ledger(
            Channel::Grubhub,
            vec![row(Some("G-9"), RowKind::PrimaryOrder, 1.0, 1, 7)],
        );
        assert_eq!(
            OrderKey::of(&orders[0]),
            OrderKey::External(Channel::Grubhub, "G-9".to_string())
        );
    }
}
