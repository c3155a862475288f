// 📊 Aggregator - Orders -> Metrics
//
// Everything is computed over LOGICAL orders: records sharing an OrderKey
// are merged first, so a repeated external id never counts twice.

use crate::deduplication::OrderKey;
use crate::order::{Channel, OrderRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Number of calendar days, both ends included
    pub fn days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.days())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDay {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeries {
    pub channel: Channel,
    pub counts: Vec<usize>,
}

/// Completed orders per day per channel over the full observed span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub dates: Vec<NaiveDate>,
    pub series: Vec<ChannelSeries>,
}

impl DailyTrend {
    pub fn series_for(&self, channel: Channel) -> Option<&ChannelSeries> {
        self.series.iter().find(|s| s.channel == channel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelShare {
    pub channel: Channel,
    pub orders: usize,
    pub revenue: f64,
    /// Percent of total GMV
    pub revenue_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePerformance {
    pub store: String,
    pub revenue: f64,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopStore {
    pub store: String,
    pub revenue: f64,
    /// Percent of total GMV
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Distinct completed orders
    pub total_orders: usize,
    /// Distinct cancelled or refunded orders
    pub cancelled_orders: usize,
    /// Distinct orders of any state
    pub distinct_orders: usize,

    pub total_gmv: f64,
    pub avg_ticket: f64,
    pub avg_daily_orders: f64,

    /// Percent in [0, 100]
    pub cancel_rate: f64,

    pub date_span: Option<DateSpan>,
    pub peak_day: Option<PeakDay>,
    pub daily_trend: DailyTrend,
    pub channel_shares: Vec<ChannelShare>,

    /// Sorted by revenue ascending (bar chart order)
    pub store_performance: Vec<StorePerformance>,
    pub top_store: Option<TopStore>,
}

impl Metrics {
    /// True when no order survived parsing
    pub fn is_empty(&self) -> bool {
        self.distinct_orders == 0
    }

    pub fn channel_share(&self, channel: Channel) -> Option<&ChannelShare> {
        self.channel_shares.iter().find(|s| s.channel == channel)
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Merge records that share an OrderKey.
///
/// The earliest-dated record supplies date, amount and location (first
/// seen on a tie), so the result does not depend on input order. Cancelled
/// if any record is; completed if any record is and none cancelled.
/// Output keeps first-seen order.
pub fn logical_orders(orders: &[OrderRecord]) -> Vec<OrderRecord> {
    let mut index: HashMap<OrderKey, usize> = HashMap::new();
    let mut merged: Vec<OrderRecord> = Vec::new();

    for order in orders {
        match index.get(&OrderKey::of(order)) {
            Some(&slot) => {
                let existing = &mut merged[slot];
                if order.date < existing.date {
                    existing.date = order.date;
                    existing.amount = order.amount;
                    existing.location = order.location.clone();
                }
                existing.cancelled |= order.cancelled;
                existing.completed = (existing.completed || order.completed) && !existing.cancelled;
            }
            None => {
                index.insert(OrderKey::of(order), merged.len());
                merged.push(order.clone());
            }
        }
    }

    merged
}

/// Orders -> Metrics. Pure; empty input gives zeroed metrics.
pub fn aggregate(orders: &[OrderRecord]) -> Metrics {
    let orders = logical_orders(orders);
    let completed: Vec<&OrderRecord> = orders.iter().filter(|o| o.completed).collect();

    let distinct_orders = orders.len();
    let cancelled_orders = orders.iter().filter(|o| o.cancelled).count();
    let total_orders = completed.len();
    let total_gmv: f64 = completed.iter().map(|o| o.amount).sum();

    let avg_ticket = if total_orders > 0 {
        total_gmv / total_orders as f64
    } else {
        0.0
    };

    let cancel_rate = if distinct_orders > 0 {
        cancelled_orders as f64 / distinct_orders as f64 * 100.0
    } else {
        0.0
    };

    let date_span = match (
        orders.iter().map(|o| o.date).min(),
        orders.iter().map(|o| o.date).max(),
    ) {
        (Some(start), Some(end)) => Some(DateSpan { start, end }),
        _ => None,
    };

    let avg_daily_orders = match date_span {
        Some(span) => total_orders as f64 / span.days() as f64,
        None => 0.0,
    };

    Metrics {
        total_orders,
        cancelled_orders,
        distinct_orders,
        total_gmv,
        avg_ticket,
        avg_daily_orders,
        cancel_rate,
        date_span,
        peak_day: peak_day(&completed),
        daily_trend: daily_trend(&completed, date_span),
        channel_shares: channel_shares(&completed, total_gmv),
        store_performance: store_performance(&completed),
        top_store: top_store(&completed, total_gmv),
    }
}

/// Highest summed revenue; ties go to the earliest date
fn peak_day(completed: &[&OrderRecord]) -> Option<PeakDay> {
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for order in completed {
        let entry = by_day.entry(order.date).or_insert((0.0, 0));
        entry.0 += order.amount;
        entry.1 += 1;
    }

    let mut best: Option<PeakDay> = None;
    for (date, (revenue, orders)) in by_day {
        let better = match &best {
            Some(b) => revenue > b.revenue,
            None => true,
        };
        if better {
            best = Some(PeakDay { date, revenue, orders });
        }
    }
    best
}

fn daily_trend(completed: &[&OrderRecord], span: Option<DateSpan>) -> DailyTrend {
    let span = match span {
        Some(s) => s,
        None => return DailyTrend::default(),
    };

    let dates: Vec<NaiveDate> = span.iter_days().collect();
    let series = Channel::ALL
        .iter()
        .map(|&channel| {
            let mut counts = vec![0usize; dates.len()];
            for order in completed.iter().filter(|o| o.channel == channel) {
                let offset = (order.date - span.start).num_days() as usize;
                counts[offset] += 1;
            }
            ChannelSeries { channel, counts }
        })
        .collect();

    DailyTrend { dates, series }
}

fn channel_shares(completed: &[&OrderRecord], total_gmv: f64) -> Vec<ChannelShare> {
    Channel::ALL
        .iter()
        .map(|&channel| {
            let mine: Vec<&&OrderRecord> = completed.iter().filter(|o| o.channel == channel).collect();
            let revenue: f64 = mine.iter().map(|o| o.amount).sum();
            ChannelShare {
                channel,
                orders: mine.len(),
                revenue,
                revenue_share: percent_of(revenue, total_gmv),
            }
        })
        .collect()
}

fn store_totals(completed: &[&OrderRecord]) -> BTreeMap<String, (f64, usize)> {
    let mut by_store: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for order in completed {
        let entry = by_store.entry(order.location.clone()).or_insert((0.0, 0));
        entry.0 += order.amount;
        entry.1 += 1;
    }
    by_store
}

fn store_performance(completed: &[&OrderRecord]) -> Vec<StorePerformance> {
    let mut stores: Vec<StorePerformance> = store_totals(completed)
        .into_iter()
        .map(|(store, (revenue, orders))| StorePerformance { store, revenue, orders })
        .collect();

    // Stable: equal revenue keeps name order
    stores.sort_by(|a, b| a.revenue.total_cmp(&b.revenue));
    stores
}

/// Highest revenue store; ties go to the lexicographically first name
fn top_store(completed: &[&OrderRecord], total_gmv: f64) -> Option<TopStore> {
    let mut best: Option<TopStore> = None;
    for (store, (revenue, _)) in store_totals(completed) {
        let better = match &best {
            Some(b) => revenue > b.revenue,
            None => true,
        };
        if better {
            best = Some(TopStore {
                share: percent_of(revenue, total_gmv),
                store,
                revenue,
            });
        }
    }
    best
}

fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}
