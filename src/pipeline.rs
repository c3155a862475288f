// Pipeline - parse -> aggregate -> render for up to three exports

use crate::cache::ParseCache;
use crate::config::ReportConfig;
use crate::metrics::{aggregate, Metrics};
use crate::order::{detect_channel, Channel, OrderRecord, OrderTable};
use crate::parser::get_parser;
use crate::report::render_report;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// One export per channel; later assignments replace earlier ones
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    files: BTreeMap<Channel, PathBuf>,
}

impl ReportInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Channel, path: impl Into<PathBuf>) -> Self {
        self.files.insert(channel, path.into());
        self
    }

    /// Assign a file to the channel its name points at
    pub fn with_detected(self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let channel = detect_channel(&path)
            .ok_or_else(|| anyhow!("Could not detect channel from filename: {}", path.display()))?;
        Ok(self.with(channel, path))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &Path)> {
        self.files.iter().map(|(c, p)| (*c, p.as_path()))
    }
}

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub tables: Vec<Arc<OrderTable>>,
    pub orders: Vec<OrderRecord>,
    pub metrics: Metrics,
    pub html: String,
}

/// Parse every input through the cache and merge the results.
///
/// A file that cannot be read is an error; a file that reads but does not
/// parse degrades to an empty table carrying its rejection.
pub fn load_tables(inputs: &ReportInputs, cache: &mut ParseCache) -> Result<Vec<Arc<OrderTable>>> {
    let mut tables = Vec::new();

    for (channel, path) in inputs.iter() {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {} export: {}", channel, path.display()))?;

        let parser = get_parser(channel);
        let table = cache.parse(parser.as_ref(), &bytes);
        info!(
            channel = %channel,
            file = %path.display(),
            orders = table.len(),
            skipped = table.skipped.len(),
            rejected = ?table.error_kind(),
            "loaded export"
        );
        tables.push(table);
    }

    Ok(tables)
}

/// Full run: load, aggregate, render
pub fn build_report(
    inputs: &ReportInputs,
    config: &ReportConfig,
    cache: &mut ParseCache,
    generated_at: NaiveDateTime,
) -> Result<ReportOutput> {
    let tables = load_tables(inputs, cache)?;
    let orders = OrderTable::merge(tables.iter().map(|t| t.as_ref()));
    let metrics = aggregate(&orders);

    info!(
        orders = metrics.distinct_orders,
        completed = metrics.total_orders,
        gmv = metrics.total_gmv,
        cancel_rate = metrics.cancel_rate,
        "aggregated"
    );

    let html = render_report(&metrics, config, generated_at);

    Ok(ReportOutput {
        tables,
        orders,
        metrics,
        html,
    })
}

/// Default output name, e.g. `delivery_report_20250401.html`
pub fn default_output_name(generated_at: NaiveDateTime) -> String {
    format!("delivery_report_{}.html", generated_at.format("%Y%m%d"))
}
