use chrono::{NaiveDate, NaiveDateTime};
use delivery_report::{
    aggregate, build_report, get_parser, Channel, ChannelParser, ErrorKind, GrubhubParser,
    ParseCache, ReportConfig, ReportInputs, UberEatsParser,
};
use std::io::Write;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn generated_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 4, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn all_inputs() -> ReportInputs {
    ReportInputs::new()
        .with(Channel::UberEats, fixture("uber_eats.csv"))
        .with(Channel::DoorDash, fixture("doordash.csv"))
        .with(Channel::Grubhub, fixture("grubhub.csv"))
}

#[test]
fn test_uber_fixture_metrics() {
    let bytes = std::fs::read(fixture("uber_eats.csv")).unwrap();
    let table = UberEatsParser::new().parse(&bytes).unwrap();
    assert_eq!(table.len(), 10);

    let m = aggregate(&table.orders);
    assert_eq!(m.total_orders, 8);
    assert!((m.cancel_rate - 20.0).abs() < 1e-9);
    assert!((m.total_gmv - 123.40).abs() < 1e-9);
}

#[test]
fn test_grubhub_refunded_order_counted_once() {
    let bytes = std::fs::read(fixture("grubhub.csv")).unwrap();
    let table = GrubhubParser::new().parse(&bytes).unwrap();

    // 7 rows, 3 logical orders
    assert_eq!(table.len(), 3);

    let m = aggregate(&table.orders);
    assert_eq!(m.distinct_orders, 3);
    assert_eq!(m.cancelled_orders, 1);
    assert_eq!(m.total_orders, 2);
    // GH-100's $20.00 never reaches revenue
    assert!((m.total_gmv - 25.40).abs() < 1e-9);
}

#[test]
fn test_full_pipeline() {
    let mut cache = ParseCache::new();
    let output = build_report(&all_inputs(), &ReportConfig::default(), &mut cache, generated_at()).unwrap();
    let m = &output.metrics;

    assert_eq!(m.distinct_orders, 17);
    assert_eq!(m.cancelled_orders, 4);
    assert_eq!(m.total_orders, 13);
    assert!((m.total_gmv - 1172.15).abs() < 1e-6);

    let span = m.date_span.unwrap();
    assert_eq!(span.start, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    assert_eq!(span.end, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());

    let peak = m.peak_day.as_ref().unwrap();
    assert_eq!(peak.date, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());

    assert_eq!(m.top_store.as_ref().unwrap().store, "Luckin Coffee Broadway");
    assert!(output.html.contains("Broadway"));
    assert!(output.html.contains("$1,172.15"));
}

#[test]
fn test_trend_series_cover_full_span() {
    let mut cache = ParseCache::new();
    let output = build_report(&all_inputs(), &ReportConfig::default(), &mut cache, generated_at()).unwrap();
    let m = &output.metrics;

    let span = m.date_span.unwrap();
    let expected = ((span.end - span.start).num_days() + 1) as usize;
    assert_eq!(m.daily_trend.dates.len(), expected);
    assert_eq!(m.daily_trend.series.len(), 3);
    for series in &m.daily_trend.series {
        assert_eq!(series.counts.len(), expected, "{} series length", series.channel);
    }

    let total: usize = m.daily_trend.series.iter().flat_map(|s| s.counts.iter()).sum();
    assert_eq!(total, m.total_orders);
}

#[test]
fn test_cache_reuses_parses_across_runs() {
    let mut cache = ParseCache::new();
    let config = ReportConfig::default();

    build_report(&all_inputs(), &config, &mut cache, generated_at()).unwrap();
    build_report(&all_inputs(), &config, &mut cache, generated_at()).unwrap();

    assert_eq!(cache.misses(), 3);
    assert_eq!(cache.hits(), 3);
}

#[test]
fn test_malformed_source_degrades_to_empty() {
    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, "this,is,not\na,doordash,export").unwrap();

    let inputs = ReportInputs::new()
        .with(Channel::UberEats, fixture("uber_eats.csv"))
        .with(Channel::DoorDash, bad.path());

    let mut cache = ParseCache::new();
    let output = build_report(&inputs, &ReportConfig::default(), &mut cache, generated_at()).unwrap();

    assert_eq!(output.tables.len(), 2);
    assert_eq!(output.metrics.total_orders, 8);

    let uber = output.tables.iter().find(|t| t.channel == Channel::UberEats).unwrap();
    assert!(!uber.is_rejected());

    let doordash = output.tables.iter().find(|t| t.channel == Channel::DoorDash).unwrap();
    assert!(doordash.is_empty());
    assert_eq!(doordash.error_kind(), Some(ErrorKind::MissingColumn));
}

#[test]
fn test_typed_errors_distinguish_failures() {
    let parser = get_parser(Channel::DoorDash);

    let missing = parser.parse("接单当地时间,小计\n2025-03-01,1.00\n".as_bytes()).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::MissingColumn);
    assert_eq!(missing.channel(), Channel::DoorDash);

    let empty = parser.parse(b"   \n").unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::EmptyInput);
}

#[test]
fn test_empty_inputs_render_placeholder() {
    let mut empty = tempfile::NamedTempFile::new().unwrap();
    empty.flush().unwrap();

    let inputs = ReportInputs::new().with(Channel::Grubhub, empty.path());
    let mut cache = ParseCache::new();
    let output = build_report(&inputs, &ReportConfig::default(), &mut cache, generated_at()).unwrap();

    assert!(output.metrics.is_empty());
    assert_eq!(output.metrics.cancel_rate, 0.0);
    assert_eq!(output.tables[0].error_kind(), Some(ErrorKind::EmptyInput));
    assert!(output.html.contains("No data"));

    let none = build_report(&ReportInputs::new(), &ReportConfig::default(), &mut cache, generated_at()).unwrap();
    assert!(none.html.contains("No data"));
}
