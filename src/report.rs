// 🖨️ Report Renderer - Metrics -> self-contained HTML
//
// No computation happens here beyond formatting. Chart options are built as
// JSON values and embedded with script-safe escaping.

use crate::config::ReportConfig;
use crate::metrics::Metrics;
use crate::order::Channel;
use chrono::NaiveDateTime;
use serde_json::{json, Value};

const ECHARTS_CDN: &str = "https://cdnjs.cloudflare.com/ajax/libs/echarts/5.4.3/echarts.min.js";

const STYLE: &str = r#"
  :root { --brand: #232773; --gray: #F2F3F5; --text: #333; --sub: #666; --risk: #D93025; --ok: #34A853; }
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: "PingFang SC", "Microsoft YaHei", Helvetica, Arial, sans-serif; background: var(--gray); color: var(--text); line-height: 1.5; }
  .header { background: var(--brand); color: #fff; padding: 15px 40px; display: flex; justify-content: space-between; align-items: center; }
  .header h1 { font-size: 24px; font-weight: 600; }
  .report-info { text-align: right; font-size: 12px; opacity: .9; }
  .container { max-width: 1400px; margin: 30px auto; padding: 0 20px; }
  .kpi-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 20px; margin-bottom: 30px; }
  .kpi-card { background: #fff; padding: 25px; border-radius: 8px; border-left: 5px solid var(--brand); }
  .kpi-card.risk { border-left-color: var(--risk); }
  .kpi-label { color: var(--sub); font-size: 14px; margin-bottom: 8px; }
  .kpi-value { font-size: 28px; font-weight: bold; color: var(--brand); }
  .kpi-card.risk .kpi-value { color: var(--risk); }
  .kpi-sub { font-size: 12px; color: var(--sub); margin-top: 5px; }
  .row { display: flex; gap: 20px; flex-wrap: wrap; }
  .section { background: #fff; padding: 25px; border-radius: 8px; margin-bottom: 25px; flex: 1; min-width: 400px; }
  .section-title { font-size: 18px; font-weight: bold; color: var(--brand); border-bottom: 1px solid #eee; padding-bottom: 15px; margin-bottom: 20px; }
  .chart { width: 100%; height: 400px; }
  .chart.small { height: 300px; }
  table { width: 100%; border-collapse: collapse; font-size: 14px; }
  th { text-align: left; padding: 12px 15px; color: var(--brand); border-bottom: 2px solid var(--brand); }
  td { padding: 12px 15px; border-bottom: 1px solid #eee; }
  .badge { padding: 4px 8px; border-radius: 4px; font-size: 12px; font-weight: bold; }
  .alert { padding: 15px; border-radius: 6px; margin-top: 15px; font-size: 14px; }
  .alert-danger { background: #fce8e6; color: #a50e0e; }
  .alert-ok { background: #e6f4ea; color: var(--ok); }
  .alert-info { background: #e8f0fe; color: #174ea6; }
  .empty { text-align: center; padding: 80px 20px; color: var(--sub); }
  .footer { text-align: center; font-size: 12px; color: #999; margin: 40px 0 20px; }
"#;

// ============================================================================
// ESCAPING
// ============================================================================

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize a value as a JavaScript literal safe inside `<script>`.
///
/// JSON already escapes quotes; on top of that `<`, `>` and `&` become
/// unicode escapes so a store called `</script>` cannot close the tag, and
/// U+2028/U+2029 are escaped for pre-ES2019 engines.
pub fn script_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

/// `1234567.891` -> `1,234,567.89`
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

fn money(config: &ReportConfig, value: f64, decimals: usize) -> String {
    format!("{}{}", escape_html(&config.currency_symbol), group_thousands(value, decimals))
}

/// Round to cents for chart data
fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// CHART OPTIONS
// ============================================================================

pub fn trend_chart(metrics: &Metrics) -> Value {
    let dates: Vec<String> = metrics
        .daily_trend
        .dates
        .iter()
        .map(|d| d.format("%m/%d").to_string())
        .collect();

    let series: Vec<Value> = metrics
        .daily_trend
        .series
        .iter()
        .map(|s| {
            json!({
                "name": s.channel.name(),
                "type": "line",
                "smooth": true,
                "data": s.counts,
                "itemStyle": { "color": s.channel.color() },
                "lineStyle": { "width": 3 },
            })
        })
        .collect();

    json!({
        "tooltip": { "trigger": "axis" },
        "legend": { "data": Channel::ALL.iter().map(|c| c.name()).collect::<Vec<_>>(), "bottom": 0 },
        "grid": { "left": "3%", "right": "4%", "bottom": "10%", "containLabel": true },
        "xAxis": { "type": "category", "boundaryGap": false, "data": dates },
        "yAxis": { "type": "value", "name": "Orders" },
        "series": series,
    })
}

pub fn channel_chart(metrics: &Metrics) -> Value {
    let data: Vec<Value> = metrics
        .channel_shares
        .iter()
        .map(|s| {
            json!({
                "value": s.orders,
                "name": s.channel.name(),
                "itemStyle": { "color": s.channel.color() },
            })
        })
        .collect();

    json!({
        "tooltip": { "trigger": "item" },
        "legend": { "top": "5%", "left": "center" },
        "series": [{
            "name": "Orders by channel",
            "type": "pie",
            "radius": ["40%", "70%"],
            "avoidLabelOverlap": false,
            "itemStyle": { "borderRadius": 10, "borderColor": "#fff", "borderWidth": 2 },
            "label": { "show": false, "position": "center" },
            "emphasis": { "label": { "show": true, "fontSize": 20, "fontWeight": "bold" } },
            "data": data,
        }],
    })
}

pub fn store_chart(metrics: &Metrics, config: &ReportConfig) -> Value {
    let names: Vec<&str> = metrics
        .store_performance
        .iter()
        .map(|s| config.display_store(&s.store))
        .collect();
    let values: Vec<f64> = metrics.store_performance.iter().map(|s| cents(s.revenue)).collect();

    json!({
        "tooltip": { "trigger": "axis", "axisPointer": { "type": "shadow" } },
        "grid": { "left": "3%", "right": "10%", "bottom": "3%", "containLabel": true },
        "xAxis": { "type": "value", "name": format!("Revenue ({})", config.currency_symbol) },
        "yAxis": { "type": "category", "data": names },
        "series": [{
            "name": "Revenue",
            "type": "bar",
            "data": values,
            "itemStyle": { "color": "#232773" },
            "label": { "show": true, "position": "right", "formatter": format!("{}{{c}}", config.currency_symbol) },
        }],
    })
}

// ============================================================================
// HTML
// ============================================================================

fn document_head(config: &ReportConfig, with_charts: bool) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    out.push_str(&format!("<title>{} - Delivery Report</title>\n", escape_html(&config.brand_name)));
    if with_charts {
        out.push_str(&format!("<script src=\"{}\"></script>\n", ECHARTS_CDN));
    }
    out.push_str("<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n</head>\n<body>\n");
    out
}

fn header(config: &ReportConfig, metrics: &Metrics, generated_at: NaiveDateTime) -> String {
    let period = match metrics.date_span {
        Some(span) => format!("{} - {}", span.start.format("%Y-%m-%d"), span.end.format("%Y-%m-%d")),
        None => "N/A".to_string(),
    };

    format!(
        "<header class=\"header\">\n  <div><h1>{}</h1><div>{}</div></div>\n  <div class=\"report-info\"><div>Period: {}</div><div>Generated: {}</div></div>\n</header>\n",
        escape_html(&config.brand_name),
        escape_html(&config.subtitle),
        period,
        generated_at.format("%Y-%m-%d %H:%M"),
    )
}

fn footer(config: &ReportConfig, generated_at: NaiveDateTime) -> String {
    format!(
        "<div class=\"footer\">&copy; {} {} {}</div>\n",
        generated_at.format("%Y"),
        escape_html(&config.brand_name),
        escape_html(&config.footer),
    )
}

fn kpi_card(label: &str, value: &str, sub: &str, risk: bool) -> String {
    format!(
        "  <div class=\"kpi-card{}\"><div class=\"kpi-label\">{}</div><div class=\"kpi-value\">{}</div><div class=\"kpi-sub\">{}</div></div>\n",
        if risk { " risk" } else { "" },
        label,
        value,
        sub,
    )
}

fn kpi_grid(metrics: &Metrics, config: &ReportConfig) -> String {
    let mut out = String::from("<div class=\"kpi-grid\">\n");

    out.push_str(&kpi_card(
        "Completed Orders",
        &metrics.total_orders.to_string(),
        &format!("Daily average: {:.1}", metrics.avg_daily_orders),
        false,
    ));
    out.push_str(&kpi_card(
        "Total Revenue (GMV)",
        &money(config, metrics.total_gmv, 2),
        &format!("Average ticket: {}", money(config, metrics.avg_ticket, 2)),
        false,
    ));

    let (peak_value, peak_sub) = match &metrics.peak_day {
        Some(peak) => (
            peak.date.format("%m/%d").to_string(),
            format!("{} orders | revenue {}", peak.orders, money(config, peak.revenue, 0)),
        ),
        None => ("N/A".to_string(), "No completed orders".to_string()),
    };
    out.push_str(&kpi_card("Peak Day", &peak_value, &peak_sub, false));

    out.push_str(&kpi_card(
        "Cancellation Rate",
        &format!("{:.1}%", metrics.cancel_rate),
        &format!("{} of {} orders cancelled or refunded", metrics.cancelled_orders, metrics.distinct_orders),
        true,
    ));

    out.push_str("</div>\n");
    out
}

fn channel_table(metrics: &Metrics) -> String {
    let mut rows = String::new();
    for share in &metrics.channel_shares {
        let color = share.channel.color();
        rows.push_str(&format!(
            "      <tr><td>{}</td><td>{}</td><td><span class=\"badge\" style=\"background-color: {}20; color: {};\">{:.1}%</span></td></tr>\n",
            share.channel.name(),
            share.orders,
            color,
            color,
            share.revenue_share,
        ));
    }

    format!(
        "<table>\n    <thead><tr><th>Channel</th><th>Orders</th><th>Revenue Share</th></tr></thead>\n    <tbody>\n{}    </tbody>\n  </table>\n",
        rows
    )
}

fn store_insight(metrics: &Metrics, config: &ReportConfig) -> String {
    match &metrics.top_store {
        Some(top) => format!(
            "<div class=\"alert alert-info\"><strong>Insight:</strong> {} generated the highest revenue ({}, {:.1}% of total).</div>\n",
            escape_html(config.display_store(&top.store)),
            money(config, top.revenue, 0),
            top.share,
        ),
        None => "<div class=\"alert alert-info\">No completed orders per store yet.</div>\n".to_string(),
    }
}

fn risk_alert(metrics: &Metrics, config: &ReportConfig) -> String {
    if metrics.cancel_rate > config.cancel_alert_threshold {
        format!(
            "<div class=\"alert alert-danger\"><h4>High cancellation rate</h4><ul>\
             <li><strong>Current rate:</strong> {:.1}% (target: &lt; {:.1}%)</li>\
             <li><strong>Impact:</strong> {} orders did not complete. Check inventory sync and in-store order tablets.</li>\
             </ul></div>\n",
            metrics.cancel_rate, config.cancel_target, metrics.cancelled_orders,
        )
    } else {
        format!(
            "<div class=\"alert alert-ok\"><h4>Normal operations</h4><p>Cancellation rate is {:.1}%, within the healthy range.</p></div>\n",
            metrics.cancel_rate,
        )
    }
}

fn chart_script(metrics: &Metrics, config: &ReportConfig) -> String {
    format!(
        r#"<script>
document.addEventListener("DOMContentLoaded", function() {{
  if (typeof echarts === "undefined") {{ console.error("ECharts library failed to load."); return; }}
  const charts = [
    ["trendChart", {trend}],
    ["channelChart", {channel}],
    ["storeChart", {store}]
  ];
  charts.forEach(function(entry) {{
    const dom = document.getElementById(entry[0]);
    if (!dom) {{ return; }}
    const chart = echarts.init(dom);
    chart.setOption(entry[1]);
    window.addEventListener("resize", function() {{ chart.resize(); }});
  }});
}});
</script>
"#,
        trend = script_json(&trend_chart(metrics)),
        channel = script_json(&channel_chart(metrics)),
        store = script_json(&store_chart(metrics, config)),
    )
}

/// Render the full report. Never fails; empty metrics give the placeholder.
pub fn render_report(metrics: &Metrics, config: &ReportConfig, generated_at: NaiveDateTime) -> String {
    if metrics.is_empty() {
        return render_placeholder(config, generated_at);
    }

    let mut html = document_head(config, true);
    html.push_str(&header(config, metrics, generated_at));
    html.push_str("<div class=\"container\">\n");
    html.push_str(&kpi_grid(metrics, config));

    html.push_str("<div class=\"section\"><div class=\"section-title\">Daily Order Trend</div><div class=\"chart\" id=\"trendChart\"></div></div>\n");

    html.push_str("<div class=\"row\">\n");
    html.push_str("<div class=\"section\"><div class=\"section-title\">Channel Share</div><div class=\"chart small\" id=\"channelChart\"></div>\n");
    html.push_str(&channel_table(metrics));
    html.push_str("</div>\n");
    html.push_str("<div class=\"section\"><div class=\"section-title\">Store Performance</div><div class=\"chart small\" id=\"storeChart\"></div>\n");
    html.push_str(&store_insight(metrics, config));
    html.push_str("</div>\n</div>\n");

    html.push_str("<div class=\"section\"><div class=\"section-title\">Risk &amp; Anomalies</div>\n");
    html.push_str(&risk_alert(metrics, config));
    html.push_str("</div>\n");

    html.push_str("</div>\n");
    html.push_str(&footer(config, generated_at));
    html.push_str(&chart_script(metrics, config));
    html.push_str("</body>\n</html>\n");
    html
}

/// "No data" document for an empty upload set
pub fn render_placeholder(config: &ReportConfig, generated_at: NaiveDateTime) -> String {
    let mut html = document_head(config, false);
    html.push_str(&header(config, &Metrics::default(), generated_at));
    html.push_str(
        "<div class=\"container\"><div class=\"section empty\"><h1>No data</h1>\
         <p>No orders could be read from the provided exports.</p></div>\n",
    );
    html.push_str(&kpi_grid(&Metrics::default(), config));
    html.push_str("</div>\n");
    html.push_str(&footer(config, generated_at));
    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate;
    use crate::order::OrderRecord;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn sample_metrics(store: &str) -> Metrics {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let orders = vec![
            OrderRecord::new(day, 1234.5, Channel::UberEats, 2)
                .with_location(store)
                .with_status(true, false),
            OrderRecord::new(day, 10.0, Channel::DoorDash, 2).with_status(false, true),
        ];
        aggregate(&orders)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">Tom & Jerry's</a>"), "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;");
    }

    #[test]
    fn test_script_json_neutralizes_closing_tag() {
        let v = json!(["</script><script>alert('x')</script>", "O'Brien \"Cafe\""]);
        let out = script_json(&v);
        assert!(!out.contains("</script>"));
        assert!(out.contains("\\u003c/script\\u003e"));
        assert!(out.contains("O'Brien \\\"Cafe\\\""));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(-1500.0, 2), "-1,500.00");
        assert_eq!(group_thousands(-0.001, 2), "0.00");
    }

    #[test]
    fn test_report_contains_kpis_and_charts() {
        let html = render_report(&sample_metrics("Luckin Coffee Broadway"), &ReportConfig::default(), at());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("$1,234.50"));
        assert!(html.contains("50.0%"));
        assert!(html.contains("id=\"trendChart\""));
        assert!(html.contains("\"Broadway\""));
        assert!(html.contains("Generated: 2025-04-01 09:30"));
        assert!(html.contains("High cancellation rate"));
    }

    #[test]
    fn test_hostile_store_name_is_escaped_everywhere() {
        let name = "Bob's \"</script><b>Cafe\"";
        let html = render_report(&sample_metrics(name), &ReportConfig::default(), at());

        assert_eq!(html.matches("</script>").count(), 2);
        assert!(!html.contains("<b>Cafe"));
        assert!(html.contains("Bob&#39;s &quot;&lt;/script&gt;&lt;b&gt;Cafe&quot;"));
    }

    #[test]
    fn test_empty_metrics_render_placeholder() {
        let html = render_report(&Metrics::default(), &ReportConfig::default(), at());
        assert!(html.contains("No data"));
        assert!(html.contains("0.0%"));
        assert!(!html.contains("echarts.min.js"));
    }

    #[test]
    fn test_low_cancel_rate_is_normal() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let orders = vec![OrderRecord::new(day, 5.0, Channel::Grubhub, 2).with_status(true, false)];
        let html = render_report(&aggregate(&orders), &ReportConfig::default(), at());
        assert!(html.contains("Normal operations"));
    }

    #[test]
    fn test_head_and_channel_rows() {
        let config = ReportConfig {
            brand_name: "Acme & Co".to_string(),
            ..ReportConfig::default()
        };

        let head = document_head(&config, true);
        assert!(head.contains("<title>Acme &amp; Co - Delivery Report</title>\n"));
        assert!(head.contains(&format!("<script src=\"{}\"></script>\n", ECHARTS_CDN)));
        assert!(!document_head(&config, false).contains(ECHARTS_CDN));

        let table = channel_table(&sample_metrics("Broadway"));
        for channel in Channel::ALL {
            assert!(table.contains(&format!("<tr><td>{}</td>", channel.name())));
        }
        assert_eq!(table.matches("</tr>\n").count(), Channel::ALL.len());
    }
}
