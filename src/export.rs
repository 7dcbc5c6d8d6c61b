//! CSV exports over reconciled data.
//!
//! Output contract: comma-separated, every field double-quote-wrapped
//! regardless of content, header row first, one row per record. Each export
//! variant has a fixed column list that downstream spreadsheet workflows
//! depend on. Cells carry the values computed at reconciliation/aggregation
//! time; nothing is re-derived here. Currency renders to two decimals,
//! percentages to one.

use crate::aggregate::{RangeReport, RangeUrl, Trend};
use crate::schema::{ReconciledUrl, Snapshot};
use crate::status::Status;

const SNAPSHOT_COLUMNS: [&str; 18] = [
    "Slug",
    "Status",
    "Views",
    "Revenue",
    "RPM",
    "CPM",
    "Viewability",
    "Fill Rate",
    "Impressions/View",
    "Campaigns",
    "Clicks",
    "Impressions",
    "Cost (INR)",
    "Cost (USD)",
    "Revenue/Click",
    "Cost/Click",
    "Profit",
    "ROI %",
];

const STATUS_BUCKET_COLUMNS: [&str; 9] = [
    "Slug",
    "Revenue",
    "Cost (USD)",
    "Profit",
    "ROI %",
    "Clicks",
    "Revenue/Click",
    "Cost/Click",
    "Campaigns",
];

const RANGE_COLUMNS: [&str; 14] = [
    "Slug",
    "Status",
    "Trend",
    "Appearances",
    "Months Active",
    "Revenue",
    "Cost (INR)",
    "Cost (USD)",
    "Clicks",
    "Impressions",
    "Revenue/Click",
    "Cost/Click",
    "Profit",
    "ROI %",
];

fn money(v: f64) -> String {
    format!("{:.2}", v)
}

fn percent(v: f64) -> String {
    format!("{:.1}", v)
}

fn write_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let quoted: Vec<String> = fields
        .iter()
        .map(|f| format!("\"{}\"", f.as_ref()))
        .collect();
    out.push_str(&quoted.join(","));
    out.push('\n');
}

fn trend_name(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => "Improving",
        Trend::Declining => "Declining",
        Trend::Stable => "Stable",
    }
}

fn snapshot_row(url: &ReconciledUrl) -> Vec<String> {
    vec![
        url.slug.clone(),
        url.status.to_string(),
        url.views.to_string(),
        money(url.revenue),
        money(url.rpm),
        money(url.cpm),
        percent(url.viewability),
        percent(url.fill_rate),
        money(url.impressions_per_view),
        url.campaigns.join(", "),
        url.clicks.to_string(),
        url.impressions.to_string(),
        money(url.cost_source),
        money(url.cost_target),
        money(url.revenue_per_click),
        money(url.cost_per_click),
        money(url.profit),
        percent(url.roi),
    ]
}

/// Full-snapshot export: every reconciled url, discovery order.
pub fn snapshot_csv(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    write_row(&mut out, &SNAPSHOT_COLUMNS);
    for url in &snapshot.urls {
        write_row(&mut out, &snapshot_row(url));
    }
    out
}

/// Per-status export of one snapshot's spending urls.
pub fn status_bucket_csv(snapshot: &Snapshot, status: Status) -> String {
    let mut out = String::new();
    write_row(&mut out, &STATUS_BUCKET_COLUMNS);
    for url in snapshot.urls.iter().filter(|u| u.has_spend && u.status == status) {
        let fields = vec![
            url.slug.clone(),
            money(url.revenue),
            money(url.cost_target),
            money(url.profit),
            percent(url.roi),
            url.clicks.to_string(),
            money(url.revenue_per_click),
            money(url.cost_per_click),
            url.campaigns.join(", "),
        ];
        write_row(&mut out, &fields);
    }
    out
}

fn range_row(url: &RangeUrl) -> Vec<String> {
    vec![
        url.slug.clone(),
        url.status.to_string(),
        trend_name(url.trend).to_string(),
        url.appearances.to_string(),
        url.months_active.join(", "),
        money(url.revenue),
        money(url.cost_source),
        money(url.cost_target),
        url.clicks.to_string(),
        url.impressions.to_string(),
        money(url.revenue_per_click),
        money(url.cost_per_click),
        money(url.profit),
        percent(url.roi),
    ]
}

/// Date-range export: one row per aggregated spending url.
pub fn range_csv(report: &RangeReport) -> String {
    let mut out = String::new();
    write_row(&mut out, &RANGE_COLUMNS);
    for url in &report.urls {
        write_row(&mut out, &range_row(url));
    }
    out
}
