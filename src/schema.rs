use crate::error::{PageProfitError, Result};
use crate::status::Status;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Source-currency units per one target-currency unit, used when no
/// user-configured rate has been persisted.
pub const DEFAULT_EXCHANGE_RATE: f64 = 87.0;

/// Process-wide configuration. The rate in effect at import time is baked
/// into each snapshot; changing it later never revalues history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,
}

fn default_exchange_rate() -> f64 {
    DEFAULT_EXCHANGE_RATE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exchange_rate: DEFAULT_EXCHANGE_RATE,
        }
    }
}

/// Reporting cadence of an import. Descriptive metadata only; aggregation
/// math buckets by snapshot date, never by period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    Daily,
    Weekly,
    #[default]
    Monthly,
    BiMonthly,
    Quarterly,
    Yearly,
}

/// One row of the content-revenue report, as extracted. The slug is kept raw
/// here; the reconciliation engine normalizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRow {
    pub slug: String,
    pub views: u64,
    pub revenue: f64,
    pub rpm: f64,
    pub cpm: f64,
    pub viewability: f64,
    pub fill_rate: f64,
    pub impressions_per_view: f64,
}

/// One data line of the ad-spend report, before cross-campaign aggregation.
/// Several lines may target the same landing page via different campaigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendLine {
    pub landing_page: String,
    pub campaign: String,
    pub clicks: u64,
    pub impressions: u64,
    pub cost_source: f64,
}

/// The unit of analysis: one financial record per slug appearing in either
/// source. Slugs present on only one side carry zeros on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledUrl {
    pub slug: String,
    pub status: Status,
    pub profit: f64,
    pub roi: f64,
    pub revenue_per_click: f64,
    pub cost_per_click: f64,

    // Content side
    pub views: u64,
    pub revenue: f64,
    pub rpm: f64,
    pub cpm: f64,
    pub viewability: f64,
    pub fill_rate: f64,
    pub impressions_per_view: f64,

    // Spend side, aggregated across campaigns
    pub campaigns: Vec<String>,
    pub clicks: u64,
    pub impressions: u64,
    pub cost_source: f64,
    pub cost_target: f64,
    pub has_spend: bool,
}

/// Precomputed sums over every url in a snapshot, spending or not.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotTotals {
    pub content_revenue: f64,
    pub spend_source: f64,
    pub spend_target: f64,
    pub clicks: u64,
    pub impressions: u64,
    pub total_profit: f64,
    pub url_count: usize,
    pub spending_url_count: usize,
}

/// Immutable record of one import event. `date` is user-supplied and drives
/// all time-bucketing; `created_at` is only the creation instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub label: String,
    pub date: NaiveDate,
    pub period: Period,
    pub created_at: DateTime<Utc>,
    pub urls: Vec<ReconciledUrl>,
    pub totals: SnapshotTotals,
}

impl Snapshot {
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }

    pub fn url(&self, slug: &str) -> Option<&ReconciledUrl> {
        self.urls.iter().find(|u| u.slug == slug)
    }
}

/// Strips at most one leading and one trailing slash. Idempotent.
pub fn normalize_slug(slug: &str) -> String {
    let trimmed = slug.trim();
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.to_string()
}

/// Extracts the normalized slug from a full landing-page URL by dropping the
/// scheme and host, then normalizing the remaining path.
pub fn slug_from_url(url: &str) -> String {
    let trimmed = url.trim();
    let path = ["https://", "http://"]
        .iter()
        .find_map(|scheme| trimmed.strip_prefix(scheme))
        .map(|rest| match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "",
        })
        .unwrap_or(trimmed);
    normalize_slug(path)
}

/// Single entry point for date strings arriving at the boundary. Enforces
/// the zero-padded YYYY-MM-DD form so date ordering is always well defined.
pub fn parse_snapshot_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| PageProfitError::InvalidDate(raw.to_string()))?;
    // chrono tolerates unpadded fields; the store contract does not
    if date.format("%Y-%m-%d").to_string() != trimmed {
        return Err(PageProfitError::InvalidDate(raw.to_string()));
    }
    Ok(date)
}
