//! Rollup views over the snapshot store.
//!
//! All three queries are stateless: they read the whole store and recompute
//! from scratch on every call. At the expected scale (tens of snapshots,
//! low thousands of urls each) that is linear work per query and keeps the
//! store free of derived state to invalidate.

use crate::schema::{normalize_slug, Period, ReconciledUrl, Snapshot};
use crate::store::SnapshotStore;
use crate::status::{classify, roi_percent, Status};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Month-over-month profit movement within a date range. Stable covers a
/// first-to-last delta of at most one target-currency unit.
pub const TREND_STABILITY_BAND: f64 = 1.0;

/// How many trailing months the monthly trend reports.
const TREND_MONTH_LIMIT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// Summed totals for one calendar month, across every snapshot dated in it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MonthlyRollup {
    pub month: String,
    pub snapshot_count: usize,
    pub content_revenue: f64,
    pub spend_source: f64,
    pub spend_target: f64,
    pub clicks: u64,
    pub impressions: u64,
    pub total_profit: f64,
    pub profitable_urls: usize,
    pub losing_urls: usize,
    pub turn_off_urls: usize,
}

/// Groups snapshots by the calendar month of their date, sums totals within
/// each group, and tallies spending-url statuses. Returns the last twelve
/// months in chronological order.
pub fn monthly_trend(store: &SnapshotStore) -> Vec<MonthlyRollup> {
    let mut buckets: BTreeMap<String, MonthlyRollup> = BTreeMap::new();

    for snapshot in store.iter() {
        let key = snapshot.month_key();
        let bucket = buckets.entry(key.clone()).or_insert_with(|| MonthlyRollup {
            month: key,
            ..MonthlyRollup::default()
        });

        bucket.snapshot_count += 1;
        bucket.content_revenue += snapshot.totals.content_revenue;
        bucket.spend_source += snapshot.totals.spend_source;
        bucket.spend_target += snapshot.totals.spend_target;
        bucket.clicks += snapshot.totals.clicks;
        bucket.impressions += snapshot.totals.impressions;
        bucket.total_profit += snapshot.totals.total_profit;

        for url in snapshot.urls.iter().filter(|u| u.has_spend) {
            match url.status {
                Status::Profitable => bucket.profitable_urls += 1,
                Status::Losing => bucket.losing_urls += 1,
                Status::TurnOff => bucket.turn_off_urls += 1,
                Status::Improving => {}
            }
        }
    }

    let months: Vec<MonthlyRollup> = buckets.into_values().collect();
    let skip = months.len().saturating_sub(TREND_MONTH_LIMIT);
    months.into_iter().skip(skip).collect()
}

/// One slug's numbers accumulated across every snapshot in a date range.
/// Derived fields (profit, roi, per-click rates, status) are computed from
/// the summed totals, never averaged from per-snapshot ratios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeUrl {
    pub slug: String,
    pub status: Status,
    pub trend: Trend,
    pub profit: f64,
    pub roi: f64,
    pub revenue_per_click: f64,
    pub cost_per_click: f64,
    pub revenue: f64,
    pub cost_source: f64,
    pub cost_target: f64,
    pub clicks: u64,
    pub impressions: u64,
    pub campaigns: Vec<String>,
    /// Number of snapshots contributing to this record.
    pub appearances: usize,
    /// Distinct contributing months, chronological.
    pub months_active: Vec<String>,
}

/// Range-wide sums and status counts over the full url set, computed before
/// any display filter is applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RangeTotals {
    pub revenue: f64,
    pub spend_source: f64,
    pub spend_target: f64,
    pub clicks: u64,
    pub impressions: u64,
    pub profit: f64,
    pub url_count: usize,
    pub profitable: usize,
    pub improving: usize,
    pub losing: usize,
    pub turn_off: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Snapshots whose date fell inside the range. Zero means the range
    /// matched nothing, distinct from matching snapshots with no spend.
    pub snapshot_count: usize,
    pub urls: Vec<RangeUrl>,
    pub totals: RangeTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeSort {
    #[default]
    Profit,
    Revenue,
    Spend,
    Roi,
    Clicks,
}

/// Display-list controls. These never affect [`RangeReport::totals`].
#[derive(Debug, Clone, Default)]
pub struct RangeFilter {
    pub status: Option<Status>,
    pub search: Option<String>,
    pub sort: RangeSort,
}

impl RangeReport {
    pub fn is_empty_range(&self) -> bool {
        self.snapshot_count == 0
    }

    /// The display list: filtered and sorted views over the accumulated
    /// urls. Totals are computed once at aggregation time and are not
    /// recomputed here.
    pub fn display_urls(&self, filter: &RangeFilter) -> Vec<&RangeUrl> {
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut urls: Vec<&RangeUrl> = self
            .urls
            .iter()
            .filter(|u| filter.status.map_or(true, |s| u.status == s))
            .filter(|u| {
                needle
                    .as_deref()
                    .map_or(true, |n| u.slug.to_lowercase().contains(n))
            })
            .collect();

        urls.sort_by(|a, b| {
            let key = |u: &RangeUrl| match filter.sort {
                RangeSort::Profit => u.profit,
                RangeSort::Revenue => u.revenue,
                RangeSort::Spend => u.cost_target,
                RangeSort::Roi => u.roi,
                RangeSort::Clicks => u.clicks as f64,
            };
            key(b).total_cmp(&key(a))
        });
        urls
    }
}

#[derive(Default)]
struct RangeAccumulator {
    revenue: f64,
    cost_source: f64,
    cost_target: f64,
    clicks: u64,
    impressions: u64,
    campaigns: Vec<String>,
    appearances: usize,
    // month -> profit subtotal, kept chronological; used only for trend
    profit_by_month: BTreeMap<String, f64>,
}

impl RangeAccumulator {
    fn absorb(&mut self, url: &ReconciledUrl, month: &str) {
        self.revenue += url.revenue;
        self.cost_source += url.cost_source;
        self.cost_target += url.cost_target;
        self.clicks += url.clicks;
        self.impressions += url.impressions;
        self.appearances += 1;
        *self.profit_by_month.entry(month.to_string()).or_default() += url.profit;
        for campaign in &url.campaigns {
            if !self.campaigns.iter().any(|c| c == campaign) {
                self.campaigns.push(campaign.clone());
            }
        }
    }

    fn trend(&self) -> Trend {
        let mut profits = self.profit_by_month.values();
        let first = profits.next().copied().unwrap_or(0.0);
        let last = profits.next_back().copied().unwrap_or(first);
        let delta = last - first;
        if delta.abs() <= TREND_STABILITY_BAND {
            Trend::Stable
        } else if delta > 0.0 {
            Trend::Improving
        } else {
            Trend::Declining
        }
    }

    fn finish(self, slug: String) -> RangeUrl {
        let profit = self.revenue - self.cost_target;
        let status = classify(self.cost_target, self.revenue);
        let roi = roi_percent(self.cost_target, self.revenue);
        let (revenue_per_click, cost_per_click) = if self.clicks > 0 {
            (
                self.revenue / self.clicks as f64,
                self.cost_target / self.clicks as f64,
            )
        } else {
            (0.0, 0.0)
        };
        let trend = self.trend();

        RangeUrl {
            slug,
            status,
            trend,
            profit,
            roi,
            revenue_per_click,
            cost_per_click,
            revenue: self.revenue,
            cost_source: self.cost_source,
            cost_target: self.cost_target,
            clicks: self.clicks,
            impressions: self.impressions,
            campaigns: self.campaigns,
            appearances: self.appearances,
            months_active: self.profit_by_month.into_keys().collect(),
        }
    }
}

/// Merges every spending url from snapshots dated within `[from, to]`
/// (inclusive on both ends) into unified multi-period records.
pub fn aggregate_range(store: &SnapshotStore, from: NaiveDate, to: NaiveDate) -> RangeReport {
    let matching: Vec<&Snapshot> = store
        .iter()
        .filter(|s| from <= s.date && s.date <= to)
        .collect();

    debug!(
        "range {}..{}: {} of {} snapshots match",
        from,
        to,
        matching.len(),
        store.len()
    );

    let mut order: Vec<String> = Vec::new();
    let mut accumulators: HashMap<String, RangeAccumulator> = HashMap::new();

    for snapshot in &matching {
        let month = snapshot.month_key();
        for url in snapshot.urls.iter().filter(|u| u.has_spend) {
            if !accumulators.contains_key(&url.slug) {
                order.push(url.slug.clone());
            }
            accumulators
                .entry(url.slug.clone())
                .or_default()
                .absorb(url, &month);
        }
    }

    let urls: Vec<RangeUrl> = order
        .into_iter()
        .map(|slug| {
            let acc = accumulators.remove(&slug).unwrap_or_default();
            acc.finish(slug)
        })
        .collect();

    let totals = compute_range_totals(&urls);

    RangeReport {
        from,
        to,
        snapshot_count: matching.len(),
        urls,
        totals,
    }
}

fn compute_range_totals(urls: &[RangeUrl]) -> RangeTotals {
    let mut totals = RangeTotals {
        url_count: urls.len(),
        ..RangeTotals::default()
    };
    for url in urls {
        totals.revenue += url.revenue;
        totals.spend_source += url.cost_source;
        totals.spend_target += url.cost_target;
        totals.clicks += url.clicks;
        totals.impressions += url.impressions;
        totals.profit += url.profit;
        match url.status {
            Status::Profitable => totals.profitable += 1,
            Status::Improving => totals.improving += 1,
            Status::Losing => totals.losing += 1,
            Status::TurnOff => totals.turn_off += 1,
        }
    }
    totals
}

/// One slug's occurrence in one snapshot, paired with that snapshot's
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub snapshot_id: String,
    pub date: NaiveDate,
    pub label: String,
    pub period: Period,
    pub url: ReconciledUrl,
}

/// Collects a slug's record from every snapshot that contains it, in store
/// order (newest import first). Snapshots without the slug are omitted, so
/// the history may be shorter than the store.
pub fn url_history(store: &SnapshotStore, slug: &str) -> Vec<HistoryEntry> {
    let slug = normalize_slug(slug);
    store
        .iter()
        .filter_map(|snapshot| {
            snapshot.url(&slug).map(|url| HistoryEntry {
                snapshot_id: snapshot.id.clone(),
                date: snapshot.date,
                label: snapshot.label.clone(),
                period: snapshot.period,
                url: url.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compute_totals;
    use crate::schema::{Period, Snapshot};
    use chrono::Utc;

    fn url(slug: &str, revenue: f64, cost_target: f64, clicks: u64) -> ReconciledUrl {
        // rate of 1.0 keeps source and target spend identical in fixtures
        ReconciledUrl {
            slug: slug.to_string(),
            status: classify(cost_target, revenue),
            profit: revenue - cost_target,
            roi: roi_percent(cost_target, revenue),
            revenue_per_click: if clicks > 0 { revenue / clicks as f64 } else { 0.0 },
            cost_per_click: if clicks > 0 { cost_target / clicks as f64 } else { 0.0 },
            views: 100,
            revenue,
            rpm: 0.0,
            cpm: 0.0,
            viewability: 0.0,
            fill_rate: 0.0,
            impressions_per_view: 0.0,
            campaigns: vec![format!("{}-campaign", slug)],
            clicks,
            impressions: clicks * 10,
            cost_source: cost_target,
            cost_target,
            has_spend: cost_target > 0.0,
        }
    }

    fn snapshot(id: &str, date: (i32, u32, u32), urls: Vec<ReconciledUrl>) -> Snapshot {
        let totals = compute_totals(&urls);
        Snapshot {
            id: id.to_string(),
            label: id.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            period: Period::Monthly,
            created_at: Utc::now(),
            urls,
            totals,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_trend_sums_same_month_snapshots() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot("a", (2024, 3, 5), vec![url("x", 100.0, 40.0, 10)]));
        store.prepend(snapshot("b", (2024, 3, 20), vec![url("y", 50.0, 120.0, 5)]));
        store.prepend(snapshot("c", (2024, 4, 1), vec![url("z", 10.0, 5.0, 1)]));

        let months = monthly_trend(&store);
        assert_eq!(months.len(), 2);

        let march = &months[0];
        assert_eq!(march.month, "2024-03");
        assert_eq!(march.snapshot_count, 2);
        assert!((march.content_revenue - 150.0).abs() < 1e-9);
        assert!((march.spend_target - 160.0).abs() < 1e-9);
        assert!((march.total_profit - (60.0 - 70.0)).abs() < 1e-9);
        // x: roi 150 -> Profitable; y: roi -58.3 -> TurnOff
        assert_eq!(march.profitable_urls, 1);
        assert_eq!(march.turn_off_urls, 1);
        assert_eq!(march.losing_urls, 0);

        assert_eq!(months[1].month, "2024-04");
    }

    #[test]
    fn test_monthly_trend_keeps_last_twelve_months() {
        let mut store = SnapshotStore::new();
        for m in 1..=12 {
            store.prepend(snapshot(&format!("s{m}"), (2023, m, 1), vec![]));
        }
        store.prepend(snapshot("s13", (2024, 1, 1), vec![]));

        let months = monthly_trend(&store);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].month, "2023-02");
        assert_eq!(months[11].month, "2024-01");
    }

    #[test]
    fn test_monthly_trend_counts_only_spending_urls() {
        let mut store = SnapshotStore::new();
        let no_spend = url("free", 500.0, 0.0, 0);
        assert!(!no_spend.has_spend);
        store.prepend(snapshot("a", (2024, 3, 1), vec![no_spend]));

        let months = monthly_trend(&store);
        assert_eq!(months[0].profitable_urls, 0);
    }

    #[test]
    fn test_range_aggregation_equals_manual_sum() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot("jan", (2024, 1, 10), vec![url("x", 100.0, 50.0, 10)]));
        store.prepend(snapshot("feb", (2024, 2, 10), vec![url("x", 200.0, 80.0, 20)]));
        store.prepend(snapshot("mar", (2024, 3, 10), vec![url("x", 50.0, 10.0, 5)]));

        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 3, 31));
        assert_eq!(report.snapshot_count, 3);
        assert_eq!(report.urls.len(), 1);

        let x = &report.urls[0];
        assert_eq!(x.appearances, 3);
        assert!((x.revenue - 350.0).abs() < 1e-9);
        assert!((x.cost_target - 140.0).abs() < 1e-9);
        assert!((x.profit - 210.0).abs() < 1e-9);
        assert_eq!(x.clicks, 35);
        assert_eq!(x.months_active, vec!["2024-01", "2024-02", "2024-03"]);
        // derived from summed totals: roi = 210/140 = 150%
        assert!((x.roi - 150.0).abs() < 1e-9);
        assert_eq!(x.status, Status::Profitable);
        assert!((x.revenue_per_click - 10.0).abs() < 1e-9);
        // trend: jan profit 50 -> mar profit 40, delta -10 -> Declining
        assert_eq!(x.trend, Trend::Declining);
    }

    #[test]
    fn test_range_boundaries_are_inclusive() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot("a", (2024, 1, 1), vec![url("x", 1.0, 1.0, 1)]));
        store.prepend(snapshot("b", (2024, 1, 31), vec![url("x", 1.0, 1.0, 1)]));

        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 1, 31));
        assert_eq!(report.snapshot_count, 2);
        assert_eq!(report.urls[0].appearances, 2);
    }

    #[test]
    fn test_empty_range_is_explicit_not_an_error() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot("a", (2024, 1, 1), vec![url("x", 1.0, 1.0, 1)]));

        let report = aggregate_range(&store, day(2025, 1, 1), day(2025, 12, 31));
        assert!(report.is_empty_range());
        assert_eq!(report.snapshot_count, 0);
        assert!(report.urls.is_empty());
        assert_eq!(report.totals, RangeTotals::default());
    }

    #[test]
    fn test_range_skips_non_spending_urls() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot(
            "a",
            (2024, 1, 1),
            vec![url("spender", 10.0, 5.0, 2), url("organic", 10.0, 0.0, 0)],
        ));

        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 1, 31));
        assert_eq!(report.urls.len(), 1);
        assert_eq!(report.urls[0].slug, "spender");
        assert!(!report.is_empty_range());
    }

    #[test]
    fn test_trend_stability_band() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot("jan", (2024, 1, 1), vec![url("x", 100.0, 50.0, 1)]));
        store.prepend(snapshot("feb", (2024, 2, 1), vec![url("x", 100.5, 50.0, 1)]));

        // delta = 0.5, inside the +/- 1.0 band
        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 2, 28));
        assert_eq!(report.urls[0].trend, Trend::Stable);

        // single contributing month is Stable by definition
        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 1, 31));
        assert_eq!(report.urls[0].trend, Trend::Stable);

        let mut store = SnapshotStore::new();
        store.prepend(snapshot("jan", (2024, 1, 1), vec![url("x", 100.0, 50.0, 1)]));
        store.prepend(snapshot("feb", (2024, 2, 1), vec![url("x", 160.0, 50.0, 1)]));
        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 2, 28));
        assert_eq!(report.urls[0].trend, Trend::Improving);
    }

    #[test]
    fn test_display_filters_never_touch_totals() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot(
            "a",
            (2024, 1, 1),
            vec![
                url("winner", 200.0, 50.0, 10),
                url("loser", 10.0, 100.0, 10),
                url("meh", 50.0, 45.0, 10),
            ],
        ));
        let report = aggregate_range(&store, day(2024, 1, 1), day(2024, 1, 31));

        assert_eq!(report.totals.url_count, 3);
        assert_eq!(report.totals.profitable, 1);
        assert_eq!(report.totals.turn_off, 1);
        assert_eq!(report.totals.improving, 1);
        assert!((report.totals.profit - (150.0 - 90.0 + 5.0)).abs() < 1e-9);

        let filtered = report.display_urls(&RangeFilter {
            status: Some(Status::Profitable),
            ..RangeFilter::default()
        });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].slug, "winner");
        // totals unchanged by the filter
        assert_eq!(report.totals.url_count, 3);

        let searched = report.display_urls(&RangeFilter {
            search: Some("LOS".to_string()),
            ..RangeFilter::default()
        });
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].slug, "loser");

        let sorted = report.display_urls(&RangeFilter::default());
        assert_eq!(sorted[0].slug, "winner"); // highest profit first
        assert_eq!(sorted[2].slug, "loser");

        let by_spend = report.display_urls(&RangeFilter {
            sort: RangeSort::Spend,
            ..RangeFilter::default()
        });
        assert_eq!(by_spend[0].slug, "loser"); // highest spend first
    }

    #[test]
    fn test_url_history_omits_absent_snapshots() {
        let mut store = SnapshotStore::new();
        store.prepend(snapshot("old", (2024, 1, 1), vec![url("x", 10.0, 5.0, 1)]));
        store.prepend(snapshot("mid", (2024, 2, 1), vec![url("y", 10.0, 5.0, 1)]));
        store.prepend(snapshot("new", (2024, 3, 1), vec![url("x", 20.0, 5.0, 1)]));

        let history = url_history(&store, "/x/");
        assert_eq!(history.len(), 2);
        // store order: newest import first
        assert_eq!(history[0].snapshot_id, "new");
        assert_eq!(history[0].url.revenue, 20.0);
        assert_eq!(history[1].snapshot_id, "old");

        assert!(url_history(&store, "missing").is_empty());
    }
}
