use crate::error::{PageProfitError, Result};
use crate::schema::{
    normalize_slug, slug_from_url, ContentRow, Period, ReconciledUrl, Snapshot, SnapshotTotals,
    SpendLine,
};
use crate::status::{classify, roi_percent};
use chrono::{NaiveDate, Utc};
use log::{debug, info};
use rand::Rng;
use std::collections::HashMap;

/// Caller-supplied import metadata. Label and date fall back to the creation
/// instant when absent.
#[derive(Debug, Clone, Default)]
pub struct ImportMeta {
    pub label: Option<String>,
    pub date: Option<NaiveDate>,
    pub period: Period,
}

// Spend rows accumulated per normalized slug, across campaigns.
#[derive(Default)]
struct SpendAccumulator {
    campaigns: Vec<String>,
    clicks: u64,
    impressions: u64,
    cost_source: f64,
}

/// Joins the two row sets by normalized slug and derives one financial
/// record per page. The exchange rate is fixed at construction and baked
/// into every snapshot this reconciler produces.
pub struct Reconciler {
    exchange_rate: f64,
}

impl Reconciler {
    pub fn new(exchange_rate: f64) -> Result<Self> {
        if !exchange_rate.is_finite() || exchange_rate <= 0.0 {
            return Err(PageProfitError::InvalidExchangeRate(exchange_rate));
        }
        Ok(Self { exchange_rate })
    }

    pub fn exchange_rate(&self) -> f64 {
        self.exchange_rate
    }

    /// Produces one immutable [`Snapshot`] from the extracted rows. Inputs
    /// are never mutated; the caller owns prepending the result to a store.
    pub fn reconcile(
        &self,
        content: &[ContentRow],
        spend: &[SpendLine],
        meta: ImportMeta,
    ) -> Snapshot {
        let mut order: Vec<String> = Vec::new();

        // 1. Index content rows by normalized slug, first row wins.
        let mut content_by_slug: HashMap<String, &ContentRow> = HashMap::new();
        for row in content {
            let slug = normalize_slug(&row.slug);
            if slug.is_empty() {
                continue;
            }
            content_by_slug.entry(slug.clone()).or_insert_with(|| {
                order.push(slug.clone());
                row
            });
        }

        // 2. Accumulate spend rows per slug: sums plus the campaign union.
        //    Several campaigns targeting one landing page must add, never
        //    overwrite.
        let mut spend_by_slug: HashMap<String, SpendAccumulator> = HashMap::new();
        for line in spend {
            let slug = slug_from_url(&line.landing_page);
            if slug.is_empty() {
                continue;
            }
            if !content_by_slug.contains_key(&slug) && !spend_by_slug.contains_key(&slug) {
                order.push(slug.clone());
            }
            let acc = spend_by_slug.entry(slug).or_default();
            acc.clicks += line.clicks;
            acc.impressions += line.impressions;
            acc.cost_source += line.cost_source;
            let campaign = line.campaign.trim();
            if !campaign.is_empty() && !acc.campaigns.iter().any(|c| c == campaign) {
                acc.campaigns.push(campaign.to_string());
            }
        }

        // 3+4. Walk the merged slug set in discovery order, zero-filling the
        //      absent side and deriving the financial fields.
        let urls: Vec<ReconciledUrl> = order
            .iter()
            .map(|slug| {
                self.reconcile_one(
                    slug,
                    content_by_slug.get(slug).copied(),
                    spend_by_slug.remove(slug).unwrap_or_default(),
                )
            })
            .collect();

        // 5. Totals over every url, spending or not.
        let totals = compute_totals(&urls);

        // 6. Snapshot identity and metadata.
        let created_at = Utc::now();
        let id = new_snapshot_id(created_at.timestamp_millis());
        let label = meta
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| format!("Import {}", created_at.format("%Y-%m-%d %H:%M")));
        let date = meta.date.unwrap_or_else(|| created_at.date_naive());

        info!(
            "reconciled {} urls ({} spending) at rate {}",
            totals.url_count, totals.spending_url_count, self.exchange_rate
        );

        Snapshot {
            id,
            label,
            date,
            period: meta.period,
            created_at,
            urls,
            totals,
        }
    }

    fn reconcile_one(
        &self,
        slug: &str,
        content: Option<&ContentRow>,
        spend: SpendAccumulator,
    ) -> ReconciledUrl {
        let revenue = content.map_or(0.0, |c| c.revenue);
        let cost_target = spend.cost_source / self.exchange_rate;
        let profit = revenue - cost_target;
        let status = classify(cost_target, revenue);
        let roi = roi_percent(cost_target, revenue);

        let (revenue_per_click, cost_per_click) = if spend.clicks > 0 {
            (
                revenue / spend.clicks as f64,
                cost_target / spend.clicks as f64,
            )
        } else {
            (0.0, 0.0)
        };

        debug!("{}: profit {:.2}, roi {:.1}, {:?}", slug, profit, roi, status);

        ReconciledUrl {
            slug: slug.to_string(),
            status,
            profit,
            roi,
            revenue_per_click,
            cost_per_click,
            views: content.map_or(0, |c| c.views),
            revenue,
            rpm: content.map_or(0.0, |c| c.rpm),
            cpm: content.map_or(0.0, |c| c.cpm),
            viewability: content.map_or(0.0, |c| c.viewability),
            fill_rate: content.map_or(0.0, |c| c.fill_rate),
            impressions_per_view: content.map_or(0.0, |c| c.impressions_per_view),
            campaigns: spend.campaigns,
            clicks: spend.clicks,
            impressions: spend.impressions,
            cost_source: spend.cost_source,
            cost_target,
            has_spend: spend.cost_source > 0.0,
        }
    }
}

pub(crate) fn compute_totals(urls: &[ReconciledUrl]) -> SnapshotTotals {
    let mut totals = SnapshotTotals {
        url_count: urls.len(),
        ..SnapshotTotals::default()
    };
    for url in urls {
        totals.content_revenue += url.revenue;
        totals.spend_source += url.cost_source;
        totals.spend_target += url.cost_target;
        totals.clicks += url.clicks;
        totals.impressions += url.impressions;
        totals.total_profit += url.profit;
        if url.has_spend {
            totals.spending_url_count += 1;
        }
    }
    totals
}

fn new_snapshot_id(timestamp_millis: i64) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("{:x}-{:06x}", timestamp_millis, suffix)
}
