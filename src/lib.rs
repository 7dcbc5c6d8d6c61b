//! # Page Profit
//!
//! A library for reconciling two heterogeneous CSV exports — a per-page
//! content-revenue report and a per-landing-page ad-spend report — into
//! per-page profitability snapshots, with time-bucketed rollups over many
//! snapshots.
//!
//! ## Core Concepts
//!
//! - **Slug**: normalized URL path, the join key between the two sources
//! - **Reconciliation**: the join + derive step producing one financial
//!   record per slug, spend converted to the target currency at the rate in
//!   effect at import time
//! - **Snapshot**: one immutable import event's full reconciled dataset plus
//!   metadata; stored newest-import-first
//! - **Rollups**: monthly trend, arbitrary date-range aggregation with trend
//!   direction, and per-slug history, all recomputed from the store on demand
//!
//! ## Example
//!
//! ```rust,ignore
//! use page_profit::*;
//!
//! let settings = Settings::default();
//! let request = ImportRequest {
//!     content_csv: Some(content_text),
//!     spend_csv: Some(spend_text),
//!     meta: ImportMeta::default(),
//! };
//!
//! let outcome = ImportProcessor::import(&request, &settings)?;
//! if outcome.spend_stats.looks_misformatted() {
//!     // warn the user: non-empty file, zero rows parsed
//! }
//!
//! let mut store = SnapshotStore::new();
//! store.prepend(outcome.snapshot);
//! let trend = monthly_trend(&store);
//! ```

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod numeric;
pub mod schema;
pub mod status;
pub mod store;
pub mod tokenize;

pub use aggregate::{
    aggregate_range, monthly_trend, url_history, HistoryEntry, MonthlyRollup, RangeFilter,
    RangeReport, RangeSort, RangeTotals, RangeUrl, Trend,
};
pub use engine::{ImportMeta, Reconciler};
pub use error::{PageProfitError, Result};
pub use export::{range_csv, snapshot_csv, status_bucket_csv};
pub use ingestion::{extract_content_rows, extract_spend_lines, ReportStats};
pub use numeric::to_number;
pub use schema::*;
pub use status::{classify, roi_percent, Status};
pub use store::{
    load_settings, load_store, save_settings, save_store, BlobStore, MemoryBlobStore,
    SnapshotStore, SETTINGS_KEY, SNAPSHOTS_KEY,
};

use log::info;

/// One import request: either report may be absent, and a snapshot is still
/// produced from whatever is present.
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub content_csv: Option<String>,
    pub spend_csv: Option<String>,
    pub meta: ImportMeta,
}

/// The produced snapshot plus per-report extraction diagnostics, so callers
/// can distinguish "file not provided" from "non-empty file, zero rows".
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub snapshot: Snapshot,
    pub content_stats: ReportStats,
    pub spend_stats: ReportStats,
}

pub struct ImportProcessor;

impl ImportProcessor {
    /// Runs extraction and reconciliation for one import. The exchange rate
    /// is taken from `settings` and baked into the snapshot; later settings
    /// changes never revalue it.
    pub fn import(request: &ImportRequest, settings: &Settings) -> Result<ImportOutcome> {
        let reconciler = Reconciler::new(settings.exchange_rate)?;

        let (content_rows, content_stats) =
            extract_content_rows(request.content_csv.as_deref().unwrap_or(""));
        let (spend_lines, spend_stats) =
            extract_spend_lines(request.spend_csv.as_deref().unwrap_or(""));

        info!(
            "import: {} content rows, {} spend rows",
            content_stats.row_count, spend_stats.row_count
        );

        let snapshot = reconciler.reconcile(&content_rows, &spend_lines, request.meta.clone());

        Ok(ImportOutcome {
            snapshot,
            content_stats,
            spend_stats,
        })
    }

    /// Runs one import and prepends the resulting snapshot to `store`, so it
    /// becomes "latest" regardless of its date.
    pub fn import_into(
        store: &mut SnapshotStore,
        request: &ImportRequest,
        settings: &Settings,
    ) -> Result<ImportOutcome> {
        let outcome = Self::import(request, settings)?;
        store.prepend(outcome.snapshot.clone());
        Ok(outcome)
    }
}

/// Convenience wrapper around [`ImportProcessor::import`].
pub fn import_reports(request: &ImportRequest, settings: &Settings) -> Result<ImportOutcome> {
    ImportProcessor::import(request, settings)
}
