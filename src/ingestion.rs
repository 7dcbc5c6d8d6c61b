use crate::numeric::to_number_lossy;
use crate::schema::{ContentRow, SpendLine};
use crate::tokenize::{normalize_text, split_line};
use log::{debug, warn};

/// Marker substrings that identify the real spend-report header among
/// arbitrary preamble lines. All three must appear on the same line; a report
/// title may coincidentally contain one of them alone.
const LANDING_PAGE_MARKER: &str = "Landing page";
const COST_MARKER: &str = "Cost";
const CLICKS_MARKER: &str = "Clicks";

/// Data rows in a spend export are exactly the lines carrying a full landing
/// page URL. Summary/total footer lines never start with this prefix.
const DATA_ROW_PREFIX: &str = "https://";

/// Extraction diagnostics for one report. `looks_misformatted` is the only
/// user-visible failure class worth surfacing: a non-empty input that parsed
/// to zero rows, distinguishable from no input at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub provided: bool,
    pub line_count: usize,
    pub row_count: usize,
    pub coercion_warnings: usize,
}

impl ReportStats {
    pub fn looks_misformatted(&self) -> bool {
        self.provided && self.row_count == 0
    }
}

/// Lowercases a header cell and strips everything but letters and digits, so
/// `Fill Rate`, `fill-rate` and `FillRate` all land on `fillrate`.
fn normalize_header(cell: &str) -> String {
    cell.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

struct FieldReader<'a> {
    headers: &'a [String],
    fields: &'a [String],
    warnings: usize,
}

impl<'a> FieldReader<'a> {
    fn new(headers: &'a [String], fields: &'a [String]) -> Self {
        Self {
            headers,
            fields,
            warnings: 0,
        }
    }

    fn text(&self, key: &str) -> &str {
        self.headers
            .iter()
            .position(|h| h == key)
            .and_then(|idx| self.fields.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn text_any(&self, keys: &[&str]) -> &str {
        for key in keys {
            let idx = self.headers.iter().position(|h| h == key);
            if let Some(value) = idx.and_then(|i| self.fields.get(i)) {
                return value;
            }
        }
        ""
    }

    fn number(&mut self, key: &str) -> f64 {
        self.number_any(&[key])
    }

    fn number_any(&mut self, keys: &[&str]) -> f64 {
        let (value, lossy) = to_number_lossy(self.text_any(keys));
        if lossy {
            self.warnings += 1;
        }
        value
    }

    fn count(&mut self, key: &str) -> u64 {
        self.number(key).max(0.0) as u64
    }
}

/// Extracts typed rows from the content-revenue export. The header is always
/// the first non-blank line; names are matched case-insensitively. Rows
/// without a slug are dropped silently.
pub fn extract_content_rows(text: &str) -> (Vec<ContentRow>, ReportStats) {
    let normalized = normalize_text(text);
    let mut stats = ReportStats {
        provided: !normalized.is_empty(),
        ..ReportStats::default()
    };
    if !stats.provided {
        return (Vec::new(), stats);
    }

    let lines: Vec<&str> = normalized.lines().filter(|l| !l.trim().is_empty()).collect();
    stats.line_count = lines.len();

    let Some((header_line, data_lines)) = lines.split_first() else {
        return (Vec::new(), stats);
    };
    let headers: Vec<String> = split_line(header_line)
        .iter()
        .map(|h| normalize_header(h))
        .collect();

    let mut rows = Vec::new();
    for line in data_lines {
        let fields = split_line(line);
        let mut reader = FieldReader::new(&headers, &fields);

        let slug = reader.text("slug").to_string();
        if slug.is_empty() {
            continue;
        }

        let row = ContentRow {
            views: reader.count("views"),
            revenue: reader.number("revenue"),
            rpm: reader.number("rpm"),
            cpm: reader.number("cpm"),
            viewability: reader.number("viewability"),
            fill_rate: reader.number("fillrate"),
            impressions_per_view: reader.number_any(&[
                "impressionspergapeview",
                "impressionsperpageview",
                "impressionsperview",
            ]),
            slug,
        };
        stats.coercion_warnings += reader.warnings;
        rows.push(row);
    }

    stats.row_count = rows.len();
    debug!(
        "content report: {} rows from {} lines ({} coercion warnings)",
        stats.row_count, stats.line_count, stats.coercion_warnings
    );
    if stats.looks_misformatted() {
        warn!("content report parsed to 0 rows from non-empty input; likely a format mismatch");
    }
    (rows, stats)
}

/// Locates the spend-report header line. Export tools prepend report titles
/// and date ranges, so the header is found by scanning for a line carrying
/// all three marker columns; the fallback accepts the first wide line that at
/// least names the landing-page column.
fn find_spend_header(lines: &[&str]) -> Option<usize> {
    let exact = lines.iter().position(|l| {
        l.contains(LANDING_PAGE_MARKER) && l.contains(COST_MARKER) && l.contains(CLICKS_MARKER)
    });
    if exact.is_some() {
        return exact;
    }

    lines
        .iter()
        .position(|l| l.contains(LANDING_PAGE_MARKER) && split_line(l).len() > 5)
}

/// Extracts one [`SpendLine`] per campaign data row from the ad-spend export.
/// A missing header is not an error: the extractor yields zero rows and the
/// import proceeds content-only.
pub fn extract_spend_lines(text: &str) -> (Vec<SpendLine>, ReportStats) {
    let normalized = normalize_text(text);
    let mut stats = ReportStats {
        provided: !normalized.is_empty(),
        ..ReportStats::default()
    };
    if !stats.provided {
        return (Vec::new(), stats);
    }

    let lines: Vec<&str> = normalized.lines().filter(|l| !l.trim().is_empty()).collect();
    stats.line_count = lines.len();

    let Some(header_idx) = find_spend_header(&lines) else {
        warn!("spend report header not found; treating input as empty");
        return (Vec::new(), stats);
    };
    // Spend column names are matched exactly, unlike the content side.
    let headers = split_line(lines[header_idx]);

    let mut rows = Vec::new();
    for line in &lines[header_idx + 1..] {
        if !line.starts_with(DATA_ROW_PREFIX) {
            continue;
        }
        let fields = split_line(line);
        let mut reader = FieldReader::new(&headers, &fields);

        let row = SpendLine {
            landing_page: reader.text("Landing page").to_string(),
            campaign: reader.text("Campaign").to_string(),
            clicks: reader.count("Clicks"),
            impressions: reader.count("Impr."),
            cost_source: reader.number("Cost"),
        };
        stats.coercion_warnings += reader.warnings;
        rows.push(row);
    }

    stats.row_count = rows.len();
    debug!(
        "spend report: {} rows from {} lines ({} coercion warnings)",
        stats.row_count, stats.line_count, stats.coercion_warnings
    );
    if stats.looks_misformatted() {
        warn!("spend report parsed to 0 rows from non-empty input; likely a format mismatch");
    }
    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_CSV: &str = "\
Slug,Views,Revenue,RPM,CPM,Viewability,Fill Rate,Impressions Per GA Pe View
/hello/,1000,\"$12.50\",12.5,1.1,85%,92%,1.4
world,500,5,10,1.0,80,90,1.2
,100,1,1,1,1,1,1
";

    const SPEND_CSV: &str = "\
Campaign performance report
All campaigns,2024-03-01 to 2024-03-31
Landing page,Campaign,Clicks,Impr.,CTR,Avg. CPC,Cost
https://site.com/hello/,Campaign A,50,\"1,000\",5%,10,500
https://site.com/hello,Campaign B,25,500,5%,10,250
https://other.com/world,Campaign C,10,200,5%,10,100
Total: account,,85,\"1,700\",,,850
";

    #[test]
    fn test_content_extraction() {
        let (rows, stats) = extract_content_rows(CONTENT_CSV);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].slug, "/hello/");
        assert_eq!(rows[0].views, 1000);
        assert_eq!(rows[0].revenue, 12.5);
        assert_eq!(rows[0].viewability, 85.0);
        assert_eq!(rows[0].fill_rate, 92.0);
        assert_eq!(rows[0].impressions_per_view, 1.4);
        assert_eq!(rows[1].slug, "world");
        assert_eq!(stats.row_count, 2);
        assert!(!stats.looks_misformatted());
    }

    #[test]
    fn test_content_rows_without_slug_are_dropped() {
        let (rows, _) = extract_content_rows("slug,revenue\n,5\nkeep,7\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "keep");
    }

    #[test]
    fn test_content_header_matching_is_case_insensitive() {
        let (rows, _) = extract_content_rows("SLUG,REVENUE\nfoo,9.5\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue, 9.5);
    }

    #[test]
    fn test_spend_extraction_skips_preamble_and_footer() {
        let (rows, stats) = extract_spend_lines(SPEND_CSV);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].landing_page, "https://site.com/hello/");
        assert_eq!(rows[0].campaign, "Campaign A");
        assert_eq!(rows[0].clicks, 50);
        assert_eq!(rows[0].impressions, 1000);
        assert_eq!(rows[0].cost_source, 500.0);
        assert_eq!(stats.row_count, 3);
    }

    #[test]
    fn test_spend_header_fallback_on_wide_landing_page_line() {
        // No line has all three markers; the wide landing-page line wins.
        let csv = "\
Landing page report
Landing page,Campaign,Taps,Impr.,CTR,Avg. CPC,Spend
https://site.com/a,C1,5,100,1%,2,10
";
        let (rows, _) = extract_spend_lines(csv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].landing_page, "https://site.com/a");
        // Columns absent from the located header coerce to zero.
        assert_eq!(rows[0].clicks, 0);
        assert_eq!(rows[0].cost_source, 0.0);
    }

    #[test]
    fn test_spend_header_not_found_yields_zero_rows() {
        let (rows, stats) = extract_spend_lines("just,some,text\nwith,no,header\n");
        assert!(rows.is_empty());
        assert!(stats.provided);
        assert!(stats.looks_misformatted());
    }

    #[test]
    fn test_empty_input_is_not_a_format_mismatch() {
        let (rows, stats) = extract_spend_lines("   ");
        assert!(rows.is_empty());
        assert!(!stats.provided);
        assert!(!stats.looks_misformatted());

        let (rows, stats) = extract_content_rows("");
        assert!(rows.is_empty());
        assert!(!stats.looks_misformatted());
    }

    #[test]
    fn test_coercion_warnings_are_counted() {
        let (rows, stats) = extract_content_rows("slug,revenue,rpm\nfoo,oops,n/a\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue, 0.0);
        assert_eq!(stats.coercion_warnings, 2);
    }

    #[test]
    fn test_bom_and_crlf_input() {
        let csv = "\u{feff}slug,revenue\r\nfoo,3\r\n";
        let (rows, _) = extract_content_rows(csv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue, 3.0);
    }
}
