/// Tolerant coercion of currency/percent-formatted report cells into numbers.
///
/// Export tools wrap values in quotes, thousands separators, currency symbols
/// (`$`, `₹`) and percent signs, and emit `--` for empty cells. All of that is
/// stripped before parsing; anything left that still fails to parse degrades
/// silently to zero rather than aborting an import.
pub fn to_number(raw: &str) -> f64 {
    to_number_lossy(raw).0
}

/// Like [`to_number`], additionally reporting whether the coercion was lossy:
/// the cleaned cell was non-empty but still failed to parse. The flag feeds
/// per-report diagnostics; it never turns into an error.
pub fn to_number_lossy(raw: &str) -> (f64, bool) {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '₹' | '%' | '"' | '\'' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned == "--" {
        return (0.0, false);
    }

    match cleaned.parse::<f64>() {
        Ok(v) => (v, false),
        Err(_) => (0.0, true),
    }
}
