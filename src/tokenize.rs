/// Prepares raw export text for line-oriented parsing: strips a leading
/// byte-order mark, normalizes all line terminators to `\n`, and trims
/// leading/trailing whitespace from the whole text.
pub fn normalize_text(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

/// Splits one physical line on commas outside of double-quote-delimited
/// spans. This is a toggling quote state, not full RFC 4180: `""` inside a
/// quoted field is not unescaped to a literal quote, and quoted fields cannot
/// span lines (line splitting has already happened by the time this runs).
/// Both export formats in scope stay within those limits. Fields are trimmed.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_strips_bom_and_newlines() {
        let raw = "\u{feff}a,b\r\nc,d\re,f\n";
        assert_eq!(normalize_text(raw), "a,b\nc,d\ne,f");
    }

    #[test]
    fn test_split_line_plain() {
        assert_eq!(split_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_line(" a , b "), vec!["a", "b"]);
    }

    #[test]
    fn test_split_line_quoted_comma() {
        assert_eq!(
            split_line("\"Campaign, One\",500,10"),
            vec!["Campaign, One", "500", "10"]
        );
    }

    #[test]
    fn test_split_line_trailing_empty_field() {
        assert_eq!(split_line("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_split_line_does_not_unescape_doubled_quotes() {
        // Known simplification: "" inside a quoted span toggles twice and
        // contributes nothing, it does not become a literal quote.
        assert_eq!(split_line("\"he said \"\"hi\"\"\",x"), vec!["he said hi", "x"]);
    }
}
