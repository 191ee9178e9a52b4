//! Minimal extraction of `wikitable` tables from rendered wiki HTML.
//!
//! Regex-based: good enough for the well-formed tables the wiki renderer
//! emits, not a general HTML parser. Nested tables are not supported.

use once_cell::sync::Lazy;
use regex::Regex;

static TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<table\b[^>]*class="[^"]*\bwikitable\b[^"]*"[^>]*>(.*?)</table>"#).unwrap()
});
static ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</t[hd]>").unwrap());
static SUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<sup\b[^>]*>.*?</sup>").unwrap());
static STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap());
static BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static FOOTNOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:\d+|[a-z]|note \d+)\]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&ldquo;", "\u{201c}"),
    ("&rdquo;", "\u{201d}"),
    ("&#8220;", "\u{201c}"),
    ("&#8221;", "\u{201d}"),
    ("&ndash;", "\u{2013}"),
    ("&#8211;", "\u{2013}"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
];

#[derive(Debug, Clone)]
pub struct Cell {
    /// Inner HTML as found in the page.
    pub html: String,
    /// Cleaned display text.
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl HtmlTable {
    /// Index of the first header matching `pred` (given lowercased text).
    pub fn column(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| pred(h.to_lowercase().as_str()))
    }
}

/// Every `wikitable` in the page, in document order.
///
/// The header row is the first row made only of `<th>` cells; rows after it
/// are data rows.
pub fn wikitables(html: &str) -> Vec<HtmlTable> {
    TABLE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|body| parse_table(body.as_str()))
        .collect()
}

fn parse_table(body: &str) -> HtmlTable {
    let mut table = HtmlTable::default();
    let mut seen_header = false;

    for row in ROW.captures_iter(body).filter_map(|c| c.get(1)) {
        let cells: Vec<(bool, Cell)> = CELL
            .captures_iter(row.as_str())
            .map(|c| {
                let is_header = c[1].eq_ignore_ascii_case("th");
                let inner = c.get(2).map(|m| m.as_str()).unwrap_or_default();
                (
                    is_header,
                    Cell {
                        html: inner.to_string(),
                        text: cell_text(inner),
                    },
                )
            })
            .collect();
        if cells.is_empty() {
            continue;
        }

        if !seen_header {
            if cells.iter().all(|(is_header, _)| *is_header) {
                table.headers = cells.into_iter().map(|(_, c)| c.text).collect();
                seen_header = true;
            }
            continue;
        }
        table.rows.push(cells.into_iter().map(|(_, c)| c).collect());
    }
    table
}

/// Display text of an HTML fragment.
pub fn cell_text(html: &str) -> String {
    let text = STYLE.replace_all(html, "");
    let text = SUP.replace_all(&text, "");
    let text = BREAK.replace_all(&text, " ");
    let text = TAG.replace_all(&text, "");
    let mut text = FOOTNOTE.replace_all(&text, "").into_owned();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
