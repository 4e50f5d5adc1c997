//! Markdown table extraction from model output
//!
//! The model is asked to answer with pipe tables; this module pulls them out of
//! the surrounding prose with a single regex and splits them into cells.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

lazy_static! {
    static ref TABLE_RE: Regex =
        Regex::new(r"(?:\|.+\n)+\|[-| :]+\n(?:\|.+\n)+").expect("table regex");
    static ref LINK_RE: Regex = Regex::new(r"\[(.*?)\]\((.*?)\)").expect("link regex");
    static ref SEPARATOR_CELL_RE: Regex = Regex::new(r"^:?-+:?$").expect("separator regex");
}

/// A parsed pipe table: one header row and zero or more body rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column values by header name.
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|h| h == header)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

/// The first and second tables in `text`, empty strings when missing.
pub fn split_tables(text: &str) -> (String, String) {
    let mut tables = TABLE_RE.find_iter(text).map(|m| m.as_str().to_string());
    let first = tables.next().unwrap_or_default();
    let second = tables.next().unwrap_or_default();
    (first, second)
}

/// Parse one table string. Bold markers are stripped and the empty cells
/// outside the leading and trailing pipes are dropped.
pub fn parse_table(md: &str) -> Option<Table> {
    let clean = md.replace("**", "");
    let mut lines = clean.lines().map(str::trim).filter(|line| !line.is_empty());

    let headers = split_row(lines.next()?);
    if headers.is_empty() {
        warn!("Table has no header cells");
        return None;
    }

    let rows = lines
        .map(split_row)
        .filter(|cells| !is_separator(cells))
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .collect();

    Some(Table { headers, rows })
}

/// Locate and parse the first table in free text.
pub fn first_table(text: &str) -> Option<Table> {
    let clean = text.replace("**", "");
    let found = TABLE_RE.find(&clean)?;
    parse_table(found.as_str())
}

/// Rewrite `[label](url)` as `label (URL: url)`.
pub fn extract_links(text: &str) -> String {
    LINK_RE.replace_all(text, "$1 (URL: $2)").into_owned()
}

fn split_row(line: &str) -> Vec<String> {
    let cells: Vec<&str> = line.split('|').collect();
    if cells.len() < 2 {
        return Vec::new();
    }
    cells[1..cells.len() - 1]
        .iter()
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|cell| SEPARATOR_CELL_RE.is_match(&cell.replace(' ', "")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = "Here is the breakdown:\n\n\
| Segment | Share | Growth |\n\
|---------|:-----:|--------|\n\
| **Passenger** | 62% | 18% |\n\
| Commercial | 38% | 24% |\n\
\n\
And related markets:\n\n\
| Market | Link |\n\
| --- | --- |\n\
| Charging | [IEA](https://iea.org) |\n";

    #[test]
    fn test_split_tables() {
        let (first, second) = split_tables(ANSWER);
        assert!(first.starts_with("| Segment"));
        assert!(first.contains("Commercial"));
        assert!(second.starts_with("| Market"));
    }

    #[test]
    fn test_split_tables_missing() {
        let (first, second) = split_tables("no tables here");
        assert!(first.is_empty());
        assert!(second.is_empty());

        let (first, second) = split_tables("| A |\n|---|\n| 1 |\n");
        assert_eq!(first, "| A |\n|---|\n| 1 |\n");
        assert!(second.is_empty());
    }

    #[test]
    fn test_parse_table_strips_bold_and_separator() {
        let table = first_table(ANSWER).unwrap();
        assert_eq!(table.headers, vec!["Segment", "Share", "Growth"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "Passenger");
        assert_eq!(table.column("Share").unwrap(), vec!["62%", "38%"]);
    }

    #[test]
    fn test_parse_table_drops_blank_rows() {
        let table = parse_table("| A | B |\n|---|---|\n|   |   |\n| x | y |\n").unwrap();
        assert_eq!(table.rows, vec![vec!["x".to_string(), "y".to_string()]]);
    }

    #[test]
    fn test_first_table_none() {
        assert!(first_table("Failed to get regional analysis").is_none());
    }

    #[test]
    fn test_extract_links() {
        assert_eq!(
            extract_links("see [IEA](https://iea.org) now"),
            "see IEA (URL: https://iea.org) now"
        );
    }
}
