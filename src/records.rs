use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Columns holding free text that is never read as a flag.
const TEXT_COLUMNS: &[&str] = &["content"];

/// One spreadsheet row as delivered by a sheet source: column name → cell text.
pub type RawRow = BTreeMap<String, String>;

/// Canonical, typed representation of one spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Non-empty string field, with surrounding whitespace removed.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Record name for log lines and warnings.
    pub fn display_name(&self) -> String {
        self.name().unwrap_or("<unnamed>").to_string()
    }

    pub fn published(&self) -> bool {
        self.0.get("published").is_some_and(is_truthy)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }
}

#[cfg(test)]
impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

/// Truthiness as the site templates see it.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Convert the raw rows of one sheet into records.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<Record> {
    rows.iter().filter_map(normalize_row).collect()
}

fn normalize_row(row: &RawRow) -> Option<Record> {
    let mut fields = Map::new();
    for (column, cell) in row {
        let column = column.trim();
        if column.is_empty() || column.starts_with('#') {
            continue;
        }
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let key = camel_case(column);
        let value = parse_cell(&key, cell);
        fields.insert(key, value);
    }

    if fields.is_empty() {
        None
    } else {
        Some(Record(fields))
    }
}

fn parse_cell(key: &str, cell: &str) -> Value {
    if TEXT_COLUMNS.contains(&key) {
        return Value::String(cell.to_string());
    }
    let lower = cell.to_lowercase();
    if key == "published" {
        return Value::Bool(matches!(lower.as_str(), "true" | "yes" | "x" | "1"));
    }
    match lower.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

/// "Talk Title" → "talkTitle", "logo_url" → "logoUrl"; already camel-cased
/// names pass through with a lowercased first letter.
fn camel_case(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    for (i, word) in column
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn camel_cases_columns() {
        assert_eq!(camel_case("Talk Title"), "talkTitle");
        assert_eq!(camel_case("logo_url"), "logoUrl");
        assert_eq!(camel_case("potraitImageUrl"), "potraitImageUrl");
        assert_eq!(camel_case("Name"), "name");
    }

    #[test]
    fn drops_empty_cells_and_comment_columns() {
        let records = normalize_rows(&[row(&[
            ("name", " Jane Doe "),
            ("talk title", ""),
            ("# notes", "internal"),
        ])]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), Some("Jane Doe"));
        assert!(records[0].str_field("talkTitle").is_none());
        assert!(records[0].str_field("notes").is_none());
    }

    #[test]
    fn skips_fully_empty_rows() {
        let records = normalize_rows(&[row(&[("name", ""), ("published", " ")])]);
        assert!(records.is_empty());
    }

    #[test]
    fn published_flag_variants() {
        for (cell, expected) in [("TRUE", true), ("x", true), ("yes", true), ("FALSE", false), ("no", false)] {
            let records = normalize_rows(&[row(&[("name", "A"), ("published", cell)])]);
            assert_eq!(records[0].published(), expected, "cell {:?}", cell);
        }
    }

    #[test]
    fn content_cells_stay_text() {
        let records = normalize_rows(&[row(&[("name", "A"), ("content", "TRUE"), ("featured", "FALSE")])]);
        assert_eq!(records[0].str_field("content"), Some("TRUE"));
        assert_eq!(records[0].0.get("featured"), Some(&Value::Bool(false)));
    }

    #[test]
    fn missing_published_means_unpublished() {
        let record = Record::new().with("name", "A");
        assert!(!record.published());
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&Value::String(String::new())));
        assert!(is_truthy(&Value::String("yes".into())));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(is_truthy(&serde_json::json!([])));
    }
}
