use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::FrontmatterError;

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-{3,}$").unwrap());

/// Metadata split off the start of a record's content.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontmatterBlock {
    pub metadata: Map<String, Value>,
    pub body: String,
}

/// Split an embedded `---` delimited YAML block off `raw`.
///
/// `Ok(None)` when the content does not start with a separator line. Any
/// other separator count than two, or a block that is not a YAML mapping, is
/// an error and the caller keeps the content as it was.
pub fn extract(raw: &str) -> Result<Option<FrontmatterBlock>, FrontmatterError> {
    let trimmed = raw.trim();
    let first = trimmed.lines().next().unwrap_or("");
    if !is_separator(first) {
        return Ok(None);
    }

    let mut separators = 0;
    let mut yaml = String::new();
    let mut rest: Vec<&str> = Vec::new();
    for line in trimmed.split('\n') {
        if is_separator(line) {
            separators += 1;
            continue;
        }
        if separators >= 2 {
            rest.push(line);
        } else {
            yaml.push_str(line);
            yaml.push('\n');
        }
    }

    if separators != 2 {
        return Err(FrontmatterError::SeparatorCount { found: separators });
    }

    let metadata = match serde_yaml::from_str::<Value>(&yaml)
        .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?
    {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(FrontmatterError::InvalidYaml(format!(
                "expected a mapping, got {}",
                kind_of(&other)
            )))
        }
    };

    Ok(Some(FrontmatterBlock {
        metadata,
        body: rest.join("\n"),
    }))
}

fn is_separator(line: &str) -> bool {
    SEPARATOR_RE.is_match(line.strip_suffix('\r').unwrap_or(line))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

// ── Tests ──


// Include property-based tests
#[cfg(test)]
#[path = "frontmatter_proptests.rs"]
mod proptests;
