use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::records::Record;

/// How a category composes titles and picks the text its filename is
/// slugged from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRule {
    /// `name`, or `name: talkTitle` for speakers giving a talk.
    Speaker,
    /// `firstname lastname: talkTitle`
    Artist,
    /// `firstname lastname`
    TeamMember,
    /// `name`
    Plain,
}

impl CategoryRule {
    pub fn title(self, record: &Record) -> Option<String> {
        let title = match self {
            CategoryRule::Speaker => {
                let name = record.name()?;
                let is_talk = record.str_field("type").map_or(true, |t| t == "speaker");
                match record.str_field("talkTitle") {
                    Some(talk) if is_talk => format!("{}: {}", name, talk),
                    _ => name.to_string(),
                }
            }
            CategoryRule::Artist => {
                let full = full_name(record);
                match record.str_field("talkTitle") {
                    Some(talk) if !full.is_empty() => format!("{}: {}", full, talk),
                    _ => full,
                }
            }
            CategoryRule::TeamMember => full_name(record),
            CategoryRule::Plain => record.name()?.to_string(),
        };
        Some(title).filter(|t| !t.trim().is_empty())
    }

    /// Text the filename slug is derived from. Speakers keep one page per
    /// person even when the talk title changes.
    pub fn slug_source<'a>(self, record: &'a Record, title: &'a str) -> &'a str {
        match self {
            CategoryRule::Speaker => record.name().unwrap_or(title),
            _ => title,
        }
    }
}

fn full_name(record: &Record) -> String {
    [record.str_field("firstname"), record.str_field("lastname")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output settings for one sheet.
#[derive(Debug, Clone)]
pub struct Category {
    pub rule: CategoryRule,
    /// Metadata every document of this category starts from.
    pub template_defaults: Map<String, Value>,
    /// Metadata key the full record is stored under.
    pub data_field_name: String,
    /// Directory (relative to the content root) documents are written to.
    pub destination_path: String,
    pub forced_image_extension: Option<String>,
}

impl Category {
    pub fn new(rule: CategoryRule, data_field_name: &str, destination_path: &str) -> Self {
        Self {
            rule,
            template_defaults: Map::new(),
            data_field_name: data_field_name.to_string(),
            destination_path: destination_path.to_string(),
            forced_image_extension: None,
        }
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template_defaults.insert("template".to_string(), json!(template));
        self
    }

    pub fn with_image_extension(mut self, ext: &str) -> Self {
        self.forced_image_extension = Some(ext.to_string());
        self
    }
}

/// Sheet id → category.
pub type CategoryTable = HashMap<String, Category>;

pub fn default_table() -> CategoryTable {
    HashMap::from([
        (
            "artists".to_string(),
            Category::new(CategoryRule::Artist, "artist", "artists"),
        ),
        (
            "speakers".to_string(),
            Category::new(CategoryRule::Speaker, "speaker", "speakers")
                .with_template("pages/speaker.html.njk"),
        ),
        (
            "sponsors".to_string(),
            Category::new(CategoryRule::Plain, "sponsor", "sponsors").with_image_extension("svg"),
        ),
        (
            "team".to_string(),
            Category::new(CategoryRule::TeamMember, "team", "team"),
        ),
        (
            "articles".to_string(),
            Category::new(CategoryRule::Plain, "article", "news")
                .with_template("pages/placeholder.html.njk"),
        ),
    ])
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_titles() {
        let talk = Record::new().with("name", "Jane Doe").with("talkTitle", "On Rust");
        assert_eq!(CategoryRule::Speaker.title(&talk).as_deref(), Some("Jane Doe: On Rust"));

        let host = talk.clone().with("type", "host");
        assert_eq!(CategoryRule::Speaker.title(&host).as_deref(), Some("Jane Doe"));

        let no_talk = Record::new().with("name", "Jane Doe");
        assert_eq!(CategoryRule::Speaker.title(&no_talk).as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn artist_and_team_titles() {
        let artist = Record::new()
            .with("firstname", "Ada")
            .with("lastname", "Byron")
            .with("talkTitle", "Noise");
        assert_eq!(CategoryRule::Artist.title(&artist).as_deref(), Some("Ada Byron: Noise"));
        assert_eq!(CategoryRule::TeamMember.title(&artist).as_deref(), Some("Ada Byron"));
    }

    #[test]
    fn missing_titles() {
        let empty = Record::new().with("published", true);
        for rule in [
            CategoryRule::Speaker,
            CategoryRule::Artist,
            CategoryRule::TeamMember,
            CategoryRule::Plain,
        ] {
            assert_eq!(rule.title(&empty), None, "{:?}", rule);
        }
    }

    #[test]
    fn speakers_slug_the_name() {
        let record = Record::new().with("name", "Jane Doe");
        assert_eq!(CategoryRule::Speaker.slug_source(&record, "Jane Doe: On Rust"), "Jane Doe");
        assert_eq!(CategoryRule::Plain.slug_source(&record, "Other"), "Other");
    }

    #[test]
    fn default_table_settings() {
        let table = default_table();
        assert_eq!(table["articles"].destination_path, "news");
        assert_eq!(table["sponsors"].forced_image_extension.as_deref(), Some("svg"));
        assert_eq!(
            table["speakers"].template_defaults.get("template"),
            Some(&json!("pages/speaker.html.njk"))
        );
    }
}
