use serde_json::{json, Map, Value};
use tracing::warn;

use crate::categories::Category;
use crate::content::{directives, frontmatter};
use crate::error::{RecordError, Warning};
use crate::images::{Image, ImageResolver};
use crate::records::{is_truthy, Record};
use crate::settings::RunConfig;

pub const BANNER: &str =
    "# THIS FILE WAS GENERATED AUTOMATICALLY.\n# CHANGES MADE HERE WILL BE OVERWRITTEN.";
pub const DELIMITER: &str = "----";
pub const MISSING_TITLE: &str = "missing title";
pub const STANDALONE_DIR: &str = "cms";
pub const PREVIEW_DIR: &str = "preview";

const IMAGE_URL_FIELDS: &[&str] = &["potraitImageUrl", "portraitImageUrl", "logoUrl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Normal,
    Standalone,
    Preview,
}

/// One generated page, ready to be rendered and written.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDocument {
    pub destination: Destination,
    /// Directory relative to the content root.
    pub dir: String,
    /// File stem, without `.md`.
    pub filename: String,
    pub metadata: Map<String, Value>,
    pub body: String,
}

impl ContentDocument {
    pub fn relative_path(&self) -> String {
        format!("{}/{}.md", self.dir, self.filename)
    }

    /// Text form read by the site renderer.
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        let yaml = serde_yaml::to_string(&self.metadata)?;
        Ok(format!(
            "{delim}\n\n{BANNER}\n\n{}\n\n{delim}\n\n{}",
            yaml.trim(),
            self.body,
            delim = DELIMITER,
        ))
    }
}

/// Link to a withheld record, listed on the preview index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub url: String,
    pub label: String,
}

#[derive(Debug)]
pub struct BuiltDocument {
    pub document: ContentDocument,
    pub preview: Option<PreviewEntry>,
    pub warnings: Vec<Warning>,
}

/// URL-safe file stem for a title or name.
pub fn filename_for(name: &str) -> String {
    slug::slugify(name.to_lowercase())
}

pub struct DocumentBuilder<'a> {
    resolver: &'a ImageResolver,
    config: &'a RunConfig,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(resolver: &'a ImageResolver, config: &'a RunConfig) -> Self {
        Self { resolver, config }
    }

    pub async fn build(
        &self,
        sheet: &str,
        mut record: Record,
        category: &Category,
    ) -> Result<BuiltDocument, RecordError> {
        let mut warnings = Vec::new();
        let name = record.display_name();

        let title = match category.rule.title(&record) {
            Some(title) => title,
            None => {
                warn!("Missing title in {}: {:?}", sheet, record);
                warnings.push(Warning::MissingTitle {
                    sheet: sheet.to_string(),
                });
                MISSING_TITLE.to_string()
            }
        };

        let mut image = self.primary_image(&record, &title, category).await?;

        let mut content = match record.remove("content") {
            Some(Value::String(s)) => s,
            Some(other) if !other.is_null() => other.to_string(),
            _ => String::new(),
        };
        let mut extracted = Map::new();
        if !content.is_empty() {
            match frontmatter::extract(&content) {
                Ok(Some(block)) => {
                    extracted = block.metadata;
                    content = block.body;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!("Invalid frontmatter in {}: {}", name, error);
                    warnings.push(Warning::MalformedFrontmatter {
                        record: name.clone(),
                        error,
                    });
                }
            }

            let mut inline_images = Vec::new();
            content = directives::rewrite(&content, self.resolver, &mut inline_images).await?;
            if image.is_none() {
                image = inline_images.into_iter().next();
            }
        }

        if let Some(image) = &image {
            record.insert("image", json!(image));
        }

        let mut metadata = category.template_defaults.clone();
        metadata.insert("title".to_string(), json!(title));
        metadata.extend(extracted);

        let destination = if metadata.get("standalone").is_some_and(is_truthy) {
            Destination::Standalone
        } else if !record.published() && self.config.published_only {
            Destination::Preview
        } else {
            Destination::Normal
        };

        let mut filename = filename_for(category.rule.slug_source(&record, &title));
        if filename.is_empty() {
            // nothing sluggable, e.g. a name made of punctuation only
            warn!("No usable filename in {} for {:?}", sheet, title);
            warnings.push(Warning::MissingTitle {
                sheet: sheet.to_string(),
            });
            filename = filename_for(MISSING_TITLE);
        }
        let mut preview = None;
        let dir = match destination {
            Destination::Normal => category.destination_path.clone(),
            Destination::Standalone => STANDALONE_DIR.to_string(),
            Destination::Preview => {
                metadata.insert("filename".to_string(), json!(":file.html"));
                filename = format!("{}-{}", filename, self.config.preview_secret);
                preview = Some(PreviewEntry {
                    url: format!("/{}/{}.html", PREVIEW_DIR, filename),
                    label: name,
                });
                PREVIEW_DIR.to_string()
            }
        };
        metadata.insert(category.data_field_name.clone(), json!(record));

        Ok(BuiltDocument {
            document: ContentDocument {
                destination,
                dir,
                filename,
                metadata,
                body: content,
            },
            preview,
            warnings,
        })
    }

    async fn primary_image(
        &self,
        record: &Record,
        title: &str,
        category: &Category,
    ) -> Result<Option<Image>, RecordError> {
        let Some(url) = IMAGE_URL_FIELDS.iter().find_map(|f| record.str_field(f)) else {
            return Ok(None);
        };
        let image = self
            .resolver
            .resolve(url, title, category.forced_image_extension.as_deref())
            .await?;
        Ok(Some(image))
    }
}

/// Index page linking every preview document of the run.
pub fn preview_index(entries: &[PreviewEntry], secret: &str) -> ContentDocument {
    let mut metadata = Map::new();
    metadata.insert("template".to_string(), json!("pages/simple.html.njk"));
    metadata.insert("filename".to_string(), json!(":file.html"));

    let body = if entries.is_empty() {
        String::new()
    } else {
        let items: Vec<String> = entries
            .iter()
            .map(|e| format!("- <a href=\"{}\">{}</a>", e.url, escape_html(&e.label)))
            .collect();
        format!("{}\n", items.join("\n"))
    };

    ContentDocument {
        destination: Destination::Preview,
        dir: PREVIEW_DIR.to_string(),
        filename: secret.to_string(),
        metadata,
        body,
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Tests ──
