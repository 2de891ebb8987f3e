use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::records::RawRow;

static SPREADSHEET_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://docs\.google\.com/.*/d/([^/]+).*$").unwrap());

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Sheet name → rows, ordered by sheet name.
pub type Sheets = BTreeMap<String, Vec<RawRow>>;

#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch(&self) -> Result<Sheets>;
}

/// Accepts either a bare spreadsheet id or a full Google Sheets URL.
pub fn spreadsheet_id(input: &str) -> String {
    match SPREADSHEET_URL_RE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.trim().to_string(),
    }
}

/// First row is the header; later rows become column → value maps.
/// Short rows are padded with empty cells, unnamed columns are dropped.
pub fn rows_from_grid(grid: &[Vec<String>]) -> Vec<RawRow> {
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .filter(|(_, column)| !column.trim().is_empty())
                .map(|(i, column)| (column.clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

/// Reads sheets from a JSON export: `{ "speakers": [ { "name": "..." } ] }`.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SheetSource for JsonFileSource {
    async fn fetch(&self) -> Result<Sheets> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let sheets: Sheets = serde_json::from_str(&text)
            .with_context(|| format!("Invalid sheet export {}", self.path.display()))?;
        info!("Loaded {} sheets from {}", sheets.len(), self.path.display());
        Ok(sheets)
    }
}

/// Google Sheets v4 REST API, authenticated with an API key.
pub struct GoogleSheetsSource {
    client: reqwest::Client,
    spreadsheet_id: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl GoogleSheetsSource {
    pub fn new(spreadsheet_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(SHEETS_API)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("invalid API base url"))?
            .push(&self.spreadsheet_id)
            .extend(segments);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: reqwest::Url) -> Result<T> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Sheets API returned {} for {}", status, url.path());
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsSource {
    async fn fetch(&self) -> Result<Sheets> {
        let mut meta_url = self.url(&[])?;
        meta_url
            .query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = self
            .get(meta_url)
            .await
            .context("Failed to load spreadsheet metadata")?;

        let mut sheets = Sheets::new();
        for sheet in meta.sheets {
            let title = sheet.properties.title;
            let range: ValueRange = self
                .get(self.url(&["values", &title])?)
                .await
                .with_context(|| format!("Failed to load sheet {}", title))?;
            info!("sheet {}: {} rows", title, range.values.len().saturating_sub(1));
            sheets.insert(title, rows_from_grid(&range.values));
        }
        Ok(sheets)
    }
}

// ── Tests ──
