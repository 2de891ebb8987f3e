use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{Image, ImageFetcher, LARGE_VARIANT};
use crate::error::ImageFetchError;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const VARIANT_WIDTH: u32 = 1000;

/// Downloads images over HTTP (or picks them up from a local directory) and
/// stores them under `target_dir`.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    target_dir: PathBuf,
    local_dir: Option<PathBuf>,
}

impl HttpImageFetcher {
    pub fn new(target_dir: impl Into<PathBuf>, local_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            target_dir: target_dir.into(),
            local_dir,
        }
    }

    async fn load(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ImageFetchError> {
        if let Some(bytes) = self.load_local(url).await {
            return Ok((bytes, None));
        }
        self.download_with_retry(url).await
    }

    /// Looks for a file with the URL's file name in the local image directory.
    async fn load_local(&self, url: &str) -> Option<Vec<u8>> {
        let dir = self.local_dir.as_ref()?;
        let name = file_name_of(url)?;
        let candidate = dir.join(name);
        match tokio::fs::read(&candidate).await {
            Ok(bytes) => {
                debug!("using local image {}", candidate.display());
                Some(bytes)
            }
            Err(_) => None,
        }
    }

    async fn download_with_retry(
        &self,
        url: &str,
    ) -> Result<(Vec<u8>, Option<String>), ImageFetchError> {
        let mut attempt = 0;
        loop {
            match self.download(url).await {
                Ok(result) => return Ok(result),
                Err((retryable, err)) if retryable && attempt < MAX_RETRIES => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        err,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err((_, err)) => return Err(err),
            }
        }
    }

    /// Single GET. The flag on the error says whether a retry may help.
    async fn download(
        &self,
        url: &str,
    ) -> Result<(Vec<u8>, Option<String>), (bool, ImageFetchError)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| (e.is_timeout() || e.is_connect(), ImageFetchError::new(url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.as_u16() == 429 || status.is_server_error();
            return Err((retryable, ImageFetchError::new(url, format!("HTTP {}", status))));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_from_mime);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| (true, ImageFetchError::new(url, e)))?;
        Ok((bytes.to_vec(), content_type))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(
        &self,
        url: &str,
        label: &str,
        extension: Option<&str>,
    ) -> Result<Image, ImageFetchError> {
        let (bytes, mime_ext) = self.load(url).await?;
        let ext = extension
            .map(normalize_extension)
            .or(mime_ext)
            .or_else(|| file_name_of(url).and_then(extension_of))
            .ok_or_else(|| ImageFetchError::new(url, "cannot determine image type"))?;

        let stem = stored_stem(url, label);
        let filename = format!("{}.{}", stem, ext);
        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .map_err(|e| ImageFetchError::new(url, e))?;
        tokio::fs::write(self.target_dir.join(&filename), &bytes)
            .await
            .map_err(|e| ImageFetchError::new(url, e))?;

        let mut variants = BTreeMap::new();
        if ext == "jpg" {
            let variant = format!("{}-{}.jpg", stem, LARGE_VARIANT);
            let target = self.target_dir.join(&variant);
            let resized = tokio::task::spawn_blocking(move || write_variant(&bytes, &target))
                .await
                .map_err(|e| ImageFetchError::new(url, e))?;
            match resized {
                Ok(()) => {
                    variants.insert(LARGE_VARIANT.to_string(), variant);
                }
                Err(e) => warn!("no {}px variant for {}: {}", VARIANT_WIDTH, url, e),
            }
        }

        info!(" --> image {}", filename);
        Ok(Image {
            filename,
            url: url.to_string(),
            original_type: ext,
            variants,
        })
    }
}

fn write_variant(bytes: &[u8], target: &Path) -> image::ImageResult<()> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > VARIANT_WIDTH {
        img.resize(VARIANT_WIDTH, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };
    img.to_rgb8().save_with_format(target, image::ImageFormat::Jpeg)
}

/// `<slug(label)>-<first 10 hex chars of sha256(url)>`
fn stored_stem(url: &str, label: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hash: String = digest.iter().take(5).map(|b| format!("{:02x}", b)).collect();
    let label = slug::slugify(label.to_lowercase());
    if label.is_empty() {
        hash
    } else {
        format!("{}-{}", label, hash)
    }
}

fn file_name_of(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(normalize_extension(ext))
}

fn extension_from_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    let ext = match essence {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => return None,
    };
    Some(ext.to_string())
}

fn normalize_extension(ext: &str) -> String {
    match ext.to_lowercase().as_str() {
        "jpeg" => "jpg".to_string(),
        other => other.to_string(),
    }
}

// ── Tests ──
