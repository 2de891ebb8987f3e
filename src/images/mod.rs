pub mod fetch;
pub mod resolver;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ImageFetchError;

pub use fetch::HttpImageFetcher;
pub use resolver::ImageResolver;

/// Width of the downscaled variant generated for large raster images.
pub const LARGE_VARIANT: &str = "1000";

/// A stored image. Identity is the source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub filename: String,
    pub url: String,
    pub original_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, String>,
}

impl Image {
    /// File the content should reference: the large variant for JPEGs,
    /// the primary file otherwise.
    pub fn content_filename(&self) -> &str {
        if self.original_type == "jpg" {
            if let Some(variant) = self.variants.get(LARGE_VARIANT) {
                return variant;
            }
        }
        &self.filename
    }
}

/// Retrieves and stores one image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        label: &str,
        extension: Option<&str>,
    ) -> Result<Image, ImageFetchError>;
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Fake fetcher: counts calls per URL, can delay or fail specific URLs.
    #[derive(Default)]
    pub struct FakeFetcher {
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
        delays: HashMap<String, Duration>,
        failing: Vec<String>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }

        pub fn failing(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        pub fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(
            &self,
            url: &str,
            label: &str,
            extension: Option<&str>,
        ) -> Result<Image, ImageFetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            self.total.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.iter().any(|u| u == url) {
                return Err(ImageFetchError::new(url, "HTTP 404"));
            }

            let ext = extension
                .map(str::to_string)
                .or_else(|| url.rsplit('.').next().map(str::to_string))
                .unwrap_or_else(|| "bin".to_string());
            let stem = url.rsplit('/').next().unwrap_or(url).split('.').next().unwrap_or("img");
            let mut variants = BTreeMap::new();
            if ext == "jpg" {
                variants.insert(LARGE_VARIANT.to_string(), format!("{}-{}-1000.jpg", label, stem));
            }
            Ok(Image {
                filename: format!("{}-{}.{}", label, stem, ext),
                url: url.to_string(),
                original_type: ext,
                variants,
            })
        }
    }
}
