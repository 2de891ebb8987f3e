use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::{Image, ImageFetcher};
use crate::error::ImageFetchError;

type PendingImage = Shared<BoxFuture<'static, Result<Image, ImageFetchError>>>;

/// Run-scoped, URL-keyed deduplication around an [`ImageFetcher`].
///
/// The first caller for a URL starts the fetch; everyone else awaits the same
/// shared future, so each distinct URL is fetched at most once per resolver.
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    pending: Mutex<HashMap<String, PendingImage>>,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(
        &self,
        url: &str,
        label: &str,
        extension: Option<&str>,
    ) -> Result<Image, ImageFetchError> {
        self.pending_for(url, label, extension).await
    }

    /// Number of distinct URLs fetched (or being fetched) so far.
    pub fn fetch_count(&self) -> usize {
        self.lock().len()
    }

    fn pending_for(&self, url: &str, label: &str, extension: Option<&str>) -> PendingImage {
        let mut pending = self.lock();
        if let Some(existing) = pending.get(url) {
            debug!("image {} already requested", url);
            return existing.clone();
        }

        let fetcher = Arc::clone(&self.fetcher);
        let (url_owned, label, extension) = (
            url.to_string(),
            label.to_string(),
            extension.map(str::to_string),
        );
        let fut = async move {
            fetcher
                .fetch(&url_owned, &label, extension.as_deref())
                .await
        }
        .boxed()
        .shared();
        pending.insert(url.to_string(), fut.clone());
        fut
    }

    // The map is only touched between awaits, so a poisoned lock still holds
    // consistent data.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingImage>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::images::testing::FakeFetcher;

    #[tokio::test]
    async fn same_url_fetched_once() {
        let fetcher = Arc::new(FakeFetcher::new().with_delay("http://x/a.png", Duration::from_millis(20)));
        let resolver = ImageResolver::new(fetcher.clone());

        let (a, b) = tokio::join!(
            resolver.resolve("http://x/a.png", "first", None),
            resolver.resolve("http://x/a.png", "second", None),
        );
        let later = resolver.resolve("http://x/a.png", "third", None).await.unwrap();

        assert_eq!(fetcher.calls("http://x/a.png"), 1);
        assert_eq!(a.unwrap(), later);
        assert_eq!(b.unwrap(), later);
        assert_eq!(resolver.fetch_count(), 1);
    }

    #[tokio::test]
    async fn failure_is_scoped_to_its_url() {
        let fetcher = Arc::new(FakeFetcher::new().failing("http://x/bad.png"));
        let resolver = ImageResolver::new(fetcher.clone());

        let err = resolver.resolve("http://x/bad.png", "image", None).await.unwrap_err();
        assert_eq!(err.url, "http://x/bad.png");
        assert!(resolver.resolve("http://x/good.png", "image", None).await.is_ok());

        // the failed entry is reused rather than refetched
        assert!(resolver.resolve("http://x/bad.png", "image", None).await.is_err());
        assert_eq!(fetcher.calls("http://x/bad.png"), 1);
    }
}
