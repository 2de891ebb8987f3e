use std::collections::HashMap;
use std::sync::LazyLock;

use futures::future::try_join_all;
use regex::{Captures, Regex};

use crate::error::ImageFetchError;
use crate::images::{Image, ImageResolver};

static DOWNLOAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"DOWNLOAD\(([^)]+)\)").unwrap());

/// Prefix of image references the site renderer resolves itself.
pub const CMS_IMAGE_PREFIX: &str = "contents:images/cms/";

/// Replace every `DOWNLOAD(<url>)` in `body` with a `contents:` reference to
/// the downloaded image. Resolved images are appended to `collected` in
/// order of first appearance.
pub async fn rewrite(
    body: &str,
    resolver: &ImageResolver,
    collected: &mut Vec<Image>,
) -> Result<String, ImageFetchError> {
    let urls = directive_urls(body);
    if urls.is_empty() {
        return Ok(body.to_string());
    }

    let images = try_join_all(urls.iter().map(|url| resolver.resolve(url, "image", None))).await?;
    let by_url: HashMap<&str, &Image> = urls.iter().map(String::as_str).zip(images.iter()).collect();

    let rewritten = DOWNLOAD_RE.replace_all(body, |caps: &Captures| {
        // every captured url was resolved above
        match by_url.get(&caps[1]) {
            Some(image) => format!("{}{}", CMS_IMAGE_PREFIX, image.content_filename()),
            None => caps[0].to_string(),
        }
    });
    let rewritten = rewritten.into_owned();

    collected.extend(images);
    Ok(rewritten)
}

/// Distinct directive URLs in order of first appearance.
fn directive_urls(body: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for caps in DOWNLOAD_RE.captures_iter(body) {
        let url = &caps[1];
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::images::testing::FakeFetcher;

    #[test]
    fn collects_distinct_urls_in_order() {
        let body = "DOWNLOAD(http://x/b.png) DOWNLOAD(http://x/a.png) DOWNLOAD(http://x/b.png) DOWNLOAD()";
        assert_eq!(directive_urls(body), vec!["http://x/b.png", "http://x/a.png"]);
    }

    #[tokio::test]
    async fn body_without_directives_is_untouched() {
        let fetcher = Arc::new(FakeFetcher::new());
        let resolver = ImageResolver::new(fetcher.clone());
        let mut collected = Vec::new();

        let out = rewrite("plain (text)", &resolver, &mut collected).await.unwrap();

        assert_eq!(out, "plain (text)");
        assert!(collected.is_empty());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_url_fetched_once_and_replaced_everywhere() {
        let fetcher = Arc::new(FakeFetcher::new());
        let resolver = ImageResolver::new(fetcher.clone());
        let mut collected = Vec::new();

        let out = rewrite(
            "a DOWNLOAD(http://x/a.png) b DOWNLOAD(http://x/a.png) c",
            &resolver,
            &mut collected,
        )
        .await
        .unwrap();

        assert_eq!(fetcher.calls("http://x/a.png"), 1);
        assert_eq!(
            out,
            "a contents:images/cms/image-a.png b contents:images/cms/image-a.png c"
        );
        assert_eq!(collected.len(), 1);
    }

    #[tokio::test]
    async fn replacement_is_positional_regardless_of_completion_order() {
        let fetcher = Arc::new(
            FakeFetcher::new()
                .with_delay("http://x/slow.png", Duration::from_millis(30))
                .with_delay("http://x/fast.png", Duration::from_millis(1)),
        );
        let resolver = ImageResolver::new(fetcher);
        let mut collected = Vec::new();

        let out = rewrite(
            "DOWNLOAD(http://x/slow.png)\nDOWNLOAD(http://x/fast.png)",
            &resolver,
            &mut collected,
        )
        .await
        .unwrap();

        assert_eq!(
            out,
            "contents:images/cms/image-slow.png\ncontents:images/cms/image-fast.png"
        );
        let urls: Vec<_> = collected.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["http://x/slow.png", "http://x/fast.png"]);
    }

    #[tokio::test]
    async fn jpegs_reference_the_large_variant() {
        let resolver = ImageResolver::new(Arc::new(FakeFetcher::new()));
        let mut collected = Vec::new();

        let out = rewrite("DOWNLOAD(http://x/photo.jpg)", &resolver, &mut collected)
            .await
            .unwrap();

        assert_eq!(out, "contents:images/cms/image-photo-1000.jpg");
        assert_eq!(collected[0].filename, "image-photo.jpg");
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let resolver = ImageResolver::new(Arc::new(FakeFetcher::new().failing("http://x/gone.png")));
        let mut collected = Vec::new();

        let err = rewrite("DOWNLOAD(http://x/gone.png)", &resolver, &mut collected)
            .await
            .unwrap_err();

        assert_eq!(err.url, "http://x/gone.png");
        assert!(collected.is_empty());
    }
}
