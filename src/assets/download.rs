//! Download of the files linked from DVCon detail pages.

use futures_util::StreamExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::REFERER;
use scraper::{Html, Selector};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::config::AssetConfig;
use crate::models::Paper;
use crate::sources::SourceError;
use crate::utils::{check_status, HttpClient};

use super::AssetError;

/// Referer sent when opening a detail page
pub const DVCON_REFERER: &str = "https://dvcon-proceedings.org/";

/// File name used when the asset URL has no usable last segment
const FALLBACK_FILE_NAME: &str = "dvcon_asset";

/// Counters for one download pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub existing: usize,
    pub without_asset: usize,
    pub failed: usize,
}

/// Resolves and downloads one asset per entry, pacing requests.
pub struct AssetDownloader {
    client: Arc<HttpClient>,
    download_dir: PathBuf,
    link_base: Option<PathBuf>,
    allowed_extensions: Vec<String>,
    referer: String,
    limiter: Option<DefaultDirectRateLimiter>,
    show_progress: bool,
}

impl AssetDownloader {
    /// `client` should be the browser client.
    pub fn new(client: Arc<HttpClient>, config: &AssetConfig) -> Self {
        Self {
            client,
            download_dir: config.download_dir.clone(),
            link_base: None,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            referer: DVCON_REFERER.to_string(),
            limiter: Quota::with_period(Duration::from_millis(config.delay_ms))
                .map(RateLimiter::direct),
            show_progress: false,
        }
    }

    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = referer.to_string();
        self
    }

    /// Write rewritten links relative to `dir` (the directory of the
    /// document that will link them) instead of the working directory.
    pub fn with_link_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.link_base = Some(dir.into());
        self
    }

    /// Draw a progress bar on stderr while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download the asset of every entry whose `Link` is a web page.
    ///
    /// On success (or when the file is already present) the entry's `Link`
    /// is rewritten to the local relative path. Failures leave the entry
    /// untouched.
    pub async fn download_assets(&self, papers: &mut [Paper]) -> DownloadSummary {
        let mut summary = DownloadSummary::default();

        if let Err(e) = fs::create_dir_all(&self.download_dir).await {
            tracing::warn!(
                "Cannot create download directory {}: {}",
                self.download_dir.display(),
                e
            );
            summary.failed = papers.len();
            return summary;
        }

        let progress = self.progress_bar(papers.len());

        for paper in papers.iter_mut() {
            progress.inc(1);
            if !paper.link.to_lowercase().starts_with("http") {
                continue;
            }
            progress.set_message(paper.title.clone());

            match self.download_one(&paper.link).await {
                Ok(Outcome::Downloaded(local)) => {
                    summary.downloaded += 1;
                    tracing::debug!("Updated entry link to local file: {}", local);
                    paper.link = local;
                }
                Ok(Outcome::Existing(local)) => {
                    summary.existing += 1;
                    paper.link = local;
                }
                Err(AssetError::NoAsset(page)) => {
                    summary.without_asset += 1;
                    tracing::info!(
                        "No asset link with extensions {:?} found on DVCon page: {}",
                        self.allowed_extensions,
                        page
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Failed to download DVCon asset for {}: {}", paper.link, e);
                }
            }
        }

        progress.finish_and_clear();
        tracing::info!(
            "DVCon assets: {} downloaded, {} already present, {} without asset, {} failed",
            summary.downloaded,
            summary.existing,
            summary.without_asset,
            summary.failed
        );
        summary
    }

    async fn download_one(&self, page_url: &str) -> Result<Outcome, AssetError> {
        self.pace().await;
        tracing::info!("Resolving DVCon asset from page: {}", page_url);

        let response = self
            .client
            .get(page_url)
            .header(REFERER, &self.referer)
            .send()
            .await
            .map_err(SourceError::from)?;
        let html = check_status(response, "DVCon")
            .await?
            .text()
            .await
            .map_err(SourceError::from)?;

        let asset_url = find_asset_link(&html, page_url, &self.allowed_extensions)
            .ok_or_else(|| AssetError::NoAsset(page_url.to_string()))?;

        let file_name = asset_file_name(&asset_url);
        let target = self.download_dir.join(&file_name);
        let local = match &self.link_base {
            Some(base) => relative_link(&link_relative_to(&target, base)),
            None => relative_link(&target),
        };

        if fs::try_exists(&target).await.unwrap_or(false) {
            tracing::info!("Skipping existing DVCon asset: {}", target.display());
            return Ok(Outcome::Existing(local));
        }

        self.pace().await;
        tracing::info!("Downloading DVCon asset {} -> {}", asset_url, target.display());
        self.stream_to_file(&asset_url, page_url, &target).await?;
        Ok(Outcome::Downloaded(local))
    }

    /// Stream into a `.part` sibling and rename once complete.
    async fn stream_to_file(&self, url: &Url, page_url: &str, target: &Path) -> Result<u64, AssetError> {
        let partial = target.with_file_name(format!(
            "{}.part",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
        ));

        let response = self
            .client
            .get(url.as_str())
            .header(REFERER, page_url)
            .send()
            .await
            .map_err(SourceError::from)?;
        let response = check_status(response, "DVCon").await?;

        let result = write_stream(response, &partial).await;
        match result {
            Ok(bytes) => {
                fs::rename(&partial, target).await?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn progress_bar(&self, len: usize) -> indicatif::ProgressBar {
        if !self.show_progress {
            return indicatif::ProgressBar::hidden();
        }
        let pb = indicatif::ProgressBar::new(len as u64);
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}

impl std::fmt::Debug for AssetDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetDownloader")
            .field("download_dir", &self.download_dir)
            .field("link_base", &self.link_base)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("paced", &self.limiter.is_some())
            .finish()
    }
}

enum Outcome {
    Downloaded(String),
    Existing(String),
}

async fn write_stream(response: reqwest::Response, path: &Path) -> Result<u64, AssetError> {
    let file = fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(SourceError::from)?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

/// First anchor on a detail page whose href ends in an allowed extension.
pub fn find_asset_link(html: &str, page_url: &str, allowed_extensions: &[String]) -> Option<Url> {
    let page = Url::parse(page_url).ok()?;
    let selector = Selector::parse("a[href]").ok()?;
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| {
            let lower = href.to_lowercase();
            !href.is_empty() && allowed_extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
        })
        .and_then(|href| page.join(href).ok())
}

/// Last path segment of the asset URL, or a fixed fallback name.
pub fn asset_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn normalized(path: &Path) -> Option<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    let absolute = std::path::absolute(path).ok()?;
    Some(
        absolute
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect(),
    )
}

/// Lexical path from directory `base` to `target`.
///
/// Falls back to `target` itself when either path cannot be made absolute.
pub fn link_relative_to(target: &Path, base: &Path) -> PathBuf {
    let (Some(target_abs), Some(base_abs)) = (normalized(target), normalized(base)) else {
        return target.to_path_buf();
    };
    let target_parts: Vec<Component> = target_abs.components().collect();
    let base_parts: Vec<Component> = base_abs.components().collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(t, b)| t == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part);
    }
    relative
}

/// Forward-slash form of a local path, as stored in `Link`.
fn relative_link(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;

    fn extensions() -> Vec<String> {
        AssetConfig::default().allowed_extensions
    }

    fn downloader(dir: &Path) -> AssetDownloader {
        let config = AssetConfig {
            download_dir: dir.to_path_buf(),
            delay_ms: 0,
            ..AssetConfig::default()
        };
        AssetDownloader::new(Arc::new(HttpClient::browser().unwrap()), &config)
    }

    #[test]
    fn test_find_asset_link() {
        let html = r#"
            <a href="/about/">About</a>
            <a href="/wp-content/uploads/2024/03/Slides.PPTX">Slides</a>
            <a href="/wp-content/uploads/2024/03/paper.pdf">Paper</a>
        "#;
        let url = find_asset_link(html, "https://dvcon-proceedings.org/document/x/", &extensions())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dvcon-proceedings.org/wp-content/uploads/2024/03/Slides.PPTX"
        );

        assert!(find_asset_link("<a href='/x.html'>x</a>", "https://a.org/", &extensions()).is_none());
    }

    #[test]
    fn test_asset_file_name() {
        let url = Url::parse("https://a.org/files/DVCon_2023_paper.pdf").unwrap();
        assert_eq!(asset_file_name(&url), "DVCon_2023_paper.pdf");
        let bare = Url::parse("https://a.org/").unwrap();
        assert_eq!(asset_file_name(&bare), "dvcon_asset");
    }

    #[tokio::test]
    async fn test_downloads_and_rewrites_link() {
        let mut server = mockito::Server::new_async().await;
        let page_url = format!("{}/document/uvm-paper/", server.url());
        let _page = server
            .mock("GET", "/document/uvm-paper/")
            .match_header("referer", DVCON_REFERER)
            .with_status(200)
            .with_body(r#"<a href="/files/uvm_2024.pdf">PDF</a>"#)
            .create_async()
            .await;
        let file = server
            .mock("GET", "/files/uvm_2024.pdf")
            .match_header("referer", page_url.as_str())
            .with_status(200)
            .with_body("%PDF-1.4 fake")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut papers = vec![
            PaperBuilder::new("UVM paper", page_url.clone()).build(),
            PaperBuilder::new("Local", "downloads/dvcon/other.pdf").build(),
        ];

        let summary = downloader(dir.path()).download_assets(&mut papers).await;

        file.assert_async().await;
        assert_eq!(summary.downloaded, 1);
        let target = dir.path().join("uvm_2024.pdf");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "%PDF-1.4 fake");
        assert!(!dir.path().join("uvm_2024.pdf.part").exists());
        assert_eq!(papers[0].link, relative_link(&target));
        assert_eq!(papers[1].link, "downloads/dvcon/other.pdf");
    }

    #[test]
    fn test_link_relative_to() {
        let root = Path::new("/site");
        assert_eq!(
            link_relative_to(&root.join("downloads/dvcon/a.pdf"), &root.join("out")),
            PathBuf::from("../downloads/dvcon/a.pdf")
        );
        assert_eq!(
            link_relative_to(&root.join("downloads/dvcon/a.pdf"), root),
            PathBuf::from("downloads/dvcon/a.pdf")
        );
        assert_eq!(
            link_relative_to(Path::new("downloads/dvcon/a.pdf"), Path::new("")),
            PathBuf::from("downloads/dvcon/a.pdf")
        );
        assert_eq!(
            link_relative_to(Path::new("./downloads/a.pdf"), Path::new("out/site")),
            PathBuf::from("../../downloads/a.pdf")
        );
    }

    #[tokio::test]
    async fn test_link_written_relative_to_document_dir() {
        let mut server = mockito::Server::new_async().await;
        let page_url = format!("{}/document/sub/", server.url());
        let _page = server
            .mock("GET", "/document/sub/")
            .with_status(200)
            .with_body(r#"<a href="/files/sub_2022.pdf">PDF</a>"#)
            .create_async()
            .await;
        let _file = server
            .mock("GET", "/files/sub_2022.pdf")
            .with_status(200)
            .with_body("%PDF-1.4 fake")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads").join("dvcon");
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        let mut papers = vec![PaperBuilder::new("Sub", page_url).build()];

        let summary = downloader(&downloads)
            .with_link_base(dir.path().join("out"))
            .download_assets(&mut papers)
            .await;

        assert_eq!(summary.downloaded, 1);
        assert_eq!(papers[0].link, "../downloads/dvcon/sub_2022.pdf");
        assert!(dir.path().join("out").join(&papers[0].link).is_file());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded_again() {
        let mut server = mockito::Server::new_async().await;
        let page_url = format!("{}/document/p/", server.url());
        let _page = server
            .mock("GET", "/document/p/")
            .with_status(200)
            .with_body(r#"<a href="/files/p.pdf">PDF</a>"#)
            .create_async()
            .await;
        let file = server
            .mock("GET", "/files/p.pdf")
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p.pdf"), b"cached").unwrap();
        let mut papers = vec![PaperBuilder::new("P", page_url).build()];

        let summary = downloader(dir.path()).download_assets(&mut papers).await;

        file.assert_async().await;
        assert_eq!(summary.existing, 1);
        assert!(papers[0].link.ends_with("/p.pdf"));
    }

    #[tokio::test]
    async fn test_failures_leave_link_untouched() {
        let mut server = mockito::Server::new_async().await;
        let missing = format!("{}/document/gone/", server.url());
        let no_asset = format!("{}/document/plain/", server.url());
        let _gone = server
            .mock("GET", "/document/gone/")
            .with_status(404)
            .create_async()
            .await;
        let _plain = server
            .mock("GET", "/document/plain/")
            .with_status(200)
            .with_body("<p>nothing to download</p>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut papers = vec![
            PaperBuilder::new("Gone", missing.clone()).build(),
            PaperBuilder::new("Plain", no_asset.clone()).build(),
        ];

        let summary = downloader(dir.path()).download_assets(&mut papers).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.without_asset, 1);
        assert_eq!(papers[0].link, missing);
        assert_eq!(papers[1].link, no_asset);
    }
}
