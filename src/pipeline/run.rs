//! The end-to-end update run.

use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::backup::{archive_readme, BackupSet};
use super::keywords::specialise_keyword;
use super::selection::SourceSelection;
use super::PipelineError;
use crate::assets::{
    extract_abstracts, patch_placeholder_years, write_abstracts_appendix, AssetDownloader, PdfScan,
};
use crate::config::Config;
use crate::models::{Column, Paper};
use crate::render::{
    digest_today, iso_day, issue_preamble, keyword_heading, last_update, readme_preamble,
    source_section, TableRenderer,
};
use crate::sources::{Source, SourceError, SourceRegistry};
use crate::utils::{fetch_with_retry, FallbackExtractor, HttpClient, TextExtractor};

/// Per-invocation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Run even if the README is already stamped with today's date
    pub force_update: bool,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The README already carries today's date
    AlreadyUpdated { date: String },
    Completed {
        date: String,
        /// Source sections written to the README
        sections: usize,
        /// Papers across all README tables
        papers: usize,
        archive: PathBuf,
    },
}

/// Queries the selected sources and writes the output documents
pub struct Pipeline {
    config: Config,
    registry: SourceRegistry,
    selection: SourceSelection,
    renderer: TableRenderer,
    downloader: Option<AssetDownloader>,
    extractor: Box<dyn TextExtractor>,
    scan: PdfScan,
}

impl Pipeline {
    pub fn new(config: Config, registry: SourceRegistry, selection: SourceSelection) -> Self {
        Self {
            renderer: TableRenderer::from_config(&config),
            extractor: Box::new(FallbackExtractor::detect(config.heuristics.min_direct_chars)),
            scan: PdfScan::from_config(&config),
            downloader: None,
            config,
            registry,
            selection,
        }
    }

    /// Build the clients and every compiled-in adapter from `config`.
    ///
    /// The asset downloader is attached when `assets.download` is set.
    pub fn from_config(config: Config, selection: SourceSelection) -> Result<Self, SourceError> {
        let api = Arc::new(HttpClient::new()?);
        let browser = Arc::new(HttpClient::browser()?);
        let registry = SourceRegistry::from_config(&config, api, Arc::clone(&browser));

        let readme_dir = config
            .output
            .readme
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let downloader = config.assets.download.then(|| {
            AssetDownloader::new(browser, &config.assets).with_link_base(readme_dir)
        });

        let mut pipeline = Self::new(config, registry, selection);
        pipeline.downloader = downloader;
        Ok(pipeline)
    }

    pub fn with_downloader(mut self, downloader: AssetDownloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Show a download progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.downloader = self.downloader.map(|d| d.with_progress(show));
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run for today's date (UTC+8)
    pub async fn run(&self, options: RunOptions) -> Result<RunOutcome, PipelineError> {
        self.run_for_day(digest_today(), options).await
    }

    /// Run as if today were `day`
    pub async fn run_for_day(
        &self,
        day: NaiveDate,
        options: RunOptions,
    ) -> Result<RunOutcome, PipelineError> {
        let date = iso_day(day);
        let output = &self.config.output;
        tracing::info!("Starting Daily Papers update for {}", date);

        if !options.force_update && already_updated(&output.readme, &date) {
            tracing::info!("Already updated today! Use --force-update to override.");
            return Ok(RunOutcome::AlreadyUpdated { date });
        }

        let sources = self.active_sources()?;
        if sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        for document in [&output.readme, &output.issue_template] {
            if let Some(parent) = document.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
            }
        }

        let backups = BackupSet::new(
            vec![output.readme.clone(), output.issue_template.clone()],
            output.backup_suffix.as_str(),
        );
        backups.backup()?;
        tracing::info!("Backed up existing files");

        match self.write_documents(day, &sources).await {
            Ok(outcome) => {
                if let Err(e) = backups.remove() {
                    tracing::warn!("Failed to remove backups: {}", e);
                }
                tracing::info!("Update completed successfully");
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("An error occurred: {}", e);
                if let Err(restore_error) = backups.restore() {
                    tracing::error!("Failed to restore backups: {}", restore_error);
                }
                Err(e)
            }
        }
    }

    /// Selected sources that are compiled in and configured, in query order.
    ///
    /// A misconfigured source the user named is an error; one that was only
    /// enabled by default is skipped.
    fn active_sources(&self) -> Result<Vec<Arc<dyn Source>>, PipelineError> {
        let mut active = Vec::new();

        for kind in self.selection.kinds() {
            let Some(source) = self.registry.get(kind) else {
                tracing::warn!("{} support is not compiled in, skipping", kind.name());
                continue;
            };

            if let Err(error) = source.check_config() {
                if self.selection.is_explicit(kind) {
                    return Err(PipelineError::SourceConfig {
                        source_name: source.name().to_string(),
                        error,
                    });
                }
                tracing::warn!("Skipping {}: {}", source.name(), error);
                continue;
            }

            active.push(Arc::clone(source));
        }

        Ok(active)
    }

    async fn write_documents(
        &self,
        day: NaiveDate,
        sources: &[Arc<dyn Source>],
    ) -> Result<RunOutcome, PipelineError> {
        let run = &self.config.run;
        let output = &self.config.output;
        let date = iso_day(day);

        write_new(&output.readme, &readme_preamble(day))?;
        write_new(&output.issue_template, &issue_preamble(run.issues_results, day))?;

        let keywords = run.profile.keywords(&run.keywords);
        let delay = Duration::from_secs(run.keyword_delay_secs);
        let mut sections = 0;
        let mut papers_written = 0;

        for (index, keyword) in keywords.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            tracing::info!("Processing keyword: {}", keyword);

            let mut readme_part = keyword_heading(keyword);
            let mut issue_part = keyword_heading(keyword);

            for source in sources {
                let query = specialise_keyword(keyword, source.kind(), run.profile);
                let policy = self.config.retry.policy(source.is_mandatory());
                tracing::info!("Fetching {} papers for keyword: {}", source.name(), query);

                let mut papers =
                    fetch_with_retry(source.as_ref(), &policy, &query, run.max_results).await?;
                if papers.is_empty() {
                    tracing::info!("No {} papers for keyword: {}", source.name(), keyword);
                    continue;
                }
                if source.supports_assets() {
                    papers = self.process_assets(papers).await;
                }

                let title = source.kind().section_title();
                let full = self.renderer.render(&papers, &[]);
                let head = &papers[..papers.len().min(run.issues_results)];
                let short = self.renderer.render(head, &[Column::Abstract]);
                readme_part.push_str(&source_section(title, &full));
                issue_part.push_str(&source_section(title, &short));

                sections += 1;
                papers_written += papers.len();
                tracing::info!(
                    "Processed {} {} papers for keyword: {}",
                    papers.len(),
                    source.name(),
                    keyword
                );
            }

            append(&output.readme, &readme_part)?;
            append(&output.issue_template, &issue_part)?;
        }

        if let Some(appendix) = &output.abstracts_appendix {
            if let Err(e) = write_abstracts_appendix(
                &self.config.assets.download_dir,
                appendix,
                self.extractor.as_ref(),
                &self.scan,
            ) {
                tracing::warn!("Failed to write DVCon abstracts appendix: {}", e);
            }
        }

        if let Err(e) = patch_placeholder_years(&output.readme, self.extractor.as_ref(), &self.scan) {
            tracing::warn!("Failed to post-process README dates from PDFs: {}", e);
        }

        let archive = archive_readme(&output.readme, &output.archive_dir, &date)?;

        Ok(RunOutcome::Completed {
            date,
            sections,
            papers: papers_written,
            archive,
        })
    }

    async fn process_assets(&self, mut papers: Vec<Paper>) -> Vec<Paper> {
        let Some(downloader) = &self.downloader else {
            return papers;
        };

        tracing::info!("Downloading DVCon assets for {} entries", papers.len());
        downloader.download_assets(&mut papers).await;
        extract_abstracts(papers, downloader.download_dir(), self.extractor.as_ref(), &self.scan)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("selection", &self.selection)
            .field("sources", &self.registry.len())
            .field("downloader", &self.downloader)
            .finish()
    }
}

fn already_updated(readme: &Path, date: &str) -> bool {
    match std::fs::read_to_string(readme) {
        Ok(content) => last_update(&content) == Some(date),
        Err(_) => {
            tracing::info!("{} not found. Creating new file.", readme.display());
            false
        }
    }
}

fn write_new(path: &Path, content: &str) -> Result<(), PipelineError> {
    std::fs::write(path, content).map_err(|e| PipelineError::io(path, e))
}

fn append(path: &Path, content: &str) -> Result<(), PipelineError> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|e| PipelineError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, SourceKind};
    use crate::sources::{MockOutcome, MockSource};
    use crate::utils::ExtractError;

    struct NoText;

    impl TextExtractor for NoText {
        fn extract(&self, path: &Path, _max_pages: usize) -> Result<String, ExtractError> {
            Err(ExtractError::InvalidFile(path.display().to_string()))
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.run.keywords = vec!["UVM".to_string()];
        config.run.keyword_delay_secs = 0;
        config.retry.mandatory_backoff_secs = 0;
        config.retry.best_effort_backoff_secs = 0;
        config.output.readme = dir.join("README.md");
        config.output.issue_template = dir.join(".github").join("ISSUE_TEMPLATE.md");
        config.output.archive_dir = dir.join("data");
        config.assets.download_dir = dir.join("downloads");
        config
    }

    fn paper(title: &str, date: &str) -> Paper {
        PaperBuilder::new(title, format!("https://example.com/{}", title.replace(' ', "-")))
            .abstract_text("UVM verification")
            .tag("cs.AR")
            .date(date)
            .build()
    }

    fn pipeline(config: Config, sources: Vec<Arc<MockSource>>) -> Pipeline {
        let mut registry = SourceRegistry::new();
        let mut kinds = Vec::new();
        for source in sources {
            kinds.push(source.kind());
            registry.register(source);
        }
        Pipeline::new(config, registry, SourceSelection::only(&kinds)).with_extractor(Box::new(NoText))
    }

    #[tokio::test]
    async fn test_run_writes_documents_in_query_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let arxiv = Arc::new(
            MockSource::new(SourceKind::Arxiv)
                .always(MockOutcome::Papers(vec![paper("UVM agents", "2025-02-01T00:00:00Z")])),
        );
        let ieee = Arc::new(
            MockSource::new(SourceKind::Ieee)
                .always(MockOutcome::Papers(vec![paper("UVM in silicon", "2024-05-01T00:00:00Z")])),
        );
        let openalex = Arc::new(MockSource::new(SourceKind::OpenAlex));

        let pipeline = pipeline(config.clone(), vec![arxiv.clone(), ieee.clone(), openalex.clone()]);
        let outcome = pipeline.run_for_day(day(), RunOptions::default()).await.unwrap();

        let archive = dir.path().join("data").join("2025-03-01.md");
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                date: "2025-03-01".into(),
                sections: 2,
                papers: 2,
                archive: archive.clone(),
            }
        );

        let readme = std::fs::read_to_string(&config.output.readme).unwrap();
        assert!(readme.contains("Last update: 2025-03-01\n\n## UVM\n### IEEE (Xplore)\n"));
        let ieee_at = readme.find("### IEEE").unwrap();
        let arxiv_at = readme.find("### arXiv").unwrap();
        assert!(ieee_at < arxiv_at);
        assert!(!readme.contains("### OpenAlex"));
        assert!(readme.contains("<summary>Show</summary>"));

        let issue = std::fs::read_to_string(&config.output.issue_template).unwrap();
        assert!(issue.starts_with("---\ntitle: Latest 200 Papers - March 01, 2025\n"));
        assert!(!issue.contains("<summary>Show</summary>"));

        assert_eq!(std::fs::read_to_string(archive).unwrap(), readme);
        assert!(!dir.path().join("README.md.bk").exists());
        assert_eq!(arxiv.keywords(), vec!["UVM"]);
        assert_eq!(openalex.calls(), 3);
    }

    #[tokio::test]
    async fn test_already_updated_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.output.readme, readme_preamble(day())).unwrap();
        let arxiv = Arc::new(MockSource::new(SourceKind::Arxiv));

        let pipeline = pipeline(config.clone(), vec![arxiv.clone()]);
        let outcome = pipeline.run_for_day(day(), RunOptions::default()).await.unwrap();

        assert_eq!(outcome, RunOutcome::AlreadyUpdated { date: "2025-03-01".into() });
        assert_eq!(arxiv.calls(), 0);
    }

    #[tokio::test]
    async fn test_mandatory_failure_restores_previous_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.output.readme, "previous digest").unwrap();
        let arxiv = Arc::new(MockSource::new(SourceKind::Arxiv).always(MockOutcome::Status(503)));

        let pipeline = pipeline(config.clone(), vec![arxiv.clone()]);
        let result = pipeline
            .run_for_day(
                day(),
                RunOptions {
                    force_update: true,
                },
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Retry(_))));
        assert_eq!(arxiv.calls(), 6);
        assert_eq!(
            std::fs::read_to_string(&config.output.readme).unwrap(),
            "previous digest"
        );
        assert!(!dir.path().join("README.md.bk").exists());
        assert!(!dir.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_verification_profile_specialises_queries() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.run.profile = super::super::Profile::Verification;
        let arxiv = Arc::new(
            MockSource::new(SourceKind::Arxiv)
                .always(MockOutcome::Papers(vec![paper("UVM agents", "2025-02-01T00:00:00Z")])),
        );
        let dvcon = Arc::new(MockSource::new(SourceKind::Dvcon).always(MockOutcome::Papers(vec![
            PaperBuilder::new("UVM tips", "https://dvcon-proceedings.org/document/tips/").build(),
        ])));

        let pipeline = pipeline(config, vec![arxiv.clone(), dvcon.clone()]);
        pipeline.run_for_day(day(), RunOptions::default()).await.unwrap();

        assert_eq!(arxiv.keywords(), vec!["digital verification", "UVM"]);
        assert_eq!(dvcon.keywords(), vec!["verification", "UVM"]);
    }

    #[cfg(feature = "source-acm")]
    #[tokio::test]
    async fn test_acm_without_token() {
        use super::super::{Profile, SourceChoice};
        use crate::sources::AcmSource;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let client = Arc::new(HttpClient::new().unwrap());

        let registry = || {
            let mut registry = SourceRegistry::new();
            registry.register(Arc::new(AcmSource::new(Arc::clone(&client), None)));
            registry.register(Arc::new(MockSource::new(SourceKind::Arxiv).always(
                MockOutcome::Papers(vec![paper("UVM agents", "2025-02-01T00:00:00Z")]),
            )));
            registry
        };

        let explicit = Pipeline::new(
            config.clone(),
            registry(),
            SourceSelection::resolve(SourceChoice::All, &[SourceKind::Acm], Profile::General),
        );
        let result = explicit.run_for_day(day(), RunOptions::default()).await;
        assert!(matches!(result, Err(PipelineError::SourceConfig { .. })));
        assert!(!config.output.readme.exists());

        let implicit = Pipeline::new(
            config.clone(),
            registry(),
            SourceSelection::resolve(SourceChoice::All, &[], Profile::General),
        )
        .with_extractor(Box::new(NoText));
        let outcome = implicit.run_for_day(day(), RunOptions::default()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { sections: 1, .. }));
    }
}
