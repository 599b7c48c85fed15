//! Configuration management.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then environment variables prefixed `DAILY_PAPERS`
//! (nested keys separated by `__`, e.g. `DAILY_PAPERS_RUN__MAX_RESULTS=50`).
//!
//! # Configuration File Format
//!
//! ```toml
//! [run]
//! keywords = ["verification", "UVM"]
//! profile = "general"
//! max_results = 1000
//! issues_results = 200
//!
//! [output]
//! readme = "README.md"
//! issue_template = ".github/ISSUE_TEMPLATE.md"
//!
//! [retry]
//! best_effort_backoff_secs = 60
//!
//! [assets]
//! download_dir = "downloads/dvcon"
//!
//! [providers]
//! crossref_mailto = "someone@example.org"
//! ```
//!
//! `ACM_ACCESS_TOKEN` and `ACM_BASE_URL` are also read directly from the
//! environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Column;
use crate::pipeline::Profile;
use crate::utils::RetryPolicy;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "daily-papers.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "DAILY_PAPERS";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub assets: AssetConfig,

    #[serde(default)]
    pub heuristics: HeuristicsConfig,

    #[serde(default)]
    pub providers: ProviderConfig,
}

/// What to search for and how much of it to keep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub profile: Profile,

    /// Results requested from each provider per keyword
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Papers per table in the issue template
    #[serde(default = "default_issues_results")]
    pub issues_results: usize,

    #[serde(default = "default_column_names")]
    pub column_names: Vec<Column>,

    #[serde(default = "default_keyword_delay")]
    pub keyword_delay_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            profile: Profile::default(),
            max_results: default_max_results(),
            issues_results: default_issues_results(),
            column_names: default_column_names(),
            keyword_delay_secs: default_keyword_delay(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    vec!["verification".to_string(), "UVM".to_string()]
}

fn default_max_results() -> usize {
    1000
}

fn default_issues_results() -> usize {
    200
}

fn default_column_names() -> Vec<Column> {
    Column::DEFAULT.to_vec()
}

fn default_keyword_delay() -> u64 {
    5
}

/// Files written by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_readme")]
    pub readme: PathBuf,

    #[serde(default = "default_issue_template")]
    pub issue_template: PathBuf,

    /// Directory receiving the dated README copy
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    /// Optional standalone appendix of abstracts from downloaded PDFs
    #[serde(default)]
    pub abstracts_appendix: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            readme: default_readme(),
            issue_template: default_issue_template(),
            archive_dir: default_archive_dir(),
            backup_suffix: default_backup_suffix(),
            abstracts_appendix: None,
        }
    }
}

fn default_readme() -> PathBuf {
    PathBuf::from("README.md")
}

fn default_issue_template() -> PathBuf {
    PathBuf::from(".github/ISSUE_TEMPLATE.md")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_backup_suffix() -> String {
    "bk".to_string()
}

/// Retry budgets and backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_mandatory_attempts")]
    pub mandatory_attempts: u32,

    #[serde(default = "default_mandatory_backoff")]
    pub mandatory_backoff_secs: u64,

    #[serde(default = "default_best_effort_attempts")]
    pub best_effort_attempts: u32,

    #[serde(default = "default_best_effort_backoff")]
    pub best_effort_backoff_secs: u64,

    /// Immediate retries of a single IEEE result page
    #[serde(default = "default_page_attempts")]
    pub page_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mandatory_attempts: default_mandatory_attempts(),
            mandatory_backoff_secs: default_mandatory_backoff(),
            best_effort_attempts: default_best_effort_attempts(),
            best_effort_backoff_secs: default_best_effort_backoff(),
            page_attempts: default_page_attempts(),
        }
    }
}

impl RetryConfig {
    /// Policy for a source, depending on whether it is mandatory
    pub fn policy(&self, mandatory: bool) -> RetryPolicy {
        if mandatory {
            RetryPolicy::mandatory()
                .with_attempts(self.mandatory_attempts)
                .with_backoff(Duration::from_secs(self.mandatory_backoff_secs))
        } else {
            RetryPolicy::best_effort()
                .with_attempts(self.best_effort_attempts)
                .with_backoff(Duration::from_secs(self.best_effort_backoff_secs))
        }
    }
}

fn default_mandatory_attempts() -> u32 {
    6
}

fn default_mandatory_backoff() -> u64 {
    10
}

fn default_best_effort_attempts() -> u32 {
    3
}

fn default_best_effort_backoff() -> u64 {
    60
}

fn default_page_attempts() -> u32 {
    5
}

/// Asset download and PDF scanning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default)]
    pub download: bool,

    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Pause between consecutive downloads, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Pages scanned when looking for an abstract
    #[serde(default = "default_abstract_pages")]
    pub abstract_pages: usize,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            download: false,
            download_dir: default_download_dir(),
            delay_ms: default_delay_ms(),
            allowed_extensions: default_allowed_extensions(),
            abstract_pages: default_abstract_pages(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads/dvcon")
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_allowed_extensions() -> Vec<String> {
    [".pdf", ".ppt", ".pptx", ".zip"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_abstract_pages() -> usize {
    2
}

/// Empirically tuned thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicsConfig {
    /// Direct text shorter than this triggers OCR
    #[serde(default = "default_min_direct_chars")]
    pub min_direct_chars: usize,

    /// Max distance between "DVCon" and a year on a title page
    #[serde(default = "default_dvcon_window")]
    pub dvcon_window: usize,

    #[serde(default = "default_tags_disclosure_len")]
    pub tags_disclosure_len: usize,

    #[serde(default = "default_comment_disclosure_len")]
    pub comment_disclosure_len: usize,

    #[serde(default = "default_teaser_len")]
    pub teaser_len: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            min_direct_chars: default_min_direct_chars(),
            dvcon_window: default_dvcon_window(),
            tags_disclosure_len: default_tags_disclosure_len(),
            comment_disclosure_len: default_comment_disclosure_len(),
            teaser_len: default_teaser_len(),
        }
    }
}

fn default_min_direct_chars() -> usize {
    200
}

fn default_dvcon_window() -> usize {
    40
}

fn default_tags_disclosure_len() -> usize {
    10
}

fn default_comment_disclosure_len() -> usize {
    20
}

fn default_teaser_len() -> usize {
    5
}

/// Provider endpoints and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,

    #[serde(default = "default_crossref_url")]
    pub crossref_url: String,

    /// Contact address for CrossRef's polite pool
    #[serde(default = "default_crossref_mailto")]
    pub crossref_mailto: String,

    #[serde(default = "default_openalex_url")]
    pub openalex_url: String,

    #[serde(default = "default_semantic_scholar_url")]
    pub semantic_scholar_url: String,

    #[serde(default = "default_ieee_url")]
    pub ieee_url: String,

    #[serde(default = "default_acm_base_url")]
    pub acm_base_url: String,

    /// Never written out by `--print-config`
    #[serde(default, skip_serializing)]
    pub acm_access_token: Option<String>,

    #[serde(default = "default_dvcon_url")]
    pub dvcon_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            arxiv_url: default_arxiv_url(),
            crossref_url: default_crossref_url(),
            crossref_mailto: default_crossref_mailto(),
            openalex_url: default_openalex_url(),
            semantic_scholar_url: default_semantic_scholar_url(),
            ieee_url: default_ieee_url(),
            acm_base_url: default_acm_base_url(),
            acm_access_token: None,
            dvcon_url: default_dvcon_url(),
        }
    }
}

fn default_arxiv_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_crossref_url() -> String {
    "https://api.crossref.org".to_string()
}

fn default_crossref_mailto() -> String {
    "daily-papers@users.noreply.github.com".to_string()
}

fn default_openalex_url() -> String {
    "https://api.openalex.org".to_string()
}

fn default_semantic_scholar_url() -> String {
    "https://api.semanticscholar.org".to_string()
}

fn default_ieee_url() -> String {
    "https://ieeexplore.ieee.org".to_string()
}

fn default_acm_base_url() -> String {
    "https://dl.acm.org/v/".to_string()
}

fn default_dvcon_url() -> String {
    "https://dvcon-proceedings.org/".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from an explicit file, or the first discovered one.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };

        let defaults = config::Config::try_from(&Config::default())?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(file) = &file {
            tracing::debug!("Loading configuration from {}", file.display());
            builder = builder.add_source(config::File::from(file.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_acm_env();
        config.validate()?;
        Ok(config)
    }

    /// Honour the ACM variables the provider documents
    fn apply_acm_env(&mut self) {
        if self.providers.acm_access_token.is_none() {
            self.providers.acm_access_token = std::env::var("ACM_ACCESS_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty());
        }
        if let Ok(base) = std::env::var("ACM_BASE_URL") {
            if !base.trim().is_empty() {
                self.providers.acm_base_url = base;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid("at least one keyword is required".into()));
        }
        if self.run.max_results == 0 {
            return Err(ConfigError::Invalid("max_results must be positive".into()));
        }
        if self.run.column_names.is_empty() {
            return Err(ConfigError::Invalid("column_names must not be empty".into()));
        }
        if self.output.backup_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid("backup_suffix must not be empty".into()));
        }
        Ok(())
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Look for `./daily-papers.toml`, then `<config dir>/daily-papers/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("daily-papers").join("config.toml"))
        .filter(|path| path.is_file())
}
