use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daily_papers::config::Config;
use daily_papers::pipeline::{Pipeline, Profile, RunOptions, RunOutcome, SourceChoice, SourceSelection};
use daily_papers::SourceKind;

#[derive(Parser, Debug)]
#[command(name = "daily-papers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Daily Papers Fetcher: collect the latest papers per keyword into a Markdown digest", long_about = None)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short)]
    quiet: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Maximum number of query results from APIs for each keyword
    #[arg(long)]
    max_results: Option<usize>,

    /// Maximum number of papers to be included in the issue
    #[arg(long)]
    issues_results: Option<usize>,

    /// Keywords to search for papers
    #[arg(long, num_args = 1..)]
    keywords: Option<Vec<String>>,

    /// Predefined topic profile ('verification' focuses on digital and UVM verification)
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Primary data source; 'all' combines arXiv with the enabled extra sources
    #[arg(long, value_enum, default_value_t = SourceChoice::All)]
    source: SourceChoice,

    /// Force update even if already updated today
    #[arg(long)]
    force_update: bool,

    /// Also fetch and include papers via CrossRef
    #[arg(long)]
    include_crossref: bool,

    /// Also fetch and include papers via the ACM Digital Library API
    #[arg(long)]
    include_acm: bool,

    /// Also fetch and include papers via OpenAlex
    #[arg(long)]
    include_openalex: bool,

    /// Also fetch and include DVCon entries via the proceedings site
    #[arg(long)]
    include_dvcon: bool,

    /// Also fetch and include papers via IEEE Xplore keyword search
    #[arg(long)]
    include_ieee: bool,

    /// Also fetch and include papers via Semantic Scholar
    #[arg(long)]
    include_semanticscholar: bool,

    /// Download DVCon PDFs for any DVCon entries discovered
    #[arg(long)]
    download_dvcon_assets: bool,

    /// Write a Markdown appendix of abstracts extracted from downloaded PDFs
    #[arg(long)]
    abstracts_appendix: Option<PathBuf>,
}

impl Cli {
    /// Extra sources named with `--include-*`
    fn includes(&self) -> Vec<SourceKind> {
        [
            (self.include_crossref, SourceKind::CrossRef),
            (self.include_acm, SourceKind::Acm),
            (self.include_openalex, SourceKind::OpenAlex),
            (self.include_dvcon, SourceKind::Dvcon),
            (self.include_ieee, SourceKind::Ieee),
            (self.include_semanticscholar, SourceKind::SemanticScholar),
        ]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
        .collect()
    }

    /// Command-line values take precedence over file and environment
    fn apply(&self, config: &mut Config) {
        if let Some(max_results) = self.max_results {
            config.run.max_results = max_results;
        }
        if let Some(issues_results) = self.issues_results {
            config.run.issues_results = issues_results;
        }
        if let Some(keywords) = &self.keywords {
            config.run.keywords = keywords.clone();
        }
        if let Some(profile) = self.profile {
            config.run.profile = profile;
        }
        if self.download_dvcon_assets {
            config.assets.download = true;
        }
        if let Some(appendix) = &self.abstracts_appendix {
            config.output.abstracts_appendix = Some(appendix.clone());
        }
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("daily_papers={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if config.run.profile == Profile::Verification {
        tracing::info!("Using 'verification' profile: focusing on digital/UVM verification topics.");
    }

    let selection = SourceSelection::resolve(cli.source, &cli.includes(), config.run.profile);
    let show_progress = !cli.quiet && std::io::stderr().is_terminal();
    let pipeline = Pipeline::from_config(config, selection)
        .context("Failed to create HTTP clients")?
        .with_progress(show_progress);

    match pipeline
        .run(RunOptions {
            force_update: cli.force_update,
        })
        .await?
    {
        RunOutcome::AlreadyUpdated { date } => {
            tracing::info!("README already updated for {}", date);
        }
        RunOutcome::Completed {
            date,
            sections,
            papers,
            archive,
        } => {
            tracing::info!(
                "Update for {} complete: {} papers in {} sections, archived to {}",
                date,
                papers,
                sections,
                archive.display()
            );
        }
    }

    Ok(())
}
