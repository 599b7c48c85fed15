//! Which providers a run queries.

use std::collections::HashSet;

use super::Profile;
use crate::models::SourceKind;

/// Primary source named on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceChoice {
    Arxiv,
    #[value(name = "crossref")]
    CrossRef,
    Acm,
    #[value(name = "openalex")]
    OpenAlex,
    #[value(name = "semanticscholar")]
    SemanticScholar,
    Ieee,
    Dvcon,
    /// arXiv plus the extra sources
    #[default]
    All,
}

impl SourceChoice {
    fn kind(&self) -> Option<SourceKind> {
        match self {
            SourceChoice::Arxiv => Some(SourceKind::Arxiv),
            SourceChoice::CrossRef => Some(SourceKind::CrossRef),
            SourceChoice::Acm => Some(SourceKind::Acm),
            SourceChoice::OpenAlex => Some(SourceKind::OpenAlex),
            SourceChoice::SemanticScholar => Some(SourceKind::SemanticScholar),
            SourceChoice::Ieee => Some(SourceKind::Ieee),
            SourceChoice::Dvcon => Some(SourceKind::Dvcon),
            SourceChoice::All => None,
        }
    }
}

/// Enabled providers, remembering which ones were asked for by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSelection {
    enabled: HashSet<SourceKind>,
    explicit: HashSet<SourceKind>,
}

impl SourceSelection {
    /// Resolve the command-line choice.
    ///
    /// `all` means arXiv plus the `includes`; a single source means that
    /// source plus the `includes`. With `all` or the verification profile
    /// and no `includes`, every extra source is enabled implicitly.
    pub fn resolve(primary: SourceChoice, includes: &[SourceKind], profile: Profile) -> Self {
        let mut explicit: HashSet<SourceKind> = includes.iter().copied().collect();
        let mut enabled = explicit.clone();

        match primary.kind() {
            Some(kind) => {
                explicit.insert(kind);
                enabled.insert(kind);
            }
            None => {
                enabled.insert(SourceKind::Arxiv);
            }
        }

        let implicit_extras =
            includes.is_empty() && (primary == SourceChoice::All || profile == Profile::Verification);
        if implicit_extras {
            tracing::info!("No extra sources explicitly enabled; enabling every extra source");
            enabled.extend(
                SourceKind::QUERY_ORDER
                    .into_iter()
                    .filter(|k| *k != SourceKind::Arxiv),
            );
        }

        Self { enabled, explicit }
    }

    /// Enable exactly `kinds`, all of them explicitly
    pub fn only(kinds: &[SourceKind]) -> Self {
        let set: HashSet<SourceKind> = kinds.iter().copied().collect();
        Self {
            enabled: set.clone(),
            explicit: set,
        }
    }

    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Whether `kind` was named by the user rather than enabled by default
    pub fn is_explicit(&self, kind: SourceKind) -> bool {
        self.explicit.contains(&kind)
    }

    /// Drop a source from the run
    pub fn disable(&mut self, kind: SourceKind) {
        self.enabled.remove(&kind);
    }

    /// Enabled kinds in query order
    pub fn kinds(&self) -> Vec<SourceKind> {
        SourceKind::QUERY_ORDER
            .into_iter()
            .filter(|k| self.enabled.contains(k))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}
