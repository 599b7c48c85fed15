//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::filter::TopicFilter;
use crate::models::{Paper, SourceKind};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// One scripted reply of a [`MockSource`]
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return these papers (an empty list is an empty result)
    Papers(Vec<Paper>),
    /// Fail with this HTTP status
    Status(u16),
    /// Fail with a transport error
    Network(String),
    /// Fail with a configuration error
    Config(String),
}

impl MockOutcome {
    fn into_result(self) -> Result<Vec<Paper>, SourceError> {
        match self {
            MockOutcome::Papers(papers) => Ok(papers),
            MockOutcome::Status(status) => Err(SourceError::Http {
                status,
                message: format!("mock status {}", status),
            }),
            MockOutcome::Network(message) => Err(SourceError::Network(message)),
            MockOutcome::Config(message) => Err(SourceError::Config(message)),
        }
    }
}

/// A source that replays scripted outcomes and counts its calls.
///
/// Outcomes are consumed in order; the last one repeats once the script
/// runs out. Topic filtering follows the real adapter of the same kind.
#[derive(Debug)]
pub struct MockSource {
    kind: SourceKind,
    mandatory: bool,
    capabilities: SourceCapabilities,
    script: Mutex<VecDeque<MockOutcome>>,
    last: Mutex<Option<MockOutcome>>,
    keywords: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source impersonating `kind`.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            mandatory: kind == SourceKind::Arxiv,
            capabilities: SourceCapabilities::SEARCH,
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            keywords: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mark the source as mandatory
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Reply with `outcome` on every call
    pub fn always(self, outcome: MockOutcome) -> Self {
        self.script(vec![outcome])
    }

    /// Reply with each outcome in turn, repeating the last one
    pub fn script(self, outcomes: Vec<MockOutcome>) -> Self {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = outcomes.into();
        self
    }

    /// Number of times `fetch` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Keywords passed to `fetch`, in call order
    pub fn keywords(&self) -> Vec<String> {
        self.keywords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_outcome(&self) -> MockOutcome {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(outcome) = script.pop_front() {
            *last = Some(outcome.clone());
            return outcome;
        }
        last.clone().unwrap_or(MockOutcome::Papers(Vec::new()))
    }
}

#[async_trait]
impl Source for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    fn topic_filter(&self) -> TopicFilter {
        match self.kind {
            SourceKind::Arxiv => TopicFilter::SubjectPrefix,
            SourceKind::CrossRef
            | SourceKind::OpenAlex
            | SourceKind::SemanticScholar
            | SourceKind::Acm => TopicFilter::Verification,
            SourceKind::Ieee | SourceKind::Dvcon => TopicFilter::None,
        }
    }

    async fn fetch(&self, keyword: &str, _max_results: usize) -> Result<Vec<Paper>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keywords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(keyword.to_string());
        self.next_outcome().into_result()
    }
}
