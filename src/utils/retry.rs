//! Bounded retry with fixed backoff around a provider fetch.
//!
//! A provider call is retried when it fails transiently or returns no
//! papers. HTTP 4xx responses stop the loop at once, and configuration
//! errors are never retried. Optional providers degrade to an empty result;
//! the mandatory provider (arXiv) surfaces a [`RetryError`] instead.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::models::Paper;
use crate::sources::{Source, SourceError};

/// How many times to attempt a call and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed pause after an empty or failed attempt
    pub backoff: Duration,
    /// Whether exhausting the budget is fatal for the run
    pub mandatory: bool,
}

impl RetryPolicy {
    /// Policy for the mandatory source: 6 attempts, 10s apart
    pub fn mandatory() -> Self {
        Self {
            max_attempts: 6,
            backoff: Duration::from_secs(10),
            mandatory: true,
        }
    }

    /// Policy for best-effort sources: 3 attempts, 60s apart
    pub fn best_effort() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(60),
            mandatory: false,
        }
    }

    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Failure of a retried call that the caller has to act on
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt failed or came back empty
    #[error("{source_name}: no results after {attempts} attempts")]
    Exhausted { source_name: String, attempts: u32 },

    /// The provider rejected the request with a client error
    #[error("{source_name}: request rejected: {error}")]
    Rejected {
        source_name: String,
        #[source]
        error: SourceError,
    },

    /// The provider is misconfigured (e.g. a missing credential)
    #[error("{source_name}: {error}")]
    Config {
        source_name: String,
        #[source]
        error: SourceError,
    },
}

/// Run `operation` under `policy`, treating an empty result like a failure.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<Vec<T>, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>, SourceError>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(items) if !items.is_empty() => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(items);
            }
            Ok(_) => {
                tracing::warn!(
                    "{} returned no results (attempt {}/{})",
                    label,
                    attempt,
                    max_attempts
                );
            }
            Err(error) if error.is_config_error() => {
                return Err(RetryError::Config {
                    source_name: label.to_string(),
                    error,
                });
            }
            Err(error) if error.is_client_error() => {
                tracing::warn!("{} rejected the request, not retrying: {}", label, error);
                if policy.mandatory {
                    return Err(RetryError::Rejected {
                        source_name: label.to_string(),
                        error,
                    });
                }
                return Ok(Vec::new());
            }
            Err(error) => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}",
                    label,
                    attempt,
                    max_attempts,
                    error
                );
            }
        }

        if attempt < max_attempts {
            tracing::debug!("{}: waiting {:?} before retrying", label, policy.backoff);
            sleep(policy.backoff).await;
        }
    }

    if policy.mandatory {
        tracing::error!("{} failed after {} attempts", label, max_attempts);
        return Err(RetryError::Exhausted {
            source_name: label.to_string(),
            attempts: max_attempts,
        });
    }

    tracing::error!(
        "{} gave nothing after {} attempts, continuing without it",
        label,
        max_attempts
    );
    Ok(Vec::new())
}

/// Fetch from `source` and apply its topic filter, retrying the pair as one unit.
pub async fn fetch_with_retry(
    source: &dyn Source,
    policy: &RetryPolicy,
    keyword: &str,
    max_results: usize,
) -> Result<Vec<Paper>, RetryError> {
    let filter = source.topic_filter();
    with_retry(policy, source.name(), move || async move {
        let papers = source.fetch(keyword, max_results).await?;
        Ok(filter.apply(papers, keyword))
    })
    .await
}
