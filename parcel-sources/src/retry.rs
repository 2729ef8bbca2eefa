//! Politique de retry avec backoff exponentiel

use std::time::Duration;

use tracing::warn;

use crate::endpoint::Endpoint;
use crate::error::SourceError;
use crate::fetch::PageFetcher;
use crate::types::{Cursor, Page};

/// Nombre de tentatives et délais entre tentatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Nombre total de tentatives (>= 1)
    pub max_attempts: u32,
    /// Délai avant la deuxième tentative
    pub initial_backoff: Duration,
    /// Plafond du délai
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Politique sans délai (tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Délai après l'échec de la tentative `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Récupère une page en retentant les erreurs de transport
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    endpoint: &Endpoint,
    cursor: Cursor,
    policy: &RetryPolicy,
) -> Result<Page, SourceError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match fetcher.fetch_page(endpoint, cursor).await {
            Ok(page) => return Ok(page),
            Err(e) if attempt >= max_attempts => {
                return Err(SourceError::RetriesExhausted {
                    source_name: endpoint.source,
                    offset: cursor.offset,
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    source = %endpoint.source,
                    offset = cursor.offset,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Page fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::types::Source;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Échoue `failures` fois puis renvoie une page vide
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageFetcher for Flaky {
        async fn fetch_page(
            &self,
            endpoint: &Endpoint,
            cursor: Cursor,
        ) -> Result<Page, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::Http {
                    url: endpoint.url.clone(),
                    status: 502,
                    message: "bad gateway".to_string(),
                })
            } else {
                Ok(Page::new(cursor, Vec::new()))
            }
        }

        async fn fetch_total(&self, _endpoint: &Endpoint) -> Result<u64, TransportError> {
            Ok(0)
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let fetcher = Flaky {
            failures: 3,
            calls: AtomicU32::new(0),
        };
        let endpoint = Endpoint::inspire("http://localhost/wfs");
        let page = fetch_with_retry(
            &fetcher,
            &endpoint,
            Cursor::start(10),
            &RetryPolicy::immediate(4),
        )
        .await
        .unwrap();

        assert!(page.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let fetcher = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let endpoint = Endpoint::rgg("http://localhost/query");
        let err = fetch_with_retry(
            &fetcher,
            &endpoint,
            Cursor::start(10).advance(),
            &RetryPolicy::immediate(3),
        )
        .await
        .unwrap_err();

        match err {
            SourceError::RetriesExhausted {
                source_name,
                offset,
                attempts,
                ..
            } => {
                assert_eq!(source_name, Source::Rgg);
                assert_eq!(offset, 10);
                assert_eq!(attempts, 3);
            }
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }
}
