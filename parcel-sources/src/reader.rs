//! Lecture paginée d'une source complète
//!
//! Le curseur démarre à 0 et avance de la taille de page après chaque page.
//! Il n'y a pas de total fiable côté API: la lecture s'arrête à la première
//! page courte (moins d'enregistrements que demandé, zéro compris). Une
//! dernière page pleine entraîne donc une requête supplémentaire vide.

use std::sync::Arc;

use futures::stream::{self, Stream};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::SourceError;
use crate::fetch::PageFetcher;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::types::{Cursor, Page, Source};

/// Lecteur paginé d'une source
#[derive(Clone)]
pub struct SourceReader {
    fetcher: Arc<dyn PageFetcher>,
    endpoint: Endpoint,
    retry: RetryPolicy,
    progress_interval: u64,
}

/// État de la pagination entre deux pages
struct ReadState {
    /// `None` une fois la source terminée
    cursor: Option<Cursor>,
    /// Nombre de pages attendu, sondé avant la première page
    expected_pages: Option<Option<u64>>,
}

impl SourceReader {
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoint: Endpoint, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            endpoint,
            retry,
            progress_interval: 1,
        }
    }

    /// Log `info` toutes les `interval` pages (les autres en `debug`)
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn source(&self) -> Source {
        self.endpoint.source
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Séquence paginée paresseuse des pages de la source
    ///
    /// Chaque appel repart de l'offset 0. La séquence s'arrête après la
    /// première page courte, ou sur la première erreur fatale.
    pub fn pages(&self) -> impl Stream<Item = Result<Page, SourceError>> + Send + '_ {
        let initial = ReadState {
            cursor: Some(Cursor::start(self.endpoint.page_size)),
            expected_pages: None,
        };

        stream::try_unfold(initial, move |mut state| async move {
            let Some(cursor) = state.cursor else {
                return Ok(None);
            };

            if state.expected_pages.is_none() {
                state.expected_pages = Some(self.fetch_expected_pages().await);
            }

            let page = fetch_with_retry(self.fetcher.as_ref(), &self.endpoint, cursor, &self.retry)
                .await?;

            if page.len() > page.requested() {
                warn!(
                    source = %self.endpoint.source,
                    offset = cursor.offset,
                    requested = page.requested(),
                    received = page.len(),
                    "API returned more records than requested"
                );
            }

            self.log_progress(&page, state.expected_pages.flatten());

            state.cursor = if page.is_last() {
                None
            } else {
                Some(cursor.advance())
            };
            Ok(Some((page, state)))
        })
    }

    /// Sonde le nombre total (informatif, jamais fatal, sans retry)
    ///
    /// La requête a son propre timeout court (`Endpoint::count_timeout`).
    async fn fetch_expected_pages(&self) -> Option<u64> {
        match self.fetcher.fetch_total(&self.endpoint).await {
            Ok(total) => {
                let pages = self.endpoint.expected_pages(total);
                info!(
                    source = %self.endpoint.source,
                    total,
                    pages,
                    "Total {} parcels: {}",
                    self.endpoint.source.label(),
                    total
                );
                Some(pages)
            }
            Err(e) => {
                warn!(
                    source = %self.endpoint.source,
                    error = %e,
                    "Could not fetch record count, progress will not show totals"
                );
                None
            }
        }
    }

    fn log_progress(&self, page: &Page, expected_pages: Option<u64>) {
        let number = page.cursor.page_number();
        let pages = expected_pages
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());

        if number % self.progress_interval == 0 || page.is_last() {
            info!(
                source = %self.endpoint.source,
                received = page.len(),
                "{} {}/{}",
                self.endpoint.source.label(),
                number,
                pages
            );
        } else {
            debug!(
                source = %self.endpoint.source,
                received = page.len(),
                "{} {}/{}",
                self.endpoint.source.label(),
                number,
                pages
            );
        }
    }
}
