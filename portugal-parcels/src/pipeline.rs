//! Orchestration: lecture des deux sources, normalisation, écriture unique
//!
//! ```text
//!  INSPIRE reader ─┐  (spawn_blocking + rayon)
//!                  ├─ normalize ─→ mpsc borné ─→ writer (thread bloquant) ─→ GeoJsonSink
//!  RGG reader ─────┘
//! ```
//!
//! Les deux lecteurs sont pollés ensemble (`try_join!`): la première erreur
//! fatale annule l'autre. La sortie n'est validée (`commit`) que si les deux
//! sources sont complètes et que le writer a tout écrit.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::Context;
use futures::TryStreamExt;
use rayon::prelude::*;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, info};

use parcel_sources::{Endpoint, PageFetcher, RetryPolicy, Source, SourceError, SourceReader};

use crate::config::Config;
use crate::export::FeatureSink;
use crate::normalize::{NormalizedFeature, Normalizers};
use crate::report::RunReport;

/// Erreur fatale du pipeline: aucune sortie n'est produite
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to write output: {0}")]
    Write(#[source] io::Error),

    #[error("Writer stopped before all batches were delivered")]
    WriterClosed,

    #[error("Worker task failed: {0}")]
    Task(#[from] JoinError),
}

/// Paramètres d'une source
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub endpoint: Endpoint,
    pub progress_interval: u64,
}

/// Contexte explicite d'un run (pas d'état global)
pub struct PipelineContext {
    pub fetcher: Arc<dyn PageFetcher>,
    pub inspire: SourceSettings,
    pub rgg: SourceSettings,
    pub retry: RetryPolicy,
    pub normalizers: Arc<Normalizers>,
    pub channel_capacity: usize,
}

impl PipelineContext {
    pub fn from_config(config: &Config, fetcher: Arc<dyn PageFetcher>) -> anyhow::Result<Self> {
        let normalizers = Normalizers::new(config.precision, config.reprojection)
            .context("Failed to initialize normalizers")?;
        let settings = |source: Source| SourceSettings {
            endpoint: config.endpoint(source),
            progress_interval: config.progress_interval(source),
        };

        Ok(Self {
            fetcher,
            inspire: settings(Source::Inspire),
            rgg: settings(Source::Rgg),
            retry: config.retry_policy(),
            normalizers: Arc::new(normalizers),
            channel_capacity: config.channel_capacity,
        })
    }

    fn reader(&self, source: Source) -> SourceReader {
        let settings = match source {
            Source::Inspire => &self.inspire,
            Source::Rgg => &self.rgg,
        };
        SourceReader::new(
            Arc::clone(&self.fetcher),
            settings.endpoint.clone(),
            self.retry,
        )
        .with_progress_interval(settings.progress_interval)
    }
}

/// Lot de features normalisées d'une page
struct Batch {
    source: Source,
    features: Vec<NormalizedFeature>,
}

/// Features écrites par source
#[derive(Debug, Default)]
struct WriteTotals {
    inspire: usize,
    rgg: usize,
}

/// Exécute le pipeline complet et valide la sortie
pub async fn run<S>(ctx: PipelineContext, sink: S) -> Result<RunReport, PipelineError>
where
    S: FeatureSink + Send + 'static,
{
    let started = Instant::now();
    let report = Mutex::new(RunReport::new());

    let (tx, rx) = mpsc::channel::<Batch>(ctx.channel_capacity.max(1));
    let writer = tokio::task::spawn_blocking(move || write_batches(sink, rx));

    let inspire = ctx.reader(Source::Inspire);
    let rgg = ctx.reader(Source::Rgg);

    let read_result = tokio::try_join!(
        read_source(&inspire, &ctx.normalizers, tx.clone(), &report),
        read_source(&rgg, &ctx.normalizers, tx, &report),
    );

    // Tous les émetteurs sont relâchés: le writer termine sa file
    let write_result = writer.await?;

    let (sink, totals) = match (read_result, write_result) {
        // Une erreur d'écriture prime sur le `WriterClosed` qu'elle provoque
        (_, Err(e)) => return Err(PipelineError::Write(e)),
        // Le sink abandonné supprime son fichier temporaire
        (Err(e), Ok(_)) => return Err(e),
        (Ok(_), Ok(written)) => written,
    };

    let output = tokio::task::spawn_blocking(move || sink.commit())
        .await?
        .map_err(PipelineError::Write)?;

    let mut report = report.into_inner().unwrap_or_else(|e| e.into_inner());
    report.record_written(Source::Inspire, totals.inspire);
    report.record_written(Source::Rgg, totals.rgg);
    report.set_output(output);
    report.set_duration(started.elapsed());
    report.finalize();

    Ok(report)
}

/// Lit une source, normalise chaque page et envoie les lots au writer
async fn read_source(
    reader: &SourceReader,
    normalizers: &Arc<Normalizers>,
    tx: mpsc::Sender<Batch>,
    report: &Mutex<RunReport>,
) -> Result<(), PipelineError> {
    let source = reader.source();
    info!(source = %source, url = %reader.endpoint().url, "Reading {}", source.label());

    let mut pages = Box::pin(reader.pages());
    while let Some(page) = pages.try_next().await? {
        let received = page.len();
        let normalizers = Arc::clone(normalizers);

        // L'ordre des features est conservé par collect()
        let outcomes = tokio::task::spawn_blocking(move || {
            let normalizer = normalizers.for_source(source);
            page.features
                .into_par_iter()
                .map(|raw| normalizer.normalize(raw))
                .collect::<Vec<_>>()
        })
        .await?;

        let mut features = Vec::with_capacity(outcomes.len());
        {
            let mut report = lock(report);
            report.record_page(source, received);
            for outcome in outcomes {
                match outcome {
                    Ok(feature) => features.push(feature),
                    Err(e) => {
                        debug!(source = %source, reason = e.reason().as_str(), "{}", e);
                        report.record_drop(source, &e);
                    }
                }
            }
        }

        if !features.is_empty() {
            tx.send(Batch { source, features })
                .await
                .map_err(|_| PipelineError::WriterClosed)?;
        }
    }

    info!(source = %source, "{} complete", source.label());
    Ok(())
}

/// Boucle du writer: unique propriétaire du sink
fn write_batches<S: FeatureSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Batch>,
) -> io::Result<(S, WriteTotals)> {
    let mut totals = WriteTotals::default();

    while let Some(batch) = rx.blocking_recv() {
        for feature in &batch.features {
            sink.write(feature)?;
        }
        match batch.source {
            Source::Inspire => totals.inspire += batch.features.len(),
            Source::Rgg => totals.rgg += batch.features.len(),
        }
    }

    Ok((sink, totals))
}

fn lock(report: &Mutex<RunReport>) -> MutexGuard<'_, RunReport> {
    report.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parcel_sources::{Cursor, Page, RawFeature, TransportError};
    use serde_json::json;
    use std::path::PathBuf;

    /// Fetcher en mémoire: `totals` features par source, pages découpées selon le curseur
    struct InMemory {
        inspire: usize,
        rgg: usize,
        fail_rgg: bool,
    }

    fn inspire_feature(i: usize) -> RawFeature {
        let x = -87_000.0 + (i % 1000) as f64;
        let y = -105_000.0 + (i / 1000) as f64;
        RawFeature {
            geometry: Some(json!({
                "type": "Polygon",
                "coordinates": [[[x, y], [x + 0.5, y], [x + 0.5, y + 0.5], [x, y]]]
            })),
            properties: json!({"inspireid": format!("PT.{}", i)}).as_object().cloned(),
            ..Default::default()
        }
    }

    fn rgg_feature(i: usize) -> RawFeature {
        let x = -8.0 + i as f64 * 1e-4;
        RawFeature {
            geometry: Some(json!({
                "type": "Polygon",
                "coordinates": [[[x, 40.0], [x + 1e-5, 40.0], [x + 1e-5, 40.00001], [x, 40.0]]]
            })),
            // une feature sur 10 sans identifiant
            properties: if i % 10 == 9 {
                None
            } else {
                json!({"objectid": i}).as_object().cloned()
            },
            ..Default::default()
        }
    }

    #[async_trait]
    impl PageFetcher for InMemory {
        async fn fetch_page(&self, endpoint: &Endpoint, cursor: Cursor) -> Result<Page, TransportError> {
            let (total, make): (usize, fn(usize) -> RawFeature) = match endpoint.source {
                Source::Inspire => (self.inspire, inspire_feature),
                Source::Rgg if self.fail_rgg => {
                    return Err(TransportError::Http {
                        url: endpoint.url.clone(),
                        status: 500,
                        message: "boom".to_string(),
                    })
                }
                Source::Rgg => (self.rgg, rgg_feature),
            };
            let start = (cursor.offset as usize).min(total);
            let end = (start + cursor.count as usize).min(total);
            Ok(Page::new(cursor, (start..end).map(make).collect()))
        }

        async fn fetch_total(&self, endpoint: &Endpoint) -> Result<u64, TransportError> {
            Ok(match endpoint.source {
                Source::Inspire => self.inspire as u64,
                Source::Rgg => self.rgg as u64,
            })
        }
    }

    /// Sink en mémoire
    #[derive(Default)]
    struct VecSink {
        written: Vec<NormalizedFeature>,
        committed: Arc<Mutex<Option<Vec<NormalizedFeature>>>>,
    }

    impl FeatureSink for VecSink {
        fn write(&mut self, feature: &NormalizedFeature) -> io::Result<()> {
            self.written.push(feature.clone());
            Ok(())
        }

        fn commit(self) -> io::Result<PathBuf> {
            *self.committed.lock().unwrap() = Some(self.written);
            Ok(PathBuf::from("memory"))
        }
    }

    fn context(fetcher: InMemory) -> PipelineContext {
        let mut config = Config::default();
        config.inspire.page_size = Some(100);
        config.rgg.page_size = Some(30);
        let mut ctx = PipelineContext::from_config(&config, Arc::new(fetcher)).unwrap();
        ctx.retry = RetryPolicy::immediate(2);
        ctx
    }

    #[tokio::test]
    async fn test_run_merges_both_sources() {
        let sink = VecSink::default();
        let committed = Arc::clone(&sink.committed);
        let ctx = context(InMemory {
            inspire: 250,
            rgg: 90,
            fail_rgg: false,
        });

        let report = run(ctx, sink).await.unwrap();

        let features = committed.lock().unwrap().take().unwrap();
        assert_eq!(features.len(), 250 + 81);
        assert_eq!(report.inspire.pages, 3);
        // 90 = 3 × 30: page vide supplémentaire
        assert_eq!(report.rgg.pages, 4);
        assert_eq!(report.inspire.written, 250);
        assert_eq!(report.rgg.written, 81);
        assert_eq!(report.rgg.dropped, 9);
        assert_eq!(report.status, crate::report::RunStatus::PartialSuccess);

        // Ordre conservé à l'intérieur d'une source
        let inspire_ids: Vec<_> = features
            .iter()
            .filter(|f| f.source == Source::Inspire)
            .map(|f| f.id.clone())
            .collect();
        let expected: Vec<_> = (0..250).map(|i| format!("inspire:PT.{}", i)).collect();
        assert_eq!(inspire_ids, expected);

        assert!(features
            .iter()
            .all(|f| crate::normalize::geometry::validate_geographic(&f.geometry).is_ok()));
    }

    #[test]
    fn test_context_uses_configured_reprojection() {
        let fetcher = || Arc::new(InMemory { inspire: 0, rgg: 0, fail_rgg: false });

        let ctx = PipelineContext::from_config(&Config::default(), fetcher()).unwrap();
        assert_eq!(
            ctx.normalizers.reprojection(),
            crate::reproject_lite::ReprojectionBackend::Lite
        );

        let mut config = Config::default();
        config.reprojection = crate::reproject_lite::ReprojectionBackend::Proj;
        let result = PipelineContext::from_config(&config, fetcher());
        if cfg!(feature = "reproject") {
            let ctx = result.unwrap();
            assert_eq!(
                ctx.normalizers.reprojection(),
                crate::reproject_lite::ReprojectionBackend::Proj
            );
        } else {
            assert!(result.is_err());
        }
    }

    #[tokio::test]
    async fn test_source_failure_is_fatal() {
        let sink = VecSink::default();
        let committed = Arc::clone(&sink.committed);
        let ctx = context(InMemory {
            inspire: 250,
            rgg: 90,
            fail_rgg: true,
        });

        let err = run(ctx, sink).await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(ref e) if e.source_name() == Source::Rgg));
        assert!(committed.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_takes_precedence() {
        struct Broken;
        impl FeatureSink for Broken {
            fn write(&mut self, _: &NormalizedFeature) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            }
            fn commit(self) -> io::Result<PathBuf> {
                panic!("must not commit");
            }
        }

        let ctx = context(InMemory {
            inspire: 2_000,
            rgg: 900,
            fail_rgg: false,
        });
        let err = run(ctx, Broken).await.unwrap_err();
        assert!(matches!(err, PipelineError::Write(_)), "{:?}", err);
    }
}
