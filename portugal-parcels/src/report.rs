//! Rapport d'exécution
//!
//! Compteurs par source (pages, features reçues, écrites, rejetées par motif)
//! et statut global du run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use parcel_sources::Source;

use crate::normalize::{DropReason, FeatureError};

/// Nombre maximal de rejets détaillés conservés dans le rapport
const MAX_RECORDED_DROPS: usize = 100;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les features reçues ont été écrites
    Success,
    /// Sortie complète, mais des features ont été rejetées
    PartialSuccess,
    /// Erreur fatale: aucune sortie
    Failed,
}

/// Statistiques d'une source
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    pub pages: u64,
    pub received: u64,
    pub written: u64,
    pub dropped: u64,
    pub by_reason: BTreeMap<DropReason, u64>,
}

/// Feature rejetée, avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct DroppedFeature {
    pub source: Source,
    pub reason: DropReason,
    pub message: String,
}

/// Rapport complet d'un run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub duration_secs: f64,
    pub output: Option<PathBuf>,
    pub inspire: SourceStats,
    pub rgg: SourceStats,
    /// Premiers rejets (au plus `MAX_RECORDED_DROPS`)
    pub drops: Vec<DroppedFeature>,
    /// Cause de l'échec fatal
    pub error: Option<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            status: RunStatus::Success,
            duration_secs: 0.0,
            output: None,
            inspire: SourceStats::default(),
            rgg: SourceStats::default(),
            drops: Vec::new(),
            error: None,
        }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rapport d'un run interrompu par une erreur fatale
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn source(&self, source: Source) -> &SourceStats {
        match source {
            Source::Inspire => &self.inspire,
            Source::Rgg => &self.rgg,
        }
    }

    fn source_mut(&mut self, source: Source) -> &mut SourceStats {
        match source {
            Source::Inspire => &mut self.inspire,
            Source::Rgg => &mut self.rgg,
        }
    }

    /// Enregistre une page reçue
    pub fn record_page(&mut self, source: Source, features: usize) {
        let stats = self.source_mut(source);
        stats.pages += 1;
        stats.received += features as u64;
    }

    /// Enregistre des features écrites
    pub fn record_written(&mut self, source: Source, count: usize) {
        self.source_mut(source).written += count as u64;
    }

    /// Enregistre une feature rejetée
    pub fn record_drop(&mut self, source: Source, error: &FeatureError) {
        let reason = error.reason();
        let stats = self.source_mut(source);
        stats.dropped += 1;
        *stats.by_reason.entry(reason).or_default() += 1;

        if self.drops.len() < MAX_RECORDED_DROPS {
            self.drops.push(DroppedFeature {
                source,
                reason,
                message: error.to_string(),
            });
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    pub fn set_output(&mut self, path: impl Into<PathBuf>) {
        self.output = Some(path.into());
    }

    /// Détermine le statut final d'un run terminé
    pub fn finalize(&mut self) {
        self.status = if self.error.is_some() {
            RunStatus::Failed
        } else if self.total_dropped() > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    pub fn total_written(&self) -> u64 {
        self.inspire.written + self.rgg.written
    }

    pub fn total_dropped(&self) -> u64 {
        self.inspire.dropped + self.rgg.dropped
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("PORTUGAL PARCELS - RUN REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(ref output) = self.output {
            println!("Output: {}", output.display());
        }

        println!("\n--- BY SOURCE ---");
        for source in Source::ALL {
            let stats = self.source(source);
            println!(
                "  {}: {} pages, {} received, {} written, {} dropped",
                source.label(),
                stats.pages,
                stats.received,
                stats.written,
                stats.dropped
            );
            for (reason, count) in &stats.by_reason {
                println!("    {}: {}", reason.as_str(), count);
            }
        }

        if !self.drops.is_empty() {
            println!("\n--- DROPPED ({}) ---", self.total_dropped());
            for d in self.drops.iter().take(20) {
                println!("  [{}] {}", d.source.label(), d.message);
            }
            if self.total_dropped() > 20 {
                println!("  ... and {} more", self.total_dropped() - 20);
            }
        }

        if let Some(ref error) = self.error {
            println!("\n--- FATAL ERROR ---");
            println!("  {}", error);
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} written (INSPIRE {}, RGG {}), {} dropped in {:.1}s",
            self.status,
            self.total_written(),
            self.inspire.written,
            self.rgg.written,
            self.total_dropped(),
            self.duration_secs
        )
    }
}
