//! Configuration du système
//!
//! Couches, de la plus faible à la plus forte: valeurs par défaut, fichier JSON
//! (`--config`), variables d'environnement (`.env` inclus), options CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use parcel_sources::fetch::DEFAULT_USER_AGENT;
use parcel_sources::{Endpoint, RetryPolicy, Source};

use crate::reproject_lite::ReprojectionBackend;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Fichier GeoJSON final
    pub output: PathBuf,

    /// Précision des coordonnées (décimales). 7 ≈ 1 cm en EPSG:4326
    pub precision: u8,

    /// Moteur de reprojection INSPIRE (`lite` ou `proj`)
    pub reprojection: ReprojectionBackend,

    /// Nombre de lots en attente entre lecteurs et writer
    pub channel_capacity: usize,

    pub user_agent: String,

    pub retry: RetryConfig,

    pub inspire: SourceConfig,

    pub rgg: SourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("portugal_parcels.geojson"),
            precision: 7,
            reprojection: ReprojectionBackend::default(),
            channel_capacity: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig::default(),
            inspire: SourceConfig::default(),
            rgg: SourceConfig::default(),
        }
    }
}

/// Politique de retry (durées en millisecondes)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

/// Surcharges par source; les champs absents gardent les valeurs de l'endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: Option<String>,
    pub page_size: Option<u32>,
    pub timeout_secs: Option<u64>,
    /// Log `info` toutes les N pages
    pub progress_interval: Option<u64>,
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les variables d'environnement
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applique les variables lues par `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(output) = lookup("PARCELS_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Some(url) = lookup("INSPIRE_WFS_URL") {
            self.inspire.url = Some(url);
        }
        if let Some(url) = lookup("RGG_QUERY_URL") {
            self.rgg.url = Some(url);
        }
        if let Some(attempts) = lookup("PARCELS_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts
                .trim()
                .parse()
                .context(format!("Invalid PARCELS_MAX_ATTEMPTS: {}", attempts))?;
        }
        if let Some(backend) = lookup("PARCELS_REPROJECTION") {
            self.reprojection = backend
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid PARCELS_REPROJECTION: {}", e))?;
        }
        if let Some(user_agent) = lookup("PARCELS_USER_AGENT") {
            self.user_agent = user_agent;
        }
        Ok(())
    }

    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be at least 1");
        }
        for source in Source::ALL {
            let cfg = self.source(source);
            if cfg.page_size == Some(0) {
                bail!("{}: page_size must be positive", source.label());
            }
            if cfg.timeout_secs == Some(0) {
                bail!("{}: timeout_secs must be positive", source.label());
            }
            if cfg.progress_interval == Some(0) {
                bail!("{}: progress_interval must be positive", source.label());
            }
        }
        if self.output.as_os_str().is_empty() {
            bail!("output path is empty");
        }
        Ok(())
    }

    pub fn source(&self, source: Source) -> &SourceConfig {
        match source {
            Source::Inspire => &self.inspire,
            Source::Rgg => &self.rgg,
        }
    }

    /// Endpoint d'une source, surcharges appliquées
    pub fn endpoint(&self, source: Source) -> Endpoint {
        let cfg = self.source(source);
        let mut endpoint = match (&cfg.url, source) {
            (Some(url), Source::Inspire) => Endpoint::inspire(url.clone()),
            (Some(url), Source::Rgg) => Endpoint::rgg(url.clone()),
            (None, _) => Endpoint::for_source(source),
        };
        if let Some(page_size) = cfg.page_size {
            endpoint = endpoint.with_page_size(page_size);
        }
        if let Some(secs) = cfg.timeout_secs {
            endpoint = endpoint.with_timeout(Duration::from_secs(secs));
        }
        endpoint
    }

    /// INSPIRE: chaque page (50 000 enregistrements); RGG: toutes les 100 pages
    pub fn progress_interval(&self, source: Source) -> u64 {
        self.source(source).progress_interval.unwrap_or(match source {
            Source::Inspire => 1,
            Source::Rgg => 100,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}
