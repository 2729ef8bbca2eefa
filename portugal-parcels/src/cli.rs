//! Commande principale: téléchargement des deux sources et fusion

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use parcel_sources::HttpPageFetcher;
use portugal_parcels::reproject_lite::ReprojectionBackend;
use portugal_parcels::{Config, GeoJsonSink, PipelineContext, RunReport};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Output GeoJSON file (default: portugal_parcels.geojson)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Attempts per page before the run is aborted
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Reprojection backend for INSPIRE geometries: lite or proj
    #[arg(long)]
    pub reprojection: Option<ReprojectionBackend>,
}

impl RunArgs {
    /// Résout la configuration: défauts, fichier, environnement, options CLI
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.apply_env()?;

        if let Some(ref output) = self.output {
            config.output = output.clone();
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(backend) = self.reprojection {
            config.reprojection = backend;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Exécute le téléchargement complet
pub async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = args.resolve_config()?;

    let fetcher = HttpPageFetcher::with_default_client()
        .context("Failed to build HTTP client")?
        .with_user_agent(config.user_agent.clone());
    let ctx = PipelineContext::from_config(&config, Arc::new(fetcher))?;

    info!(
        output = %config.output.display(),
        reprojection = %ctx.normalizers.reprojection(),
        "Downloading INSPIRE and RGG parcels"
    );

    let sink = GeoJsonSink::create(&config.output).context(format!(
        "Failed to create temporary output next to {}",
        config.output.display()
    ))?;

    let report = match portugal_parcels::run(ctx, sink).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Run aborted, no output written");
            if let Some(ref path) = args.report {
                save_report(&RunReport::failed(e.to_string()), path);
            }
            return Err(e.into());
        }
    };

    report.display();
    if let Some(ref path) = args.report {
        save_report(&report, path);
    }
    info!("{}", report.summary());

    Ok(())
}

fn save_report(report: &RunReport, path: &std::path::Path) {
    match report.save_to_file(path) {
        Ok(()) => info!(path = %path.display(), "Report saved"),
        Err(e) => error!(path = %path.display(), error = %e, "Failed to save report"),
    }
}
