//! # portugal-parcels
//!
//! Téléchargement et fusion des parcelles cadastrales portugaises en un seul GeoJSON.
//!
//! ## Features
//!
//! - Deux sources: INSPIRE (DGT, EPSG:3763) et RGG (BUPi, EPSG:4326)
//! - Reprojection PT-TM06 → WGS84 en Rust pur (PROJ optionnel: feature `reproject`)
//! - Schéma unifié `{id, reference, area_m2, source}`
//! - Écriture en streaming, fichier temporaire puis renommage atomique
//! - Rapport d'exécution par source
//!
//! ## Usage CLI
//!
//! ```bash
//! portugal-parcels --output ./portugal_parcels.geojson
//! portugal-parcels --config ./parcels.json --report ./report.json -v
//! ```

pub mod config;
pub mod export;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod reproject_lite;

pub use config::Config;
pub use export::{FeatureSink, GeoJsonSink};
pub use normalize::{NormalizedFeature, Normalizers};
pub use pipeline::{run, PipelineContext, PipelineError};
pub use report::{RunReport, RunStatus};
