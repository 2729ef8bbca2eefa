//! Modules d'export (GeoJSON, reprojection PROJ optionnelle)

pub mod geojson;
#[cfg(feature = "reproject")]
pub mod reproject;

pub use self::geojson::{FeatureSink, GeoJsonSink};
#[cfg(feature = "reproject")]
pub use reproject::Reprojector;
