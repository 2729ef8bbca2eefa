//! Normalisation des features brutes vers le schéma unifié
//!
//! Chaque source a son propre schéma d'attributs; un [`Normalizer`] par source
//! les ramène à `{id, reference, area_m2, source}` + géométrie EPSG:4326.

pub mod geometry;
pub mod inspire;
pub mod rgg;

use anyhow::Result;
use geo::Geometry;
use geojson::JsonObject;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use parcel_sources::{RawFeature, Source};

use crate::reproject_lite::ReprojectionBackend;

pub use inspire::InspireNormalizer;
pub use rgg::RggNormalizer;

/// Feature au schéma unifié, géométrie en EPSG:4326 (lon/lat)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeature {
    /// Identifiant préfixé par la source (`inspire:...`, `rgg:...`)
    pub id: String,
    /// Référence cadastrale nationale (INSPIRE uniquement)
    pub reference: Option<String>,
    /// Surface en m² (>= 0)
    pub area_m2: f64,
    pub source: Source,
    /// Polygon ou MultiPolygon
    pub geometry: Geometry,
}

/// Motif de rejet d'une feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingId,
    MissingGeometry,
    InvalidGeometry,
    UnsupportedGeometry,
    Reprojection,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::MissingGeometry => "missing_geometry",
            Self::InvalidGeometry => "invalid_geometry",
            Self::UnsupportedGeometry => "unsupported_geometry",
            Self::Reprojection => "reprojection",
        }
    }
}

/// Erreur de normalisation: la feature est rejetée, le run continue
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Feature has no identifier")]
    MissingId,

    #[error("Feature {id} has no geometry")]
    MissingGeometry { id: String },

    #[error("Invalid geometry for {id}: {reason}")]
    InvalidGeometry { id: String, reason: String },

    #[error("Unsupported geometry type for {id}: {kind}")]
    UnsupportedGeometry { id: String, kind: String },

    #[error("Reprojection failed for {id}: {reason}")]
    Reprojection { id: String, reason: String },
}

impl FeatureError {
    pub fn reason(&self) -> DropReason {
        match self {
            Self::MissingId => DropReason::MissingId,
            Self::MissingGeometry { .. } => DropReason::MissingGeometry,
            Self::InvalidGeometry { .. } => DropReason::InvalidGeometry,
            Self::UnsupportedGeometry { .. } => DropReason::UnsupportedGeometry,
            Self::Reprojection { .. } => DropReason::Reprojection,
        }
    }

    pub fn invalid_geometry(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Normalisation d'une source
pub trait Normalizer: Send + Sync {
    /// Source traitée
    fn source(&self) -> Source;

    /// Convertit une feature brute au schéma unifié
    fn normalize(&self, raw: RawFeature) -> Result<NormalizedFeature, FeatureError>;
}

/// Les deux normaliseurs, sélectionnés par tag de source
pub struct Normalizers {
    inspire: InspireNormalizer,
    rgg: RggNormalizer,
}

impl Normalizers {
    /// Reprojection 3763 → 4326 par `backend`, coordonnées arrondies à `precision` décimales
    pub fn new(precision: u8, backend: ReprojectionBackend) -> Result<Self> {
        Ok(Self {
            inspire: InspireNormalizer::new(precision, backend)?,
            rgg: RggNormalizer::new(precision),
        })
    }

    pub fn for_source(&self, source: Source) -> &dyn Normalizer {
        match source {
            Source::Inspire => &self.inspire,
            Source::Rgg => &self.rgg,
        }
    }

    /// Moteur de reprojection utilisé pour INSPIRE
    pub fn reprojection(&self) -> ReprojectionBackend {
        self.inspire.reprojector().backend()
    }
}

/// Cherche une propriété par nom, sans tenir compte de la casse
fn find_property<'a>(props: &'a JsonObject, key: &str) -> Option<&'a Value> {
    props
        .get(key)
        .or_else(|| {
            props
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .filter(|v| !v.is_null())
}

/// Première propriété texte non vide parmi `keys` (les nombres sont convertis)
pub(crate) fn property_string(props: Option<&JsonObject>, keys: &[&str]) -> Option<String> {
    let props = props?;
    keys.iter().find_map(|key| match find_property(props, key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Première propriété numérique finie et positive parmi `keys`
pub(crate) fn property_area(props: Option<&JsonObject>, keys: &[&str]) -> Option<f64> {
    let props = props?;
    keys.iter()
        .find_map(|key| match find_property(props, key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(s),
            _ => None,
        })
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Identifiant natif de la feature (membre `id` GeoJSON, texte ou nombre)
pub(crate) fn feature_id(raw: &RawFeature) -> Option<String> {
    match raw.id.as_ref()? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse un nombre au format texte:
/// - "1234.5" → 1234.5
/// - "1234,5" → 1234.5 (virgule décimale)
/// - " 12 " → 12.0
fn parse_number(raw: &str) -> Option<f64> {
    let v = raw.trim();
    if v.is_empty() {
        return None;
    }
    if let Ok(n) = v.parse::<f64>() {
        return Some(n);
    }
    v.replace(',', ".").parse::<f64>().ok()
}
