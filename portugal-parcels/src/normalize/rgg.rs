//! Normalisation des parcelles RGG (BUPi, déjà en EPSG:4326)

use geo::GeodesicArea;
use tracing::warn;

use parcel_sources::{RawFeature, Source};

use super::geometry::{round_geometry_coords, to_polygonal, validate_geographic};
use super::{feature_id, property_area, property_string, FeatureError, NormalizedFeature, Normalizer};

const ID_KEYS: &[&str] = &["objectid"];
const AREA_KEYS: &[&str] = &["st_area(shape)", "Shape__Area", "shape_area"];

pub struct RggNormalizer {
    precision: u8,
}

impl RggNormalizer {
    pub fn new(precision: u8) -> Self {
        Self { precision }
    }
}

impl Normalizer for RggNormalizer {
    fn source(&self) -> Source {
        Source::Rgg
    }

    fn normalize(&self, raw: RawFeature) -> Result<NormalizedFeature, FeatureError> {
        let props = raw.properties.as_ref();

        let Some(native_id) = property_string(props, ID_KEYS).or_else(|| feature_id(&raw)) else {
            warn!(source = "rgg", "Feature without identifier, dropped");
            return Err(FeatureError::MissingId);
        };
        let id = format!("rgg:{}", native_id);

        let declared_area = property_area(props, AREA_KEYS);

        let geometry = to_polygonal(raw.geometry, &id)?;
        validate_geographic(&geometry).map_err(|reason| FeatureError::invalid_geometry(&id, reason))?;

        // Surface géodésique sur l'ellipsoïde WGS84
        let area_m2 = declared_area.unwrap_or_else(|| geometry.geodesic_area_unsigned());

        Ok(NormalizedFeature {
            id,
            reference: None,
            area_m2,
            source: Source::Rgg,
            geometry: round_geometry_coords(&geometry, self.precision),
        })
    }
}
