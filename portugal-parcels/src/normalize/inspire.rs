//! Normalisation des parcelles INSPIRE (DGT, EPSG:3763)

use anyhow::Result;
use geo::Area;
use tracing::warn;

use parcel_sources::{RawFeature, Source};

use super::geometry::{round_geometry_coords, to_polygonal, validate_geographic};
use super::{feature_id, property_area, property_string, FeatureError, NormalizedFeature, Normalizer};
use crate::reproject_lite::{Reprojection, ReprojectionBackend};

const ID_KEYS: &[&str] = &["inspireid", "localid"];
const REFERENCE_KEYS: &[&str] = &["nationalcadastralreference"];
const AREA_KEYS: &[&str] = &["areavalue"];

/// Normaliseur INSPIRE: reprojection PT-TM06 → WGS84
pub struct InspireNormalizer {
    reprojector: Reprojection,
    precision: u8,
}

impl InspireNormalizer {
    pub fn new(precision: u8, backend: ReprojectionBackend) -> Result<Self> {
        let reprojector = Reprojection::new(backend, Source::Inspire.native_epsg(), 4326)?;
        Ok(Self {
            reprojector,
            precision,
        })
    }

    pub fn reprojector(&self) -> &Reprojection {
        &self.reprojector
    }
}

impl Normalizer for InspireNormalizer {
    fn source(&self) -> Source {
        Source::Inspire
    }

    fn normalize(&self, raw: RawFeature) -> Result<NormalizedFeature, FeatureError> {
        let props = raw.properties.as_ref();

        let Some(native_id) = property_string(props, ID_KEYS).or_else(|| feature_id(&raw)) else {
            warn!(source = "inspire", "Feature without identifier, dropped");
            return Err(FeatureError::MissingId);
        };
        let id = format!("inspire:{}", native_id);

        let reference = property_string(props, REFERENCE_KEYS);
        let declared_area = property_area(props, AREA_KEYS);

        let projected = to_polygonal(raw.geometry, &id)?;

        // Surface planaire en EPSG:3763 (mètres) avant reprojection
        let area_m2 = declared_area.unwrap_or_else(|| projected.unsigned_area());

        let geographic = self
            .reprojector
            .transform_geometry(&projected)
            .map_err(|e| FeatureError::Reprojection {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        validate_geographic(&geographic).map_err(|reason| FeatureError::Reprojection {
            id: id.clone(),
            reason,
        })?;

        Ok(NormalizedFeature {
            id,
            reference,
            area_m2,
            source: Source::Inspire,
            geometry: round_geometry_coords(&geographic, self.precision),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Geometry;
    use serde_json::json;

    fn raw(props: serde_json::Value, ring: Vec<Vec<f64>>) -> RawFeature {
        RawFeature {
            geometry: Some(json!({"type": "Polygon", "coordinates": [ring]})),
            properties: props.as_object().cloned(),
            ..Default::default()
        }
    }

    fn square_100m() -> Vec<Vec<f64>> {
        vec![
            vec![-87_000.0, -105_000.0],
            vec![-86_900.0, -105_000.0],
            vec![-86_900.0, -104_900.0],
            vec![-87_000.0, -104_900.0],
            vec![-87_000.0, -105_000.0],
        ]
    }

    #[test]
    fn test_normalize_full_feature() {
        let n = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();
        let f = raw(
            json!({
                "inspireid": "PT.DGT.CP.1001",
                "nationalcadastralreference": "AB-12",
                "areavalue": 9876.5
            }),
            square_100m(),
        );

        let out = n.normalize(f).unwrap();
        assert_eq!(out.id, "inspire:PT.DGT.CP.1001");
        assert_eq!(out.reference.as_deref(), Some("AB-12"));
        assert_eq!(out.area_m2, 9876.5);
        assert_eq!(out.source, Source::Inspire);

        let Geometry::Polygon(p) = out.geometry else {
            panic!("Expected Polygon geometry");
        };
        assert_eq!(p.exterior().0.len(), 5);
        let first = p.exterior().0[0];
        assert!((first.x - (-9.13345)).abs() < 1e-4, "lon={}", first.x);
        assert!((first.y - 38.71820).abs() < 1e-4, "lat={}", first.y);
    }

    #[test]
    fn test_area_fallback_planar() {
        let n = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();
        let out = n
            .normalize(raw(json!({"inspireid": "x"}), square_100m()))
            .unwrap();
        assert!((out.area_m2 - 10_000.0).abs() < 1e-6);
        assert_eq!(out.reference, None);
    }

    #[test]
    fn test_id_fallbacks() {
        let n = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();

        let out = n
            .normalize(raw(json!({"localid": "L-9"}), square_100m()))
            .unwrap();
        assert_eq!(out.id, "inspire:L-9");

        let mut f = raw(json!({}), square_100m());
        f.id = Some(json!("cadastralparcel.42"));
        assert_eq!(n.normalize(f).unwrap().id, "inspire:cadastralparcel.42");
    }

    #[test]
    fn test_missing_id_dropped() {
        let n = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();
        let err = n.normalize(raw(json!({}), square_100m())).unwrap_err();
        assert!(matches!(err, FeatureError::MissingId));
    }

    #[test]
    fn test_invalid_geometry_dropped() {
        let n = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();
        let mut ring = square_100m();
        ring.pop();
        ring.push(vec![-86_999.0, -105_000.0]);
        let err = n.normalize(raw(json!({"inspireid": "x"}), ring)).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidGeometry { .. }));
    }

    #[cfg(feature = "reproject")]
    #[test]
    fn test_proj_backend_matches_lite() {
        let lite = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();
        let proj = InspireNormalizer::new(7, ReprojectionBackend::Proj).unwrap();
        assert_eq!(proj.reprojector().backend(), ReprojectionBackend::Proj);

        let a = lite.normalize(raw(json!({"inspireid": "x"}), square_100m())).unwrap();
        let b = proj.normalize(raw(json!({"inspireid": "x"}), square_100m())).unwrap();
        let (Geometry::Polygon(pa), Geometry::Polygon(pb)) = (a.geometry, b.geometry) else {
            panic!("Expected Polygon geometries");
        };
        for (ca, cb) in pa.exterior().coords().zip(pb.exterior().coords()) {
            assert!((ca.x - cb.x).abs() < 1e-6 && (ca.y - cb.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_reference_absent() {
        let n = InspireNormalizer::new(7, ReprojectionBackend::Lite).unwrap();
        let out = n
            .normalize(raw(
                json!({"inspireid": "x", "nationalcadastralreference": "  "}),
                square_100m(),
            ))
            .unwrap();
        assert_eq!(out.reference, None);
    }
}
