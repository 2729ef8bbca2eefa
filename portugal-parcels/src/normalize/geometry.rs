//! Conversion, validation et arrondi des géométries de parcelles

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use super::FeatureError;

/// Convertit la géométrie GeoJSON brute en Polygon/MultiPolygon `geo`
///
/// Un membre `geometry` qui n'est pas une géométrie GeoJSON lisible
/// (coordonnées absentes, type inconnu) est une géométrie invalide.
pub fn to_polygonal(raw: Option<Value>, id: &str) -> Result<Geometry, FeatureError> {
    let raw = raw
        .filter(|v| !v.is_null())
        .ok_or_else(|| FeatureError::MissingGeometry { id: id.to_string() })?;
    let raw: geojson::Geometry = serde_json::from_value(raw)
        .map_err(|e| FeatureError::invalid_geometry(id, format!("malformed geometry: {}", e)))?;

    // Validation sur les positions brutes: la conversion `geo` referme les anneaux
    let checked = match &raw.value {
        geojson::Value::Polygon(rings) => validate_raw_polygon(rings),
        geojson::Value::MultiPolygon(polys) if polys.is_empty() => {
            Err("empty multipolygon".to_string())
        }
        geojson::Value::MultiPolygon(polys) => polys.iter().try_for_each(|p| validate_raw_polygon(p)),
        other => {
            return Err(FeatureError::UnsupportedGeometry {
                id: id.to_string(),
                kind: raw_kind(other).to_string(),
            })
        }
    };
    checked.map_err(|reason| FeatureError::invalid_geometry(id, reason))?;

    let geom: Geometry = Geometry::try_from(raw)
        .map_err(|e| FeatureError::invalid_geometry(id, e.to_string()))?;

    validate_polygonal(&geom).map_err(|reason| FeatureError::invalid_geometry(id, reason))?;
    Ok(geom)
}

fn raw_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn validate_raw_polygon(rings: &[Vec<geojson::Position>]) -> Result<(), String> {
    if rings.is_empty() {
        return Err("polygon without rings".to_string());
    }
    rings.iter().try_for_each(|ring| {
        if ring.len() < 4 {
            return Err(format!("ring has {} positions (minimum 4)", ring.len()));
        }
        if ring.iter().any(|p| p.len() < 2) {
            return Err("position with fewer than 2 ordinates".to_string());
        }
        if ring.first().map(|p| &p[..2]) != ring.last().map(|p| &p[..2]) {
            return Err("ring is not closed".to_string());
        }
        Ok(())
    })
}

/// Vérifie les anneaux: >= 4 positions, fermés, coordonnées finies
pub fn validate_polygonal(geom: &Geometry) -> Result<(), String> {
    fn ring_ok(r: &LineString) -> Result<(), String> {
        // LinearRing: >= 4 points, first == last
        if r.0.len() < 4 {
            return Err(format!("ring has {} positions (minimum 4)", r.0.len()));
        }
        if r.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err("non-finite coordinate".to_string());
        }
        match (r.0.first(), r.0.last()) {
            (Some(a), Some(b)) if a == b => Ok(()),
            _ => Err("ring is not closed".to_string()),
        }
    }

    fn polygon_ok(p: &Polygon) -> Result<(), String> {
        ring_ok(p.exterior())?;
        p.interiors().iter().try_for_each(ring_ok)
    }

    match geom {
        Geometry::Polygon(p) => polygon_ok(p),
        Geometry::MultiPolygon(mp) if mp.0.is_empty() => Err("empty multipolygon".to_string()),
        Geometry::MultiPolygon(mp) => mp.0.iter().try_for_each(polygon_ok),
        other => Err(format!("unsupported geometry type {}", geometry_kind(other))),
    }
}

/// Vérifie que toutes les coordonnées sont des lon/lat plausibles
pub fn validate_geographic(geom: &Geometry) -> Result<(), String> {
    let out_of_range = |c: &Coord| !(-180.0..=180.0).contains(&c.x) || !(-90.0..=90.0).contains(&c.y);

    let bad = match geom {
        Geometry::Polygon(p) => rings(p).any(|r| r.coords().any(out_of_range)),
        Geometry::MultiPolygon(mp) => mp.0.iter().flat_map(rings).any(|r| r.coords().any(out_of_range)),
        _ => false,
    };

    if bad {
        Err("coordinate outside longitude/latitude range".to_string())
    } else {
        Ok(())
    }
}

fn rings(p: &Polygon) -> impl Iterator<Item = &LineString> {
    std::iter::once(p.exterior()).chain(p.interiors().iter())
}

/// Arrondit les coordonnées d'une géométrie à la précision spécifiée
pub fn round_geometry_coords(geom: &Geometry, decimals: u8) -> Geometry {
    let factor = 10_f64.powi(decimals as i32);

    let round_coord = |c: &Coord| -> Coord {
        Coord {
            x: (c.x * factor).round() / factor,
            y: (c.y * factor).round() / factor,
        }
    };

    let round_line = |ls: &LineString| -> LineString {
        LineString::new(ls.0.iter().map(round_coord).collect())
    };

    let round_polygon = |poly: &Polygon| -> Polygon {
        let exterior = round_line(poly.exterior());
        let interiors: Vec<LineString> = poly.interiors().iter().map(round_line).collect();
        Polygon::new(exterior, interiors)
    };

    match geom {
        Geometry::Polygon(poly) => Geometry::Polygon(round_polygon(poly)),
        Geometry::MultiPolygon(mpoly) => {
            Geometry::MultiPolygon(MultiPolygon::new(mpoly.0.iter().map(round_polygon).collect()))
        }
        // Pour les autres types, on retourne tel quel
        other => other.clone(),
    }
}

pub fn geometry_kind(geom: &Geometry) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
