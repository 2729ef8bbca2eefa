//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte la projection des parcelles INSPIRE portugaises :
//! - PT-TM06/ETRS89 (EPSG:3763) ↔ WGS84 (EPSG:4326)
//!
//! ETRS89 et WGS84 sont considérés confondus (écart sub-métrique).

mod backend;
mod ellipsoid;
mod tmerc;

pub use backend::{Reprojection, ReprojectionBackend};
pub use tmerc::TransverseMercator;

use anyhow::{bail, Result};
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Reprojection légère PT-TM06 ↔ WGS84
pub struct ReprojectorLite {
    source_epsg: u32,
    target_epsg: u32,
    tm: TransverseMercator,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if !Self::is_supported(source_epsg, target_epsg) {
            bail!(
                "EPSG:{} → EPSG:{} non supporté. Paires supportées: 3763 → 4326, 4326 → 3763",
                source_epsg,
                target_epsg
            );
        }

        Ok(Self {
            source_epsg,
            target_epsg,
            tm: TransverseMercator::pt_tm06(),
        })
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        matches!((source, target), (3763, 4326) | (4326, 3763))
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (tx, ty) = match (self.source_epsg, self.target_epsg) {
            (3763, 4326) => self.tm.inverse(x, y)?.to_degrees(),
            (4326, 3763) => self.tm.forward(Geographic::from_degrees(x, y))?,
            (s, t) => bail!("EPSG:{} → EPSG:{} non supporté", s, t),
        };

        if !tx.is_finite() || !ty.is_finite() {
            bail!("Transformation produced a non-finite coordinate for ({}, {})", x, y);
        }
        Ok((tx, ty))
    }

    /// Transforme une géométrie (Polygon ou MultiPolygon)
    ///
    /// L'ordre, le nombre de sommets et le sens des anneaux sont conservés.
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match geom {
            Geometry::Polygon(poly) => Ok(Geometry::Polygon(self.transform_polygon(poly)?)),
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>> =
                    mp.iter().map(|poly| self.transform_polygon(poly)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            _ => bail!("Type de géométrie non supporté"),
        }
    }

    fn transform_ring(&self, ring: &LineString) -> Result<LineString> {
        let coords: Result<Vec<Coord>> = ring
            .coords()
            .map(|c| {
                let (x, y) = self.transform_point(c.x, c.y)?;
                Ok(Coord { x, y })
            })
            .collect();
        Ok(LineString::new(coords?))
    }

    fn transform_polygon(&self, poly: &Polygon) -> Result<Polygon> {
        let exterior = self.transform_ring(poly.exterior())?;
        let interiors: Result<Vec<LineString>> = poly
            .interiors()
            .iter()
            .map(|ring| self.transform_ring(ring))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}
