//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use proj::Proj;

/// Reprojection de géométries entre deux systèmes de coordonnées
///
/// `Proj` n'est pas `Sync`: l'accès est sérialisé pour pouvoir partager
/// le reprojector entre les workers rayon.
pub struct Reprojector {
    proj: Mutex<Proj>,
    source_epsg: u32,
    target_epsg: u32,
}

impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).context(format!(
            "Failed to create projection from {} to {}",
            source, target
        ))?;

        Ok(Self {
            proj: Mutex::new(proj),
            source_epsg,
            target_epsg,
        })
    }

    /// Retourne le SRID source
    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    /// Retourne le SRID cible
    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une géométrie (Polygon ou MultiPolygon)
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        let proj = self
            .proj
            .lock()
            .map_err(|_| anyhow!("PROJ context poisoned"))?;

        match geom {
            Geometry::Polygon(p) => Ok(Geometry::Polygon(transform_polygon(&proj, p)?)),
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>> =
                    mp.0.iter().map(|p| transform_polygon(&proj, p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            _ => bail!("Type de géométrie non supporté"),
        }
    }
}

/// Transforme une LineString (optimisé avec batch conversion)
fn transform_linestring(proj: &Proj, ls: &LineString) -> Result<LineString> {
    // Copier les coordonnées pour transformation in-place
    let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

    // Transformation batch - beaucoup plus rapide que point par point
    proj.convert_array(&mut coords)
        .context("Batch coordinate transformation failed")?;

    if coords.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        bail!("Transformation produced a non-finite coordinate");
    }

    let result: Vec<Coord> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
    Ok(LineString::new(result))
}

fn transform_polygon(proj: &Proj, p: &Polygon) -> Result<Polygon> {
    let exterior = transform_linestring(proj, p.exterior())?;
    let interiors: Result<Vec<LineString>> = p
        .interiors()
        .iter()
        .map(|ls| transform_linestring(proj, ls))
        .collect();
    Ok(Polygon::new(exterior, interiors?))
}
