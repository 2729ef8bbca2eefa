//! Choix du moteur de reprojection des parcelles INSPIRE
//!
//! `lite` (défaut) n'a besoin d'aucune bibliothèque système. `proj` passe par
//! PROJ et n'existe que si le crate est compilé avec `--features reproject`.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
#[cfg(not(feature = "reproject"))]
use anyhow::bail;
use geo::Geometry;
use serde::{Deserialize, Serialize};

use super::ReprojectorLite;

/// Moteur demandé (`reprojection` dans la config, `--reprojection` en CLI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReprojectionBackend {
    #[default]
    Lite,
    Proj,
}

impl ReprojectionBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Proj => "proj",
        }
    }
}

impl fmt::Display for ReprojectionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReprojectionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lite" => Ok(Self::Lite),
            "proj" => Ok(Self::Proj),
            other => Err(format!("unknown reprojection backend '{}' (expected lite or proj)", other)),
        }
    }
}

/// Reprojection effective, construite depuis un [`ReprojectionBackend`]
pub enum Reprojection {
    Lite(ReprojectorLite),
    #[cfg(feature = "reproject")]
    Proj(crate::export::reproject::Reprojector),
}

impl Reprojection {
    pub fn new(backend: ReprojectionBackend, source_epsg: u32, target_epsg: u32) -> Result<Self> {
        match backend {
            ReprojectionBackend::Lite => {
                Ok(Self::Lite(ReprojectorLite::new(source_epsg, target_epsg)?))
            }
            #[cfg(feature = "reproject")]
            ReprojectionBackend::Proj => Ok(Self::Proj(crate::export::reproject::Reprojector::new(
                source_epsg,
                target_epsg,
            )?)),
            #[cfg(not(feature = "reproject"))]
            ReprojectionBackend::Proj => bail!(
                "PROJ reprojection requested but this build has no PROJ support \
                 (rebuild with --features reproject)"
            ),
        }
    }

    pub fn backend(&self) -> ReprojectionBackend {
        match self {
            Self::Lite(_) => ReprojectionBackend::Lite,
            #[cfg(feature = "reproject")]
            Self::Proj(_) => ReprojectionBackend::Proj,
        }
    }

    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match self {
            Self::Lite(lite) => lite.transform_geometry(geom),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }
}
