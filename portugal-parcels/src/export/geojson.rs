//! Export vers GeoJSON avec geozero (streaming, fichier temporaire puis renommage atomique)

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use parcel_sources::Source;

use crate::normalize::NormalizedFeature;

/// CRS84: ordre lon/lat explicite
const CRS_NAME: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// Destination des features normalisées
///
/// Rien n'est visible au chemin final avant `commit`.
pub trait FeatureSink {
    fn write(&mut self, feature: &NormalizedFeature) -> io::Result<()>;

    /// Finalise la sortie et retourne le chemin final
    fn commit(self) -> io::Result<PathBuf>;
}

/// Propriétés du schéma unifié
#[derive(Serialize)]
struct Properties<'a> {
    id: &'a str,
    reference: Option<&'a str>,
    area_m2: f64,
    source: Source,
}

/// FeatureCollection écrite en streaming dans un fichier temporaire
///
/// Le fichier temporaire est créé dans le répertoire de destination pour que
/// le renommage final reste sur le même système de fichiers. Un sink abandonné
/// sans `commit` supprime son fichier temporaire.
pub struct GeoJsonSink {
    writer: BufWriter<NamedTempFile>,
    final_path: PathBuf,
    written: u64,
}

impl GeoJsonSink {
    pub fn create(final_path: impl AsRef<Path>) -> io::Result<Self> {
        let final_path = final_path.as_ref().to_path_buf();
        let dir = match final_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let tmp = tempfile::Builder::new()
            .prefix(".portugal-parcels-")
            .suffix(".geojson.tmp")
            .tempfile_in(&dir)?;
        debug!(temp = %tmp.path().display(), "Temporary output created");

        let mut writer = BufWriter::new(tmp);

        // Header FeatureCollection avec CRS
        write!(
            writer,
            r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"{}"}}}},"features":["#,
            CRS_NAME
        )?;

        Ok(Self {
            writer,
            final_path,
            written: 0,
        })
    }

    /// Chemin du fichier temporaire en cours d'écriture
    pub fn temp_path(&self) -> &Path {
        self.writer.get_ref().path()
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FeatureSink for GeoJsonSink {
    fn write(&mut self, feature: &NormalizedFeature) -> io::Result<()> {
        if self.written > 0 {
            self.writer.write_all(b",")?;
        }
        write_feature(&mut self.writer, feature)?;
        self.written += 1;
        Ok(())
    }

    fn commit(self) -> io::Result<PathBuf> {
        let Self {
            mut writer,
            final_path,
            written,
        } = self;

        // Footer
        writer.write_all(b"]}")?;
        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&final_path).map_err(|e| e.error)?;

        debug!(path = %final_path.display(), features = written, "Output committed");
        Ok(final_path)
    }
}

/// Écrit une feature en GeoJSON
fn write_feature<W: Write>(writer: &mut W, feature: &NormalizedFeature) -> io::Result<()> {
    writer.write_all(br#"{"type":"Feature","id":"#)?;
    serde_json::to_writer(&mut *writer, &feature.id)?;

    // Geometry via geozero
    writer.write_all(br#","geometry":"#)?;
    let mut geom_writer = GeoJsonWriter::new(&mut *writer);
    feature
        .geometry
        .process_geom(&mut geom_writer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    writer.write_all(br#","properties":"#)?;
    serde_json::to_writer(
        &mut *writer,
        &Properties {
            id: &feature.id,
            reference: feature.reference.as_deref(),
            area_m2: feature.area_m2,
            source: feature.source,
        },
    )?;
    writer.write_all(b"}")?;

    Ok(())
}
