//! Types de données pour le crate parcel-sources

use std::fmt;

use geojson::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Une feature brute telle que renvoyée par l'API (schéma propre à chaque source)
///
/// Seuls les membres `id`, `geometry` et `properties` sont extraits, sans
/// validation: une géométrie malformée n'invalide pas la page, elle est
/// rejetée plus tard, feature par feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    pub id: Option<Value>,
    pub geometry: Option<Value>,
    pub properties: Option<JsonObject>,
}

impl RawFeature {
    /// Extrait les membres utiles d'un objet Feature (jamais en échec)
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self::default();
        };
        Self {
            id: take_non_null(&mut object, "id"),
            geometry: take_non_null(&mut object, "geometry"),
            properties: match object.remove("properties") {
                Some(Value::Object(props)) => Some(props),
                _ => None,
            },
        }
    }
}

fn take_non_null(object: &mut JsonObject, key: &str) -> Option<Value> {
    object.remove(key).filter(|v| !v.is_null())
}

/// Source de données cadastrales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Parcelles INSPIRE de la DGT (WFS, EPSG:3763)
    Inspire,
    /// Parcelles RGG du BUPi (ArcGIS, EPSG:4326)
    Rgg,
}

impl Source {
    /// Toutes les sources, dans l'ordre de téléchargement
    pub const ALL: [Source; 2] = [Source::Inspire, Source::Rgg];

    /// Tag en minuscules (valeur de la propriété `source`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspire => "inspire",
            Self::Rgg => "rgg",
        }
    }

    /// Libellé pour les logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inspire => "INSPIRE",
            Self::Rgg => "RGG",
        }
    }

    /// Code EPSG des géométries renvoyées par l'API
    pub fn native_epsg(&self) -> u32 {
        match self {
            Self::Inspire => 3763,
            Self::Rgg => 4326,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position de pagination (offset + taille de page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Index du premier enregistrement demandé
    pub offset: u64,
    /// Nombre d'enregistrements demandés
    pub count: u32,
}

impl Cursor {
    /// Curseur initial (offset 0)
    pub fn start(count: u32) -> Self {
        Self { offset: 0, count }
    }

    /// Curseur de la page suivante
    pub fn advance(self) -> Self {
        Self {
            offset: self.offset + u64::from(self.count),
            count: self.count,
        }
    }

    /// Numéro de page (1-based)
    pub fn page_number(&self) -> u64 {
        if self.count == 0 {
            return 1;
        }
        self.offset / u64::from(self.count) + 1
    }
}

/// Une page décodée
#[derive(Debug, Clone)]
pub struct Page {
    /// Curseur utilisé pour la requête
    pub cursor: Cursor,
    /// Features reçues
    pub features: Vec<RawFeature>,
}

impl Page {
    pub fn new(cursor: Cursor, features: Vec<RawFeature>) -> Self {
        Self { cursor, features }
    }

    /// Nombre d'enregistrements demandés
    pub fn requested(&self) -> usize {
        self.cursor.count as usize
    }

    /// Nombre d'enregistrements reçus
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Page courte = fin des données
    pub fn is_last(&self) -> bool {
        self.len() < self.requested()
    }
}
