//! Description des deux APIs paginées (paramètres de requête, taille de page)
//!
//! - INSPIRE: WFS 2.0 GeoServer de la DGT, pagination `startIndex`/`count`
//! - RGG: MapServer ArcGIS du BUPi, pagination `resultOffset`/`resultRecordCount`

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::types::{Cursor, Source};

/// WFS INSPIRE de la DGT
pub const INSPIRE_WFS_URL: &str = "https://snicws.dgterritorio.gov.pt/geoserver/wfs";

/// Service de requête RGG du BUPi
pub const RGG_QUERY_URL: &str =
    "https://geo.bupi.gov.pt/gisbupi/rest/services/opendata/RGG_DadosGovPT/MapServer/0/query";

pub const INSPIRE_PAGE_SIZE: u32 = 50_000;
pub const RGG_PAGE_SIZE: u32 = 2_000;

const INSPIRE_TYPE_NAME: &str = "inspire:cadastralparcel";

/// Timeout de la requête de comptage, indépendant de celui des pages
pub const COUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Paramètres de requête (clé, valeur)
pub type Query = Vec<(&'static str, String)>;

/// Un endpoint paginé pour une source
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub source: Source,
    pub url: String,
    pub page_size: u32,
    /// Timeout par requête de page
    pub timeout: Duration,
    /// Timeout de la requête de comptage (informative, sans retry)
    pub count_timeout: Duration,
}

impl Endpoint {
    /// Endpoint par défaut d'une source
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Inspire => Self::inspire(INSPIRE_WFS_URL),
            Source::Rgg => Self::rgg(RGG_QUERY_URL),
        }
    }

    pub fn inspire(url: impl Into<String>) -> Self {
        Self {
            source: Source::Inspire,
            url: url.into(),
            page_size: INSPIRE_PAGE_SIZE,
            timeout: Duration::from_secs(600),
            count_timeout: COUNT_TIMEOUT,
        }
    }

    pub fn rgg(url: impl Into<String>) -> Self {
        Self {
            source: Source::Rgg,
            url: url.into(),
            page_size: RGG_PAGE_SIZE,
            timeout: Duration::from_secs(300),
            count_timeout: COUNT_TIMEOUT,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_count_timeout(mut self, timeout: Duration) -> Self {
        self.count_timeout = timeout;
        self
    }

    /// Paramètres d'une requête de page
    pub fn page_query(&self, cursor: Cursor) -> Query {
        match self.source {
            Source::Inspire => vec![
                ("service", "WFS".to_string()),
                ("version", "2.0.0".to_string()),
                ("request", "GetFeature".to_string()),
                ("typeName", INSPIRE_TYPE_NAME.to_string()),
                ("outputFormat", "application/json".to_string()),
                ("startIndex", cursor.offset.to_string()),
                ("count", cursor.count.to_string()),
            ],
            Source::Rgg => vec![
                ("where", "1=1".to_string()),
                ("outFields", "*".to_string()),
                ("returnGeometry", "true".to_string()),
                ("outSR", "4326".to_string()),
                ("resultOffset", cursor.offset.to_string()),
                ("resultRecordCount", cursor.count.to_string()),
                ("f", "geojson".to_string()),
            ],
        }
    }

    /// Paramètres de la requête de comptage (nombre total d'enregistrements)
    pub fn count_query(&self) -> Query {
        match self.source {
            Source::Inspire => vec![
                ("service", "WFS".to_string()),
                ("version", "2.0.0".to_string()),
                ("request", "GetFeature".to_string()),
                ("typeName", INSPIRE_TYPE_NAME.to_string()),
                ("resultType", "hits".to_string()),
            ],
            Source::Rgg => vec![
                ("where", "1=1".to_string()),
                ("returnCountOnly", "true".to_string()),
                ("f", "json".to_string()),
            ],
        }
    }

    /// Extrait le nombre total d'enregistrements de la réponse de comptage
    ///
    /// INSPIRE répond en XML (`numberMatched="..."`), RGG en JSON (`{"count": ...}`).
    pub fn parse_total(&self, body: &str) -> Option<u64> {
        match self.source {
            Source::Inspire => number_matched_regex()
                .captures(body)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok()),
            Source::Rgg => serde_json::from_str::<serde_json::Value>(body)
                .ok()?
                .get("count")?
                .as_u64(),
        }
    }

    /// Nombre de pages attendu pour un total donné
    pub fn expected_pages(&self, total: u64) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        total.div_ceil(u64::from(self.page_size))
    }
}

fn number_matched_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"numberMatched="(\d+)""#).expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(query: &'a Query, key: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_inspire_page_query() {
        let endpoint = Endpoint::for_source(Source::Inspire);
        let cursor = Cursor::start(endpoint.page_size).advance();
        let query = endpoint.page_query(cursor);

        assert_eq!(param(&query, "typeName"), Some("inspire:cadastralparcel"));
        assert_eq!(param(&query, "outputFormat"), Some("application/json"));
        assert_eq!(param(&query, "startIndex"), Some("50000"));
        assert_eq!(param(&query, "count"), Some("50000"));
        assert_eq!(param(&query, "resultOffset"), None);
    }

    #[test]
    fn test_rgg_page_query() {
        let endpoint = Endpoint::for_source(Source::Rgg);
        let query = endpoint.page_query(Cursor::start(endpoint.page_size));

        assert_eq!(param(&query, "where"), Some("1=1"));
        assert_eq!(param(&query, "outSR"), Some("4326"));
        assert_eq!(param(&query, "resultOffset"), Some("0"));
        assert_eq!(param(&query, "resultRecordCount"), Some("2000"));
        assert_eq!(param(&query, "f"), Some("geojson"));
    }

    #[test]
    fn test_default_timeouts() {
        assert_eq!(Endpoint::for_source(Source::Inspire).timeout.as_secs(), 600);
        assert_eq!(Endpoint::for_source(Source::Rgg).timeout.as_secs(), 300);
        for source in Source::ALL {
            assert_eq!(Endpoint::for_source(source).count_timeout, COUNT_TIMEOUT);
        }
    }

    #[test]
    fn test_parse_total_inspire() {
        let endpoint = Endpoint::for_source(Source::Inspire);
        let body = r#"<?xml version="1.0"?><wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0" numberMatched="4912345" numberReturned="0" timeStamp="2024-01-01T00:00:00Z"/>"#;
        assert_eq!(endpoint.parse_total(body), Some(4_912_345));
        assert_eq!(endpoint.parse_total("<html>error</html>"), None);
    }

    #[test]
    fn test_parse_total_rgg() {
        let endpoint = Endpoint::for_source(Source::Rgg);
        assert_eq!(endpoint.parse_total(r#"{"count": 2900}"#), Some(2900));
        assert_eq!(endpoint.parse_total(r#"{"error": {}}"#), None);
        assert_eq!(endpoint.parse_total("not json"), None);
    }

    #[test]
    fn test_expected_pages() {
        let endpoint = Endpoint::rgg("http://localhost").with_page_size(2000);
        assert_eq!(endpoint.expected_pages(0), 0);
        assert_eq!(endpoint.expected_pages(2000), 1);
        assert_eq!(endpoint.expected_pages(2001), 2);
    }
}
