//! Récupération d'une page de features via HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::endpoint::{Endpoint, Query};
use crate::error::TransportError;
use crate::types::{Cursor, Page, RawFeature};

pub const DEFAULT_USER_AGENT: &str = concat!("portugal-parcels/", env!("CARGO_PKG_VERSION"));

/// Récupère une page d'une API paginée
///
/// Une page réussit entièrement ou échoue: pas de succès partiel.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Récupère et décode la page désignée par `cursor`
    async fn fetch_page(&self, endpoint: &Endpoint, cursor: Cursor) -> Result<Page, TransportError>;

    /// Nombre total d'enregistrements annoncé par l'API (informatif)
    async fn fetch_total(&self, endpoint: &Endpoint) -> Result<u64, TransportError>;
}

/// Implémentation HTTP de [`PageFetcher`]
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    user_agent: String,
}

impl HttpPageFetcher {
    /// Crée un fetcher avec un client partagé
    pub fn new(client: Client) -> Self {
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Crée un client par défaut (timeout de connexion 30s)
    pub fn with_default_client() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self::new(client))
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    async fn get_bytes(
        &self,
        endpoint: &Endpoint,
        query: &Query,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let url = endpoint.url.as_str();
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url))?
            .error_for_status()
            .map_err(|e| TransportError::from_reqwest(e, url))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, endpoint: &Endpoint, cursor: Cursor) -> Result<Page, TransportError> {
        let body = self
            .get_bytes(endpoint, &endpoint.page_query(cursor), endpoint.timeout)
            .await?;
        let page = decode_page(&endpoint.url, cursor, &body)?;
        debug!(
            source = %endpoint.source,
            offset = cursor.offset,
            received = page.len(),
            bytes = body.len(),
            "Page decoded"
        );
        Ok(page)
    }

    async fn fetch_total(&self, endpoint: &Endpoint) -> Result<u64, TransportError> {
        let body = self
            .get_bytes(endpoint, &endpoint.count_query(), endpoint.count_timeout)
            .await?;
        let text = String::from_utf8_lossy(&body);
        endpoint
            .parse_total(&text)
            .ok_or_else(|| TransportError::decode(&endpoint.url, "no record count in response"))
    }
}

/// Enveloppe d'une FeatureCollection, features non interprétées
#[derive(Deserialize)]
struct Envelope {
    features: Vec<Value>,
}

/// Décode un corps de réponse en FeatureCollection GeoJSON
///
/// Seule l'enveloppe doit être valide: un corps sans tableau `features`
/// (page d'erreur HTML, `{"error": ...}` ArcGIS) est une erreur de décodage.
pub fn decode_page(url: &str, cursor: Cursor, body: &[u8]) -> Result<Page, TransportError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| TransportError::decode(url, e.to_string()))?;
    let features = envelope.features.into_iter().map(RawFeature::from_value).collect();
    Ok(Page::new(cursor, features))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collection(n: usize) -> serde_json::Value {
        let features: Vec<serde_json::Value> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "type": "Feature",
                    "id": i,
                    "geometry": {"type": "Point", "coordinates": [-8.0, 40.0]},
                    "properties": {"objectid": i}
                })
            })
            .collect();
        serde_json::json!({"type": "FeatureCollection", "features": features})
    }

    #[test]
    fn test_decode_page() {
        let body = serde_json::to_vec(&collection(3)).unwrap();
        let page = decode_page("http://x", Cursor::start(5), &body).unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.is_last());
    }

    #[test]
    fn test_decode_page_invalid() {
        let err = decode_page("http://x", Cursor::start(5), b"<html>busy</html>").unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }));
    }

    #[test]
    fn test_decode_page_arcgis_error() {
        let body = br#"{"error": {"code": 400, "message": "Invalid query"}}"#;
        let err = decode_page("http://x", Cursor::start(5), body).unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }));
    }

    #[test]
    fn test_decode_page_keeps_malformed_features() {
        let body = serde_json::to_vec(&serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": 1,
                    "geometry": {"type": "Point", "coordinates": [-8.0, 40.0]},
                    "properties": {"objectid": 1}
                },
                {
                    "type": "Feature",
                    "id": 2,
                    "geometry": {"type": "Polygon", "coordinates": null},
                    "properties": {"objectid": 2}
                },
                {"type": "Feature", "id": null, "geometry": null, "properties": null}
            ]
        }))
        .unwrap();

        let page = decode_page("http://x", Cursor::start(5), &body).unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page.features[0].id, Some(serde_json::json!(1)));
        assert_eq!(page.features[1].geometry.as_ref().unwrap()["coordinates"], Value::Null);
        assert_eq!(page.features[2], RawFeature::default());
    }

    #[tokio::test]
    async fn test_fetch_page_sends_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("resultOffset", "10"))
            .and(query_param("resultRecordCount", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(4)))
            .mount(&server)
            .await;

        let endpoint = Endpoint::rgg(format!("{}/query", server.uri())).with_page_size(10);
        let fetcher = HttpPageFetcher::with_default_client().unwrap();
        let page = fetcher
            .fetch_page(&endpoint, Cursor::start(10).advance())
            .await
            .unwrap();

        assert_eq!(page.len(), 4);
        assert_eq!(page.cursor.offset, 10);
    }

    #[tokio::test]
    async fn test_fetch_page_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let endpoint = Endpoint::inspire(format!("{}/wfs", server.uri()));
        let fetcher = HttpPageFetcher::with_default_client().unwrap();
        let err = fetcher
            .fetch_page(&endpoint, Cursor::start(endpoint.page_size))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_total_uses_count_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("returnCountOnly", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"count": 1}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        // Le timeout de page (long) ne s'applique pas au comptage
        let endpoint = Endpoint::rgg(server.uri())
            .with_timeout(Duration::from_secs(60))
            .with_count_timeout(Duration::from_millis(200));
        let fetcher = HttpPageFetcher::with_default_client().unwrap();
        let err = fetcher.fetch_total(&endpoint).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_total_rgg() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("returnCountOnly", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 4200})))
            .mount(&server)
            .await;

        let endpoint = Endpoint::rgg(server.uri());
        assert_eq!(endpoint.source, Source::Rgg);
        let fetcher = HttpPageFetcher::with_default_client().unwrap();
        assert_eq!(fetcher.fetch_total(&endpoint).await.unwrap(), 4200);
    }
}
