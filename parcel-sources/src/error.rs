//! Types d'erreurs pour le crate parcel-sources

use thiserror::Error;

use crate::types::Source;

/// Échec d'une requête de page (réseau, statut HTTP, décodage)
///
/// Toutes les variantes sont retentées par la politique de retry.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Statut HTTP non-succès
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },

    /// Délai de requête dépassé
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Erreur réseau (connexion, lecture du corps, etc.)
    #[error("Network error on {url}: {message}")]
    Network { url: String, message: String },

    /// Réponse illisible (pas une FeatureCollection, compteur absent, etc.)
    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl TransportError {
    /// Crée une erreur de décodage avec contexte
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Convertit une erreur reqwest en gardant le statut HTTP s'il existe
    pub(crate) fn from_reqwest(error: reqwest::Error, url: &str) -> Self {
        if let Some(status) = error.status() {
            return Self::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Erreur fatale pour une source complète
#[derive(Debug, Error)]
pub enum SourceError {
    /// Une page a échoué après toutes les tentatives
    #[error("{source_name} page at offset {offset} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        source_name: Source,
        offset: u64,
        attempts: u32,
        #[source]
        last: TransportError,
    },
}

impl SourceError {
    /// Source concernée par l'erreur
    pub fn source_name(&self) -> Source {
        match self {
            Self::RetriesExhausted { source_name, .. } => *source_name,
        }
    }
}
