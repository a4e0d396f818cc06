// ============================================================================
// Configuration
// ============================================================================
// Configuration explicite injectée dans le client API à la construction.
// Pas d'URL codée en dur dans le client, pas de globale mutable.
// ============================================================================

use crate::api::RetryConfig;

/// Variable d'environnement pour surcharger l'URL de l'API
pub const API_URL_ENV: &str = "LAZYCHART_API_URL";

/// URL par défaut du backend de données
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Configuration de l'application
#[derive(Debug, Clone)]
pub struct Config {
    /// Base de l'API (sans le chemin /api/stocks)
    pub api_base_url: String,

    /// Politique de retry pour les erreurs de connectivité
    pub retry: RetryConfig,

    /// Fenêtre de données initiale, en jours (~2 ans)
    pub fetch_window_days: i64,
}

impl Config {
    /// Construit la configuration depuis l'environnement
    pub fn from_env() -> Self {
        let api_base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
            fetch_window_days: 730,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            retry: RetryConfig::default(),
            fetch_window_days: 730,
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:5000");
        assert_eq!(config.fetch_window_days, 730);
    }
}
