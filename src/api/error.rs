// ============================================================================
// Taxonomie d'erreurs du client API
// ============================================================================
// Trois familles, trois comportements :
// - Connectivity : API injoignable ou 5xx -> retry avec backoff, puis
//   bannière persistante
// - Request : 4xx (symbole/intervalle invalide) -> message inline,
//   jamais de retry
// - Malformed : réponse indéchiffrable -> message inline, pas de retry
//
// Rien ici n'est fatal au process : tout état d'erreur est récupérable
// par l'utilisateur (re-sélection) ou par le backoff.
// ============================================================================

use thiserror::Error;

/// Erreur du client API de données boursières
#[derive(Error, Debug)]
pub enum ApiError {
    /// API injoignable (transport) ou erreur serveur 5xx
    #[error("API injoignable : {0}")]
    Connectivity(String),

    /// Requête refusée par le serveur (4xx), avec la description du
    /// corps d'erreur si présente, sinon la ligne de statut HTTP
    #[error("requête refusée ({status}) : {message}")]
    Request { status: u16, message: String },

    /// Réponse 2xx mais corps indéchiffrable
    #[error("réponse malformée : {0}")]
    Malformed(String),
}

impl ApiError {
    /// Seules les erreurs de connectivité justifient un retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Connectivity(_))
    }

    /// Message court pour la bannière d'erreur de l'UI
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(ApiError::Connectivity("timeout".to_string()).is_retryable());
        assert!(!ApiError::Request {
            status: 404,
            message: "No 1D data".to_string()
        }
        .is_retryable());
        assert!(!ApiError::Malformed("pas du JSON".to_string()).is_retryable());
    }
}
