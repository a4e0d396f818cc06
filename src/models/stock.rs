// ============================================================================
// Modèles : StockListing, StockInfo
// ============================================================================
// Structures renvoyées par /api/stocks/list et /api/stocks/.../info.
//
// StockInfo est re-fetché à chaque changement de (symbol, exchange) et
// l'ancienne valeur est effacée AVANT le fetch : on n'affiche jamais les
// métadonnées d'un autre symbole pendant le chargement.
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Une entrée de la liste de symboles d'un exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockListing {
    pub symbol: String,
    pub exchange: String,
    /// Nom complet de la société, absent sur certains exchanges
    pub name: Option<String>,
}

impl StockListing {
    /// Clé unique dans la liste : un symbole peut exister sur plusieurs
    /// exchanges, seule la paire (symbol, exchange) est unique.
    pub fn key(&self) -> String {
        format!("{}|{}", self.symbol, self.exchange)
    }

    /// Label de recherche : "SYMBOL (NAME)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.symbol, self.name.as_deref().unwrap_or("N/A"))
    }
}

/// Métadonnées d'un titre (sous-objet `metadata` de /info)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMetadata {
    pub symbol: String,
    pub exchange: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Bornes temporelles des données disponibles pour un intervalle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub min_time: DateTime<Utc>,
    pub max_time: DateTime<Utc>,
}

/// Réponse de /api/stocks/{exchange}/{symbol}/info, déjà décodée
///
/// `supported_intervals` garde les codes bruts du serveur : le sélecteur
/// d'intervalles en calcule l'intersection avec l'ordre canonique.
#[derive(Debug, Clone, PartialEq)]
pub struct StockInfo {
    pub metadata: StockMetadata,
    pub supported_intervals: Vec<String>,
    /// Bornes pour l'intervalle demandé lors du fetch, si le serveur
    /// les connaît (clé `date_range_{interval}` sur le fil)
    pub date_range: Option<DateRange>,
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_key_is_unique_per_exchange() {
        let nse = StockListing {
            symbol: "INFY".to_string(),
            exchange: "NSE".to_string(),
            name: Some("Infosys".to_string()),
        };
        let bse = StockListing {
            symbol: "INFY".to_string(),
            exchange: "BSE".to_string(),
            name: Some("Infosys".to_string()),
        };
        assert_ne!(nse.key(), bse.key());
        assert_eq!(nse.key(), "INFY|NSE");
    }

    #[test]
    fn test_listing_label() {
        let stock = StockListing {
            symbol: "TCS".to_string(),
            exchange: "NSE".to_string(),
            name: Some("Tata Consultancy".to_string()),
        };
        assert_eq!(stock.label(), "TCS (Tata Consultancy)");

        let anonymous = StockListing {
            symbol: "XYZ".to_string(),
            exchange: "NSE".to_string(),
            name: None,
        };
        assert_eq!(anonymous.label(), "XYZ (N/A)");
    }
}
