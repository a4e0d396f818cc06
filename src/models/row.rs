// ============================================================================
// Modèle : OhlcRow
// ============================================================================
// Ligne OHLCV canonique, produite par la normalisation (format.rs) à
// partir des lignes brutes de l'API.
//
// Contrat d'unité : `time` est TOUJOURS en secondes epoch UTC. La
// conversion ms → s se fait une seule fois, au bord (normalisation),
// jamais en aval.
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Une ligne OHLCV normalisée, avec les valeurs d'indicateurs demandées
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcRow {
    /// Timestamp en secondes epoch UTC
    pub time: i64,

    /// Prix d'ouverture (Open)
    pub open: f64,

    /// Prix le plus haut (High)
    pub high: f64,

    /// Prix le plus bas (Low)
    pub low: f64,

    /// Prix de clôture (Close)
    pub close: f64,

    /// Volume échangé
    pub volume: f64,

    /// Valeurs d'indicateurs présentes sur cette ligne, par id
    /// (ex: "SMA_20" -> 1523.4). Uniquement le sous-ensemble demandé.
    pub indicators: BTreeMap<String, f64>,
}

impl OhlcRow {
    /// Chandelle haussière : close >= open (détermine la couleur volume)
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Valeur d'indicateur si présente et finie
    pub fn indicator(&self, id: &str) -> Option<f64> {
        self.indicators.get(id).copied().filter(|v| v.is_finite())
    }

    /// Vérifie que tous les champs OHLC sont finis
    pub fn is_plottable(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(time: i64, open: f64, close: f64) -> OhlcRow {
        OhlcRow {
            time,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 100.0,
            indicators: BTreeMap::new(),
        }
    }

    #[test]
    fn test_bullish_includes_doji() {
        // close == open compte comme haussier (couleur "up")
        assert!(row(1, 10.0, 10.0).is_bullish());
        assert!(row(1, 10.0, 11.0).is_bullish());
        assert!(!row(1, 11.0, 10.0).is_bullish());
    }

    #[test]
    fn test_indicator_filters_non_finite() {
        let mut r = row(1, 10.0, 11.0);
        r.indicators.insert("SMA_20".to_string(), 10.5);
        r.indicators.insert("EMA_50".to_string(), f64::NAN);

        assert_eq!(r.indicator("SMA_20"), Some(10.5));
        assert_eq!(r.indicator("EMA_50"), None);
        assert_eq!(r.indicator("RSI_14"), None);
    }

    #[test]
    fn test_is_plottable() {
        assert!(row(1, 10.0, 11.0).is_plottable());
        let mut bad = row(1, 10.0, 11.0);
        bad.high = f64::INFINITY;
        assert!(!bad.is_plottable());
    }
}
