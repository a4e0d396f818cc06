// ============================================================================
// Modèle : Interval
// ============================================================================
// Intervalle d'échantillonnage des chandelles OHLCV.
//
// Les codes ("1D", "1W", ...) sont le contrat avec l'API : le serveur
// déclare les intervalles supportés dans /info, et on ne propose jamais
// un intervalle hors de cet ensemble.
// ============================================================================

use serde::{Deserialize, Serialize};

/// Intervalle d'échantillonnage supporté par le sélecteur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    /// 1 jour (daily)
    D1,
    /// 1 semaine (weekly)
    W1,
    /// 1 mois (monthly)
    M1,
    /// 1 heure
    H1,
    /// 15 minutes
    Min15,
    /// 5 minutes
    Min5,
}

/// Ordre d'affichage canonique du sélecteur d'intervalles
///
/// Le serveur déclare un ensemble, l'UI affiche l'intersection dans CET
/// ordre, jamais dans l'ordre du serveur.
pub const CANONICAL_ORDER: [Interval; 6] = [
    Interval::D1,
    Interval::W1,
    Interval::M1,
    Interval::H1,
    Interval::Min15,
    Interval::Min5,
];

impl Interval {
    /// Code envoyé à l'API (query string et path)
    pub fn code(&self) -> &'static str {
        match self {
            Interval::D1 => "1D",
            Interval::W1 => "1W",
            Interval::M1 => "1M",
            Interval::H1 => "1H",
            Interval::Min15 => "15M",
            Interval::Min5 => "5M",
        }
    }

    /// Parse un code d'intervalle déclaré par le serveur
    ///
    /// Retourne None pour un code inconnu : l'intervalle est alors
    /// simplement absent du sélecteur, jamais une erreur fatale.
    pub fn from_code(code: &str) -> Option<Interval> {
        match code.trim().to_uppercase().as_str() {
            "1D" => Some(Interval::D1),
            "1W" => Some(Interval::W1),
            "1M" => Some(Interval::M1),
            "1H" => Some(Interval::H1),
            "15M" => Some(Interval::Min15),
            "5M" => Some(Interval::Min5),
            _ => None,
        }
    }

    /// Label court pour l'affichage
    pub fn label(&self) -> &'static str {
        self.code()
    }
}

impl Default for Interval {
    /// Intervalle par défaut : daily (celui que /info garantit toujours)
    fn default() -> Self {
        Interval::D1
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for interval in CANONICAL_ORDER {
            assert_eq!(Interval::from_code(interval.code()), Some(interval));
        }
    }

    #[test]
    fn test_from_code_case_insensitive() {
        assert_eq!(Interval::from_code("1d"), Some(Interval::D1));
        assert_eq!(Interval::from_code(" 1w "), Some(Interval::W1));
    }

    #[test]
    fn test_from_code_unknown() {
        assert_eq!(Interval::from_code("3H"), None);
        assert_eq!(Interval::from_code(""), None);
    }

    #[test]
    fn test_default_is_daily() {
        assert_eq!(Interval::default(), Interval::D1);
    }
}
