// ============================================================================
// Modèles : IndicatorMetadata, IndicatorSelection
// ============================================================================
// Métadonnées des indicateurs déclarées par l'API, état de sélection
// côté client, et encodage de la requête `indicators=`.
//
// CONTRAT D'ENCODAGE : liste jointe par virgules de chaînes
// `ID_P1[_P2...]` (ex: "SMA_20,MACD_12_26_9"), valeurs de paramètres
// dans l'ordre déclaré par les métadonnées. C'est l'encodage que le
// serveur sait parser ; il est figé ici et nulle part ailleurs.
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Un paramètre numérique d'indicateur (ex: length = 20)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParam {
    pub name: String,
    pub value: f64,
}

/// Métadonnées d'un indicateur, fetchées une fois au démarrage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub id: String,
    pub name: String,
    /// Paramètres par défaut, dans l'ordre déclaré par le serveur
    pub default_params: Vec<IndicatorParam>,
}

impl IndicatorMetadata {
    /// Un id vide/absent rend l'indicateur inutilisable : désactivé dans
    /// l'UI et exclu de l'encodage (métadonnées malformées tolérées).
    pub fn is_usable(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Parse le champ `default_params` du fil, qui selon les révisions
    /// du serveur est soit un objet {nom: nombre}, soit une chaîne
    /// compacte "SMA_20" (id préfixé, valeurs positionnelles).
    pub fn parse_default_params(raw: &serde_json::Value) -> Vec<IndicatorParam> {
        match raw {
            serde_json::Value::Object(map) => map
                .iter()
                .filter_map(|(name, v)| {
                    v.as_f64().map(|value| IndicatorParam {
                        name: name.clone(),
                        value,
                    })
                })
                .collect(),
            serde_json::Value::String(s) => s
                .split('_')
                .filter_map(|part| part.parse::<f64>().ok())
                .enumerate()
                .map(|(i, value)| IndicatorParam {
                    name: format!("p{}", i + 1),
                    value,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// État de sélection d'un indicateur côté client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSelection {
    pub enabled: bool,
    /// Copie des paramètres par défaut, éditable par l'utilisateur
    pub params: Vec<IndicatorParam>,
}

impl IndicatorSelection {
    /// Sélection initiale (désactivée) depuis les métadonnées
    pub fn from_metadata(meta: &IndicatorMetadata) -> Self {
        Self {
            enabled: false,
            params: meta.default_params.clone(),
        }
    }

    /// Id de requête : `ID` nu ou `ID_v1_v2` avec les valeurs courantes
    ///
    /// C'est aussi l'id de canal côté graphique et la clé de colonne
    /// dans les lignes renvoyées par l'API.
    pub fn request_id(&self, indicator_id: &str) -> String {
        if self.params.is_empty() {
            return indicator_id.to_string();
        }
        let values: Vec<String> = self.params.iter().map(|p| format_param(p.value)).collect();
        format!("{}_{}", indicator_id, values.join("_"))
    }
}

/// Formate une valeur de paramètre sans décimales superflues (20, pas 20.0)
fn format_param(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Encode le paramètre `indicators=` de la requête /data
///
/// Seuls les indicateurs activés ET utilisables (id non vide) sont
/// encodés. Retourne None quand rien n'est demandé : le paramètre est
/// alors omis de l'URL, pas envoyé vide.
pub fn encode_indicator_request(
    selections: &BTreeMap<String, IndicatorSelection>,
) -> Option<String> {
    let parts: Vec<String> = selections
        .iter()
        .filter(|(id, sel)| sel.enabled && !id.trim().is_empty())
        .map(|(id, sel)| sel.request_id(id))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

/// Ids de requête des indicateurs activés (clés de canaux du graphique)
pub fn requested_indicator_ids(
    selections: &BTreeMap<String, IndicatorSelection>,
) -> Vec<String> {
    selections
        .iter()
        .filter(|(id, sel)| sel.enabled && !id.trim().is_empty())
        .map(|(id, sel)| sel.request_id(id))
        .collect()
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(id: &str, params: &[(&str, f64)]) -> IndicatorMetadata {
        IndicatorMetadata {
            id: id.to_string(),
            name: id.to_string(),
            default_params: params
                .iter()
                .map(|(name, value)| IndicatorParam {
                    name: name.to_string(),
                    value: *value,
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_default_params_object() {
        let params = IndicatorMetadata::parse_default_params(&json!({"length": 20}));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "length");
        assert_eq!(params[0].value, 20.0);
    }

    #[test]
    fn test_parse_default_params_compact_string() {
        // Forme compacte du serveur : "SMA_20" (l'id n'est pas un nombre)
        let params = IndicatorMetadata::parse_default_params(&json!("SMA_20"));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].value, 20.0);
    }

    #[test]
    fn test_parse_default_params_malformed() {
        assert!(IndicatorMetadata::parse_default_params(&json!(null)).is_empty());
        assert!(IndicatorMetadata::parse_default_params(&json!(42)).is_empty());
    }

    #[test]
    fn test_request_id_with_params() {
        let sma = meta("SMA", &[("length", 20.0)]);
        let sel = IndicatorSelection::from_metadata(&sma);
        assert_eq!(sel.request_id("SMA"), "SMA_20");

        let macd = meta("MACD", &[("fast", 12.0), ("slow", 26.0), ("signal", 9.0)]);
        let sel = IndicatorSelection::from_metadata(&macd);
        assert_eq!(sel.request_id("MACD"), "MACD_12_26_9");
    }

    #[test]
    fn test_request_id_without_params() {
        let obv = meta("OBV", &[]);
        let sel = IndicatorSelection::from_metadata(&obv);
        assert_eq!(sel.request_id("OBV"), "OBV");
    }

    #[test]
    fn test_encode_skips_disabled_and_empty_ids() {
        let mut selections = BTreeMap::new();

        let mut sma = IndicatorSelection::from_metadata(&meta("SMA", &[("length", 20.0)]));
        sma.enabled = true;
        selections.insert("SMA".to_string(), sma);

        let rsi = IndicatorSelection::from_metadata(&meta("RSI", &[("length", 14.0)]));
        selections.insert("RSI".to_string(), rsi); // désactivé

        let mut ghost = IndicatorSelection::from_metadata(&meta("", &[]));
        ghost.enabled = true;
        selections.insert(String::new(), ghost); // id vide : exclu

        assert_eq!(encode_indicator_request(&selections).as_deref(), Some("SMA_20"));
        assert_eq!(requested_indicator_ids(&selections), vec!["SMA_20".to_string()]);
    }

    #[test]
    fn test_encode_none_when_nothing_enabled() {
        let mut selections = BTreeMap::new();
        selections.insert(
            "SMA".to_string(),
            IndicatorSelection::from_metadata(&meta("SMA", &[("length", 20.0)])),
        );
        assert_eq!(encode_indicator_request(&selections), None);
    }

    #[test]
    fn test_param_edit_changes_request_id() {
        let mut sel = IndicatorSelection::from_metadata(&meta("SMA", &[("length", 20.0)]));
        sel.enabled = true;
        sel.params[0].value = 50.0;
        assert_eq!(sel.request_id("SMA"), "SMA_50");
    }
}
