// ============================================================================
// Utilitaires de formatage et normalisation
// ============================================================================
// Fonctions pures de conversion entre représentations de dates et entre
// lignes brutes de l'API et lignes canoniques OhlcRow.
//
// CONTRAT D'UNITÉ : en sortie de ce module, `time` est en secondes
// epoch UTC. Les timestamps qui ressemblent à des millisecondes
// (magnitude >= 10^12) sont divisés par 1000 ICI, une seule fois.
//
// Les clés de date utilisent les champs calendaires UTC : un calcul en
// heure locale décalerait la date d'un jour selon le fuseau.
// ============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use crate::models::OhlcRow;

/// Seuil au-delà duquel un timestamp est interprété en millisecondes
/// (10^12 s ≈ année 33658, 10^12 ms ≈ année 2001)
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Noms de champ temporel possibles selon la révision de l'API,
/// dans l'ordre de priorité de détection
const TIME_KEYS: [&str; 3] = ["timestamp", "date", "time"];

// ============================================================================
// Clés de date
// ============================================================================

/// Formate un timestamp epoch (secondes) en clé "YYYY-MM-DD" UTC
///
/// Échoue en douceur (None) pour un timestamp hors plage.
pub fn to_date_key(epoch_secs: i64) -> Option<String> {
    let dt = DateTime::<Utc>::from_timestamp(epoch_secs, 0)?;
    Some(format!(
        "{:04}-{:02}-{:02}",
        dt.year(),
        dt.month(),
        dt.day()
    ))
}

/// Clé "YYYY-MM-DD" d'une date UTC
pub fn date_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Soustrait `days` jours à une date, sans effet de bord
pub fn subtract_days(date: NaiveDate, days: i64) -> NaiveDate {
    date - Duration::days(days)
}

/// Date calendaire UTC d'un timestamp epoch (secondes)
pub fn to_naive_date(epoch_secs: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0).map(|dt| dt.date_naive())
}

// ============================================================================
// Normalisation des lignes brutes
// ============================================================================

/// Convertit une valeur temporelle brute en secondes epoch
///
/// Accepte un nombre (secondes ou millisecondes, détection par
/// magnitude), une chaîne ISO ("2024-01-05" ou datetime RFC 3339), ou
/// rien. None pour tout le reste : la ligne sera droppée.
pub fn parse_time_value(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => {
            let secs = if let Some(i) = n.as_i64() {
                i
            } else {
                let f = n.as_f64()?;
                if !f.is_finite() {
                    return None;
                }
                f as i64
            };
            if secs.abs() >= MILLIS_THRESHOLD {
                Some(secs / 1000)
            } else {
                Some(secs)
            }
        }
        Value::String(s) => parse_time_string(s),
        _ => None,
    }
}

/// Parse une date/datetime texte en secondes epoch (UTC assumé si naïf)
fn parse_time_string(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

/// Détecte le nom du champ temporel utilisé par cette révision de l'API
///
/// Inspecte la première ligne ; "time" est le défaut si rien n'est
/// reconnaissable (révision courante du serveur).
pub fn detect_time_key(rows: &[Value]) -> &'static str {
    if let Some(first) = rows.first().and_then(|v| v.as_object()) {
        for key in TIME_KEYS {
            if first.contains_key(key) {
                return key;
            }
        }
    }
    "time"
}

/// Extrait un nombre fini d'un champ JSON (nombre ou chaîne numérique)
fn parse_number(raw: Option<&Value>) -> Option<f64> {
    match raw? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Normalise les lignes brutes de l'API en lignes canoniques
///
/// Règles (tolérantes, jamais fatales) :
/// - champ temporel détecté sur la première ligne, converti en secondes
/// - ligne droppée avec warning si le temps ou un champ OHLC manque ou
///   n'est pas numérique
/// - volume absent toléré (0.0)
/// - seules les colonnes d'indicateurs demandées sont copiées, et
///   seulement quand la valeur est numérique et finie
///
/// L'ordre d'entrée est préservé : le tri appartient à la passe de
/// réconciliation, pas au bord API.
pub fn normalize_rows(raw_rows: &[Value], requested_indicators: &[String]) -> Vec<OhlcRow> {
    let time_key = detect_time_key(raw_rows);
    let mut rows = Vec::with_capacity(raw_rows.len());
    let mut dropped = 0usize;

    for (index, raw) in raw_rows.iter().enumerate() {
        let Some(obj) = raw.as_object() else {
            dropped += 1;
            warn!(index, "Ligne brute non-objet ignorée");
            continue;
        };

        let Some(time) = obj.get(time_key).and_then(parse_time_value) else {
            dropped += 1;
            warn!(index, time_key, "Ligne sans temps exploitable ignorée");
            continue;
        };

        let (Some(open), Some(high), Some(low), Some(close)) = (
            parse_number(obj.get("open")),
            parse_number(obj.get("high")),
            parse_number(obj.get("low")),
            parse_number(obj.get("close")),
        ) else {
            dropped += 1;
            warn!(index, time, "Ligne avec OHLC incomplet ignorée");
            continue;
        };

        let volume = parse_number(obj.get("volume")).unwrap_or(0.0);

        let mut indicators = BTreeMap::new();
        for id in requested_indicators {
            if let Some(value) = parse_number(obj.get(id.as_str())) {
                indicators.insert(id.clone(), value);
            }
        }

        rows.push(OhlcRow {
            time,
            open,
            high,
            low,
            close,
            volume,
            indicators,
        });
    }

    if dropped > 0 {
        warn!(dropped, total = raw_rows.len(), "Lignes ignorées à la normalisation");
    }

    rows
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_date_key_utc() {
        // 2024-01-05 23:30 UTC : la clé ne doit pas glisser au 6 ou au 4
        // selon le fuseau de la machine
        assert_eq!(to_date_key(1704497400).as_deref(), Some("2024-01-05"));
        assert_eq!(to_date_key(0).as_deref(), Some("1970-01-01"));
    }

    #[test]
    fn test_to_date_key_out_of_range() {
        assert_eq!(to_date_key(i64::MAX), None);
    }

    #[test]
    fn test_subtract_days() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(subtract_days(d, 1), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(date_key(subtract_days(d, 730)), "2022-03-02");
    }

    #[test]
    fn test_parse_time_value_seconds_and_millis() {
        assert_eq!(parse_time_value(&json!(1704497400)), Some(1704497400));
        // Millisecondes : converties une seule fois au bord
        assert_eq!(parse_time_value(&json!(1704497400123i64)), Some(1704497400));
        assert_eq!(parse_time_value(&json!("2024-01-05")), Some(1704412800));
        assert_eq!(parse_time_value(&json!(null)), None);
        assert_eq!(parse_time_value(&json!("pas une date")), None);
    }

    #[test]
    fn test_detect_time_key_priority() {
        assert_eq!(detect_time_key(&[json!({"timestamp": 1, "time": 2})]), "timestamp");
        assert_eq!(detect_time_key(&[json!({"date": "2024-01-05"})]), "date");
        assert_eq!(detect_time_key(&[json!({"time": 1})]), "time");
        assert_eq!(detect_time_key(&[]), "time");
    }

    #[test]
    fn test_normalize_rows_drops_incomplete() {
        let raw = vec![
            json!({"time": 3, "open": 1.0, "high": 2.0, "low": 1.0, "close": 2.0, "volume": 10}),
            json!({"time": 2, "open": 1.0, "high": 2.0, "low": 1.0}), // close manquant
            json!({"time": 1, "open": 2.0, "high": 3.0, "low": 1.0, "close": 2.5, "volume": 20}),
        ];
        let rows = normalize_rows(&raw, &[]);
        assert_eq!(rows.len(), 2);
        // L'ordre d'entrée est préservé (le tri vient plus tard)
        assert_eq!(rows[0].time, 3);
        assert_eq!(rows[1].time, 1);
    }

    #[test]
    fn test_normalize_rows_copies_requested_indicators_only() {
        let raw = vec![json!({
            "time": 1, "open": 1.0, "high": 2.0, "low": 1.0, "close": 2.0,
            "SMA_20": 1.5, "EMA_50": 1.6, "RSI_14": null
        })];
        let requested = vec!["SMA_20".to_string(), "RSI_14".to_string()];
        let rows = normalize_rows(&raw, &requested);
        assert_eq!(rows[0].indicator("SMA_20"), Some(1.5));
        // Non demandé : pas copié
        assert_eq!(rows[0].indicator("EMA_50"), None);
        // Demandé mais null : pas copié
        assert_eq!(rows[0].indicator("RSI_14"), None);
    }

    #[test]
    fn test_normalize_rows_time_key_variants() {
        let raw = vec![json!({
            "timestamp": 1704497400123i64,
            "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5
        })];
        let rows = normalize_rows(&raw, &[]);
        assert_eq!(rows[0].time, 1704497400);
        assert_eq!(rows[0].volume, 0.0);
    }

    #[test]
    fn test_normalize_rows_coerces_string_numbers() {
        let raw = vec![json!({
            "time": 1, "open": "1.0", "high": "2.0", "low": "0.5", "close": "1.5",
            "volume": "42"
        })];
        let rows = normalize_rows(&raw, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].volume, 42.0);
    }
}
