// ============================================================================
// Réconciliation des canaux du graphique — LE CŒUR
// ============================================================================
// ChartChannels possède l'ensemble des séries tracées pour la durée de
// vie d'une vue graphique : chandeliers, volume, et une ligne par
// indicateur demandé.
//
// Invariant de canaux : après chaque passe, l'ensemble des ids tracés
// vaut exactement {candlestick, volume} ∪ (indicateurs demandés présents
// dans au moins une ligne). Jamais de série orpheline, jamais de série
// dupliquée : la passe est idempotente.
//
// Passe de réconciliation :
//   1. normalise (drop non-fini, tri croissant stable, doublons résolus
//      dernier-écrit-gagne)
//   2. ensemble vide -> tous les canaux sont vidés, rien d'autre
//   3. chandeliers : remplacement complet, jamais d'append incrémental
//   4. volume : couleur binaire up/down selon close >= open
//   5. indicateurs : {time, value} pour les lignes où la valeur existe
//   6. auto-fit de la fenêtre visible une seule fois par clé de données
//
// Échec dur pendant la passe : la passe est abandonnée AVANT commit, les
// séries précédentes restent visibles (fail-safe côté utilisateur).
//
// Mode prepend (historique infini) : bornes oldest/newest mémorisées et
// garde une-requête-à-la-fois pour éviter les fetchs chevauchants.
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::chart::series::{
    CandlePoint, LinePoint, PlottedSeries, VolumePoint, CANDLESTICK_CHANNEL, VOLUME_CHANNEL,
};
use crate::models::OhlcRow;

/// Échec dur d'une passe de réconciliation
///
/// La passe est abandonnée, l'état tracé précédent reste affiché ;
/// l'erreur ne remonte que dans les logs, jamais à l'utilisateur.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("série non strictement croissante après normalisation : {0}")]
    Unordered(String),
}

/// Propriétaire exclusif des séries tracées d'une vue graphique
#[derive(Debug, Default)]
pub struct ChartChannels {
    /// Canaux tracés, par id
    series: BTreeMap<String, PlottedSeries>,

    /// Clé de la source de données (symbol-exchange-interval) : son
    /// changement réarme l'auto-fit
    data_key: String,

    /// L'auto-fit a déjà eu lieu pour cette clé
    fitted: bool,

    /// Fenêtre (min_time, max_time) à appliquer, consommée une fois
    pending_fit: Option<(i64, i64)>,

    /// Bornes des données actuellement tracées
    oldest: Option<i64>,
    newest: Option<i64>,

    /// Garde une-à-la-fois des fetchs de prepend
    prepend_in_flight: bool,

    /// Faux dès qu'un fetch d'historique revient vide
    has_more_history: bool,
}

impl ChartChannels {
    pub fn new() -> Self {
        Self {
            has_more_history: true,
            ..Self::default()
        }
    }

    // ========================================================================
    // Cycle de vie
    // ========================================================================

    /// Change la clé de source de données (symbol-exchange-interval)
    ///
    /// Réarme l'auto-fit et l'état d'historique ; les séries seront
    /// remplacées en bloc par la prochaine passe.
    pub fn set_data_key(&mut self, key: &str) {
        if self.data_key != key {
            debug!(from = %self.data_key, to = %key, "Changement de clé de données");
            self.data_key = key.to_string();
            self.fitted = false;
            self.pending_fit = None;
            self.oldest = None;
            self.newest = None;
            self.prepend_in_flight = false;
            self.has_more_history = true;
        }
    }

    // ========================================================================
    // La passe de réconciliation
    // ========================================================================

    /// Réconcilie les lignes courantes avec l'ensemble des canaux
    ///
    /// `requested_indicators` contient les ids de requête des
    /// indicateurs activés (ex: "SMA_20") ; tout canal d'indicateur qui
    /// n'y figure plus est retiré par cette passe.
    pub fn reconcile(
        &mut self,
        rows: &[OhlcRow],
        requested_indicators: &[String],
    ) -> Result<(), ReconcileError> {
        // 1. Normalisation : drop non-fini, tri stable, doublons
        //    dernier-écrit-gagne
        let normalized = normalize_for_plot(rows);

        // 2. Ensemble vide : on vide tout et on s'arrête là
        if normalized.is_empty() {
            self.series.clear();
            self.oldest = None;
            self.newest = None;
            self.pending_fit = None;
            debug!("Passe de réconciliation : ensemble vide, canaux vidés");
            return Ok(());
        }

        // La nouvelle génération de canaux est construite à part et
        // commise d'un bloc : un échec en cours de route laisse les
        // séries précédentes intactes.
        let mut next: BTreeMap<String, PlottedSeries> = BTreeMap::new();

        // 3. Canal chandeliers : remplacement complet
        let candles: Vec<CandlePoint> = normalized
            .iter()
            .map(|row| CandlePoint {
                time: row.time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            })
            .collect();
        validate_ascending(&candles)?;

        // 4. Canal volume : couleur binaire keyed sur close >= open
        let volume: Vec<VolumePoint> = normalized
            .iter()
            .map(|row| VolumePoint {
                time: row.time,
                value: row.volume,
                bullish: row.is_bullish(),
            })
            .collect();

        let first_time = candles[0].time;
        let last_time = candles[candles.len() - 1].time;

        next.insert(
            CANDLESTICK_CHANNEL.to_string(),
            PlottedSeries::Candlesticks(candles),
        );
        next.insert(VOLUME_CHANNEL.to_string(), PlottedSeries::Volume(volume));

        // 5. Canaux d'indicateurs : un par id demandé présent dans au
        //    moins une ligne ; les autres disparaissent avec le commit
        for id in requested_indicators {
            let points: Vec<LinePoint> = normalized
                .iter()
                .filter_map(|row| {
                    row.indicator(id).map(|value| LinePoint {
                        time: row.time,
                        value,
                    })
                })
                .collect();
            if points.is_empty() {
                continue;
            }
            next.insert(id.clone(), PlottedSeries::Line(points));
        }

        // Commit atomique de la passe
        self.series = next;
        self.oldest = Some(first_time);
        self.newest = Some(last_time);

        // 6. Auto-fit : une seule fois par clé de données, pour ne pas
        //    écraser le zoom/pan manuel des passes suivantes
        if !self.fitted {
            self.fitted = true;
            self.pending_fit = Some((first_time, last_time));
        }

        debug!(
            channels = self.series.len(),
            oldest = first_time,
            newest = last_time,
            "Passe de réconciliation commise"
        );
        Ok(())
    }

    // ========================================================================
    // Accès en lecture (le renderer ne mute jamais)
    // ========================================================================

    pub fn candles(&self) -> Option<&[CandlePoint]> {
        match self.series.get(CANDLESTICK_CHANNEL) {
            Some(PlottedSeries::Candlesticks(points)) => Some(points),
            _ => None,
        }
    }

    pub fn volume(&self) -> Option<&[VolumePoint]> {
        match self.series.get(VOLUME_CHANNEL) {
            Some(PlottedSeries::Volume(points)) => Some(points),
            _ => None,
        }
    }

    /// Points d'une ligne d'indicateur par id de requête
    pub fn line(&self, id: &str) -> Option<&[LinePoint]> {
        match self.series.get(id) {
            Some(PlottedSeries::Line(points)) => Some(points),
            _ => None,
        }
    }

    /// Lignes d'indicateurs actuellement tracées, dans l'ordre des ids
    pub fn lines(&self) -> impl Iterator<Item = (&str, &[LinePoint])> {
        self.series.iter().filter_map(|(id, series)| match series {
            PlottedSeries::Line(points) => Some((id.as_str(), points.as_slice())),
            _ => None,
        })
    }

    /// Ids de tous les canaux tracés
    pub fn channel_ids(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Valeur de volume au temps exact du curseur (readout crosshair) ;
    /// None hors données
    pub fn volume_at(&self, time: i64) -> Option<f64> {
        let volume = self.volume()?;
        let index = volume.binary_search_by_key(&time, |p| p.time).ok()?;
        Some(volume[index].value)
    }

    /// Fenêtre d'auto-fit à appliquer, consommée par le renderer
    pub fn take_auto_fit(&mut self) -> Option<(i64, i64)> {
        self.pending_fit.take()
    }

    // ========================================================================
    // Prepend d'historique (scroll infini vers le passé)
    // ========================================================================

    /// Borne basse des données tracées (secondes epoch)
    pub fn oldest_time(&self) -> Option<i64> {
        self.oldest
    }

    pub fn newest_time(&self) -> Option<i64> {
        self.newest
    }

    /// Un fetch d'historique peut-il partir maintenant ?
    pub fn can_load_older(&self) -> bool {
        !self.prepend_in_flight && self.has_more_history && self.oldest.is_some()
    }

    /// Arme la garde et retourne la borne basse à étendre
    ///
    /// None si un prepend est déjà en vol ou si l'historique est épuisé :
    /// l'appelant n'émet alors aucun fetch.
    pub fn begin_prepend(&mut self) -> Option<i64> {
        if !self.can_load_older() {
            return None;
        }
        self.prepend_in_flight = true;
        self.oldest
    }

    /// Désarme la garde ; un résultat vide clôt l'historique
    pub fn finish_prepend(&mut self, got_older_rows: bool) {
        self.prepend_in_flight = false;
        if !got_older_rows {
            self.has_more_history = false;
            debug!("Historique épuisé : plus de prepend");
        }
    }
}

// ============================================================================
// Normalisation pré-tracé
// ============================================================================

/// Filtre, trie et déduplique les lignes avant construction des canaux
///
/// - lignes à OHLC non-fini : droppées avec warning
/// - tri croissant STABLE par temps (l'amont ne garantit pas l'ordre)
/// - temps dupliqués : dernier-écrit-gagne dans l'ordre d'entrée
fn normalize_for_plot(rows: &[OhlcRow]) -> Vec<OhlcRow> {
    let mut kept: Vec<OhlcRow> = Vec::with_capacity(rows.len());
    for row in rows {
        if !row.is_plottable() {
            warn!(time = row.time, "Ligne non traçable ignorée par la passe");
            continue;
        }
        kept.push(row.clone());
    }

    // Tri stable : deux lignes de même temps gardent leur ordre
    // d'entrée, la déduplication garde donc bien la dernière écrite
    kept.sort_by_key(|row| row.time);

    let mut deduped: Vec<OhlcRow> = Vec::with_capacity(kept.len());
    for row in kept {
        match deduped.last_mut() {
            Some(last) if last.time == row.time => *last = row,
            _ => deduped.push(row),
        }
    }
    deduped
}

/// Garde-fou de commit : les temps doivent être strictement croissants
fn validate_ascending(candles: &[CandlePoint]) -> Result<(), ReconcileError> {
    for pair in candles.windows(2) {
        if pair[0].time >= pair[1].time {
            return Err(ReconcileError::Unordered(format!(
                "{} suivi de {}",
                pair[0].time, pair[1].time
            )));
        }
    }
    Ok(())
}

/// Fusionne un lot d'historique plus ancien devant les lignes courantes
///
/// Les lignes du lot qui chevauchent la borne basse courante sont
/// écartées : la frontière de jointure ne produit jamais de doublon.
pub fn merge_older_rows(older: Vec<OhlcRow>, current: &[OhlcRow]) -> Vec<OhlcRow> {
    let boundary = current.iter().map(|row| row.time).min();
    let mut merged: Vec<OhlcRow> = match boundary {
        Some(boundary) => older.into_iter().filter(|row| row.time < boundary).collect(),
        None => older,
    };
    merged.extend_from_slice(current);
    merged
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> OhlcRow {
        OhlcRow {
            time,
            open,
            high,
            low,
            close,
            volume,
            indicators: BTreeMap::new(),
        }
    }

    fn row_with_indicator(time: i64, close: f64, id: &str, value: f64) -> OhlcRow {
        let mut r = row(time, close, close + 1.0, close - 1.0, close, 10.0);
        r.indicators.insert(id.to_string(), value);
        r
    }

    #[test]
    fn test_out_of_order_rows_are_sorted() {
        // Lignes reçues {3, 1} -> tracé trié {1, 3}
        let rows = vec![
            row(3, 1.0, 2.0, 1.0, 2.0, 10.0),
            row(1, 2.0, 3.0, 1.0, 2.5, 20.0),
        ];
        let mut channels = ChartChannels::new();
        channels.reconcile(&rows, &[]).unwrap();

        let candles = channels.candles().unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1);
        assert_eq!(candles[0].close, 2.5);
        assert_eq!(candles[1].time, 3);

        let volume = channels.volume().unwrap();
        assert_eq!(volume[0].value, 20.0);
        assert!(volume[0].bullish); // close 2.5 >= open 2.0
        assert_eq!(volume[1].value, 10.0);
        assert!(volume[1].bullish); // close 2.0 >= open 1.0
    }

    #[test]
    fn test_duplicate_times_last_write_wins() {
        let rows = vec![
            row(5, 1.0, 2.0, 1.0, 1.5, 10.0),
            row(5, 2.0, 3.0, 2.0, 2.5, 20.0), // même temps, écrit après
            row(1, 1.0, 2.0, 1.0, 1.5, 5.0),
        ];
        let mut channels = ChartChannels::new();
        channels.reconcile(&rows, &[]).unwrap();

        let candles = channels.candles().unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].time, 5);
        assert_eq!(candles[1].close, 2.5); // la dernière écrite gagne
    }

    #[test]
    fn test_channel_set_is_exact() {
        let rows = vec![
            row_with_indicator(1, 10.0, "SMA_20", 9.5),
            row_with_indicator(2, 11.0, "SMA_20", 10.0),
        ];
        let mut channels = ChartChannels::new();
        channels
            .reconcile(&rows, &["SMA_20".to_string(), "EMA_50".to_string()])
            .unwrap();

        // EMA_50 demandé mais absent de toutes les lignes : pas de canal
        let ids = channels.channel_ids();
        assert_eq!(ids, vec!["SMA_20", "candlestick", "volume"]);
        assert!(channels.line("EMA_50").is_none());
        assert_eq!(channels.line("SMA_20").unwrap().len(), 2);
    }

    #[test]
    fn test_unrequested_indicator_channel_is_removed() {
        let rows = vec![row_with_indicator(1, 10.0, "SMA_20", 9.5)];
        let mut channels = ChartChannels::new();

        channels.reconcile(&rows, &["SMA_20".to_string()]).unwrap();
        assert!(channels.line("SMA_20").is_some());

        // L'indicateur est retiré de la demande : son canal disparaît
        channels.reconcile(&rows, &[]).unwrap();
        assert!(channels.line("SMA_20").is_none());
        assert_eq!(channels.channel_ids(), vec!["candlestick", "volume"]);
    }

    #[test]
    fn test_idempotent_pass() {
        let rows = vec![
            row_with_indicator(1, 10.0, "SMA_20", 9.5),
            row_with_indicator(2, 11.0, "SMA_20", 10.0),
        ];
        let requested = vec!["SMA_20".to_string()];
        let mut channels = ChartChannels::new();

        channels.reconcile(&rows, &requested).unwrap();
        let first_candles = channels.candles().unwrap().to_vec();
        let first_ids: Vec<String> =
            channels.channel_ids().iter().map(|s| s.to_string()).collect();

        channels.reconcile(&rows, &requested).unwrap();
        assert_eq!(channels.candles().unwrap(), first_candles.as_slice());
        let second_ids: Vec<String> =
            channels.channel_ids().iter().map(|s| s.to_string()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_non_finite_rows_are_dropped() {
        let mut bad = row(2, 1.0, 2.0, 1.0, 1.5, 10.0);
        bad.close = f64::NAN;
        let rows = vec![row(1, 1.0, 2.0, 1.0, 1.5, 10.0), bad, row(3, 1.0, 2.0, 1.0, 1.5, 10.0)];

        let mut channels = ChartChannels::new();
        channels.reconcile(&rows, &[]).unwrap();
        assert_eq!(channels.candles().unwrap().len(), 2);
        assert_eq!(channels.volume().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_set_clears_all_channels() {
        let rows = vec![row(1, 1.0, 2.0, 1.0, 1.5, 10.0)];
        let mut channels = ChartChannels::new();
        channels.reconcile(&rows, &[]).unwrap();
        assert!(!channels.is_empty());

        channels.reconcile(&[], &[]).unwrap();
        assert!(channels.is_empty());
        assert!(channels.candles().is_none());
        assert_eq!(channels.oldest_time(), None);
    }

    #[test]
    fn test_auto_fit_fires_once_per_data_key() {
        let rows = vec![row(1, 1.0, 2.0, 1.0, 1.5, 10.0), row(9, 1.0, 2.0, 1.0, 1.5, 10.0)];
        let mut channels = ChartChannels::new();
        channels.set_data_key("INFY-NSE-1D");

        channels.reconcile(&rows, &[]).unwrap();
        assert_eq!(channels.take_auto_fit(), Some((1, 9)));

        // Deuxième passe, même clé : le zoom manuel n'est pas écrasé
        channels.reconcile(&rows, &[]).unwrap();
        assert_eq!(channels.take_auto_fit(), None);

        // Nouvelle clé de données : l'auto-fit se réarme
        channels.set_data_key("TCS-NSE-1D");
        channels.reconcile(&rows, &[]).unwrap();
        assert_eq!(channels.take_auto_fit(), Some((1, 9)));
    }

    #[test]
    fn test_prepend_guard_one_at_a_time() {
        let rows = vec![row(100, 1.0, 2.0, 1.0, 1.5, 10.0)];
        let mut channels = ChartChannels::new();
        channels.reconcile(&rows, &[]).unwrap();

        assert_eq!(channels.begin_prepend(), Some(100));
        // Déjà en vol : pas de second fetch
        assert_eq!(channels.begin_prepend(), None);

        channels.finish_prepend(true);
        assert_eq!(channels.begin_prepend(), Some(100));

        // Résultat vide : l'historique est clos
        channels.finish_prepend(false);
        assert_eq!(channels.begin_prepend(), None);
        assert!(!channels.can_load_older());
    }

    #[test]
    fn test_merge_older_rows_dedups_boundary() {
        let current = vec![row(10, 1.0, 2.0, 1.0, 1.5, 10.0), row(20, 1.0, 2.0, 1.0, 1.5, 10.0)];
        let older = vec![
            row(1, 1.0, 2.0, 1.0, 1.5, 10.0),
            row(10, 9.0, 9.0, 9.0, 9.0, 99.0), // chevauche la frontière
        ];
        let merged = merge_older_rows(older, &current);
        let times: Vec<i64> = merged.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![1, 10, 20]);
        // La version courante de t=10 est conservée, pas celle du lot
        assert_eq!(merged[1].close, 1.5);
    }

    #[test]
    fn test_volume_at_crosshair() {
        let rows = vec![row(1, 2.0, 3.0, 1.0, 2.5, 20.0), row(3, 1.0, 2.0, 1.0, 2.0, 10.0)];
        let mut channels = ChartChannels::new();
        channels.reconcile(&rows, &[]).unwrap();

        assert_eq!(channels.volume_at(1), Some(20.0));
        assert_eq!(channels.volume_at(3), Some(10.0));
        // Hors données : caché
        assert_eq!(channels.volume_at(2), None);
    }
}
