// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état global de l'application TUI : la sélection courante
// (symbole, bourse, intervalle, indicateurs), la cascade de fetchs
// indicateurs → info → données, et les canaux du graphique.
//
// PATTERN : cette structure suit le pattern "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Toutes les modifications passent par les méthodes de App
// - Garantit la cohérence de l'état
//
// Anti-course : chaque changement de sélection incrémente un compteur
// de génération. Les commandes du worker transportent la génération au
// moment de l'émission ; un résultat dont la génération ne correspond
// plus à la sélection courante est jeté sans toucher à l'affichage.
// Un aller-retour rapide ne peut donc jamais afficher les données du
// mauvais symbole.
// ============================================================================

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::chart::{merge_older_rows, ChartChannels};
use crate::config::Config;
use crate::format;
use crate::models::{IndicatorMetadata, Interval, OhlcRow, StockInfo, StockListing};
use crate::select::{IndicatorPicker, IntervalSelector, SymbolSearch};

/// Sélection par défaut au démarrage
const DEFAULT_SYMBOL: &str = "INFY";
const DEFAULT_EXCHANGE: &str = "NSE";

// ============================================================================
// Enums : Screen et FetchState
// ============================================================================

/// Écrans de l'application
///
/// Pattern "State Machine" : un seul écran actif à la fois, le
/// compilateur force à gérer tous les cas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Vue principale : le graphique du titre sélectionné
    Chart,

    /// Overlay de recherche de symbole (saisie filtrante)
    SymbolSearch,

    /// Overlay de sélection des indicateurs
    Indicators,
}

/// Étapes de la cascade de fetchs
///
/// Chaque transition a pour action d'entrée le fetch correspondant ;
/// une étape tardive ne tourne jamais sur des entrées périmées (garde
/// par génération).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Rien en vol, rien d'affichable demandé
    Idle,

    /// /info en vol pour la sélection courante
    FetchingInfo,

    /// /data en vol pour la sélection courante
    FetchingData,

    /// Données affichées pour la sélection courante
    Ready,
}

// ============================================================================
// Requêtes construites par App, exécutées par le worker
// ============================================================================

/// Paramètres d'un fetch /info
#[derive(Debug, Clone)]
pub struct InfoRequest {
    pub exchange: String,
    pub symbol: String,
    pub interval: Interval,
    pub generation: u64,
}

/// Paramètres d'un fetch /data
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub exchange: String,
    pub symbol: String,
    pub interval: Interval,
    /// Bornes de la fenêtre, format YYYY-MM-DD
    pub start_date: String,
    pub end_date: String,
    /// Paramètre `indicators=` encodé ; None = omis de l'URL
    pub indicators: Option<String>,
    /// Ids de requête attendus en colonnes dans les lignes
    pub requested_ids: Vec<String>,
    pub generation: u64,
    /// Lot d'historique plus ancien à fusionner devant les lignes
    /// courantes, au lieu de les remplacer
    pub prepend: bool,
}

/// Valeurs sous le curseur du graphique
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrosshairReadout {
    pub time: i64,
    pub close: f64,
    pub volume: Option<f64>,
}

// ============================================================================
// App
// ============================================================================

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Two-step quit : première pression de 'q' arme la confirmation
    pub confirm_quit: bool,

    /// Écran actuellement affiché
    screen: Screen,

    // Sélection courante, mutée uniquement par les handlers utilisateur
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,

    /// État de l'overlay de recherche de symbole
    pub symbol_search: SymbolSearch,

    /// Intervalles proposables pour le titre courant
    pub intervals: IntervalSelector,

    /// État de l'overlay d'indicateurs
    pub indicators: IndicatorPicker,

    /// Dernier /info reçu pour la sélection courante ; vidé AVANT
    /// chaque re-fetch pour ne jamais afficher l'info périmée d'un
    /// autre symbole
    stock_info: Option<StockInfo>,

    /// Lignes OHLCV courantes (remplacées en bloc, sauf prepend)
    rows: Vec<OhlcRow>,

    /// Canaux tracés, possédés par le réconciliateur
    pub channels: ChartChannels,

    fetch_state: FetchState,

    /// Message d'erreur inline près du graphique
    error: Option<String>,

    /// Backoff de démarrage épuisé : bannière persistante, plus de
    /// retry automatique
    connection_lost: bool,

    /// Indicateur de chargement d'arrière-plan
    pub is_loading: bool,
    pub loading_message: Option<String>,

    /// Compteur de génération anti-course
    generation: u64,

    /// Index du curseur dans les chandelles tracées
    crosshair: Option<usize>,

    /// Largeur de la fenêtre de données initiale, en jours
    fetch_window_days: i64,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let mut channels = ChartChannels::new();
        channels.set_data_key(&data_key(DEFAULT_SYMBOL, DEFAULT_EXCHANGE, Interval::default()));
        Self {
            running: true,
            confirm_quit: false,
            screen: Screen::Chart,
            symbol: DEFAULT_SYMBOL.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            interval: Interval::default(),
            symbol_search: SymbolSearch::new(),
            intervals: IntervalSelector::new(),
            indicators: IndicatorPicker::new(),
            stock_info: None,
            rows: Vec::new(),
            channels,
            fetch_state: FetchState::Idle,
            error: None,
            connection_lost: false,
            is_loading: false,
            loading_message: None,
            generation: 0,
            crosshair: None,
            fetch_window_days: config.fetch_window_days,
        }
    }

    // ========================================================================
    // Cycle de vie et écrans
    // ========================================================================

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    pub fn current_screen(&self) -> Screen {
        self.screen
    }

    pub fn is_on_chart(&self) -> bool {
        self.screen == Screen::Chart
    }

    pub fn is_on_symbol_search(&self) -> bool {
        self.screen == Screen::SymbolSearch
    }

    pub fn is_on_indicators(&self) -> bool {
        self.screen == Screen::Indicators
    }

    pub fn show_chart(&mut self) {
        self.screen = Screen::Chart;
    }

    /// Ouvre la recherche de symbole avec un filtre vierge
    pub fn open_symbol_search(&mut self) {
        self.symbol_search.clear_query();
        self.screen = Screen::SymbolSearch;
    }

    pub fn open_indicators(&mut self) {
        self.indicators.cancel_edit();
        self.screen = Screen::Indicators;
    }

    pub fn start_loading(&mut self, message: Option<String>) {
        self.is_loading = true;
        self.loading_message = message;
    }

    pub fn stop_loading(&mut self) {
        self.is_loading = false;
        self.loading_message = None;
    }

    pub fn is_loading_data(&self) -> bool {
        self.is_loading
    }

    // ========================================================================
    // Génération anti-course
    // ========================================================================

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Un résultat du worker est-il encore d'actualité ?
    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    // ========================================================================
    // Démarrage : métadonnées d'indicateurs
    // ========================================================================

    /// Applique la liste d'indicateurs fetchée au démarrage
    pub fn apply_indicators(&mut self, metadata: Vec<IndicatorMetadata>) {
        info!(count = metadata.len(), "Indicateurs disponibles reçus");
        self.indicators.set_metadata(metadata);
        self.connection_lost = false;
    }

    /// Backoff de démarrage épuisé : bannière persistante
    pub fn fail_startup(&mut self, message: String) {
        warn!(error = %message, "Démarrage sans backend, bannière de connexion");
        self.connection_lost = true;
        self.error = Some(message);
        self.fetch_state = FetchState::Idle;
    }

    pub fn is_connection_lost(&self) -> bool {
        self.connection_lost
    }

    // ========================================================================
    // Cascade info → data
    // ========================================================================

    pub fn fetch_state(&self) -> FetchState {
        self.fetch_state
    }

    pub fn stock_info(&self) -> Option<&StockInfo> {
        self.stock_info.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Entre dans l'étape FetchingInfo et construit la requête /info
    pub fn begin_info_fetch(&mut self) -> InfoRequest {
        self.fetch_state = FetchState::FetchingInfo;
        InfoRequest {
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            interval: self.interval,
            generation: self.generation,
        }
    }

    /// Change le titre sélectionné
    ///
    /// Vide l'info et les lignes AVANT le re-fetch (l'info périmée de
    /// l'ancien titre ne doit jamais s'afficher pour le nouveau) et
    /// invalide toutes les réponses en vol.
    ///
    /// Retourne true si la bourse a changé : la liste de candidats de
    /// la recherche doit alors être re-fetchée.
    pub fn select_stock(&mut self, picked: StockListing) -> bool {
        let exchange_changed = picked.exchange != self.exchange;
        info!(symbol = %picked.symbol, exchange = %picked.exchange, "Titre sélectionné");

        self.symbol = picked.symbol;
        self.exchange = picked.exchange;
        self.bump_generation();

        self.stock_info = None;
        self.rows.clear();
        self.error = None;
        self.crosshair = None;
        self.channels
            .set_data_key(&data_key(&self.symbol, &self.exchange, self.interval));
        self.clear_plots();
        self.fetch_state = FetchState::FetchingInfo;

        exchange_changed
    }

    /// Applique un /info reçu du worker
    ///
    /// Un résultat d'une génération périmée est jeté. Sinon :
    /// reconstruit le sélecteur d'intervalles, force l'intervalle
    /// courant dans l'ensemble supporté, et passe en FetchingData.
    pub fn apply_stock_info(&mut self, generation: u64, stock_info: StockInfo) {
        if !self.is_current(generation) {
            debug!(generation, current = self.generation, "Info périmée jetée");
            return;
        }
        self.intervals = IntervalSelector::from_codes(&stock_info.supported_intervals);
        let resolved = self.intervals.resolve(self.interval);
        if resolved != self.interval {
            info!(from = %self.interval, to = %resolved, "Intervalle non supporté, retour au défaut");
            self.interval = resolved;
            self.channels
                .set_data_key(&data_key(&self.symbol, &self.exchange, self.interval));
        }
        self.stock_info = Some(stock_info);
        self.error = None;
        self.fetch_state = FetchState::FetchingData;
    }

    /// Échec d'un /info : message inline, pas de retry automatique
    pub fn apply_info_error(&mut self, generation: u64, message: String) {
        if !self.is_current(generation) {
            return;
        }
        warn!(error = %message, "Échec du fetch info");
        self.error = Some(message);
        self.fetch_state = FetchState::Idle;
    }

    /// Construit la requête /data de la fenêtre initiale
    ///
    /// Fenêtre : les `fetch_window_days` derniers jours, bornée par le
    /// min_time déclaré par /info. None tant que l'info n'est pas là.
    pub fn data_request(&self) -> Option<DataRequest> {
        let stock_info = self.stock_info.as_ref()?;
        let end = Utc::now().date_naive();
        let mut start = format::subtract_days(end, self.fetch_window_days);
        if let Some(range) = &stock_info.date_range {
            let min_date = range.min_time.date_naive();
            if start < min_date {
                start = min_date;
            }
        }
        Some(self.build_data_request(start, end, false))
    }

    /// Construit la requête /data d'un lot d'historique plus ancien
    ///
    /// None si un prepend est déjà en vol, si l'historique est épuisé,
    /// ou si la borne basse déclarée par /info est atteinte.
    pub fn request_older_history(&mut self) -> Option<DataRequest> {
        let oldest = self.channels.begin_prepend()?;
        let end = match format::to_naive_date(oldest) {
            Some(date) => format::subtract_days(date, 1),
            None => {
                self.channels.finish_prepend(true);
                return None;
            }
        };
        let mut start = format::subtract_days(end, self.fetch_window_days);
        if let Some(range) = self.stock_info.as_ref().and_then(|i| i.date_range.as_ref()) {
            let min_date = range.min_time.date_naive();
            if end < min_date {
                // Tout l'historique déclaré est déjà affiché
                self.channels.finish_prepend(false);
                return None;
            }
            if start < min_date {
                start = min_date;
            }
        }
        debug!(start = %start, end = %end, "Fetch d'historique plus ancien");
        Some(self.build_data_request(start, end, true))
    }

    fn build_data_request(
        &self,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        prepend: bool,
    ) -> DataRequest {
        DataRequest {
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            interval: self.interval,
            start_date: format::date_key(start),
            end_date: format::date_key(end),
            indicators: self.indicators.encode_request(),
            requested_ids: self.indicators.requested_ids(),
            generation: self.generation,
            prepend,
        }
    }

    /// Applique les lignes reçues du worker
    ///
    /// Génération périmée : jetée sans toucher à l'affichage. Sinon les
    /// lignes remplacent (ou précèdent, en mode prepend) les courantes
    /// et une passe de réconciliation tourne.
    pub fn apply_rows(&mut self, generation: u64, rows: Vec<OhlcRow>, prepend: bool) {
        let current = self.is_current(generation);
        if prepend {
            // La garde est désarmée AVANT le contrôle de péremption,
            // sinon un résultat périmé la laisse armée à jamais. Seul
            // un résultat d'actualité peut clore l'historique.
            self.channels
                .finish_prepend(!current || !rows.is_empty());
        }
        if !current {
            debug!(generation, current = self.generation, "Lignes périmées jetées");
            return;
        }
        if prepend {
            self.rows = merge_older_rows(rows, &self.rows);
        } else {
            self.rows = rows;
        }
        self.error = None;
        self.fetch_state = FetchState::Ready;
        self.reconcile_now();
    }

    /// Échec d'un /data : message inline, état visuel précédent conservé
    pub fn apply_data_error(&mut self, generation: u64, message: String, prepend: bool) {
        if prepend {
            // Désarme la garde sans clore l'historique : l'utilisateur
            // peut redemander
            self.channels.finish_prepend(true);
        }
        if !self.is_current(generation) {
            return;
        }
        warn!(error = %message, "Échec du fetch de données");
        self.error = Some(message);
        self.fetch_state = FetchState::Ready;
    }

    // ========================================================================
    // Changements d'intervalle et d'indicateurs
    // ========================================================================

    /// Passe à l'intervalle suivant du cycle (touche ])
    ///
    /// Retourne true si l'intervalle a changé : la cascade info → data
    /// repart (la plage de dates de /info dépend de l'intervalle).
    pub fn next_interval(&mut self) -> bool {
        self.change_interval(self.intervals.cycle_next(self.interval))
    }

    /// Passe à l'intervalle précédent du cycle (touche [)
    pub fn previous_interval(&mut self) -> bool {
        self.change_interval(self.intervals.cycle_previous(self.interval))
    }

    fn change_interval(&mut self, next: Interval) -> bool {
        if next == self.interval {
            return false;
        }
        info!(from = %self.interval, to = %next, "Changement d'intervalle");
        self.interval = next;
        self.bump_generation();
        self.stock_info = None;
        self.error = None;
        self.channels
            .set_data_key(&data_key(&self.symbol, &self.exchange, self.interval));
        self.fetch_state = FetchState::FetchingInfo;
        true
    }

    /// À appeler après tout toggle ou édition de paramètre validée
    ///
    /// Réconcilie immédiatement (un indicateur retiré disparaît sans
    /// attendre le réseau) et retourne la requête /data qui rafraîchit
    /// les colonnes, si l'info est déjà là.
    ///
    /// Sans info (un /info est encore en vol), rien n'est émis et la
    /// génération ne bouge pas : le /info en vol reste d'actualité et
    /// la cascade en cours reprendra la sélection à sa réception.
    pub fn indicators_changed(&mut self) -> Option<DataRequest> {
        self.reconcile_now();
        if self.stock_info.is_none() {
            return None;
        }
        self.bump_generation();
        let request = self.data_request()?;
        self.fetch_state = FetchState::FetchingData;
        Some(request)
    }

    /// Passe de réconciliation sur les lignes et la sélection courantes
    ///
    /// Un échec de passe laisse l'état tracé précédent visible et ne
    /// remonte que dans les logs.
    fn reconcile_now(&mut self) {
        let requested = self.indicators.requested_ids();
        if let Err(err) = self.channels.reconcile(&self.rows, &requested) {
            warn!(error = %err, "Passe de réconciliation abandonnée");
        }
        // Premières données d'une nouvelle source : recadrage sur la
        // fenêtre la plus récente. Les rafraîchissements suivants (lot
        // d'historique, changement d'indicateurs) gardent le curseur.
        if let Some((from, to)) = self.channels.take_auto_fit() {
            debug!(from, to, "Recadrage sur la nouvelle source de données");
            self.crosshair = None;
        }
        self.clamp_crosshair();
    }

    fn clear_plots(&mut self) {
        if let Err(err) = self.channels.reconcile(&[], &[]) {
            warn!(error = %err, "Échec du vidage des canaux");
        }
    }

    // ========================================================================
    // Curseur (crosshair)
    // ========================================================================

    pub fn crosshair_index(&self) -> Option<usize> {
        self.crosshair
    }

    /// Déplace le curseur d'un cran ; l'active sur la dernière
    /// chandelle s'il était caché
    pub fn crosshair_move(&mut self, delta: isize) {
        let Some(candles) = self.channels.candles() else {
            self.crosshair = None;
            return;
        };
        let last = candles.len() - 1;
        let next = match self.crosshair {
            Some(index) => index.saturating_add_signed(delta).min(last),
            None => last,
        };
        self.crosshair = Some(next);
    }

    pub fn crosshair_hide(&mut self) {
        self.crosshair = None;
    }

    /// Valeurs sous le curseur ; None quand il est caché ou hors données
    pub fn crosshair_readout(&self) -> Option<CrosshairReadout> {
        let index = self.crosshair?;
        let candles = self.channels.candles()?;
        let candle = candles.get(index)?;
        Some(CrosshairReadout {
            time: candle.time,
            close: candle.close,
            volume: self.channels.volume_at(candle.time),
        })
    }

    fn clamp_crosshair(&mut self) {
        match self.channels.candles() {
            Some(candles) if !candles.is_empty() => {
                if let Some(index) = self.crosshair {
                    self.crosshair = Some(index.min(candles.len() - 1));
                }
            }
            _ => self.crosshair = None,
        }
    }

    // ========================================================================
    // Affichage
    // ========================================================================

    /// Titre de l'en-tête du graphique
    pub fn chart_title(&self) -> String {
        let name = self
            .stock_info
            .as_ref()
            .and_then(|i| i.metadata.name.as_deref());
        match name {
            Some(name) => format!("{} ({}) - {}", self.symbol, self.exchange, name),
            None => format!("{} ({})", self.symbol, self.exchange),
        }
    }
}

/// Clé de source de données : changement = réarmement de l'auto-fit
fn data_key(symbol: &str, exchange: &str, interval: Interval) -> String {
    format!("{}-{}-{}", symbol, exchange, interval.code())
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, StockMetadata};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn test_app() -> App {
        App::new(&Config::default())
    }

    fn listing(symbol: &str, exchange: &str) -> StockListing {
        StockListing {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            name: None,
        }
    }

    fn info(intervals: &[&str]) -> StockInfo {
        StockInfo {
            metadata: StockMetadata {
                symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
                name: Some("Infosys Limited".to_string()),
            },
            supported_intervals: intervals.iter().map(|s| s.to_string()).collect(),
            date_range: Some(DateRange {
                min_time: Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).single().unwrap(),
                max_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap(),
            }),
        }
    }

    fn row(time: i64, close: f64) -> OhlcRow {
        OhlcRow {
            time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
            indicators: BTreeMap::new(),
        }
    }

    #[test]
    fn test_stale_response_is_rejected() {
        let mut app = test_app();

        // Fetch en vol pour la sélection A
        app.select_stock(listing("TCS", "NSE"));
        let stale_generation = app.generation();

        // L'utilisateur change pour B avant la réponse de A
        app.select_stock(listing("WIPRO", "NSE"));

        // La réponse tardive de A ne doit pas toucher l'affichage
        app.apply_rows(stale_generation, vec![row(1, 10.0)], false);
        assert!(app.channels.is_empty());
        assert_eq!(app.fetch_state(), FetchState::FetchingInfo);

        // La réponse de B, elle, s'applique
        app.apply_stock_info(app.generation(), info(&["1D"]));
        app.apply_rows(app.generation(), vec![row(1, 10.0)], false);
        assert!(!app.channels.is_empty());
        assert_eq!(app.fetch_state(), FetchState::Ready);
    }

    #[test]
    fn test_select_stock_clears_stale_info() {
        let mut app = test_app();
        app.apply_stock_info(app.generation(), info(&["1D"]));
        assert!(app.stock_info().is_some());

        // L'info de l'ancien titre est vidée avant le re-fetch
        app.select_stock(listing("TCS", "NSE"));
        assert!(app.stock_info().is_none());
        assert_eq!(app.fetch_state(), FetchState::FetchingInfo);
    }

    #[test]
    fn test_select_stock_reports_exchange_change() {
        let mut app = test_app();
        assert!(!app.select_stock(listing("TCS", "NSE")));
        assert!(app.select_stock(listing("TCS", "BSE")));
    }

    #[test]
    fn test_info_resolves_unsupported_interval() {
        let mut app = test_app();
        app.interval = Interval::H1;
        app.apply_stock_info(app.generation(), info(&["1D", "1W"]));
        assert_eq!(app.interval, Interval::D1);
        assert_eq!(app.fetch_state(), FetchState::FetchingData);
    }

    #[test]
    fn test_data_request_clamps_to_min_time() {
        let mut app = test_app();
        let mut bounded = info(&["1D"]);
        // min_time dans la fenêtre des 730 jours
        bounded.date_range = Some(DateRange {
            min_time: Utc::now() - Duration::days(30),
            max_time: Utc::now(),
        });
        app.apply_stock_info(app.generation(), bounded);

        let request = app.data_request().unwrap();
        let start: chrono::NaiveDate = request.start_date.parse().unwrap();
        let end: chrono::NaiveDate = request.end_date.parse().unwrap();
        assert!(end.signed_duration_since(start).num_days() <= 31);
    }

    #[test]
    fn test_interval_change_restarts_cascade() {
        let mut app = test_app();
        app.apply_stock_info(app.generation(), info(&["1D", "1W"]));
        let before = app.generation();

        assert!(app.next_interval());
        assert_eq!(app.interval, Interval::W1);
        assert!(app.generation() > before);
        assert!(app.stock_info().is_none());
        assert_eq!(app.fetch_state(), FetchState::FetchingInfo);
    }

    // Timestamps à l'intérieur de la plage déclarée par info() (2015 -
    // 2025), sinon request_older_history clôt l'historique d'office
    const DAY: i64 = 86_400;
    const T0: i64 = 1_600_000_000; // 2020-09-13

    #[test]
    fn test_prepend_merges_older_rows() {
        let mut app = test_app();
        app.apply_stock_info(app.generation(), info(&["1D"]));
        app.apply_rows(app.generation(), vec![row(T0, 10.0)], false);

        let request = app.request_older_history().unwrap();
        assert!(request.prepend);
        // Garde une-à-la-fois : pas de second fetch tant que le premier
        // n'est pas revenu
        assert!(app.request_older_history().is_none());

        app.apply_rows(app.generation(), vec![row(T0 - 50 * DAY, 8.0)], true);
        let candles = app.channels.candles().unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, T0 - 50 * DAY);
    }

    #[test]
    fn test_empty_prepend_closes_history() {
        let mut app = test_app();
        app.apply_stock_info(app.generation(), info(&["1D"]));
        app.apply_rows(app.generation(), vec![row(T0, 10.0)], false);

        let request = app.request_older_history().unwrap();
        app.apply_rows(request.generation, Vec::new(), true);
        assert!(app.request_older_history().is_none());
    }

    #[test]
    fn test_stale_prepend_releases_guard() {
        let mut app = test_app();
        app.apply_stock_info(app.generation(), info(&["1D"]));
        app.apply_rows(app.generation(), vec![row(T0, 10.0)], false);

        let request = app.request_older_history().unwrap();

        // La sélection d'indicateurs change pendant que le fetch
        // d'historique est en vol : sa génération devient périmée
        let _ = app.indicators_changed();
        assert_ne!(request.generation, app.generation());

        // Le résultat périmé (même vide) désarme la garde sans clore
        // l'historique : 'o' doit rester utilisable
        app.apply_rows(request.generation, Vec::new(), true);
        assert!(app.request_older_history().is_some());
    }

    #[test]
    fn test_indicator_close_during_info_fetch_keeps_cascade() {
        let mut app = test_app();
        let request = app.begin_info_fetch();

        // Ouverture/fermeture bénigne de l'overlay pendant le /info en
        // vol : rien à émettre, et le /info ne doit pas être invalidé
        app.open_indicators();
        app.show_chart();
        assert!(app.indicators_changed().is_none());
        assert_eq!(request.generation, app.generation());

        // La réponse du /info en vol fait avancer la cascade
        app.apply_stock_info(request.generation, info(&["1D"]));
        assert_eq!(app.fetch_state(), FetchState::FetchingData);
        assert!(app.data_request().is_some());
    }

    #[test]
    fn test_crosshair_readout() {
        let mut app = test_app();
        app.apply_stock_info(app.generation(), info(&["1D"]));
        app.apply_rows(
            app.generation(),
            vec![row(100, 10.0), row(200, 12.0)],
            false,
        );

        // Caché par défaut, activé sur la dernière chandelle
        assert!(app.crosshair_readout().is_none());
        app.crosshair_move(0);
        let readout = app.crosshair_readout().unwrap();
        assert_eq!(readout.time, 200);
        assert_eq!(readout.volume, Some(100.0));

        app.crosshair_move(-1);
        assert_eq!(app.crosshair_readout().unwrap().time, 100);
        // Borne basse
        app.crosshair_move(-5);
        assert_eq!(app.crosshair_readout().unwrap().time, 100);
    }

    #[test]
    fn test_two_step_quit() {
        let mut app = test_app();
        app.request_quit();
        assert!(app.is_awaiting_quit_confirmation());
        assert!(app.is_running());
        app.cancel_quit();
        assert!(!app.is_awaiting_quit_confirmation());
    }

    #[test]
    fn test_startup_failure_sets_persistent_banner() {
        let mut app = test_app();
        app.fail_startup("connexion impossible".to_string());
        assert!(app.is_connection_lost());
        assert!(app.error().is_some());
    }
}
