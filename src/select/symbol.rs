// ============================================================================
// Sélecteur : recherche de symbole
// ============================================================================
// État de l'écran de recherche : un buffer de saisie filtre la liste des
// actions de la bourse courante par sous-chaîne insensible à la casse
// sur le libellé "SYMBOL (NAME)".
//
// La sélection n'est validée que si le couple (symbol, exchange) diffère
// de la sélection courante : re-choisir la même action ne déclenche
// aucun re-fetch.
// ============================================================================

use crate::models::StockListing;

/// État de la recherche de symbole
///
/// La liste des candidats est fournie par le worker (fetch par bourse) ;
/// une liste vide ou en erreur s'affiche comme un état explicite, jamais
/// comme un contrôle cassé.
#[derive(Debug, Default)]
pub struct SymbolSearch {
    /// Buffer de saisie du filtre
    query: String,

    /// Candidats de la bourse courante, tels que reçus
    candidates: Vec<StockListing>,

    /// Curseur dans la liste FILTRÉE
    cursor: usize,

    /// La liste est en cours de chargement
    loading: bool,

    /// Erreur du dernier fetch de liste, affichée en place des candidats
    error: Option<String>,
}

impl SymbolSearch {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Cycle de vie de la liste
    // ========================================================================

    /// Passe en état de chargement (changement de bourse)
    pub fn start_loading(&mut self) {
        self.loading = true;
        self.error = None;
        self.candidates.clear();
        self.cursor = 0;
    }

    /// Remplace les candidats par le résultat d'un fetch
    pub fn set_candidates(&mut self, candidates: Vec<StockListing>) {
        self.candidates = candidates;
        self.loading = false;
        self.error = None;
        self.cursor = 0;
    }

    /// Affiche l'échec du fetch de liste
    pub fn set_error(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
        self.candidates.clear();
        self.cursor = 0;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // ========================================================================
    // Saisie et filtrage
    // ========================================================================

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.cursor = 0;
    }

    pub fn backspace(&mut self) {
        self.query.pop();
        self.cursor = 0;
    }

    pub fn clear_query(&mut self) {
        self.query.clear();
        self.cursor = 0;
    }

    /// Candidats visibles : sous-chaîne insensible à la casse du libellé
    pub fn filtered(&self) -> Vec<&StockListing> {
        let needle = self.query.to_lowercase();
        self.candidates
            .iter()
            .filter(|stock| needle.is_empty() || stock.label().to_lowercase().contains(&needle))
            .collect()
    }

    // ========================================================================
    // Navigation et validation
    // ========================================================================

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        let max_index = self.filtered().len().saturating_sub(1);
        self.cursor = (self.cursor + 1).min(max_index);
    }

    /// Candidat sous le curseur, dans la liste filtrée
    pub fn highlighted(&self) -> Option<&StockListing> {
        self.filtered().get(self.cursor).copied()
    }

    /// Valide la sélection courante
    ///
    /// Retourne None si la liste filtrée est vide ou si le candidat est
    /// identique à la sélection courante (pas de re-fetch inutile).
    pub fn accept(&self, current_symbol: &str, current_exchange: &str) -> Option<StockListing> {
        let picked = self.highlighted()?;
        if picked.symbol == current_symbol && picked.exchange == current_exchange {
            return None;
        }
        Some(picked.clone())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(symbol: &str, exchange: &str, name: &str) -> StockListing {
        StockListing {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            name: Some(name.to_string()),
        }
    }

    fn search_with(candidates: Vec<StockListing>) -> SymbolSearch {
        let mut search = SymbolSearch::new();
        search.set_candidates(candidates);
        search
    }

    #[test]
    fn test_filter_is_case_insensitive_on_label() {
        let search = search_with(vec![
            listing("INFY", "NSE", "Infosys Limited"),
            listing("TCS", "NSE", "Tata Consultancy"),
        ]);

        let mut search = search;
        for c in "infosys".chars() {
            search.push_char(c);
        }
        let visible = search.filtered();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].symbol, "INFY");
    }

    #[test]
    fn test_filter_matches_symbol_part_of_label() {
        let mut search = search_with(vec![
            listing("INFY", "NSE", "Infosys Limited"),
            listing("TCS", "NSE", "Tata Consultancy"),
        ]);
        search.push_char('t');
        search.push_char('c');
        search.push_char('s');
        assert_eq!(search.filtered().len(), 1);
    }

    #[test]
    fn test_accept_rejects_current_selection() {
        let search = search_with(vec![listing("INFY", "NSE", "Infosys Limited")]);

        // Même couple (symbol, exchange) : pas de sélection
        assert!(search.accept("INFY", "NSE").is_none());

        // Même symbole sur une autre bourse : sélection valide
        let picked = search.accept("INFY", "BSE");
        assert_eq!(picked.map(|s| s.exchange), Some("NSE".to_string()));
    }

    #[test]
    fn test_cursor_clamped_to_filtered_list() {
        let mut search = search_with(vec![
            listing("INFY", "NSE", "Infosys Limited"),
            listing("TCS", "NSE", "Tata Consultancy"),
        ]);
        search.move_down();
        assert_eq!(search.cursor(), 1);
        search.move_down();
        assert_eq!(search.cursor(), 1);

        // Le filtre réduit la liste : le curseur repart à zéro
        search.push_char('i');
        assert_eq!(search.cursor(), 0);
    }

    #[test]
    fn test_error_state_replaces_candidates() {
        let mut search = search_with(vec![listing("INFY", "NSE", "Infosys Limited")]);
        search.set_error("Bourse inconnue".to_string());
        assert!(search.filtered().is_empty());
        assert_eq!(search.error(), Some("Bourse inconnue"));
        assert!(search.accept("", "").is_none());
    }
}
