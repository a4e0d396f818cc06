// ============================================================================
// Sélecteur : intervalle d'échantillonnage
// ============================================================================
// Le serveur déclare l'ensemble des intervalles supportés par action ;
// le sélecteur n'affiche que l'intersection avec les intervalles connus,
// dans l'ordre canonique d'affichage, jamais dans l'ordre du serveur.
//
// Intersection vide : le sélecteur affiche un placeholder explicite,
// jamais un contrôle vide silencieusement cassé.
// ============================================================================

use crate::models::{Interval, CANONICAL_ORDER};

/// Intervalles proposables pour l'action courante
#[derive(Debug, Default)]
pub struct IntervalSelector {
    /// Intersection (supportés serveur ∩ connus), en ordre canonique
    available: Vec<Interval>,
}

impl IntervalSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construit le sélecteur depuis les codes déclarés par /info
    ///
    /// Les codes inconnus sont ignorés sans erreur : ils sont juste
    /// absents du sélecteur.
    pub fn from_codes(codes: &[String]) -> Self {
        let declared: Vec<Interval> =
            codes.iter().filter_map(|c| Interval::from_code(c)).collect();
        let available = CANONICAL_ORDER
            .iter()
            .copied()
            .filter(|interval| declared.contains(interval))
            .collect();
        Self { available }
    }

    pub fn available(&self) -> &[Interval] {
        &self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    pub fn contains(&self, interval: Interval) -> bool {
        self.available.contains(&interval)
    }

    /// Force l'intervalle courant dans l'ensemble supporté
    ///
    /// Un intervalle devenu non supporté après changement d'action est
    /// remplacé par le défaut (ou le premier supporté si le défaut ne
    /// l'est pas non plus).
    pub fn resolve(&self, current: Interval) -> Interval {
        if self.contains(current) {
            return current;
        }
        let fallback = Interval::default();
        if self.contains(fallback) {
            return fallback;
        }
        self.available.first().copied().unwrap_or(fallback)
    }

    /// Intervalle suivant dans le cycle (touche ])
    pub fn cycle_next(&self, current: Interval) -> Interval {
        self.cycle(current, 1)
    }

    /// Intervalle précédent dans le cycle (touche [)
    pub fn cycle_previous(&self, current: Interval) -> Interval {
        self.cycle(current, -1)
    }

    fn cycle(&self, current: Interval, direction: isize) -> Interval {
        if self.available.is_empty() {
            return current;
        }
        let len = self.available.len() as isize;
        let position = self
            .available
            .iter()
            .position(|&i| i == current)
            .map(|p| p as isize)
            .unwrap_or(0);
        let next = (position + direction).rem_euclid(len) as usize;
        self.available[next]
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intersection_in_canonical_order() {
        // Le serveur déclare dans le désordre : l'affichage suit l'ordre
        // canonique 1D, 1W, 1M, 1H, 15M, 5M
        let selector = IntervalSelector::from_codes(&codes(&["1M", "1D", "1W"]));
        assert_eq!(
            selector.available(),
            &[Interval::D1, Interval::W1, Interval::M1]
        );
    }

    #[test]
    fn test_unknown_codes_are_ignored() {
        let selector = IntervalSelector::from_codes(&codes(&["1D", "3H", "42X"]));
        assert_eq!(selector.available(), &[Interval::D1]);
    }

    #[test]
    fn test_empty_intersection() {
        let selector = IntervalSelector::from_codes(&codes(&["3H"]));
        assert!(selector.is_empty());
        // Le cycle est un no-op sur un ensemble vide
        assert_eq!(selector.cycle_next(Interval::D1), Interval::D1);
    }

    #[test]
    fn test_resolve_resets_unsupported_interval() {
        let selector = IntervalSelector::from_codes(&codes(&["1D", "1W"]));
        assert_eq!(selector.resolve(Interval::W1), Interval::W1);
        // 1H non supporté : retour au défaut 1D
        assert_eq!(selector.resolve(Interval::H1), Interval::D1);

        // Défaut non supporté non plus : premier disponible
        let selector = IntervalSelector::from_codes(&codes(&["1W", "1M"]));
        assert_eq!(selector.resolve(Interval::H1), Interval::W1);
    }

    #[test]
    fn test_cycle_wraps_around() {
        let selector = IntervalSelector::from_codes(&codes(&["1D", "1W", "1M"]));
        assert_eq!(selector.cycle_next(Interval::D1), Interval::W1);
        assert_eq!(selector.cycle_next(Interval::M1), Interval::D1);
        assert_eq!(selector.cycle_previous(Interval::D1), Interval::M1);
    }
}
