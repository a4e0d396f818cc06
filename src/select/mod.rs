// ============================================================================
// Module select : états des trois sélecteurs
// ============================================================================

pub mod indicator; // Toggle + paramètres des indicateurs
pub mod interval; // Intersection supportés serveur / ordre canonique
pub mod symbol; // Recherche filtrée de symbole

pub use indicator::IndicatorPicker;
pub use interval::IntervalSelector;
pub use symbol::SymbolSearch;
