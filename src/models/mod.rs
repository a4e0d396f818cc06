// ============================================================================
// Module : models
// ============================================================================
// Structures de données : intervalles, lignes OHLCV normalisées,
// métadonnées de titres et d'indicateurs.
// ============================================================================

pub mod indicator; // Métadonnées et sélection d'indicateurs
pub mod interval; // Intervalle d'échantillonnage
pub mod row; // Ligne OHLCV canonique
pub mod stock; // Listings et infos de titres

// Re-export des structures principales pour simplifier les imports
pub use indicator::{
    encode_indicator_request, requested_indicator_ids, IndicatorMetadata, IndicatorParam,
    IndicatorSelection,
};
pub use interval::{Interval, CANONICAL_ORDER};
pub use row::OhlcRow;
pub use stock::{DateRange, StockInfo, StockListing, StockMetadata};
