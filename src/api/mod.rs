// ============================================================================
// Module : api
// ============================================================================
// Client HTTP du backend de données boursières, sa taxonomie d'erreurs
// et sa politique de retry.
// ============================================================================

pub mod client; // Client des endpoints /api/stocks/*
pub mod error; // Taxonomie d'erreurs
pub mod retry; // Backoff exponentiel plafonné

// Re-export des types principaux
pub use client::StockApi;
pub use error::ApiError;
pub use retry::RetryConfig;
