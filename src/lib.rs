// ============================================================================
// LazyChart - Library
// ============================================================================
// Expose les modules publics pour les tests et le binaire
// ============================================================================

pub mod api; // Client HTTP du backend de données
pub mod app; // État de l'application (view controller)
pub mod chart; // Séries tracées et réconciliation
pub mod config; // Configuration (URL du backend, retries)
pub mod format; // Conversions de dates et normalisation des lignes
pub mod models; // Structures de données
pub mod select; // États des sélecteurs
pub mod ui; // Interface utilisateur
