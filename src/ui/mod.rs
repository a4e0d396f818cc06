// ============================================================================
// Module : ui
// ============================================================================
// Gère toute l'interface utilisateur (Terminal User Interface)
// ============================================================================

pub mod chart; // Rendu du graphique (chandeliers, volume, indicateurs)
pub mod dashboard; // Rendu de l'interface principale et des overlays
pub mod events; // Gestion des événements clavier

// Re-exports pour simplifier les imports
pub use dashboard::render;
pub use events::{Event, EventHandler};
