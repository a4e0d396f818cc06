// ============================================================================
// Backoff exponentiel plafonné
// ============================================================================
// Politique de retry pour les erreurs de connectivité : délai de base
// doublé à chaque tentative, plafonné, nombre de tentatives borné,
// jitter optionnel pour désynchroniser les clients.
//
// Après épuisement des tentatives, l'appelant passe en état d'erreur de
// connexion persistant : plus aucun retry automatique.
// ============================================================================

use std::time::Duration;

/// Configuration du backoff de retry
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Nombre maximum de retries (sans compter la requête initiale)
    pub max_retries: u32,
    /// Délai avant le premier retry
    pub initial_delay: Duration,
    /// Plafond du délai entre deux retries
    pub max_delay: Duration,
    /// Multiplicateur appliqué au délai après chaque retry
    pub backoff_factor: f64,
    /// Ajoute un jitter de ±25% au délai
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Délai pour une tentative donnée (0 = premier retry)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let jitter_range = capped * 0.25;
            let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64) -> RetryConfig {
        RetryConfig {
            max_retries: 4,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_factor: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let config = no_jitter(100, 10_000);
        assert_eq!(config.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(config.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(config.delay_for_attempt(2).as_millis(), 400);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let config = no_jitter(1000, 2000);
        assert_eq!(config.delay_for_attempt(5).as_millis(), 2000);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            jitter: true,
            ..no_jitter(1000, 10_000)
        };
        for _ in 0..50 {
            let d = config.delay_for_attempt(0).as_millis() as f64;
            assert!((750.0..=1250.0).contains(&d), "délai hors plage : {}", d);
        }
    }
}
