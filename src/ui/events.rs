// ============================================================================
// Gestion des événements
// ============================================================================
// Gère les événements clavier et les ticks de l'application.
//
// Le poll à 250ms coalesce naturellement les redessinages : une rafale
// de touches ou de resize ne produit jamais plus d'un rendu par
// itération de la boucle.
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind};

/// Événements de l'application
#[derive(Debug, Clone)]
pub enum Event {
    /// Touche pressée
    Key(KeyEvent),

    /// Tick régulier (timeout du poll, resize, etc.)
    Tick,
}

/// Gestionnaire d'événements
pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    /// Lit le prochain événement (bloquant avec timeout de 250ms)
    ///
    /// Sur certains OS on reçoit Press ET Release ; seul Press est
    /// gardé pour éviter les doublons. Un resize redevient un Tick :
    /// le prochain draw() relit les dimensions du terminal.
    pub fn next(&self) -> Result<Event> {
        if event::poll(Duration::from_millis(250))? {
            match event::read()? {
                CrosstermEvent::Key(key) => {
                    if key.kind == KeyEventKind::Press {
                        Ok(Event::Key(key))
                    } else {
                        Ok(Event::Tick)
                    }
                }
                _ => Ok(Event::Tick),
            }
        } else {
            Ok(Event::Tick)
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helpers : identifier les actions depuis un KeyEvent
// ============================================================================

/// Touche 'q' (quitter, two-step)
pub fn is_quit_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q'))
    } else {
        false
    }
}

/// Touche Échap
pub fn is_escape_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Esc)
    } else {
        false
    }
}

/// Touche Entrée
pub fn is_enter_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Enter)
    } else {
        false
    }
}

/// Touche Espace (toggle d'indicateur)
pub fn is_space_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char(' '))
    } else {
        false
    }
}

/// Flèche haut (navigation dans les overlays)
pub fn is_up_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Up)
    } else {
        false
    }
}

/// Flèche bas
pub fn is_down_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Down)
    } else {
        false
    }
}

/// Flèche gauche ou 'h' (curseur du graphique vers le passé)
pub fn is_left_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Left | KeyCode::Char('h'))
    } else {
        false
    }
}

/// Flèche droite ou 'l' (curseur du graphique vers le présent)
pub fn is_right_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Right | KeyCode::Char('l'))
    } else {
        false
    }
}

/// Touche ']' (intervalle suivant)
pub fn is_next_interval_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char(']'))
    } else {
        false
    }
}

/// Touche '[' (intervalle précédent)
pub fn is_previous_interval_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char('['))
    } else {
        false
    }
}

/// Touche 's' ou '/' (ouvrir la recherche de symbole)
pub fn is_search_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char('s') | KeyCode::Char('/'))
    } else {
        false
    }
}

/// Touche 'i' (ouvrir le sélecteur d'indicateurs)
pub fn is_indicators_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char('i') | KeyCode::Char('I'))
    } else {
        false
    }
}

/// Touche 'o' (charger l'historique plus ancien)
pub fn is_older_history_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char('o') | KeyCode::Char('O'))
    } else {
        false
    }
}

/// Touche Tab (éditer le paramètre suivant de l'indicateur courant)
pub fn is_tab_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Tab)
    } else {
        false
    }
}

/// Touche Backspace
pub fn is_backspace_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Backspace)
    } else {
        false
    }
}

/// Caractère de saisie libre (filtre de recherche, valeur numérique)
pub fn is_text_char_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        matches!(key.code, KeyCode::Char(c)
            if c.is_alphanumeric() || c == '-' || c == '.' || c == ' ' || c == '&')
    } else {
        false
    }
}

/// Extrait le caractère d'un événement clavier si c'est un caractère
pub fn get_char_from_event(event: &Event) -> Option<char> {
    if let Event::Key(key) = event {
        if let KeyCode::Char(c) = key.code {
            return Some(c);
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, event::KeyModifiers::empty()))
    }

    #[test]
    fn test_is_quit_event() {
        assert!(is_quit_event(&key(KeyCode::Char('q'))));
        assert!(!is_quit_event(&key(KeyCode::Char('a'))));
        assert!(!is_quit_event(&Event::Tick));
    }

    #[test]
    fn test_interval_keys() {
        assert!(is_next_interval_event(&key(KeyCode::Char(']'))));
        assert!(is_previous_interval_event(&key(KeyCode::Char('['))));
        assert!(!is_next_interval_event(&key(KeyCode::Char('['))));
    }

    #[test]
    fn test_crosshair_keys() {
        assert!(is_left_event(&key(KeyCode::Char('h'))));
        assert!(is_left_event(&key(KeyCode::Left)));
        assert!(is_right_event(&key(KeyCode::Char('l'))));
    }

    #[test]
    fn test_text_chars() {
        assert!(is_text_char_event(&key(KeyCode::Char('a'))));
        assert!(is_text_char_event(&key(KeyCode::Char('.'))));
        assert!(!is_text_char_event(&key(KeyCode::Enter)));
        assert_eq!(get_char_from_event(&key(KeyCode::Char('x'))), Some('x'));
    }
}
