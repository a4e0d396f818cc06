// ============================================================================
// Sélecteur : indicateurs techniques
// ============================================================================
// État de l'overlay d'indicateurs : une ligne par indicateur déclaré
// par le serveur (toggle on/off), et pour les indicateurs activés,
// l'édition des paramètres numériques initialisés aux défauts déclarés.
//
// Invariant : les clés de sélection sont toujours un sous-ensemble des
// ids des métadonnées les plus récentes. Un re-fetch des métadonnées
// préserve l'état des indicateurs qui survivent et jette les autres.
// ============================================================================

use std::collections::BTreeMap;

use crate::models::{
    encode_indicator_request, requested_indicator_ids, IndicatorMetadata, IndicatorSelection,
};

/// Édition en cours d'un paramètre de l'indicateur sous le curseur
#[derive(Debug)]
struct ParamEdit {
    param_index: usize,
    buffer: String,
}

/// État du sélecteur d'indicateurs
#[derive(Debug, Default)]
pub struct IndicatorPicker {
    /// Métadonnées telles que déclarées par le serveur, dans son ordre
    metadata: Vec<IndicatorMetadata>,

    /// Sélection par id, seulement pour les indicateurs utilisables
    selections: BTreeMap<String, IndicatorSelection>,

    /// Curseur sur la liste des métadonnées
    cursor: usize,

    /// Paramètre en cours d'édition, le cas échéant
    editing: Option<ParamEdit>,
}

impl IndicatorPicker {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Métadonnées
    // ========================================================================

    /// Remplace les métadonnées par le résultat d'un fetch
    ///
    /// Les sélections des ids qui survivent sont préservées ; les ids
    /// disparus sont jetés (les clés restent un sous-ensemble des ids
    /// déclarés). Un indicateur à id vide n'a jamais de sélection.
    pub fn set_metadata(&mut self, metadata: Vec<IndicatorMetadata>) {
        let mut next: BTreeMap<String, IndicatorSelection> = BTreeMap::new();
        for meta in &metadata {
            if !meta.is_usable() {
                continue;
            }
            let selection = self
                .selections
                .remove(&meta.id)
                .unwrap_or_else(|| IndicatorSelection::from_metadata(meta));
            next.insert(meta.id.clone(), selection);
        }
        self.selections = next;
        self.metadata = metadata;
        self.cursor = 0;
        self.editing = None;
    }

    pub fn metadata(&self) -> &[IndicatorMetadata] {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn selection(&self, id: &str) -> Option<&IndicatorSelection> {
        self.selections.get(id)
    }

    pub fn selections(&self) -> &BTreeMap<String, IndicatorSelection> {
        &self.selections
    }

    // ========================================================================
    // Navigation et toggle
    // ========================================================================

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.editing = None;
    }

    pub fn move_down(&mut self) {
        let max_index = self.metadata.len().saturating_sub(1);
        self.cursor = (self.cursor + 1).min(max_index);
        self.editing = None;
    }

    pub fn highlighted(&self) -> Option<&IndicatorMetadata> {
        self.metadata.get(self.cursor)
    }

    /// Active/désactive l'indicateur sous le curseur
    ///
    /// No-op sur un indicateur inutilisable (id vide) : il reste grisé
    /// dans l'UI et hors de l'encodage.
    pub fn toggle_highlighted(&mut self) {
        let Some(meta) = self.metadata.get(self.cursor) else {
            return;
        };
        if !meta.is_usable() {
            return;
        }
        if let Some(selection) = self.selections.get_mut(&meta.id) {
            selection.enabled = !selection.enabled;
        }
        self.editing = None;
    }

    // ========================================================================
    // Édition de paramètres
    // ========================================================================

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn edit_buffer(&self) -> Option<&str> {
        self.editing.as_ref().map(|e| e.buffer.as_str())
    }

    /// Index et nom du paramètre en cours d'édition
    pub fn editing_param(&self) -> Option<(usize, &str)> {
        let edit = self.editing.as_ref()?;
        let meta = self.metadata.get(self.cursor)?;
        let selection = self.selections.get(&meta.id)?;
        let param = selection.params.get(edit.param_index)?;
        Some((edit.param_index, param.name.as_str()))
    }

    /// Entre en édition du paramètre suivant de l'indicateur courant
    ///
    /// Cycle sur les paramètres ; no-op si l'indicateur est désactivé
    /// ou sans paramètre.
    pub fn edit_next_param(&mut self) {
        let Some(meta) = self.metadata.get(self.cursor) else {
            return;
        };
        let Some(selection) = self.selections.get(&meta.id) else {
            return;
        };
        if !selection.enabled || selection.params.is_empty() {
            return;
        }
        let next_index = match &self.editing {
            Some(edit) => (edit.param_index + 1) % selection.params.len(),
            None => 0,
        };
        self.editing = Some(ParamEdit {
            param_index: next_index,
            buffer: String::new(),
        });
    }

    /// Ajoute un caractère au buffer d'édition (chiffres, '.', '-')
    pub fn push_edit_char(&mut self, c: char) {
        if let Some(edit) = self.editing.as_mut() {
            if c.is_ascii_digit() || c == '.' || c == '-' {
                edit.buffer.push(c);
            }
        }
    }

    pub fn backspace_edit(&mut self) {
        if let Some(edit) = self.editing.as_mut() {
            edit.buffer.pop();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Valide le buffer d'édition comme nouvelle valeur du paramètre
    ///
    /// Un buffer non numérique (ou vide) annule l'édition sans toucher
    /// à la valeur courante.
    pub fn commit_edit(&mut self) {
        let Some(edit) = self.editing.take() else {
            return;
        };
        let Ok(value) = edit.buffer.trim().parse::<f64>() else {
            return;
        };
        if !value.is_finite() {
            return;
        }
        let Some(meta) = self.metadata.get(self.cursor) else {
            return;
        };
        if let Some(selection) = self.selections.get_mut(&meta.id) {
            if let Some(param) = selection.params.get_mut(edit.param_index) {
                param.value = value;
            }
        }
    }

    // ========================================================================
    // Encodage de la requête
    // ========================================================================

    /// Paramètre `indicators=` de /data ; None quand rien n'est activé
    pub fn encode_request(&self) -> Option<String> {
        encode_indicator_request(&self.selections)
    }

    /// Ids de requête activés (clés de canaux et de colonnes)
    pub fn requested_ids(&self) -> Vec<String> {
        requested_indicator_ids(&self.selections)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndicatorParam;

    fn sma() -> IndicatorMetadata {
        IndicatorMetadata {
            id: "SMA".to_string(),
            name: "Simple Moving Average".to_string(),
            default_params: vec![IndicatorParam {
                name: "length".to_string(),
                value: 20.0,
            }],
        }
    }

    fn ema() -> IndicatorMetadata {
        IndicatorMetadata {
            id: "EMA".to_string(),
            name: "Exponential Moving Average".to_string(),
            default_params: vec![IndicatorParam {
                name: "length".to_string(),
                value: 50.0,
            }],
        }
    }

    fn malformed() -> IndicatorMetadata {
        IndicatorMetadata {
            id: String::new(),
            name: "Broken".to_string(),
            default_params: Vec::new(),
        }
    }

    #[test]
    fn test_toggle_and_encode() {
        let mut picker = IndicatorPicker::new();
        picker.set_metadata(vec![sma(), ema()]);
        assert_eq!(picker.encode_request(), None);

        picker.toggle_highlighted(); // SMA au curseur 0
        assert_eq!(picker.encode_request(), Some("SMA_20".to_string()));
        assert_eq!(picker.requested_ids(), vec!["SMA_20".to_string()]);

        picker.toggle_highlighted();
        assert_eq!(picker.encode_request(), None);
    }

    #[test]
    fn test_malformed_metadata_is_inert() {
        let mut picker = IndicatorPicker::new();
        picker.set_metadata(vec![malformed(), sma()]);

        // Pas de sélection pour l'id vide, le toggle est un no-op
        assert!(picker.selection("").is_none());
        picker.toggle_highlighted();
        assert_eq!(picker.encode_request(), None);
    }

    #[test]
    fn test_refetch_preserves_surviving_selections() {
        let mut picker = IndicatorPicker::new();
        picker.set_metadata(vec![sma(), ema()]);
        picker.toggle_highlighted(); // active SMA

        // Re-fetch : EMA disparaît, SMA survit avec son état
        picker.set_metadata(vec![sma()]);
        assert!(picker.selection("SMA").map(|s| s.enabled) == Some(true));
        assert!(picker.selection("EMA").is_none());
        assert_eq!(picker.encode_request(), Some("SMA_20".to_string()));
    }

    #[test]
    fn test_param_edit_updates_encoding() {
        let mut picker = IndicatorPicker::new();
        picker.set_metadata(vec![sma()]);
        picker.toggle_highlighted();

        picker.edit_next_param();
        assert!(picker.is_editing());
        picker.push_edit_char('5');
        picker.push_edit_char('0');
        picker.commit_edit();

        assert!(!picker.is_editing());
        assert_eq!(picker.encode_request(), Some("SMA_50".to_string()));
    }

    #[test]
    fn test_invalid_edit_keeps_previous_value() {
        let mut picker = IndicatorPicker::new();
        picker.set_metadata(vec![sma()]);
        picker.toggle_highlighted();

        picker.edit_next_param();
        picker.push_edit_char('-');
        picker.push_edit_char('.');
        picker.commit_edit();

        assert_eq!(picker.encode_request(), Some("SMA_20".to_string()));
    }

    #[test]
    fn test_edit_requires_enabled_indicator() {
        let mut picker = IndicatorPicker::new();
        picker.set_metadata(vec![sma()]);

        // Indicateur désactivé : pas d'édition possible
        picker.edit_next_param();
        assert!(!picker.is_editing());
    }
}
