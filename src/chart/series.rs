// ============================================================================
// Séries tracées
// ============================================================================
// Types de points consommés par le renderer, un par type de canal.
// Les séries appartiennent exclusivement au réconciliateur
// (ChartChannels) ; aucun autre composant n'en détient de référence.
// ============================================================================

/// Id du canal chandeliers
pub const CANDLESTICK_CHANNEL: &str = "candlestick";

/// Id du canal volume
pub const VOLUME_CHANNEL: &str = "volume";

/// Un point du canal chandeliers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePoint {
    /// Secondes epoch UTC
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Un point du canal volume, avec sa couleur binaire up/down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumePoint {
    pub time: i64,
    pub value: f64,
    /// close >= open sur la ligne d'origine
    pub bullish: bool,
}

/// Un point d'une ligne d'indicateur
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePoint {
    pub time: i64,
    pub value: f64,
}

/// Données d'un canal tracé
#[derive(Debug, Clone, PartialEq)]
pub enum PlottedSeries {
    Candlesticks(Vec<CandlePoint>),
    Volume(Vec<VolumePoint>),
    Line(Vec<LinePoint>),
}

impl PlottedSeries {
    /// Nombre de points du canal
    pub fn len(&self) -> usize {
        match self {
            PlottedSeries::Candlesticks(points) => points.len(),
            PlottedSeries::Volume(points) => points.len(),
            PlottedSeries::Line(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_len() {
        let series = PlottedSeries::Line(vec![
            LinePoint { time: 1, value: 1.0 },
            LinePoint { time: 2, value: 2.0 },
        ]);
        assert_eq!(series.len(), 2);
        assert!(!series.is_empty());
        assert!(PlottedSeries::Volume(Vec::new()).is_empty());
    }
}
