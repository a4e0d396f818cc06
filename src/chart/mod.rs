// ============================================================================
// Module chart : séries tracées et passe de réconciliation
// ============================================================================

pub mod reconcile;
pub mod series;

pub use reconcile::{merge_older_rows, ChartChannels, ReconcileError};
pub use series::{
    CandlePoint, LinePoint, PlottedSeries, VolumePoint, CANDLESTICK_CHANNEL, VOLUME_CHANNEL,
};
