// ============================================================================
// Client API : données boursières
// ============================================================================
// Client HTTP du backend de données (indicateurs disponibles, infos de
// titre, lignes OHLCV, liste de symboles).
//
// L'URL de base et la politique de retry sont injectées via Config à la
// construction. Les erreurs de connectivité (transport, 5xx) sont
// retentées avec backoff plafonné ; les 4xx remontent telles quelles.
// ============================================================================

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, RetryConfig};
use crate::config::Config;
use crate::format;
use crate::models::{
    DateRange, IndicatorMetadata, Interval, OhlcRow, StockInfo, StockListing, StockMetadata,
};

/// Client du backend de données boursières
#[derive(Debug, Clone)]
pub struct StockApi {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

// ============================================================================
// Structures du fil (wire)
// ============================================================================
// Elles matchent le JSON du serveur ; la conversion vers les modèles du
// crate se fait immédiatement après désérialisation.
// ============================================================================

#[derive(Debug, Deserialize)]
struct IndicatorMetaWire {
    /// Tolère un id absent : l'indicateur sera inutilisable mais listé
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    default_params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StockInfoWire {
    metadata: StockMetadata,
    #[serde(default)]
    supported_intervals: Option<Vec<String>>,
    /// Le serveur nomme la clé `date_range_{interval}` : capturée ici
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DataResponseWire {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorBodyWire {
    #[serde(default)]
    description: Option<String>,
}

impl StockApi {
    /// Construit le client depuis la configuration injectée
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lazychart/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Connectivity(format!("création du client HTTP : {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
        })
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// GET /api/stocks/available-indicators
    ///
    /// Fetchée une fois au démarrage (avec backoff si l'API ne répond
    /// pas encore), puis en lecture seule.
    #[instrument(skip(self))]
    pub async fn available_indicators(&self) -> Result<Vec<IndicatorMetadata>, ApiError> {
        let url = format!("{}/api/stocks/available-indicators", self.base_url);
        let wire: Vec<IndicatorMetaWire> = self.get_json(&url, &[]).await?;

        let list: Vec<IndicatorMetadata> = wire
            .into_iter()
            .map(|w| {
                let id = w.id.unwrap_or_default();
                let default_params = w
                    .default_params
                    .as_ref()
                    .map(IndicatorMetadata::parse_default_params)
                    .unwrap_or_default();
                IndicatorMetadata {
                    name: w.name.unwrap_or_else(|| id.clone()),
                    id,
                    default_params,
                }
            })
            .collect();

        info!(count = list.len(), "Indicateurs disponibles reçus");
        Ok(list)
    }

    /// GET /api/stocks/{exchange}/{symbol}/info?interval={I}
    #[instrument(skip(self))]
    pub async fn stock_info(
        &self,
        exchange: &str,
        symbol: &str,
        interval: Interval,
    ) -> Result<StockInfo, ApiError> {
        let url = format!("{}/api/stocks/{}/{}/info", self.base_url, exchange, symbol);
        let query = [("interval", interval.code().to_string())];
        let wire: StockInfoWire = self.get_json(&url, &query).await?;

        // Fallback défensif : un /info sans supported_intervals donne
        // quand même un sélecteur utilisable (daily seul)
        let supported_intervals = match wire.supported_intervals {
            Some(list) if !list.is_empty() => list,
            _ => {
                warn!("supported_intervals absent : fallback [1D]");
                vec!["1D".to_string()]
            }
        };

        let range_key = format!("date_range_{}", interval.code());
        let date_range = wire.extra.get(&range_key).and_then(parse_date_range);

        info!(
            symbol = %wire.metadata.symbol,
            intervals = supported_intervals.len(),
            has_range = date_range.is_some(),
            "Infos du titre reçues"
        );

        Ok(StockInfo {
            metadata: wire.metadata,
            supported_intervals,
            date_range,
        })
    }

    /// GET /api/stocks/{exchange}/{symbol}/data?...
    ///
    /// `indicator_encoding` est la chaîne `SMA_20,MACD_12_26_9` produite
    /// par `encode_indicator_request` ; omise quand None. Les lignes
    /// brutes passent par la normalisation avant de sortir d'ici.
    #[instrument(skip(self, requested_indicators, indicator_encoding))]
    pub async fn stock_data(
        &self,
        exchange: &str,
        symbol: &str,
        interval: Interval,
        start_date: &str,
        end_date: &str,
        requested_indicators: &[String],
        indicator_encoding: Option<&str>,
    ) -> Result<Vec<OhlcRow>, ApiError> {
        let url = format!("{}/api/stocks/{}/{}/data", self.base_url, exchange, symbol);
        let mut query = vec![
            ("interval", interval.code().to_string()),
            ("start_date", start_date.to_string()),
            ("end_date", end_date.to_string()),
        ];
        if let Some(encoding) = indicator_encoding {
            query.push(("indicators", encoding.to_string()));
        }

        let wire: DataResponseWire = self.get_json(&url, &query).await?;
        let rows = format::normalize_rows(&wire.data, requested_indicators);
        info!(raw = wire.data.len(), normalized = rows.len(), "Lignes OHLCV reçues");
        Ok(rows)
    }

    /// GET /api/stocks/list?exchange={E}
    #[instrument(skip(self))]
    pub async fn stock_list(&self, exchange: &str) -> Result<Vec<StockListing>, ApiError> {
        let url = format!("{}/api/stocks/list", self.base_url);
        let query = [("exchange", exchange.to_string())];
        let list: Vec<StockListing> = self.get_json(&url, &query).await?;
        info!(count = list.len(), exchange, "Liste de symboles reçue");
        Ok(list)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// GET générique avec retry sur les erreurs de connectivité
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut attempt = 0u32;
        loop {
            match self.get_json_once(url, query).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(url, attempt, ?delay, error = %err, "Retry après erreur de connectivité");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Une tentative, sans retry
    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Connectivity(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ApiError::Connectivity(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            // Convention d'erreur : corps {"description": ...} optionnel,
            // sinon la ligne de statut fait office de message
            let message = response
                .json::<ErrorBodyWire>()
                .await
                .ok()
                .and_then(|body| body.description)
                .unwrap_or_else(|| status.to_string());
            return Err(ApiError::Request {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

/// Parse un objet `{min_time, max_time}` (ISO ou epoch) en DateRange
fn parse_date_range(raw: &Value) -> Option<DateRange> {
    let obj = raw.as_object()?;
    let min_secs = format::parse_time_value(obj.get("min_time")?)?;
    let max_secs = format::parse_time_value(obj.get("max_time")?)?;
    Some(DateRange {
        min_time: chrono::DateTime::from_timestamp(min_secs, 0)?,
        max_time: chrono::DateTime::from_timestamp(max_secs, 0)?,
    })
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_date_range_iso() {
        let raw = json!({"min_time": "2015-01-01T00:00:00", "max_time": "2024-01-05"});
        let range = parse_date_range(&raw).unwrap();
        assert_eq!(range.min_time.timestamp(), 1420070400);
        assert_eq!(range.max_time.timestamp(), 1704412800);
    }

    #[test]
    fn test_parse_date_range_missing_bound() {
        assert!(parse_date_range(&json!({"min_time": "2015-01-01"})).is_none());
        assert!(parse_date_range(&json!(null)).is_none());
    }

    #[test]
    fn test_indicator_wire_tolerates_missing_id() {
        // Métadonnées malformées : id absent -> id vide, listé mais
        // inutilisable (voir IndicatorMetadata::is_usable)
        let wire: IndicatorMetaWire =
            serde_json::from_value(json!({"name": "Mystère", "default_params": {"length": 9}}))
                .unwrap();
        assert!(wire.id.is_none());
        let params = IndicatorMetadata::parse_default_params(wire.default_params.as_ref().unwrap());
        assert_eq!(params[0].value, 9.0);
    }
}
