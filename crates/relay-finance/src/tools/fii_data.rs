//! Tool for fetching Brazilian real estate fund (FII) data

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use relay_core::Result as RelayResult;
use relay_llm::tools::schema;
use relay_tools::Tool;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::api::{FundSnapshot, QuoteSource, YahooQuoteSource};
use crate::cache::QuoteCache;
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Name the tool is registered under
pub const FII_DATA_TOOL: &str = "get_fii_data";

/// Market data for a comma-separated list of FII tickers
///
/// The result is an object keyed by ticker. Every ticker gets an entry: either
/// a record with prices and dividend yield, or `{ error, ticker }` when the
/// lookup failed. One bad ticker never fails the whole call.
pub struct FiiDataTool {
    source: Arc<dyn QuoteSource>,
    cache: QuoteCache,
    rate_limiter: SharedRateLimiter,
    config: FinanceConfig,
}

#[derive(Debug, Deserialize)]
struct FiiDataParams {
    tickers_string: String,
}

impl FiiDataTool {
    /// Create a tool over any quote source
    pub fn new(config: FinanceConfig, source: Arc<dyn QuoteSource>) -> Result<Self> {
        config.validate()?;
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            FinanceError::Config("requests_per_second must be greater than 0".to_string())
        })?;

        Ok(Self {
            source,
            cache: QuoteCache::new(config.cache_ttl),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            config,
        })
    }

    /// Create a tool backed by Yahoo Finance
    pub fn yahoo(config: FinanceConfig) -> Result<Self> {
        Self::new(config, Arc::new(YahooQuoteSource::new()))
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Split, trim and normalize the ticker list; blanks are skipped
    pub fn parse_tickers(tickers_string: &str) -> Vec<String> {
        tickers_string
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_uppercase)
            .collect()
    }

    fn record(&self, ticker: &str, snapshot: &FundSnapshot) -> Value {
        json!({
            "fund_name": snapshot.name.clone().unwrap_or_else(|| "Unknown".to_string()),
            "current_price": snapshot.close,
            "daily_high": snapshot.high,
            "daily_low": snapshot.low,
            "dividend_yield": snapshot.dividend_yield.unwrap_or(0.0),
            "currency": self.config.currency,
            "ticker": ticker,
        })
    }

    async fn lookup(&self, ticker: &str) -> Result<Value> {
        let symbol = self.config.symbol_for(ticker);
        if let Some(cached) = self.cache.get(&symbol).await {
            debug!(%symbol, "FII cache hit");
            return Ok(cached);
        }

        self.rate_limiter.until_ready().await;
        let snapshot = self.source.fund_snapshot(&symbol).await?;
        if !snapshot.close.is_finite() {
            return Err(FinanceError::NoData(symbol));
        }

        let record = self.record(ticker, &snapshot);
        self.cache.insert(symbol, record.clone()).await;
        Ok(record)
    }

    /// Fetch every ticker, capturing per-ticker failures
    #[instrument(skip(self))]
    pub async fn fetch(&self, tickers_string: &str) -> Value {
        let mut result = Map::new();
        for ticker in Self::parse_tickers(tickers_string) {
            let entry = match self.lookup(&ticker).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(%ticker, error = %e, "FII lookup failed");
                    json!({
                        "error": format!("Failed to retrieve FII information: {e}"),
                        "ticker": ticker,
                    })
                }
            };
            result.insert(ticker, entry);
        }
        Value::Object(result)
    }
}

#[async_trait]
impl Tool for FiiDataTool {
    async fn execute(&self, params: Value) -> RelayResult<Value> {
        let params: FiiDataParams = serde_json::from_value(params)
            .map_err(|e| FinanceError::InvalidParameters(e.to_string()))?;
        Ok(self.fetch(&params.tickers_string).await)
    }

    fn name(&self) -> &str {
        FII_DATA_TOOL
    }

    fn description(&self) -> &str {
        "Retrieve current market data for Brazilian real estate investment funds (FIIs). \
         Returns, per ticker, the fund name, current price, daily high and low, dividend \
         yield and currency."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "tickers_string": schema::string(
                    "FII ticker symbols separated by commas (e.g., 'HGLG11,KNRI11,XPLG11')"
                )
            }),
            &["tickers_string"],
        )
    }

    fn identifying_fields(&self, params: &Value) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(tickers) = params.get("tickers_string") {
            fields.insert("tickers_string".to_string(), tickers.clone());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockQuoteSource;

    fn hglg11() -> FundSnapshot {
        FundSnapshot {
            name: Some("CGHG Logística FII".to_string()),
            close: 160.5,
            high: 161.2,
            low: 159.8,
            dividend_yield: Some(0.087),
        }
    }

    fn mock_source() -> MockQuoteSource {
        let mut mock = MockQuoteSource::new();
        mock.expect_fund_snapshot().returning(|symbol| match symbol {
            "HGLG11.SA" => Ok(hglg11()),
            other => Err(FinanceError::NoData(other.to_string())),
        });
        mock
    }

    fn tool(mock: MockQuoteSource) -> FiiDataTool {
        FiiDataTool::new(FinanceConfig::default(), Arc::new(mock)).unwrap()
    }

    #[test]
    fn test_parse_tickers() {
        assert_eq!(
            FiiDataTool::parse_tickers(" hglg11, ,KNRI11,,xplg11 "),
            vec!["HGLG11", "KNRI11", "XPLG11"]
        );
        assert!(FiiDataTool::parse_tickers(" , ").is_empty());
    }

    #[tokio::test]
    async fn test_valid_and_invalid_ticker() {
        let tool = tool(mock_source());
        let result = tool
            .execute(json!({"tickers_string": "HGLG11,INVALID1"}))
            .await
            .unwrap();

        let entries = result.as_object().unwrap();
        assert_eq!(entries.len(), 2);

        let hglg = &entries["HGLG11"];
        assert!(hglg["current_price"].as_f64().unwrap().is_finite());
        assert_eq!(hglg["currency"], "BRL");
        assert_eq!(hglg["ticker"], "HGLG11");
        assert_eq!(hglg["fund_name"], "CGHG Logística FII");

        let invalid = &entries["INVALID1"];
        let error = invalid["error"].as_str().unwrap();
        assert!(error.starts_with("Failed to retrieve FII information:"));
        assert_eq!(invalid["ticker"], "INVALID1");
    }

    #[tokio::test]
    async fn test_successful_lookups_are_cached() {
        let mut mock = MockQuoteSource::new();
        mock.expect_fund_snapshot().times(1).returning(|_| Ok(hglg11()));
        let tool = tool(mock);

        tool.fetch("HGLG11").await;
        let second = tool.fetch("hglg11.SA").await;
        assert_eq!(second["HGLG11.SA"]["current_price"], 160.5);
        assert_eq!(tool.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_fund_name_and_yield() {
        let mut mock = MockQuoteSource::new();
        mock.expect_fund_snapshot().returning(|_| {
            Ok(FundSnapshot {
                name: None,
                dividend_yield: None,
                ..hglg11()
            })
        });

        let result = tool(mock).fetch("KNRI11").await;
        assert_eq!(result["KNRI11"]["fund_name"], "Unknown");
        assert_eq!(result["KNRI11"]["dividend_yield"], 0.0);
    }

    #[tokio::test]
    async fn test_invalid_parameters() {
        let tool = tool(MockQuoteSource::new());
        assert!(tool.execute(json!({"symbol": "HGLG11"})).await.is_err());
        assert_eq!(
            tool.identifying_fields(&json!({"tickers_string": "X", "other": 1})),
            json!({"tickers_string": "X"}).as_object().unwrap().clone()
        );
    }

    #[test]
    fn test_rejects_zero_rate() {
        let config = FinanceConfig::default().with_requests_per_second(0);
        assert!(FiiDataTool::new(config, Arc::new(MockQuoteSource::new())).is_err());
    }
}
