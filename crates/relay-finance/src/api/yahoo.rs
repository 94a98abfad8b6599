//! Yahoo Finance quote source

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use yahoo_finance_api as yahoo;

use crate::error::{FinanceError, Result};

/// Latest trading day of a fund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSnapshot {
    pub name: Option<String>,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Trailing twelve-month dividends over the last close
    pub dividend_yield: Option<f64>,
}

/// Where fund snapshots come from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Snapshot for an exchange symbol such as `HGLG11.SA`
    async fn fund_snapshot(&self, symbol: &str) -> Result<FundSnapshot>;
}

/// Yahoo Finance backed [`QuoteSource`]
#[derive(Debug, Default, Clone)]
pub struct YahooQuoteSource;

impl YahooQuoteSource {
    pub fn new() -> Self {
        Self
    }

    async fn fund_name(provider: &yahoo::YahooConnector, symbol: &str) -> Option<String> {
        let found = provider.search_ticker(symbol).await.ok()?;
        found
            .quotes
            .into_iter()
            .find(|item| item.symbol.eq_ignore_ascii_case(symbol))
            .map(|item| item.long_name)
            .filter(|name| !name.trim().is_empty())
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn fund_snapshot(&self, symbol: &str) -> Result<FundSnapshot> {
        let provider =
            yahoo::YahooConnector::new().map_err(|e| FinanceError::YahooFinance(e.to_string()))?;

        let response = provider
            .get_quote_range(symbol, "1d", "1y")
            .await
            .map_err(|e| FinanceError::YahooFinance(e.to_string()))?;
        let quote = response
            .last_quote()
            .map_err(|_| FinanceError::NoData(symbol.to_string()))?;

        let dividends: f64 = response
            .dividends()
            .map(|ds| ds.iter().map(|d| d.amount).sum())
            .unwrap_or(0.0);
        let dividend_yield = (quote.close > 0.0).then(|| dividends / quote.close);

        let name = Self::fund_name(&provider, symbol).await;
        debug!(symbol, close = quote.close, "fetched fund snapshot");

        Ok(FundSnapshot {
            name,
            close: quote.close,
            high: quote.high,
            low: quote.low,
            dividend_yield,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_hglg11() {
        let snapshot = YahooQuoteSource::new().fund_snapshot("HGLG11.SA").await.unwrap();
        assert!(snapshot.close.is_finite() && snapshot.close > 0.0);
        assert!(snapshot.low <= snapshot.high);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_unknown_symbol_fails() {
        assert!(YahooQuoteSource::new().fund_snapshot("INVALID1.SA").await.is_err());
    }
}
