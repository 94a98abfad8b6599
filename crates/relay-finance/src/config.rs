//! Configuration for market data lookups

use crate::error::{FinanceError, Result};
use std::time::Duration;

/// Configuration for the FII data tool
#[derive(Debug, Clone)]
pub struct FinanceConfig {
    /// Suffix appended to tickers for the exchange (B3 is `.SA`)
    pub exchange_suffix: String,

    /// Currency reported with every record
    pub currency: String,

    /// How long a fetched record is reused
    pub cache_ttl: Duration,

    /// Upstream requests allowed per second
    pub requests_per_second: u32,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            exchange_suffix: ".SA".to_string(),
            currency: "BRL".to_string(),
            cache_ttl: Duration::from_secs(60),
            requests_per_second: 5,
        }
    }
}

impl FinanceConfig {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    pub fn with_exchange(mut self, suffix: impl Into<String>, currency: impl Into<String>) -> Self {
        self.exchange_suffix = suffix.into();
        self.currency = currency.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_second == 0 {
            return Err(FinanceError::Config(
                "requests_per_second must be greater than 0".to_string(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(FinanceError::Config("cache_ttl must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Exchange symbol for a ticker
    pub fn symbol_for(&self, ticker: &str) -> String {
        if ticker.ends_with(&self.exchange_suffix) {
            ticker.to_string()
        } else {
            format!("{ticker}{}", self.exchange_suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FinanceConfig::default().validate().is_ok());
        assert!(FinanceConfig::default().with_requests_per_second(0).validate().is_err());
    }

    #[test]
    fn test_symbol_suffix() {
        let config = FinanceConfig::default();
        assert_eq!(config.symbol_for("HGLG11"), "HGLG11.SA");
        assert_eq!(config.symbol_for("HGLG11.SA"), "HGLG11.SA");
    }
}
