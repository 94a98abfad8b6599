//! Market data sources

pub mod yahoo;

pub use yahoo::{FundSnapshot, QuoteSource, YahooQuoteSource};

#[cfg(test)]
pub use yahoo::MockQuoteSource;
