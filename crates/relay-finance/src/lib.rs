//! Brazilian real estate fund (FII) data and demo pipelines
//!
//! This crate provides:
//!
//! - `get_fii_data`, a tool returning market data for comma-separated FII
//!   tickers, backed by Yahoo Finance with a TTL cache and a rate limiter
//! - Ready-made pipelines built on it: research, FII advisor, and the
//!   copywriting workers with their delegating host
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_finance::{FiiDataTool, FinanceConfig, pipelines::fii_advisor_pipeline};
//! use relay_runtime::UnitRuntime;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = UnitRuntime::from_settings(&relay_utils::Settings::from_env()?)?;
//!     let tool = Arc::new(FiiDataTool::yahoo(FinanceConfig::default())?);
//!
//!     let pipeline = fii_advisor_pipeline(&runtime, tool)?;
//!     let run = pipeline.run("FIIs de logística com bom dividend yield").await;
//!     println!("{}", run.output_text());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipelines;
pub mod tools;

pub use api::{FundSnapshot, QuoteSource, YahooQuoteSource};
pub use cache::QuoteCache;
pub use config::FinanceConfig;
pub use error::{FinanceError, Result};
pub use tools::{FII_DATA_TOOL, FiiDataTool};
