//! Tools exposed to worker units

pub mod fii_data;

pub use fii_data::{FII_DATA_TOOL, FiiDataTool};
