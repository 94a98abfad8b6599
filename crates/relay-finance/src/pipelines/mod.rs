//! Ready-made pipelines and remote worker services
//!
//! - [`research`]: entity extraction, search and summary
//! - [`fii_advisor`]: FII ticker discovery, market data and a written report
//! - [`copywriter`]: research and content workers behind a delegating host

pub mod copywriter;
pub mod fii_advisor;
pub mod research;

pub use copywriter::{
    CONTENT_PORT, HOST_PORT, RESEARCH_PORT, content_service, host_coordinator, host_service,
    research_service,
};
pub use fii_advisor::fii_advisor_pipeline;
pub use research::research_pipeline;
