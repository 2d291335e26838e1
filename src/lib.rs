//! Logscope: log search and volume queries
//!
//! This crate drives the query pipeline provided by the workspace members:
//! it accepts inbound queries, runs them through translation, caching,
//! fetching, normalisation and bucketing, and returns tabular frames.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod frame;
pub mod logging;
pub mod query;
pub mod suggestions;

// Re-export the executor surface
pub use executor::{ExecutorSettings, QueryExecutor, QueryResponse};
pub use query::{QueryKind, QueryModel, QueryRequest, TimeRange};

// Re-export frames and errors
pub use error::{ErrorKind, QueryError};
pub use frame::{logs_frame, volume_frame, Field, FieldType, Frame, FrameMeta};

// Re-export configuration
pub use config::{ConfigLoader, LogscopeConfig};
