//! Logscope Core Module
//!
//! The core module holds the pure parts of the log query pipeline: the data
//! model, the search-syntax translator, response normalisation and the
//! volume histogram. Nothing here performs I/O.

pub mod model;
pub mod normalize;
pub mod translator;
pub mod volume;
pub mod wire;

pub use model::{HistogramBucket, Labels, LogRecord, RawEntry, SearchExpression, Severity};
pub use normalize::{normalize, normalize_with_report, EntryDefect, NormalizeReport, PartialParseError};
pub use translator::{translate, translate_with_advisories, Advisory, Translation};
pub use volume::{bucket_width, bucketize};
pub use wire::{entries_from_value, next_cursor};
