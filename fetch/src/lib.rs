//! Logscope Fetch Module
//!
//! Paginated, rate-limit aware retrieval from the logs search API. All
//! outbound calls pass through a shared [`AdmissionGate`]; rate-limited calls
//! back off exponentially and every wait honours a cancellation token.

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod request;
pub mod retry;
pub mod transport;
pub mod transport_fake;

pub use config::FetchConfig;
pub use engine::{FetchEngine, FetchOutcome, Page, SearchWindow, StopReason};
pub use error::FetchError;
pub use gate::{AdmissionGate, GatePermit};
pub use request::LogsSearchRequest;
pub use retry::{cancellable_sleep, RetryPolicy, RetryState};
pub use transport::{Credentials, HttpTransport, LogsTransport};
pub use transport_fake::{FakeReply, FakeTransport};
