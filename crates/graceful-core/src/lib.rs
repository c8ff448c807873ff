//! Rate-limit aware retries for HTTP operations.
//!
//! An operation is any closure producing a future of one attempt's result.
//! [`retry::RetrySession`] runs it, classifies failed responses for server
//! wait hints, backs off and tries again until success or a terminal error.

pub mod config;
pub mod logging;
pub mod normalize;
pub mod recorder;
pub mod retry;
pub mod transport;
