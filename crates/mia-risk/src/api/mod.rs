//! Provider interaction layer: errors, retry, routing, and correlation ids.
//!
//! - [`error`] — [`ModelError`] with rate-limit detection (429,
//!   `RESOURCE_EXHAUSTED`, retry-info details) and delay hints.
//! - [`retry`] — the bounded attempt loop with hinted or linear backoff.
//!   Never retries anything but rate limits.
//! - [`router`] — [`ModelRouting`] from [`ModelKind`](crate::runtime::ModelKind)
//!   to an OpenRouter model name.
//! - [`tracing`] — execution ids for log correlation.

pub mod error;
pub mod retry;
pub mod router;
pub mod tracing;

// Re-export commonly used items at the module level.
pub use error::{ErrorDetail, ModelError};
pub use retry::{InvocationOutcome, RetryConfig, RetryingInvoker};
pub use router::ModelRouting;
pub use tracing::generate_execution_id;
