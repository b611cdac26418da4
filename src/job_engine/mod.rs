//! Background job engine: admission, dequeue ordering, retry and execution
//!
//! The engine is deliberately split along its decision boundaries:
//! - [`admission`] decides whether new work may enter the queue at all
//! - [`types`] owns the dequeue ordering comparator
//! - [`retry`] owns the backoff schedule as a pure function
//! - [`executor`] is the seam where domain work plugs in
//! - [`processor`] drives claim/execute/settle against the job store

pub mod admission;
pub mod executor;
pub mod processor;
pub mod retry;
pub mod types;

pub use admission::{AllowAllAuthorizer, JobScheduler, ResourceAuthorizer};
pub use executor::{AnalysisExecutor, NoopExecutor, ProgressHandle};
pub use processor::QueueProcessor;
pub use retry::{RetryDecision, RetryPolicy};
pub use types::dequeue_order;
