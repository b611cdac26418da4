//! Domain models for the audit engine
//!
//! These are the shapes the rest of the application works with; the SeaORM
//! entities under `crate::entities` are the persisted representation and the
//! repositories translate between the two.

pub mod job;
pub mod monitoring;

pub use job::*;
pub use monitoring::*;
