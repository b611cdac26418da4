//! Centralized error handling for the audit engine
//!
//! This module provides a hierarchical error system that unifies error types
//! across all application layers and keeps admission errors (caller-visible)
//! cleanly separated from execution errors (converted into job state
//! transitions inside the worker loop).
//!
//! # Error Categories
//!
//! - **Admission Errors**: surfaced synchronously when a job is enqueued
//! - **Repository Errors**: data access layer failures
//! - **Database Errors**: SeaORM operations, migrations, connections

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;
