//! HTTP handlers, grouped by API area

pub mod events;
pub mod health;
pub mod jobs;
pub mod monitoring;
