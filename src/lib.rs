pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod events;
pub mod job_engine;
pub mod models;
pub mod monitoring;
pub mod web;
