//! SeaORM migrations for multi-database support
//!
//! Database-agnostic migrations that work across SQLite, PostgreSQL and
//! MySQL; database-specific column types are selected per backend.

use sea_orm_migration::prelude::*;

pub mod m20260301_000001_initial_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_initial_schema::Migration)]
    }
}
