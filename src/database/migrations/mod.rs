//! SeaORM migrations for multi-database support (SQLite/PostgreSQL/MySQL).
//! Additive-only: new migrations add columns/tables, never destructive `ALTER`.

use sea_orm_migration::prelude::*;

pub mod m20260101_000001_initial_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000001_initial_schema::Migration)]
    }
}
