#![allow(dead_code)]

use layered_store::config::configure_sqlite;
use layered_store::migrations::Migrator;
use sea_orm::Database;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

/// A fresh, migrated SQLite database. Keep the directory alive for as long as the connection is used.
pub async fn sqlite_db() -> (TempDir, DatabaseConnection) {
    let dir = tempfile::Builder::new().prefix("layered-store").tempdir().unwrap();
    let dsn = format!("sqlite://{}?mode=rwc", dir.path().join("store.db").display());

    let db = Database::connect(dsn.as_str()).await.unwrap();
    configure_sqlite(&db).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    (dir, db)
}
