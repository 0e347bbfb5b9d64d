use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

use crate::config::Config;

const PRAGMAS: [&str; 3] =
    ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL", "PRAGMA foreign_keys=ON"];

/// Opens the pool lazily so an unreachable store does not stop the web surface
/// from starting; failures surface per request instead.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let timeout = Duration::from_secs(config.db_connect_timeout_secs);
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .connect_lazy(true)
        .sqlx_logging(false);
    Database::connect(options).await
}

pub async fn prepare(db: &DatabaseConnection) -> Result<(), DbErr> {
    for pragma in PRAGMAS {
        db.execute(Statement::from_string(db.get_database_backend(), pragma.to_string())).await?;
    }
    Migrator::up(db, None).await
}
