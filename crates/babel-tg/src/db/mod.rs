pub(crate) mod users;

mod cfg;
mod scope;

use crate::prelude::*;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub(crate) use cfg::Config;
pub(crate) use scope::UpdateScope;

pub(crate) type Pool = sqlx::PgPool;

#[derive(Debug, Error)]
pub(crate) enum DbError {
    #[error("Failed to connect to the database")]
    Connect { source: sqlx::Error },

    #[error("Failed to apply the database migrations")]
    Migrate { source: sqlx::migrate::MigrateError },

    #[error("Failed to begin a database transaction")]
    Begin { source: sqlx::Error },

    #[error("Failed to commit the database transaction")]
    Commit { source: sqlx::Error },

    #[error("Failed to roll back the database transaction")]
    Rollback { source: sqlx::Error },

    #[error("Database query failed")]
    Query { source: sqlx::Error },

    #[error("Unknown user role stored in the database: {role}")]
    UnknownRole { role: String },
}

/// Connects to the database eagerly and brings the schema up to date.
/// This happens before the first update is accepted, so a misconfigured
/// database fails the startup instead of the updates.
pub(crate) async fn init(cfg: Config) -> Result<Pool> {
    info!(conninfo = %cfg.redacted_conninfo(), "Connecting to the database...");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.pool_size)
        .connect(cfg.conninfo().as_str())
        .await
        .map_err(err_ctx!(DbError::Connect))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(err_ctx!(DbError::Migrate))?;

    info!("Database is ready");

    Ok(pool)
}

/// Waits until the connections checked out by in-flight updates are
/// returned, then closes them.
pub(crate) async fn close(pool: Pool) {
    info!("Draining the database connection pool...");
    pool.close().await;
}
