//! Schema migrations.
//!
//! The SQL files under `migrations/` are embedded at build time, so an
//! installed binary migrates its database without the source tree.

use sqlx::migrate::Migrator;
use sqlx::{Pool, Sqlite};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies every embedded migration that has not run yet.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), anyhow::Error> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
