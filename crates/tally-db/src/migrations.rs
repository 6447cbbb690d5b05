//! # Database Migrations
//!
//! Schema migrations embedded into the binary at compile time.
//!
//! ## Migration Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Embedded Migrations                             │
//! │                                                                     │
//! │  migrations/sqlite/*.sql  ──(compile time)──►  binary               │
//! │                                                                     │
//! │  Database::new()                                                    │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  run_migrations(pool)                                               │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  _sqlx_migrations table ← applied versions tracked here             │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Pending migrations applied in version order (idempotent)           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// The embedded migrator. Picks up every `.sql` file under
/// `migrations/sqlite/` at the workspace root.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies all pending migrations to the given pool.
///
/// Safe to call on every startup; already-applied versions are skipped.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(
        migrations = MIGRATOR.iter().count(),
        "applying embedded migrations"
    );
    MIGRATOR.run(pool).await?;
    Ok(())
}
