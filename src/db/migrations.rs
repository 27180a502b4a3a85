//! Schema migrations, applied in version order at startup. Each one runs in
//! a transaction together with the `schema_migrations` row that records it.

use std::collections::HashSet;

use color_eyre::{eyre::WrapErr, Result};
use sqlx::SqlitePool;

const MIGRATIONS: &[(&str, &str)] = &[("V1", include_str!("../../migrations/V1__init.sql"))];

const LEDGER: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version TEXT PRIMARY KEY,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub async fn run(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(LEDGER).execute(pool).await?;

    let applied: HashSet<String> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    let pending: Vec<_> = MIGRATIONS
        .iter()
        .filter(|(version, _)| !applied.contains(*version))
        .collect();
    if pending.is_empty() {
        tracing::debug!("database schema is up to date");
        return Ok(());
    }

    for (version, sql) in pending {
        apply(pool, version, sql)
            .await
            .wrap_err_with(|| format!("migration {version} failed"))?;
        tracing::info!(version, "applied database migration");
    }

    Ok(())
}

async fn apply(pool: &SqlitePool, version: &str, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(sql).execute(&mut *tx).await?;
    sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
