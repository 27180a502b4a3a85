// Database module - provides data access layer

use std::str::FromStr;

use color_eyre::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

// Re-export models for convenience
pub mod models;
pub use models::*;

// Internal modules
mod activity;
mod answer;
mod course;
mod migrations;
mod question;
mod unit;
mod user;

pub use user::{hash_password, verify_password};

// Main database handle
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        // Verify connection
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?;
        if one != 1 {
            color_eyre::eyre::bail!("database connection check returned {one}");
        }

        migrations::run(&pool).await?;

        tracing::info!("database connection has been verified");

        Ok(Self { pool })
    }

    pub async fn migration_applied(&self, version: &str) -> Result<bool> {
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?)",
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;

        Ok(applied)
    }

    /// The first of `refs` that names no row, checked in field order.
    pub async fn missing_reference(&self, refs: &References) -> Result<Option<MissingReference>> {
        let checks = [
            (refs.student_id, "users", MissingReference::Student),
            (refs.course_id, "courses", MissingReference::Course),
            (refs.unit_id, "units", MissingReference::Unit),
            (refs.assessor_id, "users", MissingReference::Assessor),
        ];

        for (id, table, missing) in checks {
            let Some(id) = id else { continue };
            let exists: bool =
                sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?)"))
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Ok(Some(missing));
            }
        }
        Ok(None)
    }
}

/// Whether a sqlx error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &color_eyre::Report) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}
