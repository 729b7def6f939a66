//! Postgres connection pool, per-statement timeouts, error mapping and
//! embedded migrations.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation on `users_email_key`) | `23505` | `DuplicateEmail` | E-mail already registered |
//! | Database (other) | Any other | `Storage` | Constraint/check failures, bad SQL |
//! | RowNotFound | N/A | `NotFound` | `fetch_one` matched nothing |
//! | PoolTimedOut | N/A | `Timeout` | No connection within the acquire timeout |
//! | Other | N/A | `Storage` | Network errors, decode failures, etc. |

use std::future::Future;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::StoreError;

/// Upper bound on any single statement.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub dsn: String,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub query_timeout: Duration,
}

impl DbConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            max_connections: 25,
            idle_timeout: Duration::from_secs(15 * 60),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Open the pool and verify connectivity.
pub async fn connect(config: &DbConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.query_timeout)
        .connect(&config.dsn)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    tracing::info!(max_connections = config.max_connections, "database connection pool established");
    Ok(pool)
}

/// Run `fut` under `timeout`, mapping both sqlx failures and expiry.
///
/// A statement cut off by the timeout has whatever effect the backend gives
/// an aborted statement; nothing here compensates.
pub async fn bounded<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| map_sqlx_error(operation, e)),
        Err(_elapsed) => Err(StoreError::Timeout(operation)),
    }
}

pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut => StoreError::Timeout(operation),
        sqlx::Error::Database(db_err) => {
            let unique_violation = db_err.code().as_deref() == Some("23505");
            if unique_violation && db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) {
                StoreError::DuplicateEmail
            } else {
                StoreError::storage(operation, format!("database error: {}", db_err.message()))
            }
        }
        other => StoreError::storage(operation, other.to_string()),
    }
}

/// Schema migrations, applied in order. Each is idempotent.
pub fn migrations() -> &'static [(&'static str, &'static str)] {
    &[("001_schema.sql", include_str!("../migrations/001_schema.sql"))]
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    for (name, sql) in migrations() {
        sqlx::raw_sql(sql)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!(migration = %name, "migration applied");
    }
    Ok(())
}
