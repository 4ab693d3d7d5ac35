//! Database primitives: connection settings, pool setup and error classification.

use std::path::PathBuf;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, SqlErr,
    Statement,
};
use thiserror::Error;
use tracing::info;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database connection failed: {0}")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub sqlx_logging: bool,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/deals.db?mode=rwc";

fn default_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            sqlx_logging: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and `DATABASE_LOG`.
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| default_url());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok());
        let sqlx_logging = std::env::var("DATABASE_LOG")
            .ok()
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self {
            url,
            max_connections,
            sqlx_logging,
        }
    }

    /// Path of the SQLite database file, or `None` for in-memory databases.
    pub fn sqlite_file(&self) -> Option<PathBuf> {
        let rest = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or_default();
        if path.is_empty() || path.starts_with(":memory:") {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

/// Open the pool, creating the parent directory of a SQLite file when needed.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    if let Some(parent) = settings
        .sqlite_file()
        .and_then(|file| file.parent().map(PathBuf::from))
    {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(&parent).map_err(|source| DbError::Directory {
                path: parent.clone(),
                source,
            })?;
        }
    }

    let mut options = ConnectOptions::new(settings.url.clone());
    options.sqlx_logging(settings.sqlx_logging);
    if let Some(max) = settings.max_connections {
        options.max_connections(max);
    }
    let pool = Database::connect(options).await?;
    info!(url = %settings.url, "database connected");
    Ok(pool)
}

/// Which declarative constraint rejected a statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Check,
    NotNull,
    Unique,
    ForeignKey,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Check => "CHECK",
            ConstraintKind::NotNull => "NOT NULL",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
        }
    }
}

pub fn classify_constraint(err: &DbErr) -> Option<ConstraintKind> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => return Some(ConstraintKind::Unique),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            return Some(ConstraintKind::ForeignKey);
        }
        _ => {}
    }
    let message = err.to_string();
    [
        ("CHECK constraint failed", ConstraintKind::Check),
        ("NOT NULL constraint failed", ConstraintKind::NotNull),
        ("UNIQUE constraint failed", ConstraintKind::Unique),
        ("FOREIGN KEY constraint failed", ConstraintKind::ForeignKey),
    ]
    .into_iter()
    .find(|(needle, _)| message.contains(needle))
    .map(|(_, kind)| kind)
}

/// A user table and its current row count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub rows: i64,
}

/// List user tables (skipping SQLite internals) with their row counts.
pub async fn table_inventory<C>(db: &C) -> Result<Vec<TableSummary>, DbErr>
where
    C: ConnectionTrait,
{
    let names = db
        .query_all(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        ))
        .await?
        .into_iter()
        .map(|row| row.try_get::<String>("", "name"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM \"{}\"",
            name.replace('"', "\"\"")
        );
        let rows = db
            .query_one(Statement::from_string(DatabaseBackend::Sqlite, sql))
            .await?
            .map(|row| row.try_get::<i64>("", "row_count"))
            .transpose()?
            .unwrap_or(0);
        tables.push(TableSummary { name, rows });
    }
    Ok(tables)
}
