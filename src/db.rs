use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open the analytics database read-only. The agent only runs analytics
/// queries, so nothing here ever needs write access, and a read-only pool
/// can safely be shared across concurrent runs.
pub async fn connect_read_only(path: &Path) -> Result<SqlitePool> {
    if !path.exists() {
        anyhow::bail!("database not found: {}", path.display());
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database: {}", path.display()))?;

    Ok(pool)
}
