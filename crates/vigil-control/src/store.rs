//! SQLite-backed persistence for the five admin-managed lists. The core
//! lists only depend on a `(kind, value) -> Result` callback shape; this
//! is the concrete collaborator that gives the daemon an actual backing
//! store.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use vigil_core::FirewallError;

use crate::lists::ListKind;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) the SQLite database at `db_path` and
    /// ensures one table per list exists.
    pub async fn connect(db_path: &str) -> Result<Self, FirewallError> {
        let options = SqliteConnectOptions::from_str(db_path)
            .map_err(|err| FirewallError::Persist(err.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|err| FirewallError::Persist(err.to_string()))?;

        for kind in ListKind::ALL {
            let sql = format!("CREATE TABLE IF NOT EXISTS {} (value TEXT PRIMARY KEY)", kind.table());
            sqlx::query(&sql)
                .execute(&pool)
                .await
                .map_err(|err| FirewallError::Persist(err.to_string()))?;
        }

        Ok(Self { pool })
    }

    pub async fn load_all(&self, kind: ListKind) -> Result<Vec<String>, FirewallError> {
        let sql = format!("SELECT value FROM {}", kind.table());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| FirewallError::Persist(err.to_string()))?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>("value").map_err(|err| FirewallError::Persist(err.to_string())))
            .collect()
    }

    /// Commit to the in-memory list first, then call this — on failure
    /// the in-memory state stays committed and is replayable on the next
    /// startup once the store is reachable again.
    pub async fn persist_upsert(&self, kind: ListKind, value: &str) -> Result<(), FirewallError> {
        let sql = format!("INSERT OR REPLACE INTO {} (value) VALUES (?)", kind.table());
        sqlx::query(&sql)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|err| FirewallError::Persist(err.to_string()))?;
        Ok(())
    }

    pub async fn persist_remove(&self, kind: ListKind, value: &str) -> Result<(), FirewallError> {
        let sql = format!("DELETE FROM {} WHERE value = ?", kind.table());
        sqlx::query(&sql)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|err| FirewallError::Persist(err.to_string()))?;
        Ok(())
    }
}
