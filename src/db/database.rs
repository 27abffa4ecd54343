use std::sync::Arc;
use std::time::Duration;

use rusqlite::{params, Row};
use tokio_rusqlite::Connection;
use tracing::info;

use crate::error::Result;
use crate::migrations::Migrator;
use crate::models::{ColumnInfo, ForeignKeyInfo, MigrationRecord, MigrationStatus};

/// A SQLite database with foreign keys enforced, plus the migrations that
/// shape it.
pub struct Database {
    conn: Connection,
    migrator: Arc<Migrator>,
}

impl Database {
    pub async fn open(db_path: &str, busy_timeout: Duration, migrator: Migrator) -> Result<Self> {
        info!("opening database at {}", db_path);
        let conn = Connection::open(db_path).await?;
        Self::configure(conn, busy_timeout, migrator).await
    }

    pub async fn in_memory(migrator: Migrator) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::configure(conn, Duration::ZERO, migrator).await
    }

    async fn configure(conn: Connection, busy_timeout: Duration, migrator: Migrator) -> Result<Self> {
        conn.call(move |conn| {
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.busy_timeout(busy_timeout)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            migrator: Arc::new(migrator),
        })
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn.call(move |conn| Ok(f(conn))).await?
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    // Migration operations

    pub async fn migrate(&self) -> Result<Vec<MigrationRecord>> {
        let migrator = Arc::clone(&self.migrator);
        self.run(move |conn| migrator.migrate(conn)).await
    }

    pub async fn rollback(&self, steps: usize) -> Result<Vec<MigrationRecord>> {
        let migrator = Arc::clone(&self.migrator);
        self.run(move |conn| migrator.rollback(conn, steps)).await
    }

    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let migrator = Arc::clone(&self.migrator);
        self.run(move |conn| migrator.status(conn)).await
    }

    // Introspection

    pub async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let table = table.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                r#"SELECT name, type, "notnull", dflt_value, pk
                   FROM pragma_table_info(?1)
                   ORDER BY cid"#,
            )?;
            let columns = stmt
                .query_map(params![table], column_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(columns)
        })
        .await
    }

    pub async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let table = table.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?1) ORDER BY id"#,
            )?;
            let keys = stmt
                .query_map(params![table], |row| {
                    Ok(ForeignKeyInfo {
                        column: row.get(0)?,
                        table: row.get(1)?,
                        to: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }
}

fn column_from_row(row: &Row) -> rusqlite::Result<ColumnInfo> {
    Ok(ColumnInfo {
        name: row.get(0)?,
        sql_type: row.get(1)?,
        nullable: row.get::<_, i64>(2)? == 0,
        default: row.get(3)?,
        primary_key: row.get::<_, i64>(4)? != 0,
    })
}
