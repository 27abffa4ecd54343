//! Schema migration for the `articles` table, together with the small SQLite
//! migration runner that applies it.
//!
//! ```no_run
//! use article_migrate::{db::Database, migrations, migrations::Migrator};
//!
//! # async fn run() -> article_migrate::Result<()> {
//! let db = Database::in_memory(Migrator::new(migrations::all())?).await?;
//! db.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod migrations;
pub mod models;
pub mod schema;

pub use error::{AppError, Result};
