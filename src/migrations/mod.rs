//! Versioned schema changes.
//!
//! Every migration is identified as `<YYYYMMDDHHMMSS>_<name>`; the timestamp
//! is its version and fixes its position in the linear history recorded by
//! the [`ledger`].

pub mod ledger;
mod m20200417224000_create_articles;
mod migrator;

pub use migrator::{apply_up, Migrator};

use crate::db::schema::{create_table_statements, drop_table_statements};
use crate::schema::{ForeignKey, TableBuilder, TableDef};

/// Every migration shipped with this crate, in any order.
pub fn all() -> Vec<Migration> {
    vec![m20200417224000_create_articles::migration()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    id: String,
    tables: Vec<TableDef>,
}

impl Migration {
    pub fn new<F>(id: impl Into<String>, change: F) -> Self
    where
        F: FnOnce(&mut MigrationBuilder),
    {
        let mut builder = MigrationBuilder { tables: Vec::new() };
        change(&mut builder);
        Self {
            id: id.into(),
            tables: builder.tables,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &str {
        self.id.split_once('_').map_or(&self.id, |(version, _)| version)
    }

    pub fn name(&self) -> &str {
        self.id.split_once('_').map_or("", |(_, name)| name)
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Foreign-key targets outside this migration. They must already exist
    /// when it is applied.
    pub fn dependencies(&self) -> Vec<&ForeignKey> {
        let mut deps: Vec<&ForeignKey> = Vec::new();
        for (_, fk) in self.tables.iter().flat_map(|t| t.foreign_keys()) {
            let created_here = self.tables.iter().any(|t| t.name == fk.table);
            if !created_here && !deps.contains(&fk) {
                deps.push(fk);
            }
        }
        deps
    }

    pub fn up_statements(&self) -> Vec<String> {
        self.tables.iter().flat_map(create_table_statements).collect()
    }

    /// Tables are dropped in reverse creation order.
    pub fn down_statements(&self) -> Vec<String> {
        self.tables.iter().rev().flat_map(drop_table_statements).collect()
    }
}

pub struct MigrationBuilder {
    tables: Vec<TableDef>,
}

impl MigrationBuilder {
    pub fn create_table<F>(&mut self, name: &str, build: F)
    where
        F: FnOnce(&mut TableBuilder),
    {
        self.tables.push(TableDef::create(name, build));
    }
}
