use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::{column_exists, table_exists};
use crate::error::{AppError, Result};
use crate::models::{MigrationRecord, MigrationState, MigrationStatus};

use super::{ledger, Migration};

/// Applies, reverts and reports a fixed, ordered set of migrations.
#[derive(Debug, Clone)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    /// Validate ids and sort by version. Versions must be unique.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        let id_pattern =
            Regex::new(r"^(\d{14})_[a-z][a-z0-9_]*$").map_err(anyhow::Error::from)?;

        for migration in &migrations {
            let valid = id_pattern.is_match(migration.id())
                && chrono::NaiveDateTime::parse_from_str(migration.version(), "%Y%m%d%H%M%S")
                    .is_ok();
            if !valid {
                return Err(AppError::InvalidVersion(migration.id().to_string()));
            }
        }

        migrations.sort_by(|a, b| a.version().cmp(b.version()));
        if let Some(pair) = migrations
            .windows(2)
            .find(|pair| pair[0].version() == pair[1].version())
        {
            return Err(AppError::DuplicateVersion(pair[0].version().to_string()));
        }

        Ok(Self { migrations })
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    fn find(&self, version: &str) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.version() == version)
    }

    /// Registered migrations missing from the ledger, oldest first.
    pub fn pending(&self, conn: &Connection) -> Result<Vec<&Migration>> {
        let applied = ledger::applied(conn)?;
        let done: HashSet<&str> = applied.iter().map(|r| r.version.as_str()).collect();
        Ok(self
            .migrations
            .iter()
            .filter(|m| !done.contains(m.version()))
            .collect())
    }

    /// Apply every pending migration, each in its own transaction.
    ///
    /// Returns the ledger records written by this call; an up-to-date
    /// database yields an empty list.
    pub fn migrate(&self, conn: &mut Connection) -> Result<Vec<MigrationRecord>> {
        ledger::ensure(conn)?;

        let latest = ledger::applied(conn)?.pop().map(|r| r.version);
        let pending = self.pending(conn)?;
        if let (Some(latest), Some(first)) = (latest, pending.first()) {
            if first.version() < latest.as_str() {
                return Err(AppError::OutOfOrder {
                    pending: first.id().to_string(),
                    applied: latest,
                });
            }
        }

        let mut records = Vec::with_capacity(pending.len());
        for migration in pending {
            info!("applying migration {}", migration.id());
            let tx = conn.transaction()?;
            apply_up(&tx, migration)?;
            let record = ledger::record(&tx, migration)?;
            tx.commit()?;
            records.push(record);
        }

        if records.is_empty() {
            debug!("schema is up to date");
        }
        Ok(records)
    }

    /// Revert the `steps` most recently applied migrations, newest first.
    pub fn rollback(&self, conn: &mut Connection, steps: usize) -> Result<Vec<MigrationRecord>> {
        let applied = ledger::applied(conn)?;

        let mut reverted = Vec::new();
        for record in applied.into_iter().rev().take(steps) {
            let migration = self
                .find(&record.version)
                .ok_or_else(|| AppError::UnknownMigration(record.version.clone()))?;

            info!("reverting migration {}", migration.id());
            let tx = conn.transaction()?;
            apply_down(&tx, migration)?;
            ledger::remove(&tx, &record.version)?;
            tx.commit()?;
            reverted.push(record);
        }
        Ok(reverted)
    }

    /// Registered and recorded migrations merged by version.
    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let mut by_version: BTreeMap<String, MigrationStatus> = self
            .migrations
            .iter()
            .map(|m| {
                (
                    m.version().to_string(),
                    MigrationStatus {
                        version: m.version().to_string(),
                        name: m.name().to_string(),
                        state: MigrationState::Down,
                        applied_at: None,
                    },
                )
            })
            .collect();

        for record in ledger::applied(conn)? {
            match by_version.get_mut(&record.version) {
                Some(status) => {
                    status.state = MigrationState::Up;
                    status.applied_at = Some(record.applied_at);
                }
                None => {
                    warn!("ledger has version {} with no migration", record.version);
                    by_version.insert(
                        record.version.clone(),
                        MigrationStatus {
                            version: record.version,
                            name: record.name,
                            state: MigrationState::Orphaned,
                            applied_at: Some(record.applied_at),
                        },
                    );
                }
            }
        }

        Ok(by_version.into_values().collect())
    }
}

/// Run a migration's DDL without consulting the ledger.
///
/// Fails with [`AppError::MissingReference`] when a foreign-key target is
/// absent and with [`AppError::TableExists`] when a table it creates is
/// already present, so applying the same migration twice is an error.
pub fn apply_up(conn: &Connection, migration: &Migration) -> Result<()> {
    for fk in migration.dependencies() {
        let target = if !table_exists(conn, &fk.table)? {
            fk.table.clone()
        } else if !column_exists(conn, &fk.table, &fk.column)? {
            format!("{}.{}", fk.table, fk.column)
        } else {
            continue;
        };
        return Err(AppError::MissingReference {
            migration: migration.id().to_string(),
            target,
        });
    }

    for table in migration.tables() {
        if table_exists(conn, &table.name)? {
            return Err(AppError::TableExists(table.name.clone()));
        }
    }

    for statement in migration.up_statements() {
        debug!("{statement}");
        conn.execute_batch(&statement)?;
    }
    Ok(())
}

fn apply_down(conn: &Connection, migration: &Migration) -> Result<()> {
    for statement in migration.down_statements() {
        debug!("{statement}");
        conn.execute_batch(&statement)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use crate::migrations::all;

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn with_users() -> Connection {
        let conn = connection();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        conn
    }

    fn create_comments() -> Migration {
        Migration::new("20200420090000_create_comments", |m| {
            m.create_table("comments", |t| {
                t.references("article_id", "articles").not_null();
                t.string("body");
                t.timestamps();
            });
        })
    }

    fn table_count(conn: &Connection, name: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn rejects_malformed_ids() {
        for id in [
            "create_articles",
            "2020041722_create_articles",
            "20201399000000_bad_month",
            "20200417224000_Create",
        ] {
            let result = Migrator::new(vec![Migration::new(id, |_| {})]);
            assert!(
                matches!(result, Err(AppError::InvalidVersion(ref bad)) if bad == id),
                "{id} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_duplicate_versions() {
        let result = Migrator::new(vec![
            Migration::new("20200417224000_one", |_| {}),
            Migration::new("20200417224000_two", |_| {}),
        ]);
        assert!(matches!(result, Err(AppError::DuplicateVersion(v)) if v == "20200417224000"));
    }

    #[test]
    fn sorts_by_version() {
        let migrator = Migrator::new(vec![create_comments(), all().remove(0)]).unwrap();
        let ids: Vec<_> = migrator.migrations().iter().map(|m| m.id()).collect();
        assert_eq!(
            ids,
            vec![
                "20200417224000_create_articles",
                "20200420090000_create_comments"
            ]
        );
    }

    #[test]
    fn migrate_applies_pending_once() {
        let mut conn = with_users();
        let migrator = Migrator::new(all()).unwrap();

        let applied = migrator.migrate(&mut conn).unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].version, "20200417224000");
        assert_eq!(applied[0].name, "create_articles");
        assert_eq!(table_count(&conn, "articles"), 1);

        assert!(migrator.migrate(&mut conn).unwrap().is_empty());
        assert_eq!(ledger::applied(&conn).unwrap().len(), 1);
        assert!(migrator.pending(&conn).unwrap().is_empty());
    }

    #[test]
    fn missing_users_table_leaves_nothing_behind() {
        let mut conn = connection();
        let migrator = Migrator::new(all()).unwrap();

        let err = migrator.migrate(&mut conn).unwrap_err();
        assert!(
            matches!(err, AppError::MissingReference { ref target, .. } if target == "users"),
            "unexpected error: {err}"
        );
        assert_eq!(table_count(&conn, "articles"), 0);
        assert!(ledger::applied(&conn).unwrap().is_empty());
    }

    #[test]
    fn missing_referenced_column_is_reported() {
        let mut conn = connection();
        conn.execute_batch("CREATE TABLE users (uuid TEXT PRIMARY KEY);")
            .unwrap();
        let migrator = Migrator::new(all()).unwrap();

        let err = migrator.migrate(&mut conn).unwrap_err();
        assert!(
            matches!(err, AppError::MissingReference { ref target, .. } if target == "users.id")
        );
    }

    #[test]
    fn apply_up_twice_fails_with_table_exists() {
        let conn = with_users();
        let migration = all().remove(0);

        apply_up(&conn, &migration).unwrap();
        let err = apply_up(&conn, &migration).unwrap_err();
        assert!(matches!(err, AppError::TableExists(ref t) if t == "articles"));
    }

    #[test]
    fn existing_table_without_ledger_row_is_a_conflict() {
        let mut conn = with_users();
        conn.execute_batch("CREATE TABLE articles (id INTEGER PRIMARY KEY);")
            .unwrap();
        let migrator = Migrator::new(all()).unwrap();

        let err = migrator.migrate(&mut conn).unwrap_err();
        assert!(matches!(err, AppError::TableExists(_)));
        assert!(ledger::applied(&conn).unwrap().is_empty());
    }

    #[test]
    fn dependencies_within_one_run_are_satisfied_in_order() {
        let mut conn = with_users();
        let migrator = Migrator::new(vec![create_comments(), all().remove(0)]).unwrap();

        let applied = migrator.migrate(&mut conn).unwrap();
        let versions: Vec<_> = applied.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["20200417224000", "20200420090000"]);
        assert_eq!(table_count(&conn, "comments"), 1);
    }

    #[test]
    fn older_pending_migration_is_out_of_order() {
        let mut conn = with_users();
        Migrator::new(all()).unwrap().migrate(&mut conn).unwrap();

        let backdated = Migration::new("20200101000000_backdated", |m| {
            m.create_table("drafts", |t| {
                t.string("title");
            });
        });
        let migrator = Migrator::new(vec![all().remove(0), backdated]).unwrap();

        let err = migrator.migrate(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            AppError::OutOfOrder { ref pending, ref applied }
                if pending == "20200101000000_backdated" && applied == "20200417224000"
        ));
        assert_eq!(table_count(&conn, "drafts"), 0);
    }

    #[test]
    fn rollback_reverts_newest_first() {
        let mut conn = with_users();
        let migrator = Migrator::new(vec![all().remove(0), create_comments()]).unwrap();
        migrator.migrate(&mut conn).unwrap();

        let reverted = migrator.rollback(&mut conn, 1).unwrap();
        assert_eq!(reverted.len(), 1);
        assert_eq!(reverted[0].version, "20200420090000");
        assert_eq!(table_count(&conn, "comments"), 0);
        assert_eq!(table_count(&conn, "articles"), 1);

        let reverted = migrator.rollback(&mut conn, 5).unwrap();
        assert_eq!(reverted.len(), 1);
        assert_eq!(table_count(&conn, "articles"), 0);
        assert!(ledger::applied(&conn).unwrap().is_empty());

        // and forward again
        assert_eq!(migrator.migrate(&mut conn).unwrap().len(), 2);
    }

    #[test]
    fn rollback_of_unregistered_version_fails() {
        let mut conn = with_users();
        ledger::ensure(&conn).unwrap();
        ledger::record(&conn, &Migration::new("20990101000000_future", |_| {})).unwrap();

        let migrator = Migrator::new(all()).unwrap();
        let err = migrator.rollback(&mut conn, 1).unwrap_err();
        assert!(matches!(err, AppError::UnknownMigration(ref v) if v == "20990101000000"));
    }

    #[test]
    fn status_merges_registry_and_ledger() {
        let mut conn = with_users();
        let migrator = Migrator::new(vec![all().remove(0), create_comments()]).unwrap();

        let status = migrator.status(&conn).unwrap();
        assert!(status.iter().all(|s| s.state == MigrationState::Down));
        assert!(!ledger::exists(&conn).unwrap());

        Migrator::new(all()).unwrap().migrate(&mut conn).unwrap();
        ledger::record(&conn, &Migration::new("20990101000000_future", |_| {})).unwrap();

        let status = migrator.status(&conn).unwrap();
        let summary: Vec<_> = status
            .iter()
            .map(|s| (s.version.as_str(), s.state, s.applied_at.is_some()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("20200417224000", MigrationState::Up, true),
                ("20200420090000", MigrationState::Down, false),
                ("20990101000000", MigrationState::Orphaned, true),
            ]
        );
    }
}
