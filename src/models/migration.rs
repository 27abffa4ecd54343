use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the `schema_migrations` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: String,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    #[default]
    Down,
    Up,
    /// Recorded in the ledger but not registered with the migrator.
    Orphaned,
}

impl MigrationState {
    pub fn label(self) -> &'static str {
        match self {
            MigrationState::Down => "down",
            MigrationState::Up => "up",
            MigrationState::Orphaned => "orphaned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
}
