mod column;
mod migration;

pub use column::{ColumnInfo, ForeignKeyInfo};
pub use migration::{MigrationRecord, MigrationState, MigrationStatus};
