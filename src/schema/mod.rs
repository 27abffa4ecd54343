//! Declarative table descriptions.
//!
//! A [`TableDef`] is plain data: a list of column specs plus indexes. It is
//! built through [`TableDef::create`], which hands a [`TableBuilder`] to a
//! closure in the same shape a `create_table` block has in most migration
//! DSLs, and is rendered to SQL by [`crate::db::schema`].

mod table;

pub use table::TableBuilder;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing integer surrogate key. Values are never reused.
    PrimaryKey,
    Integer,
    String,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDefault {
    /// Current UTC time, millisecond precision.
    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: column_type != ColumnType::PrimaryKey,
            default: None,
            references: None,
        }
    }

    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = false;
        self
    }

    pub fn default(&mut self, default: ColumnDefault) -> &mut Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    /// `created_at`/`updated_at` are maintained by the database.
    pub timestamps: bool,
}

impl TableDef {
    /// Describe a new table. An `id` primary key column is always added first.
    pub fn create<F>(name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut builder = TableBuilder::new(name.into());
        build(&mut builder);
        builder.finish()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&ColumnDef, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|fk| (c, fk)))
    }
}
