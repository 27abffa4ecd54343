use crate::schema::{ColumnDef, ColumnDefault, ColumnType, IndexDef, TableDef};

/// SQLite expression for the current UTC time, e.g. `2026-01-11 12:34:56.789`.
pub const CURRENT_TIMESTAMP: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_type_sql(column_type: ColumnType) -> &'static str {
    match column_type {
        // AUTOINCREMENT keeps SQLite from reusing the rowid of a deleted row
        ColumnType::PrimaryKey => "INTEGER PRIMARY KEY AUTOINCREMENT",
        ColumnType::Integer => "INTEGER",
        ColumnType::String => "VARCHAR",
        ColumnType::DateTime => "DATETIME",
    }
}

fn column_sql(column: &ColumnDef) -> String {
    let mut sql = format!(
        "{} {}",
        quote_ident(&column.name),
        column_type_sql(column.column_type)
    );
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(ColumnDefault::CurrentTimestamp) = column.default {
        sql.push_str(&format!(" DEFAULT ({CURRENT_TIMESTAMP})"));
    }
    sql
}

fn index_sql(index: &IndexDef) -> String {
    let columns = index
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE INDEX {} ON {} ({})",
        quote_ident(&index.name),
        quote_ident(&index.table),
        columns
    )
}

pub fn touch_trigger_name(table: &str) -> String {
    format!("{table}_touch_updated_at")
}

pub fn freeze_trigger_name(table: &str) -> String {
    format!("{table}_freeze_created_at")
}

fn timestamp_triggers(table: &TableDef) -> [String; 2] {
    let t = quote_ident(&table.name);
    [
        // recursive_triggers is off, so the inner UPDATE does not re-fire this.
        // Within the same millisecond the value is bumped past OLD instead.
        format!(
            "CREATE TRIGGER {} AFTER UPDATE ON {t} FOR EACH ROW \
             WHEN NEW.\"updated_at\" IS OLD.\"updated_at\" \
             BEGIN UPDATE {t} SET \"updated_at\" = \
             CASE WHEN {CURRENT_TIMESTAMP} > OLD.\"updated_at\" THEN {CURRENT_TIMESTAMP} \
             ELSE strftime('%Y-%m-%d %H:%M:%f', OLD.\"updated_at\", '+0.001 seconds') END \
             WHERE \"id\" = NEW.\"id\"; END",
            quote_ident(&touch_trigger_name(&table.name)),
        ),
        format!(
            "CREATE TRIGGER {} BEFORE UPDATE OF \"created_at\" ON {t} FOR EACH ROW \
             WHEN NEW.\"created_at\" IS NOT OLD.\"created_at\" \
             BEGIN SELECT RAISE(ABORT, 'created_at is immutable'); END",
            quote_ident(&freeze_trigger_name(&table.name)),
        ),
    ]
}

/// Statements that create `table` with its indexes and, when it carries
/// timestamps, the triggers that maintain them.
pub fn create_table_statements(table: &TableDef) -> Vec<String> {
    let mut definitions: Vec<String> = table.columns.iter().map(column_sql).collect();
    definitions.extend(table.foreign_keys().map(|(column, fk)| {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&column.name),
            quote_ident(&fk.table),
            quote_ident(&fk.column)
        )
    }));

    let mut statements = vec![format!(
        "CREATE TABLE {} ({})",
        quote_ident(&table.name),
        definitions.join(", ")
    )];
    statements.extend(table.indexes.iter().map(index_sql));
    if table.timestamps {
        statements.extend(timestamp_triggers(table));
    }
    statements
}

/// Indexes and triggers go with the table.
pub fn drop_table_statements(table: &TableDef) -> Vec<String> {
    vec![format!("DROP TABLE {}", quote_ident(&table.name))]
}
