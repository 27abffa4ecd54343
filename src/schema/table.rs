use super::{ColumnDef, ColumnDefault, ColumnType, ForeignKey, IndexDef, TableDef};

/// Collects columns for [`TableDef::create`].
///
/// Column methods return the new column so constraints can be chained:
/// `t.references("user_id", "users").not_null();`
pub struct TableBuilder {
    table: TableDef,
}

impl TableBuilder {
    pub(super) fn new(name: String) -> Self {
        Self {
            table: TableDef {
                columns: vec![ColumnDef::new("id", ColumnType::PrimaryKey)],
                indexes: Vec::new(),
                timestamps: false,
                name,
            },
        }
    }

    pub(super) fn finish(self) -> TableDef {
        self.table
    }

    pub fn column(&mut self, name: &str, column_type: ColumnType) -> &mut ColumnDef {
        let at = self.table.columns.len();
        self.table.columns.push(ColumnDef::new(name, column_type));
        &mut self.table.columns[at]
    }

    /// Integer column referencing `table(id)`, with a foreign key and an index.
    ///
    /// The column name is used literally: `references("user_id", "users")`
    /// creates `user_id`, not `user_id_id`.
    pub fn references(&mut self, name: &str, table: &str) -> &mut ColumnDef {
        self.index(&[name]);
        let column = self.column(name, ColumnType::Integer);
        column.references = Some(ForeignKey {
            table: table.to_string(),
            column: "id".to_string(),
        });
        column
    }

    pub fn string(&mut self, name: &str) -> &mut ColumnDef {
        self.column(name, ColumnType::String)
    }

    pub fn datetime(&mut self, name: &str) -> &mut ColumnDef {
        self.column(name, ColumnType::DateTime)
    }

    /// `created_at` and `updated_at`, both set by the database.
    pub fn timestamps(&mut self) {
        for name in ["created_at", "updated_at"] {
            self.datetime(name)
                .not_null()
                .default(ColumnDefault::CurrentTimestamp);
        }
        self.table.timestamps = true;
    }

    /// Index named `index_<table>_on_<col>_and_<col>`.
    pub fn index(&mut self, columns: &[&str]) {
        let name = format!("index_{}_on_{}", self.table.name, columns.join("_and_"));
        self.table.indexes.push(IndexDef {
            name,
            table: self.table.name.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_starts_with_primary_key() {
        let table = TableDef::create("tags", |t| {
            t.string("name").not_null();
        });

        let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(table.columns[0].column_type, ColumnType::PrimaryKey);
        assert!(!table.timestamps);
    }

    #[test]
    fn references_adds_index_and_foreign_key() {
        let table = TableDef::create("articles", |t| {
            t.references("user_id", "users").not_null();
        });

        let user_id = table.column("user_id").unwrap();
        assert_eq!(user_id.column_type, ColumnType::Integer);
        assert!(!user_id.nullable);
        assert_eq!(
            user_id.references,
            Some(ForeignKey {
                table: "users".into(),
                column: "id".into()
            })
        );

        assert_eq!(table.indexes.len(), 1);
        assert_eq!(table.indexes[0].name, "index_articles_on_user_id");
        assert_eq!(table.indexes[0].columns, vec!["user_id"]);
    }

    #[test]
    fn timestamps_are_required_and_defaulted() {
        let table = TableDef::create("notes", |t| t.timestamps());

        for name in ["created_at", "updated_at"] {
            let column = table.column(name).unwrap();
            assert_eq!(column.column_type, ColumnType::DateTime);
            assert!(!column.nullable);
            assert_eq!(column.default, Some(ColumnDefault::CurrentTimestamp));
        }
        assert!(table.timestamps);
    }

    #[test]
    fn composite_index_name() {
        let table = TableDef::create("memberships", |t| {
            t.references("group_id", "groups");
            t.references("member_id", "members");
            t.index(&["group_id", "member_id"]);
        });

        let names: Vec<_> = table.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "index_memberships_on_group_id",
                "index_memberships_on_member_id",
                "index_memberships_on_group_id_and_member_id",
            ]
        );
    }
}
