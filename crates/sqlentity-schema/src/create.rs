//! CREATE TABLE and foreign key DDL.

use std::collections::HashMap;
use std::sync::Arc;

use sqlentity_core::{EntityMetadata, EntityType, ReferentialAction, RelationshipKind};

/// A foreign key derived from a many-to-one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub name: String,
    pub column: String,
    pub target_table: String,
    pub target_key: String,
}

impl ForeignKey {
    /// `CONSTRAINT fk FOREIGN KEY (col) REFERENCES target(pk) ON DELETE .. ON UPDATE ..`
    pub fn constraint_sql(&self, on_delete: ReferentialAction, on_update: ReferentialAction) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
            self.name,
            self.column,
            self.target_table,
            self.target_key,
            on_delete.as_sql(),
            on_update.as_sql()
        )
    }

    /// The same constraint as a standalone `ALTER TABLE`.
    pub fn alter_sql(&self, on_delete: ReferentialAction, on_update: ReferentialAction) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.table,
            self.constraint_sql(on_delete, on_update)
        )
    }
}

/// Foreign keys of `metadata`.
///
/// Only many-to-one relationships with a join column count, and only when
/// the target is among `registered` and has a key column.
pub(crate) fn foreign_keys(
    metadata: &EntityMetadata,
    registered: &HashMap<EntityType, Arc<EntityMetadata>>,
) -> Vec<ForeignKey> {
    metadata
        .relationships()
        .iter()
        .filter(|r| r.kind() == RelationshipKind::ManyToOne)
        .filter_map(|r| {
            let column = r.join_column()?;
            let target = registered.get(&r.target())?;
            let target_key = target.key_column()?;
            Some(ForeignKey {
                table: metadata.table_name().to_string(),
                name: format!(
                    "fk_{}_{}",
                    metadata.table_name().to_lowercase(),
                    column.to_lowercase()
                ),
                column: column.to_string(),
                target_table: target.table_name().to_string(),
                target_key: target_key.name().to_string(),
            })
        })
        .collect()
}

/// `CREATE TABLE t (col TYPE [NOT NULL] [UNIQUE], ..., PRIMARY KEY (pk), CONSTRAINT ...)`
pub(crate) fn create_table(
    metadata: &EntityMetadata,
    foreign_keys: &[ForeignKey],
    on_delete: ReferentialAction,
    on_update: ReferentialAction,
) -> String {
    let mut parts: Vec<String> = metadata
        .columns()
        .iter()
        .map(|column| {
            let mut def = format!("{} {}", column.name(), column.ddl_type());
            if !column.is_nullable() {
                def.push_str(" NOT NULL");
            }
            if column.is_unique() {
                def.push_str(" UNIQUE");
            }
            def
        })
        .collect();

    if let Some(key) = metadata.key_column() {
        parts.push(format!("PRIMARY KEY ({})", key.name()));
    }
    parts.extend(
        foreign_keys
            .iter()
            .map(|fk| fk.constraint_sql(on_delete, on_update)),
    );

    format!("CREATE TABLE {} ({})", metadata.table_name(), parts.join(", "))
}
