//! The read-model a `DataSource` resolves into: tables, columns, sample
//! rows, and the relationships between them. Produced by the Schema
//! Registry, consumed by the Intent Classifier and SQL Generator.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

/// Sample rows are capped at three per table and must never contain
/// credential material — the Schema Registry enforces this at the source.
pub const MAX_SAMPLE_ROWS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub sample_rows: Vec<Vec<String>>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// A qualified column reference, `table.column`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Best-effort check that a qualified or bare column name exists
    /// somewhere in the schema — used by the Validator to flag SQL
    /// referencing columns the Generator wasn't given.
    pub fn has_column(&self, qualified_or_bare: &str) -> bool {
        match qualified_or_bare.split_once('.') {
            Some((table, column)) => {
                self.table(table).map(|t| t.has_column(column)).unwrap_or(false)
            },
            None => self.tables.iter().any(|t| t.has_column(qualified_or_bare)),
        }
    }

    /// Serialize into the compact text block embedded in the SQL
    /// Generator's system prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            out.push_str("TABLE ");
            out.push_str(&table.name);
            out.push_str(" (");
            let cols: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.data_type))
                .collect();
            out.push_str(&cols.join(", "));
            out.push_str(")\n");
        }
        for rel in &self.relationships {
            out.push_str(&format!("RELATIONSHIP {} -> {}\n", rel.from, rel.to));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema {
            tables: vec![Table {
                name: "orders".to_string(),
                columns: vec![
                    Column { name: "id".to_string(), data_type: "bigint".to_string(), nullable: false },
                    Column { name: "customer_id".to_string(), data_type: "bigint".to_string(), nullable: false },
                ],
                sample_rows: vec![],
            }],
            relationships: vec![],
        }
    }

    #[test]
    fn has_column_resolves_qualified_and_bare_names() {
        let schema = sample_schema();
        assert!(schema.has_column("orders.customer_id"));
        assert!(schema.has_column("customer_id"));
        assert!(!schema.has_column("orders.missing"));
        assert!(!schema.has_column("missing"));
    }
}
