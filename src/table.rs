//! Table definitions - user tables that can take part in a relationship
//!
//! A `TableDefinition` is the full description of a table the engine may
//! create on the caller's behalf: its columns, its content data type and any
//! table-level unique constraints. Typed constructors build the fixed parts
//! of media, simple attributes, attributes, tiles and features tables.

use crate::storage::schema::quote_identifier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Content data type of feature tables
pub const FEATURES: &str = "features";
/// Content data type of tile pyramid tables
pub const TILES: &str = "tiles";
/// Content data type of attribute tables
pub const ATTRIBUTES: &str = "attributes";
/// Content data type of media tables
pub const MEDIA: &str = "media";
/// Content data type of simple attribute tables
pub const SIMPLE_ATTRIBUTES: &str = "simple_attributes";

/// Column types allowed in a simple attributes table
const SIMPLE_TYPES: &[&str] = &[
    "BOOLEAN", "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "FLOAT", "DOUBLE", "REAL",
    "TEXT",
];

/// A single column of a table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Declared SQL type (`INTEGER`, `TEXT`, `BLOB`, ...)
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub unique: bool,
    /// Raw SQL default expression
    pub default: Option<String>,
}

impl ColumnDefinition {
    /// Create a nullable column
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            autoincrement: false,
            unique: false,
            default: None,
        }
    }

    /// Create an autoincrementing integer primary key column
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            not_null: true,
            primary_key: true,
            autoincrement: true,
            ..Self::new(name, "INTEGER")
        }
    }

    /// Create a NOT NULL column
    pub fn required(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self::new(name, sql_type).not_null()
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Render the column clause of a CREATE TABLE statement
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    fn has_type(&self, sql_type: &str) -> bool {
        self.sql_type.eq_ignore_ascii_case(sql_type)
    }
}

/// Full definition of a user table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    /// Content data type registered in `gpkg_contents`, if any
    pub data_type: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    /// Table-level UNIQUE constraints, as column name lists
    pub unique_constraints: Vec<Vec<String>>,
}

impl TableDefinition {
    /// Create a definition with no content data type
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            columns,
            unique_constraints: Vec::new(),
        }
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn with_unique(mut self, columns: &[&str]) -> Self {
        self.unique_constraints
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Media table: `id`, `data BLOB NOT NULL`, `content_type TEXT NOT NULL`
    /// followed by any additional columns
    pub fn media(name: impl Into<String>, additional: Vec<ColumnDefinition>) -> Self {
        let mut columns = vec![
            ColumnDefinition::primary_key("id"),
            ColumnDefinition::required("data", "BLOB"),
            ColumnDefinition::required("content_type", "TEXT"),
        ];
        columns.extend(additional);
        Self::new(name, columns).with_data_type(MEDIA)
    }

    /// Simple attributes table: `id` plus NOT NULL columns of simple types
    pub fn simple_attributes(name: impl Into<String>, additional: Vec<ColumnDefinition>) -> Result<Self> {
        let name = name.into();
        for column in &additional {
            if !column.not_null {
                return Err(Error::InvalidTable(format!(
                    "simple attributes column {}.{} must be NOT NULL",
                    name, column.name
                )));
            }
            if !SIMPLE_TYPES.iter().any(|t| column.has_type(t)) {
                return Err(Error::InvalidTable(format!(
                    "simple attributes column {}.{} has unsupported type {}",
                    name, column.name, column.sql_type
                )));
            }
        }
        let mut columns = vec![ColumnDefinition::primary_key("id")];
        columns.extend(additional);
        Ok(Self::new(name, columns).with_data_type(SIMPLE_ATTRIBUTES))
    }

    /// Attributes table: `id` plus any columns
    pub fn attributes(name: impl Into<String>, additional: Vec<ColumnDefinition>) -> Self {
        let mut columns = vec![ColumnDefinition::primary_key("id")];
        columns.extend(additional);
        Self::new(name, columns).with_data_type(ATTRIBUTES)
    }

    /// Tile pyramid user data table
    pub fn tiles(name: impl Into<String>) -> Self {
        let columns = vec![
            ColumnDefinition::primary_key("id"),
            ColumnDefinition::required("zoom_level", "INTEGER"),
            ColumnDefinition::required("tile_column", "INTEGER"),
            ColumnDefinition::required("tile_row", "INTEGER"),
            ColumnDefinition::required("tile_data", "BLOB"),
        ];
        Self::new(name, columns)
            .with_data_type(TILES)
            .with_unique(&["zoom_level", "tile_column", "tile_row"])
    }

    /// Feature table with a geometry column stored as an encoded blob
    pub fn features(
        name: impl Into<String>,
        geometry_column: &str,
        geometry_type: &str,
        additional: Vec<ColumnDefinition>,
    ) -> Self {
        let mut columns = vec![
            ColumnDefinition::primary_key("id"),
            ColumnDefinition::new(geometry_column, geometry_type),
        ];
        columns.extend(additional);
        Self::new(name, columns).with_data_type(FEATURES)
    }

    /// Column lookup by case-insensitive name
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Name of the primary key column, if one is declared
    pub fn primary_key_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    /// Check structural sanity before any DDL is issued
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidTable("table name is empty".to_string()));
        }
        if self.columns.is_empty() {
            return Err(Error::InvalidTable(format!("table {} has no columns", self.name)));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_lowercase()) {
                return Err(Error::InvalidTable(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        if self.columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(Error::InvalidTable(format!(
                "table {} declares more than one primary key column",
                self.name
            )));
        }
        for constraint in &self.unique_constraints {
            if let Some(missing) = constraint.iter().find(|c| self.column(c).is_none()) {
                return Err(Error::InvalidTable(format!(
                    "unique constraint on {} references unknown column {}",
                    self.name, missing
                )));
            }
        }
        Ok(())
    }

    /// Render the CREATE TABLE statement
    pub fn create_sql(&self) -> String {
        let mut clauses: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        for constraint in &self.unique_constraints {
            let cols: Vec<String> = constraint.iter().map(|c| quote_identifier(c)).collect();
            clauses.push(format!("UNIQUE ({})", cols.join(", ")));
        }
        format!(
            "CREATE TABLE {} ({})",
            quote_identifier(&self.name),
            clauses.join(", ")
        )
    }
}

/// A row of `gpkg_contents`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentsRow {
    pub table_name: String,
    pub data_type: String,
    pub identifier: Option<String>,
    pub description: Option<String>,
    /// Set by the store on insert
    pub last_change: Option<String>,
}

impl ContentsRow {
    /// Contents row identified by the table's own name
    pub fn new(table_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let table_name = table_name.into();
        Self {
            identifier: Some(table_name.clone()),
            table_name,
            data_type: data_type.into(),
            description: None,
            last_change: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_definition() {
        let table = TableDefinition::media("photos", vec![ColumnDefinition::new("caption", "TEXT")]);
        assert_eq!(table.data_type.as_deref(), Some(MEDIA));
        assert_eq!(table.primary_key_column(), Some("id"));
        assert!(table.column("DATA").unwrap().not_null);
        assert!(table.validate().is_ok());
        assert_eq!(
            table.create_sql(),
            "CREATE TABLE \"photos\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             \"data\" BLOB NOT NULL, \"content_type\" TEXT NOT NULL, \"caption\" TEXT)"
        );
    }

    #[test]
    fn test_simple_attributes_rejects_blob_and_nullable() {
        let blob = TableDefinition::simple_attributes("sa", vec![ColumnDefinition::required("b", "BLOB")]);
        assert!(matches!(blob, Err(Error::InvalidTable(_))));

        let nullable = TableDefinition::simple_attributes("sa", vec![ColumnDefinition::new("t", "TEXT")]);
        assert!(matches!(nullable, Err(Error::InvalidTable(_))));

        let ok = TableDefinition::simple_attributes("sa", vec![ColumnDefinition::required("t", "text")]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_tiles_unique_constraint_rendered() {
        let sql = TableDefinition::tiles("imagery").create_sql();
        assert!(sql.ends_with("UNIQUE (\"zoom_level\", \"tile_column\", \"tile_row\"))"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let table = TableDefinition::new(
            "t",
            vec![ColumnDefinition::new("a", "TEXT"), ColumnDefinition::new("A", "TEXT")],
        );
        assert!(matches!(table.validate(), Err(Error::InvalidTable(_))));
    }
}
