//! Mapping tables - one generic two-column join table per relationship
//!
//! A mapping table holds `(base_id, related_id)` pairs. It has no primary
//! key and no uniqueness constraint, so the same pair may appear more than
//! once. Callers may add extra user columns through
//! [`definition_with_columns`].

use rusqlite::params;

use super::container::Container;
use super::schema::quote_identifier;
use crate::row::MappingRow;
use crate::table::{ColumnDefinition, TableDefinition};
use crate::{Error, Result, StoreContext};

pub const BASE_ID_COLUMN: &str = "base_id";
pub const RELATED_ID_COLUMN: &str = "related_id";

/// Definition of a plain mapping table
pub fn definition(name: impl Into<String>) -> TableDefinition {
    definition_with_columns(name, Vec::new())
}

/// Mapping table definition carrying extra user columns after the id pair
pub fn definition_with_columns(name: impl Into<String>, additional: Vec<ColumnDefinition>) -> TableDefinition {
    let mut columns = vec![
        ColumnDefinition::required(BASE_ID_COLUMN, "INTEGER"),
        ColumnDefinition::required(RELATED_ID_COLUMN, "INTEGER"),
    ];
    columns.extend(additional);
    TableDefinition::new(name, columns)
}

/// Check that a caller-supplied definition can serve as a mapping table
pub fn validate(table: &TableDefinition) -> Result<()> {
    table.validate()?;
    for required in [BASE_ID_COLUMN, RELATED_ID_COLUMN] {
        let column = table.column(required).ok_or_else(|| {
            Error::InvalidTable(format!("mapping table {} lacks column {}", table.name, required))
        })?;
        if !column.not_null || !column.sql_type.eq_ignore_ascii_case("INTEGER") {
            return Err(Error::InvalidTable(format!(
                "mapping column {}.{} must be INTEGER NOT NULL",
                table.name, required
            )));
        }
    }
    if let Some(pk) = table.primary_key_column() {
        return Err(Error::InvalidTable(format!(
            "mapping table {} must not declare a primary key, found {}",
            table.name, pk
        )));
    }
    Ok(())
}

/// Create the mapping table unless it already exists; returns true when created
pub fn ensure_created(container: &Container, table: &TableDefinition) -> Result<bool> {
    validate(table)?;
    if container.table_or_view_exists(&table.name)? {
        return Ok(false);
    }
    container.create_table(table)?;
    Ok(true)
}

/// Row access for one mapping table
pub struct MappingTable<'a> {
    container: &'a Container,
    name: String,
}

impl<'a> MappingTable<'a> {
    pub fn new(container: &'a Container, name: impl Into<String>) -> Self {
        Self {
            container,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&self, row: MappingRow) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (base_id, related_id) VALUES (?1, ?2)",
            quote_identifier(&self.name)
        );
        self.container
            .connection()
            .execute(&sql, params![row.base_id, row.related_id])
            .store_context(|| {
                format!(
                    "insert mapping ({}, {}) into {}",
                    row.base_id, row.related_id, self.name
                )
            })?;
        Ok(())
    }

    /// Rows whose `base_id` equals `base_id`, in insertion order
    pub fn query_by_base_id(&self, base_id: i64) -> Result<Vec<MappingRow>> {
        self.query_where("base_id = ?1", params![base_id], || {
            format!("query {} by base id {}", self.name, base_id)
        })
    }

    /// Rows whose `related_id` equals `related_id`, in insertion order
    pub fn query_by_related_id(&self, related_id: i64) -> Result<Vec<MappingRow>> {
        self.query_where("related_id = ?1", params![related_id], || {
            format!("query {} by related id {}", self.name, related_id)
        })
    }

    pub fn query_by_ids(&self, base_id: i64, related_id: i64) -> Result<Vec<MappingRow>> {
        self.query_where(
            "base_id = ?1 AND related_id = ?2",
            params![base_id, related_id],
            || format!("query {} by ids ({}, {})", self.name, base_id, related_id),
        )
    }

    /// Every row of the table
    pub fn query_all(&self) -> Result<Vec<MappingRow>> {
        self.query_where("1 = 1", params![], || format!("read mappings of {}", self.name))
    }

    pub fn count(&self) -> Result<usize> {
        self.count_where("1 = 1", params![])
    }

    pub fn count_by_base_id(&self, base_id: i64) -> Result<usize> {
        self.count_where("base_id = ?1", params![base_id])
    }

    pub fn count_by_related_id(&self, related_id: i64) -> Result<usize> {
        self.count_where("related_id = ?1", params![related_id])
    }

    pub fn count_by_ids(&self, base_id: i64, related_id: i64) -> Result<usize> {
        self.count_where("base_id = ?1 AND related_id = ?2", params![base_id, related_id])
    }

    pub fn delete_by_base_id(&self, base_id: i64) -> Result<usize> {
        self.delete_where("base_id = ?1", params![base_id])
    }

    pub fn delete_by_related_id(&self, related_id: i64) -> Result<usize> {
        self.delete_where("related_id = ?1", params![related_id])
    }

    pub fn delete_by_ids(&self, base_id: i64, related_id: i64) -> Result<usize> {
        self.delete_where("base_id = ?1 AND related_id = ?2", params![base_id, related_id])
    }

    fn query_where<F>(&self, clause: &str, params: &[&dyn rusqlite::ToSql], context: F) -> Result<Vec<MappingRow>>
    where
        F: Fn() -> String,
    {
        let sql = format!(
            "SELECT base_id, related_id FROM {} WHERE {} ORDER BY rowid",
            quote_identifier(&self.name),
            clause
        );
        let mut stmt = self.container.connection().prepare(&sql).store_context(&context)?;
        let rows = stmt
            .query_map(params, |row| Ok(MappingRow::new(row.get(0)?, row.get(1)?)))
            .store_context(&context)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store_context(&context)?;
        Ok(rows)
    }

    fn count_where(&self, clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_identifier(&self.name),
            clause
        );
        let count: i64 = self
            .container
            .connection()
            .query_row(&sql, params, |row| row.get(0))
            .store_context(|| format!("count mappings of {} where {}", self.name, clause))?;
        Ok(count as usize)
    }

    fn delete_where(&self, clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE {}", quote_identifier(&self.name), clause);
        self.container
            .connection()
            .execute(&sql, params)
            .store_context(|| format!("delete mappings of {} where {}", self.name, clause))
    }
}
