//! Resolvers for the reserved relation kinds

use super::framework::RelatedRowResolver;
use crate::relation::RelationType;
use crate::row::{UserRow, Value};
use crate::storage::Container;
use crate::{Error, Result};

const TILE_COLUMNS: &[&str] = &["zoom_level", "tile_column", "tile_row", "tile_data"];
const MEDIA_COLUMNS: &[&str] = &["data", "content_type"];

fn require_columns(row: &UserRow, kind: &RelationType, columns: &[&str]) -> Result<()> {
    match columns.iter().find(|c| !row.has_column(c)) {
        Some(missing) => Err(Error::InvalidTable(format!(
            "{} row {} lacks column {} required by {} relations",
            row.table_name, row.id, missing, kind
        ))),
        None => Ok(()),
    }
}

fn fetch(container: &Container, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
    let row = container.query_row_by_id(table, primary_column, id)?;
    if row.is_none() {
        tracing::debug!("Related row {} of {} not found", id, table);
    }
    Ok(row)
}

/// Rows of feature tables
pub struct FeatureResolver;

impl RelatedRowResolver for FeatureResolver {
    fn relation_type(&self) -> RelationType {
        RelationType::Features
    }

    fn fetch_related_row(&self, container: &Container, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
        fetch(container, table, primary_column, id)
    }
}

/// Rows of tile pyramid tables
pub struct TileResolver;

impl RelatedRowResolver for TileResolver {
    fn relation_type(&self) -> RelationType {
        RelationType::Tiles
    }

    fn fetch_related_row(&self, container: &Container, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
        let row = fetch(container, table, primary_column, id)?;
        if let Some(row) = &row {
            require_columns(row, &self.relation_type(), TILE_COLUMNS)?;
        }
        Ok(row)
    }
}

/// Rows of attribute tables
pub struct AttributesResolver;

impl RelatedRowResolver for AttributesResolver {
    fn relation_type(&self) -> RelationType {
        RelationType::Attributes
    }

    fn fetch_related_row(&self, container: &Container, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
        fetch(container, table, primary_column, id)
    }
}

/// Rows of media tables; each must carry `data` and `content_type`
pub struct MediaResolver;

impl RelatedRowResolver for MediaResolver {
    fn relation_type(&self) -> RelationType {
        RelationType::Media
    }

    fn fetch_related_row(&self, container: &Container, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
        let row = fetch(container, table, primary_column, id)?;
        if let Some(row) = &row {
            require_columns(row, &self.relation_type(), MEDIA_COLUMNS)?;
        }
        Ok(row)
    }
}

/// Rows of simple attribute tables; blob values are rejected
pub struct SimpleAttributesResolver;

impl RelatedRowResolver for SimpleAttributesResolver {
    fn relation_type(&self) -> RelationType {
        RelationType::SimpleAttributes
    }

    fn fetch_related_row(&self, container: &Container, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
        let row = fetch(container, table, primary_column, id)?;
        let blob_column = row
            .as_ref()
            .and_then(|r| r.iter().find(|(_, v)| matches!(v, Value::Blob(_))))
            .map(|(column, _)| column.to_string());
        if let Some(column) = blob_column {
            return Err(Error::InvalidTable(format!(
                "simple attributes row {} of {} holds a blob in {}",
                id, table, column
            )));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnDefinition, TableDefinition};

    fn container_with(sql: &str) -> Container {
        let container = Container::open_in_memory().unwrap();
        container.connection().execute_batch(sql).unwrap();
        container
    }

    #[test]
    fn test_media_resolver_reads_row() {
        let container = Container::open_in_memory().unwrap();
        container.create_table(&TableDefinition::media("photos", vec![])).unwrap();
        container
            .connection()
            .execute("INSERT INTO photos (id, data, content_type) VALUES (42, x'FFD8', 'image/jpeg')", [])
            .unwrap();

        let row = MediaResolver.fetch_related_row(&container, "photos", "id", 42).unwrap().unwrap();
        assert_eq!(row.get("content_type").and_then(Value::as_str), Some("image/jpeg"));
        assert!(MediaResolver.fetch_related_row(&container, "photos", "id", 1).unwrap().is_none());
    }

    #[test]
    fn test_media_resolver_requires_media_columns() {
        let container = container_with("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT); INSERT INTO notes VALUES (1, 'x');");
        let err = MediaResolver.fetch_related_row(&container, "notes", "id", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidTable(_)));
        assert!(AttributesResolver.fetch_related_row(&container, "notes", "id", 1).unwrap().is_some());
    }

    #[test]
    fn test_simple_attributes_rejects_blobs() {
        let container = container_with(
            "CREATE TABLE sa (id INTEGER PRIMARY KEY, v); INSERT INTO sa VALUES (1, 'ok'); INSERT INTO sa VALUES (2, x'00');",
        );
        assert!(SimpleAttributesResolver.fetch_related_row(&container, "sa", "id", 1).unwrap().is_some());
        assert!(SimpleAttributesResolver.fetch_related_row(&container, "sa", "id", 2).is_err());
    }

    #[test]
    fn test_tile_resolver_checks_tile_columns() {
        let container = Container::open_in_memory().unwrap();
        container.create_table(&TableDefinition::tiles("imagery")).unwrap();
        container
            .connection()
            .execute("INSERT INTO imagery (id, zoom_level, tile_column, tile_row, tile_data) VALUES (3, 0, 0, 0, x'01')", [])
            .unwrap();
        assert!(TileResolver.fetch_related_row(&container, "imagery", "id", 3).unwrap().is_some());

        container
            .create_table(&TableDefinition::attributes("plain", vec![ColumnDefinition::new("v", "TEXT")]))
            .unwrap();
        container.connection().execute("INSERT INTO plain (id, v) VALUES (1, 'a')", []).unwrap();
        assert!(TileResolver.fetch_related_row(&container, "plain", "id", 1).is_err());
    }

    #[test]
    fn test_feature_resolver() {
        let container = Container::open_in_memory().unwrap();
        container
            .create_table(&TableDefinition::features("roads", "geom", "BLOB", vec![]))
            .unwrap();
        container.connection().execute("INSERT INTO roads (id, geom) VALUES (5, NULL)", []).unwrap();
        let row = FeatureResolver.fetch_related_row(&container, "roads", "id", 5).unwrap().unwrap();
        assert_eq!(row.id, 5);
    }
}
