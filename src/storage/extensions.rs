//! Extension ledger stored in `gpkg_extensions`

use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::container::Container;
use super::schema;
use crate::{Error, Result, StoreContext};

/// Extension name of the related tables capability
pub const RELATED_TABLES_EXTENSION: &str = "related_tables";

/// Definition URI of the related tables capability
pub const RELATED_TABLES_DEFINITION: &str = "http://www.geopackage.org/18-000.html";

/// Scope of an extension record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtensionScope {
    ReadOnly,
    ReadWrite,
}

impl ExtensionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionScope::ReadOnly => "read-only",
            ExtensionScope::ReadWrite => "read-write",
        }
    }
}

impl FromStr for ExtensionScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read-only" => Ok(ExtensionScope::ReadOnly),
            "read-write" => Ok(ExtensionScope::ReadWrite),
            _ => Err(Error::InvalidTable(format!("Unknown extension scope: {}", s))),
        }
    }
}

impl std::fmt::Display for ExtensionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of `gpkg_extensions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// `None` for container-wide extensions
    pub table_name: Option<String>,
    /// `None` for table-scoped registrations
    pub column_name: Option<String>,
    pub extension_name: String,
    pub definition: String,
    pub scope: ExtensionScope,
}

/// Get-or-create access to the extension ledger
pub struct ExtensionRegistry<'a> {
    container: &'a Container,
}

impl<'a> ExtensionRegistry<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Fail with `ReadOnlyViolation` unless the container is writable
    pub fn verify_writable(&self, operation: &str) -> Result<()> {
        if self.container.is_writable() {
            Ok(())
        } else {
            Err(Error::ReadOnlyViolation(operation.to_string()))
        }
    }

    /// Whether `gpkg_extensions` exists
    pub fn is_table_exists(&self) -> Result<bool> {
        self.container.table_exists(schema::EXTENSIONS_TABLE)
    }

    fn create_table(&self) -> Result<()> {
        self.container
            .connection()
            .execute(schema::CREATE_EXTENSIONS_TABLE, [])
            .store_context(|| "create gpkg_extensions".to_string())?;
        Ok(())
    }

    /// Return the matching record, inserting it first if absent
    pub fn get_or_create(
        &self,
        extension_name: &str,
        table_name: Option<&str>,
        column_name: Option<&str>,
        definition: &str,
        scope: ExtensionScope,
    ) -> Result<ExtensionRecord> {
        self.verify_writable("register extension")?;
        self.create_table()?;

        if let Some(existing) = self.get(extension_name, table_name, column_name)? {
            return Ok(existing);
        }

        self.container
            .connection()
            .execute(
                "INSERT INTO gpkg_extensions (table_name, column_name, extension_name, definition, scope) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![table_name, column_name, extension_name, definition, scope.as_str()],
            )
            .store_context(|| {
                format!(
                    "register extension {} for {}",
                    extension_name,
                    table_name.unwrap_or("<container>")
                )
            })?;
        tracing::debug!(
            "Registered extension {} for table {:?} column {:?}",
            extension_name,
            table_name,
            column_name
        );

        Ok(ExtensionRecord {
            table_name: table_name.map(String::from),
            column_name: column_name.map(String::from),
            extension_name: extension_name.to_string(),
            definition: definition.to_string(),
            scope,
        })
    }

    /// Look up one record; `None` arguments match NULL columns
    pub fn get(
        &self,
        extension_name: &str,
        table_name: Option<&str>,
        column_name: Option<&str>,
    ) -> Result<Option<ExtensionRecord>> {
        if !self.is_table_exists()? {
            return Ok(None);
        }
        self.container
            .connection()
            .query_row(
                "SELECT table_name, column_name, extension_name, definition, scope FROM gpkg_extensions \
                 WHERE extension_name = ?1 AND table_name IS ?2 AND column_name IS ?3",
                params![extension_name, table_name, column_name],
                row_to_record,
            )
            .optional()
            .store_context(|| format!("query extension {}", extension_name))
    }

    /// Whether a matching record exists
    pub fn has_extension(
        &self,
        extension_name: &str,
        table_name: Option<&str>,
        column_name: Option<&str>,
    ) -> Result<bool> {
        Ok(self.get(extension_name, table_name, column_name)?.is_some())
    }

    /// All records of an extension
    pub fn records_for(&self, extension_name: &str) -> Result<Vec<ExtensionRecord>> {
        if !self.is_table_exists()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.container.connection().prepare(
            "SELECT table_name, column_name, extension_name, definition, scope FROM gpkg_extensions \
             WHERE extension_name = ?1 ORDER BY rowid",
        )?;
        let records = stmt
            .query_map([extension_name], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store_context(|| format!("list records of extension {}", extension_name))?;
        Ok(records)
    }

    /// Delete every record of an extension
    pub fn delete_by_extension(&self, extension_name: &str) -> Result<usize> {
        self.verify_writable("delete extension records")?;
        if !self.is_table_exists()? {
            return Ok(0);
        }
        let deleted = self
            .container
            .connection()
            .execute("DELETE FROM gpkg_extensions WHERE extension_name = ?1", [extension_name])
            .store_context(|| format!("delete records of extension {}", extension_name))?;
        Ok(deleted)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ExtensionRecord> {
    let scope_str: String = row.get(4)?;
    let scope: ExtensionScope = scope_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ExtensionRecord {
        table_name: row.get(0)?,
        column_name: row.get(1)?,
        extension_name: row.get(2)?,
        definition: row.get(3)?,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let container = Container::open_in_memory().unwrap();
        let registry = ExtensionRegistry::new(&container);

        for _ in 0..2 {
            let record = registry
                .get_or_create(
                    RELATED_TABLES_EXTENSION,
                    Some("gpkgext_relations"),
                    None,
                    RELATED_TABLES_DEFINITION,
                    ExtensionScope::ReadWrite,
                )
                .unwrap();
            assert_eq!(record.scope, ExtensionScope::ReadWrite);
        }
        assert_eq!(registry.records_for(RELATED_TABLES_EXTENSION).unwrap().len(), 1);
    }

    #[test]
    fn test_has_extension_matches_null_columns() {
        let container = Container::open_in_memory().unwrap();
        let registry = ExtensionRegistry::new(&container);
        assert!(!registry.has_extension("ext", Some("t"), None).unwrap());

        registry
            .get_or_create("ext", Some("t"), Some("geom"), "def", ExtensionScope::ReadOnly)
            .unwrap();
        assert!(registry.has_extension("ext", Some("t"), Some("geom")).unwrap());
        assert!(!registry.has_extension("ext", Some("t"), None).unwrap());
        assert!(!registry.has_extension("other", Some("t"), Some("geom")).unwrap());
    }

    #[test]
    fn test_delete_by_extension() {
        let container = Container::open_in_memory().unwrap();
        let registry = ExtensionRegistry::new(&container);
        registry.get_or_create("a", Some("t1"), None, "d", ExtensionScope::ReadWrite).unwrap();
        registry.get_or_create("a", Some("t2"), None, "d", ExtensionScope::ReadWrite).unwrap();
        registry.get_or_create("b", Some("t1"), None, "d", ExtensionScope::ReadWrite).unwrap();

        assert_eq!(registry.delete_by_extension("a").unwrap(), 2);
        assert!(registry.records_for("a").unwrap().is_empty());
        assert_eq!(registry.records_for("b").unwrap().len(), 1);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("read-only".parse::<ExtensionScope>().unwrap(), ExtensionScope::ReadOnly);
        assert!("write".parse::<ExtensionScope>().is_err());
    }
}
