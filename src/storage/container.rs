//! SQLite container implementation
//!
//! The container is the collaborator every other component talks to: it
//! answers schema questions (does a table exist, what is its primary key,
//! what content type is registered for it) and runs DDL.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use super::schema::{self, quote_identifier};
use crate::row::{UserRow, Value};
use crate::table::{ContentsRow, TableDefinition};
use crate::{Error, Result, StoreContext};

/// A GeoPackage container backed by a single SQLite connection
pub struct Container {
    conn: Connection,
    writable: bool,
    path: Option<PathBuf>,
}

impl Container {
    /// Open a container file for writing (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let container = Self {
            conn,
            writable: true,
            path: Some(path.to_path_buf()),
        };
        container.initialize_schema()?;
        Ok(container)
    }

    /// Open an existing container without write capability
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            writable: false,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory container (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let container = Self {
            conn,
            writable: true,
            path: None,
        };
        container.initialize_schema()?;
        Ok(container)
    }

    /// Stamp the GeoPackage header and create the required tables
    fn initialize_schema(&self) -> Result<()> {
        let application_id: i32 = self
            .conn
            .query_row("PRAGMA application_id", [], |row| row.get(0))?;
        if application_id == 0 {
            self.conn
                .execute_batch(&format!("PRAGMA application_id = {}", schema::APPLICATION_ID))?;
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {}", schema::USER_VERSION))?;
        }
        for stmt in schema::required_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Whether the container was opened with write capability
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// File path, `None` for in-memory containers
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========== Schema Introspection ==========

    /// Check whether a table (not a view) exists
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        self.schema_object_exists(name, "type = 'table'")
    }

    /// Check whether a table or a view exists
    pub fn table_or_view_exists(&self, name: &str) -> Result<bool> {
        self.schema_object_exists(name, "type IN ('table', 'view')")
    }

    fn schema_object_exists(&self, name: &str, type_clause: &str) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE {} AND name = ?1 COLLATE NOCASE",
            type_clause
        );
        let count: i64 = self
            .conn
            .query_row(&sql, [name], |row| row.get(0))
            .store_context(|| format!("check existence of {}", name))?;
        Ok(count > 0)
    }

    /// Primary key column of a table, `None` when it declares none
    pub fn primary_key_column_name(&self, table: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT name FROM pragma_table_info(?1) WHERE pk = 1",
                [table],
                |row| row.get(0),
            )
            .optional()
            .store_context(|| format!("read primary key of {}", table))
    }

    /// Column names in declaration order
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let names = stmt
            .query_map([table], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .store_context(|| format!("read columns of {}", table))?;
        Ok(names)
    }

    // ========== DDL ==========

    /// Create a user table; fails if the table already exists
    pub fn create_table(&self, table: &TableDefinition) -> Result<()> {
        table.validate()?;
        if self.table_or_view_exists(&table.name)? {
            return Err(Error::InvalidTable(format!(
                "table already exists and cannot be created: {}",
                table.name
            )));
        }
        self.conn
            .execute(&table.create_sql(), [])
            .store_context(|| format!("create table {}", table.name))?;
        tracing::debug!("Created table {}", table.name);
        Ok(())
    }

    /// Drop a table or view if it exists
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        let keyword = match kind.as_deref() {
            Some("view") => "VIEW",
            Some(_) => "TABLE",
            None => return Ok(()),
        };
        self.conn
            .execute_batch(&format!("DROP {} IF EXISTS {}", keyword, quote_identifier(name)))
            .store_context(|| format!("drop {}", name))?;
        tracing::debug!("Dropped {} {}", keyword.to_lowercase(), name);
        Ok(())
    }

    /// Drop a table, logging instead of returning any failure
    pub fn drop_table_quietly(&self, name: &str) {
        if let Err(e) = self.drop_table(name) {
            tracing::warn!("Failed to drop {} during cleanup: {}", name, e);
        }
    }

    // ========== Contents ==========

    /// Register a table in `gpkg_contents`
    pub fn create_contents(&self, contents: &ContentsRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO gpkg_contents (table_name, data_type, identifier, description) VALUES (?1, ?2, ?3, ?4)",
                params![
                    contents.table_name,
                    contents.data_type,
                    contents.identifier,
                    contents.description.as_deref().unwrap_or(""),
                ],
            )
            .store_context(|| format!("register contents for {}", contents.table_name))?;
        Ok(())
    }

    /// Read the contents row of a table
    pub fn read_contents(&self, table: &str) -> Result<Option<ContentsRow>> {
        if !self.table_exists(schema::CONTENTS_TABLE)? {
            return Ok(None);
        }
        self.conn
            .query_row(
                "SELECT table_name, data_type, identifier, description, last_change FROM gpkg_contents WHERE table_name = ?1 COLLATE NOCASE",
                [table],
                |row| {
                    Ok(ContentsRow {
                        table_name: row.get(0)?,
                        data_type: row.get(1)?,
                        identifier: row.get(2)?,
                        description: row.get(3)?,
                        last_change: row.get(4)?,
                    })
                },
            )
            .optional()
            .store_context(|| format!("read contents for {}", table))
    }

    /// Remove the contents row of a table
    pub fn delete_contents(&self, table: &str) -> Result<bool> {
        if !self.table_exists(schema::CONTENTS_TABLE)? {
            return Ok(false);
        }
        let deleted = self
            .conn
            .execute("DELETE FROM gpkg_contents WHERE table_name = ?1 COLLATE NOCASE", [table])
            .store_context(|| format!("delete contents for {}", table))?;
        Ok(deleted > 0)
    }

    /// Registered content data type of a table
    pub fn table_data_type(&self, table: &str) -> Result<Option<String>> {
        Ok(self.read_contents(table)?.map(|c| c.data_type))
    }

    /// Whether the registered content data type equals `expected`
    pub fn is_table_type(&self, table: &str, expected: &str) -> Result<bool> {
        Ok(self
            .table_data_type(table)?
            .is_some_and(|t| t.eq_ignore_ascii_case(expected)))
    }

    // ========== Rows ==========

    /// Read one user row by primary key
    pub fn query_row_by_id(&self, table: &str, primary_column: &str, id: i64) -> Result<Option<UserRow>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_identifier(table),
            quote_identifier(primary_column)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .store_context(|| format!("query {} by {}", table, primary_column))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let values = stmt
            .query_row([id], |row| {
                (0..columns.len())
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .optional()
            .store_context(|| format!("read row {} of {}", id, table))?;

        Ok(values.map(|values| UserRow {
            table_name: table.to_string(),
            id,
            columns,
            values,
        }))
    }

    // ========== Transactions ==========

    /// Run `f` inside a savepoint; any error rolls back every statement
    /// executed by `f`, DDL included.
    pub fn with_savepoint<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", quote_identifier(name)))
            .store_context(|| format!("open savepoint {}", name))?;
        let mut guard = SavepointGuard {
            conn: &self.conn,
            name,
            released: false,
        };
        let value = f()?;
        guard.release()?;
        Ok(value)
    }
}

/// Rolls back its savepoint when dropped unless released
struct SavepointGuard<'a> {
    conn: &'a Connection,
    name: &'a str,
    released: bool,
}

impl SavepointGuard<'_> {
    fn release(&mut self) -> Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", quote_identifier(self.name)))
            .store_context(|| format!("release savepoint {}", self.name))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for SavepointGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let name = quote_identifier(self.name);
        let sql = format!("ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}", name);
        if let Err(e) = self.conn.execute_batch(&sql) {
            tracing::warn!("Failed to roll back savepoint {}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnDefinition, MEDIA};

    fn parcels() -> TableDefinition {
        TableDefinition::new(
            "parcels",
            vec![ColumnDefinition::primary_key("id"), ColumnDefinition::new("owner", "TEXT")],
        )
    }

    #[test]
    fn test_open_stamps_header() {
        let container = Container::open_in_memory().unwrap();
        let id: i32 = container
            .connection()
            .query_row("PRAGMA application_id", [], |row| row.get(0))
            .unwrap();
        assert_eq!(id, schema::APPLICATION_ID);
        assert!(container.table_exists(schema::CONTENTS_TABLE).unwrap());
        assert!(container.is_writable());
    }

    #[test]
    fn test_create_and_drop_table() {
        let container = Container::open_in_memory().unwrap();
        container.create_table(&parcels()).unwrap();
        assert!(container.table_exists("parcels").unwrap());
        assert_eq!(container.primary_key_column_name("parcels").unwrap().as_deref(), Some("id"));
        assert_eq!(container.column_names("parcels").unwrap(), vec!["id", "owner"]);

        assert!(matches!(container.create_table(&parcels()), Err(Error::InvalidTable(_))));

        container.drop_table("parcels").unwrap();
        assert!(!container.table_exists("parcels").unwrap());
        // dropping again is a no-op
        container.drop_table("parcels").unwrap();
    }

    #[test]
    fn test_views_count_as_tables_for_existence() {
        let container = Container::open_in_memory().unwrap();
        container.create_table(&parcels()).unwrap();
        container
            .connection()
            .execute_batch("CREATE VIEW parcel_view AS SELECT * FROM parcels")
            .unwrap();
        assert!(container.table_or_view_exists("parcel_view").unwrap());
        assert!(!container.table_exists("parcel_view").unwrap());
        assert_eq!(container.primary_key_column_name("parcel_view").unwrap(), None);
        container.drop_table("parcel_view").unwrap();
        assert!(!container.table_or_view_exists("parcel_view").unwrap());
    }

    #[test]
    fn test_contents_type_check() {
        let container = Container::open_in_memory().unwrap();
        container.create_contents(&ContentsRow::new("photos", MEDIA)).unwrap();
        assert!(container.is_table_type("photos", "media").unwrap());
        assert!(!container.is_table_type("photos", "tiles").unwrap());
        assert!(!container.is_table_type("unknown", "media").unwrap());

        let contents = container.read_contents("photos").unwrap().unwrap();
        assert_eq!(contents.identifier.as_deref(), Some("photos"));
        assert!(contents.last_change.is_some());

        assert!(container.delete_contents("photos").unwrap());
        assert_eq!(container.table_data_type("photos").unwrap(), None);
    }

    #[test]
    fn test_query_row_by_id() {
        let container = Container::open_in_memory().unwrap();
        container.create_table(&parcels()).unwrap();
        container
            .connection()
            .execute("INSERT INTO parcels (id, owner) VALUES (7, 'ada')", [])
            .unwrap();

        let row = container.query_row_by_id("parcels", "id", 7).unwrap().unwrap();
        assert_eq!(row.get("owner"), Some(&Value::Text("ada".into())));
        assert!(container.query_row_by_id("parcels", "id", 8).unwrap().is_none());
    }

    #[test]
    fn test_savepoint_rolls_back_ddl_on_error() {
        let container = Container::open_in_memory().unwrap();
        let result: Result<()> = container.with_savepoint("test", || {
            container.create_table(&parcels())?;
            Err(Error::InvalidRelation("boom".into()))
        });
        assert!(result.is_err());
        assert!(!container.table_exists("parcels").unwrap());

        container
            .with_savepoint("test", || container.create_table(&parcels()))
            .unwrap();
        assert!(container.table_exists("parcels").unwrap());
    }

    #[test]
    fn test_read_only_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.gpkg");
        {
            let container = Container::open(&path).unwrap();
            container.create_table(&parcels()).unwrap();
        }
        let container = Container::open_read_only(&path).unwrap();
        assert!(!container.is_writable());
        assert!(container.table_exists("parcels").unwrap());
        assert_eq!(container.path(), Some(path.as_path()));
    }
}
