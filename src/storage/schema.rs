//! Database schema definitions
//!
//! Static DDL for the container tables the relation engine touches. Each
//! table is created lazily by the component that owns it, never all at once.

/// Name of the spatial reference system table
pub const SPATIAL_REF_SYS_TABLE: &str = "gpkg_spatial_ref_sys";

/// Name of the contents table
pub const CONTENTS_TABLE: &str = "gpkg_contents";

/// Name of the extensions table
pub const EXTENSIONS_TABLE: &str = "gpkg_extensions";

/// Name of the extended relations catalog table
pub const RELATIONS_TABLE: &str = "gpkgext_relations";

/// `PRAGMA application_id` value ("GPKG" as a big-endian integer)
pub const APPLICATION_ID: i32 = 0x4750_4B47;

/// `PRAGMA user_version` for GeoPackage 1.3
pub const USER_VERSION: i32 = 10300;

/// SQL to create the spatial reference system table
pub const CREATE_SPATIAL_REF_SYS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
)
"#;

/// SQL to create the contents table
pub const CREATE_CONTENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
)
"#;

/// SQL to create the extensions table
pub const CREATE_EXTENSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS gpkg_extensions (
    table_name TEXT,
    column_name TEXT,
    extension_name TEXT NOT NULL,
    definition TEXT NOT NULL,
    scope TEXT NOT NULL,
    CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
)
"#;

/// SQL to create the extended relations catalog
///
/// `mapping_table_name` is unique: it is the de-duplication key of a
/// relationship.
pub const CREATE_RELATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS gpkgext_relations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    base_table_name TEXT NOT NULL,
    base_primary_column TEXT NOT NULL DEFAULT 'id',
    related_table_name TEXT NOT NULL,
    related_primary_column TEXT NOT NULL DEFAULT 'id',
    relation_name TEXT NOT NULL,
    mapping_table_name TEXT NOT NULL UNIQUE
)
"#;

/// Statements run when a writable container is opened
pub fn required_schema_statements() -> Vec<&'static str> {
    vec![CREATE_SPATIAL_REF_SYS_TABLE, CREATE_CONTENTS_TABLE]
}

/// Quote an identifier for use in dynamically built SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
