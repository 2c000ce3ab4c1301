//! Storage Layer - SQLite-backed GeoPackage persistence
//!
//! System of record is the container's SQLite database with tables:
//! - gpkg_contents(table_name, data_type, identifier, ...)
//! - gpkg_extensions(table_name, column_name, extension_name, definition, scope)
//! - gpkgext_relations(id, base_table_name, ..., relation_name, mapping_table_name)
//! - one mapping table per relationship (base_id, related_id)

pub mod catalog;
pub mod container;
pub mod extensions;
pub mod mapping;
pub mod schema;

pub use catalog::RelationCatalog;
pub use container::Container;
pub use extensions::{
    ExtensionRecord, ExtensionRegistry, ExtensionScope, RELATED_TABLES_DEFINITION,
    RELATED_TABLES_EXTENSION,
};
pub use mapping::MappingTable;
