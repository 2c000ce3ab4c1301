//! # gpkg-related - Related tables for GeoPackage containers
//!
//! Links arbitrary tables of a GeoPackage through typed or custom
//! many-to-many relationships, on top of a store that enforces no
//! cross-table referential integrity for them.
//!
//! gpkg-related provides:
//! - A durable relation catalog (`gpkgext_relations`)
//! - Generic two-column mapping tables, one per relationship
//! - An extension ledger (`gpkg_extensions`) of participating tables
//! - An orchestrator that validates, creates and removes relationships
//! - Polymorphic resolution of related rows through pluggable resolvers

pub mod config;
pub mod graph;
pub mod relation;
pub mod resolver;
pub mod row;
pub mod storage;
pub mod table;
pub mod ui;

// Re-exports for convenient access
pub use graph::{
    MappingTarget, RelatedRow, RelatedRows, RelatedTarget, RelationGraph, RelationRequest, RelationStats,
};
pub use relation::{ExtendedRelation, RelationFilter, RelationType};
pub use resolver::{RelatedRowResolver, ResolverRegistry, default_registry};
pub use row::{MappingRow, MediaRow, UserRow, Value};
pub use storage::Container;
pub use table::{ColumnDefinition, ContentsRow, TableDefinition};

/// Result type alias for gpkg-related operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gpkg-related operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("No primary key found for table {0}")]
    NoPrimaryKey(String),

    #[error("Related table {table} must be a {expected} table, found {actual}")]
    RelationTypeMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("Mapping table {0} is already used by another relationship")]
    DuplicateMapping(String),

    #[error("No row resolver registered for relation type {0}")]
    UnresolvableRelationType(String),

    #[error("Container is read-only, cannot {0}")]
    ReadOnlyViolation(String),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error("Failed to {context}: {source}")]
    StoreFailure {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attach operation context to raw store results
pub trait StoreContext<T> {
    fn store_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> StoreContext<T> for std::result::Result<T, rusqlite::Error> {
    fn store_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| Error::StoreFailure {
            context: context(),
            source,
        })
    }
}

/// Check whether a store error is a UNIQUE / constraint violation
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
