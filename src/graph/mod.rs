//! Relation Graph - orchestrates relationships between container tables
//!
//! The graph owns no state of its own. Relationships live in the relation
//! catalog, participating tables are recorded in the extension ledger and
//! pairs live in one mapping table per relationship. The graph validates
//! requests against the container schema, keeps those three stores
//! consistent and resolves related rows through the resolver registry.

pub mod request;

pub use request::{MappingTarget, RelatedTarget, RelationRequest};

use serde::Serialize;

use crate::relation::{ExtendedRelation, RelationFilter, RelationType};
use crate::resolver::{ResolverRegistry, default_registry};
use crate::row::{MappingRow, UserRow};
use crate::storage::mapping::{self, MappingTable};
use crate::storage::{
    Container, ExtensionRegistry, ExtensionScope, RELATED_TABLES_DEFINITION,
    RELATED_TABLES_EXTENSION, RelationCatalog, schema,
};
use crate::table::{ContentsRow, TableDefinition};
use crate::{Error, Result};

/// A mapping row paired with the related row it points at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedRow {
    pub mapping: MappingRow,
    /// `None` when no related row carries the mapped id
    pub row: Option<UserRow>,
}

/// Resolved rows of one relationship
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedRows {
    pub relation: ExtendedRelation,
    pub rows: Vec<RelatedRow>,
}

/// Orchestrates the relation catalog, the extension ledger and mapping tables
pub struct RelationGraph<'a> {
    container: &'a Container,
    catalog: RelationCatalog<'a>,
    extensions: ExtensionRegistry<'a>,
    resolvers: ResolverRegistry,
}

impl<'a> RelationGraph<'a> {
    /// Create a graph with the default resolvers
    pub fn new(container: &'a Container) -> Self {
        Self::from_parts(
            container,
            RelationCatalog::new(container),
            ExtensionRegistry::new(container),
            default_registry(),
        )
    }

    pub fn from_parts(
        container: &'a Container,
        catalog: RelationCatalog<'a>,
        extensions: ExtensionRegistry<'a>,
        resolvers: ResolverRegistry,
    ) -> Self {
        Self {
            container,
            catalog,
            extensions,
            resolvers,
        }
    }

    /// Replace the resolver registry
    pub fn with_resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    pub fn resolvers_mut(&mut self) -> &mut ResolverRegistry {
        &mut self.resolvers
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    // ========== Setup ==========

    /// Create the relation catalog and register it as an extension target.
    ///
    /// Returns true when the catalog table was created by this call.
    pub fn create_catalog_table_if_absent(&self) -> Result<bool> {
        self.extensions.verify_writable("create the relation catalog")?;
        let created = self.catalog.create_table()?;
        self.extensions.get_or_create(
            RELATED_TABLES_EXTENSION,
            Some(schema::RELATIONS_TABLE),
            None,
            RELATED_TABLES_DEFINITION,
            ExtensionScope::ReadWrite,
        )?;
        if created {
            tracing::info!("Created relation catalog {}", schema::RELATIONS_TABLE);
        }
        Ok(created)
    }

    /// Create a mapping table and register it as an extension target.
    ///
    /// Returns true when the table was created by this call.
    pub fn create_mapping_table(&self, mapping: impl Into<MappingTarget>) -> Result<bool> {
        self.extensions.verify_writable("create mapping table")?;
        let definition = mapping.into().definition();
        self.create_catalog_table_if_absent()?;
        let created = mapping::ensure_created(self.container, &definition)?;
        self.extensions.get_or_create(
            RELATED_TABLES_EXTENSION,
            Some(&definition.name),
            None,
            RELATED_TABLES_DEFINITION,
            ExtensionScope::ReadWrite,
        )?;
        Ok(created)
    }

    /// Create a related table and its contents row unless the table exists.
    ///
    /// When the contents row cannot be written the new table is dropped again
    /// before the error is returned.
    pub fn create_related_table(&self, table: &TableDefinition) -> Result<bool> {
        self.extensions.verify_writable("create related table")?;
        if self.container.table_or_view_exists(&table.name)? {
            return Ok(false);
        }
        let data_type = table.data_type.as_deref().ok_or_else(|| {
            Error::InvalidTable(format!("related table {} has no data type", table.name))
        })?;

        self.container.create_table(table)?;
        if let Err(e) = self
            .container
            .create_contents(&ContentsRow::new(table.name.as_str(), data_type))
        {
            self.container.drop_table_quietly(&table.name);
            return Err(e);
        }
        tracing::debug!("Created related {} table {}", data_type, table.name);
        Ok(true)
    }

    // ========== Adding ==========

    /// Add a relationship, creating whatever it needs.
    ///
    /// Adding an identical relationship twice returns the first catalog row.
    /// Every step runs inside one savepoint, so a failure leaves the
    /// container as it was.
    pub fn add_relationship(&self, request: RelationRequest) -> Result<ExtendedRelation> {
        self.extensions.verify_writable("add relationship")?;
        let relation_type = request.relation_type()?;
        self.container.with_savepoint("add_relationship", || {
            self.add_relationship_steps(&request, &relation_type)
        })
    }

    fn add_relationship_steps(
        &self,
        request: &RelationRequest,
        relation_type: &RelationType,
    ) -> Result<ExtendedRelation> {
        if let RelatedTarget::Definition(definition) = &request.related {
            self.create_related_table(definition)?;
        }

        let base_table = request.base_table.as_str();
        let related_table = request.related_table_name();
        self.validate_relationship(base_table, related_table, relation_type)?;

        let candidate = ExtendedRelation {
            id: 0,
            base_table_name: base_table.to_string(),
            base_primary_column: self.primary_key_column_name(base_table)?,
            related_table_name: related_table.to_string(),
            related_primary_column: self.primary_key_column_name(related_table)?,
            relation_name: relation_type.name().to_string(),
            mapping_table_name: request.mapping_table_name().to_string(),
        };

        self.create_mapping_table(request.mapping.clone())?;

        let existing = self.catalog.get_relations(&RelationFilter::exact(&candidate))?;
        if let Some(relation) = existing.into_iter().next() {
            tracing::debug!("Relationship already cataloged with id {}", relation.id);
            return Ok(relation);
        }

        let id = self.catalog.create(&candidate)?;
        let relation = ExtendedRelation { id, ..candidate };
        tracing::info!("Added relationship {}: {}", relation.id, relation);
        Ok(relation)
    }

    fn validate_relationship(
        &self,
        base_table: &str,
        related_table: &str,
        relation_type: &RelationType,
    ) -> Result<()> {
        for table in [base_table, related_table] {
            if !self.container.table_or_view_exists(table)? {
                return Err(Error::TableNotFound(table.to_string()));
            }
        }
        let Some(expected) = relation_type.data_type() else {
            return Ok(());
        };
        if !self.container.is_table_type(related_table, expected)? {
            let actual = self
                .container
                .table_data_type(related_table)?
                .unwrap_or_else(|| "unregistered".to_string());
            return Err(Error::RelationTypeMismatch {
                table: related_table.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Primary key column of a table, `NoPrimaryKey` when none is declared
    pub fn primary_key_column_name(&self, table: &str) -> Result<String> {
        self.container
            .primary_key_column_name(table)?
            .ok_or_else(|| Error::NoPrimaryKey(table.to_string()))
    }

    // ========== Removing ==========

    /// Remove every relationship between two tables with the given relation
    pub fn remove_relationship(
        &self,
        base_table: &str,
        related_table: &str,
        relation: &RelationType,
    ) -> Result<()> {
        let filter = RelationFilter::new()
            .base_table(base_table)
            .related_table(related_table)
            .relation(relation);
        self.remove_matching(&filter)
    }

    /// Remove one relationship: its mapping table, then its catalog row
    pub fn remove_relation(&self, relation: &ExtendedRelation) -> Result<()> {
        self.extensions.verify_writable("remove relationship")?;
        if !self.catalog.is_table_exists()? {
            return Ok(());
        }
        self.container.with_savepoint("remove_relation", || {
            self.container.drop_table(&relation.mapping_table_name)?;
            if self.catalog.delete(relation)? {
                tracing::info!("Removed relationship {}: {}", relation.id, relation);
            }
            Ok(())
        })
    }

    /// Remove every relationship where `table` is base or related
    pub fn remove_relationships(&self, table: &str) -> Result<()> {
        self.extensions.verify_writable("remove relationships")?;
        if !self.catalog.is_table_exists()? {
            return Ok(());
        }
        for relation in self.catalog.get_table_relations(table)? {
            self.remove_relation(&relation)?;
        }
        Ok(())
    }

    /// Remove the relationship backed by a mapping table
    pub fn remove_relationships_with_mapping_table(&self, mapping_table: &str) -> Result<()> {
        self.remove_matching(&RelationFilter::new().mapping_table(mapping_table))
    }

    fn remove_matching(&self, filter: &RelationFilter) -> Result<()> {
        self.extensions.verify_writable("remove relationships")?;
        if !self.catalog.is_table_exists()? {
            return Ok(());
        }
        for relation in self.catalog.get_relations(filter)? {
            self.remove_relation(&relation)?;
        }
        Ok(())
    }

    /// Remove every trace of related tables from the container
    pub fn remove_extension(&self) -> Result<()> {
        self.extensions.verify_writable("remove the related tables extension")?;
        self.container.with_savepoint("remove_extension", || {
            if self.catalog.is_table_exists()? {
                let relations = self.catalog.query_all()?;
                for relation in &relations {
                    self.container.drop_table(&relation.mapping_table_name)?;
                }
                self.catalog.drop_table()?;
                tracing::info!("Dropped relation catalog and {} mapping tables", relations.len());
            }
            let records = self.extensions.delete_by_extension(RELATED_TABLES_EXTENSION)?;
            tracing::info!("Deleted {} {} extension records", records, RELATED_TABLES_EXTENSION);
            Ok(())
        })
    }

    // ========== Queries ==========

    /// Whether the catalog exists and is registered as an extension target
    pub fn has_extension(&self) -> Result<bool> {
        Ok(self.catalog.is_table_exists()?
            && self.extensions.has_extension(
                RELATED_TABLES_EXTENSION,
                Some(schema::RELATIONS_TABLE),
                None,
            )?)
    }

    pub fn has_extension_for_mapping_table(&self, mapping_table: &str) -> Result<bool> {
        Ok(self.has_extension()?
            && self
                .extensions
                .has_extension(RELATED_TABLES_EXTENSION, Some(mapping_table), None)?)
    }

    /// Every cataloged relationship; empty when there is no catalog
    pub fn relationships(&self) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new())
    }

    pub fn get_relations(&self, filter: &RelationFilter) -> Result<Vec<ExtendedRelation>> {
        if !self.catalog.is_table_exists()? {
            return Ok(Vec::new());
        }
        self.catalog.get_relations(filter)
    }

    pub fn has_relations(&self, filter: &RelationFilter) -> Result<bool> {
        Ok(!self.get_relations(filter)?.is_empty())
    }

    pub fn get_base_table_relations(&self, table: &str) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new().base_table(table))
    }

    pub fn has_base_table_relations(&self, table: &str) -> Result<bool> {
        Ok(!self.get_base_table_relations(table)?.is_empty())
    }

    pub fn get_related_table_relations(&self, table: &str) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new().related_table(table))
    }

    pub fn has_related_table_relations(&self, table: &str) -> Result<bool> {
        Ok(!self.get_related_table_relations(table)?.is_empty())
    }

    pub fn get_table_relations(&self, table: &str) -> Result<Vec<ExtendedRelation>> {
        if !self.catalog.is_table_exists()? {
            return Ok(Vec::new());
        }
        self.catalog.get_table_relations(table)
    }

    pub fn has_table_relations(&self, table: &str) -> Result<bool> {
        Ok(!self.get_table_relations(table)?.is_empty())
    }

    // ========== Row Resolution ==========

    /// Rows related to one base row, grouped by relationship.
    ///
    /// `types` restricts the relationships considered. Fails with
    /// `UnresolvableRelationType` when a considered relationship has no
    /// registered resolver.
    pub fn get_related_rows(
        &self,
        base_table: &str,
        base_id: i64,
        types: Option<&[RelationType]>,
    ) -> Result<Vec<RelatedRows>> {
        let mut results = Vec::new();
        for relation in self.get_base_table_relations(base_table)? {
            let relation_type = relation.relation_type();
            if types.is_some_and(|t| !t.contains(&relation_type)) {
                continue;
            }
            let resolver = self.resolvers.require(&relation_type)?;
            tracing::debug!(
                "Resolving {} rows of {} for {} {}",
                relation_type,
                relation.related_table_name,
                base_table,
                base_id
            );

            let mappings = MappingTable::new(self.container, relation.mapping_table_name.as_str())
                .query_by_base_id(base_id)?;
            let rows = mappings
                .into_iter()
                .map(|mapping| {
                    let row = resolver.fetch_related_row(
                        self.container,
                        &relation.related_table_name,
                        &relation.related_primary_column,
                        mapping.related_id,
                    )?;
                    Ok(RelatedRow { mapping, row })
                })
                .collect::<Result<Vec<_>>>()?;
            results.push(RelatedRows { relation, rows });
        }
        Ok(results)
    }

    // ========== Mapping Rows ==========

    pub fn insert_mapping(&self, mapping_table: &str, row: MappingRow) -> Result<()> {
        self.extensions.verify_writable("insert mapping")?;
        MappingTable::new(self.container, mapping_table).insert(row)
    }

    /// Related ids mapped from a base id
    pub fn get_mappings_for_base(&self, mapping_table: &str, base_id: i64) -> Result<Vec<i64>> {
        Ok(MappingTable::new(self.container, mapping_table)
            .query_by_base_id(base_id)?
            .into_iter()
            .map(|m| m.related_id)
            .collect())
    }

    /// Base ids mapped to a related id
    pub fn get_mappings_for_related(&self, mapping_table: &str, related_id: i64) -> Result<Vec<i64>> {
        Ok(MappingTable::new(self.container, mapping_table)
            .query_by_related_id(related_id)?
            .into_iter()
            .map(|m| m.base_id)
            .collect())
    }

    pub fn has_mapping(&self, mapping_table: &str, base_id: i64, related_id: i64) -> Result<bool> {
        Ok(MappingTable::new(self.container, mapping_table).count_by_ids(base_id, related_id)? > 0)
    }

    /// Delete every copy of one pair from a mapping table
    pub fn delete_mapping(&self, mapping_table: &str, base_id: i64, related_id: i64) -> Result<usize> {
        self.extensions.verify_writable("delete mapping")?;
        MappingTable::new(self.container, mapping_table).delete_by_ids(base_id, related_id)
    }

    /// Mapping rows, across every relationship with `table` as base, whose base id is `id`
    pub fn count_mappings_to_base(&self, table: &str, id: i64) -> Result<usize> {
        let mut count = 0;
        for relation in self.get_base_table_relations(table)? {
            count += self.mapping_table(&relation).count_by_base_id(id)?;
        }
        Ok(count)
    }

    pub fn has_mapping_to_base(&self, table: &str, id: i64) -> Result<bool> {
        Ok(self.count_mappings_to_base(table, id)? > 0)
    }

    pub fn delete_mappings_to_base(&self, table: &str, id: i64) -> Result<usize> {
        self.extensions.verify_writable("delete mappings")?;
        let mut deleted = 0;
        for relation in self.get_base_table_relations(table)? {
            deleted += self.mapping_table(&relation).delete_by_base_id(id)?;
        }
        Ok(deleted)
    }

    /// Mapping rows, across every relationship with `table` as related, whose related id is `id`
    pub fn count_mappings_to_related(&self, table: &str, id: i64) -> Result<usize> {
        let mut count = 0;
        for relation in self.get_related_table_relations(table)? {
            count += self.mapping_table(&relation).count_by_related_id(id)?;
        }
        Ok(count)
    }

    pub fn has_mapping_to_related(&self, table: &str, id: i64) -> Result<bool> {
        Ok(self.count_mappings_to_related(table, id)? > 0)
    }

    pub fn delete_mappings_to_related(&self, table: &str, id: i64) -> Result<usize> {
        self.extensions.verify_writable("delete mappings")?;
        let mut deleted = 0;
        for relation in self.get_related_table_relations(table)? {
            deleted += self.mapping_table(&relation).delete_by_related_id(id)?;
        }
        Ok(deleted)
    }

    /// Mapping rows referencing a table row from either side
    pub fn count_mappings(&self, table: &str, id: i64) -> Result<usize> {
        Ok(self.count_mappings_to_base(table, id)? + self.count_mappings_to_related(table, id)?)
    }

    pub fn has_mappings(&self, table: &str, id: i64) -> Result<bool> {
        Ok(self.count_mappings(table, id)? > 0)
    }

    /// Delete mapping rows referencing a table row from either side.
    ///
    /// Call this when deleting the row itself; the container does not
    /// cascade into mapping tables.
    pub fn delete_mappings(&self, table: &str, id: i64) -> Result<usize> {
        let deleted = self.delete_mappings_to_base(table, id)? + self.delete_mappings_to_related(table, id)?;
        tracing::debug!("Deleted {} mappings of {} {}", deleted, table, id);
        Ok(deleted)
    }

    fn mapping_table(&self, relation: &ExtendedRelation) -> MappingTable<'a> {
        MappingTable::new(self.container, relation.mapping_table_name.as_str())
    }

    // ========== Statistics ==========

    pub fn stats(&self) -> Result<RelationStats> {
        let relations = self.relationships()?;
        let mut mapping_rows = 0;
        for relation in &relations {
            mapping_rows += self.mapping_table(relation).count()?;
        }
        let extension_records = self.extensions.records_for(RELATED_TABLES_EXTENSION)?.len();
        Ok(RelationStats {
            relations: relations.len(),
            custom_relations: relations
                .iter()
                .filter(|r| !r.relation_type().is_reserved())
                .count(),
            mapping_rows,
            extension_records,
        })
    }
}

/// Statistics about the relationships of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationStats {
    pub relations: usize,
    pub custom_relations: usize,
    pub mapping_rows: usize,
    pub extension_records: usize,
}

impl std::fmt::Display for RelationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Relation Statistics:")?;
        writeln!(f, "  Relations: {} (custom: {})", self.relations, self.custom_relations)?;
        writeln!(f, "  Mapping rows: {}", self.mapping_rows)?;
        writeln!(f, "  Extension records: {}", self.extension_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AttributesResolver;
    use crate::row::Value;
    use crate::table::{ATTRIBUTES, ColumnDefinition};

    fn container() -> Container {
        let container = Container::open_in_memory().unwrap();
        add_attributes_table(&container, "parcels");
        container
    }

    fn add_attributes_table(container: &Container, name: &str) {
        container
            .create_table(&TableDefinition::attributes(name, vec![ColumnDefinition::new("label", "TEXT")]))
            .unwrap();
        container.create_contents(&ContentsRow::new(name, ATTRIBUTES)).unwrap();
    }

    fn photos() -> TableDefinition {
        TableDefinition::media("photos", vec![])
    }

    fn insert_photo(container: &Container, id: i64) {
        container
            .connection()
            .execute(
                "INSERT INTO photos (id, data, content_type) VALUES (?1, x'FFD8', 'image/jpeg')",
                [id],
            )
            .unwrap();
    }

    #[test]
    fn test_end_to_end_media_relationship() {
        let container = container();
        let graph = RelationGraph::new(&container);

        let relation = graph
            .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
            .unwrap();
        assert!(relation.id > 0);
        assert_eq!(relation.base_table_name, "parcels");
        assert_eq!(relation.base_primary_column, "id");
        assert_eq!(relation.related_table_name, "photos");
        assert_eq!(relation.related_primary_column, "id");
        assert_eq!(relation.relation_name, "media");
        assert_eq!(relation.mapping_table_name, "parcels_photos");

        assert_eq!(
            container.column_names("parcels_photos").unwrap(),
            vec!["base_id", "related_id"]
        );
        assert!(container.is_table_type("photos", "media").unwrap());

        let records: Vec<(Option<String>, Option<String>)> = graph
            .extensions
            .records_for(RELATED_TABLES_EXTENSION)
            .unwrap()
            .into_iter()
            .map(|r| (r.table_name, r.column_name))
            .collect();
        assert_eq!(
            records,
            vec![
                (Some("gpkgext_relations".to_string()), None),
                (Some("parcels_photos".to_string()), None),
            ]
        );
        assert!(graph.has_extension().unwrap());
        assert!(graph.has_extension_for_mapping_table("parcels_photos").unwrap());

        graph.insert_mapping("parcels_photos", MappingRow::new(7, 42)).unwrap();
        assert_eq!(graph.get_mappings_for_base("parcels_photos", 7).unwrap(), vec![42]);
        assert_eq!(graph.get_mappings_for_related("parcels_photos", 42).unwrap(), vec![7]);
        assert!(graph.has_mapping("parcels_photos", 7, 42).unwrap());

        graph.insert_mapping("parcels_photos", MappingRow::new(7, 42)).unwrap();
        assert_eq!(graph.delete_mapping("parcels_photos", 7, 42).unwrap(), 2);
        assert!(!graph.has_mapping("parcels_photos", 7, 42).unwrap());
    }

    #[test]
    fn test_add_is_idempotent() {
        let container = container();
        let graph = RelationGraph::new(&container);

        let first = graph
            .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
            .unwrap();
        let second = graph
            .add_relationship(RelationRequest::media("parcels", "photos", "parcels_photos"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.relationships().unwrap().len(), 1);
        assert_eq!(graph.extensions.records_for(RELATED_TABLES_EXTENSION).unwrap().len(), 2);
    }

    #[test]
    fn test_type_mismatch() {
        let container = container();
        let graph = RelationGraph::new(&container);
        graph.create_related_table(&photos()).unwrap();

        let err = graph
            .add_relationship(RelationRequest::tiles("parcels", "photos", "m1"))
            .unwrap_err();
        match err {
            Error::RelationTypeMismatch { table, expected, actual } => {
                assert_eq!(table, "photos");
                assert_eq!(expected, "tiles");
                assert_eq!(actual, "media");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!container.table_exists("m1").unwrap());
        assert!(graph.relationships().unwrap().is_empty());
    }

    #[test]
    fn test_missing_tables() {
        let container = container();
        let graph = RelationGraph::new(&container);

        let err = graph
            .add_relationship(RelationRequest::attributes("nowhere", "parcels", "m"))
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound(ref t) if t == "nowhere"));

        container
            .connection()
            .execute_batch("CREATE TABLE loose (name TEXT)")
            .unwrap();
        let err = graph
            .add_relationship(RelationRequest::new("loose", "parcels", "m").relation_name("x-acme_link"))
            .unwrap_err();
        assert!(matches!(err, Error::NoPrimaryKey(ref t) if t == "loose"));
        assert!(!container.table_exists("m").unwrap());
    }

    #[test]
    fn test_duplicate_mapping_rolls_back_whole_add() {
        let container = container();
        let graph = RelationGraph::new(&container);
        graph
            .add_relationship(RelationRequest::media("parcels", photos(), "m1"))
            .unwrap();

        let owners = TableDefinition::attributes("owners", vec![ColumnDefinition::new("name", "TEXT")]);
        let err = graph
            .add_relationship(RelationRequest::attributes("parcels", owners, "m1"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateMapping(ref m) if m == "m1"));

        assert!(!container.table_exists("owners").unwrap());
        assert_eq!(container.table_data_type("owners").unwrap(), None);
        assert_eq!(graph.relationships().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_contents_registration_drops_table() {
        let container = container();
        container
            .connection()
            .execute(
                "INSERT INTO gpkg_contents (table_name, data_type, identifier) VALUES ('elsewhere', 'attributes', 'photos')",
                [],
            )
            .unwrap();
        let graph = RelationGraph::new(&container);

        let err = graph
            .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
            .unwrap_err();
        assert!(matches!(err, Error::StoreFailure { .. }));
        assert!(!container.table_or_view_exists("photos").unwrap());
        assert!(!container.table_exists("parcels_photos").unwrap());

        assert!(graph.create_related_table(&photos()).is_err());
        assert!(!container.table_or_view_exists("photos").unwrap());
    }

    #[test]
    fn test_remove_relationship_cascades() {
        let container = container();
        let graph = RelationGraph::new(&container);
        graph
            .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
            .unwrap();

        graph
            .remove_relationship("parcels", "photos", &RelationType::Media)
            .unwrap();
        assert!(!container.table_or_view_exists("parcels_photos").unwrap());
        assert!(graph.relationships().unwrap().is_empty());
        // related table survives its relationship
        assert!(container.table_exists("photos").unwrap());

        graph
            .remove_relationship("parcels", "photos", &RelationType::Media)
            .unwrap();
    }

    #[test]
    fn test_removal_without_catalog_is_noop() {
        let container = container();
        let graph = RelationGraph::new(&container);
        graph.remove_relationships("parcels").unwrap();
        graph.remove_relationships_with_mapping_table("m").unwrap();
        graph
            .remove_relationship("parcels", "photos", &RelationType::Media)
            .unwrap();
        assert!(!graph.has_extension().unwrap());
    }

    #[test]
    fn test_remove_by_table_and_mapping_name() {
        let container = container();
        add_attributes_table(&container, "owners");
        add_attributes_table(&container, "roads");
        let graph = RelationGraph::new(&container);
        graph.add_relationship(RelationRequest::attributes("parcels", "owners", "m1")).unwrap();
        graph.add_relationship(RelationRequest::attributes("roads", "parcels", "m2")).unwrap();
        graph.add_relationship(RelationRequest::attributes("roads", "owners", "m3")).unwrap();

        graph.remove_relationships_with_mapping_table("m3").unwrap();
        assert!(!container.table_exists("m3").unwrap());
        assert_eq!(graph.relationships().unwrap().len(), 2);

        graph.remove_relationships("parcels").unwrap();
        assert!(graph.relationships().unwrap().is_empty());
        assert!(!container.table_exists("m1").unwrap());
        assert!(!container.table_exists("m2").unwrap());
    }

    #[test]
    fn test_wildcard_query() {
        let container = container();
        add_attributes_table(&container, "owners");
        let graph = RelationGraph::new(&container);
        graph.add_relationship(RelationRequest::media("parcels", photos(), "m1")).unwrap();
        graph.add_relationship(RelationRequest::attributes("parcels", "owners", "m2")).unwrap();

        let found = graph
            .get_relations(&RelationFilter::new().mapping_table("m1"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].related_table_name, "photos");

        assert!(graph.has_base_table_relations("parcels").unwrap());
        assert!(graph.has_related_table_relations("owners").unwrap());
        assert!(!graph.has_related_table_relations("parcels").unwrap());
        assert_eq!(graph.get_table_relations("photos").unwrap().len(), 1);
        assert!(!graph.has_relations(&RelationFilter::new().relation(&RelationType::Tiles)).unwrap());
    }

    #[test]
    fn test_related_rows() {
        let container = container();
        let graph = RelationGraph::new(&container);
        graph
            .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
            .unwrap();
        insert_photo(&container, 42);
        graph.insert_mapping("parcels_photos", MappingRow::new(7, 42)).unwrap();
        graph.insert_mapping("parcels_photos", MappingRow::new(7, 99)).unwrap();

        let related = graph.get_related_rows("parcels", 7, None).unwrap();
        assert_eq!(related.len(), 1);
        let rows = &related[0].rows;
        assert_eq!(rows.len(), 2);
        let photo = rows[0].row.as_ref().unwrap();
        assert_eq!(photo.get("content_type"), Some(&Value::Text("image/jpeg".into())));
        // dangling mapping
        assert_eq!(rows[1].mapping, MappingRow::new(7, 99));
        assert!(rows[1].row.is_none());

        let filtered = graph
            .get_related_rows("parcels", 7, Some(&[RelationType::Features]))
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_custom_relation_needs_resolver() {
        let container = container();
        add_attributes_table(&container, "owners");
        container
            .connection()
            .execute("INSERT INTO owners (id, label) VALUES (3, 'ada')", [])
            .unwrap();
        let mut graph = RelationGraph::new(&container);

        let relation = graph
            .add_relationship(
                RelationRequest::new("parcels", "owners", "parcels_owners")
                    .relation_name("owned_by")
                    .author("acme"),
            )
            .unwrap();
        assert_eq!(relation.relation_name, "x-acme_owned_by");
        graph.insert_mapping("parcels_owners", MappingRow::new(1, 3)).unwrap();

        let err = graph.get_related_rows("parcels", 1, None).unwrap_err();
        assert!(matches!(err, Error::UnresolvableRelationType(ref n) if n == "x-acme_owned_by"));

        graph
            .resolvers_mut()
            .register_for(relation.relation_type(), AttributesResolver);
        let related = graph.get_related_rows("parcels", 1, None).unwrap();
        let owner = related[0].rows[0].row.as_ref().unwrap();
        assert_eq!(owner.get("label"), Some(&Value::Text("ada".into())));
    }

    #[test]
    fn test_delete_mappings_both_directions() {
        let container = container();
        add_attributes_table(&container, "inspections");
        let graph = RelationGraph::new(&container);
        graph
            .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
            .unwrap();
        graph
            .add_relationship(RelationRequest::attributes("inspections", "parcels", "inspections_parcels"))
            .unwrap();

        graph.insert_mapping("parcels_photos", MappingRow::new(7, 42)).unwrap();
        graph.insert_mapping("parcels_photos", MappingRow::new(8, 43)).unwrap();
        graph.insert_mapping("inspections_parcels", MappingRow::new(1, 7)).unwrap();
        graph.insert_mapping("inspections_parcels", MappingRow::new(1, 8)).unwrap();

        assert_eq!(graph.count_mappings_to_base("parcels", 7).unwrap(), 1);
        assert_eq!(graph.count_mappings_to_related("parcels", 7).unwrap(), 1);
        assert_eq!(graph.count_mappings("parcels", 7).unwrap(), 2);

        assert_eq!(graph.delete_mappings("parcels", 7).unwrap(), 2);
        assert!(!graph.has_mappings("parcels", 7).unwrap());
        assert!(!graph.has_mapping_to_base("parcels", 7).unwrap());
        assert!(graph.has_mapping_to_base("parcels", 8).unwrap());
        assert!(graph.has_mapping_to_related("parcels", 8).unwrap());

        assert_eq!(graph.delete_mappings_to_related("parcels", 8).unwrap(), 1);
        assert_eq!(graph.delete_mappings_to_base("parcels", 8).unwrap(), 1);
        assert_eq!(graph.stats().unwrap().mapping_rows, 0);
    }

    #[test]
    fn test_remove_extension() {
        let container = container();
        add_attributes_table(&container, "owners");
        let graph = RelationGraph::new(&container);
        graph.add_relationship(RelationRequest::media("parcels", photos(), "m1")).unwrap();
        graph.add_relationship(RelationRequest::attributes("parcels", "owners", "m2")).unwrap();
        assert_eq!(graph.stats().unwrap().extension_records, 3);

        graph.remove_extension().unwrap();
        assert!(!container.table_exists("m1").unwrap());
        assert!(!container.table_exists("m2").unwrap());
        assert!(!container.table_exists(schema::RELATIONS_TABLE).unwrap());
        assert!(graph.extensions.records_for(RELATED_TABLES_EXTENSION).unwrap().is_empty());
        assert!(!graph.has_extension().unwrap());
        assert!(graph.relationships().unwrap().is_empty());
    }

    #[test]
    fn test_read_only_container_rejects_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.gpkg");
        {
            let container = Container::open(&path).unwrap();
            add_attributes_table(&container, "parcels");
            RelationGraph::new(&container)
                .add_relationship(RelationRequest::media("parcels", photos(), "parcels_photos"))
                .unwrap();
        }

        let container = Container::open_read_only(&path).unwrap();
        let graph = RelationGraph::new(&container);
        assert_eq!(graph.relationships().unwrap().len(), 1);

        let err = graph
            .add_relationship(RelationRequest::media("parcels", "photos", "other"))
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyViolation(_)));
        assert!(matches!(
            graph.remove_relationship("parcels", "photos", &RelationType::Media),
            Err(Error::ReadOnlyViolation(_))
        ));
        assert!(matches!(
            graph.insert_mapping("parcels_photos", MappingRow::new(1, 1)),
            Err(Error::ReadOnlyViolation(_))
        ));
        assert!(matches!(graph.remove_extension(), Err(Error::ReadOnlyViolation(_))));
        assert_eq!(graph.relationships().unwrap().len(), 1);
    }

    #[test]
    fn test_stats_and_custom_mapping_definition() {
        let container = container();
        add_attributes_table(&container, "owners");
        let graph = RelationGraph::new(&container);
        let mapping = mapping::definition_with_columns(
            "parcels_owners",
            vec![ColumnDefinition::new("since", "TEXT")],
        );
        graph
            .add_relationship(
                RelationRequest::attributes("parcels", "owners", "ignored").mapping_definition(mapping),
            )
            .unwrap();
        graph
            .add_relationship(RelationRequest::attributes("owners", "parcels", "owners_parcels").author("acme"))
            .unwrap();
        graph.insert_mapping("parcels_owners", MappingRow::new(1, 2)).unwrap();

        assert_eq!(
            container.column_names("parcels_owners").unwrap(),
            vec!["base_id", "related_id", "since"]
        );
        let stats = graph.stats().unwrap();
        assert_eq!(stats.relations, 2);
        assert_eq!(stats.custom_relations, 1);
        assert_eq!(stats.mapping_rows, 1);
        assert_eq!(stats.extension_records, 3);
        assert!(stats.to_string().contains("Relations: 2 (custom: 1)"));
    }
}
