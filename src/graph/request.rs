//! Options for adding a relationship

use crate::relation::{ExtendedRelation, RelationType};
use crate::storage::mapping;
use crate::table::TableDefinition;
use crate::{Error, Result};

/// Related side of a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedTarget {
    /// An existing table or view
    Name(String),
    /// A table created on demand, with its contents row
    Definition(TableDefinition),
}

impl RelatedTarget {
    pub fn table_name(&self) -> &str {
        match self {
            RelatedTarget::Name(name) => name,
            RelatedTarget::Definition(def) => &def.name,
        }
    }
}

impl From<&str> for RelatedTarget {
    fn from(name: &str) -> Self {
        RelatedTarget::Name(name.to_string())
    }
}

impl From<String> for RelatedTarget {
    fn from(name: String) -> Self {
        RelatedTarget::Name(name)
    }
}

impl From<TableDefinition> for RelatedTarget {
    fn from(def: TableDefinition) -> Self {
        RelatedTarget::Definition(def)
    }
}

/// Mapping table of a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum MappingTarget {
    /// Plain `(base_id, related_id)` table
    Name(String),
    /// Caller-supplied definition, possibly with extra columns
    Definition(TableDefinition),
}

impl MappingTarget {
    pub fn table_name(&self) -> &str {
        match self {
            MappingTarget::Name(name) => name,
            MappingTarget::Definition(def) => &def.name,
        }
    }

    /// Full definition used to materialize the table
    pub fn definition(&self) -> TableDefinition {
        match self {
            MappingTarget::Name(name) => mapping::definition(name.as_str()),
            MappingTarget::Definition(def) => def.clone(),
        }
    }
}

impl From<&str> for MappingTarget {
    fn from(name: &str) -> Self {
        MappingTarget::Name(name.to_string())
    }
}

impl From<String> for MappingTarget {
    fn from(name: String) -> Self {
        MappingTarget::Name(name)
    }
}

impl From<TableDefinition> for MappingTarget {
    fn from(def: TableDefinition) -> Self {
        MappingTarget::Definition(def)
    }
}

/// Everything needed to add one relationship.
///
/// The relation is given as a type, as a raw name, or as an author plus a
/// name; when none is given it falls back to the data type of a related
/// table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRequest {
    pub base_table: String,
    pub related: RelatedTarget,
    pub mapping: MappingTarget,
    pub relation: Option<RelationType>,
    /// Turns the relation into `x-{author}_{name}`
    pub author: Option<String>,
}

impl RelationRequest {
    /// Request with no explicit relation
    pub fn new(
        base_table: impl Into<String>,
        related: impl Into<RelatedTarget>,
        mapping: impl Into<MappingTarget>,
    ) -> Self {
        Self {
            base_table: base_table.into(),
            related: related.into(),
            mapping: mapping.into(),
            relation: None,
            author: None,
        }
    }

    pub fn features(
        base_table: impl Into<String>,
        related: impl Into<RelatedTarget>,
        mapping: impl Into<MappingTarget>,
    ) -> Self {
        Self::new(base_table, related, mapping).relation(RelationType::Features)
    }

    pub fn tiles(
        base_table: impl Into<String>,
        related: impl Into<RelatedTarget>,
        mapping: impl Into<MappingTarget>,
    ) -> Self {
        Self::new(base_table, related, mapping).relation(RelationType::Tiles)
    }

    pub fn attributes(
        base_table: impl Into<String>,
        related: impl Into<RelatedTarget>,
        mapping: impl Into<MappingTarget>,
    ) -> Self {
        Self::new(base_table, related, mapping).relation(RelationType::Attributes)
    }

    pub fn media(
        base_table: impl Into<String>,
        related: impl Into<RelatedTarget>,
        mapping: impl Into<MappingTarget>,
    ) -> Self {
        Self::new(base_table, related, mapping).relation(RelationType::Media)
    }

    pub fn simple_attributes(
        base_table: impl Into<String>,
        related: impl Into<RelatedTarget>,
        mapping: impl Into<MappingTarget>,
    ) -> Self {
        Self::new(base_table, related, mapping).relation(RelationType::SimpleAttributes)
    }

    /// Re-add an existing catalog row
    pub fn from_relation(relation: &ExtendedRelation) -> Self {
        Self::new(
            relation.base_table_name.as_str(),
            relation.related_table_name.as_str(),
            relation.mapping_table_name.as_str(),
        )
        .relation(relation.relation_type())
    }

    pub fn relation(mut self, relation: RelationType) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Set the relation by its raw name
    pub fn relation_name(mut self, name: &str) -> Self {
        self.relation = Some(RelationType::from_name(name));
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Replace the mapping table with a full definition
    pub fn mapping_definition(mut self, def: TableDefinition) -> Self {
        self.mapping = MappingTarget::Definition(def);
        self
    }

    pub fn related_table_name(&self) -> &str {
        self.related.table_name()
    }

    pub fn mapping_table_name(&self) -> &str {
        self.mapping.table_name()
    }

    /// The relation recorded in the catalog
    pub fn relation_type(&self) -> Result<RelationType> {
        let relation = match (&self.relation, &self.related) {
            (Some(relation), _) => relation.clone(),
            (None, RelatedTarget::Definition(def)) => match &def.data_type {
                Some(data_type) => RelationType::from_name(data_type),
                None => {
                    return Err(Error::InvalidRelation(format!(
                        "no relation given and related table {} has no data type",
                        def.name
                    )));
                }
            },
            (None, RelatedTarget::Name(name)) => {
                return Err(Error::InvalidRelation(format!(
                    "no relation given for related table {}",
                    name
                )));
            }
        };
        if relation.name().trim().is_empty() {
            return Err(Error::InvalidRelation("empty relation name".to_string()));
        }
        Ok(match &self.author {
            Some(author) => RelationType::custom(author, relation.name()),
            None => relation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_constructor() {
        let request = RelationRequest::media("parcels", "photos", "parcels_photos");
        assert_eq!(request.relation_type().unwrap(), RelationType::Media);
        assert_eq!(request.related_table_name(), "photos");
        assert_eq!(request.mapping_table_name(), "parcels_photos");
    }

    #[test]
    fn test_author_builds_custom_name() {
        let request = RelationRequest::new("parcels", "owners", "parcels_owners")
            .relation_name("owned_by")
            .author("acme");
        assert_eq!(request.relation_type().unwrap().name(), "x-acme_owned_by");
    }

    #[test]
    fn test_relation_inferred_from_definition() {
        let request = RelationRequest::new("parcels", TableDefinition::media("photos", vec![]), "m");
        assert_eq!(request.relation_type().unwrap(), RelationType::Media);

        let untyped = RelationRequest::new("parcels", "photos", "m");
        assert!(matches!(untyped.relation_type(), Err(Error::InvalidRelation(_))));
    }

    #[test]
    fn test_mapping_definition_override() {
        let request = RelationRequest::attributes("a", "b", "m")
            .mapping_definition(mapping::definition("m2"));
        assert_eq!(request.mapping_table_name(), "m2");
        assert_eq!(request.mapping.definition().columns.len(), 2);
    }

    #[test]
    fn test_from_relation() {
        let relation = ExtendedRelation {
            id: 3,
            base_table_name: "a".into(),
            base_primary_column: "id".into(),
            related_table_name: "b".into(),
            related_primary_column: "id".into(),
            relation_name: "x-acme_link".into(),
            mapping_table_name: "a_b".into(),
        };
        let request = RelationRequest::from_relation(&relation);
        assert_eq!(request.relation_type().unwrap().name(), "x-acme_link");
        assert_eq!(request.base_table, "a");
    }
}
