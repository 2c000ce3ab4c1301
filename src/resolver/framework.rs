//! Core resolver framework
//!
//! Defines the trait every related-row resolver implements and the registry
//! the orchestrator dispatches through.

use std::collections::HashMap;
use std::sync::Arc;

use crate::relation::RelationType;
use crate::row::UserRow;
use crate::storage::Container;
use crate::{Error, Result};

/// Fetches rows of a related table for one relation kind
///
/// Each resolver is responsible for:
/// 1. Reading the related row by its primary key
/// 2. Checking the row has the shape its relation kind requires
pub trait RelatedRowResolver: Send + Sync {
    /// Relation kind this resolver serves by default
    fn relation_type(&self) -> RelationType;

    /// Read the related row, `None` when no row carries `related_id`
    fn fetch_related_row(
        &self,
        container: &Container,
        related_table: &str,
        primary_column: &str,
        related_id: i64,
    ) -> Result<Option<UserRow>>;
}

/// Registry of resolvers keyed by relation kind
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    resolvers: HashMap<RelationType, Arc<dyn RelatedRowResolver>>,
}

impl ResolverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under its own relation type
    pub fn register(&mut self, resolver: impl RelatedRowResolver + 'static) {
        let relation = resolver.relation_type();
        self.resolvers.insert(relation, Arc::new(resolver));
    }

    /// Register a resolver under an explicit relation type
    ///
    /// This is how custom relation names get row-fetch logic.
    pub fn register_for(&mut self, relation: RelationType, resolver: impl RelatedRowResolver + 'static) {
        self.resolvers.insert(relation, Arc::new(resolver));
    }

    /// Find the resolver for a relation type
    pub fn get(&self, relation: &RelationType) -> Option<&dyn RelatedRowResolver> {
        self.resolvers.get(relation).map(|r| r.as_ref())
    }

    /// Find the resolver for a relation type or fail with `UnresolvableRelationType`
    pub fn require(&self, relation: &RelationType) -> Result<&dyn RelatedRowResolver> {
        self.get(relation)
            .ok_or_else(|| Error::UnresolvableRelationType(relation.name().to_string()))
    }

    pub fn contains(&self, relation: &RelationType) -> bool {
        self.resolvers.contains_key(relation)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// Create a default registry with a resolver for every reserved kind
pub fn default_registry() -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    registry.register(super::kinds::FeatureResolver);
    registry.register(super::kinds::TileResolver);
    registry.register(super::kinds::AttributesResolver);
    registry.register(super::kinds::MediaResolver);
    registry.register(super::kinds::SimpleAttributesResolver);
    registry
}
