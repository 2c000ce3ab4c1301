//! Relation types - the catalog's view of a relationship
//!
//! Five relation names are reserved and tie the related table to a content
//! data type:
//! - `features`: related table holds features
//! - `tiles`: related table is a tile pyramid
//! - `attributes`: related table holds attributes
//! - `media`: related table holds media blobs
//! - `simple_attributes`: related table holds simple attributes
//!
//! Any other name is custom; by convention custom names are `x-{author}_{name}`.

use crate::table;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

/// Relation kinds recorded in `relation_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationType {
    Features,
    Tiles,
    Attributes,
    Media,
    SimpleAttributes,
    /// Any non-reserved relation name
    Custom(String),
}

static RESERVED: [RelationType; 5] = [
    RelationType::Features,
    RelationType::Tiles,
    RelationType::Attributes,
    RelationType::Media,
    RelationType::SimpleAttributes,
];

fn custom_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^x-([^_]+)_(.+)$").expect("static pattern"))
}

impl RelationType {
    /// Name stored in the catalog
    pub fn name(&self) -> &str {
        match self {
            RelationType::Features => "features",
            RelationType::Tiles => "tiles",
            RelationType::Attributes => "attributes",
            RelationType::Media => "media",
            RelationType::SimpleAttributes => "simple_attributes",
            RelationType::Custom(name) => name,
        }
    }

    /// All reserved relation types
    pub fn reserved() -> &'static [RelationType] {
        &RESERVED
    }

    /// Map a stored relation name back to its type; unknown names are custom
    pub fn from_name(name: &str) -> Self {
        RESERVED
            .iter()
            .find(|t| t.name() == name)
            .cloned()
            .unwrap_or_else(|| RelationType::Custom(name.to_string()))
    }

    /// Build an authored custom relation, `x-{author}_{name}`
    pub fn custom(author: &str, name: &str) -> Self {
        RelationType::Custom(format!("x-{}_{}", author, name))
    }

    /// Content data type the related table must have, reserved types only
    pub fn data_type(&self) -> Option<&'static str> {
        match self {
            RelationType::Features => Some(table::FEATURES),
            RelationType::Tiles => Some(table::TILES),
            RelationType::Attributes => Some(table::ATTRIBUTES),
            RelationType::Media => Some(table::MEDIA),
            RelationType::SimpleAttributes => Some(table::SIMPLE_ATTRIBUTES),
            RelationType::Custom(_) => None,
        }
    }

    pub fn is_reserved(&self) -> bool {
        !matches!(self, RelationType::Custom(_))
    }

    /// `(author, name)` of a custom relation following the `x-` convention
    pub fn author_and_name(&self) -> Option<(&str, &str)> {
        let RelationType::Custom(name) = self else {
            return None;
        };
        let captures = custom_name_pattern().captures(name)?;
        Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
    }
}

impl FromStr for RelationType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidRelation("empty relation name".to_string()));
        }
        Ok(RelationType::from_name(trimmed))
    }
}

impl From<String> for RelationType {
    fn from(name: String) -> Self {
        RelationType::from_name(&name)
    }
}

impl From<RelationType> for String {
    fn from(relation: RelationType) -> Self {
        relation.name().to_string()
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A row of the `gpkgext_relations` catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendedRelation {
    /// Assigned by the catalog; 0 until inserted
    pub id: i64,
    pub base_table_name: String,
    pub base_primary_column: String,
    pub related_table_name: String,
    pub related_primary_column: String,
    pub relation_name: String,
    pub mapping_table_name: String,
}

impl ExtendedRelation {
    /// Typed relation name
    pub fn relation_type(&self) -> RelationType {
        RelationType::from_name(&self.relation_name)
    }

    /// Whether this relation references `table` on either side
    pub fn involves(&self, table: &str) -> bool {
        self.base_table_name == table || self.related_table_name == table
    }
}

impl std::fmt::Display for ExtendedRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -[{}]-> {}.{} via {}",
            self.base_table_name,
            self.base_primary_column,
            self.relation_name,
            self.related_table_name,
            self.related_primary_column,
            self.mapping_table_name
        )
    }
}

/// Wildcard predicate over catalog rows.
///
/// Every unset field matches any value; set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFilter {
    pub base_table: Option<String>,
    pub base_column: Option<String>,
    pub related_table: Option<String>,
    pub related_column: Option<String>,
    pub relation_name: Option<String>,
    pub mapping_table: Option<String>,
}

impl RelationFilter {
    /// Filter matching every relation
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_table(mut self, table: impl Into<String>) -> Self {
        self.base_table = Some(table.into());
        self
    }

    pub fn base_column(mut self, column: impl Into<String>) -> Self {
        self.base_column = Some(column.into());
        self
    }

    pub fn related_table(mut self, table: impl Into<String>) -> Self {
        self.related_table = Some(table.into());
        self
    }

    pub fn related_column(mut self, column: impl Into<String>) -> Self {
        self.related_column = Some(column.into());
        self
    }

    pub fn relation(mut self, relation: &RelationType) -> Self {
        self.relation_name = Some(relation.name().to_string());
        self
    }

    pub fn mapping_table(mut self, table: impl Into<String>) -> Self {
        self.mapping_table = Some(table.into());
        self
    }

    /// Filter matching exactly the identity tuple of `relation`
    pub fn exact(relation: &ExtendedRelation) -> Self {
        Self {
            base_table: Some(relation.base_table_name.clone()),
            base_column: Some(relation.base_primary_column.clone()),
            related_table: Some(relation.related_table_name.clone()),
            related_column: Some(relation.related_primary_column.clone()),
            relation_name: Some(relation.relation_name.clone()),
            mapping_table: Some(relation.mapping_table_name.clone()),
        }
    }

    /// `(column, value)` pairs of the set fields
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        [
            ("base_table_name", &self.base_table),
            ("base_primary_column", &self.base_column),
            ("related_table_name", &self.related_table),
            ("related_primary_column", &self.related_column),
            ("relation_name", &self.relation_name),
            ("mapping_table_name", &self.mapping_table),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }

    pub fn matches(&self, relation: &ExtendedRelation) -> bool {
        fn check(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }
        check(&self.base_table, &relation.base_table_name)
            && check(&self.base_column, &relation.base_primary_column)
            && check(&self.related_table, &relation.related_table_name)
            && check(&self.related_column, &relation.related_primary_column)
            && check(&self.relation_name, &relation.relation_name)
            && check(&self.mapping_table, &relation.mapping_table_name)
    }
}
