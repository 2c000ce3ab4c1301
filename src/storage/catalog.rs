//! Relation catalog stored in `gpkgext_relations`

use rusqlite::{OptionalExtension, params, params_from_iter};

use super::container::Container;
use super::schema;
use crate::relation::{ExtendedRelation, RelationFilter};
use crate::{Error, Result, StoreContext, is_constraint_violation};

const SELECT_RELATION: &str = "SELECT id, base_table_name, base_primary_column, related_table_name, \
     related_primary_column, relation_name, mapping_table_name FROM gpkgext_relations";

/// Durable store of relationship records
pub struct RelationCatalog<'a> {
    container: &'a Container,
}

impl<'a> RelationCatalog<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Whether the catalog table has been materialized
    pub fn is_table_exists(&self) -> Result<bool> {
        self.container.table_exists(schema::RELATIONS_TABLE)
    }

    /// Create the catalog table; returns true when newly created
    pub fn create_table(&self) -> Result<bool> {
        if self.is_table_exists()? {
            return Ok(false);
        }
        self.container
            .connection()
            .execute(schema::CREATE_RELATIONS_TABLE, [])
            .store_context(|| format!("create {}", schema::RELATIONS_TABLE))?;
        tracing::debug!("Created relation catalog {}", schema::RELATIONS_TABLE);
        Ok(true)
    }

    /// Drop the catalog table and every row in it
    pub fn drop_table(&self) -> Result<()> {
        self.container.drop_table(schema::RELATIONS_TABLE)
    }

    // ========== Writes ==========

    /// Insert a relation and return its assigned id
    ///
    /// Fails with `DuplicateMapping` when the mapping table name is taken.
    pub fn create(&self, relation: &ExtendedRelation) -> Result<i64> {
        let result = self.container.connection().execute(
            r#"
            INSERT INTO gpkgext_relations (base_table_name, base_primary_column, related_table_name,
                                           related_primary_column, relation_name, mapping_table_name)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                relation.base_table_name,
                relation.base_primary_column,
                relation.related_table_name,
                relation.related_primary_column,
                relation.relation_name,
                relation.mapping_table_name,
            ],
        );
        match result {
            Ok(_) => Ok(self.container.connection().last_insert_rowid()),
            Err(e) if is_constraint_violation(&e) => {
                Err(Error::DuplicateMapping(relation.mapping_table_name.clone()))
            }
            Err(e) => Err(e).store_context(|| {
                format!(
                    "insert relation '{}' between {} and {}",
                    relation.relation_name, relation.base_table_name, relation.related_table_name
                )
            }),
        }
    }

    /// Delete exactly one relation by id; returns whether a row was removed
    pub fn delete(&self, relation: &ExtendedRelation) -> Result<bool> {
        let deleted = self
            .container
            .connection()
            .execute("DELETE FROM gpkgext_relations WHERE id = ?1", [relation.id])
            .store_context(|| format!("delete relation {}", relation.id))?;
        Ok(deleted > 0)
    }

    // ========== Queries ==========

    /// Every relation, in insertion order
    pub fn query_all(&self) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new())
    }

    pub fn query_for_id(&self, id: i64) -> Result<Option<ExtendedRelation>> {
        self.container
            .connection()
            .query_row(&format!("{} WHERE id = ?1", SELECT_RELATION), [id], row_to_relation)
            .optional()
            .store_context(|| format!("query relation {}", id))
    }

    pub fn query_by_mapping_table_name(&self, mapping_table: &str) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new().mapping_table(mapping_table))
    }

    /// Relations matching every set field of `filter`
    pub fn get_relations(&self, filter: &RelationFilter) -> Result<Vec<ExtendedRelation>> {
        let conditions = filter.conditions();
        let mut sql = SELECT_RELATION.to_string();
        if !conditions.is_empty() {
            let clauses: Vec<String> = conditions
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        self.query(&sql, conditions.iter().map(|(_, value)| *value), || {
            format!("query relations matching {:?}", filter)
        })
    }

    /// Relations where `table` is the base table
    pub fn get_base_table_relations(&self, table: &str) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new().base_table(table))
    }

    /// Relations where `table` is the related table
    pub fn get_related_table_relations(&self, table: &str) -> Result<Vec<ExtendedRelation>> {
        self.get_relations(&RelationFilter::new().related_table(table))
    }

    /// Relations where `table` is on either side, each listed once
    pub fn get_table_relations(&self, table: &str) -> Result<Vec<ExtendedRelation>> {
        let sql = format!(
            "{} WHERE base_table_name = ?1 OR related_table_name = ?1 ORDER BY id",
            SELECT_RELATION
        );
        self.query(&sql, std::iter::once(table), || {
            format!("query relations of table {}", table)
        })
    }

    fn query<'p, I, F>(&self, sql: &str, params: I, context: F) -> Result<Vec<ExtendedRelation>>
    where
        I: IntoIterator<Item = &'p str>,
        F: Fn() -> String,
    {
        let mut stmt = self.container.connection().prepare(sql).store_context(&context)?;
        let relations = stmt
            .query_map(params_from_iter(params), row_to_relation)
            .store_context(&context)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store_context(&context)?;
        Ok(relations)
    }
}

fn row_to_relation(row: &rusqlite::Row) -> rusqlite::Result<ExtendedRelation> {
    Ok(ExtendedRelation {
        id: row.get(0)?,
        base_table_name: row.get(1)?,
        base_primary_column: row.get(2)?,
        related_table_name: row.get(3)?,
        related_primary_column: row.get(4)?,
        relation_name: row.get(5)?,
        mapping_table_name: row.get(6)?,
    })
}
