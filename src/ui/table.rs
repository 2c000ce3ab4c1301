use tabled::{Table, Tabled, settings::Style};

use crate::relation::ExtendedRelation;

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct RelationRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Base")]
    base: String,
    #[tabled(rename = "Relation")]
    relation: String,
    #[tabled(rename = "Related")]
    related: String,
    #[tabled(rename = "Mapping")]
    mapping: String,
}

/// Rounded table of catalog rows
#[derive(Default)]
pub struct RelationTable {
    rows: Vec<RelationRow>,
}

impl RelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, relation: &ExtendedRelation) {
        self.rows.push(RelationRow {
            id: relation.id,
            base: format!("{}.{}", relation.base_table_name, relation.base_primary_column),
            relation: relation.relation_name.clone(),
            related: format!("{}.{}", relation.related_table_name, relation.related_primary_column),
            mapping: relation.mapping_table_name.clone(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl<'r> FromIterator<&'r ExtendedRelation> for RelationTable {
    fn from_iter<I: IntoIterator<Item = &'r ExtendedRelation>>(iter: I) -> Self {
        let mut table = Self::new();
        for relation in iter {
            table.add(relation);
        }
        table
    }
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let rows: Vec<MetricRow> = stats
        .iter()
        .map(|(label, value)| MetricRow {
            metric: label.to_string(),
            value: value.clone(),
        })
        .collect();
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_table_lists_rows() {
        let relation = ExtendedRelation {
            id: 1,
            base_table_name: "parcels".into(),
            base_primary_column: "id".into(),
            related_table_name: "photos".into(),
            related_primary_column: "id".into(),
            relation_name: "media".into(),
            mapping_table_name: "parcels_photos".into(),
        };
        let table: RelationTable = std::iter::once(&relation).collect();
        let rendered = table.build();
        assert!(rendered.contains("parcels.id"));
        assert!(rendered.contains("parcels_photos"));
        assert!(!table.is_empty());
        assert!(RelationTable::new().build().is_empty());
    }

    #[test]
    fn test_stats_table() {
        let rendered = stats_table(&[("Relations", "2".to_string())]);
        assert!(rendered.contains("Metric"));
        assert!(rendered.contains("Relations"));
    }
}
