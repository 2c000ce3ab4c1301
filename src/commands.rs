use crate::{OutputMode, emit_success};
use gpkg_related::config::{self, GpkgRelatedConfig};
use gpkg_related::ui::{Icons, RelationTable, banner, section, stats_table, success, summary_row, table_name, theme, warn};
use gpkg_related::{
    Container, MappingRow, RelationFilter, RelationGraph, RelationRequest, RelationType, TableDefinition,
};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Settings shared by every command
pub struct Session {
    pub database: PathBuf,
    pub read_only: bool,
    /// Default author for custom relation names
    pub author: Option<String>,
    pub config_path: PathBuf,
    pub output_mode: OutputMode,
}

impl Session {
    fn open(&self) -> anyhow::Result<Container> {
        if self.read_only {
            if !self.database.exists() {
                anyhow::bail!("container {} does not exist", self.database.display());
            }
            return Ok(Container::open_read_only(&self.database)?);
        }
        config::ensure_db_dir(&self.database)?;
        Ok(Container::open(&self.database)?)
    }

    fn is_human(&self) -> bool {
        self.output_mode.is_human()
    }
}

/// Which relationships `remove` targets
pub enum RemoveTarget {
    Relationship {
        base: String,
        related: String,
        relation: String,
        author: Option<String>,
    },
    Table(String),
    Mapping(String),
}

/// Parse a relation argument, applying an author to custom names
fn parse_relation(name: &str, author: Option<&str>) -> anyhow::Result<RelationType> {
    let relation: RelationType = name.parse()?;
    Ok(match author {
        Some(author) => RelationType::custom(author, relation.name()),
        None => relation,
    })
}

/// Default definition of a related table created by `add --create`
fn default_definition(relation: &RelationType, name: &str) -> anyhow::Result<TableDefinition> {
    Ok(match relation {
        RelationType::Features => TableDefinition::features(name, "geom", "GEOMETRY", vec![]),
        RelationType::Tiles => TableDefinition::tiles(name),
        RelationType::Attributes => TableDefinition::attributes(name, vec![]),
        RelationType::Media => TableDefinition::media(name, vec![]),
        RelationType::SimpleAttributes => TableDefinition::simple_attributes(name, vec![])?,
        RelationType::Custom(custom) => {
            anyhow::bail!("--create needs a reserved relation type, got custom relation {}", custom)
        }
    })
}

pub fn run_init(session: &Session, write_config: bool, force: bool) -> anyhow::Result<()> {
    if session.read_only {
        anyhow::bail!("init needs a writable container");
    }
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let created = graph.create_catalog_table_if_absent()?;

    if write_config {
        let config = GpkgRelatedConfig {
            database: Some(session.database.display().to_string()),
            read_only: false,
            author: session.author.clone(),
        };
        config::write_config(&session.config_path, &config, force)?;
    }

    if session.is_human() {
        banner(
            &format!("{}", "Related tables".bold().style(theme().info.clone())),
            &session.database.display().to_string(),
        );
        if created {
            success("Created relation catalog");
        } else {
            success("Relation catalog already present");
        }
        if write_config {
            summary_row("Config:", &session.config_path.display().to_string());
        }
    } else {
        emit_success(
            session.output_mode,
            "init",
            serde_json::json!({
                "database": session.database.display().to_string(),
                "created": created,
            }),
        )?;
    }
    Ok(())
}

pub fn run_add(
    session: &Session,
    base: &str,
    related: &str,
    relation: &str,
    mapping: &str,
    author: Option<&str>,
    create: bool,
) -> anyhow::Result<()> {
    let base_relation: RelationType = relation.parse()?;
    // the configured author only applies to bare custom names
    let author = author.or_else(|| match &base_relation {
        RelationType::Custom(_) if base_relation.author_and_name().is_none() => session.author.as_deref(),
        _ => None,
    });

    let request = if create {
        RelationRequest::new(base, default_definition(&base_relation, related)?, mapping)
    } else {
        RelationRequest::new(base, related, mapping)
    };
    let request = match author {
        Some(author) => request.relation(base_relation).author(author),
        None => request.relation(base_relation),
    };

    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let relation = graph.add_relationship(request)?;

    if session.is_human() {
        success(&format!("Relationship {} ready", relation.id));
        summary_row("Base:", &table_name(&relation.base_table_name));
        summary_row("Related:", &table_name(&relation.related_table_name));
        summary_row(
            "Relation:",
            &format!("{} {}", Icons::relation(&relation.relation_name), relation.relation_name),
        );
        summary_row("Mapping:", &table_name(&relation.mapping_table_name));
    } else {
        emit_success(session.output_mode, "add", serde_json::to_value(&relation)?)?;
    }
    Ok(())
}

pub fn run_remove(session: &Session, target: RemoveTarget) -> anyhow::Result<()> {
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let before = graph.relationships()?.len();

    let description = match target {
        RemoveTarget::Relationship {
            base,
            related,
            relation,
            author,
        } => {
            let relation = parse_relation(&relation, author.as_deref())?;
            graph.remove_relationship(&base, &related, &relation)?;
            format!("{} -[{}]-> {}", base, relation, related)
        }
        RemoveTarget::Table(table) => {
            graph.remove_relationships(&table)?;
            format!("relationships of {}", table)
        }
        RemoveTarget::Mapping(mapping) => {
            graph.remove_relationships_with_mapping_table(&mapping)?;
            format!("relationship using {}", mapping)
        }
    };
    let removed = before - graph.relationships()?.len();

    if session.is_human() {
        if removed == 0 {
            warn(&format!("Nothing to remove for {}", description));
        } else {
            println!("{} Removed {} ({} relationships)", Icons::DEL, description, removed);
        }
    } else {
        emit_success(
            session.output_mode,
            "remove",
            serde_json::json!({ "target": description, "removed": removed }),
        )?;
    }
    Ok(())
}

pub fn run_list(
    session: &Session,
    base: Option<String>,
    related: Option<String>,
    relation: Option<String>,
    mapping: Option<String>,
    table: Option<String>,
) -> anyhow::Result<()> {
    let container = session.open()?;
    let graph = RelationGraph::new(&container);

    let relations = match table {
        Some(table) => graph.get_table_relations(&table)?,
        None => {
            let filter = RelationFilter {
                base_table: base,
                related_table: related,
                relation_name: relation,
                mapping_table: mapping,
                ..RelationFilter::default()
            };
            graph.get_relations(&filter)?
        }
    };

    if session.is_human() {
        if relations.is_empty() {
            println!("{} No relationships found.", Icons::EMPTY);
        } else {
            let table: RelationTable = relations.iter().collect();
            println!("{}", table.build());
        }
    } else {
        emit_success(session.output_mode, "list", serde_json::to_value(&relations)?)?;
    }
    Ok(())
}

pub fn run_link(session: &Session, mapping: &str, base_id: i64, related_id: i64) -> anyhow::Result<()> {
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    if !graph.has_relations(&RelationFilter::new().mapping_table(mapping))? {
        anyhow::bail!("{} is not the mapping table of any relationship", mapping);
    }
    graph.insert_mapping(mapping, MappingRow::new(base_id, related_id))?;

    if session.is_human() {
        println!("{} {} {} -> {}", Icons::LINK, table_name(mapping), base_id, related_id);
    } else {
        emit_success(
            session.output_mode,
            "link",
            serde_json::to_value(MappingRow::new(base_id, related_id))?,
        )?;
    }
    Ok(())
}

pub fn run_unlink(session: &Session, mapping: &str, base_id: i64, related_id: i64) -> anyhow::Result<()> {
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let deleted = graph.delete_mapping(mapping, base_id, related_id)?;

    if session.is_human() {
        println!(
            "{} {} {} -> {} ({} rows)",
            Icons::UNLINK,
            table_name(mapping),
            base_id,
            related_id,
            deleted
        );
    } else {
        emit_success(session.output_mode, "unlink", serde_json::json!({ "deleted": deleted }))?;
    }
    Ok(())
}

pub fn run_related(session: &Session, table: &str, id: i64, relations: &[String]) -> anyhow::Result<()> {
    let types = relations
        .iter()
        .map(|r| r.parse::<RelationType>())
        .collect::<Result<Vec<_>, _>>()?;
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let related = graph.get_related_rows(table, id, (!types.is_empty()).then_some(types.as_slice()))?;

    if !session.is_human() {
        return emit_success(session.output_mode, "related", serde_json::to_value(&related)?);
    }

    if related.iter().all(|r| r.rows.is_empty()) {
        println!("{} No rows related to {} {}.", Icons::EMPTY, table, id);
        return Ok(());
    }
    for group in related.iter().filter(|r| !r.rows.is_empty()) {
        section(&format!(
            " {} {} via {} ",
            Icons::relation(&group.relation.relation_name),
            group.relation.related_table_name,
            group.relation.mapping_table_name
        ));
        for entry in &group.rows {
            match &entry.row {
                Some(row) => {
                    let fields: Vec<String> = row.iter().map(|(c, v)| format!("{}={}", c, v)).collect();
                    summary_row(&format!("{}:", entry.mapping.related_id), &fields.join(" "));
                }
                None => summary_row(&format!("{}:", entry.mapping.related_id), "(missing row)"),
            }
        }
    }
    Ok(())
}

pub fn run_purge(session: &Session, table: &str, id: i64) -> anyhow::Result<()> {
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let deleted = graph.delete_mappings(table, id)?;

    if session.is_human() {
        println!("{} Deleted {} mappings of {} {}", Icons::DEL, deleted, table_name(table), id);
    } else {
        emit_success(session.output_mode, "purge", serde_json::json!({ "deleted": deleted }))?;
    }
    Ok(())
}

pub fn run_uninstall(session: &Session, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("uninstall drops every mapping table and the relation catalog; pass --yes to confirm");
    }
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let relations = graph.relationships()?.len();
    graph.remove_extension()?;

    if session.is_human() {
        success(&format!("Removed related tables ({} relationships)", relations));
    } else {
        emit_success(
            session.output_mode,
            "uninstall",
            serde_json::json!({ "relationships": relations }),
        )?;
    }
    Ok(())
}

pub fn run_stats(session: &Session) -> anyhow::Result<()> {
    let container = session.open()?;
    let graph = RelationGraph::new(&container);
    let stats = graph.stats()?;

    if session.is_human() {
        println!("{} Relation Statistics ({})", Icons::STATS, session.database.display());
        println!(
            "{}",
            stats_table(&[
                ("Relations", stats.relations.to_string()),
                ("Custom relations", stats.custom_relations.to_string()),
                ("Mapping rows", stats.mapping_rows.to_string()),
                ("Extension records", stats.extension_records.to_string()),
            ])
        );
        if session.read_only {
            summary_row(Icons::LOCK, "opened read-only");
        }
    } else {
        emit_success(session.output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relation_with_author() {
        assert_eq!(parse_relation("media", None).unwrap(), RelationType::Media);
        assert_eq!(parse_relation("owned_by", Some("acme")).unwrap().name(), "x-acme_owned_by");
        assert!(parse_relation("", None).is_err());
    }

    #[test]
    fn test_default_definition() {
        let media = default_definition(&RelationType::Media, "photos").unwrap();
        assert_eq!(media.data_type.as_deref(), Some("media"));
        assert!(default_definition(&RelationType::Custom("x-a_b".into()), "t").is_err());
    }
}
