//! gpkg-related CLI - Manage related tables inside GeoPackage containers

use clap::{Parser, Subcommand};
use gpkg_related::{config, ui};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "gpkg-related")]
#[command(version)]
#[command(about = "Related tables for GeoPackage containers - typed many-to-many links between tables")]
#[command(long_about = r#"
gpkg-related links tables of a GeoPackage through cataloged relationships:
  • Typed relations (features, tiles, attributes, media, simple_attributes)
  • Custom relations named x-{author}_{name}
  • One mapping table of (base_id, related_id) pairs per relationship
  • Related-row lookup across every relationship of a table

Example usage:
  gpkg-related --database parcels.gpkg init
  gpkg-related add parcels photos --relation media --mapping parcels_photos --create
  gpkg-related link parcels_photos 7 42
  gpkg-related related parcels 7
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the GeoPackage container (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Open the container read-only
    #[arg(long, global = true)]
    read_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the relation catalog in a container
    Init {
        /// Also write gpkg-related.toml pointing at the container
        #[arg(long)]
        write_config: bool,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Add a relationship between two tables
    Add {
        /// Base table name
        base: String,

        /// Related table name
        related: String,

        /// Relation type or custom relation name
        #[arg(short, long)]
        relation: String,

        /// Mapping table name (defaults to {base}_{related})
        #[arg(short, long)]
        mapping: Option<String>,

        /// Author prefix for custom relation names
        #[arg(short, long)]
        author: Option<String>,

        /// Create the related table when it does not exist
        #[arg(long)]
        create: bool,
    },

    /// Remove relationships and their mapping tables
    Remove {
        /// Base table of the relationship
        #[arg(long, requires_all = ["related", "relation"])]
        base: Option<String>,

        /// Related table of the relationship
        #[arg(long)]
        related: Option<String>,

        /// Relation type or custom relation name
        #[arg(long)]
        relation: Option<String>,

        /// Author prefix for custom relation names
        #[arg(long)]
        author: Option<String>,

        /// Remove the relationship using this mapping table
        #[arg(long, conflicts_with_all = ["base", "table"])]
        mapping: Option<String>,

        /// Remove every relationship involving this table
        #[arg(long, conflicts_with = "base")]
        table: Option<String>,
    },

    /// List cataloged relationships
    List {
        /// Only relationships with this base table
        #[arg(long)]
        base: Option<String>,

        /// Only relationships with this related table
        #[arg(long)]
        related: Option<String>,

        /// Only relationships with this relation name
        #[arg(long)]
        relation: Option<String>,

        /// Only the relationship using this mapping table
        #[arg(long)]
        mapping: Option<String>,

        /// Relationships involving this table on either side
        #[arg(long, conflicts_with_all = ["base", "related"])]
        table: Option<String>,
    },

    /// Map a base row to a related row
    Link {
        /// Mapping table name
        mapping: String,
        base_id: i64,
        related_id: i64,
    },

    /// Remove a mapped pair
    Unlink {
        /// Mapping table name
        mapping: String,
        base_id: i64,
        related_id: i64,
    },

    /// Show rows related to a base row
    Related {
        /// Base table name
        table: String,

        /// Base row id
        id: i64,

        /// Only these relation types (repeatable)
        #[arg(short, long)]
        relation: Vec<String>,
    },

    /// Delete every mapping referencing a row, from either side
    Purge {
        /// Table name
        table: String,

        /// Row id
        id: i64,
    },

    /// Drop every mapping table and the relation catalog
    Uninstall {
        /// Confirm the teardown
        #[arg(long)]
        yes: bool,
    },

    /// Show relation statistics
    Stats,
}

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print the JSON envelope of a successful command
pub fn emit_success(output_mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if output_mode.is_human() {
        return Ok(());
    }
    let envelope = serde_json::json!({
        "ok": true,
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn emit_failure(command: &str, error: &anyhow::Error) {
    let envelope = serde_json::json!({
        "ok": false,
        "command": command,
        "error": format!("{:#}", error),
    });
    match serde_json::to_string_pretty(&envelope) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{}", e),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let command_name = command_name(&cli.command);

    if let Err(e) = run(cli, output_mode) {
        if output_mode.is_human() {
            ui::error(&format!("{:#}", e));
        } else {
            emit_failure(command_name, &e);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Init { .. } => "init",
        Commands::Add { .. } => "add",
        Commands::Remove { .. } => "remove",
        Commands::List { .. } => "list",
        Commands::Link { .. } => "link",
        Commands::Unlink { .. } => "unlink",
        Commands::Related { .. } => "related",
        Commands::Purge { .. } => "purge",
        Commands::Uninstall { .. } => "uninstall",
        Commands::Stats => "stats",
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let loaded = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let database = match cli.database.or_else(|| loaded.database.clone().map(PathBuf::from)) {
        Some(path) => path,
        None => anyhow::bail!(
            "no container given (use --database or set `database` in {})",
            config::default_config_path().display()
        ),
    };

    let session = commands::Session {
        database,
        read_only: cli.read_only || loaded.read_only,
        author: loaded.author.clone(),
        config_path: cli.config.unwrap_or_else(config::default_config_path),
        output_mode,
    };
    tracing::debug!("Using container {}", session.database.display());

    match cli.command {
        Commands::Init { write_config, force } => commands::run_init(&session, write_config, force),
        Commands::Add {
            base,
            related,
            relation,
            mapping,
            author,
            create,
        } => {
            let mapping = mapping.unwrap_or_else(|| format!("{}_{}", base, related));
            commands::run_add(&session, &base, &related, &relation, &mapping, author.as_deref(), create)
        }
        Commands::Remove {
            base,
            related,
            relation,
            author,
            mapping,
            table,
        } => {
            let target = match (mapping, table, base, related, relation) {
                (Some(mapping), _, _, _, _) => commands::RemoveTarget::Mapping(mapping),
                (None, Some(table), _, _, _) => commands::RemoveTarget::Table(table),
                (None, None, Some(base), Some(related), Some(relation)) => commands::RemoveTarget::Relationship {
                    base,
                    related,
                    relation,
                    author,
                },
                _ => anyhow::bail!("remove needs --mapping, --table or --base with --related and --relation"),
            };
            commands::run_remove(&session, target)
        }
        Commands::List {
            base,
            related,
            relation,
            mapping,
            table,
        } => commands::run_list(&session, base, related, relation, mapping, table),
        Commands::Link {
            mapping,
            base_id,
            related_id,
        } => commands::run_link(&session, &mapping, base_id, related_id),
        Commands::Unlink {
            mapping,
            base_id,
            related_id,
        } => commands::run_unlink(&session, &mapping, base_id, related_id),
        Commands::Related { table, id, relation } => commands::run_related(&session, &table, id, &relation),
        Commands::Purge { table, id } => commands::run_purge(&session, &table, id),
        Commands::Uninstall { yes } => commands::run_uninstall(&session, yes),
        Commands::Stats => commands::run_stats(&session),
    }
}
