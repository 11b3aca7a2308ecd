//! CLI Tooling
//!
//! Command-line access to a repository: browse physical and virtual items,
//! inspect facet navigation trees, validate paths and import fixtures.

use crate::config::{ConfigLoader, ViewConfig};
use crate::error::{ApiError, StorageError};
use crate::nodetype::HIPPO_COUNT;
use crate::path::{self, PathResolver};
use crate::read::NodeRead;
use crate::session::Session;
use crate::store::fixture;
use crate::store::repository::Repository;
use crate::store::PropertyValue;
use crate::tooling::format::{
    format_listing_text, format_nav_text, format_properties_text, properties_json, ItemRow, NavTree,
};
use crate::types::{ItemRef, NodeId};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use walkdir::WalkDir;

/// facetview - virtual content views over a hierarchical document store
#[derive(Parser)]
#[command(name = "facetview")]
#[command(about = "Browse mirrors, facet selects and faceted navigation over stored content")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML fixture loaded into a volatile repository (repeatable)
    #[arg(long, global = true)]
    pub fixture: Vec<PathBuf>,

    /// sled store directory (overrides storage.path)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Configuration file path (layered over the user config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the children of a node
    Ls {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a node's properties, or a single property
    Get {
        path: String,
        /// Treat the last path segment as a property name
        #[arg(long)]
        property: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate path syntax without a repository
    Check { path: String },
    /// Print a facet navigation tree with counts
    Nav {
        path: String,
        /// Levels to expand below PATH
        #[arg(long, default_value = "2")]
        depth: usize,
        /// Leave out hippo:resultset nodes
        #[arg(long)]
        no_results: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Load a YAML fixture file, or every fixture below a directory, into the store
    Import {
        source: PathBuf,
        /// Parent node path
        #[arg(long, default_value = "/")]
        at: String,
        /// Skip the confirmation when the store already has content
        #[arg(long)]
        yes: bool,
    },
    /// Print the effective configuration
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

impl Cli {
    /// Command-line logging flags applied over the loaded configuration.
    pub fn apply_logging_overrides(&self, config: &mut ViewConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if self.log_file.is_some() {
            config.logging.file = self.log_file.clone();
        }
    }
}

/// Load configuration for a CLI invocation.
pub fn load_config(config_path: Option<&Path>) -> Result<ViewConfig, ApiError> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(config)
}

/// CLI context holding the repository a command runs against
pub struct CliContext {
    repository: Arc<Repository>,
    config: ViewConfig,
    store_path: Option<PathBuf>,
}

impl CliContext {
    /// Open the repository: fixtures give a volatile one, otherwise the sled store.
    pub fn new(config: ViewConfig, fixtures: &[PathBuf], store: Option<PathBuf>) -> Result<Self, ApiError> {
        if !fixtures.is_empty() {
            let repository = Repository::in_memory(&config.engine);
            let mut session = repository.login();
            for path in fixtures {
                fixture::load_file(&mut session, NodeId::root(), path)?;
            }
            session.save()?;
            info!(fixtures = fixtures.len(), "Loaded fixtures into volatile repository");
            return Ok(Self {
                repository,
                config,
                store_path: None,
            });
        }

        let store_path = match store {
            Some(path) => path,
            None => {
                let cwd = std::env::current_dir().map_err(StorageError::from)?;
                config.storage.resolve_path(&cwd)?
            }
        };
        let repository = Repository::open(&store_path, &config.engine)?;
        Ok(Self {
            repository,
            config,
            store_path: Some(store_path),
        })
    }

    /// Context over an existing repository.
    pub fn with_repository(repository: Arc<Repository>, config: ViewConfig) -> Self {
        Self {
            repository,
            config,
            store_path: None,
        }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Ls { path, format } => self.handle_ls(path, format),
            Commands::Get { path, property, format } => self.handle_get(path, *property, format),
            Commands::Check { path } => handle_check(path),
            Commands::Nav {
                path,
                depth,
                no_results,
                format,
            } => self.handle_nav(path, *depth, !*no_results, format),
            Commands::Import { source, at, yes } => self.handle_import(source, at, *yes),
            Commands::Config { format } => self.handle_config(format),
        }
    }

    fn handle_ls(&self, path: &str, format: &str) -> Result<String, ApiError> {
        let session = self.repository.login();
        let item = resolve(&session, path)?;
        let rows = session
            .children(item)?
            .into_iter()
            .map(|child| describe(&session, child))
            .collect::<Result<Vec<_>, _>>()?;
        match format {
            "json" => to_json(&rows),
            _ => Ok(format_listing_text(path, &rows)),
        }
    }

    fn handle_get(&self, path: &str, is_property: bool, format: &str) -> Result<String, ApiError> {
        let session = self.repository.login();
        if is_property {
            let property = PathResolver::new(&session)
                .get_property(session.root(), path, None)?
                .ok_or_else(|| ApiError::NodeNotFound(format!("property {}", path)))?;
            let values = property.string_values();
            return match format {
                "json" => to_json(&properties_json(std::slice::from_ref(&property))),
                _ => Ok(values.join("\n")),
            };
        }

        let item = resolve(&session, path)?;
        let row = describe(&session, item)?;
        let properties = session.properties(item)?;
        match format {
            "json" => to_json(&json!({
                "path": session.path(item)?,
                "item": row,
                "properties": properties_json(&properties),
            })),
            _ => Ok(format_properties_text(&row, &properties)),
        }
    }

    fn handle_nav(&self, path: &str, depth: usize, results: bool, format: &str) -> Result<String, ApiError> {
        let session = self.repository.login();
        let item = resolve(&session, path)?;
        let tree = nav_tree(&session, item, depth, results)?;
        match format {
            "json" => to_json(&tree),
            _ => Ok(format_nav_text(&tree)),
        }
    }

    fn handle_import(&self, source: &Path, at: &str, yes: bool) -> Result<String, ApiError> {
        let store_path = self.store_path.as_ref().ok_or_else(|| {
            ApiError::ConfigError("import needs a persistent store; drop --fixture".to_string())
        })?;
        let files = fixture_files(source)?;
        if files.is_empty() {
            return Ok(format!("No fixtures found under {}", source.display()));
        }

        let mut session = self.repository.login();
        let parent = match resolve(&session, at)? {
            ItemRef::Physical(id) => id,
            ItemRef::Virtual(_) => {
                return Err(ApiError::ConfigError(format!("cannot import below virtual node {}", at)))
            }
        };
        let has_content = !session.tree().node(&parent).map_or(true, |n| n.children.is_empty());
        if has_content && !yes {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!("{} already has children. Import anyway?", at))
                .interact()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;
            if !confirmed {
                return Ok("Import cancelled".to_string());
            }
        }

        let mut created = 0;
        for file in &files {
            created += fixture::load_file(&mut session, parent, file)?.len();
        }
        let events = session.save()?;
        info!(files = files.len(), created, events = events.len(), "Imported fixtures");
        Ok(format!(
            "Imported {} file(s), {} top-level node(s), {} change(s) into {}",
            files.len(),
            created,
            events.len(),
            store_path.display()
        ))
    }

    fn handle_config(&self, format: &str) -> Result<String, ApiError> {
        match format {
            "json" => to_json(&self.config),
            _ => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        }
    }
}

fn handle_check(path: &str) -> Result<String, ApiError> {
    path::check_format(path)?;
    Ok(format!("{}: valid", path))
}

fn resolve(session: &Session, path: &str) -> Result<ItemRef, ApiError> {
    if path == "/" {
        return Ok(session.root());
    }
    session
        .node_by_path(path)?
        .ok_or_else(|| ApiError::NodeNotFound(path.to_string()))
}

fn describe(session: &Session, item: ItemRef) -> Result<ItemRow, ApiError> {
    let (kind, id) = match item {
        ItemRef::Physical(id) => ("physical", id.to_string()),
        ItemRef::Virtual(id) => ("virtual", id.short()),
    };
    let count = match session.property(item, HIPPO_COUNT)? {
        Some(property) if item.is_virtual() => match property.first() {
            Some(PropertyValue::Long(count)) => Some(*count),
            _ => None,
        },
        _ => None,
    };
    Ok(ItemRow {
        name: session.name(item)?,
        index: session.index(item)?,
        primary_type: session.primary_type(item)?,
        kind,
        id,
        count,
    })
}

fn nav_tree(session: &Session, item: ItemRef, depth: usize, results: bool) -> Result<NavTree, ApiError> {
    let row = describe(session, item)?;
    let mut children = Vec::new();
    if depth > 0 {
        for child in session.children(item)? {
            if !results && session.name(child)? == crate::nodetype::HIPPO_RESULTSET {
                continue;
            }
            children.push(nav_tree(session, child, depth - 1, results)?);
        }
    }
    Ok(NavTree { item: row, children })
}

/// A fixture file, or the YAML files below a directory in path order.
fn fixture_files(source: &Path) -> Result<Vec<PathBuf>, ApiError> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| StorageError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let is_yaml = matches!(
            entry.path().extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if entry.file_type().is_file() && is_yaml {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e.to_string())))
}
