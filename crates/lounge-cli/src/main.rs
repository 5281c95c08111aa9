//! Lounge CLI
//!
//! Drives a Lounge engine over the configured SurrealDB store. Models come
//! from a JSON schema file of the form `{ "<Model>": <shape>, ... }`.
//!
//! ## Commands
//!
//! - `models`: List registered models and their fields
//! - `config`: Show the effective engine configuration
//! - `save`: Create a document, or merge JSON data into the one stored under `--id`
//! - `fetch`: Load a document, following references
//! - `populate`: Load a document lazily, then resolve one field
//! - `remove`: Delete a single document

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lounge_core::{
    Document, FetchOptions, Lounge, LoungeConfig, PopulateOptions, Population, Registry,
};
use lounge_store::SurrealDocumentStore;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "lounge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Object-document mapper over key-value stores", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Model schema file (JSON)
    #[arg(short, long, global = true, env = "LOUNGE_SCHEMA", default_value = "models.json")]
    schema: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models
    Models,

    /// Show the effective engine configuration
    Config,

    /// Save a document (and every document it references)
    Save {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Document data as JSON, or @path to read it from a file
        #[arg(short, long)]
        data: String,

        /// Document id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Fetch a document by store key
    Fetch {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Store key
        #[arg(short, long)]
        key: String,

        /// Follow at most this many reference hops
        #[arg(long, conflicts_with = "lazy")]
        depth: Option<usize>,

        /// Leave references as placeholders
        #[arg(long)]
        lazy: bool,
    },

    /// Fetch a document lazily, then populate one field
    Populate {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Store key
        #[arg(short, long)]
        key: String,

        /// Field to populate (all reference fields when omitted)
        #[arg(short, long)]
        field: Option<String>,
    },

    /// Remove a document (referenced documents are kept)
    Remove {
        /// Model name
        #[arg(short, long)]
        model: String,

        /// Store key
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    lounge_core::init_tracing(cli.json, level);

    let config = LoungeConfig::from_env().map_err(anyhow::Error::msg)?;
    let registry = load_registry(&cli.schema, &config)?;
    let store = SurrealDocumentStore::from_env()
        .await
        .context("Failed to connect to document store")?;
    let lounge = Lounge::with_config(registry, Arc::new(store), config);

    let output = match cli.command {
        Commands::Models => cmd_models(&lounge),
        Commands::Config => serde_json::to_value(lounge.config())?,
        Commands::Save { model, data, id } => {
            cmd_save(&lounge, &model, &read_data(&data)?, id.as_deref()).await?
        }
        Commands::Fetch {
            model,
            key,
            depth,
            lazy,
        } => cmd_fetch(&lounge, &model, &key, population(depth, lazy)).await?,
        Commands::Populate { model, key, field } => {
            cmd_populate(&lounge, &model, &key, field.as_deref()).await?
        }
        Commands::Remove { model, key } => cmd_remove(&lounge, &model, &key).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Build the registry from a schema file.
fn load_registry(path: &Path, config: &LoungeConfig) -> Result<Arc<Registry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let declaration: Value = serde_json::from_str(&text)
        .with_context(|| format!("Schema file {} is not valid JSON", path.display()))?;
    let registry = config
        .registry_builder()
        .declare(&declaration)
        .build()
        .with_context(|| format!("Invalid schema in {}", path.display()))?;
    info!(models = registry.len(), "schema loaded");
    Ok(registry)
}

/// Inline JSON, or `@path` for a file.
fn read_data(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file {path}"))?,
        None => arg.to_string(),
    };
    let data: Value = serde_json::from_str(&text).context("Document data is not valid JSON")?;
    if !data.is_object() {
        bail!("Document data must be a JSON object");
    }
    Ok(data)
}

fn population(depth: Option<usize>, lazy: bool) -> Population {
    match (lazy, depth) {
        (true, _) => Population::Lazy,
        (false, Some(depth)) => Population::Depth(depth),
        (false, None) => Population::Eager,
    }
}

fn describe(doc: &Document) -> Value {
    json!({
        "model": doc.model_name(),
        "key": doc.key(),
        "document": doc.to_value(),
    })
}

fn cmd_models(lounge: &Lounge) -> Value {
    let models: Vec<Value> = lounge
        .registry()
        .names()
        .filter_map(|name| lounge.registry().get(name))
        .map(|model| {
            let fields: serde_json::Map<String, Value> = model
                .tree()
                .iter()
                .map(|attr| (attr.name.clone(), Value::String(attr.descriptor.describe())))
                .collect();
            json!({ "model": model.name(), "fields": fields })
        })
        .collect();
    Value::Array(models)
}

async fn cmd_save(lounge: &Lounge, model: &str, data: &Value, id: Option<&str>) -> Result<Value> {
    let model_type = lounge.model(model)?;
    let doc = match id {
        Some(id) => match lounge.find_by_id(model, id, FetchOptions::lazy()).await? {
            Some(existing) => {
                debug!(key = %existing.key(), "merging into stored document");
                existing
            }
            None => Document::with_id(&model_type, id),
        },
        None => Document::new(&model_type),
    };
    let fields = data.as_object().into_iter().flatten();

    let saved = lounge
        .save_with(&doc, fields.map(|(k, v)| (k, v.clone())))
        .await
        .with_context(|| format!("Failed to save {model}"))?;
    info!(key = %saved.key(), "saved");
    Ok(describe(&saved))
}

async fn cmd_fetch(
    lounge: &Lounge,
    model: &str,
    key: &str,
    population: Population,
) -> Result<Value> {
    let options = FetchOptions { population };
    match lounge.fetch(model, key, options).await? {
        Some(doc) => Ok(describe(&doc)),
        None => bail!("No {model} document at '{key}'"),
    }
}

async fn cmd_populate(
    lounge: &Lounge,
    model: &str,
    key: &str,
    field: Option<&str>,
) -> Result<Value> {
    let Some(doc) = lounge.fetch(model, key, FetchOptions::lazy()).await? else {
        bail!("No {model} document at '{key}'");
    };
    let options = match field {
        Some(field) => {
            if !doc.model().tree().contains(field) {
                bail!("{model} has no field '{field}'");
            }
            PopulateOptions::field(field)
        }
        None => PopulateOptions::all(),
    };
    let doc = lounge.populate(&doc, options).await?;
    Ok(describe(&doc))
}

async fn cmd_remove(lounge: &Lounge, model: &str, key: &str) -> Result<Value> {
    let Some(doc) = lounge.fetch(model, key, FetchOptions::lazy()).await? else {
        bail!("No {model} document at '{key}'");
    };
    lounge.remove(&doc).await?;
    Ok(json!({ "removed": key }))
}
