//! semsearch CLI
//!
//! Add, search and manage documents in a persisted semantic search collection.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use semsearch_embeddings::EmbeddingManager;
use semsearch_retrieval::{EmbeddingProviderType, RetrievalConfig, SearchService, metadata};

/// semsearch - semantic search over your documents
#[derive(Debug, Parser)]
#[command(name = "semsearch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Semantic search over a local document collection")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory collections are stored in
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Collection to operate on
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Embedding model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Embedding provider
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Local,
    Remote,
    Mock,
}

impl From<ProviderArg> for EmbeddingProviderType {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Local => Self::Local,
            ProviderArg::Remote => Self::Remote,
            ProviderArg::Mock => Self::Mock,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add documents given on the command line
    Add {
        /// Document texts
        #[arg(required = true)]
        texts: Vec<String>,

        /// Category stored with every document
        #[arg(long)]
        category: Option<String>,

        /// Topic stored with every document
        #[arg(long)]
        topic: Option<String>,
    },

    /// Add the contents of a .txt/.json file or a directory
    Ingest {
        /// File or directory
        path: PathBuf,
    },

    /// Search the collection
    Search {
        /// Natural language query
        query: String,

        /// Number of results
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Show collection statistics
    Stats,

    /// Delete every document in the collection
    Clear,

    /// Bulk load a sample documents file
    LoadSample {
        /// Sample file, defaults to the configured path
        path: Option<PathBuf>,
    },

    /// List the embedding models that can be used
    Models,

    /// Print the cosine similarity of two texts
    Compare {
        first: String,
        second: String,
    },
}

impl Cli {
    /// Load the configuration file, if any, and apply command line overrides.
    fn resolve_config(&self) -> anyhow::Result<RetrievalConfig> {
        let mut config = match &self.config {
            Some(path) => RetrievalConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RetrievalConfig::default(),
        };

        if let Some(dir) = &self.persist_dir {
            config.persist_dir = Some(dir.clone());
        }
        if let Some(name) = &self.collection {
            config.collection_name = name.clone();
        }
        if let Some(provider) = self.provider {
            config.embedding.provider = provider.into();
        }
        if let Some(model) = &self.model {
            config.embedding.model = Some(model.clone());
        }
        if let Commands::LoadSample { path: Some(path) } = &self.command {
            config.bulk.sample_path = path.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so results on stdout stay pipeable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    debug!("Resolved configuration: {config:?}");

    match &cli.command {
        Commands::Models => {
            run_models();
            return Ok(());
        }
        Commands::Compare { first, second } => {
            return run_compare(&config, first, second).await;
        }
        _ => {}
    }

    let service = SearchService::open(config.clone())
        .await
        .context("opening collection")?;

    match cli.command {
        Commands::Add {
            texts,
            category,
            topic,
        } => {
            let metadatas = (category.is_some() || topic.is_some()).then(|| {
                let category = category.unwrap_or_else(|| "custom".to_string());
                let topic = topic.unwrap_or_else(|| "general".to_string());
                texts
                    .iter()
                    .map(|_| metadata([("category", category.as_str()), ("topic", topic.as_str())]))
                    .collect()
            });
            println!("{}", service.add_documents(&texts, metadatas).await);
        }
        Commands::Ingest { path } => {
            println!("{}", service.ingest_path(path).await);
        }
        Commands::Search { query, k } => {
            let k = k.unwrap_or(config.query.default_k);
            let (results, stats) = service.search(&query, k).await;
            println!("{results}");
            if !stats.is_empty() {
                println!("{stats}");
            }
        }
        Commands::Stats => {
            println!("{}", service.get_collection_stats().await);
        }
        Commands::Clear => {
            println!("{}", service.clear_collection().await);
            println!("{}", service.get_collection_stats().await);
        }
        Commands::LoadSample { .. } => {
            let (message, stats) = service.add_sample_data().await;
            println!("{message}");
            println!("{stats}");
        }
        Commands::Models | Commands::Compare { .. } => {}
    }

    Ok(())
}

fn run_models() {
    for entry in EmbeddingManager::list_available_models() {
        let dimensions = entry
            .info
            .dimensions
            .map_or_else(|| "?".to_string(), |d| d.to_string());
        println!(
            "{:<8} {:<40} {:>5}  {:<10} {}",
            entry.provider.as_str(),
            entry.model,
            dimensions,
            entry.info.size,
            entry.info.description
        );
    }
}

async fn run_compare(config: &RetrievalConfig, first: &str, second: &str) -> anyhow::Result<()> {
    let manager = config
        .embedding
        .build_manager()
        .context("loading embedding model")?;
    let similarity = manager.compare_texts(first, second).await?;
    println!("{similarity:.3}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "semsearch",
            "--provider",
            "mock",
            "--collection",
            "notes",
            "--persist-dir",
            "/tmp/semsearch-test",
            "search",
            "rust ownership",
            "-k",
            "3",
        ]);
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.collection_name, "notes");
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Mock);
        assert_eq!(config.persist_dir, Some(PathBuf::from("/tmp/semsearch-test")));
        assert!(matches!(cli.command, Commands::Search { k: Some(3), .. }));
    }

    #[test]
    fn test_load_sample_path_overrides_config() {
        let cli = Cli::parse_from(["semsearch", "load-sample", "data/other.json"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.bulk.sample_path, PathBuf::from("data/other.json"));
    }

    #[test]
    fn test_add_requires_text() {
        assert!(Cli::try_parse_from(["semsearch", "add"]).is_err());
    }
}
