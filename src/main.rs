//! CLI: build an index, fetch a result set, or serve a live session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ann_stream::builder::{BuildOptions, IndexBuilder};
use ann_stream::embedding::create_provider;
use ann_stream::query::{QueryHandle, QueryOptions};
use ann_stream::server::{self, AppState};
use ann_stream::session::{self, StreamSessionAdapter};
use ann_stream::store::{self, Collection, Modality};
use ann_stream::{logging, AnnConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ann-stream")]
#[command(about = "Approximate nearest-neighbor retrieval for annotation sessions", long_about = None)]
struct Cli {
    /// YAML config file
    #[arg(long, global = true, env = "ANN_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "ann_stream=debug"
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,

    /// Embedding model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    /// Embedding width
    #[arg(long, global = true)]
    dimensions: Option<usize>,

    /// Kind of examples in the source
    #[arg(long, global = true, value_enum, default_value = "text")]
    modality: Modality,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every example of a source and persist the index
    Index {
        /// JSONL/JSON file or image directory
        source: PathBuf,
        /// Where to write the index file
        index_path: PathBuf,
        /// Items per embedding call
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Query an index once and write the nearest examples as JSONL
    Fetch {
        source: PathBuf,
        index_path: PathBuf,
        /// Output JSONL file
        out_path: PathBuf,
        #[arg(short, long)]
        query: String,
        /// Number of examples to fetch
        #[arg(short)]
        n: Option<usize>,
        /// Drop inline base64 media from the output
        #[arg(short = 'R', long)]
        remove_base64: bool,
    },
    /// Serve a session streaming the nearest examples for a query
    Serve {
        source: PathBuf,
        index_path: PathBuf,
        #[arg(short, long)]
        query: String,
        /// Number of examples per stream
        #[arg(short)]
        n: Option<usize>,
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
        /// Drop inline base64 media before delivery
        #[arg(short = 'R', long)]
        remove_base64: bool,
        /// Override the index's search beam width
        #[arg(long)]
        ef_search: Option<usize>,
    },
}

fn load_config(cli: &Cli) -> Result<AnnConfig> {
    let mut config = AnnConfig::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(dimensions) = cli.dimensions {
        config.dimensions = dimensions;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = Some(level.clone());
    }
    if cli.no_color {
        config.no_color = true;
    }
    match &cli.command {
        Commands::Index { batch_size: Some(b), .. } => config.batch_size = *b,
        Commands::Fetch { n: Some(n), .. } | Commands::Serve { n: Some(n), .. } => config.n = *n,
        _ => {}
    }
    config.validate()?;
    Ok(config)
}

fn load_collection(source: &Path, modality: Modality) -> Result<Arc<Collection>> {
    let collection = store::load(source, modality.normalizer())
        .with_context(|| format!("loading examples from {}", source.display()))?;
    Ok(Arc::new(collection))
}

async fn open_handle(
    config: &AnnConfig,
    collection: Arc<Collection>,
    index_path: &Path,
    ef_search: Option<usize>,
) -> Result<QueryHandle> {
    let provider = create_provider(&config.model, config.dimensions)?;
    let options = QueryOptions {
        ef_search,
        embed_timeout: config.embed_timeout(),
    };
    let handle = QueryHandle::open(collection, index_path, provider, options)
        .await
        .with_context(|| format!("opening index {}", index_path.display()))?;
    Ok(handle)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    match cli.command {
        Commands::Index {
            source, index_path, ..
        } => {
            let collection = load_collection(&source, cli.modality)?;
            let provider = create_provider(&config.model, config.dimensions)?;
            let options = BuildOptions {
                batch_size: config.batch_size,
                params: config.hnsw_params(),
                embed_timeout: config.embed_timeout(),
            };
            IndexBuilder::new(provider, options)?
                .build(&collection)
                .await?
                .persist(&index_path)?;
            println!(
                "Indexed {} examples into {}",
                collection.len(),
                index_path.display()
            );
        }
        Commands::Fetch {
            source,
            index_path,
            out_path,
            query,
            remove_base64,
            ..
        } => {
            let collection = load_collection(&source, cli.modality)?;
            let handle = open_handle(&config, collection, &index_path, None).await?;
            let result = handle.query(&query, config.n).await?;
            result.write_jsonl(&out_path, remove_base64)?;
            println!("Wrote {} examples to {}", result.len(), out_path.display());
            handle.close();
        }
        Commands::Serve {
            source,
            index_path,
            query,
            addr,
            remove_base64,
            ef_search,
            ..
        } => {
            let collection = load_collection(&source, cli.modality)?;
            let handle = open_handle(&config, collection, &index_path, ef_search).await?;
            let adapter = Arc::new(StreamSessionAdapter::new(Arc::new(handle), config.n)?);
            let controller = adapter.start(&query).await?;
            if remove_base64 {
                controller.add_transform("remove_base64", session::remove_base64())?;
            }
            let state = Arc::new(AppState::new(Arc::new(controller), adapter));
            server::start(&addr, state).await?;
        }
    }
    Ok(())
}
