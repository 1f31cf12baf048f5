use clap::{Parser, Subcommand};
use pdf_lens::Result;
use pdf_lens::commands::{
    SearchOptions, clear_store, configure, delete_document, ingest_file, list_documents, search,
};
use pdf_lens::config::{Config, get_config_dir};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-lens")]
#[command(about = "Hybrid semantic and keyword search over PDF passages")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector database (default: ~/.pdf-lens)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file with defaults, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed and store the pages of an extracted PDF text file
    Ingest {
        /// Text file with one page per form feed
        file: PathBuf,
        /// Display name for the document (default: file name)
        #[arg(long)]
        name: Option<String>,
        /// Stable document id (default: random UUID)
        #[arg(long)]
        document_id: Option<String>,
    },
    /// List stored documents
    List,
    /// Delete a document by display name
    Delete {
        /// Display name of the document
        pdf_name: String,
    },
    /// Remove every stored document
    Clear,
    /// Search stored passages
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        /// Skip the embedding provider and rank by keywords only
        #[arg(long)]
        keyword_only: bool,
        /// Leave out passages from this document id
        #[arg(long)]
        exclude: Option<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    if let Commands::Config { show } = cli.command {
        configure(&config_dir, show)?;
        return Ok(());
    }

    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest {
            file,
            name,
            document_id,
        } => {
            ingest_file(&config, &file, name, document_id).await?;
        }
        Commands::List => {
            list_documents(&config).await?;
        }
        Commands::Delete { pdf_name } => {
            delete_document(&config, &pdf_name).await?;
        }
        Commands::Clear => {
            clear_store(&config).await?;
        }
        Commands::Search {
            query,
            limit,
            keyword_only,
            exclude,
            json,
        } => {
            let options = SearchOptions {
                query,
                limit,
                keyword_only,
                exclude_document: exclude,
                json,
            };
            search(&config, &options).await?;
        }
    }

    Ok(())
}
