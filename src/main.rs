use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};
use tracing_subscriber::EnvFilter;

use finrag::chunking::{self, Chunker};
use finrag::config::{DataLayout, Settings};
use finrag::frontend::{self, App};
use finrag::generation::{Answer, AzureChatModel, RagChain};
use finrag::{IndexBuilder, Result, Retriever, embedding, filing, grab_all_documents};

const VERIFY_QUERY: &str = "What is the revenue?";

#[derive(Parser, Debug)]
#[command(name = "finrag", about = "Question answering over financial filings")]
struct Cli {
    /// Root of the raw/, processed/, chunks/ and index/ directories
    #[arg(long, env = "FINRAG_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render raw filing archives as one sentence per fact
    Normalize,
    /// Split normalized files into overlapping chunks
    Chunk {
        /// Embed the first chunk to check the provider configuration
        #[arg(long, default_value_t = false)]
        check_embedding: bool,
    },
    /// Embed all chunks and write the vector index from scratch
    Index {
        /// Run a sample search against the fresh index
        #[arg(long, default_value_t = false)]
        verify: bool,
    },
    /// Print the top-K chunks for a query
    Search {
        query: String,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Answer questions; interactive unless --question is given
    Ask {
        #[arg(long)]
        question: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let layout = DataLayout::new(&cli.data_dir);

    match run(cli.command, &settings, &layout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, settings: &Settings, layout: &DataLayout) -> Result<()> {
    match command {
        Command::Normalize => {
            let report = filing::normalize_dir(&layout.raw_dir, &layout.processed_dir)?;
            info!(
                "{} archives written, {} skipped, {} failed",
                report.written.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        Command::Chunk { check_embedding } => {
            let docs = grab_all_documents(&layout.processed_dir)?;
            info!("Chunking {} documents...", docs.len());
            let chunks = Chunker::new()?.chunk_all_documents(&docs);
            chunking::save_chunks(&chunks, &layout.chunks_file)?;
            if check_embedding {
                let mut embedder = embedding::from_settings(settings)?;
                embedding::check_first_chunk(embedder.as_mut(), &chunks);
            }
        }
        Command::Index { verify } => {
            let chunks = chunking::load_chunks(&layout.chunks_file)?;
            let mut embedder = embedding::from_settings(settings)?;
            let report = IndexBuilder::new(&layout.index_dir).rebuild(&chunks, embedder.as_mut())?;
            info!(
                "Indexed {} / {} chunks, {} failed batches",
                report.indexed,
                report.total,
                report.failed.len()
            );
            if verify {
                let mut retriever = Retriever::load(&layout.index_dir, embedder, settings.top_k)?;
                print_hits(&mut retriever, VERIFY_QUERY, settings.top_k)?;
            }
        }
        Command::Search { query, k } => {
            let embedder = embedding::from_settings(settings)?;
            let mut retriever = Retriever::load(&layout.index_dir, embedder, settings.top_k)?;
            print_hits(&mut retriever, &query, k.unwrap_or(settings.top_k))?;
        }
        Command::Ask { question: Some(question) } => {
            let embedder = embedding::from_settings(settings)?;
            let retriever = Retriever::load(&layout.index_dir, embedder, settings.top_k)?;
            let mut chain = RagChain::new(retriever, Box::new(AzureChatModel::new(&settings.azure)?));
            println!("Question: {}\n", question);
            println!("Answer: {}", chain.answer(&question)?);
        }
        Command::Ask { question: None } => {
            let mut app = App::initialize(settings, layout);
            frontend::run(&mut app, io::stdin().lock(), io::stdout().lock())?;
        }
    }
    Ok(())
}

fn print_hits(retriever: &mut Retriever, query: &str, k: usize) -> Result<()> {
    println!("Searching for: '{}'", query);
    let hits = retriever.similarity_search(query, k)?;
    println!("\nTop {} results:", hits.len());
    for (rank, hit) in hits.iter().enumerate() {
        let preview: String = hit.chunk.content.chars().take(200).collect();
        println!("\n--- Result {} ---", rank + 1);
        println!("Source: {}", hit.chunk.source);
        println!("Content: {}...", preview);
    }
    Ok(())
}
