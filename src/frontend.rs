//! Interactive question loop.
//!
//! The retrieval and generation chain is built once, when [`App`] is
//! constructed, and handed to [`run`] explicitly. If the index could not be
//! loaded the app carries a setup-required message instead and the loop
//! refuses questions.

use std::io::{BufRead, Write};

use log::{error, info};

use crate::config::{DataLayout, Settings};
use crate::embedding;
use crate::error::Result;
use crate::generation::{Answer, AzureChatModel, RagChain};
use crate::retrieval::Retriever;

pub const SETUP_REQUIRED: &str =
    "Failed to load vector store. Please run ingestion and indexing first.";
pub const PROMPT: &str = "Enter your question: ";

pub enum App {
    Ready(Box<dyn Answer>),
    SetupRequired(String),
}

impl App {
    /// Loads the index and builds the chain. A missing or unusable index maps
    /// to the fixed setup message; other failures keep their own text.
    pub fn initialize(settings: &Settings, layout: &DataLayout) -> Self {
        match build_chain(settings, layout) {
            Ok(chain) => App::Ready(Box::new(chain)),
            Err(e) if e.is_setup_required() => {
                error!("{}", e);
                App::SetupRequired(SETUP_REQUIRED.to_string())
            }
            Err(e) => {
                error!("{}", e);
                App::SetupRequired(format!("Error: {}", e))
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, App::Ready(_))
    }
}

fn build_chain(settings: &Settings, layout: &DataLayout) -> Result<RagChain> {
    let embedder = embedding::from_settings(settings)?;
    let retriever = Retriever::load(&layout.index_dir, embedder, settings.top_k)?;
    let model = AzureChatModel::new(&settings.azure)?;
    Ok(RagChain::new(retriever, Box::new(model)))
}

/// Reads one question per line until EOF or `exit`/`quit`, answering each
/// before reading the next. Blank lines are ignored.
pub fn run<R: BufRead, W: Write>(app: &mut App, input: R, mut output: W) -> std::io::Result<()> {
    let chain = match app {
        App::Ready(chain) => chain,
        App::SetupRequired(message) => {
            writeln!(output, "{}", message)?;
            return Ok(());
        }
    };

    writeln!(output, "Ask questions about company financial statements.")?;
    write!(output, "{}", PROMPT)?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if !question.is_empty() {
            info!("Question: {}", question);
            match chain.answer(question) {
                Ok(answer) => writeln!(output, "Answer\n{}\n", answer)?,
                Err(e) => writeln!(output, "Error: {}\n", e)?,
            }
        }
        write!(output, "{}", PROMPT)?;
        output.flush()?;
    }
    Ok(())
}
