//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    author = "neur0map",
    about = "Ask questions about your documents",
    long_about = "docqa extracts text from PDFs and text files (with OCR for scanned pages), indexes it \
                  for semantic retrieval and answers questions with a hosted language model, falling back \
                  to web search when the documents have nothing relevant."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Language-model API key (defaults to the variable named by llm.api_key_env)
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest documents and answer a single question
    Ask {
        /// Question to ask
        question: String,

        /// Document to ingest first (repeatable)
        #[arg(short, long = "document", value_name = "FILE")]
        documents: Vec<PathBuf>,

        /// Print the answer as JSON, including route and token estimate
        #[arg(long)]
        json: bool,
    },

    /// Interactive session (/upload, /reset, /history, /tokens, /quit)
    Chat {
        /// Document to ingest before the first question (repeatable)
        #[arg(short, long = "document", value_name = "FILE")]
        documents: Vec<PathBuf>,
    },

    /// Show how a file would be split into chunks
    Chunk {
        /// File to extract and chunk
        file: PathBuf,

        /// Window size in characters (defaults to chunking.chunk_size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap in characters (defaults to chunking.overlap)
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration file location
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Command typed at the `chat` prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Question(String),
    Upload(PathBuf),
    Reset,
    History(Option<usize>),
    Tokens,
    Quit,
    Help,
    Empty,
    Unknown(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatInput::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ChatInput::Question(line.to_string());
        };

        let (command, arg) = match rest.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (rest, ""),
        };

        match command {
            "upload" if !arg.is_empty() => ChatInput::Upload(PathBuf::from(arg)),
            "reset" => ChatInput::Reset,
            "history" => ChatInput::History(arg.parse().ok()),
            "tokens" => ChatInput::Tokens,
            "quit" | "exit" => ChatInput::Quit,
            "help" => ChatInput::Help,
            _ => ChatInput::Unknown(line.to_string()),
        }
    }
}
