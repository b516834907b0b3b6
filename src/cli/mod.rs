//! CLI command definitions and parsing
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    author = "neur0map",
    about = "Ask questions about your voice notes",
    long_about = "Folio chunks voice-note transcripts, embeds every chunk and answers \
                  folder-scoped questions from the most relevant chunks with an LLM."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/folio/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage folders
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Manage notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Chunk, embed and store a note's transcript
    #[command(group(ArgGroup::new("source").args(["file", "audio"])))]
    Ingest {
        /// Note ID
        note_id: i64,

        /// Read the transcript from a text file
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Transcribe an audio file first
        #[arg(short, long, value_name = "FILE")]
        audio: Option<PathBuf>,

        /// Transcript language for audio ("english" or "arabic")
        #[arg(long, default_value = "english")]
        language: String,

        /// Custom transcription prompt for audio
        #[arg(long)]
        prompt: Option<String>,

        /// Run through the background ingestion queue
        #[arg(short, long)]
        background: bool,
    },

    /// Ask a question about the notes in a folder
    Ask {
        /// Folder ID (0 for unfiled notes)
        folder_id: i64,

        /// Question to ask
        question: String,

        /// Print the transcript chunks the answer was grounded in
        #[arg(short, long)]
        sources: bool,
    },

    /// Show the chunks nearest to a query without asking the LLM
    Search {
        /// Folder ID (0 for unfiled notes)
        folder_id: i64,

        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the stored chunks of a note
    Chunks {
        /// Note ID
        note_id: i64,
    },

    /// Show database statistics
    Stats,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum FolderAction {
    /// Create a folder
    Create {
        /// Folder name
        name: String,

        /// Owning user ID
        #[arg(short, long, default_value = "1")]
        user_id: i64,
    },

    /// List folders
    List,
}

#[derive(Subcommand, Debug)]
pub enum NoteAction {
    /// Create a note
    Create {
        /// Note title
        title: String,

        /// Folder ID
        #[arg(short, long)]
        folder: Option<i64>,
    },

    /// Show a note
    Show {
        /// Note ID
        note_id: i64,
    },

    /// List notes in a folder (unfiled notes when no folder is given)
    List {
        /// Folder ID
        #[arg(short, long)]
        folder: Option<i64>,
    },

    /// Move a note (and its chunks) to another folder
    Move {
        /// Note ID
        note_id: i64,

        /// Target folder ID (omit to unfile)
        #[arg(short, long)]
        folder: Option<i64>,
    },

    /// Delete a note and its chunks
    Delete {
        /// Note ID
        note_id: i64,
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

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
