//! Command line argument parsing for the xiphos CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// xiphos - compound files, text mapping and term searches from the shell
#[derive(Parser, Debug, Clone)]
#[command(name = "xiphos")]
#[command(about = "Compound file tools, text mapping and term-level search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct XiphosArgs {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl XiphosArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose.saturating_add(1)
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Pack, list or unpack compound files
    Compound(CompoundArgs),

    /// Rewrite text through a pattern mapping
    Map(MapArgs),

    /// Search a JSON document collection
    Search(SearchArgs),
}

/// Arguments for the compound file commands
#[derive(Parser, Debug, Clone)]
pub struct CompoundArgs {
    #[command(subcommand)]
    pub action: CompoundAction,
}

/// Compound file operations
#[derive(Subcommand, Debug, Clone)]
pub enum CompoundAction {
    /// Pack files into a new compound file
    Pack {
        /// Compound file to write
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Files to pack, stored under their file names
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// List the entries of a compound file
    List {
        /// Compound file to read
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Extract every entry of a compound file into a directory
    Unpack {
        /// Compound file to read
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory receiving the entries
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

/// Arguments for mapping text
#[derive(Parser, Debug, Clone)]
pub struct MapArgs {
    /// JSON object of pattern to replacement pairs
    #[arg(short, long, value_name = "MAPPING_FILE")]
    pub mapping: PathBuf,

    /// Text to map
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Truncate the output to this many bytes
    #[arg(long)]
    pub capacity: Option<usize>,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// JSON array of documents, each an object of field to text
    #[arg(value_name = "DOCS_FILE")]
    pub docs: PathBuf,

    /// Field to search
    #[arg(value_name = "FIELD")]
    pub field: String,

    /// Kind of query
    #[arg(value_name = "KIND")]
    pub kind: QueryKind,

    /// Term, prefix or pattern to search for
    #[arg(value_name = "TERM")]
    pub term: String,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Number of top results to skip
    #[arg(short, long, default_value = "0")]
    pub offset: usize,

    /// Fields indexed as a single untokenized term (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub keyword: Vec<String>,

    /// Minimum similarity for fuzzy queries
    #[arg(long, default_value = "0.5")]
    pub min_similarity: f32,

    /// Number of leading characters a fuzzy match must share exactly
    #[arg(long, default_value = "0")]
    pub prefix_length: usize,

    /// Attach a score explanation to every hit
    #[arg(long)]
    pub explain: bool,
}

/// Query kinds available in the CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Exact term
    Term,
    /// Every term starting with the given text
    Prefix,
    /// `*` and `?` pattern
    Wildcard,
    /// Terms within an edit distance
    Fuzzy,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
