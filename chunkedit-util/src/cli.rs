use chunkedit::{DEFAULT_CHUNK_SIZE, MergeMode};
use chunkedit_util::command::MAX_INTERACTIVE_CHUNK_SIZE;
use chunkedit_util::hexview;
use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "chunkedit")]
#[command(about = "Chunk-addressed binary file editor", long_about = None)]
pub struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display size information about a file
    Info {
        #[command(flatten)]
        file: FileArgs,
    },

    /// Print chunks as hex
    Dump {
        #[command(flatten)]
        file: FileArgs,

        /// Only print this chunk
        #[arg(short, long, value_name = "INDEX")]
        index: Option<u64>,

        /// Print contiguous hex instead of a grid
        #[arg(long)]
        raw: bool,
    },

    /// Replace chunks and save the result to a new file
    Patch {
        #[command(flatten)]
        file: FileArgs,

        /// Output file
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,

        /// Chunk replacement, may be repeated
        #[arg(short = 's', long = "set", value_name = "INDEX=HEX", value_parser = parse_replacement, required = true)]
        replacements: Vec<Replacement>,

        #[command(flatten)]
        save: SaveArgs,
    },

    /// Edit a file interactively, one chunk at a time
    Edit {
        #[command(flatten)]
        file: FileArgs,

        /// Refuse chunk size changes while edits are pending
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        save: SaveArgs,
    },
}

#[derive(Debug, Args)]
pub struct FileArgs {
    /// Path to the input file
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Chunk size in bytes
    #[arg(
        short,
        long,
        value_name = "SIZE",
        default_value_t = DEFAULT_CHUNK_SIZE,
        value_parser = clap::value_parser!(u64).range(1..=MAX_INTERACTIVE_CHUNK_SIZE as u64).map(|v| v as usize)
    )]
    pub chunk_size: usize,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// How replacements of a different length than the chunk size are saved
    #[arg(long, value_enum, default_value_t = Layout::Compat)]
    pub layout: Layout,

    /// Write to a temporary file and rename it into place
    #[arg(long)]
    pub atomic: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Layout {
    /// Write replacements verbatim; the output grows or shrinks with them
    Compat,
    /// Keep every chunk at its original length
    Preserve,
}

impl From<Layout> for MergeMode {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Compat => MergeMode::Compat,
            Layout::Preserve => MergeMode::PreserveLayout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub index: u64,
    pub data: Vec<u8>,
}

fn parse_replacement(text: &str) -> Result<Replacement, String> {
    let (index, data) = text
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=HEX, got {text:?}"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("invalid chunk index {index:?}: {e}"))?;
    let data = hexview::decode_raw(data).map_err(|e| e.to_string())?;

    Ok(Replacement { index, data })
}
