//! Line commands for driving a [`Session`](crate::Session) interactively.

use crate::hexview::{self, HexError};
use snafu::{OptionExt, ResultExt, Snafu};
use std::path::PathBuf;

/// Largest chunk size accepted from interactive input.
pub const MAX_INTERACTIVE_CHUNK_SIZE: usize = 4096;

/// Errors when parsing a command line.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ParseError {
    #[snafu(display("unknown command {name:?}"))]
    UnknownCommand { name: String },

    #[snafu(display("{command} expects {expected}"))]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[snafu(display("invalid number {text:?}"))]
    InvalidNumber {
        text: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("invalid hex"))]
    InvalidHex { source: HexError },
}

/// A single interactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Goto(u64),
    /// Chunk size, already clamped to `1..=MAX_INTERACTIVE_CHUNK_SIZE`.
    Size(usize),
    /// Set one byte of the current chunk.
    Set { offset: usize, value: u8 },
    /// Replace the whole current chunk.
    Raw(Vec<u8>),
    Show,
    Info,
    Save(PathBuf),
    Help,
    Quit,
}

/// Usage text listing every command.
pub const HELP: &str = "\
commands:
  next | n             go to the next chunk
  prev | p             go to the previous chunk
  goto N | g N         go to chunk N
  size N               change the chunk size (1-4096)
  set I HEX            set byte I of the current chunk
  raw HEX...           replace the current chunk with HEX
  show | s             print the current chunk
  info                 print file and chunk sizes
  save PATH | w PATH   save the edited file to PATH
  help | ?             print this text
  quit | q             leave without saving";

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let command = match name {
        "" => return Ok(None),
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "goto" | "g" => Command::Goto(number(arg(rest, "goto", "a chunk index")?)?),
        "size" => {
            let size: usize = number(arg(rest, "size", "a chunk size")?)?;
            Command::Size(size.clamp(1, MAX_INTERACTIVE_CHUNK_SIZE))
        }
        "set" => {
            let mut parts = rest.split_whitespace();
            let offset = number(parts.next().context(MissingArgumentSnafu {
                command: "set",
                expected: "a byte offset and a hex value",
            })?)?;
            let value = parts.next().context(MissingArgumentSnafu {
                command: "set",
                expected: "a byte offset and a hex value",
            })?;

            Command::Set {
                offset,
                value: hexview::parse_byte(value).context(InvalidHexSnafu)?,
            }
        }
        "raw" => Command::Raw(hexview::decode_raw(rest).context(InvalidHexSnafu)?),
        "show" | "s" => Command::Show,
        "info" => Command::Info,
        "save" | "w" => Command::Save(PathBuf::from(arg(rest, "save", "an output path")?)),
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => return UnknownCommandSnafu { name }.fail(),
    };

    Ok(Some(command))
}

fn arg<'a>(rest: &'a str, command: &'static str, expected: &'static str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        return MissingArgumentSnafu { command, expected }.fail();
    }

    Ok(rest)
}

fn number<T: std::str::FromStr<Err = std::num::ParseIntError>>(text: &str) -> Result<T, ParseError> {
    text.parse().context(InvalidNumberSnafu { text })
}
