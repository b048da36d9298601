mod cli;

use chunkedit::{ChunkStore, SaveOptions, StoreOptions};
use chunkedit_util::command::{self, Command as EditCommand};
use chunkedit_util::{ChunkInfo, ConsoleProgress, Session, SilentProgress, hexview};
use clap::Parser;
use cli::{Cli, Command, FileArgs, SaveArgs};
use log::{debug, warn};
use snafu::{ResultExt, Snafu};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Top-level application errors for chunkedit.
#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to open '{}'", path.display()))]
    Open {
        path: PathBuf,
        source: chunkedit::OpenError,
    },

    #[snafu(display("failed to read chunk"))]
    ReadChunk {
        source: chunkedit::ReadChunkError,
    },

    #[snafu(display("chunk #{index} is out of range (file has {total} chunks)"))]
    OutOfRange { index: u64, total: u64 },

    #[snafu(display("failed to save '{}'", path.display()))]
    Save {
        path: PathBuf,
        source: chunkedit::SaveError,
    },

    #[snafu(display("failed to start editing session"))]
    StartSession {
        source: chunkedit_util::SessionError,
    },

    #[snafu(display("failed to read input"))]
    ReadInput { source: std::io::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: std::io::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[snafu::report]
fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Command::Info { file } => cmd_info(&file),
        Command::Dump { file, index, raw } => cmd_dump(&file, index, raw),
        Command::Patch {
            file,
            output,
            replacements,
            save,
        } => cmd_patch(&file, &output, replacements, &save),
        Command::Edit { file, strict, save } => cmd_edit(&file, strict, &save),
    }
}

fn setup_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);

    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }

    builder.init();
}

fn open_store(file: &FileArgs, strict: bool) -> Result<ChunkStore> {
    let options = StoreOptions {
        chunk_size: file.chunk_size,
        strict_chunk_size: strict,
    };

    ChunkStore::open_with(&file.path, options).context(OpenSnafu { path: &file.path })
}

fn save_options(save: &SaveArgs) -> SaveOptions {
    SaveOptions {
        mode: save.layout.into(),
        atomic: save.atomic,
    }
}

fn cmd_info(file: &FileArgs) -> Result<()> {
    let store = open_store(file, false)?;

    println!("File:           {}", file.path.display());
    println!("File Size:      {} bytes", store.file_size());
    println!("Chunk Size:     {} bytes", store.chunk_size());
    println!("Total Chunks:   {}", store.total_chunks());

    let last = store.chunk_range(store.total_chunks().saturating_sub(1));

    if !last.is_empty() && last.end - last.start != store.chunk_size() as u64 {
        println!("Last Chunk:     {} bytes", last.end - last.start);
    }

    Ok(())
}

fn cmd_dump(file: &FileArgs, index: Option<u64>, raw: bool) -> Result<()> {
    let store = open_store(file, false)?;
    let total = store.total_chunks();

    let indices = match index {
        Some(index) if index >= total => return OutOfRangeSnafu { index, total }.fail(),
        Some(index) => index..index + 1,
        None => 0..total,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for index in indices {
        let data = store.read_chunk(index).context(ReadChunkSnafu)?;
        let info = ChunkInfo {
            index,
            start: store.chunk_range(index).start,
            len: data.len(),
        };

        let body = if raw {
            format!("{}\n", hexview::encode_raw(&data))
        } else {
            hexview::format_grid(&data, info.start)
        };

        write!(out, "{info}\n{body}").context(WriteOutputSnafu)?;
    }

    Ok(())
}

fn cmd_patch(
    file: &FileArgs,
    output: &Path,
    replacements: Vec<cli::Replacement>,
    save: &SaveArgs,
) -> Result<()> {
    let mut store = open_store(file, false)?;
    let total = store.total_chunks();

    for replacement in replacements {
        if replacement.index >= total {
            warn!(
                "chunk #{} is beyond the last chunk #{} and will not be saved",
                replacement.index,
                total.saturating_sub(1)
            );
        }

        debug!(
            "replacing chunk #{} with {} bytes",
            replacement.index,
            replacement.data.len()
        );
        store.write_chunk(replacement.index, replacement.data);
    }

    let options = save_options(save);

    let saved = if save.quiet {
        store.save_as_with(output, &options, SilentProgress)
    } else {
        store.save_as_with(output, &options, ConsoleProgress::new())
    };

    saved.context(SaveSnafu { path: output })?;

    Ok(())
}

fn cmd_edit(file: &FileArgs, strict: bool, save: &SaveArgs) -> Result<()> {
    let store = open_store(file, strict)?;
    let mut session = Session::new(store).context(StartSessionSnafu)?;
    let options = save_options(save);

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    let mut unsaved = false;

    println!("{}", session.info());
    println!("type 'help' for a list of commands");

    loop {
        print!("> ");
        std::io::stdout().flush().context(WriteOutputSnafu)?;

        line.clear();

        if input.read_line(&mut line).context(ReadInputSnafu)? == 0 {
            break;
        }

        let command = match command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {}", snafu::Report::from_error(e));
                continue;
            }
        };

        let result = match command {
            EditCommand::Next => session.next(),
            EditCommand::Prev => session.prev(),
            EditCommand::Goto(index) => session.goto(index),
            EditCommand::Size(size) => session.set_chunk_size(size),
            EditCommand::Set { offset, value } => {
                if session.edit_byte(offset, value) {
                    unsaved = true;
                } else {
                    eprintln!(
                        "error: offset {} is past the end of the chunk ({} bytes)",
                        offset,
                        session.current_data().len()
                    );
                }
                continue;
            }
            EditCommand::Raw(data) => {
                session.replace_current(data);
                unsaved = true;
                continue;
            }
            EditCommand::Show => {
                let info = session.info();
                print!(
                    "{}\n{}",
                    info,
                    hexview::format_grid(session.current_data(), info.start)
                );
                continue;
            }
            EditCommand::Info => {
                let store = session.store();
                println!(
                    "{} bytes, {} chunks of {} bytes, {} edited",
                    store.file_size(),
                    store.total_chunks(),
                    store.chunk_size(),
                    store.overlay().len()
                );
                continue;
            }
            EditCommand::Save(path) => {
                let saved = if save.quiet {
                    session.save_as(&path, &options, SilentProgress)
                } else {
                    session.save_as(&path, &options, ConsoleProgress::new())
                };

                if saved.is_ok() {
                    unsaved = false;
                }

                saved.map(|_| ())
            }
            EditCommand::Help => {
                println!("{}", command::HELP);
                continue;
            }
            EditCommand::Quit => break,
        };

        match result {
            Ok(()) => println!("{}", session.info()),
            Err(e) => eprintln!("error: {}", snafu::Report::from_error(e)),
        }
    }

    if unsaved {
        warn!("leaving with unsaved edits");
    }

    Ok(())
}
