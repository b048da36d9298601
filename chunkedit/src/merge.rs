//! Interleaving of source bytes and overlay entries into a new output.
//!
//! The merge walks the source with a single read cursor while the output
//! cursor is implicit in the sequence of writes. How the read cursor moves
//! past an overlaid chunk is what distinguishes the two [`MergeMode`]s.

use crate::overlay::Overlay;
use crate::progress::SaveProgress;
use crate::source::Source;
use log::debug;
use snafu::{ResultExt, Snafu};
use std::cmp::min;
use std::io::Write;
use std::num::NonZeroUsize;

/// Errors that can occur while merging.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum MergeError {
    #[snafu(display("cannot read source at chunk #{index}"))]
    ReadSource { index: u64, source: std::io::Error },

    #[snafu(display("cannot write output"))]
    WriteOutput { source: std::io::Error },
}

/// How overlay entries are laid into the output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeMode {
    /// Each overlay entry is written verbatim and the source cursor skips
    /// exactly one nominal chunk, whatever the entry's length. Entries
    /// longer or shorter than the chunk size therefore grow or shrink the
    /// output. A trailing read of `file_size % chunk_size` bytes follows the
    /// chunk loop.
    #[default]
    Compat,

    /// Every chunk keeps its source length. A short entry is patched over
    /// the start of the original chunk and a long one is truncated, so the
    /// output is always exactly as long as the source.
    PreserveLayout,
}

/// A single save-time merge of a source with an overlay.
pub struct Merge<'a, S: Source + ?Sized, P: SaveProgress> {
    source: &'a S,
    file_size: u64,
    chunk_size: NonZeroUsize,
    overlay: &'a Overlay,
    progress: P,
}

impl<'a, S: Source + ?Sized, P: SaveProgress> Merge<'a, S, P> {
    pub fn new(
        source: &'a S,
        file_size: u64,
        chunk_size: NonZeroUsize,
        overlay: &'a Overlay,
        progress: P,
    ) -> Self {
        Self {
            source,
            file_size,
            chunk_size,
            overlay,
            progress,
        }
    }

    /// Number of chunk indices the merge visits.
    #[must_use]
    pub fn total_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size.get() as u64)
    }

    /// Writes the merged bytes to `out` and returns how many were written.
    ///
    /// `out` is flushed before returning.
    pub fn write_to<W: Write + ?Sized>(
        &self,
        out: &mut W,
        mode: MergeMode,
    ) -> Result<u64, MergeError> {
        let total = self.total_chunks();
        let ignored = self.overlay.range_from(total).count();

        if ignored > 0 {
            debug!("ignoring {ignored} overlay entries at or beyond chunk #{total}");
        }

        self.progress.save_start(total);

        let written = match mode {
            MergeMode::Compat => self.write_compat(out, total)?,
            MergeMode::PreserveLayout => self.write_preserving(out, total)?,
        };

        out.flush().context(WriteOutputSnafu)?;
        self.progress.save_completed(written);

        Ok(written)
    }

    /// No read ever returns more than the whole source, however large the
    /// chunk size is.
    fn scratch_buffer(&self) -> Vec<u8> {
        let len = min(self.chunk_size.get() as u64, self.file_size) as usize;
        vec![0u8; len]
    }

    fn write_compat<W: Write + ?Sized>(&self, out: &mut W, total: u64) -> Result<u64, MergeError> {
        let chunk_size = self.chunk_size.get();
        let mut buffer = self.scratch_buffer();
        let mut pos = 0u64;
        let mut written = 0u64;

        for index in 0..total {
            match self.overlay.get(index) {
                Some(data) => {
                    out.write_all(data).context(WriteOutputSnafu)?;

                    // Skip the nominal chunk, not the entry's length.
                    pos = min(pos.saturating_add(chunk_size as u64), self.file_size);
                    written += data.len() as u64;
                    self.progress.chunk_written(index, data.len(), true);
                }
                None => {
                    let read = self
                        .source
                        .read_full_at(pos, &mut buffer)
                        .context(ReadSourceSnafu { index })?;

                    out.write_all(&buffer[..read]).context(WriteOutputSnafu)?;

                    pos += read as u64;
                    written += read as u64;
                    self.progress.chunk_written(index, read, false);
                }
            }
        }

        // Remainder step, run whether or not the last chunk was overlaid.
        let trailing = (self.file_size % chunk_size as u64) as usize;

        if trailing > 0 {
            let read = self
                .source
                .read_full_at(pos, &mut buffer[..trailing])
                .context(ReadSourceSnafu { index: total })?;

            out.write_all(&buffer[..read]).context(WriteOutputSnafu)?;
            written += read as u64;
        }

        Ok(written)
    }

    fn write_preserving<W: Write + ?Sized>(
        &self,
        out: &mut W,
        total: u64,
    ) -> Result<u64, MergeError> {
        let chunk_size = self.chunk_size.get();
        let mut buffer = self.scratch_buffer();
        let mut written = 0u64;

        for index in 0..total {
            let offset = index * chunk_size as u64;
            let len = min(chunk_size as u64, self.file_size - offset) as usize;
            let read = self
                .source
                .read_full_at(offset, &mut buffer[..len])
                .context(ReadSourceSnafu { index })?;

            let edited = match self.overlay.get(index) {
                Some(data) => {
                    let n = min(data.len(), read);
                    buffer[..n].copy_from_slice(&data[..n]);
                    true
                }
                None => false,
            };

            out.write_all(&buffer[..read]).context(WriteOutputSnafu)?;
            written += read as u64;
            self.progress.chunk_written(index, read, edited);
        }

        Ok(written)
    }
}
