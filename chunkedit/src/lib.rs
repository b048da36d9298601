//! Chunk-addressed, copy-on-write editing of binary files.
//!
//! A [`ChunkStore`] partitions a file into fixed-size logical chunks. Any
//! chunk can be read from the untouched source or replaced in memory, and the
//! replacements are only materialized when the store is saved to a new file.
//! The source file itself is never written.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use chunkedit::{ChunkStore, StoreOptions};
//!
//! let mut store = ChunkStore::open_with("firmware.bin", StoreOptions::with_chunk_size(16))?;
//! println!("{} chunks", store.total_chunks());
//!
//! let mut chunk = store.read_chunk(2)?;
//! chunk[0] = 0xFF;
//! store.write_chunk(2, chunk);
//!
//! store.save_as("firmware-patched.bin")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Chunk size changes
//!
//! Edits are keyed by chunk index. Changing the chunk size after editing does
//! not move them, so an edit made as chunk 3 of 16 bytes lands on chunk 3 of
//! whatever the size is at save time. Use
//! [`StoreOptions::strict_chunk_size`] to refuse such changes instead.

use log::{debug, warn};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::cmp::min;
use std::fs::File;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub mod merge;
pub mod overlay;
pub mod progress;
pub mod save;
pub mod source;

pub use self::merge::{Merge, MergeError, MergeMode};
pub use self::overlay::Overlay;
pub use self::progress::{SaveProgress, SilentProgress};
pub use self::save::{SaveError, SaveOptions};
pub use self::source::{SliceSource, Source};

/// Chunk size used when none is given.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Errors for [`ChunkStore::open()`] and [`ChunkStore::open_with()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum OpenError {
    #[snafu(display("cannot open {}", path.display()))]
    OpenSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot read metadata of {}", path.display()))]
    ReadMetadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("chunk size must be greater than zero"))]
    InvalidChunkSize,
}

/// Errors for [`ChunkStore::read_chunk()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadChunkError {
    #[snafu(display("cannot read chunk #{index}"))]
    ReadSource { index: u64, source: std::io::Error },
}

/// Errors for [`ChunkStore::set_chunk_size()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SetChunkSizeError {
    #[snafu(display("chunk size must be greater than zero"))]
    ZeroChunkSize,

    #[snafu(display("cannot change chunk size with {entries} unsaved chunk edits"))]
    OverlayNotEmpty { entries: usize },
}

/// Options for [`ChunkStore::open_with()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Initial chunk size in bytes. Must not be zero.
    pub chunk_size: usize,

    /// Refuse [`ChunkStore::set_chunk_size()`] while edits are pending.
    pub strict_chunk_size: bool,
}

impl StoreOptions {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            strict_chunk_size: false,
        }
    }
}

/// A chunked, copy-on-write view over a binary file.
///
/// The store owns a read-only handle to the source for its whole lifetime.
/// Reads always return pristine source bytes; edits are kept in an
/// [`Overlay`] until [`save_as()`](Self::save_as) writes a merged copy.
///
/// The store is not synchronized. Callers sharing it must serialize access.
#[must_use]
pub struct ChunkStore {
    source: File,
    path: PathBuf,
    file_size: u64,
    chunk_size: NonZeroUsize,
    strict_chunk_size: bool,
    overlay: Overlay,
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .field("chunk_size", &self.chunk_size)
            .field("edited", &self.overlay.len())
            .finish_non_exhaustive()
    }
}

impl ChunkStore {
    /// Opens `path` with [`DEFAULT_CHUNK_SIZE`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Opens `path` for chunked editing.
    ///
    /// The file size is captured once here. If the file changes size while
    /// the store is alive, reads and saves are unspecified.
    ///
    /// # Errors
    ///
    /// Returns an [`OpenError`] if the file cannot be opened or its size
    /// cannot be determined, or if `options.chunk_size` is zero.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let chunk_size = NonZeroUsize::new(options.chunk_size).context(InvalidChunkSizeSnafu)?;
        let source = File::open(path).context(OpenSourceSnafu { path })?;
        let file_size = source
            .metadata()
            .context(ReadMetadataSnafu { path })?
            .len();

        debug!(
            "opened {} ({} bytes, chunk size {})",
            path.display(),
            file_size,
            chunk_size
        );

        Ok(Self {
            source,
            path: path.to_path_buf(),
            file_size,
            chunk_size,
            strict_chunk_size: options.strict_chunk_size,
            overlay: Overlay::new(),
        })
    }

    /// Reads the pristine source bytes of chunk `index`.
    ///
    /// The overlay is never consulted: an edited chunk still reads back as
    /// it is on disk. The last chunk may be shorter than the chunk size, and
    /// a chunk starting at or beyond the end of the file reads as empty.
    pub fn read_chunk(&self, index: u64) -> Result<Vec<u8>, ReadChunkError> {
        let range = self.chunk_range(index);

        if range.is_empty() {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; (range.end - range.start) as usize];
        let read = self
            .source
            .read_full_at(range.start, &mut buffer)
            .context(ReadSourceSnafu { index })?;

        buffer.truncate(read);

        Ok(buffer)
    }

    /// Replaces chunk `index` with `data` in the overlay.
    ///
    /// `data` may be of any length; see [`MergeMode`] for how a length
    /// other than the chunk size is saved. Nothing is written to disk.
    pub fn write_chunk(&mut self, index: u64, data: impl Into<Vec<u8>>) {
        self.overlay.insert(index, data.into());
    }

    /// Drops the pending edit for chunk `index`, returning it.
    pub fn discard_chunk(&mut self, index: u64) -> Option<Vec<u8>> {
        self.overlay.remove(index)
    }

    /// Changes the chunk size used by subsequent reads, writes and saves.
    ///
    /// Pending edits keep their indices and are not re-keyed.
    ///
    /// # Errors
    ///
    /// Fails with [`SetChunkSizeError::ZeroChunkSize`] for a zero size, and
    /// with [`SetChunkSizeError::OverlayNotEmpty`] when the store was opened
    /// with [`StoreOptions::strict_chunk_size`] and edits are pending. The
    /// chunk size is unchanged on error.
    pub fn set_chunk_size(&mut self, size: usize) -> Result<(), SetChunkSizeError> {
        let size = NonZeroUsize::new(size).context(ZeroChunkSizeSnafu)?;

        if size == self.chunk_size {
            return Ok(());
        }

        let entries = self.overlay.len();

        if entries > 0 {
            ensure!(
                !self.strict_chunk_size,
                OverlayNotEmptySnafu { entries }
            );

            warn!(
                "chunk size changed from {} to {} with {} pending edits; their indices now address different bytes",
                self.chunk_size, size, entries
            );
        }

        self.chunk_size = size;

        Ok(())
    }

    /// Writes the source merged with all pending edits to `path`.
    ///
    /// Equivalent to [`save_as_with()`](Self::save_as_with) using default
    /// options and no progress reporting.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<u64, SaveError> {
        self.save_as_with(path, &SaveOptions::default(), SilentProgress)
    }

    /// Writes the source merged with all pending edits to `path`, returning
    /// the number of bytes written.
    ///
    /// The source is reopened for the merge and both handles are closed
    /// before returning. Pending edits are kept, so saving again reapplies
    /// them.
    ///
    /// # Errors
    ///
    /// Returns a [`SaveError`]; [`SaveError::is_open_failure()`] tells an
    /// open failure apart from an I/O failure partway through. Unless
    /// [`SaveOptions::atomic`] is set, a failed save may leave a partial
    /// output file behind.
    pub fn save_as_with<P: SaveProgress>(
        &self,
        path: impl AsRef<Path>,
        options: &SaveOptions,
        progress: P,
    ) -> Result<u64, SaveError> {
        let job = save::SaveJob {
            source_path: &self.path,
            file_size: self.file_size,
            chunk_size: self.chunk_size,
            overlay: &self.overlay,
        };

        job.run(path.as_ref(), options, progress)
    }

    /// Returns `ceil(file_size / chunk_size)`.
    #[must_use]
    pub fn total_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size.get() as u64)
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    /// Returns the size of the source file as captured at open time.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Returns the byte range chunk `index` covers in the source.
    ///
    /// The range is empty when the chunk starts at or beyond the end of the
    /// file.
    #[must_use]
    pub fn chunk_range(&self, index: u64) -> Range<u64> {
        let chunk_size = self.chunk_size.get() as u64;

        match index.checked_mul(chunk_size) {
            Some(start) if start < self.file_size => {
                start..min(start.saturating_add(chunk_size), self.file_size)
            }
            _ => self.file_size..self.file_size,
        }
    }

    /// Returns the pending edits.
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Returns `true` if any chunk has been edited.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Returns the path the store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
