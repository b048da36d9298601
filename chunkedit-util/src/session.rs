use crate::hexview::ChunkInfo;
use chunkedit::{
    ChunkStore, OpenError, ReadChunkError, SaveError, SaveOptions, SaveProgress,
    SetChunkSizeError, StoreOptions,
};
use log::debug;
use snafu::{ResultExt, Snafu, ensure};
use std::path::Path;

/// Errors from [`Session`] operations.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SessionError {
    #[snafu(display("cannot open store"))]
    Open { source: OpenError },

    #[snafu(display("cannot load chunk"))]
    LoadChunk { source: ReadChunkError },

    #[snafu(display("cannot change chunk size"))]
    ChunkSize { source: SetChunkSizeError },

    #[snafu(display("chunk #{index} is out of range (file has {total} chunks)"))]
    OutOfRange { index: u64, total: u64 },

    #[snafu(display("cannot save"))]
    Save { source: SaveError },
}

/// An interactive editing session over one [`ChunkStore`].
///
/// The session keeps a working copy of the chunk being viewed. Edits go to
/// the working copy and are committed to the store's overlay when the
/// session moves to another chunk, changes the chunk size, or saves.
#[derive(Debug)]
pub struct Session {
    store: ChunkStore,
    index: u64,
    data: Vec<u8>,
    modified: bool,
}

impl Session {
    /// Opens `path` and loads its first chunk.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, SessionError> {
        let store = ChunkStore::open_with(path, options).context(OpenSnafu)?;
        Self::new(store)
    }

    /// Wraps an already opened store and loads its first chunk.
    pub fn new(store: ChunkStore) -> Result<Self, SessionError> {
        let mut session = Self {
            store,
            index: 0,
            data: Vec::new(),
            modified: false,
        };

        session.load(0)?;

        Ok(session)
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    #[must_use]
    pub fn current_index(&self) -> u64 {
        self.index
    }

    /// Returns the working copy of the current chunk.
    #[must_use]
    pub fn current_data(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if the working copy has uncommitted edits.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[must_use]
    pub fn info(&self) -> ChunkInfo {
        ChunkInfo {
            index: self.index,
            start: self.store.chunk_range(self.index).start,
            len: self.data.len(),
        }
    }

    /// Sets byte `offset` of the working copy.
    ///
    /// Returns `false` and changes nothing if `offset` is past the end of
    /// the current chunk.
    pub fn edit_byte(&mut self, offset: usize, value: u8) -> bool {
        match self.data.get_mut(offset) {
            Some(byte) => {
                *byte = value;
                self.modified = true;
                true
            }
            None => false,
        }
    }

    /// Replaces the whole working copy. The new contents may have any length.
    pub fn replace_current(&mut self, data: Vec<u8>) {
        self.data = data;
        self.modified = true;
    }

    /// Moves to the next chunk. Does nothing at the last chunk.
    pub fn next(&mut self) -> Result<(), SessionError> {
        if self.index + 1 >= self.store.total_chunks() {
            return Ok(());
        }

        self.commit();
        self.load(self.index + 1)
    }

    /// Moves to the previous chunk. Does nothing at the first chunk.
    pub fn prev(&mut self) -> Result<(), SessionError> {
        if self.index == 0 {
            return Ok(());
        }

        self.commit();
        self.load(self.index - 1)
    }

    /// Moves to chunk `index`.
    pub fn goto(&mut self, index: u64) -> Result<(), SessionError> {
        let total = self.store.total_chunks();

        ensure!(
            index < total || (index == 0 && total == 0),
            OutOfRangeSnafu { index, total }
        );

        self.commit();
        self.load(index)
    }

    /// Changes the chunk size and reloads the current chunk, clamping the
    /// current index to the new number of chunks.
    pub fn set_chunk_size(&mut self, size: usize) -> Result<(), SessionError> {
        // Commit first so a strict store sees the pending edit and refuses.
        self.commit();
        self.store.set_chunk_size(size).context(ChunkSizeSnafu)?;

        let total = self.store.total_chunks();
        let index = self.index.min(total.saturating_sub(1));

        self.load(index)
    }

    /// Commits the working copy and saves the store to `path`.
    pub fn save_as<P: SaveProgress>(
        &mut self,
        path: impl AsRef<Path>,
        options: &SaveOptions,
        progress: P,
    ) -> Result<u64, SessionError> {
        self.commit();
        self.store
            .save_as_with(path, options, progress)
            .context(SaveSnafu)
    }

    /// Writes the working copy to the store's overlay if it was edited.
    pub fn commit(&mut self) {
        if self.modified {
            debug!("committing chunk #{} ({} bytes)", self.index, self.data.len());
            self.store.write_chunk(self.index, self.data.clone());
            self.modified = false;
        }
    }

    /// Loads chunk `index` as the working copy, preferring a pending edit
    /// over the source bytes.
    fn load(&mut self, index: u64) -> Result<(), SessionError> {
        self.data = match self.store.overlay().get(index) {
            Some(data) => data.to_vec(),
            None => self.store.read_chunk(index).context(LoadChunkSnafu)?,
        };
        self.index = index;
        self.modified = false;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkedit::SilentProgress;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn session(data: &[u8], chunk_size: usize) -> (NamedTempFile, Session) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();

        let session = Session::open(file.path(), StoreOptions::with_chunk_size(chunk_size)).unwrap();
        (file, session)
    }

    #[test]
    fn opens_on_first_chunk() {
        let (_file, session) = session(b"0123456789", 4);

        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_data(), b"0123");
        assert!(!session.is_modified());
    }

    #[test]
    fn navigation_commits_edits() {
        let (_file, mut session) = session(b"0123456789", 4);

        assert!(session.edit_byte(1, b'X'));
        session.next().unwrap();

        assert_eq!(session.current_index(), 1);
        assert_eq!(session.current_data(), b"4567");
        assert_eq!(session.store().overlay().get(0), Some(&b"0X23"[..]));

        // Coming back shows the edit, not the pristine bytes.
        session.prev().unwrap();
        assert_eq!(session.current_data(), b"0X23");
    }

    #[test]
    fn unedited_chunks_are_not_committed() {
        let (_file, mut session) = session(b"0123456789", 4);

        session.next().unwrap();
        session.next().unwrap();

        assert!(session.store().overlay().is_empty());
    }

    #[test]
    fn edit_past_end_is_ignored() {
        let (_file, mut session) = session(b"0123456789", 4);
        session.goto(2).unwrap();

        assert!(!session.edit_byte(2, 0));
        assert!(!session.is_modified());
    }

    #[test]
    fn navigation_stops_at_both_ends() {
        let (_file, mut session) = session(b"0123456789", 4);

        session.prev().unwrap();
        assert_eq!(session.current_index(), 0);

        session.goto(2).unwrap();
        session.next().unwrap();
        assert_eq!(session.current_index(), 2);
        assert_eq!(session.current_data(), b"89");
    }

    #[test]
    fn goto_out_of_range_fails() {
        let (_file, mut session) = session(b"0123456789", 4);
        let err = session.goto(3).unwrap_err();

        assert!(matches!(err, SessionError::OutOfRange { index: 3, total: 3 }));
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn chunk_size_change_clamps_index() {
        let (_file, mut session) = session(b"0123456789", 2);
        session.goto(4).unwrap();

        session.set_chunk_size(5).unwrap();

        assert_eq!(session.current_index(), 1);
        assert_eq!(session.current_data(), b"56789");
    }

    #[test]
    fn empty_file_session() {
        let (_file, mut session) = session(b"", 4);

        assert!(session.current_data().is_empty());
        session.next().unwrap();
        session.goto(0).unwrap();
        session.set_chunk_size(8).unwrap();
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn raw_replacement_is_saved() {
        let (_file, mut session) = session(b"0123456789", 4);
        session.goto(1).unwrap();
        session.replace_current(b"AB".to_vec());

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.bin");
        let written = session
            .save_as(&out, &SaveOptions::default(), SilentProgress)
            .unwrap();

        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&out).unwrap(), b"0123AB89");
        assert!(!session.is_modified());
    }

    #[test]
    fn strict_store_refuses_resize_after_edit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        let options = StoreOptions {
            chunk_size: 4,
            strict_chunk_size: true,
        };
        let mut session = Session::open(file.path(), options).unwrap();

        session.edit_byte(0, 0xFF);
        let err = session.set_chunk_size(2).unwrap_err();

        assert!(matches!(err, SessionError::ChunkSize { .. }));
        assert_eq!(session.store().chunk_size(), 4);
    }
}
