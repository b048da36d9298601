use crate::merge::{Merge, MergeError, MergeMode};
use crate::overlay::Overlay;
use crate::progress::SaveProgress;
use log::debug;
use snafu::{ResultExt, Snafu, ensure};
use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Errors that can occur while saving a store to a new file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SaveError {
    #[snafu(display("cannot open source {}", path.display()))]
    OpenSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create output {}", path.display()))]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("refusing to overwrite the source {}", path.display()))]
    OutputIsSource { path: PathBuf },

    #[snafu(display("cannot read source at chunk #{index}"))]
    ReadSource { index: u64, source: std::io::Error },

    #[snafu(display("cannot write to {}", path.display()))]
    WriteOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot move finished output to {}", path.display()))]
    PersistOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SaveError {
    /// Returns `true` if the save failed before any byte was merged, because
    /// either the source or the output could not be opened.
    #[must_use]
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Self::OpenSource { .. } | Self::CreateOutput { .. } | Self::OutputIsSource { .. }
        )
    }
}

/// Options for [`ChunkStore::save_as_with()`](crate::ChunkStore::save_as_with).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// How overlay entries are laid into the output.
    pub mode: MergeMode,

    /// Write to a temporary file next to the output and rename it into place
    /// once the merge succeeded. A failed save then leaves any existing file
    /// at the output path untouched.
    pub atomic: bool,
}

pub(crate) struct SaveJob<'a> {
    pub source_path: &'a Path,
    pub file_size: u64,
    pub chunk_size: NonZeroUsize,
    pub overlay: &'a Overlay,
}

impl SaveJob<'_> {
    pub fn run<P: SaveProgress>(
        &self,
        output: &Path,
        options: &SaveOptions,
        progress: P,
    ) -> Result<u64, SaveError> {
        // A fresh handle keeps the merge cursor independent of the store.
        let source = File::open(self.source_path).context(OpenSourceSnafu {
            path: self.source_path,
        })?;

        // Truncating the output would destroy the bytes the merge reads.
        ensure!(
            !same_file(self.source_path, output),
            OutputIsSourceSnafu { path: output }
        );

        let merge = Merge::new(
            &source,
            self.file_size,
            self.chunk_size,
            self.overlay,
            progress,
        );

        debug!(
            "saving {} to {} ({} chunks of {} bytes, {} edited, {:?})",
            self.source_path.display(),
            output.display(),
            merge.total_chunks(),
            self.chunk_size,
            self.overlay.len(),
            options.mode,
        );

        if options.atomic {
            let dir = match output.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };

            let temp = tempfile::NamedTempFile::new_in(dir)
                .context(CreateOutputSnafu { path: output })?;

            let written = {
                let mut writer = BufWriter::new(temp.as_file());
                merge
                    .write_to(&mut writer, options.mode)
                    .map_err(|e| map_merge_error(e, output))?
            };

            temp.persist(output)
                .map_err(|e| e.error)
                .context(PersistOutputSnafu { path: output })?;

            Ok(written)
        } else {
            let file = File::create(output).context(CreateOutputSnafu { path: output })?;
            let mut writer = BufWriter::new(file);

            merge
                .write_to(&mut writer, options.mode)
                .map_err(|e| map_merge_error(e, output))
        }
    }
}

/// Both paths resolve to the same file. A missing output never matches.
fn same_file(source: &Path, output: &Path) -> bool {
    match (std::fs::canonicalize(source), std::fs::canonicalize(output)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn map_merge_error(e: MergeError, output: &Path) -> SaveError {
    match e {
        MergeError::ReadSource { index, source } => SaveError::ReadSource { index, source },
        MergeError::WriteOutput { source } => SaveError::WriteOutput {
            path: output.to_path_buf(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChunkStore;
    use crate::StoreOptions;
    use crate::progress::SilentProgress;
    use std::fs;
    use tempfile::TempDir;

    const TEN: &[u8] = b"0123456789";

    fn store_in(dir: &TempDir) -> (PathBuf, ChunkStore) {
        let path = dir.path().join("source.bin");
        fs::write(&path, TEN).unwrap();
        let store = ChunkStore::open_with(&path, StoreOptions::with_chunk_size(4)).unwrap();
        (path, store)
    }

    fn atomic() -> SaveOptions {
        SaveOptions {
            atomic: true,
            ..SaveOptions::default()
        }
    }

    #[test]
    fn saving_onto_source_is_refused() {
        let dir = TempDir::new().unwrap();
        let (path, mut store) = store_in(&dir);
        store.write_chunk(1, b"ABCD".to_vec());

        for options in [SaveOptions::default(), atomic()] {
            let err = store
                .save_as_with(&path, &options, SilentProgress)
                .unwrap_err();

            assert!(matches!(err, SaveError::OutputIsSource { .. }));
            assert!(err.is_open_failure());
            assert_eq!(fs::read(&path).unwrap(), TEN);
        }
    }

    #[test]
    fn saving_onto_source_through_other_path_is_refused() {
        let dir = TempDir::new().unwrap();
        let (_path, store) = store_in(&dir);
        let other = dir.path().join(".").join("source.bin");

        let err = store.save_as(&other).unwrap_err();

        assert!(matches!(err, SaveError::OutputIsSource { .. }));
        assert_eq!(fs::read(&other).unwrap(), TEN);
    }

    #[test]
    fn oversized_chunk_saves_whole_source() {
        let dir = TempDir::new().unwrap();
        let (_path, mut store) = store_in(&dir);
        store.set_chunk_size(usize::MAX).unwrap();

        let out = dir.path().join("out.bin");
        assert_eq!(store.save_as(&out).unwrap(), TEN.len() as u64);
        assert_eq!(fs::read(&out).unwrap(), TEN);

        store.write_chunk(0, b"AB".to_vec());
        assert_eq!(store.save_as(&out).unwrap(), 2);
        assert_eq!(fs::read(&out).unwrap(), b"AB");
    }

    #[cfg(unix)]
    #[test]
    fn failed_atomic_merge_keeps_target_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let (path, store) = store_in(&dir);

        let out_dir = TempDir::new().unwrap();
        let out = out_dir.path().join("out.bin");
        fs::write(&out, b"keep").unwrap();

        // A directory opens fine for reading but every read fails.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store
            .save_as_with(&out, &atomic(), SilentProgress)
            .unwrap_err();

        assert!(matches!(err, SaveError::ReadSource { index: 0, .. }));
        assert!(!err.is_open_failure());
        assert_eq!(fs::read(&out).unwrap(), b"keep");
        assert_eq!(fs::read_dir(out_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn merge_failures_are_not_open_failures() {
        let write = SaveError::WriteOutput {
            path: PathBuf::from("out.bin"),
            source: std::io::Error::other("disk full"),
        };
        let persist = SaveError::PersistOutput {
            path: PathBuf::from("out.bin"),
            source: std::io::Error::other("cross-device"),
        };

        assert!(!write.is_open_failure());
        assert!(!persist.is_open_failure());
    }
}
