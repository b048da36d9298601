/// Trait for receiving progress updates while a store is saved.
///
/// All methods have empty defaults, so implementors only override the
/// events they care about.
pub trait SaveProgress {
    /// Called once before the first chunk is written.
    fn save_start(&self, _total_chunks: u64) {}

    /// Called after each chunk has been written to the output.
    ///
    /// `from_overlay` is `true` when the bytes came from an edited chunk
    /// rather than the source file.
    fn chunk_written(&self, _index: u64, _len: usize, _from_overlay: bool) {}

    /// Called once the output has been fully written and flushed.
    fn save_completed(&self, _bytes_written: u64) {}
}

/// A no-op progress implementation that discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl SaveProgress for SilentProgress {}

impl<P: SaveProgress + ?Sized> SaveProgress for &P {
    fn save_start(&self, total_chunks: u64) {
        (**self).save_start(total_chunks)
    }

    fn chunk_written(&self, index: u64, len: usize, from_overlay: bool) {
        (**self).chunk_written(index, len, from_overlay)
    }

    fn save_completed(&self, bytes_written: u64) {
        (**self).save_completed(bytes_written)
    }
}
