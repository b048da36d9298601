pub use chunkedit::{SaveProgress, SilentProgress};

/// Console progress reporter using an indicatif progress bar.
///
/// The bar is drawn on stderr and only becomes visible once a save starts.
#[cfg(feature = "cli")]
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl SaveProgress for ConsoleProgress {
    fn save_start(&self, total_chunks: u64) {
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total_chunks);
        self.bar.set_position(0);

        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} chunks [{elapsed_precise}]")
        {
            self.bar.set_style(style.progress_chars("━╸─"));
        }

        self.bar.reset();
    }

    fn chunk_written(&self, _index: u64, _len: usize, _from_overlay: bool) {
        self.bar.inc(1);
    }

    fn save_completed(&self, bytes_written: u64) {
        self.bar.finish_and_clear();
        println!("Saved {} bytes.", bytes_written);
    }
}
