use crate::error::SplitError;

/// Progress notifications emitted while a batch is processed.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// Emitted once before the first file.
    BatchStarted { total_files: usize },
    /// A file is about to be decoded. `position` is 1-based.
    FileStarted {
        position: usize,
        total_files: usize,
        name: &'a str,
    },
    /// One chunk of the current file is ready to be written.
    ///
    /// Chunks are encoded in parallel, so these events are sent together
    /// once the whole file has been encoded, in ascending index order and
    /// before [`ProgressEvent::FileFinished`]. A file that fails to encode
    /// sends none.
    ChunkEncoded {
        name: &'a str,
        index: usize,
        total_chunks: usize,
    },
    /// A file finished successfully.
    FileFinished {
        completed: usize,
        total_files: usize,
        name: &'a str,
        chunks: usize,
    },
    /// A file failed and was skipped.
    FileFailed {
        completed: usize,
        total_files: usize,
        name: &'a str,
        error: &'a SplitError,
    },
    /// Emitted once after the last processed file.
    BatchFinished {
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },
}

/// Receives [`ProgressEvent`]s and may stop a batch between files.
///
/// Closures taking a [`ProgressEvent`] implement this trait and never cancel.
pub trait ProgressReporter {
    fn report(&mut self, _event: ProgressEvent<'_>) {}

    /// Checked before each file starts. Returning `false` stops the batch;
    /// files completed so far are kept.
    fn should_continue(&mut self) -> bool {
        true
    }
}

impl<F> ProgressReporter for F
where
    F: FnMut(ProgressEvent<'_>),
{
    fn report(&mut self, event: ProgressEvent<'_>) {
        self(event)
    }
}

/// Reporter that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}
