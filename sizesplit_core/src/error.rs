use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Errors that can occur while splitting audio files.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The requested target size was zero bytes.
    #[error("target size must be greater than zero bytes")]
    InvalidTargetSize,

    /// One of the PCM parameters used for bitrate estimation was zero.
    #[error(
        "invalid PCM parameters: sample rate {sample_rate} Hz, {channel_count} channel(s), \
         {sample_width} byte(s) per sample"
    )]
    InvalidPcmParameters {
        sample_rate: u32,
        channel_count: u16,
        sample_width: u16,
    },

    /// The target size is too small to hold a single millisecond of audio.
    #[error("target size of {target_bytes} bytes is too small for a {bitrate_kbps} kbps stream")]
    InvalidChunkDuration {
        target_bytes: u64,
        bitrate_kbps: f64,
    },

    /// The file extension does not map to a supported container/codec.
    #[error("unsupported audio format '{0}'")]
    UnsupportedFormat(String),

    /// Wrapper around errors produced by the Symphonia decoding library.
    #[error("failed to decode audio: {0}")]
    Decode(#[from] SymphoniaError),

    /// Error returned when the container does not expose any default track.
    #[error("input stream does not provide a default track")]
    MissingDefaultTrack,

    /// Error returned when the decoder track lacks a sample rate.
    #[error("input stream does not advertise a sample rate")]
    MissingSampleRate,

    /// Error returned when the decoder track lacks a channel layout.
    #[error("input stream does not advertise a channel layout")]
    MissingChannels,

    /// A chunk could not be encoded back to the source format.
    #[error("failed to encode chunk {index} as {format}: {reason}")]
    Encode {
        index: usize,
        format: &'static str,
        reason: String,
    },

    /// Wrapper around IO errors encountered while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error produced when a file name cannot be derived from the input path.
    #[error("failed to derive a base name from '{0}'")]
    InvalidInputName(String),

    /// The output directory vanished between configuration and execution.
    #[error("output directory '{}' does not exist", .0.display())]
    MissingOutputDirectory(PathBuf),

    /// A generated file would replace an existing one without `overwrite`.
    #[error("refusing to overwrite existing file '{}'", .0.display())]
    OutputExists(PathBuf),

    /// Two inputs would produce a file with the same name.
    #[error("more than one input would write '{}'", .0.display())]
    DuplicateOutput(PathBuf),

    /// An archive entry name is empty, nested or used twice.
    #[error("invalid or duplicate archive entry '{0}'")]
    InvalidArchiveEntry(String),

    /// Failure reported by the zip writer.
    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The dedicated encoding thread pool could not be created.
    #[error("failed to start encoding threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A file in the batch failed; wraps the underlying error.
    #[error("failed to process '{name}': {source}")]
    File {
        name: String,
        #[source]
        source: Box<SplitError>,
    },
}

/// Coarse classification of [`SplitError`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    DecodeFailure,
    EncodeFailure,
    IoFailure,
}

impl SplitError {
    /// Classify the error. Errors wrapped in [`SplitError::File`] report the
    /// kind of their source.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitError::InvalidTargetSize
            | SplitError::InvalidPcmParameters { .. }
            | SplitError::InvalidChunkDuration { .. }
            | SplitError::InvalidInputName(_)
            | SplitError::DuplicateOutput(_)
            | SplitError::InvalidArchiveEntry(_) => ErrorKind::InvalidInput,
            SplitError::UnsupportedFormat(_)
            | SplitError::Decode(_)
            | SplitError::MissingDefaultTrack
            | SplitError::MissingSampleRate
            | SplitError::MissingChannels => ErrorKind::DecodeFailure,
            SplitError::Encode { .. } => ErrorKind::EncodeFailure,
            SplitError::Io(_)
            | SplitError::MissingOutputDirectory(_)
            | SplitError::OutputExists(_)
            | SplitError::Archive(_)
            | SplitError::ThreadPool(_) => ErrorKind::IoFailure,
            SplitError::File { source, .. } => source.kind(),
        }
    }

    pub(crate) fn in_file(self, name: &str) -> Self {
        SplitError::File {
            name: name.to_owned(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_errors_report_the_kind_of_their_source() {
        let err = SplitError::InvalidTargetSize.in_file("a.wav");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("a.wav"));

        let err = SplitError::UnsupportedFormat("aiff".into()).in_file("b.aiff");
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn io_errors_are_io_failures() {
        let err = SplitError::from(std::io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }
}
