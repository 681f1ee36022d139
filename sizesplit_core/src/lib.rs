//! Split audio files into chunks that approximate a target byte size.
//!
//! The maximum duration of a chunk is derived from the uncompressed PCM
//! bitrate of the decoded audio. Every chunk is re-encoded in the container
//! and codec of the original file, named
//! `<base>_size_adjusted_part<N>.<ext>`, and can be bundled into a flat zip.

mod archive;
mod batch;
mod bitrate;
mod decode;
mod encode;
mod error;
mod format;
mod plan;
mod progress;
mod runner;
mod split;

pub use archive::{package_archive, DEFAULT_ARCHIVE_NAME};
pub use batch::{
    process_batch, process_file, BatchOptions, BatchReport, FailurePolicy, FileFailure,
    FileOutput, InputFile, NamedOutput,
};
pub use bitrate::{estimate_bitrate, Bitrate};
pub use decode::{DecodedAudio, PcmSlice, SampleEncoding};
pub use encode::{
    encoder_for, ChunkEncoder, EncoderSettings, FlacEncoder, Mp3Encoder, VorbisEncoder,
    WavEncoder, DEFAULT_LOSSY_BITRATE_KBPS,
};
pub use error::{ErrorKind, Result, SplitError};
pub use format::AudioFormat;
pub use plan::{ChunkPlan, ChunkWindow, TargetSize, Windows, DEFAULT_TARGET_MEGABYTES};
pub use progress::{NoProgress, ProgressEvent, ProgressReporter};
pub use runner::{plan_outputs, run, run_with_progress, Config, ConfigBuilder, RunSummary};
pub use split::{
    chunk_plan, output_file_name, plan_chunks, split_file_name, split_to_size, OutputChunk,
    OUTPUT_INFIX,
};
