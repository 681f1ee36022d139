use std::num::NonZeroUsize;

use log::{info, warn};

use crate::decode::DecodedAudio;
use crate::encode::EncoderSettings;
use crate::error::{Result, SplitError};
use crate::format::AudioFormat;
use crate::plan::TargetSize;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::split::{output_file_name, split_file_name, split_to_size};

/// An audio file held in memory together with its original name.
#[derive(Clone, Debug)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// A generated file: flat name plus encoded contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedOutput {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// All chunks produced from one input file, in index order.
#[derive(Clone, Debug)]
pub struct FileOutput {
    pub source_name: String,
    pub chunks: Vec<NamedOutput>,
}

/// A file skipped under [`FailurePolicy::SkipFailed`].
#[derive(Debug)]
pub struct FileFailure {
    pub source_name: String,
    pub error: SplitError,
}

/// What happens to the rest of a batch when one file fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing file and return its error.
    #[default]
    AbortBatch,
    /// Record the failure and continue with the next file.
    SkipFailed,
}

/// Settings shared by every file of a batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchOptions {
    pub target: TargetSize,
    pub encoder: EncoderSettings,
    pub failure_policy: FailurePolicy,
    /// Size of the chunk encoding pool; `None` uses the global rayon pool.
    pub threads: Option<NonZeroUsize>,
}

/// Result of [`process_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileOutput>,
    pub failures: Vec<FileFailure>,
    /// Set when the reporter stopped the batch before every file was seen.
    pub cancelled: bool,
}

impl BatchReport {
    /// Every produced chunk across all files, in input then index order.
    pub fn outputs(&self) -> impl Iterator<Item = &NamedOutput> {
        self.files.iter().flat_map(|file| file.chunks.iter())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Decode, split and re-encode a single file.
pub fn process_file(input: &InputFile, options: &BatchOptions) -> Result<FileOutput> {
    let format = AudioFormat::from_file_name(&input.name)?;
    let (base, extension) = split_file_name(&input.name)?;

    let audio = DecodedAudio::decode(&input.bytes, format)?;
    info!(
        "'{}': {} ms, {} Hz, {} channel(s), {}-bit",
        input.name,
        audio.duration_ms(),
        audio.sample_rate(),
        audio.channel_count(),
        audio.bits_per_sample()
    );

    let chunks = split_to_size(&audio, format, options.target, options.encoder)?;
    let chunks = chunks
        .into_iter()
        .map(|chunk| NamedOutput {
            name: output_file_name(base, extension, chunk.index),
            bytes: chunk.bytes,
        })
        .collect();

    Ok(FileOutput {
        source_name: input.name.clone(),
        chunks,
    })
}

/// Process `inputs` one after another.
///
/// Each file is decoded and encoded in full before any of its
/// [`ProgressEvent::ChunkEncoded`] events are reported.
///
/// Under [`FailurePolicy::AbortBatch`] the first failure is returned wrapped
/// in [`SplitError::File`] and nothing is kept. Under
/// [`FailurePolicy::SkipFailed`] failures are collected in the report.
pub fn process_batch(
    inputs: &[InputFile],
    options: &BatchOptions,
    reporter: &mut dyn ProgressReporter,
) -> Result<BatchReport> {
    let pool = match options.threads {
        Some(threads) => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads.get())
                .build()?,
        ),
        None => None,
    };

    let total_files = inputs.len();
    let mut report = BatchReport::default();
    reporter.report(ProgressEvent::BatchStarted { total_files });

    for (position, input) in inputs.iter().enumerate() {
        if !reporter.should_continue() {
            info!("batch stopped before '{}'", input.name);
            report.cancelled = true;
            break;
        }

        reporter.report(ProgressEvent::FileStarted {
            position: position + 1,
            total_files,
            name: &input.name,
        });

        let result = match &pool {
            Some(pool) => pool.install(|| process_file(input, options)),
            None => process_file(input, options),
        };

        match result {
            Ok(file) => {
                let total_chunks = file.chunks.len();
                for index in 1..=total_chunks {
                    reporter.report(ProgressEvent::ChunkEncoded {
                        name: &input.name,
                        index,
                        total_chunks,
                    });
                }
                report.files.push(file);
                reporter.report(ProgressEvent::FileFinished {
                    completed: position + 1,
                    total_files,
                    name: &input.name,
                    chunks: total_chunks,
                });
            }
            Err(err) => match options.failure_policy {
                FailurePolicy::AbortBatch => return Err(err.in_file(&input.name)),
                FailurePolicy::SkipFailed => {
                    warn!("skipping '{}': {err}", input.name);
                    reporter.report(ProgressEvent::FileFailed {
                        completed: position + 1,
                        total_files,
                        name: &input.name,
                        error: &err,
                    });
                    report.failures.push(FileFailure {
                        source_name: input.name.clone(),
                        error: err,
                    });
                }
            },
        }
    }

    reporter.report(ProgressEvent::BatchFinished {
        succeeded: report.files.len(),
        failed: report.failures.len(),
        cancelled: report.cancelled,
    });
    Ok(report)
}
