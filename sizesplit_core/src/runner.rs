use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::archive::package_archive;
use crate::batch::{
    process_batch, BatchOptions, FailurePolicy, FileFailure, FileOutput, InputFile,
};
use crate::decode::DecodedAudio;
use crate::encode::EncoderSettings;
use crate::error::{Result, SplitError};
use crate::format::AudioFormat;
use crate::plan::TargetSize;
use crate::progress::{NoProgress, ProgressReporter};
use crate::split::{output_file_name, plan_chunks, split_file_name};

/// Configuration for splitting files on disk.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized paths of the source files, in processing order.
    pub inputs: Vec<PathBuf>,
    /// Canonicalized directory into which the output files will be written.
    pub output_dir: PathBuf,
    pub options: BatchOptions,
    /// Whether existing files in the output directory may be replaced.
    pub overwrite: bool,
    /// When set, outputs are bundled into one zip with this file name.
    pub archive_name: Option<String>,
}

impl Config {
    /// Construct a new [`Config`] with default options.
    pub fn new<I, P, Q>(inputs: I, output: Q, target: TargetSize) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Self::builder(inputs, output, target).build()
    }

    /// Start building a [`Config`].
    pub fn builder<I, P, Q>(inputs: I, output: Q, target: TargetSize) -> ConfigBuilder
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        ConfigBuilder {
            inputs: inputs
                .into_iter()
                .map(|path| path.as_ref().to_path_buf())
                .collect(),
            output_dir: output.as_ref().to_path_buf(),
            options: BatchOptions {
                target,
                ..BatchOptions::default()
            },
            overwrite: false,
            archive_name: None,
        }
    }
}

/// Builder returned by [`Config::builder`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    options: BatchOptions,
    overwrite: bool,
    archive_name: Option<String>,
}

impl ConfigBuilder {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn archive<S: Into<String>>(mut self, name: S) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.options.failure_policy = policy;
        self
    }

    pub fn encoder_settings(mut self, settings: EncoderSettings) -> Self {
        self.options.encoder = settings;
        self
    }

    pub fn threads(mut self, threads: NonZeroUsize) -> Self {
        self.options.threads = Some(threads);
        self
    }

    /// Canonicalize every path and validate the archive name.
    pub fn build(self) -> Result<Config> {
        let inputs = self
            .inputs
            .iter()
            .map(fs::canonicalize)
            .collect::<std::io::Result<Vec<_>>>()?;
        let output_dir = fs::canonicalize(&self.output_dir)?;

        if let Some(name) = &self.archive_name {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(SplitError::InvalidArchiveEntry(name.clone()));
            }
        }

        Ok(Config {
            inputs,
            output_dir,
            options: self.options,
            overwrite: self.overwrite,
            archive_name: self.archive_name,
        })
    }
}

/// What a run wrote to disk.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Paths written, in order: loose chunk files or the single archive.
    pub written: Vec<PathBuf>,
    /// Number of chunks produced across all files.
    pub chunks: usize,
    pub failures: Vec<FileFailure>,
    pub cancelled: bool,
}

/// Perform the splitting operation using the supplied [`Config`].
pub fn run(config: Config) -> Result<RunSummary> {
    run_with_progress(config, &mut NoProgress)
}

/// Perform the splitting operation and report progress to `reporter`.
///
/// Nothing is written before every file of the batch has been processed.
pub fn run_with_progress(config: Config, reporter: &mut dyn ProgressReporter) -> Result<RunSummary> {
    ensure_output_dir(&config.output_dir)?;

    let (inputs, mut failures) = read_inputs(&config.inputs, config.options.failure_policy)?;
    info!(
        "splitting {} file(s) into chunks of about {} bytes",
        inputs.len(),
        config.options.target.bytes()
    );

    let mut report = process_batch(&inputs, &config.options, reporter)?;
    failures.append(&mut report.failures);
    report.failures = failures;
    let chunks = report.outputs().count();

    let written = match &config.archive_name {
        Some(name) => {
            let path = config.output_dir.join(name);
            ensure_writable(&path, config.overwrite)?;
            let archive = package_archive(
                report
                    .outputs()
                    .map(|output| (output.name.as_str(), output.bytes.as_slice())),
            )?;
            fs::write(&path, archive)?;
            info!("wrote {} chunk(s) to '{}'", chunks, path.display());
            vec![path]
        }
        None => {
            let paths = report
                .outputs()
                .map(|output| config.output_dir.join(&output.name))
                .collect::<Vec<_>>();
            ensure_unique(&paths)?;
            for path in &paths {
                ensure_writable(path, config.overwrite)?;
            }

            let mut written = Vec::with_capacity(paths.len());
            for file in &report.files {
                written.extend(write_file_outputs(&config.output_dir, file)?);
            }
            written
        }
    };

    Ok(RunSummary {
        written,
        chunks,
        failures: report.failures,
        cancelled: report.cancelled,
    })
}

/// Paths a run with `config` would produce, without encoding or writing.
///
/// With an archive configured the chunk paths are still listed relative to
/// the output directory; they become entries of the archive.
pub fn plan_outputs(config: &Config) -> Result<Vec<PathBuf>> {
    ensure_output_dir(&config.output_dir)?;

    let mut planned = Vec::new();
    for path in &config.inputs {
        let input = read_input(path)?;
        let windows = plan_file(&input, config.options.target)
            .map_err(|err| err.in_file(&input.name))?;
        planned.extend(windows.into_iter().map(|name| config.output_dir.join(name)));
    }
    ensure_unique(&planned)?;
    Ok(planned)
}

fn plan_file(input: &InputFile, target: TargetSize) -> Result<Vec<String>> {
    let format = AudioFormat::from_file_name(&input.name)?;
    let (base, extension) = split_file_name(&input.name)?;
    let audio = DecodedAudio::decode(&input.bytes, format)?;
    Ok(plan_chunks(&audio, target)?
        .iter()
        .map(|window| output_file_name(base, extension, window.index))
        .collect())
}

fn read_input(path: &Path) -> Result<InputFile> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| SplitError::InvalidInputName(path.display().to_string()))?;
    let bytes = fs::read(path).map_err(|err| SplitError::from(err).in_file(name))?;
    Ok(InputFile::new(name, bytes))
}

/// Read every input. Under [`FailurePolicy::SkipFailed`] unreadable files are
/// returned as failures instead of stopping the run.
fn read_inputs(
    paths: &[PathBuf],
    policy: FailurePolicy,
) -> Result<(Vec<InputFile>, Vec<FileFailure>)> {
    let mut inputs = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match read_input(path) {
            Ok(input) => inputs.push(input),
            Err(err) if policy == FailurePolicy::SkipFailed => {
                warn!("skipping '{}': {err}", path.display());
                failures.push(FileFailure {
                    source_name: source_name(path),
                    error: err,
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok((inputs, failures))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Inputs sharing a file name map to the same chunk names.
fn ensure_unique(paths: &[PathBuf]) -> Result<()> {
    let mut seen = HashSet::with_capacity(paths.len());
    for path in paths {
        if !seen.insert(path) {
            return Err(SplitError::DuplicateOutput(path.clone()));
        }
    }
    Ok(())
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(SplitError::MissingOutputDirectory(dir.to_path_buf()));
    }
    Ok(())
}

fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(SplitError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Write every chunk of one file. On failure the chunks of this file that
/// were already written are removed again.
fn write_file_outputs(dir: &Path, file: &FileOutput) -> Result<Vec<PathBuf>> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(file.chunks.len());
    for chunk in &file.chunks {
        let path = dir.join(&chunk.name);
        if let Err(err) = fs::write(&path, &chunk.bytes) {
            for partial in &written {
                if let Err(cleanup) = fs::remove_file(partial) {
                    warn!("failed to remove '{}': {cleanup}", partial.display());
                }
            }
            return Err(SplitError::from(err).in_file(&file.source_name));
        }
        written.push(path);
    }
    Ok(written)
}
