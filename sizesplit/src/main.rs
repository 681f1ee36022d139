mod cli;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;
use sizesplit_core::{
    plan_outputs, run_with_progress, Config, EncoderSettings, FailurePolicy, ProgressEvent,
    ProgressReporter, TargetSize,
};

use crate::cli::build_cli;

/// Draws one bar step per input file.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn report(&mut self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::BatchStarted { total_files } => {
                self.bar.set_length(total_files as u64);
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
            ProgressEvent::FileStarted {
                position,
                total_files,
                name,
            } => {
                self.bar
                    .set_message(format!("{name} ({position}/{total_files})"));
            }
            ProgressEvent::ChunkEncoded {
                name,
                index,
                total_chunks,
            } => {
                debug!("{name}: chunk {index}/{total_chunks} ready");
            }
            ProgressEvent::FileFinished {
                completed,
                name,
                chunks,
                ..
            } => {
                self.bar.set_position(completed as u64);
                self.bar.println(format!("{name}: {chunks} chunk(s)"));
            }
            ProgressEvent::FileFailed {
                completed,
                name,
                error,
                ..
            } => {
                self.bar.set_position(completed as u64);
                self.bar.println(format!("{name}: failed: {error}"));
            }
            ProgressEvent::BatchFinished { .. } => {
                self.bar.set_message(String::from("Completed"));
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("files")
        .ok_or_else(|| anyhow!("at least one input file is required"))?
        .cloned()
        .collect();
    for input in &inputs {
        if !input.is_file() {
            bail!("input file does not exist: {}", input.display());
        }
    }

    let target = *matches
        .get_one::<TargetSize>("size")
        .ok_or_else(|| anyhow!("missing target size"))?;
    let output_dir = matches
        .get_one::<PathBuf>("output")
        .ok_or_else(|| anyhow!("missing output directory"))?;
    let bitrate = *matches
        .get_one::<u32>("bitrate")
        .ok_or_else(|| anyhow!("missing bitrate"))?;
    let failure_policy = if matches.get_flag("keep-going") {
        FailurePolicy::SkipFailed
    } else {
        FailurePolicy::AbortBatch
    };

    let mut builder = Config::builder(&inputs, output_dir, target)
        .overwrite(matches.get_flag("overwrite"))
        .failure_policy(failure_policy)
        .encoder_settings(EncoderSettings {
            lossy_bitrate_kbps: bitrate,
        });
    if let Some(threads) = matches.get_one::<NonZeroUsize>("threads") {
        builder = builder.threads(*threads);
    }
    if let Some(name) = matches.get_one::<String>("zip") {
        builder = builder.archive(name.as_str());
    }
    let config = builder.build().with_context(|| {
        format!(
            "failed to create configuration for output directory '{}'",
            output_dir.display()
        )
    })?;
    debug!("resolved configuration: {config:?}");

    if matches.get_flag("dry-run") {
        let plan = plan_outputs(&config).context("failed to plan chunks")?;

        if plan.is_empty() {
            println!("Dry run: no chunks would be generated.");
        } else {
            println!("Dry run: would generate {} chunk(s):", plan.len());
            for path in plan {
                println!("  {}", path.display());
            }
            if let Some(name) = &config.archive_name {
                println!(
                    "Chunks would be bundled into {}",
                    config.output_dir.join(name).display()
                );
            }
        }

        return Ok(());
    }

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut reporter = BarReporter {
        bar: progress.clone(),
    };
    let result = run_with_progress(config, &mut reporter).context("failed to split audio files");

    progress.finish_and_clear();

    let summary = result?;
    for path in &summary.written {
        println!("{}", path.display());
    }
    println!(
        "Wrote {} chunk(s) to {} file(s).",
        summary.chunks,
        summary.written.len()
    );

    if !summary.failures.is_empty() {
        for failure in &summary.failures {
            eprintln!("{}: {}", failure.source_name, failure.error);
        }
        bail!("{} file(s) could not be split", summary.failures.len());
    }

    Ok(())
}
