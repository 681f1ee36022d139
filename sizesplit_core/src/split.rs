use std::path::Path;

use log::debug;
use rayon::prelude::*;

use crate::bitrate::estimate_bitrate;
use crate::decode::DecodedAudio;
use crate::encode::{encoder_for, EncoderSettings};
use crate::error::{Result, SplitError};
use crate::format::AudioFormat;
use crate::plan::{ChunkPlan, ChunkWindow, TargetSize};

/// Infix placed between the base name and the part number of output files.
pub const OUTPUT_INFIX: &str = "size_adjusted_part";

/// One encoded time window of the source audio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputChunk {
    /// 1-based position in split order.
    pub index: usize,
    pub start_ms: u64,
    /// Exclusive.
    pub end_ms: u64,
    pub bytes: Vec<u8>,
}

/// Compute the chunk plan for `audio` from its PCM parameters.
pub fn chunk_plan(audio: &DecodedAudio, target: TargetSize) -> Result<ChunkPlan> {
    let bitrate = estimate_bitrate(audio.sample_rate(), audio.channel_count(), audio.sample_width())?;
    let plan = ChunkPlan::new(bitrate, target)?;
    debug!(
        "{:.1} kbps, target {} bytes -> chunks of at most {} ms",
        bitrate.kbps(),
        target.bytes(),
        plan.max_duration_ms()
    );
    Ok(plan)
}

/// Time windows `audio` would be split into, without encoding anything.
pub fn plan_chunks(audio: &DecodedAudio, target: TargetSize) -> Result<Vec<ChunkWindow>> {
    let plan = chunk_plan(audio, target)?;
    Ok(plan.windows(audio.duration_ms()).collect())
}

/// Split `audio` into consecutive chunks that each approximate `target` bytes
/// and encode every chunk as `format`.
///
/// Chunks are encoded in parallel on the current rayon pool; the returned
/// vector is always in ascending index order. The first encoding failure
/// discards every chunk of the file.
pub fn split_to_size(
    audio: &DecodedAudio,
    format: AudioFormat,
    target: TargetSize,
    settings: EncoderSettings,
) -> Result<Vec<OutputChunk>> {
    let windows = plan_chunks(audio, target)?;
    let encoder = encoder_for(format, settings);

    windows
        .par_iter()
        .map(|window| {
            let pcm = audio.slice_ms(window.start_ms, window.end_ms);
            let bytes = encoder.encode(pcm).map_err(|reason| SplitError::Encode {
                index: window.index,
                format: format.extension(),
                reason,
            })?;
            debug!(
                "chunk {} [{} ms, {} ms): {} frame(s), {} byte(s)",
                window.index,
                window.start_ms,
                window.end_ms,
                pcm.frames(),
                bytes.len()
            );
            Ok(OutputChunk {
                index: window.index,
                start_ms: window.start_ms,
                end_ms: window.end_ms,
                bytes,
            })
        })
        .collect()
}

/// Base name and extension of an input file name.
///
/// The extension is returned as written, without the leading dot.
pub fn split_file_name(file_name: &str) -> Result<(&str, &str)> {
    let path = Path::new(file_name);
    let invalid = || SplitError::InvalidInputName(file_name.to_owned());
    let base = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(invalid)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(invalid)?;
    Ok((base, extension))
}

/// `<base>_size_adjusted_part<index>.<extension>`
pub fn output_file_name(base: &str, extension: &str, index: usize) -> String {
    format!("{base}_{OUTPUT_INFIX}{index}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(sample_rate: u32, channels: u16, frames: usize) -> DecodedAudio {
        let samples = (0..frames * usize::from(channels))
            .map(|n| (n % 30_000) as i32 - 15_000)
            .collect();
        DecodedAudio::from_interleaved(sample_rate, channels, 2, samples).unwrap()
    }

    #[test]
    fn wav_chunks_reassemble_to_the_original_samples() {
        let audio = ramp(8_000, 2, 8_000 * 5 + 37);
        // 8 kHz stereo 16-bit = 32_000 bytes/s -> 1.5 s per chunk
        let target = TargetSize::from_bytes(48_000).unwrap();

        let chunks = split_to_size(&audio, AudioFormat::Wav, target, EncoderSettings::default())
            .unwrap();
        assert_eq!(chunks.len(), 4);

        let mut rebuilt = Vec::new();
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position + 1);
            let decoded = DecodedAudio::decode(&chunk.bytes, AudioFormat::Wav).unwrap();
            rebuilt.extend_from_slice(decoded.samples());
        }
        assert_eq!(rebuilt, audio.samples());

        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert_eq!(chunks[0].start_ms, 0);
        assert_eq!(chunks[3].end_ms, audio.duration_ms());
    }

    #[test]
    fn flac_chunks_reassemble_to_the_original_samples() {
        let audio = ramp(16_000, 1, 16_000 * 3);
        let target = TargetSize::from_bytes(32_000).unwrap();

        let chunks = split_to_size(&audio, AudioFormat::Flac, target, EncoderSettings::default())
            .unwrap();
        assert_eq!(chunks.len(), 3);

        let mut rebuilt = Vec::new();
        for chunk in &chunks {
            let decoded = DecodedAudio::decode(&chunk.bytes, AudioFormat::Flac).unwrap();
            let window = audio.slice_ms(chunk.start_ms, chunk.end_ms);
            assert_eq!(decoded.frame_count() as usize, window.frames());
            rebuilt.extend_from_slice(decoded.samples());
        }
        assert_eq!(rebuilt, audio.samples());
    }

    #[test]
    fn audio_shorter_than_a_chunk_is_a_single_chunk() {
        let audio = ramp(8_000, 1, 4_000);
        let target = TargetSize::from_megabytes(1).unwrap();

        let chunks = split_to_size(&audio, AudioFormat::Wav, target, EncoderSettings::default())
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_ms, chunks[0].end_ms), (0, 500));
    }

    #[test]
    fn target_too_small_produces_no_chunks() {
        let audio = ramp(48_000, 2, 100);
        let target = TargetSize::from_bytes(100).unwrap();

        let err = split_to_size(&audio, AudioFormat::Wav, target, EncoderSettings::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }

    #[test]
    fn encode_failures_carry_the_chunk_index() {
        let samples = vec![0; 6 * 44_100];
        let audio = DecodedAudio::from_interleaved(44_100, 6, 2, samples).unwrap();

        let err = split_to_size(
            &audio,
            AudioFormat::Mp3,
            TargetSize::default(),
            EncoderSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::Encode { index: 1, format: "mp3", .. }));
    }

    #[test]
    fn output_names_keep_base_and_extension() {
        let (base, ext) = split_file_name("Lecture 03.final.MP3").unwrap();
        assert_eq!((base, ext), ("Lecture 03.final", "MP3"));
        assert_eq!(
            output_file_name(base, ext, 2),
            "Lecture 03.final_size_adjusted_part2.MP3"
        );
        assert!(split_file_name("README").is_err());
    }
}
