use std::io::{Cursor, ErrorKind as IoErrorKind};

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CodecType, DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_PCM_F32BE, CODEC_TYPE_PCM_F32LE,
    CODEC_TYPE_PCM_F64BE, CODEC_TYPE_PCM_F64LE,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::error::{Result, SplitError};
use crate::format::AudioFormat;

/// Bit depth assumed for codecs that do not advertise one.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// How the source stored its samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleEncoding {
    #[default]
    Int,
    /// IEEE float. Held as full-scale 32-bit integers, where `i32::MIN`
    /// is `-1.0`.
    Float,
}

impl SampleEncoding {
    fn of_codec(codec: CodecType) -> Self {
        match codec {
            CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE | CODEC_TYPE_PCM_F64LE
            | CODEC_TYPE_PCM_F64BE => SampleEncoding::Float,
            _ => SampleEncoding::Int,
        }
    }
}

/// Fully decoded PCM audio.
///
/// Samples are interleaved and stored as integers at the native bit depth of
/// the source, so a 16-bit stream keeps values in `i16` range. Float sources
/// are kept at 32 bits and flagged with [`SampleEncoding::Float`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedAudio {
    sample_rate: u32,
    channel_count: u16,
    sample_width: u16,
    sample_encoding: SampleEncoding,
    samples: Vec<i32>,
}

impl DecodedAudio {
    /// Build audio from interleaved samples already at `sample_width * 8` bits.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: u16,
        sample_width: u16,
        samples: Vec<i32>,
    ) -> Result<Self> {
        if sample_rate == 0 || channel_count == 0 || sample_width == 0 || sample_width > 4 {
            return Err(SplitError::InvalidPcmParameters {
                sample_rate,
                channel_count,
                sample_width,
            });
        }

        let mut samples = samples;
        let whole_frames = samples.len() - samples.len() % usize::from(channel_count);
        samples.truncate(whole_frames);

        Ok(Self {
            sample_rate,
            channel_count,
            sample_width,
            sample_encoding: SampleEncoding::Int,
            samples,
        })
    }

    /// Build float audio from full-scale 32-bit samples.
    pub fn from_float_interleaved(
        sample_rate: u32,
        channel_count: u16,
        samples: Vec<i32>,
    ) -> Result<Self> {
        let mut audio = Self::from_interleaved(sample_rate, channel_count, 4, samples)?;
        audio.sample_encoding = SampleEncoding::Float;
        Ok(audio)
    }

    /// Decode a complete in-memory file.
    ///
    /// `format` only serves as a format hint; the container is still detected
    /// from the stream contents.
    pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<Self> {
        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let detected = get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut reader = detected.format;

        let track = reader
            .default_track()
            .ok_or(SplitError::MissingDefaultTrack)?;
        if track.codec_params.codec == CODEC_TYPE_NULL {
            return Err(SplitError::UnsupportedFormat(format.to_string()));
        }

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(SplitError::MissingSampleRate)?;
        let mut channel_count = track
            .codec_params
            .channels
            .map(|channels| channels.count() as u16);
        let sample_encoding = SampleEncoding::of_codec(track.codec_params.codec);
        let bits_per_sample = match sample_encoding {
            SampleEncoding::Float => 32,
            SampleEncoding::Int => track
                .codec_params
                .bits_per_sample
                .filter(|bits| (1..=32).contains(bits))
                .unwrap_or(DEFAULT_BITS_PER_SAMPLE),
        };
        let sample_width = bits_per_sample.div_ceil(8) as u16;
        let shift = 32 - u32::from(sample_width) * 8;

        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples: Vec<i32> = Vec::new();
        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == IoErrorKind::UnexpectedEof => {
                    break
                }
                Err(err) => return Err(err.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!("skipping undecodable packet: {reason}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let spec = *decoded.spec();
            if channel_count.is_none() {
                channel_count = Some(spec.channels.count() as u16);
            }

            let mut buf = SampleBuffer::<i32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            samples.extend(buf.samples().iter().map(|&sample| sample >> shift));
        }

        let channel_count = channel_count.ok_or(SplitError::MissingChannels)?;
        debug!(
            "decoded {} frame(s) at {sample_rate} Hz, {channel_count} channel(s), {bits_per_sample} bit",
            samples.len() / usize::from(channel_count.max(1))
        );

        match sample_encoding {
            SampleEncoding::Float => {
                Self::from_float_interleaved(sample_rate, channel_count, samples)
            }
            SampleEncoding::Int => {
                Self::from_interleaved(sample_rate, channel_count, sample_width, samples)
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Bytes per sample per channel.
    pub fn sample_width(&self) -> u16 {
        self.sample_width
    }

    pub fn bits_per_sample(&self) -> u32 {
        u32::from(self.sample_width) * 8
    }

    pub fn sample_encoding(&self) -> SampleEncoding {
        self.sample_encoding
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn frame_count(&self) -> u64 {
        (self.samples.len() / usize::from(self.channel_count)) as u64
    }

    /// Length in milliseconds, rounded to the nearest millisecond.
    pub fn duration_ms(&self) -> u64 {
        let rate = u128::from(self.sample_rate);
        let frames = u128::from(self.frame_count());
        ((frames * 1_000 + rate / 2) / rate) as u64
    }

    /// Frame position of a millisecond offset. Offsets at or past the end map
    /// to the total frame count so that the final window keeps every frame.
    pub fn frame_at(&self, ms: u64) -> u64 {
        if ms >= self.duration_ms() {
            return self.frame_count();
        }
        let frame = u128::from(ms) * u128::from(self.sample_rate) / 1_000;
        (frame as u64).min(self.frame_count())
    }

    /// Borrow the samples of `[start_ms, end_ms)`.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> PcmSlice<'_> {
        let channels = usize::from(self.channel_count);
        let start = self.frame_at(start_ms) as usize * channels;
        let end = (self.frame_at(end_ms) as usize * channels).max(start);

        PcmSlice {
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
            bits_per_sample: self.bits_per_sample(),
            sample_encoding: self.sample_encoding,
            samples: &self.samples[start..end],
        }
    }
}

/// Borrowed window of interleaved PCM samples.
#[derive(Clone, Copy, Debug)]
pub struct PcmSlice<'a> {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub bits_per_sample: u32,
    pub sample_encoding: SampleEncoding,
    pub samples: &'a [i32],
}

impl PcmSlice<'_> {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channel_count)
    }

    /// Samples rescaled to 16 bits, as required by LAME.
    pub fn to_i16(&self) -> Vec<i16> {
        let bits = self.bits_per_sample;
        self.samples
            .iter()
            .map(|&sample| {
                if bits >= 16 {
                    (sample >> (bits - 16)) as i16
                } else {
                    (sample << (16 - bits)) as i16
                }
            })
            .collect()
    }

    /// One `f32` plane per channel, normalised to `[-1.0, 1.0)`.
    pub fn to_planar_f32(&self) -> Vec<Vec<f32>> {
        let channels = usize::from(self.channel_count);
        let scale = (1u64 << (self.bits_per_sample - 1)) as f32;
        let mut planes = vec![Vec::with_capacity(self.frames()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample as f32 / scale);
            }
        }
        planes
    }
}
