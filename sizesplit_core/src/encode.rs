//! Re-encoding of PCM windows back to the container/codec of the source file.

use std::io::Cursor;
use std::num::{NonZeroU32, NonZeroU8};

use hound::{SampleFormat, WavSpec, WavWriter};
use mp3lame_encoder::{
    Bitrate as LameBitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality,
};
use vorbis_rs::{VorbisBitrateManagementStrategy, VorbisEncoderBuilder};

use crate::decode::{PcmSlice, SampleEncoding};
use crate::format::AudioFormat;

/// Bitrate pinned on lossy re-encodes unless configured otherwise.
pub const DEFAULT_LOSSY_BITRATE_KBPS: u32 = 192;

/// Knobs for the encoders. Lossless formats keep the source bit depth and
/// ignore these settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Target bitrate for MP3 (constant) and Vorbis (average) output.
    pub lossy_bitrate_kbps: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            lossy_bitrate_kbps: DEFAULT_LOSSY_BITRATE_KBPS,
        }
    }
}

/// Encode one window of PCM into a complete, standalone file.
pub trait ChunkEncoder: Send + Sync {
    fn encode(&self, pcm: PcmSlice<'_>) -> Result<Vec<u8>, String>;
}

/// Create the encoder matching `format`.
pub fn encoder_for(format: AudioFormat, settings: EncoderSettings) -> Box<dyn ChunkEncoder> {
    match format {
        AudioFormat::Wav => Box::new(WavEncoder),
        AudioFormat::Flac => Box::new(FlacEncoder),
        AudioFormat::Mp3 => Box::new(Mp3Encoder::new(settings.lossy_bitrate_kbps)),
        AudioFormat::Ogg => Box::new(VorbisEncoder::new(settings.lossy_bitrate_kbps)),
    }
}

/// Scale of a full-scale 32-bit sample.
const FULL_SCALE: f32 = 2_147_483_648.0;

/// RIFF WAVE with the same layout as the source.
///
/// Float sources are written as 32-bit IEEE float. 64-bit float sources are
/// narrowed to 32 bits.
pub struct WavEncoder;

impl ChunkEncoder for WavEncoder {
    fn encode(&self, pcm: PcmSlice<'_>) -> Result<Vec<u8>, String> {
        let (bits_per_sample, sample_format) = match pcm.sample_encoding {
            SampleEncoding::Int => (pcm.bits_per_sample as u16, SampleFormat::Int),
            SampleEncoding::Float => (32, SampleFormat::Float),
        };
        let spec = WavSpec {
            channels: pcm.channel_count,
            sample_rate: pcm.sample_rate,
            bits_per_sample,
            sample_format,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).map_err(|e| e.to_string())?;
            for &sample in pcm.samples {
                match pcm.sample_encoding {
                    SampleEncoding::Int => writer.write_sample(sample),
                    SampleEncoding::Float => writer.write_sample(sample as f32 / FULL_SCALE),
                }
                .map_err(|e| e.to_string())?;
            }
            writer.finalize().map_err(|e| e.to_string())?;
        }
        Ok(cursor.into_inner())
    }
}

/// Smallest block size a STREAMINFO header may declare.
const FLAC_MIN_DECLARED_BLOCK: u16 = 16;

/// FLAC in fixed-size blocks. The final block only holds the frames that
/// remain, so a chunk decodes to exactly its window.
pub struct FlacEncoder;

impl ChunkEncoder for FlacEncoder {
    fn encode(&self, pcm: PcmSlice<'_>) -> Result<Vec<u8>, String> {
        use flacenc::component::{BitRepr, Stream};
        use flacenc::constant::MIN_BLOCK_SIZE;
        use flacenc::error::Verify;
        use flacenc::source::{Fill, FrameBuf};

        let channels = usize::from(pcm.channel_count);
        let config = flacenc::config::Encoder::default()
            .into_verified()
            .map_err(|(_, err)| format!("invalid encoder config: {err:?}"))?;
        // LPC needs more warm-up samples than a tiny trailing block has.
        let mut short_config = flacenc::config::Encoder::default();
        short_config.subframe_coding.use_fixed = false;
        short_config.subframe_coding.use_lpc = false;
        let short_config = short_config
            .into_verified()
            .map_err(|(_, err)| format!("invalid encoder config: {err:?}"))?;

        let block_size = config.block_size;
        let mut stream = Stream::new(
            pcm.sample_rate as usize,
            channels,
            pcm.bits_per_sample as usize,
        )
        .map_err(|err| format!("{err:?}"))?;
        let mut framebuf =
            FrameBuf::with_size(channels, block_size).map_err(|err| format!("{err:?}"))?;

        for (frame_number, block) in pcm.samples.chunks(block_size * channels).enumerate() {
            let frames = block.len() / channels;
            if frames != framebuf.size() {
                framebuf.resize(frames);
            }
            framebuf
                .fill_interleaved(block)
                .map_err(|err| format!("{err:?}"))?;

            let frame_config = if frames < MIN_BLOCK_SIZE {
                &short_config
            } else {
                &config
            };
            let frame = flacenc::encode_fixed_size_frame(
                frame_config,
                &framebuf,
                frame_number,
                stream.stream_info(),
            )
            .map_err(|err| format!("{err:?}"))?;
            stream.add_frame(frame);
        }

        let mut sink = flacenc::bitsink::ByteSink::new();
        stream.write(&mut sink).map_err(|err| format!("{err:?}"))?;
        let mut bytes = sink.as_slice().to_vec();

        // STREAMINFO min/max block size live at bytes 8..12. The short final
        // block must not lower the minimum, or the stream stops being fixed-size.
        let declared = u16::try_from(stream.stream_info().max_block_size())
            .unwrap_or(u16::MAX)
            .max(FLAC_MIN_DECLARED_BLOCK);
        bytes[8..10].copy_from_slice(&declared.to_be_bytes());
        bytes[10..12].copy_from_slice(&declared.to_be_bytes());
        Ok(bytes)
    }
}

/// MP3 through LAME at a constant bitrate.
pub struct Mp3Encoder {
    bitrate_kbps: u32,
}

impl Mp3Encoder {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self { bitrate_kbps }
    }

    /// Largest LAME bitrate not above the requested one.
    fn lame_bitrate(&self) -> LameBitrate {
        match self.bitrate_kbps {
            0..=15 => LameBitrate::Kbps8,
            16..=23 => LameBitrate::Kbps16,
            24..=31 => LameBitrate::Kbps24,
            32..=39 => LameBitrate::Kbps32,
            40..=47 => LameBitrate::Kbps40,
            48..=63 => LameBitrate::Kbps48,
            64..=79 => LameBitrate::Kbps64,
            80..=95 => LameBitrate::Kbps80,
            96..=111 => LameBitrate::Kbps96,
            112..=127 => LameBitrate::Kbps112,
            128..=159 => LameBitrate::Kbps128,
            160..=191 => LameBitrate::Kbps160,
            192..=223 => LameBitrate::Kbps192,
            224..=255 => LameBitrate::Kbps224,
            256..=319 => LameBitrate::Kbps256,
            _ => LameBitrate::Kbps320,
        }
    }

    fn build_encoder(&self, pcm: &PcmSlice<'_>) -> Result<mp3lame_encoder::Encoder, String> {
        let mut builder = Builder::new().ok_or("failed to create LAME builder")?;
        builder
            .set_num_channels(pcm.channel_count as u8)
            .map_err(|e| format!("failed to set channels: {e:?}"))?;
        builder
            .set_sample_rate(pcm.sample_rate)
            .map_err(|e| format!("failed to set sample rate: {e:?}"))?;
        builder
            .set_brate(self.lame_bitrate())
            .map_err(|e| format!("failed to set bitrate: {e:?}"))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| format!("failed to set quality: {e:?}"))?;
        builder
            .build()
            .map_err(|e| format!("failed to initialize LAME: {e:?}"))
    }
}

impl ChunkEncoder for Mp3Encoder {
    fn encode(&self, pcm: PcmSlice<'_>) -> Result<Vec<u8>, String> {
        if !(1..=2).contains(&pcm.channel_count) {
            return Err(format!(
                "MP3 supports mono or stereo, got {} channels",
                pcm.channel_count
            ));
        }

        let mut encoder = self.build_encoder(&pcm)?;
        let samples = pcm.to_i16();

        let mut mp3_data = Vec::new();
        // Headroom for the final flush, which LAME requires to be at least 7200 bytes.
        mp3_data.reserve(mp3lame_encoder::max_required_buffer_size(samples.len()) + 7200);

        let encoded_size = if pcm.channel_count == 1 {
            encoder.encode(MonoPcm(samples.as_slice()), mp3_data.spare_capacity_mut())
        } else {
            encoder.encode(InterleavedPcm(samples.as_slice()), mp3_data.spare_capacity_mut())
        }
        .map_err(|e| format!("failed to encode MP3: {e:?}"))?;

        // SAFETY: `encode` reports how many bytes of the spare capacity it initialized.
        unsafe {
            mp3_data.set_len(encoded_size);
        }

        let flush_size = encoder
            .flush::<FlushNoGap>(mp3_data.spare_capacity_mut())
            .map_err(|e| format!("failed to flush MP3 encoder: {e:?}"))?;

        // SAFETY: `flush` reports how many additional bytes it initialized.
        unsafe {
            mp3_data.set_len(mp3_data.len() + flush_size);
        }

        Ok(mp3_data)
    }
}

/// Ogg Vorbis through libvorbis, VBR around the configured bitrate.
pub struct VorbisEncoder {
    bitrate_kbps: u32,
}

impl VorbisEncoder {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self { bitrate_kbps }
    }
}

impl ChunkEncoder for VorbisEncoder {
    fn encode(&self, pcm: PcmSlice<'_>) -> Result<Vec<u8>, String> {
        let sample_rate = NonZeroU32::new(pcm.sample_rate).ok_or("sample rate is zero")?;
        let channels = u8::try_from(pcm.channel_count)
            .ok()
            .and_then(NonZeroU8::new)
            .ok_or_else(|| format!("unsupported channel count {}", pcm.channel_count))?;
        let target_bitrate =
            NonZeroU32::new(self.bitrate_kbps.max(1) * 1000).ok_or("bitrate is zero")?;

        let mut ogg_data = Vec::new();
        let mut builder = VorbisEncoderBuilder::new(sample_rate, channels, &mut ogg_data)
            .map_err(|e| e.to_string())?;
        builder.bitrate_management_strategy(VorbisBitrateManagementStrategy::Vbr { target_bitrate });
        let mut encoder = builder.build().map_err(|e| e.to_string())?;

        let planes = pcm.to_planar_f32();
        if pcm.frames() > 0 {
            encoder.encode_audio_block(&planes).map_err(|e| e.to_string())?;
        }
        encoder.finish().map_err(|e| e.to_string())?;

        Ok(ogg_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedAudio;

    fn tone(sample_rate: u32, channels: u16, frames: usize) -> Vec<i32> {
        (0..frames)
            .flat_map(|n| {
                let theta = n as f32 / sample_rate as f32 * std::f32::consts::TAU * 440.0;
                let sample = (theta.sin() * 12_000.0) as i32;
                std::iter::repeat_n(sample, usize::from(channels))
            })
            .collect()
    }

    fn slice(samples: &[i32], sample_rate: u32, channels: u16) -> PcmSlice<'_> {
        PcmSlice {
            sample_rate,
            channel_count: channels,
            bits_per_sample: 16,
            sample_encoding: SampleEncoding::Int,
            samples,
        }
    }

    #[test]
    fn float_wav_stays_float() {
        let source: Vec<f32> = (0..2_000)
            .map(|n| ((n % 64) as f32 - 32.0) / 64.0)
            .collect();
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in &source {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }

        let audio = DecodedAudio::decode(&cursor.into_inner(), AudioFormat::Wav).unwrap();
        assert_eq!(audio.sample_encoding(), SampleEncoding::Float);
        assert_eq!(audio.bits_per_sample(), 32);

        let bytes = WavEncoder.encode(audio.slice_ms(0, 125)).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec(), spec);
        let written: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(written, source);
    }

    #[test]
    fn wav_round_trips_samples_exactly() {
        let samples = tone(8_000, 2, 4_000);
        let bytes = WavEncoder.encode(slice(&samples, 8_000, 2)).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let decoded = DecodedAudio::decode(&bytes, AudioFormat::Wav).unwrap();
        assert_eq!(decoded.sample_rate(), 8_000);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_width(), 2);
        assert_eq!(decoded.samples(), samples.as_slice());
    }

    #[test]
    fn flac_round_trips_samples_exactly() {
        let samples = tone(16_000, 1, 10_000);
        let bytes = FlacEncoder.encode(slice(&samples, 16_000, 1)).unwrap();
        assert_eq!(&bytes[..4], b"fLaC");

        let decoded = DecodedAudio::decode(&bytes, AudioFormat::Flac).unwrap();
        assert_eq!(decoded.frame_count(), 10_000);
        assert_eq!(decoded.samples(), samples.as_slice());
    }

    #[test]
    fn flac_short_final_block_is_not_padded() {
        // two full 4096-frame blocks plus a 10-frame tail
        let samples = tone(44_100, 2, 2 * 4_096 + 10);
        let bytes = FlacEncoder.encode(slice(&samples, 44_100, 2)).unwrap();

        let decoded = DecodedAudio::decode(&bytes, AudioFormat::Flac).unwrap();
        assert_eq!(decoded.frame_count(), 2 * 4_096 + 10);
        assert_eq!(decoded.samples(), samples.as_slice());
    }

    #[test]
    fn flac_encodes_windows_shorter_than_one_block() {
        let samples = tone(8_000, 1, 12);
        let bytes = FlacEncoder.encode(slice(&samples, 8_000, 1)).unwrap();

        let decoded = DecodedAudio::decode(&bytes, AudioFormat::Flac).unwrap();
        assert_eq!(decoded.samples(), samples.as_slice());
    }

    #[test]
    fn mp3_output_decodes() {
        let samples = tone(44_100, 2, 44_100);
        let encoder = encoder_for(AudioFormat::Mp3, EncoderSettings::default());
        let bytes = encoder.encode(slice(&samples, 44_100, 2)).unwrap();
        assert!(!bytes.is_empty());

        let decoded = DecodedAudio::decode(&bytes, AudioFormat::Mp3).unwrap();
        assert_eq!(decoded.sample_rate(), 44_100);
        assert_eq!(decoded.channel_count(), 2);
        assert!(decoded.duration_ms() >= 900);
    }

    #[test]
    fn mp3_rejects_surround_layouts() {
        let samples = tone(44_100, 6, 100);
        let err = Mp3Encoder { bitrate_kbps: 128 }
            .encode(slice(&samples, 44_100, 6))
            .unwrap_err();
        assert!(err.contains("6 channels"));
    }

    #[test]
    fn lame_bitrate_rounds_down() {
        assert!(matches!(
            Mp3Encoder { bitrate_kbps: 200 }.lame_bitrate(),
            LameBitrate::Kbps192
        ));
        assert!(matches!(
            Mp3Encoder { bitrate_kbps: 1_000 }.lame_bitrate(),
            LameBitrate::Kbps320
        ));
    }

    #[test]
    fn vorbis_output_is_an_ogg_stream() {
        let samples = tone(44_100, 2, 22_050);
        let encoder = encoder_for(AudioFormat::Ogg, EncoderSettings::default());
        let bytes = encoder.encode(slice(&samples, 44_100, 2)).unwrap();
        assert_eq!(&bytes[..4], b"OggS");

        let decoded = DecodedAudio::decode(&bytes, AudioFormat::Ogg).unwrap();
        assert_eq!(decoded.channel_count(), 2);
    }
}
