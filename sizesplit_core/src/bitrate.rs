use crate::error::{Result, SplitError};

/// Data rate of an uncompressed PCM stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bitrate {
    bits_per_second: u64,
}

impl Bitrate {
    pub fn bits_per_second(self) -> u64 {
        self.bits_per_second
    }

    /// Rate in kilobits (1000 bits) per second.
    pub fn kbps(self) -> f64 {
        self.bits_per_second as f64 / 1000.0
    }
}

/// Estimate the bitrate of a stream from its raw PCM parameters.
///
/// The result is the uncompressed PCM rate
/// (`sample_rate * channel_count * sample_width * 8`). It is used as a proxy
/// for the encoded rate even for compressed formats, so chunks of lossy or
/// lossless-compressed files come out well below the target size.
pub fn estimate_bitrate(sample_rate: u32, channel_count: u16, sample_width: u16) -> Result<Bitrate> {
    if sample_rate == 0 || channel_count == 0 || sample_width == 0 {
        return Err(SplitError::InvalidPcmParameters {
            sample_rate,
            channel_count,
            sample_width,
        });
    }

    let bits_per_second =
        u64::from(sample_rate) * u64::from(channel_count) * u64::from(sample_width) * 8;
    Ok(Bitrate { bits_per_second })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_quality_is_1411_kbps() {
        let bitrate = estimate_bitrate(44_100, 2, 2).unwrap();
        assert_eq!(bitrate.bits_per_second(), 1_411_200);
        assert!((bitrate.kbps() - 1411.2).abs() < 1e-9);
    }

    #[test]
    fn matches_formula_across_common_layouts() {
        for &rate in &[8_000u32, 22_050, 44_100, 48_000, 96_000] {
            for channels in 1u16..=6 {
                for width in 1u16..=4 {
                    let bitrate = estimate_bitrate(rate, channels, width).unwrap();
                    let expected = rate as f64 * channels as f64 * width as f64 * 8.0 / 1000.0;
                    assert!(bitrate.kbps() > 0.0);
                    assert!((bitrate.kbps() - expected).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn zero_parameters_are_rejected() {
        assert!(matches!(
            estimate_bitrate(0, 2, 2),
            Err(SplitError::InvalidPcmParameters { sample_rate: 0, .. })
        ));
        assert!(estimate_bitrate(44_100, 0, 2).is_err());
        assert!(estimate_bitrate(44_100, 2, 0).is_err());
    }
}
