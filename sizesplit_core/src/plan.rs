use crate::bitrate::Bitrate;
use crate::error::{Result, SplitError};

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Default size limit of a single output file, in megabytes.
pub const DEFAULT_TARGET_MEGABYTES: u64 = 29;

/// Requested approximate size of each output chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetSize {
    bytes: u64,
}

impl TargetSize {
    pub fn from_bytes(bytes: u64) -> Result<Self> {
        if bytes == 0 {
            return Err(SplitError::InvalidTargetSize);
        }
        Ok(Self { bytes })
    }

    /// Megabytes are binary: one megabyte is 1024 * 1024 bytes.
    pub fn from_megabytes(megabytes: u64) -> Result<Self> {
        let bytes = megabytes
            .checked_mul(BYTES_PER_MEGABYTE)
            .ok_or(SplitError::InvalidTargetSize)?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(self) -> u64 {
        self.bytes
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_TARGET_MEGABYTES * BYTES_PER_MEGABYTE,
        }
    }
}

/// Maximum duration of a chunk for a given bitrate and target size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    max_duration_ms: u64,
}

impl ChunkPlan {
    /// Compute `floor(target_bytes * 8 / bits_per_second)` in milliseconds.
    pub fn new(bitrate: Bitrate, target: TargetSize) -> Result<Self> {
        let invalid = || SplitError::InvalidChunkDuration {
            target_bytes: target.bytes(),
            bitrate_kbps: bitrate.kbps(),
        };

        let bits_per_second = u128::from(bitrate.bits_per_second());
        if bits_per_second == 0 {
            return Err(invalid());
        }

        let max_duration_ms = u128::from(target.bytes()) * 8 * 1_000 / bits_per_second;
        let max_duration_ms = u64::try_from(max_duration_ms).unwrap_or(u64::MAX);
        if max_duration_ms == 0 {
            return Err(invalid());
        }

        Ok(Self { max_duration_ms })
    }

    pub fn max_duration_ms(&self) -> u64 {
        self.max_duration_ms
    }

    /// Number of windows needed to cover `total_ms`.
    pub fn chunk_count(&self, total_ms: u64) -> usize {
        total_ms.div_ceil(self.max_duration_ms) as usize
    }

    /// Partition `[0, total_ms)` into consecutive windows.
    pub fn windows(&self, total_ms: u64) -> Windows {
        Windows {
            step: self.max_duration_ms,
            total: total_ms,
            next_start: 0,
            next_index: 1,
        }
    }
}

/// One time range of the source audio, `[start_ms, end_ms)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkWindow {
    /// 1-based position in split order.
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkWindow {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Iterator returned by [`ChunkPlan::windows`].
#[derive(Clone, Debug)]
pub struct Windows {
    step: u64,
    total: u64,
    next_start: u64,
    next_index: usize,
}

impl Iterator for Windows {
    type Item = ChunkWindow;

    fn next(&mut self) -> Option<ChunkWindow> {
        if self.next_start >= self.total {
            return None;
        }

        let start_ms = self.next_start;
        let end_ms = start_ms.saturating_add(self.step).min(self.total);
        let window = ChunkWindow {
            index: self.next_index,
            start_ms,
            end_ms,
        };

        self.next_start = end_ms;
        self.next_index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.next_start).div_ceil(self.step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitrate::estimate_bitrate;

    fn plan(sample_rate: u32, channels: u16, width: u16, target_bytes: u64) -> ChunkPlan {
        let bitrate = estimate_bitrate(sample_rate, channels, width).unwrap();
        ChunkPlan::new(bitrate, TargetSize::from_bytes(target_bytes).unwrap()).unwrap()
    }

    #[test]
    fn cd_audio_with_five_megabyte_target() {
        let bitrate = estimate_bitrate(44_100, 2, 2).unwrap();
        let plan = ChunkPlan::new(bitrate, TargetSize::from_megabytes(5).unwrap()).unwrap();

        // 5 MiB * 8 / 1_411_200 bit/s = 29.72 s
        assert_eq!(plan.max_duration_ms(), 29_721);

        let windows: Vec<_> = plan.windows(120_000).collect();
        assert_eq!(windows.len(), 5);
        assert_eq!(plan.chunk_count(120_000), 5);

        let last = windows.last().unwrap();
        assert_eq!(last.index, 5);
        assert_eq!(last.end_ms, 120_000);
        assert_eq!(last.duration_ms(), 1_116);
    }

    #[test]
    fn windows_are_contiguous_and_cover_the_whole_duration() {
        for &(target, total) in &[(1_000u64, 10_000u64), (7_919, 123_457), (16_000, 1), (50, 999)] {
            let plan = plan(8_000, 1, 2, target);
            let windows: Vec<_> = plan.windows(total).collect();

            assert_eq!(
                windows.len(),
                total.div_ceil(plan.max_duration_ms()) as usize
            );
            assert_eq!(windows.first().unwrap().start_ms, 0);
            assert_eq!(windows.last().unwrap().end_ms, total);
            for (position, pair) in windows.windows(2).enumerate() {
                assert_eq!(pair[0].end_ms, pair[1].start_ms);
                assert_eq!(pair[0].duration_ms(), plan.max_duration_ms());
                assert_eq!(pair[0].index, position + 1);
            }
            for window in &windows {
                assert!(window.duration_ms() > 0);
                assert!(window.duration_ms() <= plan.max_duration_ms());
            }
        }
    }

    #[test]
    fn short_audio_yields_single_window() {
        let plan = plan(8_000, 1, 2, 16_000);
        assert_eq!(plan.max_duration_ms(), 1_000);

        let windows: Vec<_> = plan.windows(1_000).collect();
        assert_eq!(
            windows,
            vec![ChunkWindow {
                index: 1,
                start_ms: 0,
                end_ms: 1_000
            }]
        );
    }

    #[test]
    fn empty_audio_yields_no_windows() {
        let plan = plan(8_000, 1, 2, 16_000);
        assert_eq!(plan.windows(0).count(), 0);
        assert_eq!(plan.windows(0).len(), 0);
    }

    #[test]
    fn zero_target_is_invalid() {
        assert!(matches!(
            TargetSize::from_bytes(0),
            Err(SplitError::InvalidTargetSize)
        ));
        assert!(TargetSize::from_megabytes(0).is_err());
    }

    #[test]
    fn target_too_small_for_one_millisecond_is_invalid() {
        let bitrate = estimate_bitrate(192_000, 8, 4).unwrap();
        let err = ChunkPlan::new(bitrate, TargetSize::from_bytes(1).unwrap()).unwrap_err();
        assert!(matches!(err, SplitError::InvalidChunkDuration { target_bytes: 1, .. }));
    }

    #[test]
    fn default_target_is_29_megabytes() {
        assert_eq!(TargetSize::default().bytes(), 29 * 1024 * 1024);
    }
}
