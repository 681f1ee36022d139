use std::fmt;
use std::path::Path;

use crate::error::{Result, SplitError};

/// Container/codec pairs that can be split and written back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// MPEG-1/2 Layer III, lossy.
    Mp3,
    /// Free Lossless Audio Codec.
    Flac,
    /// RIFF WAVE holding uncompressed PCM.
    Wav,
    /// Vorbis inside an Ogg container.
    Ogg,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 4] = [
        AudioFormat::Mp3,
        AudioFormat::Flac,
        AudioFormat::Wav,
        AudioFormat::Ogg,
    ];

    /// Resolve a format from a bare extension (`"mp3"`, `"FLAC"`, ...).
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "flac" => Ok(AudioFormat::Flac),
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "ogg" | "oga" => Ok(AudioFormat::Ogg),
            _ => Err(SplitError::UnsupportedFormat(extension.to_owned())),
        }
    }

    /// Resolve a format from the extension of a file name.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| SplitError::UnsupportedFormat(name.to_owned()))?;
        Self::from_extension(extension)
    }

    /// Canonical lowercase extension, also passed to symphonia as a format hint.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Whether the codec discards information when encoding.
    pub fn is_lossy(self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Ogg)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(AudioFormat::from_extension("MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(
            AudioFormat::from_file_name("Take 1.Flac").unwrap(),
            AudioFormat::Flac
        );
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert!(matches!(
            AudioFormat::from_file_name("notes.txt"),
            Err(SplitError::UnsupportedFormat(ext)) if ext == "txt"
        ));
        assert!(AudioFormat::from_file_name("no_extension").is_err());
    }
}
