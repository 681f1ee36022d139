mod size;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};
use sizesplit_core::DEFAULT_ARCHIVE_NAME;

use self::size::parse_size;

/// Default for `--size`, in megabytes.
pub const DEFAULT_SIZE: &str = "29";
/// Default for `--bitrate`, in kbit/s.
pub const DEFAULT_BITRATE: &str = "192";

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Split audio files into chunks that fit a target file size")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_name("SIZE")
                .help("Target size of each chunk (e.g. 25, 25MB, 700k); bare numbers are megabytes")
                .default_value(DEFAULT_SIZE)
                .value_parser(ValueParser::new(parse_size)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Directory where the chunks will be written")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("zip")
                .long("zip")
                .value_name("NAME")
                .help("Bundle every chunk into a single zip archive")
                .num_args(0..=1)
                .default_missing_value(DEFAULT_ARCHIVE_NAME),
        )
        .arg(
            Arg::new("bitrate")
                .long("bitrate")
                .value_name("KBPS")
                .help("Bitrate used when re-encoding MP3 and Ogg Vorbis chunks")
                .default_value(DEFAULT_BITRATE)
                .value_parser(value_parser!(u32).range(8..=500)),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("N")
                .help("Number of worker threads used for encoding")
                .value_parser(value_parser!(NonZeroUsize)),
        )
        .arg(
            Arg::new("keep-going")
                .long("keep-going")
                .help("Continue with the remaining files when one of them fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Allow overwriting existing files in the output directory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Preview the generated chunks without writing files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .help("Audio files to split (mp3, flac, wav, ogg)")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
}
