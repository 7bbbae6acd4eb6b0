use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};

use crate::chunk::DEFAULT_CHUNK_MB;
use crate::report::Reporter;

/// Flags shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Quiet mode (no progress messages)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose diagnostics (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.quiet)
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Install the stderr logger. Calling it twice is harmless.
    pub fn init_logging(&self) {
        let _ = env_logger::Builder::new()
            .filter_level(self.log_level())
            .format_timestamp(None)
            .try_init();
    }
}

#[derive(Parser, Debug)]
#[command(name = "chunker")]
#[command(version)]
#[command(about = "Split a file into fixed-size chunks or merge them back", long_about = None)]
#[command(after_help = "Examples:\n  \
  chunker split big.iso --size 100     write big.iso.part001, big.iso.part002, ...\n  \
  chunker merge big.iso                join big.iso.part* into big.iso.merged\n  \
  chunker merge big.iso -o copy.iso    join the parts into copy.iso")]
pub struct ChunkerCli {
    #[command(subcommand)]
    pub command: Option<ChunkerCommand>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ChunkerCommand {
    /// Split a file into numbered chunks
    Split {
        /// File to split
        #[arg(value_name = "FILE")]
        file: String,

        /// Chunk size in MiB
        #[arg(short = 's', long, value_name = "MB", default_value_t = DEFAULT_CHUNK_MB,
              value_parser = clap::value_parser!(u64).range(1..))]
        size: u64,
    },
    /// Merge chunks named <PREFIX>.partNNN back into one file
    Merge {
        /// Original file name the chunks were split from
        #[arg(value_name = "PREFIX")]
        prefix: String,

        /// Output file (default: <PREFIX>.merged)
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<String>,
    },
}

impl ChunkerCommand {
    /// Where `merge` writes when no `--output` is given.
    pub fn default_merge_output(prefix: &str) -> PathBuf {
        PathBuf::from(format!("{prefix}.merged"))
    }
}

#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(version)]
#[command(about = "Compress a file or directory into a ZIP archive, or extract one", long_about = None)]
#[command(after_help = "Examples:\n  \
  archiver zip photos/                 write photos.zip\n  \
  archiver zip notes.txt -o n.zip      archive a single file as n.zip\n  \
  archiver unzip photos.zip -o restore extract everything under restore/")]
pub struct ArchiverCli {
    #[command(subcommand)]
    pub command: Option<ArchiverCommand>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ArchiverCommand {
    /// Compress a file or directory into a ZIP archive
    Zip {
        /// File or directory to compress
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Archive to write (default: <SOURCE>.zip)
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<String>,
    },
    /// Extract a ZIP archive
    Unzip {
        /// Archive to extract
        #[arg(value_name = "ZIPFILE")]
        zipfile: String,

        /// Destination directory
        #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
        output: String,
    },
}

impl ArchiverCommand {
    /// Where `zip` writes when no `--output` is given: the source path
    /// without trailing separators, plus `.zip`.
    pub fn default_zip_output(source: &str) -> PathBuf {
        let trimmed = source.trim_end_matches(std::path::is_separator);
        let base = if trimmed.is_empty() { source } else { trimmed };
        let mut name = Path::new(base).as_os_str().to_owned();
        name.push(".zip");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_defaults_to_forty_mib() {
        let cli = ChunkerCli::try_parse_from(["chunker", "split", "big.bin"]).unwrap();
        assert_eq!(
            cli.command,
            Some(ChunkerCommand::Split {
                file: "big.bin".into(),
                size: 40
            })
        );
        assert!(!cli.global.is_quiet());
    }

    #[test]
    fn split_rejects_zero_size() {
        assert!(ChunkerCli::try_parse_from(["chunker", "split", "f", "--size", "0"]).is_err());
        assert!(ChunkerCli::try_parse_from(["chunker", "split", "f", "--size", "-3"]).is_err());
    }

    #[test]
    fn no_subcommand_parses_to_none() {
        let cli = ChunkerCli::try_parse_from(["chunker"]).unwrap();
        assert!(cli.command.is_none());
        let cli = ArchiverCli::try_parse_from(["archiver", "-q"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.global.quiet);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = ChunkerCli::try_parse_from(["chunker", "merge", "big.bin", "-q", "-vv"]).unwrap();
        assert!(cli.global.quiet);
        assert_eq!(cli.global.log_level(), LevelFilter::Debug);
        assert_eq!(
            cli.command,
            Some(ChunkerCommand::Merge {
                prefix: "big.bin".into(),
                output: None
            })
        );
    }

    #[test]
    fn unzip_defaults_to_current_directory() {
        let cli = ArchiverCli::try_parse_from(["archiver", "unzip", "a.zip"]).unwrap();
        assert_eq!(
            cli.command,
            Some(ArchiverCommand::Unzip {
                zipfile: "a.zip".into(),
                output: ".".into()
            })
        );
    }

    #[test]
    fn default_outputs() {
        assert_eq!(
            ChunkerCommand::default_merge_output("video.mp4"),
            PathBuf::from("video.mp4.merged")
        );
        assert_eq!(
            ArchiverCommand::default_zip_output("photos/"),
            PathBuf::from("photos.zip")
        );
        assert_eq!(
            ArchiverCommand::default_zip_output("notes.txt"),
            PathBuf::from("notes.txt.zip")
        );
        assert_eq!(
            ArchiverCommand::default_zip_output("a/b//"),
            PathBuf::from("a/b.zip")
        );
    }

    #[test]
    fn verbosity_levels() {
        let mut args = GlobalArgs::default();
        assert_eq!(args.log_level(), LevelFilter::Warn);
        args.verbose = 1;
        assert_eq!(args.log_level(), LevelFilter::Info);
        args.verbose = 7;
        assert_eq!(args.log_level(), LevelFilter::Trace);
    }
}
