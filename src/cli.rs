use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "playfit")]
#[command(about = "Device compatibility check and transcode driver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report which streams the device can direct-play
    ///
    /// Exits 0 when the file is fully direct-playable, 3 when at least one
    /// stream or the container needs conversion.
    Info {
        /// Path to the source media file
        source: PathBuf,
    },

    /// Convert whatever the device can't play and write the result
    Start {
        /// Path to the source media file
        source: PathBuf,

        /// Destination file, or a directory to derive the filename into
        dest: PathBuf,
    },

    /// Show the ffmpeg command(s) without executing (dry run)
    Dry {
        /// Path to the source media file
        source: PathBuf,

        /// Destination file, or a directory to derive the filename into
        dest: PathBuf,
    },

    /// Check if ffmpeg and ffprobe are installed
    CheckTools,

    /// Show config location, creating the default config file if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
