// Failure kinds that own a process exit code

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayfitError {
    #[error("source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    #[error("required tool not found: {tool}")]
    MissingTool { tool: String },

    #[error("could not parse ffprobe output: {message}")]
    ProbeParse { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("ffmpeg exited with status {code}")]
    EncodeFailed { code: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayfitError {
    /// Process exit code for this failure. Encode failures forward ffmpeg's
    /// own exit status verbatim.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlayfitError::SourceNotFound { .. } | PlayfitError::DestinationExists { .. } => 2,
            PlayfitError::MissingTool { .. } => 4,
            PlayfitError::EncodeFailed { code } => *code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayfitError>;
