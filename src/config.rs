// Playback-device policy configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use crate::error::{PlayfitError, Result};

/// Immutable description of what the target device plays natively and what
/// to fall back to when it doesn't. Built once at startup from defaults,
/// the optional config file, and `PLAYFIT_*` environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    /// Container extensions the device plays without remuxing
    #[serde(default = "default_containers")]
    pub supported_containers: BTreeSet<String>,

    /// Video codecs the device decodes in hardware
    #[serde(default = "default_video_codecs")]
    pub supported_video_codecs: BTreeSet<String>,

    /// Audio codecs the device decodes
    #[serde(default = "default_audio_codecs")]
    pub supported_audio_codecs: BTreeSet<String>,

    /// Longest edge the device accepts, in pixels
    #[serde(default = "default_max_resolution")]
    pub max_resolution: u32,

    /// Target video codec when the source one is unsupported
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Target audio codec when a stream's codec is unsupported
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Target container when the source one is unsupported
    #[serde(default = "default_container")]
    pub container: String,

    /// Bits per pixel per frame used to derive the target video bitrate
    #[serde(default = "default_bits_per_pixel")]
    pub bits_per_pixel: f64,

    /// Encode passes when video is re-encoded (1 or 2)
    #[serde(default = "default_passes")]
    pub passes: u32,

    /// Additional ffmpeg arguments appended to the final pass, shell-style
    #[serde(default)]
    pub extra_args: String,
}

fn default_containers() -> BTreeSet<String> {
    ["avi", "mkv"].iter().map(|s| s.to_string()).collect()
}

fn default_video_codecs() -> BTreeSet<String> {
    ["h264", "hevc", "mpeg4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_audio_codecs() -> BTreeSet<String> {
    ["mp3", "ac3", "aac"].iter().map(|s| s.to_string()).collect()
}

fn default_max_resolution() -> u32 {
    1920
}

fn default_video_codec() -> String {
    "h264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_container() -> String {
    "mkv".to_string()
}

fn default_bits_per_pixel() -> f64 {
    0.1
}

fn default_passes() -> u32 {
    2
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            supported_containers: default_containers(),
            supported_video_codecs: default_video_codecs(),
            supported_audio_codecs: default_audio_codecs(),
            max_resolution: default_max_resolution(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            container: default_container(),
            bits_per_pixel: default_bits_per_pixel(),
            passes: default_passes(),
            extra_args: String::new(),
        }
    }
}

/// Environment variable names, one per overridable field. List-valued
/// variables take comma-separated tokens.
const ENV_SUPPORTED_CONTAINERS: &str = "PLAYFIT_SUPPORTED_CONTAINERS";
const ENV_SUPPORTED_VIDEO_CODECS: &str = "PLAYFIT_SUPPORTED_VIDEO_CODECS";
const ENV_SUPPORTED_AUDIO_CODECS: &str = "PLAYFIT_SUPPORTED_AUDIO_CODECS";
const ENV_MAX_RESOLUTION: &str = "PLAYFIT_MAX_RESOLUTION";
const ENV_VIDEO_CODEC: &str = "PLAYFIT_VIDEO_CODEC";
const ENV_AUDIO_CODEC: &str = "PLAYFIT_AUDIO_CODEC";
const ENV_CONTAINER: &str = "PLAYFIT_CONTAINER";
const ENV_BITS_PER_PIXEL: &str = "PLAYFIT_BITS_PER_PIXEL";
const ENV_PASSES: &str = "PLAYFIT_PASSES";
const ENV_EXTRA_ARGS: &str = "PLAYFIT_EXTRA_ARGS";

impl Policy {
    /// Get the path to the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("playfit").join("config.toml"))
    }

    /// Load the effective policy: defaults, then the config file if present,
    /// then environment overrides. Validates before returning.
    pub fn load() -> Result<Self> {
        let mut policy = match Self::config_path() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(&path)?;
                toml::from_str(&contents).map_err(|e| PlayfitError::InvalidConfig {
                    message: format!("{}: {}", path.display(), e),
                })?
            }
            _ => Policy::default(),
        };

        policy.apply_env_overrides(|name| std::env::var(name).ok())?;
        policy.normalize();
        policy.validate()?;
        Ok(policy)
    }

    /// Write the default config file if it doesn't exist yet. Returns its path.
    pub fn ensure_default_file() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| PlayfitError::InvalidConfig {
            message: "could not determine config directory".to_string(),
        })?;

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let contents = toml::to_string_pretty(&Policy::default()).map_err(|e| {
                PlayfitError::InvalidConfig {
                    message: format!("could not serialize default config: {}", e),
                }
            })?;
            fs::write(&path, contents)?;
        }

        Ok(path)
    }

    /// Apply `PLAYFIT_*` overrides. The lookup is injected so tests don't
    /// touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get(ENV_SUPPORTED_CONTAINERS) {
            self.supported_containers = parse_token_list(ENV_SUPPORTED_CONTAINERS, &v)?;
        }
        if let Some(v) = get(ENV_SUPPORTED_VIDEO_CODECS) {
            self.supported_video_codecs = parse_token_list(ENV_SUPPORTED_VIDEO_CODECS, &v)?;
        }
        if let Some(v) = get(ENV_SUPPORTED_AUDIO_CODECS) {
            self.supported_audio_codecs = parse_token_list(ENV_SUPPORTED_AUDIO_CODECS, &v)?;
        }
        if let Some(v) = get(ENV_MAX_RESOLUTION) {
            self.max_resolution = parse_number(ENV_MAX_RESOLUTION, &v)?;
        }
        if let Some(v) = get(ENV_VIDEO_CODEC) {
            self.video_codec = v;
        }
        if let Some(v) = get(ENV_AUDIO_CODEC) {
            self.audio_codec = v;
        }
        if let Some(v) = get(ENV_CONTAINER) {
            self.container = v;
        }
        if let Some(v) = get(ENV_BITS_PER_PIXEL) {
            self.bits_per_pixel = parse_number(ENV_BITS_PER_PIXEL, &v)?;
        }
        if let Some(v) = get(ENV_PASSES) {
            self.passes = parse_number(ENV_PASSES, &v)?;
        }
        if let Some(v) = get(ENV_EXTRA_ARGS) {
            self.extra_args = v;
        }
        Ok(())
    }

    /// Lowercase and trim every token so membership checks are exact.
    pub fn normalize(&mut self) {
        self.supported_containers = normalize_set(&self.supported_containers);
        self.supported_video_codecs = normalize_set(&self.supported_video_codecs);
        self.supported_audio_codecs = normalize_set(&self.supported_audio_codecs);
        self.video_codec = self.video_codec.trim().to_lowercase();
        self.audio_codec = self.audio_codec.trim().to_lowercase();
        self.container = self.container.trim().to_lowercase();
    }

    pub fn validate(&self) -> Result<()> {
        if self.supported_containers.is_empty() {
            return Err(invalid("supported_containers must not be empty"));
        }
        if self.supported_video_codecs.is_empty() {
            return Err(invalid("supported_video_codecs must not be empty"));
        }
        if self.supported_audio_codecs.is_empty() {
            return Err(invalid("supported_audio_codecs must not be empty"));
        }
        if self.max_resolution == 0 {
            return Err(invalid("max_resolution must be positive"));
        }
        if !(self.bits_per_pixel.is_finite() && self.bits_per_pixel > 0.0) {
            return Err(invalid("bits_per_pixel must be a positive number"));
        }
        if !(self.passes == 1 || self.passes == 2) {
            return Err(invalid("passes must be 1 or 2"));
        }
        if self.video_codec.is_empty() || self.audio_codec.is_empty() || self.container.is_empty() {
            return Err(invalid("preferred codec and container names must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> PlayfitError {
    PlayfitError::InvalidConfig {
        message: message.to_string(),
    }
}

fn normalize_set(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_token_list(name: &str, value: &str) -> Result<BTreeSet<String>> {
    let tokens: BTreeSet<String> = value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(PlayfitError::InvalidConfig {
            message: format!("{} must contain at least one token", name),
        });
    }
    Ok(tokens)
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PlayfitError::InvalidConfig {
            message: format!("{} has invalid value {:?}", name, value),
        })
}
