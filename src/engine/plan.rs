// Turning a decision report into a concrete encode plan

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Policy;
use crate::engine::bitrate::average_bitrate;
use crate::engine::policy::DecisionReport;
use crate::engine::probe::StreamFacts;
use crate::error::Result;

/// Per-invocation token naming the two-pass log artifacts. Concurrent
/// invocations may share a temp directory, so this must be unique across
/// processes; the planner takes it as an input and stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What happens to the video track.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoStep {
    Copy,
    Encode {
        codec: String,
        bitrate: String,
        scale: Option<String>,
    },
}

/// Concrete parameters for one encode invocation. Ephemeral: built, run,
/// discarded; the pass-log artifacts it names die with it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub video: VideoStep,
    pub passes: u32,
    /// Audio stream index -> target codec; absent streams are copied.
    pub audio_overrides: BTreeMap<usize, String>,
    /// Prefix for ffmpeg's `-passlogfile`, present only for two-pass plans.
    pub passlog_prefix: Option<PathBuf>,
}

impl EncodePlan {
    pub fn is_two_pass(&self) -> bool {
        self.passes == 2
    }
}

fn passlog_prefix(run_id: RunId) -> PathBuf {
    std::env::temp_dir()
        .join("playfit_2pass")
        .join(run_id.to_string())
        .join("ffmpeg2pass")
}

/// Build the encode plan for one source file.
///
/// The video track is copied only when container, resolution, and video
/// codec all came back `Copy`; any other combination forces a re-encode,
/// falling back to the policy's preferred codec when the codec itself was
/// fine. Two passes happen only for an actual video re-encode.
pub fn build_plan(
    report: &DecisionReport,
    facts: &StreamFacts,
    policy: &Policy,
    run_id: RunId,
) -> Result<EncodePlan> {
    let reencode_video = !(report.container.is_copy()
        && report.resolution.is_copy()
        && report.video.is_copy());

    let video = if reencode_video {
        let codec = report
            .video
            .target()
            .unwrap_or(&policy.video_codec)
            .to_string();
        let bitrate = average_bitrate(
            facts.video.width,
            facts.video.height,
            facts.video.frame_rate,
            policy.bits_per_pixel,
        )?;
        VideoStep::Encode {
            codec,
            bitrate,
            scale: report.resolution.target().map(String::from),
        }
    } else {
        VideoStep::Copy
    };

    let passes = if reencode_video && policy.passes == 2 {
        2
    } else {
        1
    };

    let audio_overrides = report
        .audio
        .iter()
        .enumerate()
        .filter_map(|(index, decision)| decision.target().map(|t| (index, t.to_string())))
        .collect();

    Ok(EncodePlan {
        video,
        passes,
        audio_overrides,
        passlog_prefix: (passes == 2).then(|| passlog_prefix(run_id)),
    })
}
