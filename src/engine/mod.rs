pub mod bitrate;
pub mod encode;
pub mod plan;
pub mod policy;
pub mod probe;
pub mod tools;

pub use bitrate::average_bitrate;
pub use encode::{EncodeState, Executor, Progress};
pub use plan::{EncodePlan, RunId, VideoStep, build_plan};
pub use policy::{Decision, DecisionReport};
pub use probe::{AudioFacts, StreamFacts, VideoFacts, probe_duration, probe_stream_facts};
pub use tools::{ffmpeg_version, ffprobe_version, require_tools};
