// Compatibility decisions: copy what the device plays, convert the rest

use std::fmt;

use crate::config::Policy;
use crate::engine::probe::StreamFacts;

/// Outcome for one property of the source file. `Convert` carries the
/// target: a codec name, a `"W:H"` scale spec, or a container name,
/// depending on what was decided about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Copy,
    Convert(String),
}

impl Decision {
    pub fn is_copy(&self) -> bool {
        matches!(self, Decision::Copy)
    }

    /// The conversion target, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Decision::Copy => None,
            Decision::Convert(value) => Some(value),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Copy => write!(f, "copy"),
            Decision::Convert(value) => write!(f, "convert -> {}", value),
        }
    }
}

impl Policy {
    pub fn decide_container(&self, ext: &str) -> Decision {
        if self.supported_containers.contains(ext) {
            Decision::Copy
        } else {
            Decision::Convert(self.container.clone())
        }
    }

    pub fn decide_video_codec(&self, codec: &str) -> Decision {
        if self.supported_video_codecs.contains(codec) {
            Decision::Copy
        } else {
            Decision::Convert(self.video_codec.clone())
        }
    }

    pub fn decide_audio_codec(&self, codec: &str) -> Decision {
        if self.supported_audio_codecs.contains(codec) {
            Decision::Copy
        } else {
            Decision::Convert(self.audio_codec.clone())
        }
    }

    /// Compare the larger source dimension against the device limit and
    /// emit an aspect-preserving scale spec when it's over. The encoder
    /// computes the free dimension (`-1`). A square frame counts as
    /// width-constrained.
    pub fn decide_resolution(&self, width: u32, height: u32) -> Decision {
        let larger = width.max(height);
        if larger <= self.max_resolution {
            Decision::Copy
        } else if width >= height {
            Decision::Convert(format!("{}:-1", self.max_resolution))
        } else {
            Decision::Convert(format!("-1:{}", self.max_resolution))
        }
    }
}

/// Per-property decisions for one source file. Audio entries are
/// index-aligned with the probed audio streams.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionReport {
    pub container: Decision,
    pub resolution: Decision,
    pub video: Decision,
    pub audio: Vec<Decision>,
}

impl DecisionReport {
    /// Build the report by deciding each property independently.
    pub fn build(policy: &Policy, facts: &StreamFacts) -> Self {
        Self {
            container: policy.decide_container(&facts.container),
            resolution: policy.decide_resolution(facts.video.width, facts.video.height),
            video: policy.decide_video_codec(&facts.video.codec),
            audio: facts
                .audio
                .iter()
                .map(|stream| policy.decide_audio_codec(&stream.codec))
                .collect(),
        }
    }

    /// True when every stream and the container can be passed through
    /// untouched, i.e. the device will direct-play the file as-is.
    pub fn is_direct_play(&self) -> bool {
        self.container.is_copy()
            && self.resolution.is_copy()
            && self.video.is_copy()
            && self.audio.iter().all(Decision::is_copy)
    }
}

impl fmt::Display for DecisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "container:  {}", self.container)?;
        writeln!(f, "resolution: {}", self.resolution)?;
        writeln!(f, "video:      {}", self.video)?;
        for (index, decision) in self.audio.iter().enumerate() {
            writeln!(f, "audio #{}:   {}", index, decision)?;
        }
        Ok(())
    }
}
