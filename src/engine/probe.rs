// Input probing using ffprobe

use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::error::{PlayfitError, Result};

/// Properties of the primary video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFacts {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// Properties of one audio stream. Vec position = source stream index order.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFacts {
    pub codec: String,
}

/// Everything the decision engine needs to know about a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFacts {
    pub container: String,
    pub video: VideoFacts,
    pub audio: Vec<AudioFacts>,
}

/// Probe a source file: container from the extension, stream records from
/// ffprobe in CSV form (one stream per line, fields comma-separated, in
/// stream-index order).
pub fn probe_stream_facts(path: &Path) -> Result<StreamFacts> {
    let container = container_of(path)?;

    let video_csv = run_ffprobe(
        path,
        "v:0",
        "stream=codec_name,width,height,r_frame_rate",
    )?;
    let video = parse_video_record(&video_csv)?;

    let audio_csv = run_ffprobe(path, "a", "stream=codec_name")?;
    let audio = parse_audio_records(&audio_csv);

    Ok(StreamFacts {
        container,
        video,
        audio,
    })
}

/// Lowercased file extension, the container as far as playback devices care.
pub fn container_of(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| PlayfitError::ProbeParse {
            message: format!("{} has no container extension", path.display()),
        })
}

fn run_ffprobe(path: &Path, streams: &str, entries: &str) -> Result<String> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            streams,
            "-show_entries",
            entries,
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()?;

    if !output.status.success() {
        return Err(PlayfitError::ProbeParse {
            message: format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the single-line video record `codec,width,height,frame_rate`.
/// A file with no video stream produces no record, which is fatal here.
pub fn parse_video_record(csv: &str) -> Result<VideoFacts> {
    let line = csv
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| PlayfitError::ProbeParse {
            message: "no video stream record in ffprobe output".to_string(),
        })?;

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 4 {
        return Err(PlayfitError::ProbeParse {
            message: format!("malformed video record: {:?}", line),
        });
    }

    let codec = fields[0].trim().to_lowercase();
    let width = parse_dimension(fields[1], "width")?;
    let height = parse_dimension(fields[2], "height")?;
    let frame_rate = parse_fraction(fields[3]).ok_or_else(|| PlayfitError::ProbeParse {
        message: format!("unparsable frame rate: {:?}", fields[3]),
    })?;

    if codec.is_empty() {
        return Err(PlayfitError::ProbeParse {
            message: format!("missing video codec in record: {:?}", line),
        });
    }
    if frame_rate <= 0.0 {
        return Err(PlayfitError::ProbeParse {
            message: format!("non-positive frame rate: {:?}", fields[3]),
        });
    }

    Ok(VideoFacts {
        codec,
        width,
        height,
        frame_rate,
    })
}

/// Parse audio records, one codec name per line. No audio streams is fine.
pub fn parse_audio_records(csv: &str) -> Vec<AudioFacts> {
    csv.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| AudioFacts {
            // Tolerate trailing commas ffprobe emits for empty optional fields
            codec: line.split(',').next().unwrap_or("").trim().to_lowercase(),
        })
        .filter(|a| !a.codec.is_empty())
        .collect()
}

fn parse_dimension(field: &str, name: &str) -> Result<u32> {
    let value: u32 = field
        .trim()
        .parse()
        .map_err(|_| PlayfitError::ProbeParse {
            message: format!("unparsable {}: {:?}", name, field),
        })?;
    if value == 0 {
        return Err(PlayfitError::ProbeParse {
            message: format!("{} must be positive", name),
        });
    }
    Ok(value)
}

/// Parse a fraction string like "30000/1001" (or a bare "25") to f64
pub fn parse_fraction(s: &str) -> Option<f64> {
    let s = s.trim();
    match s.split_once('/') {
        Some((num, den)) => {
            let numerator: f64 = num.parse().ok()?;
            let denominator: f64 = den.parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            Some(numerator / denominator)
        }
        None => s.parse().ok(),
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

/// Probe a video file to get its duration in seconds. Used only for
/// progress percentages, so callers treat failure as "unknown".
pub fn probe_duration(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_ffprobe_duration(&String::from_utf8_lossy(&output.stdout)).ok()
}

/// Parse duration from ffprobe JSON string (for testing)
pub fn parse_ffprobe_duration(json: &str) -> Result<f64> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| PlayfitError::ProbeParse {
            message: format!("ffprobe JSON: {}", e),
        })?;

    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| PlayfitError::ProbeParse {
            message: "no duration in ffprobe output".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("30/1"), Some(30.0));
        assert_eq!(parse_fraction("25"), Some(25.0));
        assert_eq!(parse_fraction("invalid"), None);
        assert_eq!(parse_fraction("30/0"), None);

        let ntsc = parse_fraction("30000/1001").unwrap();
        assert!(
            (ntsc - 29.970029970029973).abs() < 1e-10,
            "Expected ~29.97, got {}",
            ntsc
        );
    }

    #[test]
    fn test_parse_video_record() {
        let facts = parse_video_record("h264,1920,1080,25/1\n").unwrap();
        assert_eq!(facts.codec, "h264");
        assert_eq!(facts.width, 1920);
        assert_eq!(facts.height, 1080);
        assert_eq!(facts.frame_rate, 25.0);
    }

    #[test]
    fn test_parse_video_record_uppercase_codec_is_normalized() {
        let facts = parse_video_record("MPEG4,640,480,30000/1001").unwrap();
        assert_eq!(facts.codec, "mpeg4");
    }

    #[test]
    fn test_parse_video_record_rejects_garbage() {
        assert!(parse_video_record("").is_err());
        assert!(parse_video_record("h264,1920,1080").is_err());
        assert!(parse_video_record("h264,wide,1080,25/1").is_err());
        assert!(parse_video_record("h264,0,1080,25/1").is_err());
        assert!(parse_video_record("h264,1920,1080,0/1").is_err());
    }

    #[test]
    fn test_parse_audio_records_keeps_stream_order() {
        let audio = parse_audio_records("ac3\ndts\naac\n");
        let codecs: Vec<&str> = audio.iter().map(|a| a.codec.as_str()).collect();
        assert_eq!(codecs, vec!["ac3", "dts", "aac"]);
    }

    #[test]
    fn test_parse_audio_records_empty_input() {
        assert!(parse_audio_records("").is_empty());
        assert!(parse_audio_records("\n\n").is_empty());
    }

    #[test]
    fn test_parse_audio_records_trailing_comma() {
        let audio = parse_audio_records("aac,\n");
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].codec, "aac");
    }

    #[test]
    fn test_container_of() {
        use std::path::Path;
        assert_eq!(container_of(Path::new("a/movie.MKV")).unwrap(), "mkv");
        assert_eq!(container_of(Path::new("clip.mp4")).unwrap(), "mp4");
        assert!(container_of(Path::new("noext")).is_err());
    }

    #[test]
    fn test_parse_ffprobe_duration() {
        let json = r#"{
            "format": {
                "filename": "test.mp4",
                "duration": "123.456",
                "size": "1024000"
            }
        }"#;

        let duration = parse_ffprobe_duration(json).expect("Failed to parse duration");
        assert_eq!(duration, 123.456);
    }

    #[test]
    fn test_parse_ffprobe_duration_missing() {
        assert!(parse_ffprobe_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_ffprobe_duration("not json").is_err());
    }
}
