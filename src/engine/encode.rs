// ffmpeg command construction and pass sequencing

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use crate::engine::plan::{EncodePlan, VideoStep};
use crate::error::{PlayfitError, Result};

/// Where the executor is in the pass sequence. `FirstPass` only exists for
/// two-pass plans; single-pass runs go straight to `SecondPass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    Idle,
    FirstPass,
    SecondPass,
    Done,
    Failed,
}

/// Runs an encode plan against ffmpeg, one blocking subprocess per pass.
/// Pass-log artifacts are removed after any two-pass sequence, whether or
/// not either pass succeeded.
pub struct Executor {
    program: String,
    extra_args: String,
    state: EncodeState,
}

fn null_output_target() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

impl Executor {
    pub fn new(extra_args: impl Into<String>) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            extra_args: extra_args.into(),
            state: EncodeState::Idle,
        }
    }

    /// Point the executor at a specific encoder binary instead of the
    /// `ffmpeg` found on PATH.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn state(&self) -> EncodeState {
        self.state
    }

    /// First pass: video only, stats to the pass log, output discarded.
    fn build_first_pass_cmd(&self, source: &Path, plan: &EncodePlan) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i").arg(source);
        cmd.arg("-progress").arg("-").arg("-nostats");

        cmd.arg("-map").arg("0:v:0");
        self.apply_video_args(&mut cmd, plan);
        cmd.arg("-an").arg("-sn");

        if let Some(prefix) = &plan.passlog_prefix {
            cmd.arg("-pass").arg("1");
            cmd.arg("-passlogfile").arg(prefix);
        }

        // The null sink always "exists"; -y only ever applies to it here
        cmd.arg("-y");
        cmd.arg("-f").arg("null");
        cmd.arg(null_output_target());
        cmd
    }

    /// Final (or only) pass: all streams mapped, destination written.
    /// Subtitles ride along as-is; no -y, the destination must not exist.
    fn build_final_pass_cmd(&self, source: &Path, dest: &Path, plan: &EncodePlan) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-i").arg(source);
        cmd.arg("-progress").arg("-").arg("-nostats");

        cmd.arg("-map").arg("0:v:0");
        cmd.arg("-map").arg("0:a?");
        cmd.arg("-map").arg("0:s?");

        self.apply_video_args(&mut cmd, plan);

        if plan.is_two_pass() {
            if let Some(prefix) = &plan.passlog_prefix {
                cmd.arg("-pass").arg("2");
                cmd.arg("-passlogfile").arg(prefix);
            }
        }

        cmd.arg("-c:a").arg("copy");
        for (index, codec) in &plan.audio_overrides {
            cmd.arg(format!("-c:a:{}", index)).arg(codec);
        }
        cmd.arg("-c:s").arg("copy");

        self.apply_extra_args(&mut cmd);

        cmd.arg(dest);
        cmd
    }

    fn apply_video_args(&self, cmd: &mut Command, plan: &EncodePlan) {
        match &plan.video {
            VideoStep::Copy => {
                cmd.arg("-c:v").arg("copy");
            }
            VideoStep::Encode {
                codec,
                bitrate,
                scale,
            } => {
                cmd.arg("-c:v").arg(codec);
                cmd.arg("-b:v").arg(bitrate);
                if let Some(spec) = scale {
                    cmd.arg("-vf").arg(format!("scale={}", spec));
                }
            }
        }
    }

    /// Apply additional user-provided ffmpeg arguments to the command.
    /// Uses shell-style parsing so quoted strings with spaces are preserved.
    fn apply_extra_args(&self, cmd: &mut Command) {
        if self.extra_args.is_empty() {
            return;
        }

        if let Some(args) = shlex::split(&self.extra_args) {
            for arg in args {
                cmd.arg(arg);
            }
        } else {
            // Unbalanced quotes; fall back to whitespace splitting
            for arg in self.extra_args.split_whitespace() {
                cmd.arg(arg);
            }
        }
    }

    /// The command sequence this plan runs: first pass only for two-pass plans.
    pub fn build_commands(&self, source: &Path, dest: &Path, plan: &EncodePlan) -> Vec<Command> {
        let mut cmds = Vec::new();
        if plan.is_two_pass() {
            cmds.push(self.build_first_pass_cmd(source, plan));
        }
        cmds.push(self.build_final_pass_cmd(source, dest, plan));
        cmds
    }

    /// Render the exact command line(s) for dry mode, shell-quoted, joined
    /// the way they would be chained.
    pub fn render(&self, source: &Path, dest: &Path, plan: &EncodePlan) -> String {
        self.build_commands(source, dest, plan)
            .iter()
            .map(format_cmd)
            .collect::<Vec<_>>()
            .join(" \\\n&& ")
    }

    /// Execute the plan. Blocks through each pass in order; a first-pass
    /// failure means the second pass never starts. The ffmpeg exit status
    /// propagates verbatim inside `EncodeFailed`.
    pub fn run(
        &mut self,
        source: &Path,
        dest: &Path,
        plan: &EncodePlan,
        duration: Option<f64>,
    ) -> Result<()> {
        if plan.is_two_pass() {
            if let Some(prefix) = &plan.passlog_prefix {
                if let Some(parent) = prefix.parent() {
                    fs::create_dir_all(parent)?;
                }
            }

            self.state = EncodeState::FirstPass;
            info!(source = %source.display(), "starting analysis pass");
            let first = self.run_pass(self.build_first_pass_cmd(source, plan), duration);
            if let Err(err) = first {
                cleanup_passlog(plan);
                self.state = EncodeState::Failed;
                return Err(err);
            }
        }

        self.state = EncodeState::SecondPass;
        info!(dest = %dest.display(), "writing destination");
        let result = self.run_pass(self.build_final_pass_cmd(source, dest, plan), duration);

        if plan.is_two_pass() {
            cleanup_passlog(plan);
        }

        match result {
            Ok(()) => {
                self.state = EncodeState::Done;
                Ok(())
            }
            Err(err) => {
                self.state = EncodeState::Failed;
                Err(err)
            }
        }
    }

    fn run_pass(&self, mut cmd: Command, duration: Option<f64>) -> Result<()> {
        debug!(command = %format_cmd(&cmd), "spawning encoder");

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        let stderr = child.stderr.take();
        let stderr_thread = std::thread::spawn(move || {
            let mut output = String::new();
            if let Some(stderr) = stderr {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    output.push_str(&line);
                    output.push('\n');
                }
            }
            output
        });

        if let Some(stdout) = child.stdout.take() {
            let mut progress = Progress::default();
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                progress.parse_line(&line);
                if line.starts_with("progress=") {
                    debug!(
                        out_time_s = progress.out_time_s(),
                        pct = progress.percent(duration),
                        speed = progress.speed,
                        "encode progress"
                    );
                }
            }
        }

        let status = child.wait()?;
        let stderr_output = stderr_thread.join().unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            let tail: Vec<&str> = stderr_output.lines().rev().take(10).collect();
            let tail = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
            error!(status = %status, "encoder failed:\n{}", tail);
            Err(PlayfitError::EncodeFailed {
                code: status.code().unwrap_or(1),
            })
        }
    }
}

/// Remove the pass-log artifacts, best effort. Runs after both successful
/// and failed two-pass sequences.
fn cleanup_passlog(plan: &EncodePlan) {
    if let Some(prefix) = &plan.passlog_prefix {
        if let Some(dir) = prefix.parent() {
            fs::remove_dir_all(dir).ok();
        }
    }
}

fn format_cmd(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|arg| {
        let s = arg.to_string_lossy();
        if s.contains(' ') {
            format!("\"{}\"", s)
        } else {
            s.to_string()
        }
    }));
    parts.join(" ")
}

/// Parser for ffmpeg `-progress -` output (key=value lines)
#[derive(Debug, Default, Clone)]
pub struct Progress {
    pub out_time_us: u64,
    pub speed: Option<f64>,
    pub is_complete: bool,
}

impl Progress {
    /// Parse a single line of ffmpeg progress output
    pub fn parse_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "out_time_us" => {
                    if let Ok(us) = value.trim().parse::<u64>() {
                        self.out_time_us = us;
                    }
                }
                "speed" => {
                    // Speed is in format "1.23x", strip the 'x'
                    if let Ok(s) = value.trim().trim_end_matches('x').parse::<f64>() {
                        self.speed = Some(s);
                    }
                }
                "progress" => {
                    if value.trim() == "end" {
                        self.is_complete = true;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn out_time_s(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Percent complete, when the source duration is known
    pub fn percent(&self, duration_s: Option<f64>) -> f64 {
        match duration_s {
            Some(dur) if dur > 0.0 => (self.out_time_s() / dur * 100.0).min(100.0),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::EncodePlan;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn copy_plan() -> EncodePlan {
        EncodePlan {
            video: VideoStep::Copy,
            passes: 1,
            audio_overrides: BTreeMap::new(),
            passlog_prefix: None,
        }
    }

    fn encode_plan(two_pass: bool) -> EncodePlan {
        EncodePlan {
            video: VideoStep::Encode {
                codec: "h264".to_string(),
                bitrate: "5184k".to_string(),
                scale: Some("1920:-1".to_string()),
            },
            passes: if two_pass { 2 } else { 1 },
            audio_overrides: BTreeMap::from([(1, "aac".to_string())]),
            passlog_prefix: two_pass.then(|| PathBuf::from("/tmp/playfit_2pass/x/ffmpeg2pass")),
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_copy_plan_is_single_command() {
        let exec = Executor::new("");
        let cmds = exec.build_commands(
            Path::new("/media/in.mkv"),
            Path::new("/media/out.mkv"),
            &copy_plan(),
        );
        assert_eq!(cmds.len(), 1);

        let joined = args_of(&cmds[0]).join(" ");
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-c:a copy"));
        assert!(joined.contains("-c:s copy"));
        assert!(joined.contains("-map 0:v:0"));
        assert!(joined.contains("-map 0:a?"));
        assert!(joined.contains("-map 0:s?"));
        assert!(!joined.contains("-pass"));
        assert!(!joined.contains("-b:v"));
        assert!(!joined.contains(" -y "));
    }

    #[test]
    fn test_two_pass_plan_builds_two_commands() {
        let exec = Executor::new("");
        let cmds = exec.build_commands(
            Path::new("/media/in.mp4"),
            Path::new("/media/out.mkv"),
            &encode_plan(true),
        );
        assert_eq!(cmds.len(), 2);

        let first = args_of(&cmds[0]).join(" ");
        assert!(first.contains("-pass 1"));
        assert!(first.contains("-passlogfile /tmp/playfit_2pass/x/ffmpeg2pass"));
        assert!(first.contains("-an -sn"));
        assert!(first.contains("-f null"));
        assert!(first.contains("-map 0:v:0"));
        assert!(!first.contains("-map 0:a?"));
        assert!(!first.contains("-c:a"));

        let second = args_of(&cmds[1]).join(" ");
        assert!(second.contains("-pass 2"));
        assert!(second.contains("-c:v h264"));
        assert!(second.contains("-b:v 5184k"));
        assert!(second.contains("-vf scale=1920:-1"));
        assert!(second.contains("-c:a copy"));
        assert!(second.contains("-c:a:1 aac"));
        assert!(second.contains("-c:s copy"));
        assert!(second.ends_with("/media/out.mkv"));
    }

    #[test]
    fn test_single_pass_encode_has_no_pass_flags() {
        let exec = Executor::new("");
        let cmds = exec.build_commands(
            Path::new("in.mp4"),
            Path::new("out.mkv"),
            &encode_plan(false),
        );
        assert_eq!(cmds.len(), 1);

        let joined = args_of(&cmds[0]).join(" ");
        assert!(!joined.contains("-pass"));
        assert!(joined.contains("-b:v 5184k"));
    }

    #[test]
    fn test_extra_args_are_appended_to_final_pass() {
        let exec = Executor::new("-metadata title=\"My Movie\"");
        let cmds = exec.build_commands(
            Path::new("in.mkv"),
            Path::new("out.mkv"),
            &copy_plan(),
        );
        let args = args_of(&cmds[0]);
        assert!(args.contains(&"-metadata".to_string()));
        assert!(args.contains(&"title=My Movie".to_string()));
    }

    #[test]
    fn test_render_joins_passes_with_shell_continuation() {
        let exec = Executor::new("");
        let rendered = exec.render(
            Path::new("in.mp4"),
            Path::new("out.mkv"),
            &encode_plan(true),
        );
        assert_eq!(rendered.matches("ffmpeg -i").count(), 2);
        assert!(rendered.contains(" \\\n&& "));
    }

    #[test]
    fn test_render_quotes_paths_with_spaces() {
        let exec = Executor::new("");
        let rendered = exec.render(
            Path::new("/media/My Movie.mkv"),
            Path::new("/media/out.mkv"),
            &copy_plan(),
        );
        assert!(rendered.contains("\"/media/My Movie.mkv\""));
    }

    #[test]
    fn test_progress_parser() {
        let mut progress = Progress::default();
        progress.parse_line("out_time_us=5000000");
        assert_eq!(progress.out_time_s(), 5.0);

        progress.parse_line("speed=1.5x");
        assert_eq!(progress.speed, Some(1.5));

        progress.parse_line("progress=continue");
        assert!(!progress.is_complete);
        progress.parse_line("progress=end");
        assert!(progress.is_complete);
    }

    #[test]
    fn test_progress_percent() {
        let mut progress = Progress::default();
        progress.parse_line("out_time_us=5000000");
        assert_eq!(progress.percent(Some(10.0)), 50.0);
        assert_eq!(progress.percent(Some(2.0)), 100.0);
        assert_eq!(progress.percent(None), 0.0);
    }

    #[test]
    fn test_executor_starts_idle() {
        let exec = Executor::new("");
        assert_eq!(exec.state(), EncodeState::Idle);
    }
}
