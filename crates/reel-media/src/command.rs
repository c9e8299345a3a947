//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Default upper bound on a single FFmpeg invocation.
pub const DEFAULT_FFMPEG_TIMEOUT_SECS: u64 = 600;

/// Diagnostic lines kept for error reporting.
const MAX_DIAGNOSTIC_LINES: usize = 40;

#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order; input arguments precede their `-i`
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                args: Vec::new(),
                path: input.as_ref().to_path_buf(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Append another input (`-i`).
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            args: Vec::new(),
            path: input.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an argument placed before the most recently added input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(last) = self.inputs.last_mut() {
            last.args.push(arg.into());
        }
        self
    }

    /// Add output arguments (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek the most recent input.
    pub fn seek(self, timestamp: impl Into<String>) -> Self {
        self.input_arg("-ss").input_arg(timestamp)
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Stop at the end of the shortest input stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push("error".to_string());
        args.push("-nostats".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with a bounded timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    timeout_secs: u64,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_FFMPEG_TIMEOUT_SECS,
        }
    }

    /// Set timeout. Zero falls back to the default.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = if secs == 0 {
            DEFAULT_FFMPEG_TIMEOUT_SECS
        } else {
            secs
        };
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Run an FFmpeg command, keeping the stderr tail for error reports.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let stderr_handle = tokio::spawn(async move {
            let mut lines = VecDeque::with_capacity(MAX_DIAGNOSTIC_LINES);
            while let Ok(Some(line)) = reader.next_line().await {
                if lines.len() == MAX_DIAGNOSTIC_LINES {
                    lines.pop_front();
                }
                lines.push_back(line);
            }
            lines
        });

        let result = self.wait_for_completion(&mut child).await;
        let diagnostics = stderr_handle.await.unwrap_or_default();

        match result {
            Err(MediaError::FfmpegFailed {
                message, exit_code, ..
            }) => {
                let stderr = Some(Vec::from(diagnostics).join("\n")).filter(|s| !s.is_empty());
                Err(MediaError::ffmpeg_failed(message, stderr, exit_code))
            }
            other => other,
        }
    }

    /// Wait for child process, killing it on timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = match tokio::time::timeout(Duration::from_secs(self.timeout_secs), child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("FFmpeg timed out after {} seconds, killing process", self.timeout_secs);
                let _ = child.kill().await;
                return Err(MediaError::Timeout(self.timeout_secs));
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Quote a path as a filter option value, surrounding quotes included.
///
/// The value passes two unescaping levels: the graph parser strips the
/// quotes, then the option parser consumes `\:` and `\'`. A literal
/// apostrophe therefore has to leave the quoted run to carry its escape.
pub fn quote_filter_path(path: &Path) -> String {
    let option_level = path
        .to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "\\'")
        .replace(':', "\\:");
    format!("'{}'", option_level.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_orders_inputs() {
        let cmd = FfmpegCommand::new("bg.mp4", "out.mp4")
            .seek("00:00:01")
            .add_input("voice.wav")
            .map("[v]")
            .map("1:a")
            .shortest();

        let args = cmd.build_args();
        let bg = args.iter().position(|a| a == "bg.mp4").unwrap();
        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let voice = args.iter().position(|a| a == "voice.wav").unwrap();
        assert!(seek < bg && bg < voice);
        assert_eq!(args.last().unwrap(), "out.mp4");
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"1:a".to_string()));
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        let runner = FfmpegRunner::new().with_timeout(0);
        assert_eq!(runner.timeout_secs(), DEFAULT_FFMPEG_TIMEOUT_SECS);
        assert_eq!(FfmpegRunner::new().with_timeout(5).timeout_secs(), 5);
    }

    /// Undo one `av_get_token` level: quotes delimit literal runs and a
    /// backslash outside them escapes the next character.
    fn unquote_level(value: &str) -> String {
        let mut out = String::new();
        let mut chars = value.chars();
        let mut quoted = false;
        while let Some(c) = chars.next() {
            match c {
                '\'' => quoted = !quoted,
                '\\' if !quoted => out.extend(chars.next()),
                c => out.push(c),
            }
        }
        out
    }

    #[test]
    fn test_quote_filter_path() {
        assert_eq!(
            quote_filter_path(Path::new("C:\\jobs\\a,b.ass")),
            "'C\\:/jobs/a,b.ass'"
        );
        assert_eq!(
            quote_filter_path(Path::new("/tmp/it's.ass")),
            "'/tmp/it\\'\\''s.ass'"
        );
    }

    #[test]
    fn test_quoted_path_survives_both_parse_levels() {
        for raw in ["/tmp/it's.ass", "/srv/a,b;c[d].ass", "/tmp/x:y/''.ass", "plain.ass"] {
            let quoted = quote_filter_path(Path::new(raw));
            assert_eq!(unquote_level(&unquote_level(&quoted)), raw, "{quoted}");
        }
    }
}
