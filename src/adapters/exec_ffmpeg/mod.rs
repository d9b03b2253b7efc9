//! FFmpeg and qaac execution adapter
//!
//! Builds the command lines for the external transcoders and drives them
//! through `tokio::process`. Every child is spawned with `kill_on_drop`, so a
//! dropped handle never leaves a process behind.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;
use crate::utils::time::format_hms_millis;

/// A program and its arguments, kept separate from `Command` so it can be inspected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandLine {
    fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: Vec::new(),
        }
    }

    fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments as lossy strings, for logging and assertions
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }

    fn process_name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    fn spawn_error(&self, e: std::io::Error) -> DomainError {
        if e.kind() == std::io::ErrorKind::NotFound {
            DomainError::process(
                self.process_name(),
                format!("program not found: {}", self.program.display()),
            )
        } else {
            DomainError::process(self.process_name(), format!("failed to start: {}", e))
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Transcoder adapter backed by the ffmpeg and qaac executables
pub struct FfmpegAdapter {
    tools: ToolPaths,
}

impl FfmpegAdapter {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    fn program(&self, encoder: EncoderKind) -> &Path {
        match encoder {
            EncoderKind::Ffmpeg => &self.tools.ffmpeg,
            EncoderKind::Qaac => &self.tools.qaac,
        }
    }

    /// `ffmpeg -v quiet -i SRC -f s16le -ar 44100 -ac 2 -`
    pub fn decoder_command(&self, source: &Path, pcm: &PcmFormat) -> CommandLine {
        let mut cmd = CommandLine::new(&self.tools.ffmpeg);
        cmd.args(["-v", "quiet", "-i"])
            .arg(source)
            .args(["-f", pcm.ffmpeg_sample_format()])
            .arg("-ar")
            .arg(pcm.sample_rate.to_string())
            .arg("-ac")
            .arg(pcm.channels.to_string())
            .arg("-");
        cmd
    }

    /// Whole-source decode to an intermediate WAV file
    pub fn wav_command(&self, source: &Path, wav: &Path) -> CommandLine {
        let mut cmd = CommandLine::new(&self.tools.ffmpeg);
        cmd.args(["-v", "error", "-y", "-i"])
            .arg(source)
            .args(["-vn", "-f", "wav"])
            .arg(wav);
        cmd
    }

    /// Command for an encode job, shaped by its input kind and the profile's encoder
    pub fn encoder_command(&self, job: &EncodeJob<'_>) -> CommandLine {
        let (encoder, profile_args) = match job.input {
            EncodeInput::RawPcm(_) => job.profile.stream_args(),
            EncodeInput::File { .. } => job.profile.file_args(),
        };

        match encoder {
            EncoderKind::Ffmpeg => self.ffmpeg_encoder(job, profile_args),
            EncoderKind::Qaac => self.qaac_encoder(job, profile_args),
        }
    }

    fn ffmpeg_encoder(&self, job: &EncodeJob<'_>, profile_args: Vec<String>) -> CommandLine {
        let mut cmd = CommandLine::new(self.program(EncoderKind::Ffmpeg));
        cmd.args(["-v", "error", "-y"]);

        match &job.input {
            EncodeInput::RawPcm(pcm) => {
                cmd.args(["-f", pcm.ffmpeg_sample_format()])
                    .arg("-ar")
                    .arg(pcm.sample_rate.to_string())
                    .arg("-ac")
                    .arg(pcm.channels.to_string())
                    .args(["-i", "-"]);
            }
            EncodeInput::File { path, seek } => {
                cmd.arg("-i").arg(path);
                match seek {
                    Some(seek) => {
                        cmd.arg("-ss")
                            .arg(&seek.start)
                            .arg("-t")
                            .arg(&seek.duration);
                    }
                    None => {
                        cmd.args(["-map_metadata", "0:g:0"]);
                    }
                }
                cmd.arg("-vn");
            }
        }

        cmd.args(profile_args);

        let style = job.profile.metadata_style;
        for (tag, value) in job.tags {
            cmd.arg("-metadata").arg(format!("{}={}", style.key(*tag), value));
        }
        for (key, value) in job.extra_metadata {
            cmd.arg("-metadata").arg(format!("{}={}", key, value));
        }

        cmd.arg(&job.output);
        cmd
    }

    fn qaac_encoder(&self, job: &EncodeJob<'_>, profile_args: Vec<String>) -> CommandLine {
        let mut cmd = CommandLine::new(self.program(EncoderKind::Qaac));
        cmd.arg("--threading");

        if let EncodeInput::RawPcm(pcm) = &job.input {
            cmd.arg("--raw")
                .arg("--raw-channels")
                .arg(pcm.channels.to_string())
                .arg("--raw-rate")
                .arg(pcm.sample_rate.to_string())
                .arg("--raw-format")
                .arg(format!("S{}L", pcm.bytes_per_sample * 8));
        }

        cmd.args(profile_args);

        if let EncodeInput::File {
            seek: Some(seek), ..
        } = &job.input
        {
            cmd.arg("--start")
                .arg(&seek.start)
                .arg("--end")
                .arg(format_hms_millis(seek.start_ms + seek.duration_ms));
        }

        for (tag, value) in job.tags {
            let flag = match tag {
                MetadataTag::TrackNumber => "--track",
                MetadataTag::Performer => "--artist",
                MetadataTag::Title => "--title",
                MetadataTag::Album => "--album",
                MetadataTag::AlbumPerformer => "--band",
            };
            cmd.arg(flag).arg(value);
        }
        for (key, value) in job.extra_metadata {
            cmd.arg("--long-tag").arg(format!("{}:{}", key, value));
        }

        cmd.arg("-o").arg(&job.output);
        match &job.input {
            EncodeInput::RawPcm(_) => cmd.arg("-"),
            EncodeInput::File { path, .. } => cmd.arg(path),
        };
        cmd
    }

    /// Run a command to completion; a non-zero exit becomes an `ExternalProcess` error
    async fn run_to_completion(&self, cmd: &CommandLine) -> Result<(), DomainError> {
        debug!(command = %cmd, "Running");

        let output = cmd
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| cmd.spawn_error(e))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("").trim();
        Err(DomainError::process(
            cmd.process_name(),
            format!("exited with {}: {}", output.status, detail),
        ))
    }
}

#[async_trait]
impl TranscodePort for FfmpegAdapter {
    async fn spawn_decoder(
        &self,
        source: &Path,
        pcm: &PcmFormat,
    ) -> Result<Box<dyn DecodeStream>, DomainError> {
        let cmd = self.decoder_command(source, pcm);
        debug!(command = %cmd, "Spawning decoder");

        let mut child = cmd
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| cmd.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::process(cmd.process_name(), "decoder stdout not captured"))?;

        Ok(Box::new(ChildDecoder {
            name: cmd.process_name(),
            child,
            stdout,
            status_reported: false,
        }))
    }

    async fn spawn_encoder(&self, job: &EncodeJob<'_>) -> Result<Box<dyn EncodeSink>, DomainError> {
        let cmd = self.encoder_command(job);
        debug!(command = %cmd, "Spawning encoder");

        let mut child = cmd
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| cmd.spawn_error(e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DomainError::process(cmd.process_name(), "encoder stdin not captured"))?;

        Ok(Box::new(ChildEncoder {
            name: cmd.process_name(),
            child,
            stdin: Some(stdin),
        }))
    }

    async fn run(&self, job: &EncodeJob<'_>) -> Result<(), DomainError> {
        let cmd = self.encoder_command(job);
        self.run_to_completion(&cmd).await
    }

    async fn decode_to_wav(&self, source: &Path, wav: &Path) -> Result<(), DomainError> {
        let cmd = self.wav_command(source, wav);
        self.run_to_completion(&cmd).await
    }
}

/// Decoder child with its stdout pipe
struct ChildDecoder {
    name: String,
    child: Child,
    stdout: ChildStdout,
    /// Exit status already surfaced through `read`
    status_reported: bool,
}

impl ChildDecoder {
    fn exit_error(&self, status: ExitStatus) -> DomainError {
        DomainError::process(self.name.clone(), format!("exited with {}", status))
    }
}

#[async_trait]
impl DecodeStream for ChildDecoder {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DomainError> {
        let n = self
            .stdout
            .read(buf)
            .await
            .map_err(|e| DomainError::process(self.name.clone(), format!("read failed: {}", e)))?;
        if n > 0 || buf.is_empty() || self.status_reported {
            return Ok(n);
        }

        // End of stream only counts as success if the decoder exited cleanly
        self.status_reported = true;
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| DomainError::process(self.name.clone(), format!("wait failed: {}", e)))?;
        if status.success() {
            Ok(0)
        } else {
            Err(self.exit_error(status))
        }
    }

    async fn terminate(&mut self) -> Result<(), DomainError> {
        match self.child.try_wait() {
            Ok(Some(status)) if !status.success() && !self.status_reported => {
                self.status_reported = true;
                Err(self.exit_error(status))
            }
            Ok(Some(_)) => Ok(()),
            _ => self
                .child
                .kill()
                .await
                .map_err(|e| DomainError::process(self.name.clone(), format!("kill failed: {}", e))),
        }
    }
}

/// Encoder child with its stdin pipe
struct ChildEncoder {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

#[async_trait]
impl EncodeSink for ChildEncoder {
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), DomainError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DomainError::process(self.name.clone(), "input already closed"))?;
        stdin
            .write_all(buf)
            .await
            .map_err(|e| DomainError::process(self.name.clone(), format!("write failed: {}", e)))
    }

    async fn finish(&mut self, grace: Duration) -> Result<(), DomainError> {
        if let Some(mut stdin) = self.stdin.take() {
            // A broken pipe here means the encoder already exited; its status tells why
            let _ = stdin.shutdown().await;
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(DomainError::process(
                self.name.clone(),
                format!("exited with {}", status),
            )),
            Ok(Err(e)) => Err(DomainError::process(
                self.name.clone(),
                format!("wait failed: {}", e),
            )),
            Err(_) => {
                warn!(
                    process = %self.name,
                    grace_ms = grace.as_millis() as u64,
                    "Encoder still running after its input closed, killing it"
                );
                self.child
                    .kill()
                    .await
                    .map_err(|e| DomainError::process(self.name.clone(), format!("kill failed: {}", e)))
            }
        }
    }
}
