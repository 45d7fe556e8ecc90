use crate::config::EngineConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use murmur_types::UserVoiceProfile;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for a single synthesis run (4 KiB). Sanitized
/// text is clamped far below this; the bound only guards direct callers.
const MAX_ENGINE_INPUT_BYTES: usize = 4 * 1024;

/// Renders text into a waveform file.
#[async_trait]
pub trait SpeechEngine: Send + Sync + 'static {
    /// Synthesizes `text` with `profile` into `output`, replacing any
    /// previous file there.
    async fn render(
        &self,
        text: &str,
        profile: &UserVoiceProfile,
        output: &Path,
    ) -> Result<(), VoiceError>;
}

/// Runs the `open_jtalk` command-line synthesizer.
///
/// Text is fed on stdin; parameters map to `-a` (alpha), `-r` (speed),
/// `-fm` (pitch), and `-jf` (accent).
#[derive(Debug, Clone)]
pub struct OpenJTalkEngine {
    binary: PathBuf,
    dictionary_dir: PathBuf,
    voice_model: PathBuf,
    timeout: Duration,
}

impl OpenJTalkEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            dictionary_dir: config.dictionary_dir.clone(),
            voice_model: config.voice_model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds.max(1)),
        }
    }

    fn command(&self, profile: &UserVoiceProfile, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-x")
            .arg(&self.dictionary_dir)
            .arg("-m")
            .arg(&self.voice_model)
            .arg("-a")
            .arg(profile.alpha.to_string())
            .arg("-r")
            .arg(profile.speed.to_string())
            .arg("-fm")
            .arg(profile.pitch.to_string())
            .arg("-jf")
            .arg(profile.accent.to_string())
            .arg("-ow")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl SpeechEngine for OpenJTalkEngine {
    async fn render(
        &self,
        text: &str,
        profile: &UserVoiceProfile,
        output: &Path,
    ) -> Result<(), VoiceError> {
        if text.len() > MAX_ENGINE_INPUT_BYTES {
            return Err(VoiceError::Engine(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_ENGINE_INPUT_BYTES
            )));
        }

        // A stale artifact from an earlier utterance must not pass for this
        // run's output.
        match tokio::fs::remove_file(output).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(VoiceError::Engine(format!(
                    "failed to clear previous output {:?}: {}",
                    output, e
                )))
            }
        }

        let mut child = self
            .command(profile, output)
            .spawn()
            .map_err(|e| VoiceError::Engine(format!("failed to spawn open_jtalk: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Engine("failed to open stdin".to_string()))?;

        let mut input = text.to_string();
        input.push('\n');
        // A process that exits without reading stdin closes the pipe; the
        // exit status below reports that failure.
        if let Err(e) = stdin.write_all(input.as_bytes()).await {
            tracing::debug!(error = %e, "open_jtalk closed stdin early");
        }
        drop(stdin);

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Engine(format!(
                    "open_jtalk timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Engine(format!("failed to wait for open_jtalk: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(VoiceError::Engine(format!(
                "open_jtalk exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(VoiceError::Engine(format!(
                "open_jtalk produced no waveform at {:?}",
                output
            ))),
        }
    }
}
