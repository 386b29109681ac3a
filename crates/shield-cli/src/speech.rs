use async_trait::async_trait;
use shield::voice::{SpeechRecognizer, SpeechSynthesizer, Utterance};
use shield::{ShieldError, ShieldResult};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

fn shell(command_line: &str) -> Command {
    let mut command = Command::new("bash");
    command.arg("-c").arg(command_line).kill_on_drop(true);
    command
}

/// Speaks by piping the text to a shell command such as `espeak` or `say`
///
/// The utterance settings are exported as SHIELD_SPEECH_LANG, SHIELD_SPEECH_RATE and
/// SHIELD_SPEECH_PITCH so the command can pass them on.
pub struct CommandSynthesizer {
    command_line: String,
}

impl CommandSynthesizer {
    pub fn new<S: Into<String>>(command_line: S) -> Self {
        Self {
            command_line: command_line.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, utterance: &Utterance) -> ShieldResult<()> {
        let mut child = shell(&self.command_line)
            .env("SHIELD_SPEECH_LANG", &utterance.lang)
            .env("SHIELD_SPEECH_RATE", utterance.rate.to_string())
            .env("SHIELD_SPEECH_PITCH", utterance.pitch.to_string())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ShieldError::UnsupportedCapability(format!("speech output: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(utterance.text.as_bytes())
                .await
                .map_err(|e| ShieldError::ExecutionError(e.to_string()))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ShieldError::ExecutionError(e.to_string()))?;
        if !status.success() {
            return Err(ShieldError::ExecutionError(format!(
                "speech command exited with {}",
                status
            )));
        }
        Ok(())
    }
}

/// Listens by running a shell command that prints one recognized phrase on stdout
///
/// The requested language is exported as SHIELD_SPEECH_LANG.
pub struct CommandRecognizer {
    command_line: String,
}

impl CommandRecognizer {
    pub fn new<S: Into<String>>(command_line: S) -> Self {
        Self {
            command_line: command_line.into(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self, lang: &str) -> ShieldResult<String> {
        let output = shell(&self.command_line)
            .env("SHIELD_SPEECH_LANG", lang)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| ShieldError::UnsupportedCapability(format!("speech input: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShieldError::ExecutionError(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}
