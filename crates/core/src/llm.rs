use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_OLLAMA_PROGRAM: &str = "ollama";
pub const DEFAULT_OLLAMA_MODEL: &str = "deepseek-r1:7b";

/// Prompt in, raw text out. Output is not expected to be well-formed.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub program: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_OLLAMA_PROGRAM.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout: None,
        }
    }
}

/// Runs `<program> run <model>` per prompt, feeding the prompt on stdin.
#[derive(Debug, Clone, Default)]
pub struct OllamaCli {
    config: OllamaConfig,
}

impl OllamaCli {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }

    async fn run_once(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.config.program)
            .arg("run")
            .arg(&self.config.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| {
                IngestError::LanguageModel(format!(
                    "failed to start {}: {error}",
                    self.config.program
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A model that exits early closes the pipe; its exit status says more.
            if let Err(error) = stdin.write_all(prompt.as_bytes()).await {
                if error.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(error.into());
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(IngestError::LanguageModel(format!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl LanguageModel for OllamaCli {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.config.model, prompt_chars = prompt.len(), "invoking model");

        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_once(prompt))
                .await
                .map_err(|_| {
                    IngestError::LanguageModel(format!(
                        "{} timed out after {}s",
                        self.config.model,
                        limit.as_secs_f32()
                    ))
                })?,
            None => self.run_once(prompt).await,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn script(dir: &Path, body: &str) -> std::io::Result<String> {
        let path = dir.join("fake-model");
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path.to_string_lossy().to_string())
    }

    #[tokio::test]
    async fn prompt_is_sent_on_stdin() -> Result<()> {
        let dir = tempdir()?;
        let program = script(dir.path(), "echo \"model=$2\"; cat")?;
        let model = OllamaCli::new(OllamaConfig {
            program,
            model: "tiny".to_string(),
            timeout: None,
        });

        let output = model.complete("{\"ok\": true}").await?;
        assert_eq!(output, "model=tiny\n{\"ok\": true}");
        Ok(())
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() -> Result<()> {
        let dir = tempdir()?;
        let program = script(dir.path(), "echo 'model not found' >&2; exit 3")?;
        let model = OllamaCli::new(OllamaConfig {
            program,
            ..OllamaConfig::default()
        });

        let error = model.complete("hi").await.unwrap_err();
        assert!(matches!(
            error,
            IngestError::LanguageModel(message) if message.contains("model not found")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn slow_model_times_out() -> Result<()> {
        let dir = tempdir()?;
        let program = script(dir.path(), "sleep 5")?;
        let model = OllamaCli::new(OllamaConfig {
            program,
            timeout: Some(Duration::from_millis(100)),
            ..OllamaConfig::default()
        });

        let error = model.complete("hi").await.unwrap_err();
        assert!(matches!(
            error,
            IngestError::LanguageModel(message) if message.contains("timed out")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn missing_program_is_a_model_error() {
        let model = OllamaCli::new(OllamaConfig {
            program: "coursepack-test-missing-model".to_string(),
            ..OllamaConfig::default()
        });

        let error = model.complete("hi").await.unwrap_err();
        assert!(matches!(error, IngestError::LanguageModel(_)));
    }
}
