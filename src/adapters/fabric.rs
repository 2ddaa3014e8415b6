//! Fabric generator.
//!
//! Runs `fabric -p <pattern>` as a subprocess, piping the prompt to stdin and
//! reading the rewrite from stdout. The child is killed if the caller's
//! timeout drops the future.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{GenerationError, GenerationRequest, Generator};

/// Generator backed by the Fabric CLI
#[derive(Debug, Clone)]
pub struct FabricGenerator {
    /// Path to the fabric binary (default: "fabric")
    binary_path: String,

    /// Pattern applied to every request
    pattern: String,
}

impl FabricGenerator {
    /// Create a generator using the installed binary
    ///
    /// Looks for fabric-ai first (Homebrew install), falls back to fabric
    pub fn new(pattern: impl Into<String>) -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self {
            binary_path,
            pattern: pattern.into(),
        }
    }

    /// Create a generator with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn failed(&self, message: impl Into<String>) -> GenerationError {
        GenerationError::Failed {
            generator: self.name().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Generator for FabricGenerator {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        debug!(pattern = %self.pattern, platform = %request.platform, "Spawning fabric");

        let mut child = Command::new(&self.binary_path)
            .arg("-p")
            .arg(&self.pattern)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(format!("failed to spawn '{}': {}", self.binary_path, e)))?;

        // Write prompt to stdin, then drop it to signal EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.prompt.as_bytes())
                .await
                .map_err(|e| self.failed(format!("failed to write stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failed(format!("failed to wait for process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(self.failed(format!(
                "pattern '{}' exited with code {}: {}",
                self.pattern,
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| self.failed("output is not valid UTF-8"))?;

        let text = stdout.trim();
        if text.is_empty() {
            return Err(GenerationError::Empty {
                generator: self.name().to_string(),
            });
        }
        Ok(text.to_string())
    }
}
