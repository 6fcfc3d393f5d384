//! Runs the external compressor

use crate::models::error::ToolError;
use crate::services::command_builder::CompressorCommand;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct CompressorInvoker {
    timeout: Duration,
}

impl CompressorInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `command` to completion inside `working_dir` and returns its wall time.
    #[instrument(skip(self, command), fields(output = %command.output_file()))]
    pub async fn run(
        &self,
        command: &CompressorCommand,
        working_dir: &Path,
    ) -> Result<Duration, ToolError> {
        info!(command = %command, cwd = %working_dir.display(), "Executing compressor");
        let started = Instant::now();

        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::Spawn(e)),
            Err(_) => return Err(ToolError::Timeout(self.timeout)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let elapsed = started.elapsed();

        debug!(stdout = %stdout, "Compressor output");
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr, "Compressor stderr");
        }

        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        info!(elapsed_ms = elapsed.as_millis() as u64, "Compressor finished");
        Ok(elapsed)
    }

    /// Runs `commands` in order, stopping at the first failure. Returns the summed wall time.
    pub async fn run_all(
        &self,
        commands: &[CompressorCommand],
        working_dir: &Path,
    ) -> Result<Duration, ToolError> {
        let mut total = Duration::ZERO;
        for command in commands {
            total += self.run(command, working_dir).await?;
        }
        Ok(total)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::types::{CompressionMode, CompressionRequest, TextureType};
    use crate::services::command_builder::CommandBuilder;
    use std::path::PathBuf;

    fn command(program: &str) -> CompressorCommand {
        CommandBuilder::new(PathBuf::from(program)).build(
            &CompressionRequest::new(CompressionMode::Uastc, "out"),
            "input.png",
            TextureType::Ktx2,
        )
    }

    #[tokio::test]
    async fn runs_inside_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let touch = CompressorCommand::new(
            PathBuf::from("touch"),
            vec!["marker.ktx2".to_string()],
            "marker.ktx2".to_string(),
        );
        CompressorInvoker::new(Duration::from_secs(10))
            .run(&touch, dir.path())
            .await
            .unwrap();
        assert!(dir.path().join("marker.ktx2").is_file());
    }

    #[tokio::test]
    async fn run_all_sums_elapsed_time() {
        let dir = tempfile::tempdir().unwrap();
        let commands = [command("echo"), command("echo")];
        let total = CompressorInvoker::new(Duration::from_secs(10))
            .run_all(&commands, dir.path())
            .await
            .unwrap();
        assert!(total > Duration::ZERO);
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompressorInvoker::new(Duration::from_secs(10))
            .run(&command("false"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NonZeroExit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompressorInvoker::new(Duration::from_secs(10))
            .run(&command("/nonexistent/basisu"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn(_)));
    }

    #[tokio::test]
    async fn slow_compressor_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let slow = CompressorCommand::new(
            PathBuf::from("sleep"),
            vec!["5".to_string()],
            "never.ktx2".to_string(),
        );
        let started = Instant::now();
        let err = CompressorInvoker::new(Duration::from_millis(100))
            .run(&slow, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(limit) if limit == Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn run_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let commands = [command("false"), command("echo")];
        let err = CompressorInvoker::new(Duration::from_secs(10))
            .run_all(&commands, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NonZeroExit { .. }));
    }
}
