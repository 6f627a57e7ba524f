use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::errors::{PatcherError, Result};
use crate::models::{ProgressEvent, ProgressPhase};
use crate::services::collaborators::PatchRunner;
use crate::services::events::EventSink;
use crate::utils::file::remove_dir_if_exists;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;
const STDERR_TAIL_LINES: usize = 20;

#[inline]
fn hide_console_window(command: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        command.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = command;
    }
}

/// Drives the external patch tool and turns its JSON-line output into progress events.
#[derive(Clone, Debug)]
pub struct PatchApplier {
    strict_exit: bool,
}

impl PatchApplier {
    pub fn new(strict_exit: bool) -> Self {
        Self { strict_exit }
    }

    pub async fn apply(
        &self,
        artifact: &Path,
        tool: &Path,
        staging_dir: &Path,
        target_dir: &Path,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|err| PatcherError::filesystem("create", target_dir, err))?;
        tokio::fs::create_dir_all(staging_dir)
            .await
            .map_err(|err| PatcherError::filesystem("create", staging_dir, err))?;

        let mut command = Command::new(tool);
        hide_console_window(&mut command);
        command
            .arg("apply")
            .arg("--json")
            .arg("--staging-dir")
            .arg(staging_dir)
            .arg(artifact)
            .arg(target_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::info!(
            "applying {} to {} with {}",
            artifact.display(),
            target_dir.display(),
            tool.display()
        );
        let mut child = command.spawn().map_err(|err| {
            PatcherError::PatchTool(format!("failed to spawn {}: {}", tool.display(), err))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PatcherError::PatchTool("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PatcherError::PatchTool("failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(collect_stderr(stderr));

        sink.progress(ProgressEvent::percent(ProgressPhase::Patching, 0));
        let mut last_percent: Option<u8> = Some(0);
        let mut reader = BufReader::new(stdout);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    match parse_progress_line(&line) {
                        Some(percent) if Some(percent) != last_percent => {
                            last_percent = Some(percent);
                            sink.progress(ProgressEvent::percent(
                                ProgressPhase::Patching,
                                i32::from(percent),
                            ));
                        }
                        Some(_) => {}
                        None => tracing::debug!("patch tool: {}", line.trim_end()),
                    }
                }
                Err(err) => {
                    tracing::warn!("patch tool stdout closed: {}", err);
                    break;
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|err| PatcherError::PatchTool(format!("failed to wait for patch tool: {err}")))?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        sink.progress(ProgressEvent::percent(ProgressPhase::Patching, 100));

        if let Err(err) = remove_dir_if_exists(staging_dir) {
            tracing::debug!("staging cleanup failed for {}: {}", staging_dir.display(), err);
        }

        if !status.success() {
            let detail = stderr_tail
                .last()
                .cloned()
                .unwrap_or_else(|| "no diagnostic output".to_string());
            if self.strict_exit {
                return Err(PatcherError::PatchTool(format!(
                    "patch tool exited with {}: {}",
                    status, detail
                )));
            }
            tracing::warn!("patch tool exited with {} (ignored): {}", status, detail);
        } else {
            tracing::info!("patch applied to {}", target_dir.display());
        }

        Ok(target_dir.to_path_buf())
    }
}

#[async_trait]
impl PatchRunner for PatchApplier {
    async fn apply(
        &self,
        artifact: &Path,
        tool: &Path,
        staging_dir: &Path,
        target_dir: &Path,
        sink: &dyn EventSink,
    ) -> Result<PathBuf> {
        PatchApplier::apply(self, artifact, tool, staging_dir, target_dir, sink).await
    }
}

async fn collect_stderr<R: AsyncRead + Unpin>(stderr: R) -> Vec<String> {
    let mut tail = Vec::new();
    let mut reader = BufReader::new(stderr);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                tracing::warn!("patch tool stderr: {}", line);
                tail.push(line);
                if tail.len() > STDERR_TAIL_LINES {
                    tail.remove(0);
                }
            }
        }
    }
    tail
}

/// Decodes one line of tool output into a whole percentage.
///
/// Anything that is not a JSON object describing progress yields `None`.
pub fn parse_progress_line(line: &str) -> Option<u8> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let record = value.as_object()?;

    let numeric = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_f64)
            .filter(|value| value.is_finite())
    };

    let typed_progress = record
        .get("type")
        .and_then(Value::as_str)
        .map(|kind| kind.to_ascii_lowercase().contains("progress"))
        .unwrap_or(false);
    if !typed_progress && numeric("percentage").is_none() && numeric("percent").is_none() {
        return None;
    }

    let mut value = numeric("percentage")
        .or_else(|| numeric("percent"))
        .or_else(|| numeric("progress"))?;
    if value > 0.0 && value <= 1.0 {
        value *= 100.0;
    }
    Some(value.clamp(0.0, 100.0).round() as u8)
}
