use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{LayoutBackend, LayoutEngine, RenderBackendKind, RenderError, ensure_svg};

const DOT_PROGRAM: &str = "dot";

#[derive(Debug, Clone)]
pub struct GraphvizProcess {
    bin_dir: Option<PathBuf>,
    timeout: Duration,
}

impl GraphvizProcess {
    pub fn new(bin_dir: Option<PathBuf>, timeout: Duration) -> Self {
        Self { bin_dir, timeout }
    }

    fn program(&self) -> PathBuf {
        program_path(self.bin_dir.as_deref())
    }

    async fn run(&self, graph_text: &str, engine: LayoutEngine) -> Result<String, RenderError> {
        let program = self.program();
        let mut child = Command::new(&program)
            .arg("-Tsvg")
            .arg(format!("-K{}", engine.graphviz_layout()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| {
                RenderError::Local(format!("failed to start `{}`: {error}", program.display()))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Local("dot stdin was not captured".to_owned()))?;
        let write_input = async move {
            let written = stdin.write_all(graph_text.as_bytes()).await;
            // dot starts laying out once stdin closes.
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write_input, child.wait_with_output());
        let output = output
            .map_err(|error| RenderError::Local(format!("failed to read dot output: {error}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Local(format!(
                "dot exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        written
            .map_err(|error| RenderError::Local(format!("failed to write graph text: {error}")))?;

        let svg = String::from_utf8(output.stdout)
            .map_err(|error| RenderError::ResponseFormat(format!("dot output: {error}")))?;
        ensure_svg(svg)
    }
}

#[async_trait]
impl LayoutBackend for GraphvizProcess {
    fn kind(&self) -> RenderBackendKind {
        RenderBackendKind::Local
    }

    async fn layout(&self, graph_text: &str, engine: LayoutEngine) -> Result<String, RenderError> {
        debug!(program = %self.program().display(), engine = %engine, "running local Graphviz");
        match timeout(self.timeout, self.run(graph_text, engine)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

fn program_path(bin_dir: Option<&Path>) -> PathBuf {
    match bin_dir {
        Some(dir) => dir.join(DOT_PROGRAM),
        None => PathBuf::from(DOT_PROGRAM),
    }
}
