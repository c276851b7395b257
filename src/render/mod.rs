use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RenderSettings;

pub mod graphviz;
pub mod remote;

pub use graphviz::GraphvizProcess;
pub use remote::RemoteRenderService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutEngine {
    #[default]
    Hierarchical,
    Radial,
}

impl LayoutEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hierarchical => "hierarchical",
            Self::Radial => "radial",
        }
    }

    /// Graphviz layout program name (`-K` flag and remote `engine` query).
    pub fn graphviz_layout(self) -> &'static str {
        match self {
            Self::Hierarchical => "dot",
            Self::Radial => "twopi",
        }
    }
}

impl Display for LayoutEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutEngine {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hierarchical" | "dot" => Ok(Self::Hierarchical),
            "radial" | "twopi" => Ok(Self::Radial),
            other => Err(anyhow!(
                "invalid layout engine `{other}`; expected `hierarchical` or `radial`"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderBackendKind {
    Local,
    Remote,
}

impl RenderBackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGraph {
    pub svg: String,
    pub backend: RenderBackendKind,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("render service returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("local Graphviz failed: {0}")]
    Local(String),

    #[error("response format error: {0}")]
    ResponseFormat(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RenderFailure {
    #[source]
    pub error: RenderError,
    pub graph_text: String,
}

#[async_trait]
pub trait LayoutBackend: Send + Sync {
    fn kind(&self) -> RenderBackendKind;

    async fn layout(&self, graph_text: &str, engine: LayoutEngine) -> Result<String, RenderError>;
}

#[async_trait]
pub trait GraphRenderer: Send + Sync {
    async fn render(
        &self,
        graph_text: &str,
        engine: LayoutEngine,
    ) -> Result<RenderedGraph, RenderFailure>;
}

#[derive(Clone, Default)]
pub struct FallbackRenderer {
    local: Option<Arc<dyn LayoutBackend>>,
    remote: Option<Arc<dyn LayoutBackend>>,
}

impl FallbackRenderer {
    pub fn new(
        local: Option<Arc<dyn LayoutBackend>>,
        remote: Option<Arc<dyn LayoutBackend>>,
    ) -> Self {
        Self { local, remote }
    }

    pub fn from_settings(settings: &RenderSettings) -> Result<Self, RenderError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let local = settings.local_enabled.then(|| {
            Arc::new(GraphvizProcess::new(
                settings.graphviz_bin_dir.clone(),
                timeout,
            )) as Arc<dyn LayoutBackend>
        });
        let remote = match &settings.endpoint {
            Some(endpoint) => Some(
                Arc::new(RemoteRenderService::new(endpoint, timeout)?) as Arc<dyn LayoutBackend>
            ),
            None => None,
        };
        Ok(Self::new(local, remote))
    }
}

#[async_trait]
impl GraphRenderer for FallbackRenderer {
    async fn render(
        &self,
        graph_text: &str,
        engine: LayoutEngine,
    ) -> Result<RenderedGraph, RenderFailure> {
        if let Some(local) = &self.local {
            match local.layout(graph_text, engine).await {
                Ok(svg) => {
                    debug!(engine = %engine, "rendered graph locally");
                    return Ok(RenderedGraph {
                        svg,
                        backend: local.kind(),
                    });
                }
                Err(error) => {
                    warn!(error = %error, "local render failed, falling back to remote service");
                }
            }
        }

        let Some(remote) = &self.remote else {
            return Err(RenderFailure {
                error: RenderError::Configuration(
                    "no render endpoint configured and local Graphviz is unavailable".to_owned(),
                ),
                graph_text: graph_text.to_owned(),
            });
        };

        match remote.layout(graph_text, engine).await {
            Ok(svg) => {
                debug!(engine = %engine, "rendered graph remotely");
                Ok(RenderedGraph {
                    svg,
                    backend: remote.kind(),
                })
            }
            Err(error) => {
                warn!(error = %error, "remote render failed");
                Err(RenderFailure {
                    error,
                    graph_text: graph_text.to_owned(),
                })
            }
        }
    }
}

pub(crate) fn ensure_svg(body: String) -> Result<String, RenderError> {
    if body.contains("<svg") {
        Ok(body)
    } else {
        let preview = body.chars().take(80).collect::<String>();
        Err(RenderError::ResponseFormat(format!(
            "expected an SVG document, got `{preview}`"
        )))
    }
}
