use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use super::{LayoutBackend, LayoutEngine, RenderBackendKind, RenderError, ensure_svg};

#[derive(Debug, Clone)]
pub struct RemoteRenderService {
    http_client: reqwest::Client,
    render_url: String,
    timeout_ms: u64,
}

impl RemoteRenderService {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RenderError> {
        let base = endpoint.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(RenderError::Configuration(
                "render endpoint cannot be empty".to_owned(),
            ));
        }

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            render_url: format!("{base}/render"),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn render_url(&self) -> &str {
        &self.render_url
    }
}

#[async_trait]
impl LayoutBackend for RemoteRenderService {
    fn kind(&self) -> RenderBackendKind {
        RenderBackendKind::Remote
    }

    async fn layout(&self, graph_text: &str, engine: LayoutEngine) -> Result<String, RenderError> {
        debug!(url = %self.render_url, engine = %engine, "requesting remote render");

        let response = self
            .http_client
            .post(&self.render_url)
            .query(&[("engine", engine.graphviz_layout())])
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .body(graph_text.to_owned())
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    RenderError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    RenderError::Transport(error)
                }
            })?;

        let response = ensure_success(response).await?;
        let body = response.text().await?;
        ensure_svg(body)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RenderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(RenderError::HttpStatus { status, body })
}
