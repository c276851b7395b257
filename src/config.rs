use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};

use crate::graph::GraphOptions;
use crate::render::LayoutEngine;

pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SERVER_BIND: &str = "127.0.0.1:7878";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub endpoint: Option<String>,
    pub local_enabled: bool,
    pub graphviz_bin_dir: Option<PathBuf>,
    pub engine: LayoutEngine,
    pub timeout_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            local_enabled: true,
            graphviz_bin_dir: None,
            engine: LayoutEngine::default(),
            timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub render: RenderSettings,
    pub graph: GraphOptions,
    pub dataverse_url: Option<String>,
    pub dataverse_token: Option<String>,
    pub tenant_id: Option<String>,
    pub request_timeout_ms: u64,
    pub server_bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render: RenderSettings::default(),
            graph: GraphOptions::default(),
            dataverse_url: None,
            dataverse_token: None,
            tenant_id: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            server_bind: DEFAULT_SERVER_BIND.to_owned(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name).and_then(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_owned())
                }
            })
        };

        let endpoint = read("RENDER_ENDPOINT");
        if let Some(endpoint) = &endpoint {
            ensure!(
                endpoint.starts_with("http://") || endpoint.starts_with("https://"),
                "RENDER_ENDPOINT must be an http(s) URL, got `{endpoint}`"
            );
        }

        let engine = match read("RENDER_ENGINE") {
            Some(raw) => raw
                .parse::<LayoutEngine>()
                .context("failed to parse RENDER_ENGINE")?,
            None => LayoutEngine::default(),
        };

        let timeout_ms = parse_u64(read("RENDER_TIMEOUT_MS"), "RENDER_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_RENDER_TIMEOUT_MS);
        ensure!(timeout_ms > 0, "RENDER_TIMEOUT_MS must be greater than 0");

        let request_timeout_ms = parse_u64(read("REQUEST_TIMEOUT_MS"), "REQUEST_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        ensure!(
            request_timeout_ms > 0,
            "REQUEST_TIMEOUT_MS must be greater than 0"
        );

        let local_enabled = parse_bool(read("RENDER_LOCAL"), "RENDER_LOCAL")?.unwrap_or(true);
        let cluster_by_type =
            parse_bool(read("CLUSTER_BY_TYPE"), "CLUSTER_BY_TYPE")?.unwrap_or(true);

        let server_bind = read("SERVER_BIND").unwrap_or_else(|| DEFAULT_SERVER_BIND.to_owned());

        Ok(Self {
            render: RenderSettings {
                endpoint,
                local_enabled,
                graphviz_bin_dir: read("GRAPHVIZ_BIN_DIR").map(PathBuf::from),
                engine,
                timeout_ms,
            },
            graph: GraphOptions { cluster_by_type },
            dataverse_url: read("DATAVERSE_URL"),
            dataverse_token: read("DATAVERSE_TOKEN"),
            tenant_id: read("TENANT_ID"),
            request_timeout_ms,
            server_bind,
        })
    }
}

fn parse_u64(raw: Option<String>, name: &str) -> Result<Option<u64>> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .with_context(|| format!("failed to parse {name} as u64"))
    })
    .transpose()
}

fn parse_bool(raw: Option<String>, name: &str) -> Result<Option<bool>> {
    raw.map(|value| match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!(
            "invalid {name} `{other}`; expected true or false"
        )),
    })
    .transpose()
}
