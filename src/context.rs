use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::render::{FallbackRenderer, GraphRenderer};

#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub renderer: Arc<dyn GraphRenderer>,
}

impl AppContext {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let renderer = FallbackRenderer::from_settings(&settings.render)
            .context("failed to configure graph renderer")?;
        Ok(Self::with_renderer(settings, Arc::new(renderer)))
    }

    pub fn with_renderer(settings: Settings, renderer: Arc<dyn GraphRenderer>) -> Self {
        Self { settings, renderer }
    }
}
