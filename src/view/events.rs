use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::source::FetchProgress;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    #[default]
    Overview,
    Graph,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Graph => "graph",
        }
    }
}

impl Display for ViewMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum CacheKey {
    All,
    Solution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkSelection {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "none")]
    None,
    #[serde(rename = "nonMSFT")]
    NonMicrosoft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "camelCase")]
pub enum ViewEvent {
    SolutionSelected(String),
    Selection(BulkSelection),
    ViewMode(ViewMode),
    Alert(String),
}

impl ViewEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SolutionSelected(_) => "solutionSelected",
            Self::Selection(_) => "selection",
            Self::ViewMode(_) => "viewMode",
            Self::Alert(_) => "alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum ViewPush {
    UpdateContent {
        key: CacheKey,
        svg: String,
        selected: Option<String>,
    },
    UpdateOverview {
        svg: String,
        picked: Vec<String>,
    },
    SwitchView(ViewMode),
    Progress(FetchProgress),
    Notify {
        level: NotificationLevel,
        message: String,
    },
    OpenDocument { title: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub mode: ViewMode,
    pub picked: Vec<String>,
    pub selected: Option<String>,
    pub solution_count: usize,
    pub cached_graphs: usize,
}
