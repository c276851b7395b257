use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod records;

pub const COMPONENT_TYPE_ENTITY: u32 = 1;
pub const COMPONENT_TYPE_ATTRIBUTE: u32 = 2;
pub const COMPONENT_TYPE_RELATIONSHIP: u32 = 3;
pub const COMPONENT_TYPE_OPTION_SET: u32 = 9;
pub const COMPONENT_TYPE_SECURITY_ROLE: u32 = 20;
pub const COMPONENT_TYPE_SAVED_QUERY: u32 = 26;
pub const COMPONENT_TYPE_WORKFLOW: u32 = 29;
pub const COMPONENT_TYPE_SYSTEM_FORM: u32 = 60;
pub const COMPONENT_TYPE_WEB_RESOURCE: u32 = 61;
pub const COMPONENT_TYPE_SITE_MAP: u32 = 62;
pub const COMPONENT_TYPE_MODEL_DRIVEN_APP: u32 = 80;
pub const COMPONENT_TYPE_CANVAS_APP: u32 = 300;
pub const COMPONENT_TYPE_CONNECTOR: u32 = 371;
pub const COMPONENT_TYPE_CUSTOM_CONNECTOR: u32 = 372;
pub const COMPONENT_TYPE_ENVIRONMENT_VARIABLE_DEFINITION: u32 = 380;
pub const COMPONENT_TYPE_ENVIRONMENT_VARIABLE_VALUE: u32 = 381;
pub const COMPONENT_TYPE_CONNECTION_REFERENCE: u32 = 10_077;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub solution_id: String,
    pub name: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub is_managed: bool,
    #[serde(default)]
    pub publisher_id: Option<String>,
    #[serde(default)]
    pub publisher_name: Option<String>,
    #[serde(default)]
    pub components: Vec<SolutionComponent>,
    #[serde(default)]
    pub ms_dyn_components: Vec<MsDynComponent>,
}

impl Solution {
    pub fn display_name(&self) -> &str {
        self.friendly_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionComponent {
    pub id: String,
    #[serde(default)]
    pub solution_component_id: Option<String>,
    pub component_type: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsDynComponent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub component_type: u32,
    #[serde(default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEndpoint {
    pub object_id: String,
    pub base_solution_id: String,
    pub component_type: u32,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub dependent: DependencyEndpoint,
    pub required: DependencyEndpoint,
    #[serde(default)]
    pub dependency_type: u32,
}

impl Dependency {
    pub fn touches_solution(&self, solution_id: &str) -> bool {
        self.dependent.base_solution_id == solution_id
            || self.required.base_solution_id == solution_id
    }

    pub fn endpoints(&self) -> [&DependencyEndpoint; 2] {
        [&self.dependent, &self.required]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataverseComponent {
    pub id: String,
    pub solution_component_id: Option<String>,
    pub solution_id: String,
    pub component_type: u32,
    pub type_name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeNameTable(BTreeMap<u32, String>);

impl Default for TypeNameTable {
    fn default() -> Self {
        Self(
            [
                (COMPONENT_TYPE_ENTITY, "Entity"),
                (COMPONENT_TYPE_ATTRIBUTE, "Attribute"),
                (COMPONENT_TYPE_RELATIONSHIP, "Relationship"),
                (COMPONENT_TYPE_OPTION_SET, "Option Set"),
                (COMPONENT_TYPE_SECURITY_ROLE, "Security Role"),
                (COMPONENT_TYPE_SAVED_QUERY, "Saved Query"),
                (COMPONENT_TYPE_WORKFLOW, "Workflow"),
                (COMPONENT_TYPE_SYSTEM_FORM, "System Form"),
                (COMPONENT_TYPE_WEB_RESOURCE, "Web Resource"),
                (COMPONENT_TYPE_SITE_MAP, "Site Map"),
                (COMPONENT_TYPE_MODEL_DRIVEN_APP, "Model-driven App"),
                (COMPONENT_TYPE_CANVAS_APP, "Canvas App"),
                (COMPONENT_TYPE_CONNECTOR, "Connector"),
                (COMPONENT_TYPE_CUSTOM_CONNECTOR, "Connector"),
                (
                    COMPONENT_TYPE_ENVIRONMENT_VARIABLE_DEFINITION,
                    "Environment Variable Definition",
                ),
                (
                    COMPONENT_TYPE_ENVIRONMENT_VARIABLE_VALUE,
                    "Environment Variable Value",
                ),
                (COMPONENT_TYPE_CONNECTION_REFERENCE, "Connection Reference"),
            ]
            .into_iter()
            .map(|(code, name)| (code, name.to_owned()))
            .collect(),
        )
    }
}

impl TypeNameTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, component_type: u32) -> Option<&str> {
        self.0.get(&component_type).map(String::as_str)
    }

    pub fn insert(&mut self, component_type: u32, name: impl Into<String>) {
        self.0.insert(component_type, name.into());
    }

    /// Overlays `other` on top of `self`; entries in `other` win.
    pub fn merged_with(mut self, other: &TypeNameTable) -> Self {
        for (code, name) in &other.0 {
            self.0.insert(*code, name.clone());
        }
        self
    }
}
