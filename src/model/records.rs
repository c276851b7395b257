use serde::Deserialize;

use super::{Dependency, DependencyEndpoint, MsDynComponent, Solution, SolutionComponent};

#[derive(Debug, Clone, Deserialize)]
pub struct ODataPage<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolutionRecord {
    pub solutionid: String,
    pub uniquename: String,
    #[serde(default)]
    pub friendlyname: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ismanaged: Option<bool>,
    #[serde(rename = "_publisherid_value", default)]
    pub publisher_id_value: Option<String>,
    #[serde(default)]
    pub publisherid: Option<PublisherRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherRecord {
    #[serde(default)]
    pub uniquename: Option<String>,
    #[serde(default)]
    pub friendlyname: Option<String>,
}

impl SolutionRecord {
    pub fn into_solution(self) -> Solution {
        let publisher_name = self.publisherid.as_ref().and_then(|publisher| {
            publisher
                .uniquename
                .clone()
                .or_else(|| publisher.friendlyname.clone())
        });

        Solution {
            solution_id: self.solutionid,
            name: self.uniquename,
            friendly_name: self.friendlyname,
            version: self.version.unwrap_or_default(),
            is_managed: self.ismanaged.unwrap_or(false),
            publisher_id: self.publisher_id_value,
            publisher_name,
            components: Vec::new(),
            ms_dyn_components: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolutionComponentRecord {
    pub solutioncomponentid: String,
    pub objectid: String,
    pub componenttype: u32,
    #[serde(rename = "componenttype@OData.Community.Display.V1.FormattedValue", default)]
    pub componenttype_formatted: Option<String>,
}

impl From<SolutionComponentRecord> for SolutionComponent {
    fn from(record: SolutionComponentRecord) -> Self {
        Self {
            id: record.objectid,
            solution_component_id: Some(record.solutioncomponentid),
            component_type: record.componenttype,
            name: None,
            type_name: record.componenttype_formatted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSummaryRecord {
    pub msdyn_objectid: String,
    #[serde(default)]
    pub msdyn_displayname: Option<String>,
    #[serde(default)]
    pub msdyn_name: Option<String>,
    pub msdyn_componenttype: u32,
    #[serde(default)]
    pub msdyn_componenttypename: Option<String>,
}

impl From<ComponentSummaryRecord> for MsDynComponent {
    fn from(record: ComponentSummaryRecord) -> Self {
        let name = non_blank(record.msdyn_displayname).or_else(|| non_blank(record.msdyn_name));
        Self {
            id: record.msdyn_objectid,
            name,
            component_type: record.msdyn_componenttype,
            type_name: non_blank(record.msdyn_componenttypename),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyRecord {
    pub dependentcomponentobjectid: String,
    pub dependentcomponentbasesolutionid: String,
    pub dependentcomponenttype: u32,
    #[serde(
        rename = "dependentcomponenttype@OData.Community.Display.V1.FormattedValue",
        default
    )]
    pub dependentcomponenttype_formatted: Option<String>,
    #[serde(default)]
    pub dependentcomponentname: Option<String>,
    pub requiredcomponentobjectid: String,
    pub requiredcomponentbasesolutionid: String,
    pub requiredcomponenttype: u32,
    #[serde(
        rename = "requiredcomponenttype@OData.Community.Display.V1.FormattedValue",
        default
    )]
    pub requiredcomponenttype_formatted: Option<String>,
    #[serde(default)]
    pub requiredcomponentname: Option<String>,
    #[serde(default)]
    pub dependencytype: Option<u32>,
}

impl From<DependencyRecord> for Dependency {
    fn from(record: DependencyRecord) -> Self {
        Self {
            dependent: DependencyEndpoint {
                object_id: record.dependentcomponentobjectid,
                base_solution_id: record.dependentcomponentbasesolutionid,
                component_type: record.dependentcomponenttype,
                type_name: non_blank(record.dependentcomponenttype_formatted),
                display_name: non_blank(record.dependentcomponentname),
            },
            required: DependencyEndpoint {
                object_id: record.requiredcomponentobjectid,
                base_solution_id: record.requiredcomponentbasesolutionid,
                component_type: record.requiredcomponenttype,
                type_name: non_blank(record.requiredcomponenttype_formatted),
                display_name: non_blank(record.requiredcomponentname),
            },
            dependency_type: record.dependencytype.unwrap_or_default(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ComponentSummaryRecord, DependencyRecord, ODataPage, SolutionRecord};
    use crate::model::{Dependency, MsDynComponent};

    #[test]
    fn solution_record_maps_publisher_expansion() {
        let page: ODataPage<SolutionRecord> = serde_json::from_value(json!({
            "@odata.context": "ignored",
            "value": [{
                "solutionid": "a1",
                "uniquename": "acme_core",
                "friendlyname": "Acme Core",
                "version": "1.2.0.0",
                "ismanaged": true,
                "_publisherid_value": "p1",
                "publisherid": { "uniquename": "acme", "friendlyname": "Acme Inc" }
            }]
        }))
        .expect("page should decode");

        let solution = page
            .value
            .into_iter()
            .next()
            .expect("one row")
            .into_solution();
        assert_eq!(solution.solution_id, "a1");
        assert_eq!(solution.display_name(), "Acme Core");
        assert!(solution.is_managed);
        assert_eq!(solution.publisher_id.as_deref(), Some("p1"));
        assert_eq!(solution.publisher_name.as_deref(), Some("acme"));
    }

    #[test]
    fn dependency_record_reads_formatted_type_names() {
        let record: DependencyRecord = serde_json::from_value(json!({
            "dependentcomponentobjectid": "flow-1",
            "dependentcomponentbasesolutionid": "a1",
            "dependentcomponenttype": 29,
            "dependentcomponenttype@OData.Community.Display.V1.FormattedValue": "Workflow",
            "requiredcomponentobjectid": "table-1",
            "requiredcomponentbasesolutionid": "b1",
            "requiredcomponenttype": 1,
            "requiredcomponentname": "",
            "dependencytype": 2
        }))
        .expect("record should decode");

        let dependency = Dependency::from(record);
        assert_eq!(dependency.dependent.type_name.as_deref(), Some("Workflow"));
        assert_eq!(dependency.required.type_name, None);
        assert_eq!(dependency.required.display_name, None);
        assert_eq!(dependency.dependency_type, 2);
        assert!(dependency.touches_solution("b1"));
    }

    #[test]
    fn component_summary_prefers_display_name() {
        let record: ComponentSummaryRecord = serde_json::from_value(json!({
            "msdyn_objectid": "obj-1",
            "msdyn_displayname": "Account",
            "msdyn_name": "account",
            "msdyn_componenttype": 1,
            "msdyn_componenttypename": "Entity"
        }))
        .expect("record should decode");

        let component = MsDynComponent::from(record);
        assert_eq!(component.name.as_deref(), Some("Account"));
        assert_eq!(component.type_name.as_deref(), Some("Entity"));
    }
}
