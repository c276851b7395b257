use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::model::records::{
    ComponentSummaryRecord, DependencyRecord, ODataPage, SolutionComponentRecord, SolutionRecord,
};
use crate::model::{Dependency, MsDynComponent, Solution, SolutionComponent};

use super::{SolutionSource, SourceError, TokenProvider};

const API_PATH: &str = "api/data/v9.2";
const INCLUDE_FORMATTED_VALUES: &str =
    "odata.include-annotations=\"OData.Community.Display.V1.FormattedValue\"";

#[derive(Clone)]
pub struct DataverseClient {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    tenant_id: Option<String>,
}

impl DataverseClient {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        tenant_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            tokens,
            tenant_id,
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        environment: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, SourceError> {
        let base = environment.trim_end_matches('/');
        if base.is_empty() {
            return Err(SourceError::Configuration(
                "environment URL cannot be empty".to_owned(),
            ));
        }

        let url = format!("{base}/{API_PATH}/{path}");
        let token = self
            .tokens
            .get_token(base, self.tenant_id.as_deref())
            .await?;

        debug!(url = %url, "querying tenant API");

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .bearer_auth(token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Prefer", INCLUDE_FORMATTED_VALUES)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        let page = serde_json::from_str::<ODataPage<T>>(&body)
            .map_err(|error| SourceError::ResponseFormat(format!("{path}: {error}")))?;
        Ok(page.value)
    }
}

#[async_trait]
impl SolutionSource for DataverseClient {
    async fn get_solutions(&self, environment: &str) -> Result<Vec<Solution>, SourceError> {
        let records = self
            .get_page::<SolutionRecord>(
                environment,
                "solutions",
                &[
                    (
                        "$select",
                        "solutionid,uniquename,friendlyname,version,ismanaged,_publisherid_value"
                            .to_owned(),
                    ),
                    (
                        "$expand",
                        "publisherid($select=uniquename,friendlyname)".to_owned(),
                    ),
                    ("$filter", "isvisible eq true".to_owned()),
                ],
            )
            .await?;
        Ok(records
            .into_iter()
            .map(SolutionRecord::into_solution)
            .collect())
    }

    async fn get_solution_components(
        &self,
        environment: &str,
        solution: &Solution,
    ) -> Result<Vec<SolutionComponent>, SourceError> {
        let records = self
            .get_page::<SolutionComponentRecord>(
                environment,
                "solutioncomponents",
                &[
                    (
                        "$select",
                        "solutioncomponentid,objectid,componenttype".to_owned(),
                    ),
                    (
                        "$filter",
                        format!("_solutionid_value eq {}", solution.solution_id),
                    ),
                ],
            )
            .await?;
        Ok(records.into_iter().map(SolutionComponent::from).collect())
    }

    async fn get_ms_dyn_components(
        &self,
        environment: &str,
        solution: &Solution,
    ) -> Result<Vec<MsDynComponent>, SourceError> {
        let records = self
            .get_page::<ComponentSummaryRecord>(
                environment,
                "msdyn_solutioncomponentsummaries",
                &[
                    (
                        "$select",
                        "msdyn_objectid,msdyn_displayname,msdyn_name,msdyn_componenttype,msdyn_componenttypename"
                            .to_owned(),
                    ),
                    (
                        "$filter",
                        format!("msdyn_solutionid eq {}", solution.solution_id),
                    ),
                ],
            )
            .await?;
        Ok(records.into_iter().map(MsDynComponent::from).collect())
    }

    async fn get_solution_dependencies(
        &self,
        environment: &str,
        solution: &Solution,
    ) -> Result<Vec<Dependency>, SourceError> {
        let records = self
            .get_page::<DependencyRecord>(
                environment,
                "RetrieveDependenciesForUninstall(SolutionUniqueName=@name)",
                &[("@name", odata_string_literal(&solution.name))],
            )
            .await?;
        Ok(records.into_iter().map(Dependency::from).collect())
    }
}

fn odata_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(SourceError::HttpStatus {
        status,
        message: extract_error_message(&body).unwrap_or(body),
    })
}

fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    value
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::{extract_error_message, odata_string_literal};

    #[test]
    fn odata_literals_double_single_quotes() {
        assert_eq!(odata_string_literal("acme_core"), "'acme_core'");
        assert_eq!(odata_string_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn error_message_is_extracted_from_odata_error_body() {
        let body = r#"{"error":{"code":"0x80040217","message":"Solution not found"}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Solution not found")
        );
        assert_eq!(extract_error_message("<html>bad gateway</html>"), None);
    }
}
