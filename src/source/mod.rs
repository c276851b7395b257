use async_trait::async_trait;
use futures::future::try_join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Dependency, MsDynComponent, Solution, SolutionComponent};
use crate::snapshot::SessionSnapshot;

pub mod client;

pub use client::DataverseClient;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tenant API returned HTTP {status}: {message}")]
    HttpStatus { status: StatusCode, message: String },

    #[error("response format error: {0}")]
    ResponseFormat(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("dependency lookup for solution `{solution}` failed: {source}")]
    SolutionDependencies {
        solution: String,
        #[source]
        source: Box<SourceError>,
    },
}

#[async_trait]
pub trait SolutionSource: Send + Sync {
    async fn get_solutions(&self, environment: &str) -> Result<Vec<Solution>, SourceError>;

    async fn get_solution_components(
        &self,
        environment: &str,
        solution: &Solution,
    ) -> Result<Vec<SolutionComponent>, SourceError>;

    async fn get_ms_dyn_components(
        &self,
        environment: &str,
        solution: &Solution,
    ) -> Result<Vec<MsDynComponent>, SourceError>;

    async fn get_solution_dependencies(
        &self,
        environment: &str,
        solution: &Solution,
    ) -> Result<Vec<Dependency>, SourceError>;
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, resource: &str, tenant_id: Option<&str>)
    -> Result<String, SourceError>;
}

#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(
        &self,
        _resource: &str,
        _tenant_id: Option<&str>,
    ) -> Result<String, SourceError> {
        if self.token.trim().is_empty() {
            return Err(SourceError::Configuration(
                "DATAVERSE_TOKEN is empty".to_owned(),
            ));
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchProgress {
    pub completed: usize,
    pub total: usize,
}

impl FetchProgress {
    pub fn fraction(self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Fails fast: the first failed lookup aborts the collection.
pub async fn collect_dependencies<S, F>(
    source: &S,
    environment: &str,
    solutions: &[Solution],
    mut on_progress: F,
) -> Result<Vec<Dependency>, SourceError>
where
    S: SolutionSource + ?Sized,
    F: FnMut(FetchProgress),
{
    let total = solutions.len();
    let mut pending = solutions
        .iter()
        .enumerate()
        .map(|(index, solution)| async move {
            source
                .get_solution_dependencies(environment, solution)
                .await
                .map(|dependencies| (index, dependencies))
                .map_err(|error| SourceError::SolutionDependencies {
                    solution: solution.name.clone(),
                    source: Box::new(error),
                })
        })
        .collect::<FuturesUnordered<_>>();

    let mut by_solution = vec![Vec::new(); total];
    let mut completed = 0;
    on_progress(FetchProgress { completed, total });

    while let Some(result) = pending.next().await {
        let (index, dependencies) = result?;
        debug!(
            solution = %solutions[index].name,
            dependency_count = dependencies.len(),
            "collected solution dependencies"
        );
        by_solution[index] = dependencies;
        completed += 1;
        on_progress(FetchProgress { completed, total });
    }

    Ok(by_solution.into_iter().flatten().collect())
}

pub async fn load_environment<S, F>(
    source: &S,
    environment: &str,
    on_progress: F,
) -> Result<SessionSnapshot, SourceError>
where
    S: SolutionSource + ?Sized,
    F: FnMut(FetchProgress),
{
    let mut solutions = source.get_solutions(environment).await?;
    solutions.sort_by_key(|solution| solution.display_name().to_lowercase());

    let listings = try_join_all(solutions.iter().map(|solution| async move {
        let components = source.get_solution_components(environment, solution).await?;
        let ms_dyn_components = source.get_ms_dyn_components(environment, solution).await?;
        Ok::<_, SourceError>((components, ms_dyn_components))
    }))
    .await?;
    for (solution, (components, ms_dyn_components)) in solutions.iter_mut().zip(listings) {
        solution.components = components;
        solution.ms_dyn_components = ms_dyn_components;
    }

    let dependencies = collect_dependencies(source, environment, &solutions, on_progress).await?;
    info!(
        environment,
        solution_count = solutions.len(),
        dependency_count = dependencies.len(),
        "loaded environment"
    );

    Ok(SessionSnapshot::new(solutions, dependencies))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{
        FetchProgress, SourceError, StaticTokenProvider, TokenProvider, collect_dependencies,
        load_environment,
    };
    use crate::test_support::{FakeSource, dependency, solution};

    fn two_solution_source() -> FakeSource {
        FakeSource::new(
            vec![solution("B", "beta", "Acme"), solution("A", "alpha", "Acme")],
            vec![
                dependency("a1", "A", "b1", "B"),
                dependency("b2", "B", "a2", "A"),
            ],
        )
    }

    #[tokio::test]
    async fn collect_dependencies_reports_progress_and_keeps_solution_order() {
        let source = two_solution_source();
        let solutions = vec![solution("A", "alpha", "Acme"), solution("B", "beta", "Acme")];
        let mut progress = Vec::new();

        let dependencies = collect_dependencies(&source, "env", &solutions, |update| {
            progress.push(update)
        })
        .await
        .expect("collection should succeed");

        assert_eq!(dependencies.len(), 2);
        assert_eq!(dependencies[0].dependent.object_id, "a1");
        assert_eq!(dependencies[1].dependent.object_id, "b2");
        assert_eq!(
            progress,
            [
                FetchProgress {
                    completed: 0,
                    total: 2
                },
                FetchProgress {
                    completed: 1,
                    total: 2
                },
                FetchProgress {
                    completed: 2,
                    total: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn one_failing_lookup_fails_the_whole_collection() {
        let mut source = two_solution_source();
        source.failing_solution = Some("B".to_owned());
        let solutions = vec![solution("A", "alpha", "Acme"), solution("B", "beta", "Acme")];

        let error = collect_dependencies(&source, "env", &solutions, |_| {})
            .await
            .expect_err("collection should fail");

        match error {
            SourceError::SolutionDependencies { solution, .. } => assert_eq!(solution, "beta"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn load_environment_attaches_listings_and_sorts_by_name() {
        let source = two_solution_source();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let snapshot = load_environment(&source, "env", move |update| {
            if let Ok(mut updates) = sink.lock() {
                updates.push(update.fraction());
            }
        })
        .await
        .expect("load should succeed");

        let names = snapshot
            .solutions
            .iter()
            .map(|solution| solution.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["alpha", "beta"]);
        assert_eq!(snapshot.solutions[0].components.len(), 1);
        assert_eq!(snapshot.dependencies.len(), 2);
        assert_eq!(snapshot.dependencies[0].dependent.object_id, "a1");
        let fractions = seen.lock().expect("progress lock").clone();
        assert_eq!(fractions.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn static_token_provider_rejects_blank_tokens() {
        let provider = StaticTokenProvider::new("  ");
        assert!(provider.get_token("https://org", None).await.is_err());

        let provider = StaticTokenProvider::new("abc");
        assert_eq!(
            provider
                .get_token("https://org", Some("tenant"))
                .await
                .expect("token should be returned"),
            "abc"
        );
    }
}
