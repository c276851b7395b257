use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::model::{
    COMPONENT_TYPE_ENTITY, COMPONENT_TYPE_WORKFLOW, Dependency, DependencyEndpoint,
    MsDynComponent, Solution, SolutionComponent,
};
use crate::render::{
    GraphRenderer, LayoutBackend, LayoutEngine, RenderBackendKind, RenderError, RenderFailure,
    RenderedGraph,
};
use crate::source::{SolutionSource, SourceError};

pub fn temp_path(prefix: &str) -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "solution_graph_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

pub fn remove_dir_if_exists(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

pub fn solution(id: &str, name: &str, publisher: &str) -> Solution {
    Solution {
        solution_id: id.to_owned(),
        name: name.to_owned(),
        friendly_name: None,
        version: "1.0.0.0".to_owned(),
        is_managed: false,
        publisher_id: None,
        publisher_name: Some(publisher.to_owned()),
        components: Vec::new(),
        ms_dyn_components: Vec::new(),
    }
}

pub fn structural(id: &str, component_type: u32) -> SolutionComponent {
    SolutionComponent {
        id: id.to_owned(),
        solution_component_id: None,
        component_type,
        name: None,
        type_name: None,
    }
}

pub fn ms_dyn(id: &str, name: &str, component_type: u32, type_name: &str) -> MsDynComponent {
    MsDynComponent {
        id: id.to_owned(),
        name: Some(name.to_owned()),
        component_type,
        type_name: Some(type_name.to_owned()),
    }
}

pub fn dependency(
    dependent_object: &str,
    dependent_solution: &str,
    required_object: &str,
    required_solution: &str,
) -> Dependency {
    Dependency {
        dependent: DependencyEndpoint {
            object_id: dependent_object.to_owned(),
            base_solution_id: dependent_solution.to_owned(),
            component_type: COMPONENT_TYPE_WORKFLOW,
            type_name: None,
            display_name: None,
        },
        required: DependencyEndpoint {
            object_id: required_object.to_owned(),
            base_solution_id: required_solution.to_owned(),
            component_type: COMPONENT_TYPE_ENTITY,
            type_name: None,
            display_name: None,
        },
        dependency_type: 2,
    }
}

pub struct FakeSource {
    pub solutions: Vec<Solution>,
    pub dependencies: Vec<Dependency>,
    pub failing_solution: Option<String>,
}

impl FakeSource {
    pub fn new(solutions: Vec<Solution>, dependencies: Vec<Dependency>) -> Self {
        Self {
            solutions,
            dependencies,
            failing_solution: None,
        }
    }
}

#[async_trait]
impl SolutionSource for FakeSource {
    async fn get_solutions(&self, _environment: &str) -> Result<Vec<Solution>, SourceError> {
        Ok(self.solutions.clone())
    }

    async fn get_solution_components(
        &self,
        _environment: &str,
        solution: &Solution,
    ) -> Result<Vec<SolutionComponent>, SourceError> {
        Ok(vec![structural(
            &format!("{}-table", solution.solution_id),
            COMPONENT_TYPE_ENTITY,
        )])
    }

    async fn get_ms_dyn_components(
        &self,
        _environment: &str,
        _solution: &Solution,
    ) -> Result<Vec<MsDynComponent>, SourceError> {
        Ok(Vec::new())
    }

    async fn get_solution_dependencies(
        &self,
        _environment: &str,
        solution: &Solution,
    ) -> Result<Vec<Dependency>, SourceError> {
        if self.failing_solution.as_deref() == Some(solution.solution_id.as_str()) {
            return Err(SourceError::ResponseFormat(format!(
                "no dependencies for {}",
                solution.solution_id
            )));
        }
        Ok(self
            .dependencies
            .iter()
            .filter(|dependency| dependency.dependent.base_solution_id == solution.solution_id)
            .cloned()
            .collect())
    }
}

pub struct StubBackend {
    kind: RenderBackendKind,
    result: Result<String, String>,
    calls: AtomicUsize,
    last_engine: Mutex<Option<LayoutEngine>>,
}

impl StubBackend {
    pub fn new(kind: RenderBackendKind, result: Result<&str, &str>) -> Self {
        Self {
            kind,
            result: result.map(str::to_owned).map_err(str::to_owned),
            calls: AtomicUsize::new(0),
            last_engine: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_engine(&self) -> Option<LayoutEngine> {
        self.last_engine.lock().ok().and_then(|engine| *engine)
    }
}

#[async_trait]
impl LayoutBackend for StubBackend {
    fn kind(&self) -> RenderBackendKind {
        self.kind
    }

    async fn layout(&self, _graph_text: &str, engine: LayoutEngine) -> Result<String, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_engine.lock() {
            *last = Some(engine);
        }
        match &self.result {
            Ok(svg) => Ok(svg.clone()),
            Err(message) => Err(match self.kind {
                RenderBackendKind::Local => RenderError::Local(message.clone()),
                RenderBackendKind::Remote => RenderError::HttpStatus {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: message.clone(),
                },
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    calls: AtomicUsize,
    failing: AtomicBool,
    texts: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rendered_texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .map(|texts| texts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphRenderer for RecordingRenderer {
    async fn render(
        &self,
        graph_text: &str,
        _engine: LayoutEngine,
    ) -> Result<RenderedGraph, RenderFailure> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RenderFailure {
                error: RenderError::Local("renderer switched off".to_owned()),
                graph_text: graph_text.to_owned(),
            });
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(graph_text.to_owned());
        }
        Ok(RenderedGraph {
            svg: format!("<svg data-render=\"{call}\"/>"),
            backend: RenderBackendKind::Local,
        })
    }
}
