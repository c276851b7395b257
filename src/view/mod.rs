use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::graph::{GraphOptions, build_dependency_graph, build_overview_graph};
use crate::model::{Dependency, Solution, TypeNameTable};
use crate::render::{GraphRenderer, LayoutEngine, RenderFailure};
use crate::snapshot::SessionSnapshot;
use crate::source::{SolutionSource, SourceError, load_environment};

pub mod events;

pub use events::{
    BulkSelection, CacheKey, NotificationLevel, ViewEvent, ViewMode, ViewPush, ViewState,
};

const GRAPH_DOCUMENT_TITLE: &str = "dependencies.dot";

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("`{event}` is not available in {mode} view")]
    WrongMode { event: &'static str, mode: ViewMode },

    #[error("unknown solution `{0}`")]
    UnknownSolution(String),

    #[error("pick at least one solution before opening the graph view")]
    NothingPicked,

    #[error("failed to render graph: {0}")]
    Render(#[from] RenderFailure),
}

pub struct ViewSession {
    solutions: Vec<Solution>,
    dependencies: Vec<Dependency>,
    type_names: TypeNameTable,
    picked: BTreeSet<String>,
    selected: Option<String>,
    mode: ViewMode,
    graph_by_key: HashMap<CacheKey, String>,
    svg_by_key: HashMap<CacheKey, String>,
    listeners: Vec<UnboundedSender<ViewPush>>,
    pending: Vec<ViewPush>,
    renderer: Arc<dyn GraphRenderer>,
    engine: LayoutEngine,
    options: GraphOptions,
}

impl ViewSession {
    pub fn new(snapshot: SessionSnapshot, context: &AppContext) -> Self {
        let type_names = snapshot.effective_type_names();
        Self {
            solutions: snapshot.solutions,
            dependencies: snapshot.dependencies,
            type_names,
            picked: BTreeSet::new(),
            selected: None,
            mode: ViewMode::Overview,
            graph_by_key: HashMap::new(),
            svg_by_key: HashMap::new(),
            listeners: Vec::new(),
            pending: Vec::new(),
            renderer: Arc::clone(&context.renderer),
            engine: context.settings.render.engine,
            options: context.settings.graph,
        }
    }

    /// `listener` sees the fetch progress and stays subscribed afterwards.
    pub async fn fetch<S>(
        source: &S,
        environment: &str,
        context: &AppContext,
        listener: UnboundedSender<ViewPush>,
    ) -> Result<Self, SourceError>
    where
        S: SolutionSource + ?Sized,
    {
        let progress = listener.clone();
        let snapshot = load_environment(source, environment, move |update| {
            let _ = progress.send(ViewPush::Progress(update));
        })
        .await?;

        let mut session = Self::new(snapshot, context);
        session.listeners.push(listener);
        Ok(session)
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<ViewPush> {
        let (sender, receiver) = unbounded_channel();
        self.listeners.push(sender);
        receiver
    }

    pub fn state(&self) -> ViewState {
        ViewState {
            mode: self.mode,
            picked: self.picked.iter().cloned().collect(),
            selected: self.selected.clone(),
            solution_count: self.solutions.len(),
            cached_graphs: self.graph_by_key.len(),
        }
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub async fn open(&mut self) -> Vec<ViewPush> {
        if let Err(error) = self.switch_view(ViewMode::Overview).await {
            self.report(error);
        }
        std::mem::take(&mut self.pending)
    }

    /// Failures are reported as pushes and never end the session.
    pub async fn handle_event(&mut self, event: ViewEvent) -> Vec<ViewPush> {
        debug!(event = event.name(), mode = %self.mode, "handling view event");
        let result = match event {
            ViewEvent::SolutionSelected(solution_id) => match self.mode {
                ViewMode::Overview => self.toggle_solution_picked(&solution_id).await,
                ViewMode::Graph => self.select_solution(&solution_id).await,
            },
            ViewEvent::Selection(selection) => self.bulk_select(selection).await,
            ViewEvent::ViewMode(mode) => self.switch_view(mode).await,
            ViewEvent::Alert(message) => {
                self.notify(NotificationLevel::Info, message);
                Ok(())
            }
        };

        if let Err(error) = result {
            self.report(error);
        }
        std::mem::take(&mut self.pending)
    }

    pub async fn toggle_solution_picked(&mut self, solution_id: &str) -> Result<(), ViewError> {
        self.require_mode(ViewMode::Overview, "solutionSelected")?;
        self.require_known(solution_id)?;

        if !self.picked.remove(solution_id) {
            self.picked.insert(solution_id.to_owned());
        }
        self.invalidate_all();
        self.render_overview().await
    }

    pub async fn select_solution(&mut self, solution_id: &str) -> Result<(), ViewError> {
        self.require_mode(ViewMode::Graph, "solutionSelected")?;
        self.require_known(solution_id)?;

        self.selected = Some(solution_id.to_owned());
        self.show(CacheKey::Solution(solution_id.to_owned())).await
    }

    pub async fn switch_view(&mut self, mode: ViewMode) -> Result<(), ViewError> {
        match mode {
            ViewMode::Overview => {
                self.mode = ViewMode::Overview;
                self.selected = None;
                self.emit(ViewPush::SwitchView(ViewMode::Overview));
                self.render_overview().await
            }
            ViewMode::Graph if self.picked.is_empty() => {
                self.mode = ViewMode::Overview;
                self.emit(ViewPush::SwitchView(ViewMode::Overview));
                Err(ViewError::NothingPicked)
            }
            ViewMode::Graph => {
                self.mode = ViewMode::Graph;
                self.selected = None;
                self.emit(ViewPush::SwitchView(ViewMode::Graph));
                self.show(CacheKey::All).await
            }
        }
    }

    pub async fn bulk_select(&mut self, selection: BulkSelection) -> Result<(), ViewError> {
        self.require_mode(ViewMode::Overview, "selection")?;

        let picked = match selection {
            BulkSelection::All => self
                .solutions
                .iter()
                .map(|solution| solution.solution_id.clone())
                .collect(),
            BulkSelection::None => BTreeSet::new(),
            BulkSelection::NonMicrosoft => self
                .solutions
                .iter()
                .filter(|solution| !is_first_party(solution))
                .map(|solution| solution.solution_id.clone())
                .collect(),
        };

        if picked != self.picked {
            self.picked = picked;
            self.invalidate_all();
        }
        self.render_overview().await
    }

    async fn show(&mut self, key: CacheKey) -> Result<(), ViewError> {
        if let Some(svg) = self.svg_by_key.get(&key).cloned() {
            debug!(key = ?key, "serving cached graph");
            self.emit_content(key, svg);
            return Ok(());
        }

        let graph_text = match self.graph_by_key.get(&key) {
            Some(text) => text.clone(),
            None => {
                let text = self.build_graph(&key);
                self.graph_by_key.insert(key.clone(), text.clone());
                text
            }
        };

        let rendered = self.renderer.render(&graph_text, self.engine).await?;
        info!(key = ?key, backend = rendered.backend.as_str(), "rendered dependency graph");
        self.svg_by_key.insert(key.clone(), rendered.svg.clone());
        self.emit_content(key, rendered.svg);
        Ok(())
    }

    fn build_graph(&self, key: &CacheKey) -> String {
        match key {
            CacheKey::All => {
                let picked = self
                    .solutions
                    .iter()
                    .filter(|solution| self.picked.contains(&solution.solution_id))
                    .cloned()
                    .collect::<Vec<_>>();
                build_dependency_graph(
                    &picked,
                    &self.dependencies,
                    &self.type_names,
                    None,
                    &self.options,
                )
            }
            CacheKey::Solution(solution_id) => build_dependency_graph(
                &self.solutions,
                &self.dependencies,
                &self.type_names,
                Some(solution_id),
                &self.options,
            ),
        }
    }

    async fn render_overview(&mut self) -> Result<(), ViewError> {
        let graph_text = build_overview_graph(&self.solutions, &self.dependencies, &self.picked);
        let rendered = self.renderer.render(&graph_text, self.engine).await?;
        let picked = self.picked.iter().cloned().collect();
        self.emit(ViewPush::UpdateOverview {
            svg: rendered.svg,
            picked,
        });
        Ok(())
    }

    fn invalidate_all(&mut self) {
        self.graph_by_key.remove(&CacheKey::All);
        self.svg_by_key.remove(&CacheKey::All);
    }

    fn require_mode(&self, mode: ViewMode, event: &'static str) -> Result<(), ViewError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(ViewError::WrongMode {
                event,
                mode: self.mode,
            })
        }
    }

    fn require_known(&self, solution_id: &str) -> Result<(), ViewError> {
        if self
            .solutions
            .iter()
            .any(|solution| solution.solution_id == solution_id)
        {
            Ok(())
        } else {
            Err(ViewError::UnknownSolution(solution_id.to_owned()))
        }
    }

    fn report(&mut self, error: ViewError) {
        match error {
            ViewError::Render(failure) => {
                warn!(error = %failure, "graph render failed");
                self.notify(
                    NotificationLevel::Error,
                    format!("failed to render graph: {failure}"),
                );
                self.emit(ViewPush::OpenDocument {
                    title: GRAPH_DOCUMENT_TITLE.to_owned(),
                    text: failure.graph_text,
                });
            }
            other => {
                debug!(error = %other, "view event rejected");
                self.notify(NotificationLevel::Warning, other.to_string());
            }
        }
    }

    fn notify(&mut self, level: NotificationLevel, message: String) {
        self.emit(ViewPush::Notify { level, message });
    }

    fn emit_content(&mut self, key: CacheKey, svg: String) {
        let selected = self.selected.clone();
        self.emit(ViewPush::UpdateContent { key, svg, selected });
    }

    fn emit(&mut self, push: ViewPush) {
        self.listeners
            .retain(|listener| listener.send(push.clone()).is_ok());
        self.pending.push(push);
    }
}

fn first_party_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^(microsoft|contoso)").ok())
        .as_ref()
}

fn is_first_party(solution: &Solution) -> bool {
    if solution.publisher_name.as_deref() == Some("default") {
        return true;
    }
    let Some(pattern) = first_party_pattern() else {
        return false;
    };
    [
        solution.publisher_id.as_deref(),
        solution.publisher_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| pattern.is_match(value))
}
