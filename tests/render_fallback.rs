use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use serde::Deserialize;
use solution_graph::config::RenderSettings;
use solution_graph::render::{
    FallbackRenderer, GraphRenderer, LayoutEngine, RenderBackendKind, RenderError,
};
use solution_graph::test_support::temp_path;
use tokio::net::TcpListener;

#[derive(Debug, Deserialize)]
struct RenderQuery {
    engine: String,
}

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

struct StubService {
    base_url: String,
    recorded: Recorded,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for StubService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn start_stub(status: StatusCode, body: &'static str) -> Option<StubService> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) if error.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(error) => panic!("ephemeral port should be available for bind: {error}"),
    };
    let addr = listener
        .local_addr()
        .expect("ephemeral listener should have local address");

    let recorded = Recorded::default();
    let app = Router::new()
        .route(
            "/render",
            post(
                move |State(recorded): State<Recorded>,
                      Query(query): Query<RenderQuery>,
                      graph_text: String| async move {
                    if let Ok(mut requests) = recorded.requests.lock() {
                        requests.push((query.engine, graph_text));
                    }
                    (status, body)
                },
            ),
        )
        .with_state(recorded.clone());

    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Some(StubService {
        base_url: format!("http://{addr}"),
        recorded,
        task,
    })
}

fn settings_with_missing_graphviz(endpoint: &str) -> RenderSettings {
    RenderSettings {
        endpoint: Some(endpoint.to_owned()),
        local_enabled: true,
        graphviz_bin_dir: Some(temp_path("no-graphviz-here")),
        ..RenderSettings::default()
    }
}

#[tokio::test]
async fn missing_local_graphviz_falls_back_to_render_service() {
    let Some(stub) = start_stub(StatusCode::OK, "<svg><g id=\"graph0\"/></svg>").await else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let settings = settings_with_missing_graphviz(&stub.base_url);
    let renderer = FallbackRenderer::from_settings(&settings).expect("renderer should build");

    let rendered = renderer
        .render("digraph solutions { \"A\" -> \"B\"; }", LayoutEngine::Radial)
        .await
        .expect("remote render should succeed");

    assert_eq!(rendered.backend, RenderBackendKind::Remote);
    assert!(rendered.svg.starts_with("<svg"));
    let requests = stub
        .recorded
        .requests
        .lock()
        .expect("recorded requests lock")
        .clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "twopi");
    assert_eq!(requests[0].1, "digraph solutions { \"A\" -> \"B\"; }");
}

#[tokio::test]
async fn render_service_errors_keep_the_graph_text() {
    let Some(stub) = start_stub(StatusCode::INTERNAL_SERVER_ERROR, "syntax error in line 1").await
    else {
        eprintln!("skipping: local TCP bind is not permitted in this environment");
        return;
    };
    let settings = settings_with_missing_graphviz(&stub.base_url);
    let renderer = FallbackRenderer::from_settings(&settings).expect("renderer should build");

    let failure = renderer
        .render("digraph broken {", LayoutEngine::Hierarchical)
        .await
        .expect_err("render should fail");

    assert_eq!(failure.graph_text, "digraph broken {");
    match failure.error {
        RenderError::HttpStatus { status, body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "syntax error in line 1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_endpoint_without_local_graphviz_is_a_configuration_error() {
    let settings = RenderSettings {
        endpoint: None,
        local_enabled: false,
        ..RenderSettings::default()
    };
    let renderer = FallbackRenderer::from_settings(&settings).expect("renderer should build");

    let failure = renderer
        .render("digraph {}", LayoutEngine::Hierarchical)
        .await
        .expect_err("render should fail");

    assert!(matches!(failure.error, RenderError::Configuration(_)));
}
