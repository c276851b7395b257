use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::view::{ViewEvent, ViewSession};

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<ViewSession>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

pub fn router(session: ViewSession) -> Router {
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
    };
    Router::new()
        .route("/health", get(handle_health))
        .route("/state", get(handle_state))
        .route("/open", post(handle_open))
        .route("/events", post(handle_event))
        .route("/pushes", get(handle_pushes))
        .with_state(state)
}

pub async fn run_http_server(session: ViewSession, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind HTTP server to `{bind}`"))?;
    let local_addr = listener.local_addr().ok();

    info!(
        solution_count = session.solutions().len(),
        requested_bind = %bind,
        bound_addr = local_addr.map(|addr| addr.to_string()),
        "starting HTTP server"
    );

    serve_on(listener, session).await
}

pub async fn serve_on(listener: TcpListener, session: ViewSession) -> Result<()> {
    axum::serve(listener, router(session))
        .await
        .context("HTTP server exited with an error")
}

async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn handle_state(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    Json(session.state()).into_response()
}

async fn handle_open(State(state): State<AppState>) -> Response {
    let mut session = state.session.lock().await;
    Json(session.open().await).into_response()
}

async fn handle_event(
    State(state): State<AppState>,
    event: Result<Json<ViewEvent>, JsonRejection>,
) -> Response {
    let Json(event) = match event {
        Ok(event) => event,
        Err(rejection) => {
            warn!(error = %rejection, "rejected malformed view event");
            let body = ErrorBody {
                error: rejection.body_text(),
            };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let mut session = state.session.lock().await;
    let pushes = session.handle_event(event).await;
    (StatusCode::OK, Json(pushes)).into_response()
}

// Starts with the current state, then relays every push until the client goes away.
async fn handle_pushes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (initial, receiver) = {
        let mut session = state.session.lock().await;
        (session.state(), session.subscribe())
    };
    debug!("view subscribed to pushes");

    let initial = stream::once(async move { Event::default().event("state").json_data(&initial) });
    let pushes = stream::unfold(receiver, |mut receiver| async move {
        let push = receiver.recv().await?;
        let event = Event::default().event("push").json_data(&push);
        Some((event, receiver))
    });
    Sse::new(initial.chain(pushes)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::router;
    use crate::config::Settings;
    use crate::context::AppContext;
    use crate::snapshot::SessionSnapshot;
    use crate::test_support::{RecordingRenderer, solution};
    use crate::view::ViewSession;

    fn test_router() -> axum::Router {
        let context =
            AppContext::with_renderer(Settings::default(), Arc::new(RecordingRenderer::new()));
        let snapshot = SessionSnapshot::new(vec![solution("A", "alpha", "Acme")], Vec::new());
        router(ViewSession::new(snapshot, &context))
    }

    #[tokio::test]
    async fn malformed_events_are_bad_requests() {
        let response = test_router()
            .oneshot(
                Request::post("/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"command":"reload"}"#))
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body: serde_json::Value =
            serde_json::from_slice(&body).expect("error body should be JSON");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn state_reports_overview_with_nothing_picked() {
        let response = test_router()
            .oneshot(
                Request::get("/state")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let state: serde_json::Value = serde_json::from_slice(&body).expect("state should be JSON");
        assert_eq!(state["mode"], "overview");
        assert_eq!(state["solutionCount"], 1);
        assert_eq!(state["picked"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn pushes_open_an_event_stream_with_the_current_state() {
        let response = test_router()
            .oneshot(
                Request::get("/pushes")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
    }
}
