use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use solution_graph::config::Settings;
use solution_graph::context::AppContext;
use solution_graph::graph::{build_dependency_graph, build_overview_graph};
use solution_graph::render::{GraphRenderer, LayoutEngine};
use solution_graph::server::run_http_server;
use solution_graph::snapshot::SessionSnapshot;
use solution_graph::source::{
    DataverseClient, FetchProgress, StaticTokenProvider, load_environment,
};
use solution_graph::view::{ViewPush, ViewSession};

#[derive(Debug, Parser)]
#[command(
    name = "solution-graph",
    about = "Dependency graphs for business-application solutions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a graph from a snapshot file.
    Render {
        /// Snapshot file (.json, .yaml or .yml).
        snapshot: PathBuf,
        /// Render the solution-level overview instead of the detailed graph.
        #[arg(long)]
        overview: bool,
        /// Focus the detailed graph on one solution id.
        #[arg(long)]
        solution: Option<String>,
        /// Layout engine; defaults to RENDER_ENGINE.
        #[arg(long)]
        engine: Option<LayoutEngine>,
        /// Write the graph text instead of rendering it.
        #[arg(long)]
        dot: bool,
        /// Output path; stdout when omitted.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Serve the interactive view over HTTP.
    Serve {
        /// Snapshot file to open; fetched from DATAVERSE_URL when omitted.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        bind: Option<String>,
    },
    /// Fetch solutions and dependencies from an environment into a snapshot.
    Fetch {
        /// Environment URL; defaults to DATAVERSE_URL.
        #[arg(long)]
        environment: Option<String>,
        #[arg(long, short)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _file_log_guard = init_tracing()?;

    let cli = Cli::parse();
    let settings = Settings::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Render {
            snapshot,
            overview,
            solution,
            engine,
            dot,
            out,
        } => {
            let snapshot = SessionSnapshot::load(&snapshot)?;
            let graph_text = if overview {
                build_overview_graph(&snapshot.solutions, &snapshot.dependencies, &BTreeSet::new())
            } else {
                build_dependency_graph(
                    &snapshot.solutions,
                    &snapshot.dependencies,
                    &snapshot.effective_type_names(),
                    solution.as_deref(),
                    &settings.graph,
                )
            };

            if dot {
                return write_output(out.as_deref(), &graph_text);
            }

            let engine = engine.unwrap_or(settings.render.engine);
            let context = AppContext::from_settings(settings)?;
            match context.renderer.render(&graph_text, engine).await {
                Ok(rendered) => {
                    info!(backend = rendered.backend.as_str(), "rendered graph");
                    write_output(out.as_deref(), &rendered.svg)?;
                }
                Err(failure) => {
                    let fallback = out
                        .as_deref()
                        .map(|path| path.with_extension("dot"))
                        .unwrap_or_else(|| PathBuf::from("dependencies.dot"));
                    fs::write(&fallback, &failure.graph_text).with_context(|| {
                        format!("failed to write graph text to `{}`", fallback.display())
                    })?;
                    bail!(
                        "failed to render graph: {}; graph text written to `{}`",
                        failure.error,
                        fallback.display()
                    );
                }
            }
        }
        Commands::Serve { snapshot, bind } => {
            let bind = bind.unwrap_or_else(|| settings.server_bind.clone());
            let session = match snapshot {
                Some(path) => {
                    let snapshot = SessionSnapshot::load(&path)?;
                    ViewSession::new(snapshot, &AppContext::from_settings(settings)?)
                }
                None => {
                    let (client, environment) = dataverse_client(&settings, None)?;
                    let context = AppContext::from_settings(settings)?;
                    let (sender, receiver) = unbounded_channel();
                    tokio::spawn(log_pushes(receiver));
                    ViewSession::fetch(&client, &environment, &context, sender)
                        .await
                        .with_context(|| format!("failed to load environment `{environment}`"))?
                }
            };
            run_http_server(session, &bind).await?;
        }
        Commands::Fetch { environment, out } => {
            let snapshot = fetch_snapshot(&settings, environment).await?;
            snapshot.save(&out)?;
            info!(
                path = %out.display(),
                solution_count = snapshot.solutions.len(),
                "saved snapshot"
            );
        }
    }

    Ok(())
}

fn dataverse_client(
    settings: &Settings,
    environment: Option<String>,
) -> Result<(DataverseClient, String)> {
    let environment = environment
        .or_else(|| settings.dataverse_url.clone())
        .ok_or_else(|| anyhow!("DATAVERSE_URL is required when no environment is given"))?;
    let token = settings
        .dataverse_token
        .clone()
        .ok_or_else(|| anyhow!("DATAVERSE_TOKEN is required to fetch from `{environment}`"))?;

    let client = DataverseClient::new(
        Arc::new(StaticTokenProvider::new(token)),
        settings.tenant_id.clone(),
        Duration::from_millis(settings.request_timeout_ms),
    )?;
    Ok((client, environment))
}

async fn fetch_snapshot(settings: &Settings, environment: Option<String>) -> Result<SessionSnapshot> {
    let (client, environment) = dataverse_client(settings, environment)?;
    let snapshot = load_environment(&client, &environment, |progress| {
        log_progress(&progress);
    })
    .await
    .with_context(|| format!("failed to load environment `{environment}`"))?;
    Ok(snapshot)
}

fn log_progress(progress: &FetchProgress) {
    info!(
        completed = progress.completed,
        total = progress.total,
        "collecting solution dependencies"
    );
}

// Server-side listener of the served session; views subscribe over `/pushes`.
async fn log_pushes(mut receiver: UnboundedReceiver<ViewPush>) {
    while let Some(push) = receiver.recv().await {
        match push {
            ViewPush::Progress(progress) => log_progress(&progress),
            ViewPush::Notify { level, message } => {
                info!(level = ?level, message = %message, "view notification");
            }
            other => debug!(push = ?other, "view push"),
        }
    }
}

fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, contents)
            .with_context(|| format!("failed to write `{}`", path.display())),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,solution_graph=debug"));
    let console = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let (file_layer, guard) = match env::var("SOLUTION_GRAPH_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let file_filter = env::var("SOLUTION_GRAPH_FILE_LOG").unwrap_or_else(|_| "info".to_owned());
            let file_filter = EnvFilter::try_new(&file_filter)
                .with_context(|| format!("invalid SOLUTION_GRAPH_FILE_LOG `{file_filter}`"))?;
            let appender = tracing_appender::rolling::daily(dir.trim(), "solution-graph.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;
    Ok(guard)
}
