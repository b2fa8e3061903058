//! HTTP API for the page bridge and the popup
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /message - Messaging action (`activate`, `deactivate`, `getStatus`, `calculate`)
//! - POST /event - User edit on the page (input is debounced, change runs now)
//! - PUT /page - Host re-render with new markup
//! - GET /page - Current markup, including written values
//! - GET /status - Activation flag, run count and last cycle

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::controller::{
    route_edit, spawn_consumer, Controller, ControllerStatus, EditRoute, SharedController,
};
use crate::core::triggers::{spawn_poller, Debouncer};
use crate::dom::PageDocument;
use crate::types::{Ack, CycleOutput, Request, Trigger, UserEdit};

/// Capacity of the trigger channel
const TRIGGER_BUFFER: usize = 32;

/// App state
pub struct AppState {
    pub controller: SharedController<PageDocument>,
    debouncer: Debouncer,
    /// Consumer and poller tasks, aborted with the state
    tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Wire the controller to its trigger sources. The poller only runs
    /// with `poll` set.
    pub fn new(controller: Controller<PageDocument>, config: &Config, poll: bool) -> Arc<Self> {
        let controller: SharedController<PageDocument> = Arc::new(Mutex::new(controller));
        let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
        let debounce = Duration::from_millis(config.timing.debounce_ms);
        let debouncer = Debouncer::spawn(debounce, tx.clone());
        let mut tasks = vec![spawn_consumer(controller.clone(), rx)];
        if poll {
            tasks.push(spawn_poller(Duration::from_millis(config.timing.poll_interval_ms), tx));
        }
        Arc::new(Self {
            controller,
            debouncer,
            tasks,
        })
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active: bool,
}

/// Reply to a reported user edit
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CycleOutput>,
}

/// New page content
#[derive(Debug, Deserialize)]
pub struct PageUpdate {
    pub markup: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Page update response
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub render: u32,
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/message", post(message))
        .route("/event", post(event))
        .route("/page", get(get_page).put(put_page))
        .route("/status", get(status))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let active = state.controller.lock().await.is_active();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        active,
    })
}

/// Messaging action
async fn message(State(state): State<Arc<AppState>>, Json(req): Json<Request>) -> Json<Ack> {
    let ack = state.controller.lock().await.handle_message(req.action).await;
    Json(ack)
}

/// User edit reported by the page bridge
async fn event(
    State(state): State<Arc<AppState>>,
    Json(edit): Json<UserEdit>,
) -> (StatusCode, Json<EventResponse>) {
    match route_edit(&edit) {
        EditRoute::Ignore => {
            debug!(kind = %edit.kind, tag = %edit.target.tag, "edit ignored");
            (StatusCode::OK, Json(EventResponse { accepted: false, output: None }))
        }
        EditRoute::Debounce => {
            state.debouncer.poke();
            (StatusCode::ACCEPTED, Json(EventResponse { accepted: true, output: None }))
        }
        EditRoute::Immediate => {
            let output = state.controller.lock().await.handle(Trigger::Change).await;
            (
                StatusCode::OK,
                Json(EventResponse {
                    accepted: true,
                    output: Some(output),
                }),
            )
        }
    }
}

/// Replace the page (host re-render)
async fn put_page(
    State(state): State<Arc<AppState>>,
    Json(update): Json<PageUpdate>,
) -> Json<PageResponse> {
    let mut controller = state.controller.lock().await;
    let doc = controller.document_mut();
    if let Some(url) = update.url {
        doc.set_url(url);
    }
    doc.replace_markup(&update.markup);
    Json(PageResponse {
        render: doc.render_count(),
    })
}

/// Current page markup
async fn get_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = state.controller.lock().await.document().to_html();
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

async fn status(State(state): State<Arc<AppState>>) -> Json<ControllerStatus> {
    Json(state.controller.lock().await.status())
}

/// Run the API server. The page is loaded once before serving, which may
/// auto-activate the controller.
pub async fn run_server(
    addr: &str,
    mut controller: Controller<PageDocument>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(output) = controller.on_load().await {
        info!(reason = %output.reason.code(), "initial cycle finished");
    }
    let state = AppState::new(controller, config, true);
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "storypoint API listening");
    println!("Storypoint API running on {}", addr);
    println!("  GET  /health   - Health check");
    println!("  POST /message  - Messaging action");
    println!("  POST /event    - Report a user edit");
    println!("  PUT  /page     - Replace page markup");
    println!("  GET  /page     - Current page markup");
    println!("  GET  /status   - Controller status");
    axum::serve(listener, router).await?;
    Ok(())
}
