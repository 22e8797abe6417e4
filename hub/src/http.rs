//! The thin HTTP surface:
//! a `/rpc` endpoint sharing the TCP command dispatcher, a `/ws` upgrade
//! onto the same per-environment [`crate::ws::Broadcaster`], and
//! three read-only REST-style projections (task list/CRUD, the task
//! queue, and analytics) built directly on the Store rather than
//! duplicating route-handler logic elsewhere — the core only exposes the
//! capability boundary, not full route shape.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use task_daemon_core::models::TaskStatus;
use tracing::warn;

use crate::commands::{CommandRegistry, DispatchContext};
use crate::registry::EnvironmentRegistry;
use crate::request_logger::rpc_logging_middleware;
use crate::wire::WireRequest;

#[derive(Clone)]
pub struct HttpState {
    pub registry: Arc<CommandRegistry>,
    pub ctx: Arc<DispatchContext>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rpc", post(rpc))
        .route("/ws", get(ws_upgrade))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/queue", get(task_queue))
        .route("/tasks/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/analytics", get(analytics))
        .layer(middleware::from_fn(rpc_logging_middleware))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn rpc(State(state): State<HttpState>, Json(request): Json<WireRequest>) -> impl IntoResponse {
    let response = state.registry.dispatch(&state.ctx, request).await;
    let status = if response.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    (status, Json(response))
}

fn env_from_query(registry: &EnvironmentRegistry, params: &HashMap<String, String>) -> crate::error::Result<Arc<crate::registry::EnvServices>> {
    registry.resolve(params.get("environment").map(String::as_str)).map(Arc::clone)
}

async fn list_tasks(State(state): State<HttpState>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    dispatch_thin(&state, "list_tasks", &params, Value::Null).await
}

async fn get_task(State(state): State<HttpState>, Path(id): Path<String>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    dispatch_thin(&state, "get_task", &params, json!({ "id": id })).await
}

async fn create_task(State(state): State<HttpState>, Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>) -> impl IntoResponse {
    dispatch_thin(&state, "create_task", &params, body).await
}

async fn update_task(State(state): State<HttpState>, Path(id): Path<String>, Query(params): Query<HashMap<String, String>>, Json(mut body): Json<Value>) -> impl IntoResponse {
    if let Value::Object(ref mut map) = body {
        map.insert("id".to_string(), json!(id));
    }
    dispatch_thin(&state, "update_task", &params, body).await
}

async fn delete_task(State(state): State<HttpState>, Path(id): Path<String>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    dispatch_thin(&state, "delete_task", &params, json!({ "id": id })).await
}

async fn dispatch_thin(state: &HttpState, command: &str, params: &HashMap<String, String>, data: Value) -> impl IntoResponse {
    let request = WireRequest { command: command.to_string(), data, environment: params.get("environment").cloned() };
    let response = state.registry.dispatch(&state.ctx, request).await;
    let status = if response.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    (status, Json(response))
}

/// `GET /tasks/queue`: Store tasks filtered to `todo`, ordered by
/// priority desc then `createdAt` asc.
async fn task_queue(State(state): State<HttpState>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let services = match env_from_query(&state.ctx.registry, &params) {
        Ok(s) => s,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    };
    let tasks = match services.store.scan().await {
        Ok(t) => t,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response(),
    };
    let mut queue: Vec<_> = tasks.into_iter().filter(|t| t.status == TaskStatus::Todo).collect();
    queue.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
    Json(queue).into_response()
}

/// `GET /analytics`: totals by status/priority, creation/completion
/// timelines bucketed per day, average completion duration, and a
/// productivity score. The
/// productivity score is `done / total` — simple and monotonic in
/// completion rate; no weighting scheme is named in the source this was
/// distilled from.
async fn analytics(State(state): State<HttpState>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let services = match env_from_query(&state.ctx.registry, &params) {
        Ok(s) => s,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    };
    let tasks = match services.store.scan().await {
        Ok(t) => t,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response(),
    };

    let total = tasks.len();
    let mut by_status: HashMap<String, u64> = HashMap::new();
    let mut by_priority: HashMap<String, u64> = HashMap::new();
    let mut created_by_day: HashMap<String, u64> = HashMap::new();
    let mut completed_by_day: HashMap<String, u64> = HashMap::new();
    let mut completion_durations_secs: Vec<i64> = Vec::new();
    let mut done = 0u64;

    for task in &tasks {
        *by_status.entry(task.status.to_string()).or_insert(0) += 1;
        *by_priority.entry(task.priority.to_string()).or_insert(0) += 1;
        *created_by_day.entry(day_bucket(task.created_at)).or_insert(0) += 1;
        if task.status == TaskStatus::Done {
            done += 1;
            *completed_by_day.entry(day_bucket(task.updated_at)).or_insert(0) += 1;
            completion_durations_secs.push((task.updated_at - task.created_at).num_seconds());
        }
    }

    let avg_completion_secs = if completion_durations_secs.is_empty() {
        0.0
    } else {
        completion_durations_secs.iter().sum::<i64>() as f64 / completion_durations_secs.len() as f64
    };
    let productivity_score = if total == 0 { 0.0 } else { done as f64 / total as f64 };

    Json(json!({
        "totalTasks": total,
        "byStatus": by_status,
        "byPriority": by_priority,
        "createdByDay": created_by_day,
        "completedByDay": completed_by_day,
        "averageCompletionSeconds": avg_completion_secs,
        "productivityScore": productivity_score,
    }))
    .into_response()
}

fn day_bucket(at: chrono::DateTime<Utc>) -> String {
    format!("{:04}-{:02}-{:02}", at.year(), at.month(), at.day())
}

/// `/ws`: accepts the upgrade, then hands the socket off to the
/// default-resolved environment's broadcaster.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let services = match env_from_query(&state.ctx.registry, &params) {
        Ok(s) => s,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, services)).into_response()
}

async fn handle_socket(socket: axum::extract::ws::WebSocket, services: Arc<crate::registry::EnvServices>) {
    let (mut sink, mut stream) = futures_util::StreamExt::split(socket);
    let (id, mut rx) = services.broadcaster.connect().await;

    // Initial empty tasks_list.
    let initial = json!({ "id": id, "event": { "type": "tasks_list", "timestamp": Utc::now(), "data": {} } });
    if futures_util::SinkExt::send(&mut sink, Message::Text(initial.to_string())).await.is_err() {
        services.broadcaster.disconnect(&id).await;
        return;
    }

    let outbound_id = id.clone();
    let broadcaster = services.broadcaster.clone();
    let forward = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if futures_util::SinkExt::send(&mut sink, message).await.is_err() {
                break;
            }
        }
        broadcaster.disconnect(&outbound_id).await;
    });

    while let Some(Ok(message)) = futures_util::StreamExt::next(&mut stream).await {
        match message {
            Message::Text(text) => {
                services.broadcaster.touch(&id).await;
                services.broadcaster.handle_client_message(&id, &text).await;
            }
            Message::Pong(_) | Message::Ping(_) => {
                services.broadcaster.touch(&id).await;
            }
            Message::Close(_) => break,
            Message::Binary(_) => {}
        }
    }

    services.broadcaster.disconnect(&id).await;
    forward.abort();
    warn!(client = %id, "websocket client disconnected");
}
