use crate::{ApiError, AppState, UserId};
use actix_web::{get, post, web, HttpResponse, Responder};
use actix_ws::Message;
use scrapecore::{ExecutionId, WorkflowExecution, WorkflowId, WorkflowRecord};
use scraperuntime::TriggerRequest;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use uuid::Uuid;

/// Request body for workflow creation
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    /// The editor graph, as an object or as its JSON text.
    pub definition: serde_json::Value,
}

/// Optional body for plan and run requests.
///
/// Without a definition the saved graph of the workflow is used.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub definition: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub execution_id: ExecutionId,
}

#[derive(Debug, Deserialize)]
struct EventFilter {
    execution_id: Option<ExecutionId>,
}

fn definition_text(definition: serde_json::Value) -> String {
    match definition {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

async fn owned_workflow(
    data: &AppState,
    user: &UserId,
    workflow_id: WorkflowId,
) -> Result<WorkflowRecord, ApiError> {
    let workflow = data.runtime.store().get_workflow(workflow_id).await?;
    if workflow.user_id != user.0 {
        return Err(ApiError::Forbidden(format!("workflow {}", workflow_id)));
    }
    Ok(workflow)
}

async fn owned_execution(
    data: &AppState,
    user: &UserId,
    execution_id: ExecutionId,
) -> Result<WorkflowExecution, ApiError> {
    let execution = data.runtime.store().get_execution(execution_id).await?;
    if execution.user_id != user.0 {
        return Err(ApiError::Forbidden(format!("execution {}", execution_id)));
    }
    Ok(execution)
}

/// Health check endpoint
#[get("/health")]
pub(crate) async fn health_check(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "scrapeserver",
        "active_runs": data.runtime.active_runs(),
    }))
}

/// Task catalog
#[get("/api/tasks")]
pub(crate) async fn list_tasks(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.runtime.catalog().definitions())
}

#[post("/api/workflows")]
pub(crate) async fn create_workflow(
    data: web::Data<AppState>,
    user: UserId,
    body: web::Json<CreateWorkflowRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("workflow name is required".to_string()));
    }
    let workflow = data
        .runtime
        .create_workflow(&user.0, body.name.trim(), definition_text(body.definition))
        .await?;
    Ok(HttpResponse::Created().json(workflow))
}

#[get("/api/workflows/{id}")]
pub(crate) async fn get_workflow(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let workflow = owned_workflow(&data, &user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(workflow))
}

#[get("/api/workflows/{id}/executions")]
pub(crate) async fn list_executions(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let workflow = owned_workflow(&data, &user, path.into_inner()).await?;
    let executions = data.runtime.store().list_executions(workflow.id).await?;
    Ok(HttpResponse::Ok().json(executions))
}

/// Compile a graph into phases without running it.
#[post("/api/workflows/{id}/plan")]
pub(crate) async fn plan_workflow(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
    body: Option<web::Json<RunRequest>>,
) -> Result<HttpResponse, ApiError> {
    let workflow = owned_workflow(&data, &user, path.into_inner()).await?;
    let definition = body
        .and_then(|b| b.into_inner().definition)
        .map(definition_text)
        .unwrap_or(workflow.definition);
    let plan = data.runtime.plan(&definition)?;
    Ok(HttpResponse::Ok().json(plan))
}

/// Start a run in the background
#[post("/api/workflows/{id}/run")]
pub(crate) async fn run_workflow(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
    body: Option<web::Json<RunRequest>>,
) -> Result<HttpResponse, ApiError> {
    let workflow = owned_workflow(&data, &user, path.into_inner()).await?;
    let definition = body
        .and_then(|b| b.into_inner().definition)
        .map(definition_text)
        .unwrap_or(workflow.definition);

    let execution_id = data
        .runtime
        .trigger(TriggerRequest {
            workflow_id: workflow.id,
            user_id: user.0,
            definition,
        })
        .await?;

    info!("Triggered workflow {}: execution {}", workflow.id, execution_id);
    Ok(HttpResponse::Accepted().json(RunResponse { execution_id }))
}

#[get("/api/executions/{id}")]
pub(crate) async fn get_execution(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let execution = owned_execution(&data, &user, path.into_inner()).await?;
    let report = data.runtime.execution_report(execution.id).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[post("/api/executions/{id}/stop")]
pub(crate) async fn stop_execution(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let execution = owned_execution(&data, &user, path.into_inner()).await?;
    data.runtime.stop(execution.id).await?;
    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "message": "Stop requested"
    })))
}

#[get("/api/phases/{id}")]
pub(crate) async fn get_phase(
    data: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let details = data.runtime.phase_details(path.into_inner()).await?;
    owned_execution(&data, &user, details.phase.execution_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

/// WebSocket endpoint for real-time events
#[get("/api/events")]
pub(crate) async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    filter: web::Query<EventFilter>,
) -> actix_web::Result<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let only = filter.into_inner().execution_id;

    info!("WebSocket client connected");

    // Subscribe to events
    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if only.is_some_and(|id| id != event.execution_id()) {
                                continue;
                            }
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "WebSocket client lagging behind events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}
