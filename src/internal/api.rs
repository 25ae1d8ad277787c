use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::internal::{
    exec::dispatch::CapabilityRegistry,
    exec::runner::{Runner, RunnerError},
    plan::ir::Plan,
    policy::policy::RuleSet,
    schema::validate::ActionSchema,
    trace::trace::{PlanStatus, TraceArtifact},
};

/// Immutable registry and rule set shared across requests; per-run
/// state lives in the runner's own recorder, so concurrent plan
/// executions cannot interfere.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CapabilityRegistry>,
    pub rules: Arc<RuleSet>,
    pub artifacts: Arc<RwLock<HashMap<String, TraceArtifact>>>,
}

impl AppState {
    pub fn new(registry: CapabilityRegistry, rules: RuleSet) -> Self {
        Self {
            registry: Arc::new(registry),
            rules: Arc::new(rules),
            artifacts: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/plan/execute", post(execute_plan))
        .route("/v1/trace/:run_id", get(get_trace))
        .route("/v1/skills", get(list_skills))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub plan: Plan,
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub run_id: String,
    pub status: PlanStatus,
    pub halted_step: Option<String>,
    pub trace_url: String,
}

async fn execute_plan(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, (StatusCode, Json<serde_json::Value>)> {
    let runner = Runner::new(&state.registry, &state.rules);

    // Structural plan errors are a 400; per-step failures come back as
    // a 200 with an aborted artifact.
    let artifact = match runner.run(&request.plan).await {
        Ok(artifact) => artifact,
        Err(RunnerError::Plan(e)) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Invalid plan: {}", e) })),
            ));
        }
        Err(e) => {
            tracing::error!("plan execution fault: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            ));
        }
    };

    let response = ExecuteResponse {
        run_id: artifact.run_id.clone(),
        status: artifact.status,
        halted_step: artifact.halted_step.clone(),
        trace_url: format!("/v1/trace/{}", artifact.run_id),
    };

    let mut artifacts = state.artifacts.write().await;
    artifacts.insert(artifact.run_id.clone(), artifact);

    Ok(Json(response))
}

async fn get_trace(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TraceArtifact>, (StatusCode, Json<serde_json::Value>)> {
    let artifacts = state.artifacts.read().await;
    let artifact = artifacts.get(&run_id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Run {} not found", run_id) })),
        )
    })?;
    Ok(Json(artifact.clone()))
}

#[derive(Serialize)]
pub struct SkillListing {
    pub name: String,
    pub schema: ActionSchema,
}

async fn list_skills(State(state): State<AppState>) -> Json<Vec<SkillListing>> {
    let listings = state
        .registry
        .names()
        .into_iter()
        .filter_map(|name| {
            state.registry.schema_for(&name).map(|schema| SkillListing {
                schema: schema.clone(),
                name,
            })
        })
        .collect();
    Json(listings)
}
