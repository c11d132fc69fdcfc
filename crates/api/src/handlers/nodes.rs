//! Handlers for the `/nodes` resource: admin CRUD, registration, heartbeats,
//! remote command execution, and credential binding.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use issuefleet_core::command::{build_command_request, resolve_timeout, CommandResult};
use issuefleet_core::error::CoreError;
use issuefleet_core::node_pool::{
    resolve_heartbeat_timestamp, validate_node_address, validate_node_name, validate_tags,
};
use issuefleet_core::registration_key::docker_command;
use issuefleet_core::types::{DbId, Timestamp};
use issuefleet_db::models::credential::Credential;
use issuefleet_db::models::node::{CreateNode, Node, NodeHeartbeat, RegisterNode, UpdateNode};
use issuefleet_db::models::registration_key::RegistrationKey;
use issuefleet_db::repositories::{CredentialRepo, NodeRepo, RegistrationKeyRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::query::CategoryParams;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;
use crate::workflow;

/// Active registration key and the command that starts a node agent with it.
#[derive(Debug, Serialize)]
pub struct RegistrationKeyInfo {
    pub registration_key: String,
    pub docker_command: String,
    pub created_at: Timestamp,
}

/// Body of `POST /nodes/{id}/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub timeout_secs: Option<u64>,
}

fn validate_node_fields(
    name: Option<&str>,
    ip: Option<&str>,
    tags: Option<&[String]>,
) -> Result<(), CoreError> {
    if let Some(name) = name {
        validate_node_name(name)?;
    }
    if let Some(ip) = ip {
        validate_node_address(ip)?;
    }
    if let Some(tags) = tags {
        validate_tags(tags)?;
    }
    Ok(())
}

fn key_info(state: &AppState, key: RegistrationKey) -> AppResult<RegistrationKeyInfo> {
    let registration_key = key.key_value.ok_or_else(|| {
        AppError::InternalError(format!("Active registration key {} has no value", key.id))
    })?;
    let docker_command = docker_command(
        &state.config.public_server_url,
        &state.config.node_agent_image,
        state.config.node_agent_port,
        &registration_key,
    );
    Ok(RegistrationKeyInfo {
        registration_key,
        docker_command,
        created_at: key.created_at,
    })
}

// ---------------------------------------------------------------------------
// Admin CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/nodes
pub async fn list(State(state): State<AppState>) -> AppResult<Json<ListResponse<Node>>> {
    let nodes = NodeRepo::list(&state.pool).await?;
    Ok(Json(nodes.into()))
}

/// POST /api/v1/nodes
pub async fn create(
    State(state): State<AppState>,
    AppJson(input): AppJson<CreateNode>,
) -> AppResult<(StatusCode, Json<DataResponse<Node>>)> {
    validate_node_fields(Some(&input.name), Some(&input.ip), input.tags.as_deref())?;
    let node = NodeRepo::create(&state.pool, &input).await?;
    tracing::info!(node_id = node.id, name = %node.name, "Node created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: node })))
}

/// GET /api/v1/nodes/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Node>>> {
    let node = workflow::find_node(&state, id).await?;
    Ok(Json(DataResponse { data: node }))
}

/// PUT /api/v1/nodes/{id}
///
/// `status` and `last_heartbeat` are owned by heartbeats and dispatch; they
/// may be echoed back unchanged but not edited.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateNode>,
) -> AppResult<Json<DataResponse<Node>>> {
    validate_node_fields(
        input.name.as_deref(),
        input.ip.as_deref(),
        input.tags.as_deref(),
    )?;

    let current = workflow::find_node(&state, id).await?;
    if input.status.is_some_and(|s| s != current.status) {
        return Err(CoreError::Validation("Node status is read-only".to_string()).into());
    }
    if input.last_heartbeat.is_some() && input.last_heartbeat != current.last_heartbeat {
        return Err(CoreError::Validation("last_heartbeat is read-only".to_string()).into());
    }

    let node = NodeRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "node", id }))?;
    Ok(Json(DataResponse { data: node }))
}

/// DELETE /api/v1/nodes/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if NodeRepo::soft_delete(&state.pool, id).await? {
        tracing::info!(node_id = id, "Node deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound { entity: "node", id }))
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// GET /api/v1/nodes/registration-key
pub async fn registration_key(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<RegistrationKeyInfo>>> {
    let key =
        RegistrationKeyRepo::ensure_active(&state.pool, state.config.registration_key.as_deref())
            .await?;
    Ok(Json(DataResponse {
        data: key_info(&state, key)?,
    }))
}

/// POST /api/v1/nodes/registration-key/rotate
pub async fn rotate_registration_key(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<RegistrationKeyInfo>>> {
    let key = RegistrationKeyRepo::rotate(&state.pool).await?;
    Ok(Json(DataResponse {
        data: key_info(&state, key)?,
    }))
}

/// POST /api/v1/nodes/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterNode>,
) -> AppResult<Json<DataResponse<Node>>> {
    validate_node_fields(Some(&input.name), Some(&input.ip), input.tags.as_deref())?;
    let node = NodeRepo::register(&state.pool, &input).await?;
    Ok(Json(DataResponse { data: node }))
}

/// POST /api/v1/nodes/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    AppJson(input): AppJson<NodeHeartbeat>,
) -> AppResult<Json<DataResponse<Node>>> {
    let at = resolve_heartbeat_timestamp(input.timestamp, Utc::now())?;
    let node = NodeRepo::heartbeat(&state.pool, input.node_id, input.status, at).await?;
    tracing::debug!(node_id = node.id, status = %node.status, "Heartbeat recorded");
    Ok(Json(DataResponse { data: node }))
}

// ---------------------------------------------------------------------------
// Execution and credentials
// ---------------------------------------------------------------------------

/// POST /api/v1/nodes/{id}/execute
pub async fn execute(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<ExecuteCommand>,
) -> AppResult<Json<DataResponse<CommandResult>>> {
    let timeout = resolve_timeout(input.timeout_secs, state.config.node_command_timeout_secs)?;
    let request = build_command_request(&input.command, &input.args, input.working_dir.as_deref())?;
    let node = workflow::find_node(&state, id).await?;

    let result = workflow::execute_on_node(&state, &node, &request, timeout).await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/nodes/{id}/credential
///
/// Returns the unmasked secret; callers are node agents about to run a job.
pub async fn credential(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    AppQuery(params): AppQuery<CategoryParams>,
) -> AppResult<Json<DataResponse<Credential>>> {
    workflow::find_node(&state, id).await?;
    let credential = CredentialRepo::bind_for_node(&state.pool, id, params.category).await?;
    Ok(Json(DataResponse { data: credential }))
}
