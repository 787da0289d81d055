//! Router and the JSON host integration endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use datatable_storage::SchemaUpdate;
use serde::{Deserialize, Serialize};

use crate::browse;
use crate::error::{ApiError, ApiResult};
use crate::hooks::{DeleteOutcome, EditOutcome, RenderOutcome};
use crate::script::ScriptValue;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub page: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub page: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSelectRequest {
    /// Page whose script issues the select.
    pub page: String,
    pub table: String,
    #[serde(rename = "where", default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
}

fn required(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::missing_field(field));
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /hooks/edit
pub async fn edit_hook(
    State(state): State<AppState>,
    Json(req): Json<EditRequest>,
) -> ApiResult<Json<EditOutcome>> {
    required(&req.page, "page")?;
    let page = state.host.page(&req.page)?;
    Ok(Json(state.host.on_edit_complete(&page, &req.content)?))
}

/// POST /hooks/delete
pub async fn delete_hook(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> ApiResult<Json<DeleteOutcome>> {
    required(&req.page, "page")?;
    let page = state.host.page(&req.page)?;
    Ok(Json(state.host.on_page_delete(&page)?))
}

/// POST /hooks/render
pub async fn render_hook(
    State(state): State<AppState>,
    Json(req): Json<EditRequest>,
) -> ApiResult<Json<RenderOutcome>> {
    required(&req.page, "page")?;
    let page = state.host.page(&req.page)?;
    Ok(Json(state.host.render(&page, &req.content)?))
}

/// POST /hooks/schema
pub async fn schema_hook(State(state): State<AppState>) -> ApiResult<Json<SchemaUpdate>> {
    Ok(Json(state.host.apply_schema_updates()?))
}

/// POST /script/select
pub async fn script_select(
    State(state): State<AppState>,
    Json(req): Json<ScriptSelectRequest>,
) -> ApiResult<Json<ScriptValue>> {
    required(&req.page, "page")?;
    required(&req.table, "table")?;
    let page = state.host.page(&req.page)?;
    let value = state.host.script_select(
        &page,
        &req.table,
        req.filter.as_deref(),
        req.order_by.as_deref(),
    )?;
    Ok(Json(value))
}

/// GET /health/ping
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/tables", get(browse::tables_root))
        .route("/tables/*par", get(browse::tables_par))
        .route("/pages", get(browse::pages_root))
        .route("/pages/*par", get(browse::pages_par))
        .route("/data", get(browse::data_root))
        .route("/data/*par", get(browse::data_par))
        .route("/hooks/edit", post(edit_hook))
        .route("/hooks/delete", post(delete_hook))
        .route("/hooks/render", post(render_hook))
        .route("/hooks/schema", post(schema_hook))
        .route("/script/select", post(script_select))
        .route("/health/ping", get(ping))
        .with_state(state)
}
