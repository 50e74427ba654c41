// HTTP command surface for chat connectors.
//
// The connector supplies identity (opaque community/user ids) and
// permission flags with each request and delivers the reply text and
// rendered sheet back to the chat platform. Role resolution, prompting,
// and message delivery all live on the connector side.

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::commands::{BingoService, CreateOutcome, Requester};
use crate::error::BingoError;
use crate::metrics;
use crate::render;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RequesterBody {
    pub user: String,
    #[serde(default)]
    pub is_administrator: bool,
    #[serde(default)]
    pub has_designated_role: bool,
}

impl From<RequesterBody> for Requester {
    fn from(body: RequesterBody) -> Requester {
        Requester {
            user: body.user,
            is_administrator: body.is_administrator,
            has_designated_role: body.has_designated_role,
        }
    }
}

#[derive(Deserialize)]
pub struct SetCluesRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
    pub submission: String,
}

#[derive(Deserialize)]
pub struct ResetCluesRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
}

#[derive(Deserialize)]
pub struct CreateBoardRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
    pub target_user: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolveConfirmationRequest {
    pub accepted: bool,
}

#[derive(Deserialize)]
pub struct MarkRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
    pub square: String,
}

#[derive(Deserialize)]
pub struct UnmarkRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
}

#[derive(Deserialize)]
pub struct FreeSpaceRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
    pub toggle: String,
}

#[derive(Deserialize)]
pub struct RequiredRoleRequest {
    #[serde(flatten)]
    pub requester: RequesterBody,
    pub role: String,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> axum::response::Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn error_response(e: BingoError) -> axum::response::Response {
    if let BingoError::Io(inner) = &e {
        tracing::error!("Storage error: {inner}");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }
    json_error(e.status(), &e.to_string())
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(service: Arc<BingoService>) -> Router {
    Router::new()
        // Clue pool
        .route(
            "/api/communities/{community}/clues",
            get(list_clues).post(set_clues),
        )
        .route("/api/communities/{community}/clues/reset", post(reset_clues))
        // Settings
        .route("/api/communities/{community}/settings", get(get_settings))
        .route(
            "/api/communities/{community}/settings/free-space",
            put(set_free_space),
        )
        .route(
            "/api/communities/{community}/settings/required-role",
            put(set_required_role),
        )
        // Sheets
        .route("/api/communities/{community}/boards", post(create_board))
        .route(
            "/api/communities/{community}/confirmations/{token}",
            post(resolve_confirmation),
        )
        .route("/api/communities/{community}/boards/{user}", get(view_board))
        .route(
            "/api/communities/{community}/boards/{user}/image",
            get(board_image),
        )
        .route(
            "/api/communities/{community}/boards/{user}/marks",
            post(mark_square),
        )
        .route(
            "/api/communities/{community}/boards/{user}/marks/{square}",
            delete(unmark_square),
        )
        // Observability
        .route("/metrics", get(get_metrics))
        .with_state(service)
}

// ── Clue pool handlers ────────────────────────────────────────────────

async fn list_clues(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
) -> impl IntoResponse {
    match service.list_clue_pool(&community).await {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_clues(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
    Json(req): Json<SetCluesRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service
        .set_clue_pool(&requester, &community, &req.submission)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn reset_clues(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
    Json(req): Json<ResetCluesRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service.reset_clue_pool(&requester, &community).await {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Settings handlers ─────────────────────────────────────────────────

async fn get_settings(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
) -> impl IntoResponse {
    match service.get_settings(&community).await {
        // Expose only what the connector needs; per-user win state stays
        // internal.
        Ok(settings) => (
            StatusCode::OK,
            Json(json!({
                "free_space_enabled": settings.free_space_enabled,
                "required_role": settings.required_role,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_free_space(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
    Json(req): Json<FreeSpaceRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service
        .set_free_space(&requester, &community, &req.toggle)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_required_role(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
    Json(req): Json<RequiredRoleRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service
        .set_required_role(&requester, &community, &req.role)
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Sheet handlers ────────────────────────────────────────────────────

async fn create_board(
    State(service): State<Arc<BingoService>>,
    Path(community): Path<String>,
    Json(req): Json<CreateBoardRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service
        .create_board(&requester, &community, req.target_user.as_deref())
        .await
    {
        Ok(CreateOutcome::Created(reply)) => {
            (StatusCode::CREATED, Json(json!(reply))).into_response()
        }
        Ok(CreateOutcome::NeedsConfirmation { token, prompt }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "confirmation_token": token.to_string(),
                "message": prompt,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn resolve_confirmation(
    State(service): State<Arc<BingoService>>,
    Path((_community, token)): Path<(String, String)>,
    Json(req): Json<ResolveConfirmationRequest>,
) -> impl IntoResponse {
    let token = match Uuid::parse_str(&token) {
        Ok(token) => token,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid confirmation token"),
    };
    match service.resolve_confirmation(token, req.accepted).await {
        Ok(reply) => (StatusCode::CREATED, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn view_board(
    State(service): State<Arc<BingoService>>,
    Path((community, user)): Path<(String, String)>,
) -> impl IntoResponse {
    match service.view_board(&community, &user).await {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn board_image(
    State(service): State<Arc<BingoService>>,
    Path((community, user)): Path<(String, String)>,
) -> impl IntoResponse {
    let board = match service.load_board(&community, &user).await {
        Ok(board) => board,
        Err(e) => return error_response(e),
    };

    // Rasterizing is pure CPU work; keep it off the async workers.
    let renderer = service.clone();
    let encoded = tokio::task::spawn_blocking(move || {
        let timer = metrics::SHEET_RENDER_SECONDS.start_timer();
        let img = render::render_board(&board, renderer.font(), renderer.render_options());
        timer.observe_duration();
        render::encode_png(&img)
    })
    .await;

    match encoded {
        Ok(Ok(png)) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => {
            tracing::error!("Sheet render task failed: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn mark_square(
    State(service): State<Arc<BingoService>>,
    Path((community, user)): Path<(String, String)>,
    Json(req): Json<MarkRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service
        .mark_cell(&requester, &community, &req.square, Some(&user))
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn unmark_square(
    State(service): State<Arc<BingoService>>,
    Path((community, user, square)): Path<(String, String, String)>,
    Json(req): Json<UnmarkRequest>,
) -> impl IntoResponse {
    let requester = req.requester.into();
    match service
        .unmark_cell(&requester, &community, &square, Some(&user))
        .await
    {
        Ok(reply) => (StatusCode::OK, Json(json!(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Metrics handler ───────────────────────────────────────────────────

async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
