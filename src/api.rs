use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    accounts::{self, AuthenticatedUser, CreateUserPayload, LoginPayload},
    app_state::AppState,
    birthdays::{self, BirthdayReport},
    config::AppConfig,
    contact::{self, ContactPayload},
    error::AppError,
    models::Node,
    threshold::{self, ThresholdReport},
    view::{self, FolderView},
};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

// --- Payloads ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderQuery {
    folder_id: Option<String>,
}

/// Saca el cuerpo JSON o lo convierte en un `AppError` con forma `{"error": ...}`.
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    public: &'static str,
) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::from_json_rejection(rejection, public))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/cron/storage-threshold",
            get(storage_threshold_handler).post(storage_threshold_handler),
        )
        .route(
            "/api/cron/birthdays",
            get(birthdays_handler).post(birthdays_handler),
        )
        .route("/api/user/contact", post(contact_handler))
        .route("/api/admin/create-user", post(create_user_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/users/:user_id/response-files", get(list_files_handler))
        .route(
            "/api/users/:user_id/response-files/view",
            get(folder_view_handler),
        )
        .with_state(app_state)
}

/// Compara la cabecera `x-admin-secret` con el secreto configurado. Sin
/// secreto configurado no pasa ninguna petición.
fn require_admin_secret(config: &AppConfig, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    match (config.admin_secret.as_deref(), presented) {
        (Some(expected), Some(given)) if expected == given => Ok(()),
        _ => {
            warn!("Petición rechazada: secreto de administración ausente o incorrecto");
            Err(AppError::Unauthorized)
        }
    }
}

// --- Handlers ---

#[axum::debug_handler]
async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(json!({ "status": "ok", "backend": state.store.backend() }))),
        Err(e) => {
            error!("Error en el health check del almacén: {e:#}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[axum::debug_handler]
async fn storage_threshold_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ThresholdReport>, AppError> {
    require_admin_secret(&state.config, &headers)?;

    let report = threshold::run_storage_threshold(state.store.as_ref())
        .await
        .map_err(|e| AppError::internal("Internal server error", e))?;
    Ok(Json(report))
}

#[axum::debug_handler]
async fn birthdays_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BirthdayReport>, AppError> {
    require_admin_secret(&state.config, &headers)?;

    let today = Utc::now().date_naive();
    let report = birthdays::run_birthdays(state.store.as_ref(), today)
        .await
        .map_err(|e| AppError::internal("Failed to process birthdays", e))?;
    Ok(Json(report))
}

#[axum::debug_handler]
async fn contact_handler(
    payload: Result<Json<ContactPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload, "Internal server error")?;
    let message = contact::validate(&payload).map_err(AppError::Validation)?;
    info!(
        subject = %message.subject,
        chars = message.message.chars().count(),
        "Mensaje de contacto de {} <{}>",
        message.name,
        message.email
    );
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Message sent successfully!" })),
    ))
}

#[axum::debug_handler]
async fn create_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateUserPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    require_admin_secret(&state.config, &headers)?;
    let payload = json_body(payload, "Server error.")?;

    let user =
        accounts::create_user(state.store.as_ref(), payload, state.config.bcrypt_cost).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[axum::debug_handler]
async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<AuthenticatedUser>, AppError> {
    let payload = json_body(payload, "Internal server error")?;
    let user = accounts::validate_credentials(state.store.as_ref(), payload).await?;
    info!(user_id = %user.id, "Credenciales válidas");
    Ok(Json(user))
}

#[axum::debug_handler]
async fn list_files_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Node>>, AppError> {
    require_admin_secret(&state.config, &headers)?;

    let records = state
        .store
        .list_response_files(&user_id)
        .await
        .map_err(|e| AppError::internal("Failed to fetch response files", e))?;
    Ok(Json(view::validate_records(records)))
}

/// Vista de una carpeta. Si el listado no se puede obtener se devuelve una
/// vista vacía; solo un ciclo en la jerarquía se considera error.
#[axum::debug_handler]
async fn folder_view_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(params): Query<FolderQuery>,
) -> Result<Json<FolderView>, AppError> {
    require_admin_secret(&state.config, &headers)?;

    let folder_id = params.folder_id.as_deref().filter(|id| !id.is_empty());
    let records = match state.store.list_response_files(&user_id).await {
        Ok(records) => records,
        Err(e) => {
            error!(user_id = %user_id, "Error obteniendo ficheros de respuesta: {e:#}");
            return Ok(Json(FolderView::empty(folder_id)));
        }
    };

    let nodes = view::validate_records(records);
    Ok(Json(view::build_view(&nodes, folder_id)?))
}
