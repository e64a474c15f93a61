use crate::config::{Credentials, RelayConfig};
use crate::error::{RelayError, Result};
use crate::logging::SharedLog;
use crate::upstream;

use axum::extract::{Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub credentials: Credentials,
    pub client: reqwest::Client,
    pub log: SharedLog,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/api/face-analysis", post(handle_face_analysis))
        .route("/api/weather", get(handle_weather))
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Relay an uploaded image to the face detection upstream. The first file
/// field in the form is the image; anything else is ignored.
async fn handle_face_analysis(
    State(state): State<Arc<AppState>>,
    multipart: Option<Multipart>,
) -> Result<Json<serde_json::Value>> {
    let request_id = Uuid::new_v4().to_string();

    let image = match multipart {
        Some(multipart) => first_file_field(multipart).await,
        None => None,
    };

    let Some(image) = image else {
        state
            .log
            .warn(&request_id, "face-analysis", "request had no image file");
        return Err(RelayError::missing_input("no image uploaded"));
    };

    let body = upstream::detect_faces(
        image,
        &state.config.face,
        &state.credentials,
        &state.client,
        &state.log,
        &request_id,
    )
    .await
    .map_err(|e| {
        state.log.error(&request_id, "face-analysis", e.to_string());
        e
    })?;

    Ok(Json(body))
}

async fn first_file_field(mut multipart: Multipart) -> Option<Bytes> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.file_name().is_some() {
            if let Ok(bytes) = field.bytes().await {
                return Some(bytes);
            }
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct WeatherQuery {
    #[serde(default)]
    city: String,
}

async fn handle_weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<serde_json::Value>> {
    let request_id = Uuid::new_v4().to_string();

    if query.city.is_empty() {
        return Err(RelayError::missing_input("city required"));
    }

    let body = upstream::current_weather(
        &query.city,
        &state.config.weather,
        &state.credentials,
        &state.client,
        &state.log,
        &request_id,
    )
    .await
    .map_err(|e| {
        state.log.error(&request_id, "weather", e.to_string());
        e
    })?;

    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ChatRequest>>,
) -> Result<Json<serde_json::Value>> {
    let request_id = Uuid::new_v4().to_string();

    let message = payload.map(|Json(r)| r.message).unwrap_or_default();
    if message.is_empty() {
        return Err(RelayError::missing_input("message required"));
    }

    let text = upstream::chat_completion(
        &message,
        &state.config.chat,
        &state.credentials,
        &state.client,
        &state.log,
        &request_id,
    )
    .await
    .map_err(|e| {
        state.log.error(&request_id, "chat", e.to_string());
        e
    })?;

    Ok(Json(serde_json::json!({ "response": text })))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
