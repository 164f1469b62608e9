//! Web layer: router, handlers, and server setup.

use std::num::NonZeroU16;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::MemeError;
use crate::pipeline::MemePipeline;

mod images;
mod views;

use images::meme_image_response;
use views::HomeTemplate;

#[derive(Clone)]
pub(crate) struct AppState {
    pipeline: Arc<MemePipeline>,
    image_dir: PathBuf,
}

impl AppState {
    fn new(pipeline: Arc<MemePipeline>, image_dir: PathBuf) -> Self {
        Self {
            pipeline,
            image_dir,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct MemeRequest {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct MemeResponse {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

/// The pipeline surface: takes a display name, returns the stored meme
/// reference. Pipeline errors map straight to response statuses.
async fn generate_meme_handler(
    State(state): State<AppState>,
    Json(request): Json<MemeRequest>,
) -> Result<Json<MemeResponse>, MemeError> {
    let name = request.name.unwrap_or_default();
    let meme = state.pipeline.generate_meme(&name).await?;
    info!("Generated {}", meme.image_url);
    Ok(Json(MemeResponse {
        image_url: meme.image_url,
    }))
}

async fn home_handler() -> HomeTemplate {
    HomeTemplate
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

async fn meme_image_handler(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    headers: HeaderMap,
) -> Response {
    meme_image_response(&state.image_dir, &file_name, &headers).await
}

async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Route not found")
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(home_handler))
        .route("/static/styles.css", axum::routing::get(styles_handler))
        .route("/memes", axum::routing::post(generate_meme_handler))
        .route("/images/{file_name}", axum::routing::get(meme_image_handler))
        .fallback(not_found_handler)
}

/// Binds the listener and serves the application.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    pipeline: Arc<MemePipeline>,
    image_dir: PathBuf,
) -> Result<(), anyhow::Error> {
    let app = create_router().with_state(AppState::new(pipeline, image_dir));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}
