//! Error handling

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::error;

/// Failure modes of the meme pipeline and the application around it.
///
/// None of these are recovered locally: every stage surfaces its error
/// upward unchanged, and the web layer maps each variant to a response
/// status here.
#[derive(Debug)]
pub enum MemeError {
    /// The template catalog holds no templates to pick from.
    EmptyCatalog,
    /// A template declares a caption slot count we cannot build a schema
    /// for (zero example captions).
    InvalidSlotCount(usize),
    /// The completion service was unreachable or returned an error.
    Generation(String),
    /// The completion service answered, but the structured output was
    /// missing, unparseable, or did not match the requested schema.
    MalformedResponse(String),
    /// The image rendering fetch did not succeed.
    RenderFetch(String),
    /// The rendered image bytes could not be persisted.
    StorageWrite(String),
    /// The template catalog could not be loaded at startup.
    CatalogLoad(String),
}

impl std::fmt::Display for MemeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCatalog => write!(f, "No meme templates are loaded"),
            Self::InvalidSlotCount(count) => {
                write!(f, "Template has an unusable caption slot count: {count}")
            }
            Self::Generation(detail) => write!(f, "Caption generation failed: {detail}"),
            Self::MalformedResponse(detail) => {
                write!(f, "Completion response was malformed: {detail}")
            }
            Self::RenderFetch(detail) => write!(f, "Image rendering failed: {detail}"),
            Self::StorageWrite(detail) => {
                write!(f, "Failed to store the rendered image: {detail}")
            }
            Self::CatalogLoad(detail) => {
                write!(f, "Failed to load meme templates: {detail}")
            }
        }
    }
}

impl std::error::Error for MemeError {}

impl IntoResponse for MemeError {
    fn into_response(self) -> axum::response::Response {
        error!("{}", self);
        let (status, message) = match self {
            MemeError::EmptyCatalog => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No meme templates are loaded",
            ),
            MemeError::InvalidSlotCount(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Selected template has no caption slots",
            ),
            MemeError::Generation(_) => (StatusCode::BAD_GATEWAY, "Caption generation failed"),
            MemeError::MalformedResponse(_) => (
                StatusCode::BAD_GATEWAY,
                "Completion service returned an unusable response",
            ),
            MemeError::RenderFetch(_) => (StatusCode::BAD_GATEWAY, "Image rendering failed"),
            MemeError::StorageWrite(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store the rendered image",
            ),
            MemeError::CatalogLoad(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load meme templates",
            ),
        };
        let mut response = axum::response::Response::new(Body::from(message));
        *response.status_mut() = status;
        response
    }
}
