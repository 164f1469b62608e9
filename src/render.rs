//! Image assembly: rendering-service URL construction, fetch, and storage.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::captions::GeneratedCaptions;
use crate::constants::IMAGE_EXTENSION;
use crate::error::MemeError;

/// Characters we refuse in a stored file name component.
#[allow(clippy::expect_used)]
static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.-]+").expect("static pattern compiles"));

/// The rendering-service fetch seam; the production implementation does a
/// plain HTTP GET.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches the rendered image bytes. A transport failure or non-success
    /// status is a render-fetch error.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, MemeError>;
}

/// Image fetcher backed by a shared reqwest client.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Builds a fetcher around the given client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, MemeError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| MemeError::RenderFetch(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MemeError::RenderFetch(format!("{url} returned {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| MemeError::RenderFetch(format!("failed reading image bytes: {err}")))?;
        Ok(bytes.to_vec())
    }
}

/// Byte store for rendered memes; writes land under one root directory and
/// are served back under `/images/`.
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Builds a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The store's root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Writes the image bytes and returns the reference path the web layer
    /// serves it under. A failed write propagates; it is never swallowed.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<String, MemeError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            MemeError::StorageWrite(format!("could not create {}: {err}", self.root.display()))
        })?;
        let path = self.root.join(file_name);
        tokio::fs::write(&path, bytes).await.map_err(|err| {
            MemeError::StorageWrite(format!("could not write {}: {err}", path.display()))
        })?;
        Ok(format!("/images/{file_name}"))
    }
}

/// Reference to a stored meme: its file name and the URL it is served
/// under. The bytes themselves are written once and not retained.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderedMeme {
    /// File name inside the image store.
    pub file_name: String,
    /// Relative URL the HTTP layer serves the image under.
    pub image_url: String,
}

/// Builds the rendering URL for a template and its captions, fetches the
/// bytes, and persists them.
pub struct ImageAssembler {
    fetcher: Arc<dyn ImageFetcher>,
    store: ImageStore,
    base_url: Url,
}

impl ImageAssembler {
    /// Builds an assembler for the given rendering-service base URL.
    pub fn new(fetcher: Arc<dyn ImageFetcher>, store: ImageStore, base_url: Url) -> Self {
        Self {
            fetcher,
            store,
            base_url,
        }
    }

    /// Renders and stores one meme. The fetch must succeed before anything
    /// is written; a non-success status leaves the store untouched.
    pub async fn render(
        &self,
        template_id: &str,
        captions: &GeneratedCaptions,
        requester_name: &str,
    ) -> Result<RenderedMeme, MemeError> {
        let url = image_url(&self.base_url, template_id, captions)?;
        debug!("Fetching rendered meme from {url}");
        let bytes = self.fetcher.fetch(&url).await?;
        let file_name = meme_file_name(template_id, requester_name);
        let image_url = self.store.write(&file_name, &bytes).await?;
        Ok(RenderedMeme {
            file_name,
            image_url,
        })
    }
}

/// Rendering-service URL for a template id and its captions: each caption
/// is one percent-encoded path segment in slot order, followed by a final
/// `.jpg` segment.
pub fn image_url(
    base: &Url,
    template_id: &str,
    captions: &GeneratedCaptions,
) -> Result<Url, MemeError> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            MemeError::RenderFetch("rendering base URL cannot carry path segments".to_string())
        })?;
        segments.pop_if_empty();
        segments.push("images");
        segments.push(template_id);
        for text in captions.texts() {
            segments.push(text);
        }
        segments.push(&format!(".{IMAGE_EXTENSION}"));
    }
    Ok(url)
}

/// File name for a stored meme, derived from the template id and requester
/// name. The name is user input; anything outside word characters, dots,
/// and dashes becomes an underscore.
pub fn meme_file_name(template_id: &str, requester_name: &str) -> String {
    let safe_name = UNSAFE_FILE_CHARS.replace_all(requester_name, "_");
    format!("{template_id}-{safe_name}.{IMAGE_EXTENSION}")
}
