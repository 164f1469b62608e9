//! Meme template catalog.
//!
//! Loaded once before serving and read-only afterwards, so concurrent
//! requests can share it without locking.

use std::io::ErrorKind;
use std::path::Path;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::MemeError;

/// Example captions shipped with a template; their count is the
/// authoritative slot count.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExampleText {
    /// Original caption texts in slot order.
    pub text: Vec<String>,
}

/// One meme format as listed by the template service.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MemeTemplate {
    /// Opaque identifier used by the rendering service.
    pub id: String,
    /// Human-readable name, used in prompts.
    pub name: String,
    /// The template's original example captions.
    pub example: ExampleText,
}

impl MemeTemplate {
    /// Number of caption slots this template expects to be filled.
    pub fn slot_count(&self) -> usize {
        self.example.text.len()
    }
}

/// The set of available meme templates.
#[derive(Debug)]
pub struct TemplateCatalog {
    templates: Vec<MemeTemplate>,
}

impl TemplateCatalog {
    /// Builds a catalog from already-loaded templates.
    pub fn new(templates: Vec<MemeTemplate>) -> Self {
        Self { templates }
    }

    /// Loads the catalog from the snapshot file when present and non-empty,
    /// otherwise fetches the template listing and persists it for the next
    /// start. Snapshot persistence is best-effort; a failed write is logged
    /// and startup continues.
    pub async fn load(
        snapshot: &Path,
        client: &reqwest::Client,
        service_base: &Url,
    ) -> Result<Self, MemeError> {
        match tokio::fs::read(snapshot).await {
            Ok(raw) => {
                let templates: Vec<MemeTemplate> = serde_json::from_slice(&raw).map_err(|err| {
                    MemeError::CatalogLoad(format!(
                        "could not parse snapshot {}: {err}",
                        snapshot.display()
                    ))
                })?;
                if !templates.is_empty() {
                    debug!(
                        "Loaded {} templates from snapshot {}",
                        templates.len(),
                        snapshot.display()
                    );
                    return Ok(Self::new(templates));
                }
                warn!("Snapshot {} is empty, refetching", snapshot.display());
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(MemeError::CatalogLoad(format!(
                    "could not read snapshot {}: {err}",
                    snapshot.display()
                )));
            }
        }

        let templates = fetch_templates(client, service_base).await?;
        match serde_json::to_vec(&templates) {
            Ok(raw) => {
                if let Err(err) = tokio::fs::write(snapshot, raw).await {
                    warn!(
                        "Could not persist template snapshot to {}: {}",
                        snapshot.display(),
                        err
                    );
                }
            }
            Err(err) => warn!("Could not serialize template snapshot: {}", err),
        }
        Ok(Self::new(templates))
    }

    /// Number of loaded templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when no templates are loaded.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Picks a template uniformly at random. No weighting, no exclusion of
    /// previously used templates.
    pub fn pick_random(&self) -> Result<&MemeTemplate, MemeError> {
        self.templates
            .choose(&mut rand::rng())
            .ok_or(MemeError::EmptyCatalog)
    }
}

async fn fetch_templates(
    client: &reqwest::Client,
    service_base: &Url,
) -> Result<Vec<MemeTemplate>, MemeError> {
    let mut url = service_base.join("templates").map_err(|err| {
        MemeError::CatalogLoad(format!("invalid template service URL: {err}"))
    })?;
    url.query_pairs_mut().append_pair("animated", "false");

    info!("Fetching meme templates from {url}");
    let response = client.get(url.clone()).send().await.map_err(|err| {
        MemeError::CatalogLoad(format!("request to {url} failed: {err}"))
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(MemeError::CatalogLoad(format!("{url} returned {status}")));
    }
    response
        .json::<Vec<MemeTemplate>>()
        .await
        .map_err(|err| MemeError::CatalogLoad(format!("could not parse template listing: {err}")))
}
