//! The meme pipeline: one public operation composing catalog, schema,
//! caption generation, and image assembly.

use std::sync::Arc;

use tracing::info;

use crate::captions::CaptionGenerator;
use crate::catalog::TemplateCatalog;
use crate::constants::DEFAULT_REQUESTER_NAME;
use crate::error::MemeError;
use crate::render::{ImageAssembler, RenderedMeme};
use crate::schema::CaptionSchema;

/// Orchestrates one meme generation per call. Stateless across requests;
/// the catalog is shared read-only.
pub struct MemePipeline {
    catalog: Arc<TemplateCatalog>,
    generator: CaptionGenerator,
    assembler: ImageAssembler,
}

impl MemePipeline {
    /// Composes a pipeline from its stages.
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        generator: CaptionGenerator,
        assembler: ImageAssembler,
    ) -> Self {
        Self {
            catalog,
            generator,
            assembler,
        }
    }

    /// Generates a personalized meme for the given display name and returns
    /// the stored image reference. Any stage failure aborts the whole
    /// operation; there is no partial result and no rollback.
    pub async fn generate_meme(&self, requester_name: &str) -> Result<RenderedMeme, MemeError> {
        let name = normalize_requester_name(requester_name);
        let template = self.catalog.pick_random()?;
        info!(
            "Generating meme '{}' ({}) for '{}'",
            template.name, template.id, name
        );
        let schema = CaptionSchema::build(template.slot_count())?;
        let captions = self.generator.generate(template, &schema, &name).await?;
        self.assembler.render(&template.id, &captions, &name).await
    }
}

/// Trims the submitted name and substitutes the placeholder when nothing is
/// left. A presentation convenience, not a security boundary.
pub fn normalize_requester_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_REQUESTER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
