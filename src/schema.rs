//! Structured-output schema for caption generation.
//!
//! A template with N caption slots needs the completion service to return
//! exactly N named fields. The schema is an ordered list of fields so that
//! field k always corresponds to slot k, independent of any JSON key order.

use serde_json::{Value, json};

use crate::error::MemeError;

/// One named caption field plus the description shown to the model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptionField {
    /// Field name the completion service must answer with.
    pub name: String,
    /// Human-style description of the field, used in the function schema.
    pub description: String,
}

/// Ordered caption fields for a single generation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptionSchema {
    fields: Vec<CaptionField>,
}

impl CaptionSchema {
    /// Builds the schema for a template with the given slot count.
    ///
    /// One field named `caption` when the count is exactly 1, fields
    /// `caption1..captionN` otherwise. A zero slot count is a template data
    /// error and is rejected.
    pub fn build(slot_count: usize) -> Result<Self, MemeError> {
        if slot_count == 0 {
            return Err(MemeError::InvalidSlotCount(slot_count));
        }

        if slot_count == 1 {
            return Ok(Self {
                fields: vec![CaptionField {
                    name: "caption".to_string(),
                    description: "The caption for the meme".to_string(),
                }],
            });
        }

        let fields = (1..=slot_count)
            .map(|position| CaptionField {
                name: format!("caption{position}"),
                description: format!("The {} caption for the meme", ordinal_word(position)),
            })
            .collect();
        Ok(Self { fields })
    }

    /// The fields in slot order.
    pub fn fields(&self) -> &[CaptionField] {
        &self.fields
    }

    /// Field names in slot order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Number of caption fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the schema holds no fields; never the case for a built
    /// schema.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON-schema `parameters` object for the function-call request: every
    /// field as a string property, all of them required.
    pub fn parameters(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                json!({"type": "string", "description": field.description}),
            );
        }
        let required: Vec<&str> = self.field_names().collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Ordinal wording used in field descriptions; positions past four fall
/// back to "next", matching how the prompt describes later slots.
fn ordinal_word(position: usize) -> &'static str {
    match position {
        1 => "first",
        2 => "second",
        3 => "third",
        4 => "fourth",
        _ => "next",
    }
}
