//! Caption generation against the completion service.
//!
//! The request offers the model a single function whose parameters are the
//! caption schema; the model's function-call arguments, parsed as JSON, are
//! the captions. A structured call is required rather than free text so the
//! response is parseable for any slot count.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::catalog::MemeTemplate;
use crate::constants::{
    CAPTION_FUNCTION_NAME, COMPLETION_FREQUENCY_PENALTY, COMPLETION_MAX_TOKENS,
    COMPLETION_PRESENCE_PENALTY, COMPLETION_TEMPERATURE, COMPLETION_TOP_P,
};
use crate::error::MemeError;
use crate::schema::CaptionSchema;

/// One chat message of the completion request.
#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: String,
    pub(crate) content: String,
}

/// Function offered to the model, with the caption schema as parameters.
#[derive(Debug, Serialize)]
pub(crate) struct FunctionSpec {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) parameters: Value,
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) functions: Vec<FunctionSpec>,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
    pub(crate) top_p: f32,
    pub(crate) frequency_penalty: f32,
    pub(crate) presence_penalty: f32,
}

/// Chat-completions response envelope; only what the pipeline consumes.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChoiceMessage {
    #[serde(default)]
    pub(crate) function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FunctionCall {
    pub(crate) arguments: String,
}

/// The completion service seam; the production implementation talks to an
/// OpenAI-style chat-completions endpoint.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Performs one completion call. A transport failure or error status is
    /// a generation error; an unparseable body is a malformed response.
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, MemeError>;
}

/// Completion backend speaking to an OpenAI-compatible API over HTTP.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl OpenAiBackend {
    /// Builds a backend for the given service base URL and API key.
    pub fn new(client: reqwest::Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, MemeError> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|err| MemeError::Generation(format!("invalid completion URL: {err}")))?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| MemeError::Generation(format!("completion request failed: {err}")))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            MemeError::Generation(format!("failed reading completion response: {err}"))
        })?;
        if !status.is_success() {
            return Err(MemeError::Generation(format!(
                "completion service returned {status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            MemeError::MalformedResponse(format!("could not parse completion response: {err}"))
        })
    }
}

/// Captions parsed out of a structured completion response, held in slot
/// order. Ephemeral; consumed by image assembly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratedCaptions {
    ordered: Vec<(String, String)>,
}

impl GeneratedCaptions {
    /// Parses function-call arguments against the schema. The key set must
    /// equal the schema's field names exactly and every value must be a
    /// non-empty string; anything else is a malformed response.
    pub fn from_arguments(schema: &CaptionSchema, arguments: &str) -> Result<Self, MemeError> {
        let mut raw: serde_json::Map<String, Value> =
            serde_json::from_str(arguments).map_err(|err| {
                MemeError::MalformedResponse(format!("arguments were not a JSON object: {err}"))
            })?;

        let mut ordered = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let value = raw.remove(&field.name).ok_or_else(|| {
                MemeError::MalformedResponse(format!("missing caption field '{}'", field.name))
            })?;
            let Value::String(text) = value else {
                return Err(MemeError::MalformedResponse(format!(
                    "caption field '{}' was not a string",
                    field.name
                )));
            };
            if text.is_empty() {
                return Err(MemeError::MalformedResponse(format!(
                    "caption field '{}' was empty",
                    field.name
                )));
            }
            ordered.push((field.name.clone(), text));
        }
        if let Some(name) = raw.keys().next() {
            return Err(MemeError::MalformedResponse(format!(
                "unexpected caption field '{name}'"
            )));
        }
        Ok(Self { ordered })
    }

    /// Caption texts in slot order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(|(_, text)| text.as_str())
    }

    /// Number of captions.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// True when no captions are held; never the case for parsed captions.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Looks a caption up by field name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.ordered
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, text)| text.as_str())
    }
}

/// Generates personalized captions for a template via the completion
/// backend.
pub struct CaptionGenerator {
    backend: std::sync::Arc<dyn CompletionBackend>,
    model: String,
}

impl CaptionGenerator {
    /// Builds a generator using the given backend and model id.
    pub fn new(backend: std::sync::Arc<dyn CompletionBackend>, model: String) -> Self {
        Self { backend, model }
    }

    /// Asks the completion service for one caption per schema field. Single
    /// attempt; a failed call surfaces to the caller unchanged.
    pub async fn generate(
        &self,
        template: &MemeTemplate,
        schema: &CaptionSchema,
        requester_name: &str,
    ) -> Result<GeneratedCaptions, MemeError> {
        let request = build_request(&self.model, template, schema, requester_name);
        let response = self.backend.complete(&request).await?;
        let call = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.function_call)
            .ok_or_else(|| {
                MemeError::MalformedResponse("response carried no function call".to_string())
            })?;
        GeneratedCaptions::from_arguments(schema, &call.arguments)
    }
}

fn build_request(
    model: &str,
    template: &MemeTemplate,
    schema: &CaptionSchema,
    requester_name: &str,
) -> ChatCompletionRequest {
    let originals = template.example.text.join(" / ");
    let system = format!(
        "You are tasked with generating funny and personal meme captions for the meme \
         '{template_name}'. The original texts are: '{originals}'. Your captions replace the \
         original ones and focus on software development jokes with a reference to the \
         person named '{requester_name}' in a funny or sarcastic way; the name must appear \
         in at least one caption. Your caption texts must differ from the original texts.",
        template_name = template.name,
    );
    let user = format!(
        "Generate funny captions to replace the ordinary meme text for the meme \
         '{template_name}'. Top priority: 1. Include the name '{requester_name}' in one (or \
         more if needed) of the captions. 2. Follow the system instructions, and check that \
         the captions differ from the original text and that the requested name is included \
         before responding.",
        template_name = template.name,
    );

    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system,
            },
            ChatMessage {
                role: "user".to_string(),
                content: user,
            },
        ],
        functions: vec![FunctionSpec {
            name: CAPTION_FUNCTION_NAME.to_string(),
            description: format!(
                "Generates caption texts for the meme {} with a funny reference to the name \
                 '{requester_name}'",
                template.name
            ),
            parameters: schema.parameters(),
        }],
        temperature: COMPLETION_TEMPERATURE,
        max_tokens: COMPLETION_MAX_TOKENS,
        top_p: COMPLETION_TOP_P,
        frequency_penalty: COMPLETION_FREQUENCY_PENALTY,
        presence_penalty: COMPLETION_PRESENCE_PENALTY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ExampleText;
    use std::sync::{Arc, Mutex};

    fn template() -> MemeTemplate {
        MemeTemplate {
            id: "ds".to_string(),
            name: "Distracted Boyfriend".to_string(),
            example: ExampleText {
                text: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            },
        }
    }

    struct StaticBackend {
        arguments: Option<String>,
    }

    #[async_trait]
    impl CompletionBackend for StaticBackend {
        async fn complete(
            &self,
            _request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, MemeError> {
            Ok(ChatCompletionResponse {
                choices: vec![ChatChoice {
                    message: ChoiceMessage {
                        function_call: self
                            .arguments
                            .clone()
                            .map(|arguments| FunctionCall { arguments }),
                    },
                }],
            })
        }
    }

    struct RecordingBackend {
        seen: Arc<Mutex<Option<String>>>,
        arguments: String,
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(
            &self,
            request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, MemeError> {
            let serialized = serde_json::to_string(request).expect("serialize request");
            *self.seen.lock().expect("lock") = Some(serialized);
            Ok(ChatCompletionResponse {
                choices: vec![ChatChoice {
                    message: ChoiceMessage {
                        function_call: Some(FunctionCall {
                            arguments: self.arguments.clone(),
                        }),
                    },
                }],
            })
        }
    }

    #[test]
    fn request_prompt_mentions_template_name_and_requester() {
        let schema = CaptionSchema::build(3).expect("schema");
        let request = build_request("test-model", &template(), &schema, "Ada");
        assert_eq!(request.model, "test-model");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("Distracted Boyfriend"));
        assert!(request.messages[0].content.contains("'Ada'"));
        assert!(request.messages[0].content.contains("a / b / c"));
        assert_eq!(request.messages[1].role, "user");
        assert!(request.messages[1].content.contains("'Ada'"));
    }

    #[test]
    fn request_function_requires_every_schema_field() {
        let schema = CaptionSchema::build(2).expect("schema");
        let request = build_request("test-model", &template(), &schema, "Ada");
        assert_eq!(request.functions.len(), 1);
        assert_eq!(request.functions[0].name, CAPTION_FUNCTION_NAME);
        assert_eq!(
            request.functions[0].parameters["required"],
            serde_json::json!(["caption1", "caption2"])
        );
    }

    #[test]
    fn request_carries_fixed_sampling_constants() {
        let schema = CaptionSchema::build(1).expect("schema");
        let request = build_request("test-model", &template(), &schema, "Ada");
        assert_eq!(request.temperature, COMPLETION_TEMPERATURE);
        assert_eq!(request.max_tokens, COMPLETION_MAX_TOKENS);
        assert_eq!(request.top_p, COMPLETION_TOP_P);
        assert_eq!(request.frequency_penalty, COMPLETION_FREQUENCY_PENALTY);
        assert_eq!(request.presence_penalty, COMPLETION_PRESENCE_PENALTY);
    }

    #[test]
    fn captions_follow_slot_order_not_key_order() {
        let schema = CaptionSchema::build(3).expect("schema");
        let arguments = r#"{"caption3":"third","caption1":"first","caption2":"second"}"#;
        let captions = GeneratedCaptions::from_arguments(&schema, arguments).expect("captions");
        let texts: Vec<&str> = captions.texts().collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn missing_field_is_malformed() {
        let schema = CaptionSchema::build(2).expect("schema");
        let err = GeneratedCaptions::from_arguments(&schema, r#"{"caption1":"only"}"#)
            .expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[test]
    fn extra_field_is_malformed() {
        let schema = CaptionSchema::build(1).expect("schema");
        let err = GeneratedCaptions::from_arguments(
            &schema,
            r#"{"caption":"fine","caption2":"extra"}"#,
        )
        .expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[test]
    fn renamed_field_is_malformed() {
        let schema = CaptionSchema::build(1).expect("schema");
        let err = GeneratedCaptions::from_arguments(&schema, r#"{"text":"wrong name"}"#)
            .expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[test]
    fn empty_caption_is_malformed() {
        let schema = CaptionSchema::build(1).expect("schema");
        let err = GeneratedCaptions::from_arguments(&schema, r#"{"caption":""}"#)
            .expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[test]
    fn non_string_caption_is_malformed() {
        let schema = CaptionSchema::build(1).expect("schema");
        let err = GeneratedCaptions::from_arguments(&schema, r#"{"caption":42}"#)
            .expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        let schema = CaptionSchema::build(1).expect("schema");
        let err =
            GeneratedCaptions::from_arguments(&schema, "not json").expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn generate_parses_the_function_call() {
        let schema = CaptionSchema::build(3).expect("schema");
        let backend = StaticBackend {
            arguments: Some(
                r#"{"caption1":"Ada ships on Friday","caption2":"tests","caption3":"prod"}"#
                    .to_string(),
            ),
        };
        let generator = CaptionGenerator::new(Arc::new(backend), "test-model".to_string());
        let captions = generator
            .generate(&template(), &schema, "Ada")
            .await
            .expect("captions");
        assert_eq!(captions.len(), 3);
        assert_eq!(captions.get("caption1"), Some("Ada ships on Friday"));
    }

    #[tokio::test]
    async fn missing_function_call_is_malformed() {
        let schema = CaptionSchema::build(1).expect("schema");
        let backend = StaticBackend { arguments: None };
        let generator = CaptionGenerator::new(Arc::new(backend), "test-model".to_string());
        let err = generator
            .generate(&template(), &schema, "Ada")
            .await
            .expect_err("must fail");
        assert!(matches!(err, MemeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn wire_request_uses_the_functions_shape() {
        let schema = CaptionSchema::build(2).expect("schema");
        let seen = Arc::new(Mutex::new(None));
        let backend = RecordingBackend {
            seen: seen.clone(),
            arguments: r#"{"caption1":"Ada","caption2":"b"}"#.to_string(),
        };
        let generator = CaptionGenerator::new(Arc::new(backend), "test-model".to_string());
        generator
            .generate(&template(), &schema, "Ada")
            .await
            .expect("captions");

        let raw = seen.lock().expect("lock").clone().expect("request seen");
        let body: serde_json::Value = serde_json::from_str(&raw).expect("request json");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["functions"][0]["name"], CAPTION_FUNCTION_NAME);
        assert_eq!(
            body["functions"][0]["parameters"]["properties"]["caption1"]["type"],
            "string"
        );
        assert_eq!(body["max_tokens"], 3048);
    }
}
