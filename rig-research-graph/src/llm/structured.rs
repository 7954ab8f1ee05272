//! Structured model output
//!
//! Some nodes need typed answers (a list of analysts, a search query).
//! The schema is sent as a system instruction and the reply is parsed as
//! JSON; anything that does not deserialize is a `ModelError::Validation`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::config::LLMConfig;
use super::provider::LLMProvider;
use crate::error::ModelError;
use crate::state::Message;

/// A type the model can be asked to produce as JSON.
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Name shown to the model
    const NAME: &'static str;

    /// JSON schema describing the expected object
    fn schema() -> Value;
}

/// Ask the model for a `T`, appending the schema instruction to `messages`.
pub async fn invoke_structured<T: StructuredOutput>(
    llm: &dyn LLMProvider,
    messages: &[Message],
    config: Option<&LLMConfig>,
) -> Result<T, ModelError> {
    let mut request = Vec::with_capacity(messages.len() + 1);
    request.push(Message::system(schema_instruction::<T>()));
    request.extend_from_slice(messages);

    let response = llm.complete(&request, config).await?;
    parse_structured(&response.message.content)
}

fn schema_instruction<T: StructuredOutput>() -> String {
    format!(
        "Respond only with a JSON object named {} that matches this JSON schema. \
         Do not add any other text.\n{}",
        T::NAME,
        T::schema()
    )
}

/// Parse a model reply into `T`, tolerating code fences and surrounding prose.
pub fn parse_structured<T: StructuredOutput>(raw: &str) -> Result<T, ModelError> {
    let body = extract_json_object(raw).ok_or_else(|| {
        ModelError::Validation(format!("{}: reply contains no JSON object", T::NAME))
    })?;
    serde_json::from_str(body)
        .map_err(|e| ModelError::Validation(format!("{}: {}", T::NAME, e)))
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}
