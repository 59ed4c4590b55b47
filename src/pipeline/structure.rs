//! Document-level JSON conversion.
//!
//! One call per run, after OCR: the combined page text goes to a text
//! model together with the user's prompts, and whatever the model answers
//! is taken verbatim as the document output. The answer is not parsed or
//! validated as JSON.

use crate::config::ConversionPrompts;
use crate::error::ConversionError;
use crate::prompts::fill_user_prompt;
use edgequake_llm::{ChatMessage, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything the conversion model receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Combined OCR text of all successful pages.
    pub text: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl ConversionRequest {
    pub fn new(text: impl Into<String>, prompts: &ConversionPrompts) -> Self {
        Self {
            text: text.into(),
            system_prompt: prompts.system_prompt.clone(),
            user_prompt: prompts.user_prompt.clone(),
        }
    }

    /// The system turn, omitted when the system prompt is empty.
    pub fn system_turn(&self) -> Option<&str> {
        (!self.system_prompt.is_empty()).then_some(self.system_prompt.as_str())
    }

    /// The user turn: the template with its first `{{text}}` filled in, or
    /// the bare text when no template is set.
    pub fn user_turn(&self) -> String {
        if self.user_prompt.is_empty() {
            self.text.clone()
        } else {
            fill_user_prompt(&self.user_prompt, &self.text)
        }
    }
}

/// Turns OCR text into the structured document output.
pub trait JsonConverter: Send + Sync {
    fn convert(
        &self,
        request: &ConversionRequest,
    ) -> impl Future<Output = Result<String, ConversionError>> + Send;
}

/// Conversion through a chat model.
#[derive(Clone)]
pub struct ChatConverter {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl ChatConverter {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

/// Chat turns for a conversion request, system turn first when present.
pub fn build_messages(request: &ConversionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system_turn() {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(request.user_turn()));
    messages
}

impl JsonConverter for ChatConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<String, ConversionError> {
        let messages = build_messages(request);
        debug!(
            "JSON conversion request: {} chars of text, {} turn(s)",
            request.text.len(),
            messages.len()
        );

        let call = async {
            self.provider
                .chat(&messages, None)
                .await
                .map(|response| response.content)
        };
        bounded_conversion_call(self.timeout, call).await
    }
}

/// Await the conversion call for at most `limit`.
pub async fn bounded_conversion_call<F, E>(limit: Duration, call: F) -> Result<String, ConversionError>
where
    F: Future<Output = Result<String, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(content)) => Ok(content),
        Ok(Err(e)) => Err(ConversionError::Failed {
            detail: e.to_string(),
        }),
        Err(_) => Err(ConversionError::Timeout {
            ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_fills_template() {
        let req = ConversionRequest::new(
            "--- Page 1 ---\nFoo",
            &ConversionPrompts::new("", "Format: {{text}}"),
        );
        assert_eq!(req.user_turn(), "Format: --- Page 1 ---\nFoo");
        assert!(req.system_turn().is_none());
    }

    #[test]
    fn only_first_placeholder_is_replaced() {
        let req = ConversionRequest::new("X", &ConversionPrompts::new("", "{{text}} and {{text}}"));
        assert_eq!(req.user_turn(), "X and {{text}}");
    }

    #[test]
    fn empty_template_sends_bare_text() {
        let req = ConversionRequest::new("raw text", &ConversionPrompts::new("Output JSON.", ""));
        assert_eq!(req.user_turn(), "raw text");
        assert_eq!(req.system_turn(), Some("Output JSON."));
    }

    #[test]
    fn template_without_placeholder_is_sent_as_is() {
        let req = ConversionRequest::new("ignored", &ConversionPrompts::new("", "Summarise."));
        assert_eq!(req.user_turn(), "Summarise.");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_conversion_times_out() {
        let call = async {
            tokio::time::sleep(Duration::from_secs(300)).await;
            Ok::<_, String>("{}".to_string())
        };
        let err = bounded_conversion_call(Duration::from_millis(120_000), call)
            .await
            .unwrap_err();
        assert_eq!(err, ConversionError::Timeout { ms: 120_000 });
    }

    #[tokio::test]
    async fn conversion_transport_error_is_failed() {
        let call = async { Err::<String, _>("HTTP 502 from upstream") };
        let err = bounded_conversion_call(Duration::from_secs(5), call)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::Failed {
                detail: "HTTP 502 from upstream".into()
            }
        );
    }

    #[test]
    fn messages_put_system_first() {
        let req = ConversionRequest::new("t", &ConversionPrompts::new("sys", "u {{text}}"));
        assert_eq!(build_messages(&req).len(), 2);

        let req = ConversionRequest::new("t", &ConversionPrompts::new("", "u {{text}}"));
        assert_eq!(build_messages(&req).len(), 1);
    }
}
