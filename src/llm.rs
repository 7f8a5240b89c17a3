use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::{
        chat::{request::ChatMessageRequest, ChatMessage},
        parameters::FormatType,
    },
    models::ModelOptions,
    Ollama,
};
use reqwest::Url;

use crate::nl_query::{TranslationError, TranslationRequest, Translator};

/// Translates questions with a model served by Ollama.
pub(crate) struct OllamaTranslator {
    client: Ollama,
    model: String,
}

impl OllamaTranslator {
    pub(crate) fn new(host: &str, port: u16, model: &str) -> Result<Self> {
        let mut url = Url::parse(host).with_context(|| format!("invalid LLM host `{host}`"))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            bail!("LLM host must be an http(s) URL, got `{host}`");
        }
        if url.set_port(Some(port)).is_err() {
            bail!("LLM host `{host}` cannot take a port");
        }
        if model.trim().is_empty() {
            bail!("LLM model name is empty");
        }

        Ok(Self {
            client: Ollama::from_url(url),
            model: model.to_string(),
        })
    }

    fn messages(request: &TranslationRequest) -> Vec<ChatMessage> {
        let schema = serde_json::to_string_pretty(&request.schema_description).unwrap_or_default();
        vec![
            ChatMessage::system(format!(
                "{}\nSchema description:\n{schema}\n",
                request.instructions
            )),
            ChatMessage::user(request.user_query.clone()),
        ]
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        let chat = ChatMessageRequest::new(self.model.clone(), Self::messages(request))
            .format(FormatType::Json)
            .options(ModelOptions::default().temperature(0.0));

        let response = self
            .client
            .send_chat_messages(chat)
            .await
            .map_err(|e| TranslationError::Unreachable(e.to_string()))?;
        Ok(response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn validates_host_and_model() {
        assert!(OllamaTranslator::new("http://localhost", 11434, "llama3.1:8b").is_ok());
        assert!(OllamaTranslator::new("https://llm.internal", 443, "qwen3:8b").is_ok());
        assert!(OllamaTranslator::new("localhost", 11434, "llama3.1:8b").is_err());
        assert!(OllamaTranslator::new("ftp://localhost", 21, "llama3.1:8b").is_err());
        assert!(OllamaTranslator::new("http://localhost", 11434, " ").is_err());
    }

    #[test]
    fn port_is_applied_to_host() {
        let translator = OllamaTranslator::new("http://localhost", 11434, "llama3.1:8b").unwrap();
        assert_eq!(translator.client.url().host_str(), Some("localhost"));
        assert_eq!(translator.client.url().port(), Some(11434));

        let translator = OllamaTranslator::new("https://llm.internal:8443", 9443, "qwen3:8b").unwrap();
        assert_eq!(translator.client.url().port(), Some(9443));
    }

    #[test]
    fn schema_goes_into_system_message() {
        let request = TranslationRequest {
            instructions: "Return JSON.".to_string(),
            schema_description: json!({"Sale": {"price": "number"}}),
            user_query: "most expensive sale".to_string(),
        };
        let messages = OllamaTranslator::messages(&request);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("Return JSON."));
        assert!(messages[0].content.contains("\"price\": \"number\""));
        assert_eq!(messages[1].content, "most expensive sale");
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        // Port 9 (discard) has nothing listening on a test machine.
        let translator = OllamaTranslator::new("http://127.0.0.1", 9, "llama3.1:8b").unwrap();
        let request = TranslationRequest {
            instructions: String::new(),
            schema_description: json!({}),
            user_query: "anything".to_string(),
        };
        let err = translator.translate(&request).await.unwrap_err();
        assert!(matches!(err, TranslationError::Unreachable(_)));
    }
}
