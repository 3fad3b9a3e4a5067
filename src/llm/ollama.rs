use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};

const DEFAULT_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

/// Split `http://host:port` into `("http://host", port)`.
pub(crate) fn split_base_url(base_url: &str) -> (String, u16) {
    let (scheme, rest) = match base_url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", base_url),
    };
    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(DEFAULT_PORT)),
        None => (rest, DEFAULT_PORT),
    };
    let host = if host.is_empty() { "localhost" } else { host };
    (format!("{}://{}", scheme, host), port)
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let (host, port) = split_base_url(&base_url);
        let client = Ollama::new(host, port);
        Ok(Self { client, model })
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatMessageRequest::new(self.model.clone(), messages);
        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;
        Ok(response.message.content)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(vec![ChatMessage::user(prompt.to_string())]).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ])
        .await
    }

    async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String> {
        let chat_messages: Vec<ChatMessage> = messages
            .iter()
            .map(|(role, content)| match role.as_str() {
                "system" => ChatMessage::system(content.clone()),
                "assistant" => ChatMessage::assistant(content.clone()),
                // tool call records read as plain context
                _ => ChatMessage::user(content.clone()),
            })
            .collect();
        self.chat(chat_messages).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_parsing_full() {
        assert_eq!(
            split_base_url("http://localhost:11434"),
            ("http://localhost".to_string(), 11434)
        );
    }

    #[test]
    fn test_url_parsing_no_port() {
        assert_eq!(
            split_base_url("https://ollama.internal/"),
            ("https://ollama.internal".to_string(), 11434)
        );
    }

    #[test]
    fn test_url_parsing_custom_port_without_scheme() {
        assert_eq!(
            split_base_url("192.168.1.100:8080"),
            ("http://192.168.1.100".to_string(), 8080)
        );
    }
}
