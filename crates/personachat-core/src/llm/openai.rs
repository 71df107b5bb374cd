use crate::config::ModelSettings;
use crate::context::ConversationTurn;
use crate::error::PersonaError;
use crate::llm::traits::ChatClient;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f32 = 0.9;

/// Client for any endpoint speaking the OpenAI chat-completions protocol
/// (OpenAI, DeepSeek, Ollama's `/v1`, LM Studio, ...).
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self::new(settings.endpoint(), &settings.api_key, &settings.model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatClient for OpenAiCompatClient {
    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String, PersonaError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: turns,
            temperature: self.temperature,
            stream: false,
        };

        let mut request = self.client.post(self.completions_url()).json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(PersonaError::Llm(format!(
                "API error ({}): {}",
                status, response_text
            )));
        }

        parse_reply(&response_text)
    }
}

fn parse_reply(body: &str) -> Result<String, PersonaError> {
    let api_response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| PersonaError::Llm(format!("Failed to parse response: {e}")))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PersonaError::Llm("No response from API".into()))?;

    Ok(choice.message.content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let client = OpenAiCompatClient::new("https://api.deepseek.com/", "k", "deepseek-chat");
        assert_eq!(client.completions_url(), "https://api.deepseek.com/chat/completions");

        let settings = ModelSettings::new("qwen", "", "localhost:11434/v1");
        let client = OpenAiCompatClient::from_settings(&settings);
        assert_eq!(client.completions_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let turns = vec![ConversationTurn::system("be nice"), ConversationTurn::user("hi")];
        let body = ChatRequest {
            model: "m",
            messages: &turns,
            temperature: 0.5,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_parse_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "hello");

        assert!(matches!(
            parse_reply(r#"{"choices":[]}"#),
            Err(PersonaError::Llm(_))
        ));
        assert!(matches!(parse_reply("not json"), Err(PersonaError::Llm(_))));
    }
}
