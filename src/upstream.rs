//! Forwarding calls to the three third-party services.
//!
//! Each function issues exactly one outbound request and maps any transport
//! or parse failure into [`RelayError::Upstream`]. The face and weather
//! bodies are relayed verbatim; only the chat response is reshaped.

use crate::config::{ChatConfig, Credentials, FaceConfig, WeatherConfig};
use crate::error::{RelayError, Result};
use crate::logging::{LogLevel, RelayLogEntry, SharedLog};

use bytes::Bytes;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Chat completions wire types (only the fields the relay touches)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the upstream produced one.
    pub fn first_choice_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
    }
}

// ---------------------------------------------------------------------------
// Forwarders
// ---------------------------------------------------------------------------

/// Forward an uploaded image to the face detection service.
///
/// The upstream body is returned whatever its status code; the status only
/// lands in the relay log.
pub async fn detect_faces(
    image: Bytes,
    config: &FaceConfig,
    credentials: &Credentials,
    client: &reqwest::Client,
    log: &SharedLog,
    request_id: &str,
) -> Result<serde_json::Value> {
    let form = multipart::Form::new()
        .text("api_key", credentials.face_api_key.clone())
        .text("api_secret", credentials.face_api_secret.clone())
        .part(
            "image_file",
            multipart::Part::bytes(image.to_vec())
                .file_name("image.jpg")
                .mime_str("image/jpeg")?,
        );

    let started = Instant::now();
    let response = client
        .post(&config.detect_url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| RelayError::upstream(format!("face detect request failed: {}", e)))?;

    let status = response.status().as_u16();
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| RelayError::upstream(format!("face detect response was not JSON: {}", e)))?;

    log.log(
        RelayLogEntry::new(LogLevel::Info, request_id, "face-analysis", "upstream responded")
            .with_upstream_status(status)
            .with_elapsed_ms(started.elapsed().as_millis() as u64),
    );

    Ok(body)
}

/// Forward a city lookup to the weather service.
///
/// The city is interpolated into the query string as-is, matching what the
/// browser client sends today.
pub async fn current_weather(
    city: &str,
    config: &WeatherConfig,
    credentials: &Credentials,
    client: &reqwest::Client,
    log: &SharedLog,
    request_id: &str,
) -> Result<serde_json::Value> {
    let url = format!(
        "{}?q={}&appid={}&units=metric",
        config.base_url, city, credentials.weather_api_key
    );

    let started = Instant::now();
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| RelayError::upstream(format!("weather request failed: {}", e)))?;

    let status = response.status().as_u16();
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| RelayError::upstream(format!("weather response was not JSON: {}", e)))?;

    log.log(
        RelayLogEntry::new(LogLevel::Info, request_id, "weather", "upstream responded")
            .with_upstream_status(status)
            .with_elapsed_ms(started.elapsed().as_millis() as u64),
    );

    Ok(body)
}

/// Forward a single-turn message to the chat completions service and pull out
/// the first choice's text.
pub async fn chat_completion(
    message: &str,
    config: &ChatConfig,
    credentials: &Credentials,
    client: &reqwest::Client,
    log: &SharedLog,
    request_id: &str,
) -> Result<String> {
    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: message.to_string(),
        }],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let started = Instant::now();
    let response = client
        .post(&config.completions_url)
        .header("Authorization", format!("Bearer {}", credentials.chat_api_key))
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
        .map_err(|e| RelayError::upstream(format!("chat request failed: {}", e)))?;

    let status = response.status().as_u16();
    let completion: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| RelayError::upstream(format!("chat response did not parse: {}", e)))?;

    log.log(
        RelayLogEntry::new(LogLevel::Info, request_id, "chat", "upstream responded")
            .with_upstream_status(status)
            .with_elapsed_ms(started.elapsed().as_millis() as u64),
    );

    completion
        .first_choice_text()
        .ok_or_else(|| RelayError::upstream("chat completion had no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatCompletionRequest {
            model: "llama-2-70b-chat".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
            temperature: 0.7,
            max_tokens: 2000,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama-2-70b-chat");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn test_first_choice_text() {
        let completion: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"hi"}},{"message":{"content":"ignored"}}]}"#,
        )
        .unwrap();
        assert_eq!(completion.first_choice_text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_first_choice_text_empty_choices() {
        let completion: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(completion.first_choice_text(), None);
    }

    #[test]
    fn test_first_choice_text_missing_content() {
        let completion: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{}}]}"#).unwrap();
        assert_eq!(completion.first_choice_text(), None);
    }
}
