use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{ModelSettings, NetworkSettings};
use crate::error::{NotesError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
    pub finish_reason: Option<String>,
    pub response_time: Duration,
}

/// A model that turns a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<LlmResponse>;

    fn model_id(&self) -> &str;
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(settings: &ModelSettings, api_key: Option<String>, network: &NetworkSettings) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        if let Some(key) = api_key {
            let value = reqwest::header::HeaderValue::from_str(&key)
                .map_err(|_| NotesError::Config("API key contains invalid characters".to_string()))?;
            headers.insert("x-goog-api-key", value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout))
            .default_headers(headers)
            .danger_accept_invalid_certs(network.accept_invalid_certs);

        if let Some(proxy_url) = &network.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| NotesError::Config(format!("Invalid proxy '{}': {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| NotesError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model_id.clone(),
            temperature: settings.temperature,
        })
    }

    pub async fn check_health(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(NotesError::Service(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1beta/models", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotesError::Service(format!("API error {}: {}", status, error_text)));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| NotesError::Service(format!("Failed to parse models response: {}", e)))?;

        Ok(models
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<LlmResponse> {
        let start_time = Instant::now();

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            system_instruction: system_prompt.map(|system| Content {
                role: None,
                parts: vec![Part { text: system.to_string() }],
            }),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type: Some("application/json".to_string()),
            },
        };

        debug!("Sending request to {}: {} prompt chars", self.model, prompt.chars().count());

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(NotesError::Service(format!("API error {}: {}", status, error_text)));
        }

        let completion: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| NotesError::Service(format!("Failed to parse completion response: {}", e)))?;

        let candidate = completion
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| NotesError::Service("No candidates in response".to_string()))?;

        let content = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        let response_time = start_time.elapsed();
        debug!("Response from {} in {:?}", self.model, response_time);

        Ok(LlmResponse {
            content,
            usage: completion.usage_metadata.unwrap_or_default(),
            model: completion.model_version.unwrap_or_else(|| self.model.clone()),
            finish_reason: candidate.finish_reason,
            response_time,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> GeminiClient {
        let settings = ModelSettings {
            base_url: server.url(),
            ..ModelSettings::default()
        };
        GeminiClient::new(&settings, Some("test-key".to_string()), &NetworkSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"extractions\": "}, {"text": "[]}"}]}, "finishReason": "STOP"}],
                    "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 3, "totalTokenCount": 13},
                    "modelVersion": "gemini-2.5-flash"
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.generate("prompt", Some("system")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, r#"{"extractions": []}"#);
        assert_eq!(response.usage.total_token_count, 13);
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }

    #[tokio::test]
    async fn test_generate_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.generate("prompt", None).await.unwrap_err();

        assert!(matches!(err, NotesError::Service(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.generate("prompt", None).await,
            Err(NotesError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_list_models_strips_prefix() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1beta/models")
            .with_status(200)
            .with_body(r#"{"models": [{"name": "models/gemini-2.5-flash"}, {"name": "models/gemini-2.5-pro"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["gemini-2.5-flash", "gemini-2.5-pro"]);
        assert!(client.check_health().await.unwrap());
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let network = NetworkSettings {
            proxy: Some("not a url".to_string()),
            accept_invalid_certs: false,
        };
        let result = GeminiClient::new(&ModelSettings::default(), None, &network);
        assert!(matches!(result, Err(NotesError::Config(_))));
    }
}
