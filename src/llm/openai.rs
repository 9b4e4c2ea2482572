use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::backend::PatchBackend;
use super::prompt::{build_patch_prompt, SYSTEM_PROMPT};
use crate::errors::PatrolError;

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PatchBackend for OpenAiBackend {
    async fn generate_patch(
        &self,
        source_code: &str,
        file_name: &str,
    ) -> Result<String, PatrolError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_patch_prompt(source_code, file_name)},
            ],
            // High temperature on purpose: each retry should explore a
            // different candidate
            "temperature": 1.2,
            "top_p": 1,
            "max_tokens": 4096,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PatrolError::Network(format!("OpenAI request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(PatrolError::LlmApi("Invalid OpenAI API key".into()));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| PatrolError::LlmApi(format!("Failed to parse OpenAI response: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(PatrolError::LlmApi(
                error["message"].as_str().unwrap_or("Unknown").to_string(),
            ));
        }

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| PatrolError::LlmApi("No content in OpenAI response".into()))?;
        Ok(content.to_string())
    }
}
