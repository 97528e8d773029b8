use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use nutrisense_core::gemini::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};

use crate::config::GeminiSettings;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("nutrisense/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.trim().to_string(),
            base_url: settings.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    /// Send one composed prompt and return the model's text answer.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let Some(ref api_key) = self.api_key else {
            bail!("No Gemini API key configured. Set GEMINI_API_KEY or GOOGLE_API_KEY");
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "calling generateContent");

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            bail!("Gemini API returned {status}: {detail}");
        }

        let data: GenerateContentResponse = resp
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        data.text()
    }
}
