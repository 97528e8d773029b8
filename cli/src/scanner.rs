use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use nutrisense_core::models::UserConditions;
use nutrisense_core::scan::{ScanResponse, ScannedFood};

/// Client for the remote food-image scan backend.
pub struct ScanClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScanClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("nutrisense/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub async fn scan(
        &self,
        image: Vec<u8>,
        file_name: &str,
        content_type: &str,
        conditions: &UserConditions,
    ) -> Result<Vec<ScannedFood>> {
        let file = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .context("Invalid image content type")?;
        let form = Form::new()
            .part("file", file)
            .text("diabetes", conditions.has_diabetes.to_string())
            .text("hypertension", conditions.hypertension.to_string())
            .text("ulcer", conditions.ulcer.to_string())
            .text("weight_loss", conditions.weight_loss.to_string());

        let url = format!("{}/scan-food/", self.base_url);
        debug!(%url, "sending image to scan backend");

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach the food scan service")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Food scan service returned {status}: {body}");
        }

        let data: ScanResponse = resp
            .json()
            .await
            .context("Failed to parse food scan response")?;
        Ok(data.foods)
    }
}
