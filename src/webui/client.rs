use async_trait::async_trait;
use reqwest::Response;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, SdBatchError};
use crate::models::{GenerationResponse, SamplerInfo, SdModel};
use crate::webui::SdApi;

const OPTIONS_PATH: &str = "/sdapi/v1/options";
const MODELS_PATH: &str = "/sdapi/v1/sd-models";
const SAMPLERS_PATH: &str = "/sdapi/v1/samplers";

/// Generation can legitimately take minutes on slow hardware.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);
/// Status and catalog calls answer quickly when the service is up at all.
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

const BODY_SNIPPET_CHARS: usize = 200;

/// Reqwest-backed client for one Stable Diffusion WebUI instance.
#[derive(Debug, Clone)]
pub struct WebUiClient {
    http: reqwest::Client,
    base_url: String,
    api_endpoint: String,
}

impl WebUiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_endpoint: config.api_endpoint.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_from(response: Response) -> SdBatchError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        SdBatchError::Http {
            status,
            body: body_snippet(&body),
        }
    }
}

#[async_trait]
impl SdApi for WebUiClient {
    async fn check_status(&self) -> bool {
        self.http
            .get(self.url(OPTIONS_PATH))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    async fn options(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.url(OPTIONS_PATH))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn current_model(&self) -> Result<Option<String>> {
        let options = self.options().await?;
        Ok(options
            .get("sd_model_checkpoint")
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    async fn set_model(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(OPTIONS_PATH))
            .timeout(STATUS_TIMEOUT)
            .json(&json!({ "sd_model_checkpoint": name }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<SdModel>> {
        let response = self
            .http
            .get(self.url(MODELS_PATH))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn list_samplers(&self) -> Result<Vec<SamplerInfo>> {
        let response = self
            .http
            .get(self.url(SAMPLERS_PATH))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn txt2img(&self, payload: &Map<String, Value>) -> Result<GenerationResponse> {
        let response = self
            .http
            .post(self.url(&self.api_endpoint))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let err = Self::error_from(response).await;
            log::error!("{}", err);
            return Err(err);
        }
        Ok(response.json().await?)
    }
}

fn body_snippet(body: &str) -> String {
    let mut snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    if body.chars().count() > BODY_SNIPPET_CHARS {
        snippet.push_str("...");
    }
    snippet
}
