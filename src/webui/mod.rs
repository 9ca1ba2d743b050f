pub mod client;

pub use client::WebUiClient;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::Result;
use crate::models::{build_payload, GenerationResponse, SamplerInfo, SdModel};

/// Wait after a checkpoint switch before generating. The WebUI answers the
/// options POST while it is still reloading model weights, so the switch is
/// not ready when the response arrives. A fixed wait is a heuristic, not a
/// guarantee.
pub const MODEL_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Surface of the Stable Diffusion WebUI HTTP API used by this crate.
///
/// [`WebUiClient`] is the reqwest-backed implementation; tests drive the
/// batch runner against mocks of this trait.
#[async_trait]
pub trait SdApi: Send + Sync {
    /// Probe `/sdapi/v1/options`. Reachable or not, no retries.
    async fn check_status(&self) -> bool;

    /// The raw options document.
    async fn options(&self) -> Result<Value>;

    /// The active checkpoint identifier, when the options carry one.
    async fn current_model(&self) -> Result<Option<String>>;

    /// Request a checkpoint switch.
    async fn set_model(&self, name: &str) -> Result<()>;

    /// The model catalog.
    async fn list_models(&self) -> Result<Vec<SdModel>>;

    /// The sampler catalog. Diagnostics only.
    async fn list_samplers(&self) -> Result<Vec<SamplerInfo>>;

    /// POST the merged parameters to the generation endpoint.
    async fn txt2img(&self, payload: &Map<String, Value>) -> Result<GenerationResponse>;

    /// Merge `overrides` over the default parameters, switch checkpoints
    /// when the reserved `model` key names one that is not active (waiting
    /// [`MODEL_SETTLE_DELAY`] after a successful switch), then generate.
    async fn generate_image(
        &self,
        prompt: &str,
        negative_prompt: &str,
        overrides: &Map<String, Value>,
    ) -> Result<GenerationResponse> {
        let (payload, model) = build_payload(prompt, negative_prompt, overrides)?;

        if let Some(model) = model {
            let current = self.current_model().await.unwrap_or(None);
            if current.as_deref() != Some(model.as_str()) {
                log::info!("モデルを切り替え中: {}", model);
                match self.set_model(&model).await {
                    Ok(()) => {
                        log::info!("モデルを変更しました: {}", model);
                        tokio::time::sleep(MODEL_SETTLE_DELAY).await;
                    }
                    Err(e) => log::error!("モデルの変更に失敗: {}", e),
                }
            }
        }

        log_request_params(prompt, negative_prompt, &payload);
        log::info!("画像生成中: {}...", truncated(prompt, 50));

        let response = self.txt2img(&payload).await?;
        log::info!("✓ API応答受信");
        if response.images.is_empty() {
            log::warn!("⚠ 画像データが空です");
        } else {
            log::info!("✓ 生成画像数: {}", response.images.len());
            log::debug!("画像データサイズ: {} 文字", response.images[0].len());
        }
        Ok(response)
    }
}

fn log_request_params(prompt: &str, negative_prompt: &str, payload: &Map<String, Value>) {
    log::debug!("=== 画像生成パラメータ ===");
    log::debug!("プロンプト: {}", truncated(prompt, 100));
    log::debug!("ネガティブプロンプト: {}", truncated(negative_prompt, 50));
    log::debug!("ステップ数: {}", payload.get("steps").unwrap_or(&Value::Null));
    log::debug!(
        "CFGスケール: {}",
        payload.get("cfg_scale").unwrap_or(&Value::Null)
    );
    log::debug!(
        "サイズ: {}x{}",
        payload.get("width").unwrap_or(&Value::Null),
        payload.get("height").unwrap_or(&Value::Null)
    );
    log::debug!(
        "サンプラー: {}",
        payload.get("sampler_name").unwrap_or(&Value::Null)
    );
}

fn truncated(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
