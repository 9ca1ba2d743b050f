use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SdBatchError};
use crate::models::{ImageMetadata, PromptConfig};
use crate::persist::ImagePersister;
use crate::webui::SdApi;

/// Pause between images of one response, to avoid hammering the service.
const IMAGE_DELAY: Duration = Duration::from_secs(1);
/// Pause between prompt descriptors.
const ITEM_DELAY: Duration = Duration::from_secs(2);

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Images returned by the service and handed to the persister.
    pub attempted: usize,
    /// Images written to disk.
    pub succeeded: usize,
}

/// Drives one sequential pass over the prompt list: preflight, per-item
/// generation and persistence, fixed pacing delays, final report.
///
/// One item's failure never aborts the rest of the batch; only a failed
/// preflight does.
pub struct BatchRunner<A: SdApi> {
    api: A,
    persister: ImagePersister,
    base_url: String,
    cancel: Arc<AtomicBool>,
}

impl<A: SdApi> BatchRunner<A> {
    pub fn new(api: A, persister: ImagePersister, base_url: impl Into<String>) -> Self {
        Self {
            api,
            persister,
            base_url: base_url.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between loop iterations (never mid-request). Setting it
    /// stops the batch after the current item.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run(&self, prompts: &[PromptConfig]) -> Result<BatchSummary> {
        if !self.api.check_status().await {
            log::error!("エラー: Stable Diffusion WebUI APIに接続できません");
            log::error!("URL: {}", self.base_url);
            log::error!("WebUIが起動していることを確認してください");
            let summary = BatchSummary::default();
            self.report(&summary);
            return Err(SdBatchError::ServiceUnreachable {
                url: self.base_url.clone(),
            });
        }

        log::info!("Stable Diffusion WebUI APIに接続しました");
        log::info!("出力ディレクトリ: {}", self.persister.output_dir().display());
        if let Ok(Some(model)) = self.api.current_model().await {
            log::info!("現在のモデル: {}", model);
        }

        let mut summary = BatchSummary::default();

        for (i, item) in prompts.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                log::warn!("中断要求を受信しました。バッチ処理を停止します");
                break;
            }

            log::info!("--- {}/{} ---", i + 1, prompts.len());

            if item.prompt.is_empty() {
                log::info!("プロンプトが設定されていません。スキップします。");
                continue;
            }

            match self
                .api
                .generate_image(&item.prompt, &item.negative_prompt, &item.params)
                .await
            {
                Ok(result) if !result.images.is_empty() => {
                    self.persist_images(&mut summary, item, i, &result.images)
                        .await;
                }
                Ok(_) => log::warn!("画像生成に失敗しました"),
                Err(e) => {
                    log::error!("{}", e);
                    log::warn!("画像生成に失敗しました");
                }
            }

            if i < prompts.len() - 1 {
                tokio::time::sleep(ITEM_DELAY).await;
            }
        }

        self.report(&summary);
        Ok(summary)
    }

    async fn persist_images(
        &self,
        summary: &mut BatchSummary,
        item: &PromptConfig,
        item_index: usize,
        images: &[String],
    ) {
        for (j, image_data) in images.iter().enumerate() {
            summary.attempted += 1;

            // Re-read the active checkpoint per image so the sidecar stays
            // accurate if something switched models mid-run.
            let model = self.api.current_model().await.unwrap_or(None);
            let metadata = ImageMetadata {
                prompt: item.prompt.clone(),
                negative_prompt: item.negative_prompt.clone(),
                parameters: item.params.clone(),
                model,
                generation_time: Utc::now(),
                batch_index: item_index + 1,
                image_index: j + 1,
            };

            match self
                .persister
                .save_image(image_data, &item.prompt, Some(&metadata))
                .await
            {
                Ok(_) => summary.succeeded += 1,
                Err(e) => log::error!("画像保存エラー: {}", e),
            }

            if j < images.len() - 1 {
                tokio::time::sleep(IMAGE_DELAY).await;
            }
        }
    }

    fn report(&self, summary: &BatchSummary) {
        log::info!("=== バッチ処理完了 ===");
        log::info!("総生成数: {}", summary.attempted);
        log::info!("成功数: {}", summary.succeeded);
        log::info!("出力先: {}", self.persister.output_dir().display());
    }
}
