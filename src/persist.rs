use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, SdBatchError};
use crate::models::ImageMetadata;

/// Binary format of a decoded payload, sniffed from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    /// RIFF container signature. A loose heuristic, not full WebP validation.
    WebP,
    Unknown,
}

impl ImageFormat {
    /// Classify a byte buffer by its magic bytes. Pure and total: every
    /// input maps to exactly one variant.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            ImageFormat::Png
        } else if bytes.starts_with(&[0xFF, 0xD8]) {
            ImageFormat::Jpeg
        } else if bytes.starts_with(&[0x52, 0x49, 0x46, 0x46]) {
            ImageFormat::WebP
        } else {
            ImageFormat::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::WebP => "WebP",
            ImageFormat::Unknown => "不明",
        }
    }
}

/// Keep only alphanumerics, spaces, hyphens, and underscores from the
/// prompt, cap the fragment at 30 characters, and collapse whitespace runs
/// to single underscores. Idempotent on its own output.
pub fn sanitize_prompt(prompt: &str) -> String {
    let kept: String = prompt
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(30)
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

/// `<prefix><YYYYMMDD_HHMMSS>_<fragment>.png`, second resolution, UTC.
/// Two saves of the same sanitized prompt within one second collide; that
/// is an accepted limitation.
pub fn build_filename(prefix: &str, prompt: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}{}_{}.png",
        prefix,
        now.format("%Y%m%d_%H%M%S"),
        sanitize_prompt(prompt)
    )
}

/// Decodes base64 payloads and writes them, with optional JSON sidecar
/// metadata, under the configured output directory.
#[derive(Debug, Clone)]
pub struct ImagePersister {
    output_dir: PathBuf,
    prefix: String,
}

impl ImagePersister {
    pub fn new(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            prefix: config.image_prefix.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Decode, sniff, and write one image, plus its sidecar when metadata
    /// is given. Returns the written image path.
    pub async fn save_image(
        &self,
        image_data: &str,
        prompt: &str,
        metadata: Option<&ImageMetadata>,
    ) -> Result<PathBuf> {
        log::debug!("受信データサイズ: {} 文字", image_data.len());

        let bytes = STANDARD.decode(image_data)?;
        log::debug!("デコード後バッファサイズ: {} バイト", bytes.len());

        let format = ImageFormat::sniff(&bytes);
        if format == ImageFormat::Unknown {
            log::warn!("⚠ 認識できない画像フォーマットです");
            log::warn!("ヘッダー: {}", header_hex(&bytes));
        } else {
            log::debug!("画像フォーマット: {}", format.label());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let filename = build_filename(&self.prefix, prompt, Utc::now());
        let path = self.output_dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;

        if let Some(metadata) = metadata {
            let json = serde_json::to_string_pretty(metadata).map_err(|e| {
                SdBatchError::Internal(format!("メタデータのシリアライズに失敗しました: {}", e))
            })?;
            let metadata_path = path.with_extension("json");
            tokio::fs::write(&metadata_path, json).await?;
            log::info!("メタデータ保存: {}", metadata_path.display());
        }

        log::info!("✓ 画像を保存しました: {}", path.display());
        Ok(path)
    }
}

fn header_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(8)
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
