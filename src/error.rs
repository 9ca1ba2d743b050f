use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the batch client.
///
/// The config-stage variants and `ServiceUnreachable` are fatal for a run;
/// everything else is absorbed per item or per image by the batch runner.
#[derive(Debug, Error)]
pub enum SdBatchError {
    #[error("設定ファイルが見つかりません: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("JSONファイルの解析に失敗しました: {source}")]
    ConfigParse {
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    ConfigValidation(String),

    #[error("Stable Diffusion WebUI APIに接続できません: {url}")]
    ServiceUnreachable { url: String },

    #[error("API呼び出しエラー: {0}")]
    Request(#[from] reqwest::Error),

    #[error("APIエラー応答 HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("APIレスポンスが不正です: {0}")]
    InvalidResponse(String),

    #[error("画像データのデコードに失敗しました: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部エラー: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SdBatchError>;
