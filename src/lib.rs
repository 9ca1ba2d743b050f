//! Batch client for the Stable Diffusion WebUI HTTP API.
//!
//! Loads prompt descriptors from a JSON file, drives txt2img generation
//! sequentially against a running WebUI instance, decodes the returned
//! base64 payloads, and persists each image with a JSON sidecar describing
//! its provenance.

pub mod batch;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod persist;
pub mod prompts;
pub mod webui;

pub use batch::{BatchRunner, BatchSummary};
pub use config::Config;
pub use error::{Result, SdBatchError};
pub use models::{
    GenerationParams, GenerationResponse, ImageMetadata, PromptConfig, SamplerInfo, SdModel,
};
pub use persist::{ImageFormat, ImagePersister};
pub use prompts::{load_prompts, sample_prompts};
pub use webui::{SdApi, WebUiClient};
