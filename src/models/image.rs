use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed body of a successful txt2img response.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    /// Base64-encoded image payloads.
    #[serde(default)]
    pub images: Vec<String>,
    /// Generation info string echoed back by the WebUI.
    #[serde(default)]
    pub info: Option<String>,
}

/// One entry of the `/sdapi/v1/sd-models` catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdModel {
    pub title: String,
    pub model_name: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// One entry of the `/sdapi/v1/samplers` catalog. Diagnostics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerInfo {
    pub name: String,
}

/// Provenance record written as a `.json` sidecar next to each saved image.
/// Never mutated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub prompt: String,
    pub negative_prompt: String,
    /// The raw per-request overrides from the prompts file.
    pub parameters: Map<String, Value>,
    /// Checkpoint active when the image was generated, when readable.
    pub model: Option<String>,
    pub generation_time: DateTime<Utc>,
    /// 1-based index of the prompt descriptor within the batch.
    pub batch_index: usize,
    /// 1-based index of the image within one response.
    pub image_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generation_response_parses_images() {
        let response: GenerationResponse = serde_json::from_value(json!({
            "images": ["aGVsbG8=", "d29ybGQ="],
            "parameters": {"steps": 20},
            "info": "{\"seed\": 42}"
        }))
        .unwrap();
        assert_eq!(response.images.len(), 2);
        assert_eq!(response.info.as_deref(), Some("{\"seed\": 42}"));
    }

    #[test]
    fn generation_response_defaults_missing_images_to_empty() {
        let response: GenerationResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.images.is_empty());
        assert!(response.info.is_none());
    }

    #[test]
    fn sd_model_parses_catalog_entry() {
        let model: SdModel = serde_json::from_value(json!({
            "title": "dreamshaper_8.safetensors [879db523c3]",
            "model_name": "dreamshaper_8",
            "hash": "879db523c3",
            "filename": "/models/dreamshaper_8.safetensors",
            "config": null
        }))
        .unwrap();
        assert_eq!(model.model_name, "dreamshaper_8");
        assert_eq!(model.hash.as_deref(), Some("879db523c3"));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let metadata = ImageMetadata {
            prompt: "a cat".to_string(),
            negative_prompt: "blurry".to_string(),
            parameters: json!({"steps": 25}).as_object().cloned().unwrap(),
            model: Some("dreamshaper_8".to_string()),
            generation_time: Utc::now(),
            batch_index: 1,
            image_index: 2,
        };
        let text = serde_json::to_string_pretty(&metadata).unwrap();
        let parsed: ImageMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, metadata);
    }
}
