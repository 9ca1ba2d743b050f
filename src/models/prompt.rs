use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SdBatchError};

/// Reserved override key selecting a model checkpoint. Stripped from the
/// request payload before it is sent to the generation endpoint.
pub const MODEL_PARAM_KEY: &str = "model";

/// One configured generation job, as read from the prompts file.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Default txt2img parameters. Per-request overrides are merged on top
/// key-wise via [`build_payload`].
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub sampler_name: String,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub n_iter: u32,
    pub seed: i64,
    pub restore_faces: bool,
    pub tiling: bool,
    pub enable_hr: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: 20,
            sampler_name: "DPM++ 2M Karras".to_string(),
            cfg_scale: 7.0,
            width: 512,
            height: 512,
            batch_size: 1,
            n_iter: 1,
            seed: -1,
            restore_faces: false,
            tiling: false,
            enable_hr: false,
        }
    }
}

/// Merge per-request overrides over the defaults and extract the reserved
/// model key. Returns the request payload and the requested checkpoint,
/// if any.
pub fn build_payload(
    prompt: &str,
    negative_prompt: &str,
    overrides: &Map<String, Value>,
) -> Result<(Map<String, Value>, Option<String>)> {
    let defaults = GenerationParams {
        prompt: prompt.to_string(),
        negative_prompt: negative_prompt.to_string(),
        ..Default::default()
    };

    let mut payload = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            return Err(SdBatchError::Internal(
                "生成パラメータのシリアライズに失敗しました".to_string(),
            ))
        }
    };

    let mut model = None;
    for (key, value) in overrides {
        if key == MODEL_PARAM_KEY {
            model = value.as_str().map(String::from);
        } else {
            payload.insert(key.clone(), value.clone());
        }
    }

    Ok((payload, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn defaults_match_the_documented_parameter_set() {
        let (payload, model) = build_payload("a cat", "blurry", &Map::new()).unwrap();
        assert_eq!(payload["prompt"], json!("a cat"));
        assert_eq!(payload["negative_prompt"], json!("blurry"));
        assert_eq!(payload["steps"], json!(20));
        assert_eq!(payload["sampler_name"], json!("DPM++ 2M Karras"));
        assert_eq!(payload["cfg_scale"], json!(7.0));
        assert_eq!(payload["width"], json!(512));
        assert_eq!(payload["height"], json!(512));
        assert_eq!(payload["batch_size"], json!(1));
        assert_eq!(payload["n_iter"], json!(1));
        assert_eq!(payload["seed"], json!(-1));
        assert_eq!(payload["restore_faces"], json!(false));
        assert_eq!(payload["tiling"], json!(false));
        assert_eq!(payload["enable_hr"], json!(false));
        assert!(model.is_none());
    }

    #[test]
    fn overrides_replace_defaults_key_wise() {
        let params = overrides(json!({"steps": 30, "cfg_scale": 9, "sampler_name": "Euler a"}));
        let (payload, _) = build_payload("p", "", &params).unwrap();
        assert_eq!(payload["steps"], json!(30));
        assert_eq!(payload["cfg_scale"], json!(9));
        assert_eq!(payload["sampler_name"], json!("Euler a"));
        // untouched defaults survive
        assert_eq!(payload["width"], json!(512));
    }

    #[test]
    fn model_key_is_extracted_and_stripped() {
        let params = overrides(json!({"model": "dreamshaper_8", "steps": 25}));
        let (payload, model) = build_payload("p", "", &params).unwrap();
        assert_eq!(model.as_deref(), Some("dreamshaper_8"));
        assert!(!payload.contains_key(MODEL_PARAM_KEY));
        assert_eq!(payload["steps"], json!(25));
    }

    #[test]
    fn unknown_override_keys_pass_through() {
        let params = overrides(json!({"denoising_strength": 0.6}));
        let (payload, _) = build_payload("p", "", &params).unwrap();
        assert_eq!(payload["denoising_strength"], json!(0.6));
    }

    #[test]
    fn prompt_config_defaults_optional_fields() {
        let config: PromptConfig = serde_json::from_value(json!({"prompt": "a dog"})).unwrap();
        assert_eq!(config.prompt, "a dog");
        assert_eq!(config.negative_prompt, "");
        assert!(config.params.is_empty());
    }
}
