use serde_json::Value;
use std::path::Path;

use crate::error::{Result, SdBatchError};
use crate::models::PromptConfig;

/// Load and validate prompt descriptors from a JSON file.
///
/// The three failure stages stay distinct: a missing path is
/// [`SdBatchError::ConfigNotFound`], an unreadable file is
/// [`SdBatchError::Io`], invalid JSON is [`SdBatchError::ConfigParse`], and
/// a well-formed document with the wrong shape is
/// [`SdBatchError::ConfigValidation`]. All of it happens before any network
/// activity.
pub fn load_prompts(path: &Path) -> Result<Vec<PromptConfig>> {
    if !path.exists() {
        return Err(SdBatchError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let document: Value =
        serde_json::from_str(&content).map_err(|source| SdBatchError::ConfigParse { source })?;

    validate_prompts(&document)?;

    serde_json::from_value(document).map_err(|e| {
        SdBatchError::ConfigValidation(format!("設定ファイルの形式が不正です: {}", e))
    })
}

/// Shape validation on the parsed document. Reports the first violating
/// element with its 1-based position.
fn validate_prompts(document: &Value) -> Result<()> {
    let items = document.as_array().ok_or_else(|| {
        SdBatchError::ConfigValidation("設定ファイルは配列形式である必要があります".to_string())
    })?;

    for (i, item) in items.iter().enumerate() {
        let entry = item.as_object().ok_or_else(|| {
            SdBatchError::ConfigValidation(format!(
                "プロンプト{}は辞書形式である必要があります",
                i + 1
            ))
        })?;
        match entry.get("prompt") {
            Some(Value::String(prompt)) if !prompt.is_empty() => {}
            _ => {
                return Err(SdBatchError::ConfigValidation(format!(
                    "プロンプト{}にpromptが設定されていません",
                    i + 1
                )))
            }
        }
    }

    Ok(())
}

/// The built-in demo descriptors used by `--sample` runs.
pub fn sample_prompts() -> Vec<PromptConfig> {
    vec![
        sample(
            "a beautiful landscape with mountains and a lake, sunset, digital art",
            "blurry, low quality, distorted",
            serde_json::json!({
                "steps": 25,
                "cfg_scale": 8,
                "width": 768,
                "height": 512
            }),
        ),
        sample(
            "cute cat sitting on a windowsill, soft lighting, photography",
            "blurry, low quality",
            serde_json::json!({
                "steps": 20,
                "cfg_scale": 7,
                "width": 512,
                "height": 512
            }),
        ),
        sample(
            "futuristic city skyline at night, neon lights, cyberpunk style",
            "blurry, low quality, distorted",
            serde_json::json!({
                "steps": 30,
                "cfg_scale": 9,
                "width": 768,
                "height": 512,
                "sampler_name": "Euler a"
            }),
        ),
    ]
}

fn sample(prompt: &str, negative_prompt: &str, params: Value) -> PromptConfig {
    PromptConfig {
        prompt: prompt.to_string(),
        negative_prompt: negative_prompt.to_string(),
        params: params.as_object().cloned().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_config_loads_with_defaults() {
        let file = write_config(
            r#"[
                {"prompt": "a cat"},
                {"prompt": "a dog", "negative_prompt": "blurry", "params": {"steps": 30}}
            ]"#,
        );
        let prompts = load_prompts(file.path()).unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].prompt, "a cat");
        assert_eq!(prompts[0].negative_prompt, "");
        assert!(prompts[0].params.is_empty());
        assert_eq!(prompts[1].params["steps"], serde_json::json!(30));
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let err = load_prompts(Path::new("does/not/exist.json")).unwrap_err();
        assert!(matches!(err, SdBatchError::ConfigNotFound { .. }));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let file = write_config("{ not json");
        let err = load_prompts(file.path()).unwrap_err();
        assert!(matches!(err, SdBatchError::ConfigParse { .. }));
    }

    #[test]
    fn top_level_object_fails_the_array_constraint() {
        let file = write_config(r#"{"prompt": "a cat"}"#);
        let err = load_prompts(file.path()).unwrap_err();
        assert!(matches!(err, SdBatchError::ConfigValidation(_)));
        assert!(err.to_string().contains("配列形式"));
    }

    #[test]
    fn non_object_element_names_its_position() {
        let file = write_config(r#"[{"prompt": "ok"}, "just a string"]"#);
        let err = load_prompts(file.path()).unwrap_err();
        assert!(err.to_string().contains("プロンプト2"));
        assert!(err.to_string().contains("辞書形式"));
    }

    #[test]
    fn element_without_prompt_names_its_position() {
        let file = write_config(r#"[{"negative_prompt": "blurry"}]"#);
        let err = load_prompts(file.path()).unwrap_err();
        assert!(err.to_string().contains("プロンプト1"));
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn empty_prompt_string_is_rejected() {
        let file = write_config(r#"[{"prompt": ""}]"#);
        let err = load_prompts(file.path()).unwrap_err();
        assert!(matches!(err, SdBatchError::ConfigValidation(_)));
    }

    #[test]
    fn empty_array_is_valid() {
        let file = write_config("[]");
        assert!(load_prompts(file.path()).unwrap().is_empty());
    }

    #[test]
    fn sample_prompts_pass_their_own_validation() {
        let samples = sample_prompts();
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| !s.prompt.is_empty()));
        assert_eq!(samples[2].params["sampler_name"], serde_json::json!("Euler a"));
    }
}
