use std::env;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860";
pub const DEFAULT_API_ENDPOINT: &str = "/sdapi/v1/txt2img";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_IMAGE_PREFIX: &str = "generated_";

/// Connection and output settings for one batch run.
///
/// Built once at startup (usually via [`Config::from_env`]) and passed into
/// the client, persister, and runner. Nothing reads the process environment
/// after construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_endpoint: String,
    pub output_dir: PathBuf,
    pub image_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from `WEBUI_URL`, `API_ENDPOINT`, `OUTPUT_DIR`, and
    /// `IMAGE_PREFIX`, falling back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let base_url = env::var("WEBUI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_endpoint =
            env::var("API_ENDPOINT").unwrap_or_else(|_| DEFAULT_API_ENDPOINT.to_string());
        let output_dir = env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let image_prefix =
            env::var("IMAGE_PREFIX").unwrap_or_else(|_| DEFAULT_IMAGE_PREFIX.to_string());

        Config {
            base_url: normalize_base_url(base_url),
            api_endpoint,
            output_dir,
            image_prefix,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(base_url.into());
        self
    }

    pub fn with_api_endpoint(mut self, api_endpoint: impl Into<String>) -> Self {
        self.api_endpoint = api_endpoint.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_image_prefix(mut self, image_prefix: impl Into<String>) -> Self {
        self.image_prefix = image_prefix.into();
        self
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_webui() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://127.0.0.1:7860");
        assert_eq!(config.api_endpoint, "/sdapi/v1/txt2img");
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.image_prefix, "generated_");
    }

    #[test]
    fn builders_override_fields() {
        let config = Config::new()
            .with_base_url("http://gpu-box:7860")
            .with_api_endpoint("/sdapi/v1/img2img")
            .with_output_dir("/tmp/renders")
            .with_image_prefix("batch_");
        assert_eq!(config.base_url, "http://gpu-box:7860");
        assert_eq!(config.api_endpoint, "/sdapi/v1/img2img");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/renders"));
        assert_eq!(config.image_prefix, "batch_");
    }

    #[test]
    fn trailing_slashes_are_stripped_from_base_url() {
        let config = Config::new().with_base_url("http://127.0.0.1:7860///");
        assert_eq!(config.base_url, "http://127.0.0.1:7860");
    }
}
