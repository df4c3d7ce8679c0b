use std::path::PathBuf;

/// Runtime configuration, sourced from the environment (a `.env` file is
/// loaded by main before this runs) plus CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub screenshots_dir: PathBuf,
}

impl Config {
    pub fn from_env(screenshots_dir: PathBuf) -> Self {
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash-lite".to_string());
        Self {
            gemini_api_key,
            gemini_model,
            screenshots_dir,
        }
    }
}
