use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("botdesk.db");
        let config_path = data_dir.join("config.toml");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            db_path,
            config_path,
        }
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("BOTDESK_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    PathBuf::from(env::var("HOME").unwrap_or_else(|_| ".".to_string())).join(".botdesk")
}

/// Typed application configuration, loaded from `config.toml` with
/// environment-variable overrides for the service endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Provider selector: "ollama", "openai" or "mock".
    pub provider: String,
    /// Preferred model name for the local-model provider.
    pub model: String,
    pub ollama_url: String,
    pub chroma_url: String,
    pub ingest_url: String,
    /// Default number of chunks retrieved per query.
    pub top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "llama2".to_string(),
            ollama_url: "http://127.0.0.1:11434".to_string(),
            chroma_url: "http://127.0.0.1:8000".to_string(),
            ingest_url: "http://127.0.0.1:8001".to_string(),
            top_k: 5,
        }
    }
}

impl AppConfig {
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let mut config = if paths.config_path.exists() {
            let raw = fs::read_to_string(&paths.config_path).map_err(ApiError::internal)?;
            toml::from_str(&raw).map_err(ApiError::internal)?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MODEL_PROVIDER") {
            self.provider = val;
        }
        if let Ok(val) = env::var("MODEL_NAME") {
            self.model = val;
        }
        if let Ok(val) = env::var("OLLAMA_URL") {
            self.ollama_url = val;
        }
        if let Ok(val) = env::var("CHROMA_URL") {
            self.chroma_url = val;
        }
        if let Ok(val) = env::var("INGEST_URL") {
            self.ingest_url = val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_mock_provider() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "mock");
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str("provider = \"ollama\"").unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.chroma_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "provider = \"ollama\"\nmodel = \"from-file\"\n",
        )
        .unwrap();

        let paths = AppPaths {
            data_dir: dir.path().to_path_buf(),
            log_dir: dir.path().join("logs"),
            db_path: dir.path().join("botdesk.db"),
            config_path: dir.path().join("config.toml"),
        };

        env::set_var("MODEL_NAME", "from-env");
        let config = AppConfig::load(&paths).unwrap();
        env::remove_var("MODEL_NAME");

        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "from-env");
    }
}
