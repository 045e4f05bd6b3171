use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub chat_url: String,
    pub docstore_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub num_results: usize,
    pub min_similarity: f32,
    /// Query the docstore for context alongside every question
    pub fetch_context: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            chat_url: "http://localhost:8080".to_string(),
            docstore_url: "http://localhost:8001".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            num_results: 5,
            min_similarity: 0.1,
            fetch_context: true,
        }
    }

    /// Load from the user config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ASSISTANT_CHAT_URL") {
            self.chat_url = url;
        }
        if let Ok(url) = std::env::var("ASSISTANT_DOCSTORE_URL") {
            self.docstore_url = url;
        }
    }

    /// Directory holding the config file and the log
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("llm-assistant"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
