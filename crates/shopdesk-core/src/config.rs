use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

use crate::ai::inference::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::ai::{InferenceClient, SamplingParams};
use crate::completion::CompletionClient;
use crate::relevance::RelevanceFilter;

/// Environment variable holding the inference credential.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Persistent settings. The credential is deliberately not part of this file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location, or defaults if no file exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
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

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("shopdesk").join("config.json"))
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn relevance_filter(&self) -> RelevanceFilter {
        match &self.keywords {
            Some(keywords) => RelevanceFilter::new(keywords),
            None => RelevanceFilter::default(),
        }
    }

    pub fn sampling(&self) -> SamplingParams {
        let defaults = SamplingParams::default();
        SamplingParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }

    /// Read the credential once; callers inject it into the client.
    pub fn credential_from_env() -> Option<String> {
        std::env::var(TOKEN_ENV_VAR).ok()
    }

    /// Wire the filter, HTTP transport and completion client from these settings.
    pub fn build_client(&self, credential: Option<String>) -> CompletionClient {
        let transport = InferenceClient::new(self.endpoint(), credential);
        let client = CompletionClient::new(self.relevance_filter(), Box::new(transport), self.model())
            .with_sampling(self.sampling());

        match &self.system_prompt {
            Some(prompt) => client.with_system_prompt(prompt.clone()),
            None => client,
        }
    }
}
