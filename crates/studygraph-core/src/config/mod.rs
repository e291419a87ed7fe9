//! User configuration, persisted as TOML under the platform config dir

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Studygraph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub jobs: JobConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            default_model: "openai/gpt-4o-mini".to_string(),
            fallback_models: vec!["anthropic/claude-3-5-haiku-latest".to_string()],
            temperature: 0.3,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; `None` uses the platform data directory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Jobs older than this are swept regardless of status
    pub retention_days: u32,
    pub sweep_interval_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            sweep_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Item bodies longer than this are truncated before prompting
    pub max_item_chars: usize,
    /// Build a document-level mindmap once all items are derived
    pub generate_document_mindmap: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_item_chars: 4000,
            generate_document_mindmap: true,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("STUDYGRAPH_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "API keys are read from STUDYGRAPH_API_KEY or OPENROUTER_API_KEY and cannot be saved in config.toml"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// `$STUDYGRAPH_CONFIG_DIR`, else `<config dir>/studygraph`
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("STUDYGRAPH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("No platform config directory; set STUDYGRAPH_CONFIG_DIR"))?
                .join("studygraph")
        };
        Ok(dir)
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write back to [`Config::config_path`]. Refuses to persist an API key.
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Cannot write {}", path.display()))?;

        Ok(())
    }

    /// Reject out-of-range values before they reach the pipeline
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be within 0.0..=2.0"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be greater than zero"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be greater than zero"));
        }
        if self.jobs.retention_days == 0 {
            return Err(anyhow!("jobs.retention_days must be at least 1"));
        }
        if self.jobs.sweep_interval_secs == 0 {
            return Err(anyhow!("jobs.sweep_interval_secs must be greater than zero"));
        }
        Ok(())
    }

    /// List configuration keys and their values for display
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let api_key = match self.llm.redacted_api_key()? {
            Some(redacted) => redacted,
            None => "(not set - use STUDYGRAPH_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
        };
        let db_path = self
            .database
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string());

        Ok(vec![
            ("llm.base_url".into(), self.llm.base_url.clone()),
            ("llm.default_model".into(), self.llm.default_model.clone()),
            ("llm.fallback_models".into(), self.llm.fallback_models.join(", ")),
            ("llm.temperature".into(), self.llm.temperature.to_string()),
            ("llm.max_tokens".into(), self.llm.max_tokens.to_string()),
            ("llm.timeout_secs".into(), self.llm.timeout_secs.to_string()),
            ("llm.api_key".into(), api_key),
            ("database.path".into(), db_path),
            (
                "database.max_connections".into(),
                self.database.max_connections.to_string(),
            ),
            ("jobs.retention_days".into(), self.jobs.retention_days.to_string()),
            (
                "jobs.sweep_interval_secs".into(),
                self.jobs.sweep_interval_secs.to_string(),
            ),
            (
                "pipeline.max_item_chars".into(),
                self.pipeline.max_item_chars.to_string(),
            ),
            (
                "pipeline.generate_document_mindmap".into(),
                self.pipeline.generate_document_mindmap.to_string(),
            ),
        ])
    }
}
