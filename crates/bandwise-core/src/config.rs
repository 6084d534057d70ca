//! Evaluator configuration.
//!
//! Loaded from YAML, overlaid by environment variables. The API key is never part of
//! this file; it travels separately as [`Credentials`].
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BANDWISE_PROVIDER` | `provider` |
//! | `BANDWISE_MODEL` | `model` |
//! | `BANDWISE_BASE_URL` | `base_url` |
//! | `BANDWISE_COOLDOWN_MS` | `cooldown_ms` |
//! | `BANDWISE_MAX_RETRIES` | `retry.max_retries` |
//! | `BANDWISE_LANGUAGE` | `language` |

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cooldown::CooldownScheduler;
use crate::retry::RetryPolicy;

pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Openai,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Openai => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Openai => "https://api.openai.com/v1",
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::Openai),
            other => anyhow::bail!(
                "config error: unknown provider '{}' (expected 'gemini' or 'openai')",
                other
            ),
        }
    }
}

/// Backend API key. Passed explicitly to a client; never read from ambient state.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Optional files replacing the built-in band descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricOverrides {
    #[serde(default)]
    pub task1_path: Option<PathBuf>,
    #[serde(default)]
    pub task2_path: Option<PathBuf>,
}

impl RubricOverrides {
    /// Anchor relative descriptor paths at `base`, the directory of the config file
    /// that named them.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.task1_path, &mut self.task2_path].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,

    #[serde(default = "default_model")]
    pub model: String,

    /// Overrides the provider's public endpoint (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Pause between dependent backend calls of one run.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Language the examiner writes its feedback in.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub rubric: RubricOverrides,
}

fn default_provider() -> Provider {
    Provider::Gemini
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_cooldown_ms() -> u64 {
    CooldownScheduler::DEFAULT_MS
}

fn default_language() -> String {
    "English".to_string()
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
            cooldown_ms: default_cooldown_ms(),
            language: default_language(),
            rubric: RubricOverrides::default(),
        }
    }
}

impl EvaluatorConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse yaml config {}", path.display()))?;
        if let Some(dir) = path.parent() {
            cfg.rubric.resolve_relative_to(dir);
        }
        Ok(cfg)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Overlay `BANDWISE_*` variables onto this config.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = get("BANDWISE_PROVIDER") {
            self.provider = Provider::parse(&v)?;
        }
        if let Some(v) = get("BANDWISE_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("BANDWISE_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = get("BANDWISE_COOLDOWN_MS") {
            self.cooldown_ms = v
                .trim()
                .parse()
                .with_context(|| format!("config error: BANDWISE_COOLDOWN_MS='{}'", v))?;
        }
        if let Some(v) = get("BANDWISE_MAX_RETRIES") {
            self.retry.max_retries = v
                .trim()
                .parse()
                .with_context(|| format!("config error: BANDWISE_MAX_RETRIES='{}'", v))?;
        }
        if let Some(v) = get("BANDWISE_LANGUAGE") {
            self.language = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            anyhow::bail!("config error: model must not be empty");
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!(
                "config error: retry.max_retries={} exceeds the limit of {}",
                self.retry.max_retries,
                MAX_RETRIES_LIMIT
            );
        }
        if self.retry.max_retries > 0 && self.retry.initial_delay_ms == 0 {
            anyhow::bail!("config error: retry.initial_delay_ms must be positive when retries are enabled");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "config error: temperature {} outside [0, 2]",
                self.temperature
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("config error: timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn cooldown(&self) -> CooldownScheduler {
        CooldownScheduler::from_millis(self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_fills_defaults() {
        let cfg: EvaluatorConfig = serde_yaml::from_str("model: gpt-4o-mini\nprovider: openai\n").unwrap();
        assert_eq!(cfg.provider, Provider::Openai);
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.cooldown_ms, 5000);
        assert_eq!(cfg.base_url(), "https://api.openai.com/v1");
        cfg.validate().unwrap();
    }

    #[test]
    fn load_reads_nested_retry_and_rubric() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bandwise.yaml");
        std::fs::write(
            &path,
            "retry:\n  max_retries: 5\n  initial_delay_ms: 500\ncooldown_ms: 0\nrubric:\n  task2_path: t2.txt\n",
        )
        .unwrap();
        let cfg = EvaluatorConfig::load(&path).unwrap();
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.initial_delay_ms, 500);
        assert_eq!(cfg.cooldown_ms, 0);
        assert_eq!(cfg.rubric.task2_path, Some(dir.path().join("t2.txt")));
        assert_eq!(cfg.provider, Provider::Gemini);
    }

    #[test]
    fn rubric_paths_resolve_against_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("conf");
        std::fs::create_dir_all(nested.join("descriptors")).unwrap();
        std::fs::write(nested.join("descriptors/task2.txt"), "Band 9: ...").unwrap();
        let absolute = dir.path().join("task1.txt");
        let path = nested.join("bandwise.yaml");
        std::fs::write(
            &path,
            format!(
                "rubric:\n  task1_path: {}\n  task2_path: descriptors/task2.txt\n",
                absolute.display()
            ),
        )
        .unwrap();

        let cfg = EvaluatorConfig::load(&path).unwrap();
        let task2 = cfg.rubric.task2_path.unwrap();
        assert_eq!(task2, nested.join("descriptors/task2.txt"));
        assert!(task2.exists());
        assert_eq!(cfg.rubric.task1_path, Some(absolute));
    }

    #[test]
    fn env_overlay_applies_and_rejects_garbage() {
        let vars: HashMap<&str, &str> = [
            ("BANDWISE_PROVIDER", "OpenAI"),
            ("BANDWISE_COOLDOWN_MS", "250"),
            ("BANDWISE_LANGUAGE", "Vietnamese"),
        ]
        .into_iter()
        .collect();
        let mut cfg = EvaluatorConfig::default();
        cfg.apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.provider, Provider::Openai);
        assert_eq!(cfg.cooldown_ms, 250);
        assert_eq!(cfg.language, "Vietnamese");

        let err = EvaluatorConfig::default()
            .apply_vars(|k| (k == "BANDWISE_MAX_RETRIES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("BANDWISE_MAX_RETRIES"));
    }

    #[test]
    fn validate_rejects_excessive_retries() {
        let mut cfg = EvaluatorConfig::default();
        cfg.retry.max_retries = 50;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("sk-secret");
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("sk-secret"));
        assert_eq!(creds.api_key(), "sk-secret");
    }
}
