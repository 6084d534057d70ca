//! Config, credentials and input files shared by the model-calling commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bandwise_core::{build_client, Credentials, EvaluatorConfig, ModelCaller, WritingTest};

use crate::cli::args::BackendArgs;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EvaluatorConfig> {
    let mut cfg = match path {
        Some(p) => EvaluatorConfig::load(p)?,
        None => EvaluatorConfig::default(),
    };
    cfg.apply_env()?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn credentials(args: &BackendArgs) -> anyhow::Result<Credentials> {
    match args.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Credentials::new(key)),
        _ => anyhow::bail!("config error: no API key (pass --api-key or set BANDWISE_API_KEY)"),
    }
}

/// Config plus a client for the configured backend.
pub fn connect(args: &BackendArgs) -> anyhow::Result<(EvaluatorConfig, Arc<dyn ModelCaller>)> {
    let cfg = load_config(args.config.as_deref())?;
    let client = build_client(&cfg, credentials(args)?)?;
    tracing::debug!(
        provider = cfg.provider.as_str(),
        model = %cfg.model,
        "backend ready"
    );
    Ok((cfg, client))
}

pub fn load_test(path: &Path) -> anyhow::Result<WritingTest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read writing test {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse writing test {}", path.display()))
}

pub fn read_essay(path: Option<&Path>) -> anyhow::Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p).with_context(|| format!("failed to read essay {}", p.display()))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_key_is_rejected() {
        let args = BackendArgs {
            config: None,
            api_key: Some("  ".into()),
        };
        assert!(credentials(&args).is_err());

        let args = BackendArgs {
            config: None,
            api_key: Some("k-123".into()),
        };
        assert_eq!(credentials(&args).unwrap().api_key(), "k-123");
    }

    #[test]
    fn writing_test_yaml_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.yaml");
        std::fs::write(
            &path,
            "id: academic-01\ntask1:\n  prompt: Describe the chart.\n  reference_facts: \"2020: 45%\"\ntask2:\n  prompt: Discuss both views.\n",
        )
        .unwrap();
        let test = load_test(&path).unwrap();
        assert_eq!(test.id, "academic-01");
        assert_eq!(test.task1.reference_facts.as_deref(), Some("2020: 45%"));
        assert_eq!(test.title, "");
    }
}
