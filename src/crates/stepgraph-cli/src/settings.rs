//! Run configuration for the binary: optional YAML file, then flags

use anyhow::{Context, Result};
use std::path::Path;
use stepgraph_core::RunConfig;

/// Read a [`RunConfig`] from a YAML file.
///
/// Missing keys take their defaults:
///
/// ```yaml
/// recursion_limit: 10
/// run_name: weather-demo
/// tags: [demo]
/// ```
pub fn load(path: &Path) -> Result<RunConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

fn parse(raw: &str) -> Result<RunConfig> {
    if raw.trim().is_empty() {
        return Ok(RunConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// Build the configuration of a run from an optional file and flag overrides
pub fn resolve(path: Option<&Path>, recursion_limit: Option<usize>) -> Result<RunConfig> {
    let mut config = match path {
        Some(path) => load(path)?,
        None => RunConfig::default(),
    };
    if let Some(limit) = recursion_limit {
        config.recursion_limit = limit;
    }
    tracing::debug!(?config, "run configuration resolved");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_yaml() {
        let config = parse("recursion_limit: 7\ntags: [demo, cli]\n").unwrap();
        assert_eq!(config.recursion_limit, 7);
        assert_eq!(config.tags, vec!["demo".to_string(), "cli".to_string()]);
        assert_eq!(config.stream_buffer, RunConfig::default().stream_buffer);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("\n").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_flag_overrides_default() {
        let config = resolve(None, Some(3)).unwrap();
        assert_eq!(config.recursion_limit, 3);
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(parse("recursion_limit: lots").is_err());
    }
}
