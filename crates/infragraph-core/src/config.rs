//! `infragraph.toml` configuration

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reduce::{ReduceError, ReduceRule};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "infragraph.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scope: ScopeConfig,
    pub reducer: ReducerConfig,
}

/// Accounts and regions to include. Empty lists mean "everything".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
}

impl ScopeConfig {
    pub fn includes(&self, account: &str, region: &str) -> bool {
        (self.accounts.is_empty() || self.accounts.iter().any(|a| a == account))
            && (self.regions.is_empty() || self.regions.iter().any(|r| r == region))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReducerConfig {
    pub rules: Vec<RuleConfig>,
}

impl ReducerConfig {
    /// Compile every configured rule.
    pub fn rules(&self) -> Result<Vec<ReduceRule>, ReduceError> {
        self.rules.iter().map(RuleConfig::build).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub id: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl RuleConfig {
    pub fn build(&self) -> Result<ReduceRule, ReduceError> {
        match (&self.glob, &self.regex) {
            (Some(glob), None) => ReduceRule::glob(&self.id, &self.service, glob),
            (None, Some(regex)) => ReduceRule::regex(&self.id, &self.service, regex),
            _ => Err(ReduceError::Pattern {
                rule: self.id.clone(),
            }),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid infragraph configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(
            "Loaded config {} ({} reducer rules)",
            path.display(),
            config.reducer.rules.len()
        );
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_scope_and_rules() {
        let config = Config::from_toml_str(
            r#"
[scope]
accounts = ["111111111111"]

[[reducer.rules]]
id = "lambdas"
service = "lambda"
glob = "function-*"

[[reducer.rules]]
id = "buckets"
service = "s3"
regex = "^serverless-"
"#,
        )
        .unwrap();

        assert_eq!(config.scope.accounts, vec!["111111111111"]);
        assert!(config.scope.regions.is_empty());
        assert_eq!(config.reducer.rules.len(), 2);

        let rules = config.reducer.rules().unwrap();
        assert!(rules[0].pattern.is_match("function-3"));
        assert!(!rules[0].pattern.is_match("serverless-3"));
        assert!(rules[1].pattern.is_match("serverless-0"));
    }

    #[test]
    fn rule_needs_exactly_one_pattern() {
        let both = RuleConfig {
            id: "r".to_string(),
            service: "s3".to_string(),
            glob: Some("*".to_string()),
            regex: Some(".*".to_string()),
        };
        assert!(matches!(both.build(), Err(ReduceError::Pattern { .. })));

        let neither = RuleConfig {
            glob: None,
            regex: None,
            ..both
        };
        assert!(matches!(neither.build(), Err(ReduceError::Pattern { .. })));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let rule = RuleConfig {
            id: "broken".to_string(),
            service: "s3".to_string(),
            glob: None,
            regex: Some("(".to_string()),
        };
        let err = rule.build().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("[scope]\nzones = []\n").is_err());
    }

    #[test]
    fn scope_filters() {
        let scope = ScopeConfig {
            accounts: vec!["a".to_string()],
            regions: vec![],
        };
        assert!(scope.includes("a", "eu-west-1"));
        assert!(!scope.includes("b", "eu-west-1"));
        assert!(ScopeConfig::default().includes("anything", "anywhere"));
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[scope]\nregions = [\"us-east-1\"]\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scope.regions, vec!["us-east-1"]);
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
