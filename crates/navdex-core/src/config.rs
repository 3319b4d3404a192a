//! Indexer configuration.
//!
//! Values are resolved with a fixed precedence, lowest first:
//!
//! 1. Built-in defaults
//! 2. Project config file (`navdex.json` in the source root, or `--config`)
//! 3. Environment (`NAVDEX_BATCH_SIZE`, `NAVDEX_LANGUAGE`)
//! 4. CLI flags
//!
//! Every resolved value remembers where it came from so `navdex index` can
//! report the effective configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::store::DEFAULT_BATCH_SIZE;

/// Name of the project config file looked up in the source root.
pub const PROJECT_CONFIG_FILE: &str = "navdex.json";

/// Source-language tag stamped on entity rows by default.
pub const DEFAULT_LANGUAGE: &str = "rust";

pub const ENV_BATCH_SIZE: &str = "NAVDEX_BATCH_SIZE";
pub const ENV_LANGUAGE: &str = "NAVDEX_LANGUAGE";

// ============================================================================
// Config Values
// ============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default = 0,
    ProjectConfig = 1,
    EnvVar = 2,
    /// Highest precedence.
    CliFlag = 3,
}

/// A value together with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

/// URLs configured for one foreign crate location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternLocationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
}

/// Shape of `navdex.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub batch_size: Option<usize>,
    pub language: Option<String>,
    pub exclude: Vec<String>,
    pub extern_locations: BTreeMap<String, ExternLocationConfig>,
}

impl ProjectConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            IndexError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            IndexError::invalid_config(format!("cannot parse {}: {}", path.display(), e))
        })
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--config`: explicit config file, replacing the source-root lookup.
    pub config_path: Option<PathBuf>,
    /// `--batch-size`.
    pub batch_size: Option<usize>,
    /// `--language`.
    pub language: Option<String>,
    /// `--exclude`, appended to the config file's patterns.
    pub exclude: Vec<String>,
}

// ============================================================================
// Resolved Config
// ============================================================================

/// Effective configuration for one run.
#[derive(Debug, Clone, Serialize)]
pub struct IndexConfig {
    pub batch_size: ConfigValue<usize>,
    pub language: ConfigValue<String>,
    pub exclude: Vec<ConfigValue<String>>,
    pub extern_locations: BTreeMap<String, ExternLocationConfig>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            batch_size: ConfigValue::new(DEFAULT_BATCH_SIZE, ConfigSource::Default),
            language: ConfigValue::new(DEFAULT_LANGUAGE.to_string(), ConfigSource::Default),
            exclude: Vec::new(),
            extern_locations: BTreeMap::new(),
        }
    }
}

impl IndexConfig {
    /// Resolve against the process environment.
    pub fn resolve(source_root: Option<&Path>, cli: &CliOverrides) -> IndexResult<Self> {
        IndexConfig::resolve_with_env(source_root, cli, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with_env(
        source_root: Option<&Path>,
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> IndexResult<Self> {
        let mut config = IndexConfig::default();

        let project_path = match (&cli.config_path, source_root) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(root)) => {
                let candidate = root.join(PROJECT_CONFIG_FILE);
                candidate.exists().then_some(candidate)
            }
            (None, None) => None,
        };
        if let Some(path) = project_path {
            config.apply_project(ProjectConfig::load(&path)?);
        }

        config.apply_env(env)?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply_project(&mut self, project: ProjectConfig) {
        let source = ConfigSource::ProjectConfig;
        if let Some(batch_size) = project.batch_size {
            self.batch_size = self.batch_size.clone().merge(ConfigValue::new(batch_size, source));
        }
        if let Some(language) = project.language {
            self.language = self.language.clone().merge(ConfigValue::new(language, source));
        }
        self.exclude.extend(
            project
                .exclude
                .into_iter()
                .map(|p| ConfigValue::new(p, source)),
        );
        self.extern_locations.extend(project.extern_locations);
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> IndexResult<()> {
        if let Some(raw) = env(ENV_BATCH_SIZE) {
            let batch_size = raw.trim().parse::<usize>().map_err(|_| {
                IndexError::invalid_config(format!("{} is not a number: '{}'", ENV_BATCH_SIZE, raw))
            })?;
            self.batch_size = self
                .batch_size
                .clone()
                .merge(ConfigValue::new(batch_size, ConfigSource::EnvVar));
        }
        if let Some(language) = env(ENV_LANGUAGE).filter(|l| !l.is_empty()) {
            self.language = self
                .language
                .clone()
                .merge(ConfigValue::new(language, ConfigSource::EnvVar));
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(batch_size) = cli.batch_size {
            self.batch_size = ConfigValue::new(batch_size, ConfigSource::CliFlag);
        }
        if let Some(ref language) = cli.language {
            self.language = ConfigValue::new(language.clone(), ConfigSource::CliFlag);
        }
        self.exclude.extend(
            cli.exclude
                .iter()
                .map(|p| ConfigValue::new(p.clone(), ConfigSource::CliFlag)),
        );
    }

    fn validate(&self) -> IndexResult<()> {
        if self.batch_size.value == 0 {
            return Err(IndexError::invalid_config("batch_size must be positive"));
        }
        if self.language.value.trim().is_empty() {
            return Err(IndexError::invalid_config("language must not be empty"));
        }
        Ok(())
    }

    /// Exclude patterns, in precedence order.
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.exclude.iter().map(|p| p.value.clone()).collect()
    }

    /// Builder-style batch size override, mainly for tests.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = ConfigValue::new(batch_size, ConfigSource::CliFlag);
        self
    }

    /// Builder-style extern location, mainly for tests.
    pub fn with_extern_location(
        mut self,
        location: impl Into<String>,
        urls: ExternLocationConfig,
    ) -> Self {
        self.extern_locations.insert(location.into(), urls);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
