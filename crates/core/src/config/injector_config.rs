use crate::config::{ConfigError, ConfigSource};
use crate::container::scope::Scope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Configuration trait for environment-driven settings
pub trait EnvConfig: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Stage an injector is created in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Lazy singletons, fast startup
    #[default]
    Development,
    /// Every singleton is created up front
    Production,
    /// Bindings are recorded and validated, nothing is instantiated
    Tool,
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Stage::Development),
            "production" | "prod" => Ok(Stage::Production),
            "tool" => Ok(Stage::Tool),
            _ => Err(ConfigError::invalid_value(
                "stage",
                s,
                "development, production, or tool",
            )),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::Development => "development",
            Stage::Production => "production",
            Stage::Tool => "tool",
        };
        write!(f, "{}", stage)
    }
}

impl Stage {
    pub fn is_development(&self) -> bool {
        matches!(self, Stage::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Stage::Production)
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Stage::Tool)
    }
}

/// Injector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    pub stage: Stage,
    /// Create lazy singletons up front in the production stage
    pub production_eager_singletons: bool,
    /// Log every binding at debug level while an injector is created
    pub log_bindings: bool,
    /// Nested resolutions allowed before giving up
    pub max_resolution_depth: usize,
    /// Where each setting was loaded from, keyed by field name
    #[serde(skip)]
    pub sources: HashMap<String, ConfigSource>,
}

impl InjectorConfig {
    pub const STAGE_VAR: &'static str = "ELIF_INJECT_STAGE";
    pub const PRODUCTION_EAGER_VAR: &'static str = "ELIF_INJECT_PRODUCTION_EAGER";
    pub const LOG_BINDINGS_VAR: &'static str = "ELIF_INJECT_LOG_BINDINGS";
    pub const MAX_DEPTH_VAR: &'static str = "ELIF_INJECT_MAX_RESOLUTION_DEPTH";

    const DEFAULT_MAX_DEPTH: usize = 256;
    const MAX_DEPTH_LIMIT: usize = 10_000;
    const FIELDS: [&'static str; 4] = [
        "stage",
        "production_eager_singletons",
        "log_bindings",
        "max_resolution_depth",
    ];

    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            stage: Stage::Development,
            production_eager_singletons: true,
            log_bindings: false,
            max_resolution_depth: Self::DEFAULT_MAX_DEPTH,
            sources: HashMap::new(),
        }
    }

    pub fn development() -> Self {
        Self::new()
    }

    pub fn production() -> Self {
        Self {
            stage: Stage::Production,
            ..Self::new()
        }
    }

    pub fn tool() -> Self {
        Self {
            stage: Stage::Tool,
            ..Self::new()
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Load and validate configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_yaml(yaml, None)
    }

    /// Load and validate configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loading injector configuration");
        Self::from_yaml(&yaml, Some(path))
    }

    fn from_yaml(yaml: &str, path: Option<&Path>) -> Result<Self, ConfigError> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let mut config: Self = serde_yaml::from_value(document.clone())?;

        if let Some(mapping) = document.as_mapping() {
            for field in Self::FIELDS {
                if mapping.contains_key(field) {
                    let source = ConfigSource::Yaml(path.map(Path::to_path_buf));
                    config.sources.insert(field.to_string(), source);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn field_value(&self, field: &str) -> String {
        match field {
            "stage" => self.stage.to_string(),
            "production_eager_singletons" => self.production_eager_singletons.to_string(),
            "log_bindings" => self.log_bindings.to_string(),
            _ => self.max_resolution_depth.to_string(),
        }
    }

    /// Whether a binding in `scope` is instantiated while the injector is built
    pub fn is_eager(&self, scope: Scope) -> bool {
        match scope {
            Scope::EagerSingleton => true,
            Scope::Singleton => self.stage.is_production() && self.production_eager_singletons,
            Scope::Unscoped => false,
        }
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_source(var: &'static str, value: &str) -> ConfigSource {
    ConfigSource::EnvVar {
        var,
        value: value.to_string(),
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}

impl EnvConfig for InjectorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(stage) = env::var(Self::STAGE_VAR) {
            config.stage = stage.parse()?;
            config.sources.insert("stage".to_string(), env_source(Self::STAGE_VAR, &stage));
        }

        if let Ok(eager) = env::var(Self::PRODUCTION_EAGER_VAR) {
            config.production_eager_singletons = parse_bool("production_eager_singletons", &eager)?;
            config.sources.insert(
                "production_eager_singletons".to_string(),
                env_source(Self::PRODUCTION_EAGER_VAR, &eager),
            );
        }

        if let Ok(log_bindings) = env::var(Self::LOG_BINDINGS_VAR) {
            config.log_bindings = parse_bool("log_bindings", &log_bindings)?;
            config.sources.insert(
                "log_bindings".to_string(),
                env_source(Self::LOG_BINDINGS_VAR, &log_bindings),
            );
        }

        if let Ok(depth) = env::var(Self::MAX_DEPTH_VAR) {
            config.max_resolution_depth = depth.parse().map_err(|_| {
                ConfigError::invalid_value(
                    "max_resolution_depth",
                    depth.as_str(),
                    "a positive integer",
                )
            })?;
            config.sources.insert(
                "max_resolution_depth".to_string(),
                env_source(Self::MAX_DEPTH_VAR, &depth),
            );
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 || self.max_resolution_depth > Self::MAX_DEPTH_LIMIT {
            return Err(ConfigError::invalid_value(
                "max_resolution_depth",
                self.max_resolution_depth.to_string(),
                format!("between 1 and {}", Self::MAX_DEPTH_LIMIT),
            ));
        }
        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let defaults = Self::new();
        Self::FIELDS
            .iter()
            .map(|field| {
                let source = self.sources.get(*field).cloned().unwrap_or_else(|| {
                    let value = self.field_value(field);
                    if value == defaults.field_value(field) {
                        ConfigSource::Default(value)
                    } else {
                        ConfigSource::Programmatic(value)
                    }
                });
                (field.to_string(), source)
            })
            .collect()
    }
}
