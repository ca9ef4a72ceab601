use std::fmt;
use std::path::PathBuf;

/// Where an injector setting came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `ELIF_INJECT_*` variable and the raw value it held
    EnvVar { var: &'static str, value: String },
    /// Built-in default
    Default(String),
    /// Set in code after construction
    Programmatic(String),
    /// YAML document, with its path when read from disk
    Yaml(Option<PathBuf>),
}

impl ConfigSource {
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar { .. })
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::EnvVar { var, value } => write!(f, "{}={}", var, value),
            ConfigSource::Default(value) => write!(f, "default ({})", value),
            ConfigSource::Programmatic(value) => write!(f, "set in code ({})", value),
            ConfigSource::Yaml(Some(path)) => write!(f, "YAML file {}", path.display()),
            ConfigSource::Yaml(None) => write!(f, "YAML document"),
        }
    }
}
