/// Binding scope enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// New value for every request
    #[default]
    Unscoped,
    /// One value per injector, created on first request
    Singleton,
    /// One value per injector, created while the injector is being built
    EagerSingleton,
}

impl Scope {
    /// Check if the scope caches its value
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton | Scope::EagerSingleton)
    }

    pub fn is_eager(&self) -> bool {
        matches!(self, Scope::EagerSingleton)
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Unscoped => "unscoped",
            Scope::Singleton => "singleton",
            Scope::EagerSingleton => "eager_singleton",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = crate::errors::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unscoped" | "transient" => Ok(Scope::Unscoped),
            "singleton" => Ok(Scope::Singleton),
            "eager_singleton" | "eager" => Ok(Scope::EagerSingleton),
            _ => Err(crate::errors::CoreError::InvalidServiceScope {
                scope: s.to_string(),
            }),
        }
    }
}
