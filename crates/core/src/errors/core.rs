use thiserror::Error;

use crate::config::ConfigError;
use crate::container::source::{render_messages, Message};

/// Core error type for the elif injector
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Service not found: {service_type}")]
    ServiceNotFound { service_type: String },

    #[error("Invalid service scope: {scope}")]
    InvalidServiceScope { scope: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Circular dependency detected: {path} (cycle at: {cycle_service})")]
    CircularDependency { path: String, cycle_service: String },

    #[error("Resolution of {key} exceeded the maximum depth of {depth}")]
    ResolutionDepthExceeded { key: String, depth: usize },

    #[error("Value bound to {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Provider for {key} is not usable until the injector is created")]
    ProviderNotReady { key: String },

    #[error("The injector backing this provider has been dropped")]
    InjectorDropped,

    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Module error: {message}")]
    Module {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to create injector, see the following errors:\n\n{}", render_messages(.messages))]
    Creation { messages: Vec<Message> },
}

impl CoreError {
    /// Create a new service not found error
    pub fn service_not_found(service_type: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service_type: service_type.into(),
        }
    }

    /// Create a new provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a new module error
    pub fn module(message: impl Into<String>) -> Self {
        Self::Module {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new module error with source
    pub fn module_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Module {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an injector creation error from accumulated messages
    pub fn creation(messages: Vec<Message>) -> Self {
        Self::Creation { messages }
    }

    /// Accumulated messages of a creation error
    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Creation { messages } => messages,
            _ => &[],
        }
    }

    /// Check if the error is an injector creation error
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }

    /// Check if the error is a missing binding
    pub fn is_service_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// Check if the error is a dependency cycle
    pub fn is_circular_dependency(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}
