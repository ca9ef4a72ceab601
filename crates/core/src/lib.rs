//! Recording binder and injector for elif.rs
//!
//! Modules record declarations against a [`Binder`]; an [`Injector`] turns the
//! recording into a live object graph, accumulating every configuration error
//! before reporting them together.

pub mod config;
pub mod container;
pub mod errors;

pub use config::{ConfigError, ConfigSource, EnvConfig, InjectorConfig, Stage};
pub use container::{
    module_fn, Binder, Binding, BindingBuilder, BindingTarget, Element, ErasedProvider,
    ErasedValue, Injector, InjectorBuilder, Key, Message, Module, Provider, Qualifier, Scope,
    Source,
};
pub use errors::CoreError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework information
pub const FRAMEWORK_NAME: &str = "elif.rs";

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}

/// Get framework name
pub fn name() -> &'static str {
    FRAMEWORK_NAME
}
