use std::fmt;
use std::sync::Arc;

use crate::config::{EnvConfig, InjectorConfig, Stage};
use crate::container::injector::{record_elements, Injector};
use crate::container::module::Module;
use crate::errors::CoreError;

/// Builder for an injector with fluent API
pub struct InjectorBuilder {
    config: InjectorConfig,
    modules: Vec<Arc<dyn Module>>,
    parent: Option<Injector>,
}

impl InjectorBuilder {
    /// Create a new injector builder
    pub fn new() -> Self {
        Self {
            config: InjectorConfig::default(),
            modules: Vec::new(),
            parent: None,
        }
    }

    pub fn with_config(mut self, config: InjectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.config.stage = stage;
        self
    }

    /// Add a module; modules are installed in the order added
    pub fn module<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn shared_module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Build a child of `parent` instead of a root injector
    pub fn child_of(mut self, parent: &Injector) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Build the injector
    pub fn build(self) -> Result<Injector, CoreError> {
        self.config.validate()?;
        let modules: Vec<&dyn Module> = self.modules.iter().map(|m| m.as_ref()).collect();
        let elements = record_elements(self.config.stage, &modules);
        Injector::from_elements(elements, self.parent.as_ref(), self.config)
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InjectorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules: Vec<&str> = self.modules.iter().map(|m| m.name()).collect();
        f.debug_struct("InjectorBuilder")
            .field("config", &self.config)
            .field("modules", &modules)
            .field("parent", &self.parent.as_ref().map(Injector::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::key::Key;
    use crate::container::module::module_fn;

    #[test]
    fn test_injector_builder() {
        let injector = Injector::builder()
            .module(module_fn(|binder| {
                binder.bind::<String>().to_instance("test_value".to_string());
                Ok(())
            }))
            .build()
            .unwrap();

        assert_eq!(*injector.get_instance::<String>().unwrap(), "test_value");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = InjectorConfig {
            max_resolution_depth: 0,
            ..InjectorConfig::default()
        };
        let result = InjectorBuilder::new().with_config(config).build();
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_module_failures_name_the_module() {
        let error = InjectorBuilder::new()
            .module(module_fn(|_| Err(CoreError::module("boom"))).named("DatabaseModule"))
            .build()
            .unwrap_err();

        assert_eq!(error.messages().len(), 1);
        let message = &error.messages()[0];
        assert!(message.text().contains("DatabaseModule"));
        assert_eq!(message.source().to_string(), "module DatabaseModule");
    }

    #[test]
    fn test_builder_child_of() {
        let parent = Injector::builder()
            .module(module_fn(|binder| {
                binder.bind::<u16>().to_instance(8080);
                Ok(())
            }))
            .build()
            .unwrap();

        let child = InjectorBuilder::new()
            .stage(Stage::Tool)
            .child_of(&parent)
            .build()
            .unwrap();

        assert_eq!(child.stage(), Stage::Tool);
        assert!(child.can_resolve(&Key::of::<u16>()));
        assert!(!child.has_binding(&Key::of::<u16>()));
    }
}
