use std::sync::Arc;

use crate::container::binder::Binder;
use crate::errors::CoreError;

/// A unit of binding configuration
///
/// `configure` records declarations against the binder it is given. It may be
/// invoked more than once over the lifetime of a module, once per injector
/// that installs it.
pub trait Module: Send + Sync {
    /// Record this module's declarations
    fn configure(&self, binder: &mut Binder) -> Result<(), CoreError>;

    /// Module name used in diagnostics (defaults to type name)
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<M: Module + ?Sized> Module for Arc<M> {
    fn configure(&self, binder: &mut Binder) -> Result<(), CoreError> {
        (**self).configure(binder)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<M: Module + ?Sized> Module for Box<M> {
    fn configure(&self, binder: &mut Binder) -> Result<(), CoreError> {
        (**self).configure(binder)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Module backed by a closure, see [`module_fn`]
pub struct FnModule<F> {
    name: String,
    configure: F,
}

impl<F> FnModule<F> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Module for FnModule<F>
where
    F: Fn(&mut Binder) -> Result<(), CoreError> + Send + Sync,
{
    fn configure(&self, binder: &mut Binder) -> Result<(), CoreError> {
        (self.configure)(binder)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a module from a closure
pub fn module_fn<F>(configure: F) -> FnModule<F>
where
    F: Fn(&mut Binder) -> Result<(), CoreError> + Send + Sync,
{
    FnModule {
        name: "closure module".to_string(),
        configure,
    }
}
