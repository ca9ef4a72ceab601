use elif_inject::{
    Binder, BindingBuilder, CoreError, Injector, Key, Module, Provider, Source, Stage,
};

use crate::error::PrivateModuleError;
use crate::exposure::ExposedKeyBuilder;
use crate::phase::PhaseCell;

/// Binder handed to a private module's private bindings hook
///
/// Declarations go to the private injector. Only keys passed to
/// [`expose`](PrivateBinder::expose) or [`expose_key`](PrivateBinder::expose_key)
/// become visible to the enclosing injector.
pub struct PrivateBinder<'a> {
    binder: &'a mut Binder,
    phase: &'a PhaseCell,
}

impl<'a> PrivateBinder<'a> {
    pub(crate) fn new(binder: &'a mut Binder, phase: &'a PhaseCell) -> Self {
        Self { binder, phase }
    }

    /// Expose the unqualified binding of `T`
    #[track_caller]
    pub fn expose<T: ?Sized + 'static>(&mut self) -> Result<ExposedKeyBuilder, PrivateModuleError> {
        self.expose_key(Key::of::<T>())
    }

    /// Expose `key` to the enclosing injector
    #[track_caller]
    pub fn expose_key(&mut self, key: Key) -> Result<ExposedKeyBuilder, PrivateModuleError> {
        let source = self.binder.current_source();
        self.phase.request_exposure(key, source)
    }

    pub(crate) fn expose_from(
        &mut self,
        key: Key,
        source: Source,
    ) -> Result<ExposedKeyBuilder, PrivateModuleError> {
        self.phase.request_exposure(key, source)
    }

    #[track_caller]
    pub fn bind<T: Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        self.binder.bind::<T>()
    }

    #[track_caller]
    pub fn bind_constant<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.binder.bind_constant(name, value);
    }

    /// Install `module` privately
    #[track_caller]
    pub fn install(&mut self, module: &dyn Module) {
        self.binder.install(module);
    }

    #[track_caller]
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.binder.add_error(message);
    }

    #[track_caller]
    pub fn request_injection<F>(&mut self, callback: F)
    where
        F: Fn(&Injector) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.binder.request_injection(callback);
    }

    #[track_caller]
    pub fn require_binding(&mut self, key: Key) {
        self.binder.require_binding(key);
    }

    /// Provider from the private injector, usable once it exists
    #[track_caller]
    pub fn get_provider<T: Send + Sync + 'static>(&mut self, key: Key) -> Provider<T> {
        self.binder.get_provider(key)
    }

    pub fn current_stage(&self) -> Stage {
        self.binder.current_stage()
    }

    /// Record everything inside `f` as coming from `source`
    pub fn with_source<R>(
        &mut self,
        source: Source,
        f: impl FnOnce(&mut PrivateBinder<'_>) -> R,
    ) -> R {
        let phase = self.phase;
        self.binder
            .with_source(source, |binder| f(&mut PrivateBinder { binder, phase }))
    }

    /// Underlying recording binder
    pub fn binder(&mut self) -> &mut Binder {
        self.binder
    }
}
