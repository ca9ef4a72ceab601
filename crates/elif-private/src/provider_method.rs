use std::fmt;
use std::sync::Arc;

use elif_inject::container::ProviderFn;
use elif_inject::{
    Binding, BindingTarget, CoreError, ErasedValue, Injector, Key, Qualifier, Scope, Source,
};

/// A discovered provider: key, factory, scope and whether it is exposed
///
/// Returned by [`PrivateModuleConfig::provider_methods`](crate::PrivateModuleConfig::provider_methods);
/// each is bound in the private injector, and exposed ones are forwarded as
/// if `expose` had been called for their key.
#[derive(Clone)]
pub struct ProviderMethod {
    key: Key,
    source: Source,
    scope: Scope,
    exposed: bool,
    provider: ProviderFn,
}

impl ProviderMethod {
    #[track_caller]
    pub fn new<T, F>(provider: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector) -> Result<T, CoreError> + Send + Sync + 'static,
    {
        let provider = move |injector: &Injector| -> Result<ErasedValue, CoreError> {
            Ok(Arc::new(provider(injector)?))
        };
        Self {
            key: Key::of::<T>(),
            source: Source::caller(),
            scope: Scope::Unscoped,
            exposed: false,
            provider: Arc::new(provider),
        }
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualified_with(Qualifier::named(name))
    }

    pub fn annotated_with<M: ?Sized + 'static>(self) -> Self {
        self.qualified_with(Qualifier::marker::<M>())
    }

    /// Replace the key's qualifier
    pub fn qualified_with(mut self, qualifier: Qualifier) -> Self {
        self.key = self.key.with_qualifier(qualifier);
        self
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn singleton(self) -> Self {
        self.in_scope(Scope::Singleton)
    }

    /// Forward this provider's key to the enclosing injector
    pub fn exposed(mut self) -> Self {
        self.exposed = true;
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_exposed(&self) -> bool {
        self.exposed
    }

    pub(crate) fn binding(&self) -> Binding {
        Binding::new(
            self.key.clone(),
            self.source.clone(),
            BindingTarget::Provider(self.provider.clone()),
        )
        .with_scope(self.scope)
    }
}

impl fmt::Debug for ProviderMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMethod")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("scope", &self.scope)
            .field("exposed", &self.exposed)
            .finish()
    }
}
