use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use elif_inject::{
    Binding, BindingTarget, CoreError, ErasedProvider, ErasedValue, Injector, Key, Qualifier,
    Source,
};

use crate::error::PrivateModuleError;

enum ExposureKey {
    Pending(Key),
    Final(Key),
}

impl ExposureKey {
    fn key(&self) -> &Key {
        match self {
            ExposureKey::Pending(key) | ExposureKey::Final(key) => key,
        }
    }
}

/// One request to forward a private key to the enclosing injector
pub(crate) struct Exposure {
    source: Source,
    ready_key: Key,
    key: Mutex<ExposureKey>,
    private_provider: OnceLock<ErasedProvider>,
}

impl Exposure {
    pub(crate) fn new(key: Key, source: Source, ready_key: Key) -> Self {
        Self {
            source,
            ready_key,
            key: Mutex::new(ExposureKey::Pending(key)),
            private_provider: OnceLock::new(),
        }
    }

    fn lock_key(&self) -> MutexGuard<'_, ExposureKey> {
        self.key.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn source(&self) -> &Source {
        &self.source
    }

    pub(crate) fn key(&self) -> Key {
        self.lock_key().key().clone()
    }

    pub(crate) fn is_final(&self) -> bool {
        matches!(*self.lock_key(), ExposureKey::Final(_))
    }

    /// Attach the one qualifier an exposure may carry
    fn qualify(&self, qualifier: Qualifier) -> Result<(), PrivateModuleError> {
        let mut key = self.lock_key();
        match &*key {
            ExposureKey::Final(current) => Err(PrivateModuleError::ExposureFinalized {
                key: current.to_string(),
            }),
            ExposureKey::Pending(current) if current.has_qualifier() => {
                Err(PrivateModuleError::AlreadyAnnotated {
                    key: current.to_string(),
                })
            }
            ExposureKey::Pending(current) => {
                let qualified = current.with_qualifier(qualifier);
                *key = ExposureKey::Pending(qualified);
                Ok(())
            }
        }
    }

    /// Freeze the key; later qualifier attachments fail
    pub(crate) fn finalize(&self) -> Key {
        let mut key = self.lock_key();
        let finished = key.key().clone();
        *key = ExposureKey::Final(finished.clone());
        finished
    }

    /// Attach the private-side provider; `false` if one is already attached
    #[must_use]
    pub(crate) fn bind_private_provider(&self, provider: ErasedProvider) -> bool {
        self.private_provider.set(provider).is_ok()
    }

    /// Value for the public side: force the gate, then ask the private injector
    pub(crate) fn provide(&self, public: &Injector) -> Result<ErasedValue, CoreError> {
        public.get_by_key(&self.ready_key)?;
        let provider = self
            .private_provider
            .get()
            .ok_or_else(|| CoreError::ProviderNotReady {
                key: self.key().to_string(),
            })?;
        provider.get()
    }

    /// Forwarding binding installed in the public binder
    pub(crate) fn forwarding_binding(self: &Arc<Self>) -> Binding {
        let exposure = Arc::clone(self);
        let provider = move |public: &Injector| exposure.provide(public);
        Binding::new(
            self.key(),
            self.source.clone(),
            BindingTarget::Provider(Arc::new(provider)),
        )
    }
}

impl fmt::Debug for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exposure")
            .field("key", &self.key())
            .field("source", &self.source)
            .field("final", &self.is_final())
            .finish()
    }
}

/// Handle returned by `expose`, used to qualify the exposed key once
#[derive(Debug, Clone)]
pub struct ExposedKeyBuilder {
    exposure: Arc<Exposure>,
}

impl ExposedKeyBuilder {
    pub(crate) fn new(exposure: Arc<Exposure>) -> Self {
        Self { exposure }
    }

    /// Qualify the exposed key with a marker type
    pub fn annotated_with<M: ?Sized + 'static>(&self) -> Result<(), PrivateModuleError> {
        self.exposure.qualify(Qualifier::marker::<M>())
    }

    pub fn named(&self, name: impl Into<String>) -> Result<(), PrivateModuleError> {
        self.exposure.qualify(Qualifier::named(name))
    }

    pub fn qualified_with(&self, qualifier: Qualifier) -> Result<(), PrivateModuleError> {
        self.exposure.qualify(qualifier)
    }

    /// Key as currently declared
    pub fn key(&self) -> Key {
        self.exposure.key()
    }

    pub fn source(&self) -> &Source {
        self.exposure.source()
    }
}
