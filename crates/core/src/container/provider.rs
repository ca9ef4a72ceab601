use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, Weak};

use crate::container::element::ErasedValue;
use crate::container::injector::{downcast_value, Injector, InjectorInner};
use crate::container::key::Key;
use crate::errors::CoreError;

/// Deferred handle resolving a key against an injector
///
/// A provider obtained from a [`Binder`](crate::container::Binder) is not
/// usable until the injector built from that binder's elements exists. The
/// handle holds the injector weakly; it never keeps an object graph alive.
#[derive(Clone)]
pub struct ErasedProvider {
    key: Key,
    target: Arc<OnceLock<Weak<InjectorInner>>>,
}

impl ErasedProvider {
    /// Provider waiting for an injector
    pub fn deferred(key: Key) -> Self {
        Self {
            key,
            target: Arc::new(OnceLock::new()),
        }
    }

    /// Provider bound to an existing injector
    pub fn bound(key: Key, injector: &Injector) -> Self {
        let provider = Self::deferred(key);
        provider.initialize(injector);
        provider
    }

    /// Attach the injector; later calls keep the first one
    pub(crate) fn initialize(&self, injector: &Injector) -> bool {
        self.target.set(injector.downgrade()).is_ok()
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn is_initialized(&self) -> bool {
        self.target.get().is_some()
    }

    pub fn get(&self) -> Result<ErasedValue, CoreError> {
        let weak = self.target.get().ok_or_else(|| CoreError::ProviderNotReady {
            key: self.key.to_string(),
        })?;
        let injector = Injector::upgrade(weak).ok_or(CoreError::InjectorDropped)?;
        injector.get_by_key(&self.key)
    }

    /// View this provider as producing `T`
    pub fn typed<T: Send + Sync + 'static>(self) -> Provider<T> {
        Provider {
            erased: self,
            _marker: PhantomData,
        }
    }
}

impl fmt::Debug for ErasedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedProvider")
            .field("key", &self.key)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Typed deferred handle
pub struct Provider<T> {
    erased: ErasedProvider,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    pub fn get(&self) -> Result<Arc<T>, CoreError> {
        let value = self.erased.get()?;
        downcast_value::<T>(self.erased.key(), value)
    }

    pub fn key(&self) -> &Key {
        self.erased.key()
    }

    pub fn is_initialized(&self) -> bool {
        self.erased.is_initialized()
    }

    pub fn erased(&self) -> &ErasedProvider {
        &self.erased
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            erased: self.erased.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Provider").field(&self.erased).finish()
    }
}
