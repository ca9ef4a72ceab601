//! Recorded declarations
//!
//! A [`Binder`](crate::container::Binder) never builds anything. It records an
//! ordered list of [`Element`]s which an [`Injector`] later turns into a live
//! object graph. Elements are cheap to clone, so the same recording can be
//! inspected, filtered and replayed into another injector.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::container::injector::Injector;
use crate::container::key::Key;
use crate::container::provider::ErasedProvider;
use crate::container::scope::Scope;
use crate::container::source::{Message, Source};
use crate::errors::CoreError;

/// A provisioned value with its concrete type erased
pub type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Factory producing a value from the injector that owns the binding
pub type ProviderFn = Arc<dyn Fn(&Injector) -> Result<ErasedValue, CoreError> + Send + Sync>;

/// Side effect run once against a finished injector
pub type InjectionFn = Arc<dyn Fn(&Injector) -> Result<(), CoreError> + Send + Sync>;

/// How a binding produces its value
#[derive(Clone)]
pub enum BindingTarget {
    /// Pre-built value shared by every request
    Instance(ErasedValue),
    /// Factory function
    Provider(ProviderFn),
    /// Delegate to another key
    LinkedKey(Key),
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Instance(_) => write!(f, "Instance(<value>)"),
            BindingTarget::Provider(_) => write!(f, "Provider(<provider_fn>)"),
            BindingTarget::LinkedKey(key) => write!(f, "LinkedKey({})", key),
        }
    }
}

/// A key bound to a target within a scope
#[derive(Debug, Clone)]
pub struct Binding {
    pub key: Key,
    pub source: Source,
    pub scope: Scope,
    pub target: BindingTarget,
}

impl Binding {
    pub fn new(key: Key, source: Source, target: BindingTarget) -> Self {
        Self {
            key,
            source,
            scope: Scope::Unscoped,
            target,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Binding backed by a provider closure
    pub fn to_provider<F>(key: Key, source: Source, provider: F) -> Self
    where
        F: Fn(&Injector) -> Result<ErasedValue, CoreError> + Send + Sync + 'static,
    {
        Self::new(key, source, BindingTarget::Provider(Arc::new(provider)))
    }
}

/// Request for a provider that becomes usable once the injector exists
#[derive(Debug, Clone)]
pub struct ProviderLookup {
    pub source: Source,
    pub provider: ErasedProvider,
}

impl ProviderLookup {
    pub fn key(&self) -> &Key {
        self.provider.key()
    }
}

/// Callback run against the finished injector
#[derive(Clone)]
pub struct InjectionRequest {
    pub source: Source,
    pub callback: InjectionFn,
}

impl fmt::Debug for InjectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionRequest")
            .field("source", &self.source)
            .finish()
    }
}

/// One recorded declaration
#[derive(Debug, Clone)]
pub enum Element {
    Binding(Binding),
    ProviderLookup(ProviderLookup),
    InjectionRequest(InjectionRequest),
    Message(Message),
}

impl Element {
    pub fn source(&self) -> &Source {
        match self {
            Element::Binding(binding) => &binding.source,
            Element::ProviderLookup(lookup) => &lookup.source,
            Element::InjectionRequest(request) => &request.source,
            Element::Message(message) => message.source(),
        }
    }

    pub fn as_binding(&self) -> Option<&Binding> {
        match self {
            Element::Binding(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Element::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Element::Message(_))
    }
}

/// Keys of every binding among `elements`, in encounter order
pub fn bound_keys<'a, I>(elements: I) -> Vec<&'a Key>
where
    I: IntoIterator<Item = &'a Element>,
{
    elements
        .into_iter()
        .filter_map(Element::as_binding)
        .map(|binding| &binding.key)
        .collect()
}
