use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use elif_inject::container::bound_keys;
use elif_inject::{Binder, CoreError, Element, Injector, Key, Message, Module, Source};

use crate::binder::PrivateBinder;
use crate::capture::capture_declarations;
use crate::error::PrivateModuleError;
use crate::exposure::ExposedKeyBuilder;
use crate::gate::Gate;
use crate::phase::{Entry, PassPhase, PassState, PhaseCell};
use crate::provider_method::ProviderMethod;

/// Configuration of a private module
///
/// Bindings declared in [`configure_private_bindings`](Self::configure_private_bindings)
/// live in a child injector of the one that installs the module. They can
/// see the enclosing injector's bindings, but only exposed keys can be seen
/// from outside.
pub trait PrivateModuleConfig: Send + Sync {
    /// Declare private bindings and choose which ones to expose
    fn configure_private_bindings(&self, binder: &mut PrivateBinder<'_>) -> Result<(), CoreError>;

    /// Providers contributed in addition to the hook's declarations
    fn provider_methods(&self) -> Vec<ProviderMethod> {
        Vec::new()
    }

    /// Name used in diagnostics (defaults to type name)
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A module whose bindings are hidden unless exposed
///
/// Installing it in an injector runs two passes over the same instance. The
/// public pass re-enters `configure` against a recording binder to capture
/// the private declarations, then forwards each exposed key to the private
/// injector and registers an eager gate that builds that injector while the
/// enclosing one is created.
///
/// ```
/// use elif_inject::{CoreError, Injector};
/// use elif_private::{PrivateBinder, PrivateModule, PrivateModuleConfig};
///
/// struct Pricing;
///
/// impl PrivateModuleConfig for Pricing {
///     fn configure_private_bindings(
///         &self,
///         binder: &mut PrivateBinder<'_>,
///     ) -> Result<(), CoreError> {
///         binder.bind::<u8>().to_instance(20);
///         binder.bind::<u32>().to_provider(|injector| {
///             let tax_percent = *injector.get_instance::<u8>()? as u32;
///             Ok(100 * (100 + tax_percent) / 100)
///         });
///         binder.expose::<u32>()?;
///         Ok(())
///     }
/// }
///
/// let injector = Injector::create(&[&PrivateModule::new(Pricing)]).unwrap();
/// assert_eq!(*injector.get_instance::<u32>().unwrap(), 120);
/// assert!(injector.get_instance::<u8>().is_err());
/// ```
pub struct PrivateModule<M> {
    inner: M,
    phase: PhaseCell,
    last_gate: Mutex<Weak<Gate>>,
}

impl<M: PrivateModuleConfig> PrivateModule<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            phase: PhaseCell::new(),
            last_gate: Mutex::new(Weak::new()),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Current configuration phase of this instance
    pub fn phase(&self) -> PassPhase {
        self.phase.current()
    }

    /// Private injector built by the most recent installation, if it is alive
    pub fn private_injector(&self) -> Option<Injector> {
        let gate = self
            .last_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()?;
        gate.private_injector()
    }

    /// Expose `key`; only valid while private bindings are configured
    #[track_caller]
    pub fn expose_key(&self, key: Key) -> Result<ExposedKeyBuilder, PrivateModuleError> {
        self.phase.request_exposure(key, Source::caller())
    }

    #[track_caller]
    pub fn expose<T: ?Sized + 'static>(&self) -> Result<ExposedKeyBuilder, PrivateModuleError> {
        self.expose_key(Key::of::<T>())
    }

    fn configure_public(&self, binder: &mut Binder) -> Result<(), CoreError> {
        let name = self.inner.name();
        let elements = capture_declarations(self, binder.current_stage());
        let (messages, declarations): (Vec<Element>, Vec<Element>) =
            elements.into_iter().partition(Element::is_message);
        let violation_recorded = messages.iter().any(reports_reentrancy);
        for message in messages {
            binder.add_element(message);
        }

        let PassState {
            exposures, gate, ..
        } = match self.phase.finish_capture(name) {
            Ok(state) => state,
            Err(_) if violation_recorded => return Ok(()),
            Err(error) => return Err(error.into()),
        };

        let bound: HashSet<&Key> = bound_keys(&declarations).into_iter().collect();
        let mut exposed: HashMap<Key, Source> = HashMap::new();

        for exposure in &exposures {
            let key = exposure.key();
            let source = exposure.source().clone();

            if !bound.contains(&key) {
                tracing::warn!(module = name, key = %key, "Exposed key is not bound");
                let text = format!(
                    "Could not expose() at {}\n {} must be explicitly bound.",
                    source, key
                );
                binder.add_message(Message::new(source, text));
                continue;
            }

            if let Some(first) = exposed.get(&key) {
                let text = format!("{} is already exposed at {}.", key, first);
                binder.add_message(Message::new(source, text));
                continue;
            }

            tracing::debug!(module = name, key = %key, "Forwarding exposed key");
            binder.add_binding(exposure.forwarding_binding());
            exposed.insert(key, source);
        }

        tracing::info!(
            module = name,
            declarations = declarations.len(),
            exposed = exposed.len(),
            "Private module configured"
        );

        gate.arm(declarations);
        *self.last_gate.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(&gate);
        binder.add_binding(gate.binding(Source::described(format!("private module {}", name))));
        Ok(())
    }

    fn configure_private(&self, binder: &mut Binder) -> Result<(), CoreError> {
        let mut private = PrivateBinder::new(binder, &self.phase);
        let result = self.run_private_hooks(&mut private);
        self.bind_exposures(private.binder());
        result
    }

    fn run_private_hooks(&self, private: &mut PrivateBinder<'_>) -> Result<(), CoreError> {
        self.inner.configure_private_bindings(private)?;

        for method in self.inner.provider_methods() {
            private.binder().add_binding(method.binding());
            if method.is_exposed() {
                private.expose_from(method.key().clone(), method.source().clone())?;
            }
        }
        Ok(())
    }

    /// Freeze each exposure's key and look it up in the private injector
    fn bind_exposures(&self, binder: &mut Binder) {
        for exposure in self.phase.exposures() {
            let key = exposure.finalize();
            let provider = binder.with_source(exposure.source().clone(), |b| {
                b.get_erased_provider(key)
            });
            if !exposure.bind_private_provider(provider) {
                tracing::warn!(key = %exposure.key(), "Exposure already has a private provider");
            }
        }
    }
}

/// Whether a captured message was caused by a re-entry violation
fn reports_reentrancy(element: &Element) -> bool {
    let mut cause = element
        .as_message()
        .and_then(Message::cause)
        .map(|cause| cause as &(dyn StdError + 'static));
    while let Some(error) = cause {
        if error
            .downcast_ref::<PrivateModuleError>()
            .is_some_and(PrivateModuleError::is_reentrancy)
        {
            return true;
        }
        cause = error.source();
    }
    false
}

impl<M: PrivateModuleConfig> Module for PrivateModule<M> {
    fn configure(&self, binder: &mut Binder) -> Result<(), CoreError> {
        match self.phase.enter(self.inner.name())? {
            Entry::Public(_pass) => self.configure_public(binder),
            Entry::Private(_active) => self.configure_private(binder),
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<M: fmt::Debug> fmt::Debug for PrivateModule<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateModule")
            .field("inner", &self.inner)
            .field("phase", &self.phase.current())
            .finish()
    }
}
