use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, Weak};
use std::thread::{self, ThreadId};

use uuid::Uuid;

use crate::config::{EnvConfig, InjectorConfig, Stage};
use crate::container::binder::Binder;
use crate::container::builder::InjectorBuilder;
use crate::container::element::{Binding, BindingTarget, Element, ErasedValue};
use crate::container::key::{Key, Qualifier};
use crate::container::module::Module;
use crate::container::provider::{ErasedProvider, Provider};
use crate::container::source::{Message, Source};
use crate::errors::CoreError;

thread_local! {
    /// Keys currently being resolved on this thread, outermost first
    static RESOLUTION_PATH: RefCell<Vec<Key>> = const { RefCell::new(Vec::new()) };
}

/// Entry on the per-thread resolution path, popped on drop
struct ResolutionFrame;

impl ResolutionFrame {
    fn enter(key: &Key, max_depth: usize) -> Result<Self, CoreError> {
        RESOLUTION_PATH.with(|path| {
            let mut path = path.borrow_mut();
            if path.len() >= max_depth {
                return Err(CoreError::ResolutionDepthExceeded {
                    key: key.to_string(),
                    depth: max_depth,
                });
            }
            path.push(key.clone());
            Ok(ResolutionFrame)
        })
    }

    fn path_string() -> String {
        RESOLUTION_PATH.with(|path| {
            path.borrow()
                .iter()
                .map(Key::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        })
    }
}

impl Drop for ResolutionFrame {
    fn drop(&mut self) {
        RESOLUTION_PATH.with(|path| {
            path.borrow_mut().pop();
        });
    }
}

/// Threads blocked on a singleton, mapped to the thread building it
fn waits_for() -> &'static Mutex<HashMap<ThreadId, ThreadId>> {
    static WAITS_FOR: OnceLock<Mutex<HashMap<ThreadId, ThreadId>>> = OnceLock::new();
    WAITS_FOR.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Edge `waiter -> owner` in the wait graph, removed on drop
struct WaitRecord {
    waiter: ThreadId,
}

impl WaitRecord {
    /// Record the edge, or `None` if `owner` already waits on `waiter`
    fn register(waiter: ThreadId, owner: ThreadId) -> Result<Option<Self>, CoreError> {
        let mut waits = waits_for().lock().map_err(|_| CoreError::LockError {
            resource: "singleton wait graph".to_string(),
        })?;

        let mut next = Some(owner);
        let mut hops = 0;
        while let Some(thread) = next {
            if thread == waiter {
                return Ok(None);
            }
            if hops > waits.len() {
                break;
            }
            hops += 1;
            next = waits.get(&thread).copied();
        }

        waits.insert(waiter, owner);
        Ok(Some(WaitRecord { waiter }))
    }
}

impl Drop for WaitRecord {
    fn drop(&mut self) {
        if let Ok(mut waits) = waits_for().lock() {
            waits.remove(&self.waiter);
        }
    }
}

/// Singleton cache state of one binding
enum SingletonSlot {
    Empty,
    Constructing(ThreadId),
    Ready(ErasedValue),
}

struct BindingState {
    binding: Binding,
    slot: Mutex<SingletonSlot>,
    ready: Condvar,
}

impl BindingState {
    fn new(binding: Binding) -> Self {
        Self {
            binding,
            slot: Mutex::new(SingletonSlot::Empty),
            ready: Condvar::new(),
        }
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, SingletonSlot>, CoreError> {
        self.slot.lock().map_err(|_| CoreError::LockError {
            resource: format!("singleton {}", self.binding.key),
        })
    }
}

/// Resets a slot left in `Constructing` if the provider unwinds
struct ConstructionGuard<'a> {
    state: &'a BindingState,
    finished: bool,
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut slot) = self.state.slot.lock() {
            *slot = SingletonSlot::Empty;
        }
        self.state.ready.notify_all();
    }
}

pub(crate) struct InjectorInner {
    id: Uuid,
    config: InjectorConfig,
    bindings: HashMap<Key, BindingState>,
    order: Vec<Key>,
    parent: Option<Weak<InjectorInner>>,
}

/// Live object graph built from recorded declarations
///
/// `Injector` is a cheap handle; clones share the same graph. Lookups try the
/// injector's own bindings first and then walk the parent chain. A child
/// injector holds its parent weakly and never keeps it alive.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    /// Start configuring a new injector
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    /// Create an injector in the default configuration
    pub fn create(modules: &[&dyn Module]) -> Result<Self, CoreError> {
        Self::create_with_config(InjectorConfig::default(), modules)
    }

    pub fn create_with_config(
        config: InjectorConfig,
        modules: &[&dyn Module],
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let elements = record_elements(config.stage, modules);
        Self::from_elements(elements, None, config)
    }

    /// Create a child injector that falls back to this one
    pub fn create_child(&self, modules: &[&dyn Module]) -> Result<Self, CoreError> {
        let elements = record_elements(self.stage(), modules);
        self.create_child_from_elements(elements)
    }

    /// Create a child injector from previously recorded declarations
    pub fn create_child_from_elements(&self, elements: Vec<Element>) -> Result<Self, CoreError> {
        Self::from_elements(elements, Some(self), self.inner.config.clone())
    }

    pub(crate) fn from_elements(
        elements: Vec<Element>,
        parent: Option<&Injector>,
        config: InjectorConfig,
    ) -> Result<Self, CoreError> {
        let mut messages = Vec::new();
        let mut bindings: HashMap<Key, BindingState> = HashMap::new();
        let mut order = Vec::new();
        let mut lookups = Vec::new();
        let mut injections = Vec::new();

        for element in elements {
            match element {
                Element::Binding(binding) => {
                    if let Some(existing) = bindings.get(&binding.key) {
                        let text = format!(
                            "A binding to {} was already configured at {}.",
                            binding.key, existing.binding.source
                        );
                        messages.push(Message::new(binding.source.clone(), text));
                        continue;
                    }
                    if config.log_bindings {
                        tracing::debug!(
                            key = %binding.key,
                            scope = %binding.scope,
                            source = %binding.source,
                            "Binding"
                        );
                    }
                    order.push(binding.key.clone());
                    bindings.insert(binding.key.clone(), BindingState::new(binding));
                }
                Element::ProviderLookup(lookup) => lookups.push(lookup),
                Element::InjectionRequest(request) => injections.push(request),
                Element::Message(message) => messages.push(message),
            }
        }

        let injector = Injector {
            inner: Arc::new(InjectorInner {
                id: Uuid::new_v4(),
                config,
                bindings,
                order,
                parent: parent.map(Injector::downgrade),
            }),
        };

        tracing::info!(
            injector = %injector.id(),
            stage = %injector.stage(),
            bindings = injector.inner.order.len(),
            child = parent.is_some(),
            "Creating injector"
        );

        for lookup in &lookups {
            if !injector.can_resolve(lookup.key()) {
                let text = format!("No binding for {} was found.", lookup.key());
                messages.push(Message::new(lookup.source.clone(), text));
            }
        }
        if !messages.is_empty() {
            return Err(injector.creation_failed(messages));
        }
        for lookup in &lookups {
            lookup.provider.initialize(&injector);
        }

        if injector.stage().is_tool() {
            return Ok(injector);
        }

        for request in &injections {
            if let Err(error) = (request.callback)(&injector) {
                let text = format!("Error running injection request: {}", error);
                messages.push(Message::new(request.source.clone(), text).with_cause(error));
            }
        }

        let eager: Vec<(Key, Source)> = injector
            .inner
            .order
            .iter()
            .filter_map(|key| injector.inner.bindings.get(key))
            .filter(|state| injector.inner.config.is_eager(state.binding.scope))
            .map(|state| (state.binding.key.clone(), state.binding.source.clone()))
            .collect();

        for (key, source) in eager {
            if let Err(error) = injector.get_by_key(&key) {
                let text = format!("Error provisioning {}: {}", key, error);
                messages.push(Message::new(source, text).with_cause(error));
            }
        }

        if !messages.is_empty() {
            return Err(injector.creation_failed(messages));
        }

        tracing::debug!(injector = %injector.id(), "Injector ready");
        Ok(injector)
    }

    fn creation_failed(&self, messages: Vec<Message>) -> CoreError {
        tracing::warn!(
            injector = %self.id(),
            errors = messages.len(),
            "Injector creation failed"
        );
        CoreError::creation(messages)
    }

    /// Resolve the unqualified binding of `T`
    pub fn get_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, CoreError> {
        self.get::<T>(&Key::of::<T>())
    }

    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, CoreError> {
        self.get::<T>(&Key::named::<T>(name))
    }

    pub fn get_qualified<T: Send + Sync + 'static>(
        &self,
        qualifier: Qualifier,
    ) -> Result<Arc<T>, CoreError> {
        self.get::<T>(&Key::qualified::<T>(qualifier))
    }

    /// Resolve `key` as a `T`
    pub fn get<T: Send + Sync + 'static>(&self, key: &Key) -> Result<Arc<T>, CoreError> {
        let value = self.get_by_key(key)?;
        downcast_value::<T>(key, value)
    }

    /// Resolve `key` without knowing its type
    pub fn get_by_key(&self, key: &Key) -> Result<ErasedValue, CoreError> {
        let _frame = ResolutionFrame::enter(key, self.inner.config.max_resolution_depth)?;

        if let Some(state) = self.inner.bindings.get(key) {
            return self.provision(state);
        }

        match self.checked_parent()? {
            Some(parent) => parent.get_by_key(key),
            None => Err(CoreError::service_not_found(key.to_string())),
        }
    }

    /// Provider bound to this injector
    pub fn get_provider<T: Send + Sync + 'static>(&self, key: Key) -> Provider<T> {
        ErasedProvider::bound(key, self).typed()
    }

    /// Whether this injector itself binds `key`
    pub fn has_binding(&self, key: &Key) -> bool {
        self.inner.bindings.contains_key(key)
    }

    /// Whether `key` resolves here or in an ancestor
    pub fn can_resolve(&self, key: &Key) -> bool {
        if self.has_binding(key) {
            return true;
        }
        match self.checked_parent() {
            Ok(Some(parent)) => parent.can_resolve(key),
            _ => false,
        }
    }

    /// Own bindings in declaration order
    pub fn binding_keys(&self) -> Vec<Key> {
        self.inner.order.clone()
    }

    pub fn binding_source(&self, key: &Key) -> Option<Source> {
        self.inner
            .bindings
            .get(key)
            .map(|state| state.binding.source.clone())
    }

    /// Parent injector, if it is still alive
    pub fn parent(&self) -> Option<Injector> {
        self.checked_parent().ok().flatten()
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn stage(&self) -> Stage {
        self.inner.config.stage
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.inner.config
    }

    pub(crate) fn downgrade(&self) -> Weak<InjectorInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<InjectorInner>) -> Option<Injector> {
        weak.upgrade().map(|inner| Injector { inner })
    }

    fn checked_parent(&self) -> Result<Option<Injector>, CoreError> {
        match &self.inner.parent {
            None => Ok(None),
            Some(weak) => Injector::upgrade(weak)
                .map(Some)
                .ok_or(CoreError::InjectorDropped),
        }
    }

    fn provision(&self, state: &BindingState) -> Result<ErasedValue, CoreError> {
        if !state.binding.scope.is_singleton() {
            return self.produce(&state.binding);
        }

        let current = thread::current().id();
        {
            let mut slot = state.lock_slot()?;
            loop {
                let owner = match &*slot {
                    SingletonSlot::Ready(value) => return Ok(value.clone()),
                    SingletonSlot::Constructing(owner) if *owner == current => {
                        return Err(CoreError::CircularDependency {
                            path: ResolutionFrame::path_string(),
                            cycle_service: state.binding.key.to_string(),
                        });
                    }
                    SingletonSlot::Constructing(owner) => Some(*owner),
                    SingletonSlot::Empty => None,
                };
                let Some(owner) = owner else {
                    *slot = SingletonSlot::Constructing(current);
                    break;
                };

                // The owner may itself be blocked on a singleton this thread builds
                let Some(_waiting) = WaitRecord::register(current, owner)? else {
                    tracing::warn!(key = %state.binding.key, "Singleton cycle across threads");
                    return Err(CoreError::CircularDependency {
                        path: ResolutionFrame::path_string(),
                        cycle_service: state.binding.key.to_string(),
                    });
                };
                slot = state.ready.wait(slot).map_err(|_| CoreError::LockError {
                    resource: format!("singleton {}", state.binding.key),
                })?;
            }
        }

        let mut guard = ConstructionGuard {
            state,
            finished: false,
        };
        let result = self.produce(&state.binding);

        let mut slot = state.lock_slot()?;
        *slot = match &result {
            Ok(value) => SingletonSlot::Ready(value.clone()),
            Err(_) => SingletonSlot::Empty,
        };
        guard.finished = true;
        state.ready.notify_all();
        result
    }

    fn produce(&self, binding: &Binding) -> Result<ErasedValue, CoreError> {
        match &binding.target {
            BindingTarget::Instance(value) => Ok(value.clone()),
            BindingTarget::Provider(provider) => provider(self),
            BindingTarget::LinkedKey(target) => self.get_by_key(target),
        }
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.inner.id)
            .field("stage", &self.inner.config.stage)
            .field("bindings", &self.inner.order.len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Record every module against one binder
pub(crate) fn record_elements(stage: Stage, modules: &[&dyn Module]) -> Vec<Element> {
    let mut binder = Binder::new(stage);
    for module in modules {
        let source = Source::described(format!("module {}", module.name()));
        binder.install_from(source, *module);
    }
    binder.into_elements()
}

pub(crate) fn downcast_value<T: Send + Sync + 'static>(
    key: &Key,
    value: ErasedValue,
) -> Result<Arc<T>, CoreError> {
    value.downcast::<T>().map_err(|_| CoreError::TypeMismatch {
        key: key.to_string(),
        expected: std::any::type_name::<T>(),
    })
}
