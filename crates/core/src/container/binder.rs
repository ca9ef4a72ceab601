use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::Stage;
use crate::container::element::{
    Binding, BindingTarget, Element, ErasedValue, InjectionRequest, ProviderLookup,
};
use crate::container::injector::Injector;
use crate::container::key::{Key, Qualifier};
use crate::container::module::Module;
use crate::container::provider::{ErasedProvider, Provider};
use crate::container::scope::Scope;
use crate::container::source::{Message, Source};
use crate::errors::CoreError;

/// Recording registry
///
/// Collects declarations in encounter order without constructing anything.
/// Every declaration is tagged with the caller's location unless a source
/// override is active (see [`Binder::with_source`]).
#[derive(Debug)]
pub struct Binder {
    elements: Vec<Element>,
    stage: Stage,
    source_override: Option<Source>,
}

impl Binder {
    /// Create an empty binder
    pub fn new(stage: Stage) -> Self {
        Self {
            elements: Vec::new(),
            stage,
            source_override: None,
        }
    }

    /// Source attached to the next declaration
    #[track_caller]
    pub fn current_source(&self) -> Source {
        match &self.source_override {
            Some(source) => source.clone(),
            None => Source::caller(),
        }
    }

    /// Start a binding for `T`
    #[track_caller]
    pub fn bind<T: Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, T> {
        let source = self.current_source();
        BindingBuilder {
            binder: self,
            key: Key::of::<T>(),
            source,
            scope: Scope::Unscoped,
            _marker: PhantomData,
        }
    }

    /// Bind a named constant value
    #[track_caller]
    pub fn bind_constant<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.bind::<T>().named(name).to_instance(value);
    }

    /// Record a fully built binding
    pub fn add_binding(&mut self, binding: Binding) {
        self.elements.push(Element::Binding(binding));
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Run `module` against this binder
    ///
    /// A module that fails is reported as an accumulated error rather than
    /// aborting the recording.
    #[track_caller]
    pub fn install(&mut self, module: &dyn Module) {
        let source = self.current_source();
        self.install_from(source, module);
    }

    /// Run `module`, attributing its failure to `source`
    pub fn install_from(&mut self, source: Source, module: &dyn Module) {
        tracing::debug!(module = module.name(), "Installing module");
        if let Err(error) = module.configure(self) {
            let text = format!("Error configuring module {}: {}", module.name(), error);
            self.add_message(Message::new(source, text).with_cause(error));
        }
    }

    /// Record an error at the current source
    #[track_caller]
    pub fn add_error(&mut self, message: impl Into<String>) {
        let source = self.current_source();
        self.add_message(Message::new(source, message));
    }

    pub fn add_message(&mut self, message: Message) {
        self.elements.push(Element::Message(message));
    }

    /// Run `callback` against the finished injector
    #[track_caller]
    pub fn request_injection<F>(&mut self, callback: F)
    where
        F: Fn(&Injector) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        let source = self.current_source();
        self.elements.push(Element::InjectionRequest(InjectionRequest {
            source,
            callback: Arc::new(callback),
        }));
    }

    /// Fail injector creation unless `key` is resolvable
    #[track_caller]
    pub fn require_binding(&mut self, key: Key) {
        let _ = self.get_erased_provider(key);
    }

    /// Provider for `key`, usable once the injector exists
    #[track_caller]
    pub fn get_provider<T: Send + Sync + 'static>(&mut self, key: Key) -> Provider<T> {
        self.get_erased_provider(key).typed()
    }

    #[track_caller]
    pub fn get_erased_provider(&mut self, key: Key) -> ErasedProvider {
        let source = self.current_source();
        let provider = ErasedProvider::deferred(key);
        self.elements.push(Element::ProviderLookup(ProviderLookup {
            source,
            provider: provider.clone(),
        }));
        provider
    }

    /// Record everything inside `f` as coming from `source`
    pub fn with_source<R>(&mut self, source: Source, f: impl FnOnce(&mut Binder) -> R) -> R {
        let previous = self.source_override.replace(source);
        let result = f(self);
        self.source_override = previous;
        result
    }

    pub fn current_stage(&self) -> Stage {
        self.stage
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

/// Fluent builder for one binding
///
/// Qualifier and scope come first; choosing a target records the binding.
#[must_use = "a binding is only recorded once a target is chosen"]
pub struct BindingBuilder<'a, T> {
    binder: &'a mut Binder,
    key: Key,
    source: Source,
    scope: Scope,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> BindingBuilder<'a, T> {
    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualified_with(Qualifier::named(name))
    }

    /// Qualify with a marker type
    pub fn annotated_with<M: ?Sized + 'static>(self) -> Self {
        self.qualified_with(Qualifier::marker::<M>())
    }

    pub fn qualified_with(mut self, qualifier: Qualifier) -> Self {
        if let Some(existing) = self.key.qualifier() {
            let text = format!(
                "More than one qualifier is specified for {}; {} is already set.",
                self.key, existing
            );
            self.binder.add_message(Message::new(self.source.clone(), text));
            return self;
        }
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

    pub fn eager_singleton(self) -> Self {
        self.in_scope(Scope::EagerSingleton)
    }

    pub fn to_instance(self, value: T) {
        self.finish(BindingTarget::Instance(Arc::new(value)));
    }

    /// Bind an already shared value, preserving its identity
    pub fn to_shared(self, value: Arc<T>) {
        self.finish(BindingTarget::Instance(value));
    }

    pub fn to_provider<F>(self, provider: F)
    where
        F: Fn(&Injector) -> Result<T, CoreError> + Send + Sync + 'static,
    {
        let provider = move |injector: &Injector| -> Result<ErasedValue, CoreError> {
            let value = provider(injector)?;
            Ok(Arc::new(value))
        };
        self.finish(BindingTarget::Provider(Arc::new(provider)));
    }

    pub fn to_default(self)
    where
        T: Default,
    {
        self.to_provider(|_| Ok(T::default()));
    }

    /// Delegate to another binding of the same type
    pub fn to_key(self, target: Key) {
        if !target.is_type::<T>() {
            let text = format!("Cannot link {} to {}: the types differ.", self.key, target);
            self.binder.add_message(Message::new(self.source, text));
            return;
        }
        self.finish(BindingTarget::LinkedKey(target));
    }

    fn finish(self, target: BindingTarget) {
        let binding = Binding {
            key: self.key,
            source: self.source,
            scope: self.scope,
            target,
        };
        self.binder.add_binding(binding);
    }
}
