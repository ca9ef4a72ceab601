pub mod binder;
pub mod builder;
pub mod element;
pub mod injector;
pub mod key;
pub mod module;
pub mod provider;
pub mod scope;
pub mod source;

pub use binder::{Binder, BindingBuilder};
pub use builder::InjectorBuilder;
pub use element::{
    bound_keys, Binding, BindingTarget, Element, ErasedValue, InjectionFn, InjectionRequest,
    ProviderFn, ProviderLookup,
};
pub use injector::Injector;
pub use key::{Key, Qualifier};
pub use module::{module_fn, FnModule, Module};
pub use provider::{ErasedProvider, Provider};
pub use scope::Scope;
pub use source::{render_messages, Message, Source};
