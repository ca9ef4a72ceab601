//! Private modules for the elif.rs injector
//!
//! A [`PrivateModule`] builds its bindings into a child injector of the
//! injector that installs it and forwards only the keys it exposes. The child
//! injector is built exactly once, while the enclosing injector is created,
//! by an eager gate binding that every forwarded key forces first.

mod binder;
mod capture;
mod error;
mod exposure;
mod gate;
mod module;
mod phase;
mod provider_method;

pub use binder::PrivateBinder;
pub use error::PrivateModuleError;
pub use exposure::ExposedKeyBuilder;
pub use gate::Ready;
pub use module::{PrivateModule, PrivateModuleConfig};
pub use phase::PassPhase;
pub use provider_method::ProviderMethod;
