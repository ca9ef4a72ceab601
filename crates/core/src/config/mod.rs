pub mod injector_config;
pub mod sources;
pub mod validation;

pub use injector_config::*;
pub use sources::*;
pub use validation::*;
