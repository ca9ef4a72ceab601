use elif_inject::CoreError;
use thiserror::Error;

/// Protocol violations of a private module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrivateModuleError {
    #[error("Re-entry is not allowed: private module {module} is already being configured")]
    Reentrancy { module: String },

    #[error("Cannot expose {key}: the private module is not ready. Exposures may only be declared while its private bindings are configured")]
    NotReady { key: String },

    #[error("Exposure of {key} is already annotated")]
    AlreadyAnnotated { key: String },

    #[error("Exposure of {key} has been finalized and can no longer be annotated")]
    ExposureFinalized { key: String },

    #[error("The private injector was requested before its declarations were captured")]
    GateNotArmed,

    #[error("The private injector was requested while it is being built")]
    GateInProgress,

    #[error("The private injector could not be built: {message}")]
    GateFailed { message: String },
}

impl PrivateModuleError {
    pub fn reentrancy(module: impl Into<String>) -> Self {
        Self::Reentrancy {
            module: module.into(),
        }
    }

    /// Check if the error is a re-entry violation
    pub fn is_reentrancy(&self) -> bool {
        matches!(self, Self::Reentrancy { .. })
    }
}

impl From<PrivateModuleError> for CoreError {
    fn from(error: PrivateModuleError) -> Self {
        CoreError::module_with_source(error.to_string(), Box::new(error))
    }
}
