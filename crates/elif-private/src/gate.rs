use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use elif_inject::{
    Binding, CoreError, Element, ErasedValue, Injector, Key, Qualifier, Scope, Source,
};

use crate::error::PrivateModuleError;

/// Value bound under a private module's gate key once its injector exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready;

enum GateState {
    Unarmed,
    Armed(Vec<Element>),
    Building,
    Ready(Injector),
    Failed(String),
}

/// Single-shot trigger that builds the private injector
///
/// Bound in the public injector as an eager singleton under a unique key, so
/// the private injector is built while the public one is created, and before
/// any forwarded value can be observed.
pub(crate) struct Gate {
    module: String,
    ready_key: Key,
    state: Mutex<GateState>,
}

impl Gate {
    pub(crate) fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ready_key: Key::qualified::<Ready>(Qualifier::unique()),
            state: Mutex::new(GateState::Unarmed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn ready_key(&self) -> &Key {
        &self.ready_key
    }

    /// Hand over the captured private declarations
    pub(crate) fn arm(&self, declarations: Vec<Element>) {
        let mut state = self.lock();
        if matches!(*state, GateState::Unarmed) {
            *state = GateState::Armed(declarations);
        }
    }

    /// Eager singleton binding that forces the gate
    pub(crate) fn binding(self: &Arc<Self>, source: Source) -> Binding {
        let gate = Arc::clone(self);
        Binding::to_provider(self.ready_key.clone(), source, move |public| {
            gate.materialize(public)?;
            let ready: ErasedValue = Arc::new(Ready);
            Ok(ready)
        })
        .with_scope(Scope::EagerSingleton)
    }

    /// Build the private injector on first call, return it afterwards
    pub(crate) fn materialize(&self, public: &Injector) -> Result<Injector, CoreError> {
        let declarations = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, GateState::Building) {
                GateState::Armed(declarations) => declarations,
                GateState::Ready(injector) => {
                    *state = GateState::Ready(injector.clone());
                    return Ok(injector);
                }
                GateState::Unarmed => {
                    *state = GateState::Unarmed;
                    return Err(PrivateModuleError::GateNotArmed.into());
                }
                GateState::Building => return Err(PrivateModuleError::GateInProgress.into()),
                GateState::Failed(message) => {
                    *state = GateState::Failed(message.clone());
                    return Err(PrivateModuleError::GateFailed { message }.into());
                }
            }
        };

        tracing::debug!(
            module = %self.module,
            declarations = declarations.len(),
            "Building private injector"
        );
        let result = public.create_child_from_elements(declarations);

        let mut state = self.lock();
        match result {
            Ok(injector) => {
                tracing::info!(
                    module = %self.module,
                    injector = %injector.id(),
                    parent = %public.id(),
                    "Private injector ready"
                );
                *state = GateState::Ready(injector.clone());
                Ok(injector)
            }
            Err(error) => {
                tracing::warn!(module = %self.module, "Private injector creation failed");
                *state = GateState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    pub(crate) fn private_injector(&self) -> Option<Injector> {
        match &*self.lock() {
            GateState::Ready(injector) => Some(injector.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lock() {
            GateState::Unarmed => "unarmed",
            GateState::Armed(_) => "armed",
            GateState::Building => "building",
            GateState::Ready(_) => "ready",
            GateState::Failed(_) => "failed",
        };
        f.debug_struct("Gate")
            .field("module", &self.module)
            .field("ready_key", &self.ready_key)
            .field("state", &state)
            .finish()
    }
}
