use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use elif_inject::{Key, Source};

use crate::error::PrivateModuleError;
use crate::exposure::{ExposedKeyBuilder, Exposure};
use crate::gate::Gate;

/// Observable configuration phase of a private module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    /// No configuration pass is running
    Idle,
    /// Private declarations are being captured
    Capturing,
    /// Exposures are being validated and forwarded
    Wiring,
    /// A re-entry violation aborted the running pass
    Failed,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            PassPhase::Idle => "idle",
            PassPhase::Capturing => "capturing",
            PassPhase::Wiring => "wiring",
            PassPhase::Failed => "failed",
        };
        write!(f, "{}", phase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrivateEntry {
    Pending,
    Active,
    Done,
}

/// State of one public configuration pass
pub(crate) struct PassState {
    pub(crate) exposures: Vec<Arc<Exposure>>,
    pub(crate) gate: Arc<Gate>,
    private: PrivateEntry,
    owner: ThreadId,
}

enum Phase {
    Idle,
    Capturing(PassState),
    Wiring,
    Failed,
}

enum Decision {
    Begin,
    EnterPrivate,
    Nested,
    Busy,
}

/// How one `configure` call must be handled
pub(crate) enum Entry<'a> {
    Public(PassGuard<'a>),
    Private(ActiveGuard<'a>),
}

/// Per-instance phase state machine
///
/// One pass at a time: `Idle -> Capturing -> Wiring -> Idle`, with `Failed`
/// reachable from `Capturing` on a nested re-entry. Guards return the cell to
/// its resting state on every exit path.
pub(crate) struct PhaseCell {
    phase: Mutex<Phase>,
}

impl PhaseCell {
    pub(crate) fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn current(&self) -> PassPhase {
        match &*self.lock() {
            Phase::Idle => PassPhase::Idle,
            Phase::Capturing(_) => PassPhase::Capturing,
            Phase::Wiring => PassPhase::Wiring,
            Phase::Failed => PassPhase::Failed,
        }
    }

    /// Route a `configure` call to the public or private phase
    pub(crate) fn enter(&self, module: &str) -> Result<Entry<'_>, PrivateModuleError> {
        let current = thread::current().id();
        let mut phase = self.lock();

        let decision = match &*phase {
            Phase::Idle => Decision::Begin,
            Phase::Capturing(state) if state.owner == current => match state.private {
                PrivateEntry::Pending => Decision::EnterPrivate,
                PrivateEntry::Active | PrivateEntry::Done => Decision::Nested,
            },
            _ => Decision::Busy,
        };

        match decision {
            Decision::Begin => {
                tracing::debug!(module, "Starting private module pass");
                *phase = Phase::Capturing(PassState {
                    exposures: Vec::new(),
                    gate: Arc::new(Gate::new(module)),
                    private: PrivateEntry::Pending,
                    owner: current,
                });
                Ok(Entry::Public(PassGuard { cell: self }))
            }
            Decision::EnterPrivate => {
                if let Phase::Capturing(state) = &mut *phase {
                    state.private = PrivateEntry::Active;
                }
                Ok(Entry::Private(ActiveGuard { cell: self }))
            }
            Decision::Nested => {
                tracing::warn!(module, "Private module re-entered while configuring");
                *phase = Phase::Failed;
                Err(PrivateModuleError::reentrancy(module))
            }
            Decision::Busy => {
                tracing::warn!(module, "Private module is already being configured");
                Err(PrivateModuleError::reentrancy(module))
            }
        }
    }

    /// Record an exposure request in the running pass's ledger
    pub(crate) fn request_exposure(
        &self,
        key: Key,
        source: Source,
    ) -> Result<ExposedKeyBuilder, PrivateModuleError> {
        let current = thread::current().id();
        let mut phase = self.lock();
        match &mut *phase {
            Phase::Capturing(state)
                if state.owner == current && state.private == PrivateEntry::Active =>
            {
                let exposure = Arc::new(Exposure::new(key, source, state.gate.ready_key().clone()));
                state.exposures.push(exposure.clone());
                Ok(ExposedKeyBuilder::new(exposure))
            }
            _ => Err(PrivateModuleError::NotReady {
                key: key.to_string(),
            }),
        }
    }

    /// Exposures recorded so far in the running pass
    pub(crate) fn exposures(&self) -> Vec<Arc<Exposure>> {
        match &*self.lock() {
            Phase::Capturing(state) => state.exposures.clone(),
            _ => Vec::new(),
        }
    }

    /// End capture and hand the ledger to the wiring pass
    pub(crate) fn finish_capture(&self, module: &str) -> Result<PassState, PrivateModuleError> {
        let mut phase = self.lock();
        match std::mem::replace(&mut *phase, Phase::Wiring) {
            Phase::Capturing(state) => Ok(state),
            _ => {
                *phase = Phase::Failed;
                Err(PrivateModuleError::reentrancy(module))
            }
        }
    }
}

/// Held for the whole public pass; resets the cell to idle on drop
pub(crate) struct PassGuard<'a> {
    cell: &'a PhaseCell,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *self.cell.lock() = Phase::Idle;
    }
}

/// Held while private bindings are configured
pub(crate) struct ActiveGuard<'a> {
    cell: &'a PhaseCell,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Phase::Capturing(state) = &mut *self.cell.lock() {
            if state.private == PrivateEntry::Active {
                state.private = PrivateEntry::Done;
            }
        }
    }
}
