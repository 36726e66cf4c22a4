//! Application State
//!
//! The lifecycle states of the managed application and the atomic cell
//! through which every transition is linearized.
//!
//! ```text
//! Destroyed → Creating → Created → Initializing → Initialized
//!     ↑                                               │
//!     ├──────────────── Destroying ←──────────────────┘
//!     └──────────────── Upgrading (Destroyed → Upgrading → Destroyed)
//! Any post-CAS failure → Unknown (sink state)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the managed application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApplicationState {
    /// No application instance is live. Initial state.
    Destroyed = 0,
    Creating = 1,
    Created = 2,
    Initializing = 3,
    Initialized = 4,
    Destroying = 5,
    Upgrading = 6,
    /// A transition failed after its entry CAS succeeded. No recovery.
    Unknown = 7,
}

impl ApplicationState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ApplicationState::Destroyed,
            1 => ApplicationState::Creating,
            2 => ApplicationState::Created,
            3 => ApplicationState::Initializing,
            4 => ApplicationState::Initialized,
            5 => ApplicationState::Destroying,
            6 => ApplicationState::Upgrading,
            _ => ApplicationState::Unknown,
        }
    }

    /// Whether the state is one of the transient states held during a transition
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApplicationState::Creating
                | ApplicationState::Initializing
                | ApplicationState::Destroying
                | ApplicationState::Upgrading
        )
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationState::Destroyed => "DESTROYED",
            ApplicationState::Creating => "CREATING",
            ApplicationState::Created => "CREATED",
            ApplicationState::Initializing => "INITIALIZING",
            ApplicationState::Initialized => "INITIALIZED",
            ApplicationState::Destroying => "DESTROYING",
            ApplicationState::Upgrading => "UPGRADING",
            ApplicationState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Atomic holder of the current [`ApplicationState`]
#[derive(Debug)]
pub struct StateCell {
    value: AtomicU8,
}

impl StateCell {
    pub fn new(initial: ApplicationState) -> Self {
        Self {
            value: AtomicU8::new(initial as u8),
        }
    }

    pub fn get(&self) -> ApplicationState {
        ApplicationState::from_u8(self.value.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ApplicationState) {
        self.value.store(state as u8, Ordering::Release);
    }

    /// Atomically move from `from` to `to`.
    ///
    /// On failure the state is left untouched and the state actually
    /// observed is returned.
    pub fn compare_and_set(&self, from: ApplicationState, to: ApplicationState) -> Result<(), ApplicationState> {
        self.value
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ApplicationState::from_u8)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ApplicationState::Destroyed)
    }
}
