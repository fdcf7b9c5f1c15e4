//! Process-wide publish/subscribe bus for cross-cutting signals.
//!
//! Listeners are kept in an ordered registry per [`SignalKind`].  Publishing
//! delivers synchronously, in registration order, on the caller's stack; there
//! is no batching and no reordering.
//!
//! [`EventBus::subscribe`] returns a [`Subscription`].  Dropping or releasing
//! it removes the listener, so a phase that stores its subscriptions in its
//! own state cannot outlive them by accident.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::phase::{PhaseId, PhaseKind};

/// Opaque handle to a boss instance reported by the combat layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BossHandle(pub u64);

/// Discriminant used to key the listener registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    PhaseChanged,
    EntityDied,
    BossSpawned,
    CurrencyChanged,
    UiHover,
    LoadStarted,
    LoadProgress,
    LoadCompleted,
}

/// A signal and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A new phase was installed by the state machine.
    PhaseChanged { phase: PhaseKind, id: PhaseId },
    /// An enemy or boss died.  Reported exactly once per real death.
    EntityDied { is_boss: bool },
    /// A boss entered the arena.
    BossSpawned { boss: BossHandle },
    CurrencyChanged { balance: i64, delta: i64 },
    /// The pointer entered a UI element.
    UiHover { element: String },
    LoadStarted { scene: String },
    /// Fractional load progress, always within `[0, 1]`.
    LoadProgress { scene: String, progress: f32 },
    LoadCompleted { scene: String },
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::PhaseChanged { .. } => SignalKind::PhaseChanged,
            Signal::EntityDied { .. } => SignalKind::EntityDied,
            Signal::BossSpawned { .. } => SignalKind::BossSpawned,
            Signal::CurrencyChanged { .. } => SignalKind::CurrencyChanged,
            Signal::UiHover { .. } => SignalKind::UiHover,
            Signal::LoadStarted { .. } => SignalKind::LoadStarted,
            Signal::LoadProgress { .. } => SignalKind::LoadProgress,
            Signal::LoadCompleted { .. } => SignalKind::LoadCompleted,
        }
    }
}

type Listener = Rc<dyn Fn(&Signal)>;

struct ListenerEntry {
    id: u64,
    /// Cleared on release so a listener removed mid-delivery sees nothing more.
    live: Rc<Cell<bool>>,
    callback: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<SignalKind, Vec<ListenerEntry>>,
    subscribed: u64,
    released: u64,
}

/// Lifetime counters, used to check that subscribe/release calls pair up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusStats {
    pub subscribed: u64,
    pub released: u64,
}

impl BusStats {
    /// Listeners currently registered across all kinds.
    pub fn live(&self) -> u64 {
        self.subscribed - self.released
    }
}

/// Cheap-to-clone handle to the shared listener registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every future signal of `kind`.
    pub fn subscribe(&self, kind: SignalKind, callback: impl Fn(&Signal) + 'static) -> Subscription {
        let live = Rc::new(Cell::new(true));
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribed += 1;
        registry.listeners.entry(kind).or_default().push(ListenerEntry {
            id,
            live: Rc::clone(&live),
            callback: Rc::new(callback),
        });
        Subscription {
            registry: Rc::downgrade(&self.registry),
            kind,
            id,
            live,
        }
    }

    /// Deliver `signal` to every listener of its kind, in registration order.
    ///
    /// The registry borrow is released before any callback runs, so listeners
    /// may subscribe, release, or publish further signals.
    pub fn publish(&self, signal: &Signal) {
        let targets: Vec<(Rc<Cell<bool>>, Listener)> = {
            let registry = self.registry.borrow();
            match registry.listeners.get(&signal.kind()) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| (Rc::clone(&entry.live), Rc::clone(&entry.callback)))
                    .collect(),
                None => return,
            }
        };
        for (live, callback) in targets {
            if live.get() {
                callback(signal);
            }
        }
    }

    pub fn listener_count(&self, kind: SignalKind) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn stats(&self) -> BusStats {
        let registry = self.registry.borrow();
        BusStats {
            subscribed: registry.subscribed,
            released: registry.released,
        }
    }
}

/// Scoped registration returned by [`EventBus::subscribe`].
///
/// Released exactly once: explicitly via [`Subscription::release`] or
/// implicitly on drop.
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    kind: SignalKind,
    id: u64,
    live: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    pub fn release(self) {
        // Drop does the work.
    }

    fn detach(&mut self) {
        if !self.live.replace(false) {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.borrow_mut();
        if let Some(entries) = registry.listeners.get_mut(&self.kind) {
            entries.retain(|entry| entry.id != self.id);
        }
        registry.released += 1;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("live", &self.live.get())
            .finish()
    }
}
