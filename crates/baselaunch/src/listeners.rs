//! Listener registry with isolated dispatch
//!
//! Used by the auth session and the live-update channel. Listeners run in
//! registration order; one that returns an error or panics is logged and
//! the rest still run.

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a listener.
pub type ListenerResult = std::result::Result<(), ListenerError>;

type Listener<E> = Arc<dyn Fn(&E) -> ListenerResult + Send + Sync>;

struct RegistryInner<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Ordered set of callbacks for events of type `E`.
pub struct ListenerRegistry<E> {
    name: &'static str,
    inner: Arc<Mutex<RegistryInner<E>>>,
}

impl<E: 'static> ListenerRegistry<E> {
    /// Create an empty registry; `name` tags log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener.
    ///
    /// Returns a handle that can be used to deregister the listener later.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) -> ListenerResult + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::new(listener)));
            id
        };

        Subscription {
            detach: Box::new(Detach {
                registry: Arc::downgrade(&self.inner),
                id,
            }),
            active: AtomicBool::new(true),
        }
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// Returns the number of listeners that failed or panicked.
    pub fn emit(&self, event: &E) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe while we dispatch.
        let listeners: Vec<(u64, Listener<E>)> = self.inner.lock().listeners.clone();

        let mut failures = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(registry = self.name, listener = id, error = %e, "listener failed");
                }
                Err(payload) => {
                    failures += 1;
                    tracing::error!(
                        registry = self.name,
                        listener = id,
                        panic = %panic_message(payload.as_ref()),
                        "listener panicked"
                    );
                }
            }
        }
        failures
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

trait DetachListener: Send + Sync {
    fn detach(&self) -> bool;
}

struct Detach<E> {
    registry: Weak<Mutex<RegistryInner<E>>>,
    id: u64,
}

impl<E> DetachListener for Detach<E> {
    fn detach(&self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(id, _)| *id != self.id);
        inner.listeners.len() != before
    }
}

/// Handle returned by [`ListenerRegistry::subscribe`].
///
/// Dropping the handle leaves the listener registered.
pub struct Subscription {
    detach: Box<dyn DetachListener>,
    active: AtomicBool,
}

impl Subscription {
    /// Deregister the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.detach.detach();
        }
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
