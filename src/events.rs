//! Eventing API.
//!
//! Closure-based, synchronous dispatch. Handlers run inline on the calling
//! thread; a handler that panics is caught and logged rather than
//! unwinding into `check()`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "permission:check:before")]
    PermissionCheckBefore,
    #[serde(rename = "permission:check:after")]
    PermissionCheckAfter,
    #[serde(rename = "role:assigned")]
    RoleAssigned,
    #[serde(rename = "role:unassigned")]
    RoleUnassigned,
    #[serde(rename = "permission:granted")]
    PermissionGranted,
    #[serde(rename = "permission:revoked")]
    PermissionRevoked,
    #[serde(rename = "permission:temporary:granted")]
    PermissionTemporaryGranted,
    #[serde(rename = "permission:temporary:revoked")]
    PermissionTemporaryRevoked,
    #[serde(rename = "permission:one-time:granted")]
    PermissionOneTimeGranted,
}

/// Event payload delivered to handlers; a generic JSON bag since each
/// `EventKind` carries a different shape.
pub type EventPayload = Value;

pub type Handler = Box<dyn Fn(&EventPayload) + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Registration>>,
    next_id: AtomicU64,
}

/// Opaque token returned by `on`/`once`, used to unregister with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event: EventKind, handler: Handler) -> HandlerId {
        self.register(event, handler, false)
    }

    pub fn once(&mut self, event: EventKind, handler: Handler) -> HandlerId {
        self.register(event, handler, true)
    }

    fn register(&mut self, event: EventKind, handler: Handler, once: bool) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.entry(event).or_default().push(Registration { id, handler, once });
        HandlerId(id)
    }

    pub fn off(&mut self, event: EventKind, id: HandlerId) {
        if let Some(list) = self.handlers.get_mut(&event) {
            list.retain(|r| r.id != id.0);
        }
    }

    /// Dispatches `payload` to every handler registered for `event`,
    /// isolating panics and removing `once` handlers after they fire.
    pub fn emit(&mut self, event: EventKind, payload: &EventPayload) {
        let Some(list) = self.handlers.get_mut(&event) else {
            return;
        };

        let mut fired_once = Vec::new();
        for registration in list.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| (registration.handler)(payload)));
            if let Err(_panic) = result {
                tracing::error!(event = ?event, "event handler panicked");
            }
            if registration.once {
                fired_once.push(registration.id);
            }
        }

        if !fired_once.is_empty() {
            list.retain(|r| !fired_once.contains(&r.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn on_handler_fires_every_emit() {
        let mut bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let counted = count.clone();
        bus.on(
            EventKind::PermissionCheckAfter,
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(EventKind::PermissionCheckAfter, &json!({}));
        bus.emit(EventKind::PermissionCheckAfter, &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_handler_fires_exactly_once() {
        let mut bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let counted = count.clone();
        bus.once(
            EventKind::RoleAssigned,
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(EventKind::RoleAssigned, &json!({}));
        bus.emit(EventKind::RoleAssigned, &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_unregisters_a_handler() {
        let mut bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let counted = count.clone();
        let id = bus.on(
            EventKind::PermissionGranted,
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.off(EventKind::PermissionGranted, id);
        bus.emit(EventKind::PermissionGranted, &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_others_or_propagate() {
        let mut bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let counted = count.clone();

        bus.on(EventKind::PermissionRevoked, Box::new(|_| panic!("boom")));
        bus.on(
            EventKind::PermissionRevoked,
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(EventKind::PermissionRevoked, &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
