//! The event nexus: typed publish/subscribe fanning switch events out to application
//! components.
//!
//! Listeners run synchronously on the dispatch thread, in registration order, first at the
//! nexus scope and then at the per-connection scope. A listener may halt the event to
//! suppress delivery to later listeners; listener failures are logged and never propagated.

use crate::conn::ConnId;
use crate::error::Error;
use crate::manager::PofManager;
use crate::wire::message::{ErrorMsg, FeaturesReply, FlowRemoved, GetConfigReply, PacketIn,
    PortStatus, ResourceReport};
use crate::wire::{Counter, MessageKind};
use std::collections::HashMap;

/// A typed controller event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A switch finished its handshake and is usable.
    ConnectionUp {
        /// The switch.
        device_id: u32,
        /// Features it reported.
        features: FeaturesReply,
    },
    /// A switch connection went away.
    ConnectionDown {
        /// The switch.
        device_id: u32,
    },
    /// A FEATURES_REPLY arrived (also fired on re-handshake of a known switch).
    FeaturesReceived {
        /// The switch.
        device_id: u32,
        /// The reply.
        features: FeaturesReply,
    },
    /// A port appeared, changed, or went away.
    PortStatus {
        /// The switch.
        device_id: u32,
        /// The port status message.
        status: PortStatus,
    },
    /// A switch reported its table/counter/meter/group resources.
    ResourceReport {
        /// The switch.
        device_id: u32,
        /// The report.
        report: ResourceReport,
    },
    /// A packet was punted to the controller.
    PacketIn {
        /// The switch.
        device_id: u32,
        /// The punted packet.
        packet: PacketIn,
    },
    /// A switch reported an error.
    ErrorIn {
        /// The switch.
        device_id: u32,
        /// The error.
        error: ErrorMsg,
    },
    /// A GET_CONFIG_REPLY arrived.
    GetConfigReply {
        /// The switch.
        device_id: u32,
        /// The reply.
        reply: GetConfigReply,
    },
    /// A flow entry expired or was removed switch-side.
    FlowRemoved {
        /// The switch.
        device_id: u32,
        /// Details of the removed entry.
        removed: FlowRemoved,
    },
    /// A BARRIER_REPLY arrived.
    BarrierIn {
        /// The switch.
        device_id: u32,
        /// Transaction id of the barrier.
        xid: u32,
    },
    /// A COUNTER_REPLY arrived in response to a query.
    CounterReply {
        /// The switch.
        device_id: u32,
        /// The counter value.
        counter: Counter,
    },
    /// A message with framing-only support (multipart) arrived.
    Raw {
        /// The switch.
        device_id: u32,
        /// The message type.
        kind: MessageKind,
        /// Transaction id.
        xid: u32,
    },
}

/// Mutable per-dispatch context handed to each listener.
#[derive(Debug)]
pub struct EventCtx<'a> {
    /// The event being dispatched.
    pub event: &'a Event,
    halted: bool,
}

impl<'a> EventCtx<'a> {
    fn new(event: &'a Event) -> Self {
        Self {
            event,
            halted: false,
        }
    }

    /// Stop delivery to later listeners at the current and following scopes.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// Whether a previous listener halted the event.
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

/// A registered listener.
pub type Listener = Box<dyn FnMut(&mut PofManager, &mut EventCtx<'_>) -> Result<(), Error>>;

/// The per-process event dispatcher.
#[derive(Default)]
pub struct Nexus {
    global: Vec<Listener>,
    per_conn: HashMap<ConnId, Vec<Listener>>,
}

impl Nexus {
    /// Create an empty nexus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener at the nexus scope.
    pub fn add_listener(&mut self, listener: Listener) {
        self.global.push(listener);
    }

    /// Register a listener scoped to one connection.
    pub fn add_connection_listener(&mut self, conn: ConnId, listener: Listener) {
        self.per_conn.entry(conn).or_default().push(listener);
    }

    /// Drop all listeners scoped to `conn`.
    pub fn forget_connection(&mut self, conn: ConnId) {
        self.per_conn.remove(&conn);
    }

    /// Dispatch `event`: nexus scope first, then `conn`'s scope, unless halted.
    ///
    /// Listener errors are logged and swallowed so one misbehaving component cannot break
    /// the event loop or starve later listeners.
    pub fn raise(&mut self, manager: &mut PofManager, conn: Option<ConnId>, event: &Event) {
        let mut ctx = EventCtx::new(event);

        for listener in &mut self.global {
            if ctx.is_halted() {
                return;
            }

            if let Err(e) = listener(manager, &mut ctx) {
                log::error!("event listener failed: {}", e);
            }
        }

        if let Some(listeners) = conn.and_then(|id| self.per_conn.get_mut(&id)) {
            for listener in listeners {
                if ctx.is_halted() {
                    return;
                }

                if let Err(e) = listener(manager, &mut ctx) {
                    log::error!("connection event listener failed: {}", e);
                }
            }
        }
    }
}

impl core::fmt::Debug for Nexus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Nexus")
            .field("global", &self.global.len())
            .field("per_conn", &self.per_conn.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_event() -> Event {
        Event::ConnectionDown { device_id: 7 }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut nexus = Nexus::new();
        let mut manager = PofManager::new();

        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);

            nexus.add_listener(Box::new(move |_, _| {
                order.borrow_mut().push(tag);
                Ok(())
            }));
        }

        nexus.raise(&mut manager, None, &test_event());

        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn halt_suppresses_later_listeners() {
        let seen = Rc::new(RefCell::new(0));
        let mut nexus = Nexus::new();
        let mut manager = PofManager::new();

        nexus.add_listener(Box::new(|_, ctx| {
            ctx.halt();
            Ok(())
        }));

        {
            let seen = Rc::clone(&seen);

            nexus.add_listener(Box::new(move |_, _| {
                *seen.borrow_mut() += 1;
                Ok(())
            }));
        }

        nexus.raise(&mut manager, None, &test_event());

        assert_eq!(*seen.borrow(), 0);
    }

    #[test]
    fn listener_errors_are_isolated() {
        let seen = Rc::new(RefCell::new(0));
        let mut nexus = Nexus::new();
        let mut manager = PofManager::new();

        nexus.add_listener(Box::new(|_, _| {
            Err(Error::InvalidArgument("deliberate"))
        }));

        {
            let seen = Rc::clone(&seen);

            nexus.add_listener(Box::new(move |_, _| {
                *seen.borrow_mut() += 1;
                Ok(())
            }));
        }

        nexus.raise(&mut manager, None, &test_event());

        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn connection_scope_runs_after_nexus_scope() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut nexus = Nexus::new();
        let mut manager = PofManager::new();
        let conn = ConnId(1);

        {
            let order = Rc::clone(&order);
            nexus.add_connection_listener(
                conn,
                Box::new(move |_, _| {
                    order.borrow_mut().push("conn");
                    Ok(())
                }),
            );
        }

        {
            let order = Rc::clone(&order);
            nexus.add_listener(Box::new(move |_, _| {
                order.borrow_mut().push("nexus");
                Ok(())
            }));
        }

        nexus.raise(&mut manager, Some(conn), &test_event());

        assert_eq!(*order.borrow(), vec!["nexus", "conn"]);
    }
}
