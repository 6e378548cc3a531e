//! The controller core: owns the event nexus, the manager and the connection table, and
//! drives every inbound message through the bypass handlers.
//!
//! All mutation happens inside [`Controller::handle_message`] and
//! [`Controller::connection_closed`], which run to completion on the event-loop thread; I/O
//! tasks never touch the database directly.

use crate::conn::{ConnId, Connection, HandshakeState};
use crate::event::{Event, Nexus};
use crate::handlers;
use crate::manager::{MessageSink, PofManager};
use crate::wire::Message;
use std::collections::HashMap;
use std::rc::Rc;

/// The assembled controller core.
pub struct Controller {
    /// The manager façade (database + switch handles).
    pub manager: PofManager,
    /// The event dispatcher.
    pub nexus: Nexus,
    connections: HashMap<ConnId, Connection>,
    next_conn_id: u64,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    /// A fresh controller with the default ERROR logger installed.
    pub fn new() -> Self {
        let mut nexus = Nexus::new();

        // Default listener: surface switch-reported errors in the log.
        nexus.add_listener(Box::new(|_, ctx| {
            if let Event::ErrorIn { device_id, error } = ctx.event {
                log::error!(
                    "switch {:#x} error: {} {}",
                    device_id,
                    error.describe(),
                    String::from_utf8_lossy(&error.data)
                );
            }

            Ok(())
        }));

        Self {
            manager: PofManager::new(),
            nexus,
            connections: HashMap::new(),
            next_conn_id: 0,
        }
    }

    /// Allocate a connection id and register fresh per-connection state.
    pub fn open_connection(&mut self) -> ConnId {
        self.next_conn_id += 1;

        let id = ConnId(self.next_conn_id);
        self.connections.insert(id, Connection::new(id));

        id
    }

    /// Borrow one connection's state.
    pub fn connection(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Mutably borrow one connection's state.
    pub fn connection_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Dispatch one decoded inbound message through the bypass handlers.
    pub fn handle_message(&mut self, conn_id: ConnId, sink: &Rc<dyn MessageSink>, message: Message) {
        handlers::dispatch(self, conn_id, sink, message);
    }

    /// Raise an event on the nexus (and the per-connection scope when `conn` is given).
    pub fn raise(&mut self, conn: Option<ConnId>, event: Event) {
        self.nexus.raise(&mut self.manager, conn, &event);
    }

    /// Tear down a connection: raise ConnectionDown exactly once and drop all switch state.
    pub fn connection_closed(&mut self, conn_id: ConnId) {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return;
        };

        if conn.state == HandshakeState::Down {
            return;
        }

        conn.state = HandshakeState::Down;
        let device_id = conn.device_id;

        if let Some(device_id) = device_id {
            self.manager.remove_switch(device_id);
            self.manager.database_mut().remove_switch(device_id);

            log::info!("[{:#x} {}] disconnected", device_id, conn_id);

            self.raise(Some(conn_id), Event::ConnectionDown { device_id });
        } else {
            log::info!("[{}] disconnected before handshake", conn_id);
        }

        self.nexus.forget_connection(conn_id);
        self.connections.remove(&conn_id);
    }
}

impl core::fmt::Debug for Controller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("connections", &self.connections.len())
            .finish()
    }
}
