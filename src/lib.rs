//! A Protocol-Oblivious Forwarding (POF) SDN controller core.
//!
//! `pofctl` accepts TCP connections from POF forwarding devices, drives each through the
//! version/features/ports handshake, and exposes a manager API through which controller
//! applications define protocols and fields, create flow tables, install flow entries with
//! instructions and actions, allocate counters/meters/groups, and enable ports. Every
//! high-level call is mirrored into the in-memory PM database *and* emitted as a binary
//! control message to the right switch; inbound messages are decoded into typed records and
//! fanned out as events.
//!
//! # Architecture
//!
//! - [`wire`] — the POF codec: fixed-layout pack/unpack of every catalogued message, match,
//!   action and instruction (wire version `0x04`, big endian).
//! - [`conn`] — per-connection framing and the handshake state machine.
//! - [`listener`] — the accept loop, per-connection tasks and the deferred sender, all on
//!   one single-threaded executor.
//! - [`event`] — the nexus: synchronous typed publish/subscribe with halt semantics.
//! - [`db`] — the PM database: protocols, fields, metadata and per-switch pipeline state
//!   with deterministic smallest-first id pools.
//! - [`manager`] — the façade composing database mutation with wire emission.
//! - [`handlers`] — the message-type dispatch wiring inbound messages into all of the above.
//!
//! # Example
//!
//! ```rust,no_run
//! use pofctl::config::{PofConfig, Timeouts};
//! use pofctl::controller::Controller;
//! use pofctl::event::Event;
//! use pofctl::listener::PofListener;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let controller = Rc::new(RefCell::new(Controller::new()));
//!
//! // React to switches completing their handshake.
//! controller.borrow_mut().nexus.add_listener(Box::new(|_manager, ctx| {
//!     if let Event::ConnectionUp { device_id, .. } = ctx.event {
//!         log::info!("switch {:#x} is up", device_id);
//!     }
//!
//!     Ok(())
//! }));
//!
//! let (_stop, shutdown) = smol::channel::bounded(1);
//! let listener = PofListener::new(PofConfig::default(), Timeouts::default());
//!
//! listener.run(controller, shutdown).unwrap();
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod conn;
pub mod controller;
pub mod db;
pub mod error;
pub mod event;
pub mod handlers;
pub mod listener;
pub mod manager;
pub mod snapshot;
pub mod wire;
pub mod xid;

pub use config::{PofConfig, Timeouts};
pub use controller::Controller;
pub use error::Error;
pub use event::Event;
pub use listener::PofListener;
pub use manager::{MessageSink, PofManager, SwitchHandle};
