//! Utilities to replay canned switch byte streams through the connection state machine as
//! part of integration tests, without any real sockets.

// Not every test file uses every helper.
#![allow(dead_code)]

use pofctl::conn::ConnId;
use pofctl::controller::Controller;
use pofctl::error::Error;
use pofctl::event::Event;
use pofctl::manager::MessageSink;
use pofctl::wire::message::{FeaturesReply, PortStatus, ResourceReport};
use pofctl::wire::table::TableResource;
use pofctl::wire::{Message, PhyPort, PortReason, TableType, MAX_TABLE_TYPES};
use pofctl_wire::PofWireWrite;
use std::cell::RefCell;
use std::rc::Rc;

/// The device id used by the canned switch.
pub const DEVICE: u32 = 0x8404_5e6e;

/// A message sink that records everything the controller sends.
#[derive(Default)]
pub struct CaptureSink {
    sent: RefCell<Vec<Message>>,
}

impl CaptureSink {
    /// All messages sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.borrow().clone()
    }

    /// Raw packed bytes of every message sent so far.
    pub fn sent_bytes(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().iter().map(|m| m.pack_vec()).collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }
}

impl MessageSink for CaptureSink {
    fn send_message(&self, message: &Message) -> Result<(), Error> {
        self.sent.borrow_mut().push(message.clone());

        Ok(())
    }
}

/// One controller plus one emulated switch connection.
pub struct Harness {
    /// The controller under test.
    pub controller: Controller,
    /// The emulated connection's id.
    pub conn_id: ConnId,
    /// Everything the controller sent to the switch.
    pub capture: Rc<CaptureSink>,
    /// Every event the nexus raised.
    pub events: Rc<RefCell<Vec<Event>>>,
    sink: Rc<dyn MessageSink>,
}

impl Harness {
    /// Accept one emulated connection; the controller's HELLO is considered sent.
    pub fn new() -> Self {
        let mut controller = Controller::new();
        let conn_id = controller.open_connection();

        let events = Rc::new(RefCell::new(Vec::new()));
        let record = Rc::clone(&events);

        controller.nexus.add_listener(Box::new(move |_, ctx| {
            record.borrow_mut().push(ctx.event.clone());

            Ok(())
        }));

        let capture = Rc::new(CaptureSink::default());
        let sink: Rc<dyn MessageSink> = capture.clone();

        let hello = Message::Hello(pofctl::wire::message::Hello::new(
            controller.manager.next_xid(),
        ));
        sink.send_message(&hello).unwrap();
        controller.connection_mut(conn_id).unwrap().hello_sent();

        Self {
            controller,
            conn_id,
            capture,
            events,
            sink,
        }
    }

    /// Feed raw switch→controller bytes through framing and dispatch.
    ///
    /// Returns the teardown error if the stream poisoned the connection, in which case the
    /// connection is closed exactly as the I/O task would close it.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<Error> {
        let ingest = self
            .controller
            .connection_mut(self.conn_id)
            .expect("connection is open")
            .ingest(bytes);

        for message in ingest.messages {
            self.controller
                .handle_message(self.conn_id, &self.sink, message);
        }

        if ingest.teardown.is_some() {
            self.controller.connection_closed(self.conn_id);
        }

        ingest.teardown
    }

    /// Feed one message as its packed bytes.
    pub fn feed_message(&mut self, message: Message) -> Option<Error> {
        self.feed(&message.pack_vec())
    }

    /// Run the full handshake: features, `port_num` port statuses, resource report.
    pub fn complete_handshake(&mut self) {
        self.feed_message(Message::FeaturesReply(features_reply(2)));
        self.feed_message(Message::PortStatus(port_status(1)));
        self.feed_message(Message::PortStatus(port_status(2)));
        self.feed_message(Message::ResourceReport(resource_report()));
    }

    /// Count recorded events matching `matches`.
    pub fn count_events(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| matches(e)).count()
    }
}

/// A FEATURES_REPLY for the canned device with `port_num` ports.
pub fn features_reply(port_num: u16) -> FeaturesReply {
    FeaturesReply {
        xid: 1,
        device_id: DEVICE,
        slot_id: 0,
        port_num,
        table_num: 20,
        experimenter_name: "pofswitch".to_owned(),
        ..FeaturesReply::default()
    }
}

/// A boot-time PORT_STATUS for port `port_id`.
pub fn port_status(port_id: u32) -> PortStatus {
    PortStatus {
        xid: 0,
        reason: PortReason::Add,
        desc: PhyPort {
            port_id,
            device_id: DEVICE,
            hw_addr: [0, 0x26, 0xb9, 0x54, 0xee, port_id as u8],
            name: format!("eth{}", port_id),
            ..PhyPort::default()
        },
    }
}

/// A RESOURCE_REPORT declaring 8 tables of each type.
pub fn resource_report() -> ResourceReport {
    ResourceReport {
        xid: 2,
        resource_type: 0,
        slot_id: 0,
        counter_num: 128,
        meter_num: 64,
        group_num: 32,
        table_resources: core::array::from_fn::<_, MAX_TABLE_TYPES, _>(|i| TableResource {
            device_id: DEVICE,
            table_type: TableType::ALL[i],
            table_num: 8,
            key_length: 320,
            total_size: 256,
        }),
    }
}
