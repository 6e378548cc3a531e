//! Bypass handlers: the message-type dispatch wiring inbound messages into the database,
//! the handshake state machine and the event nexus.

use crate::conn::ConnId;
use crate::controller::Controller;
use crate::event::Event;
use crate::manager::{MessageSink, SwitchHandle};
use crate::wire::message::{FeaturesRequest, GetConfigRequest, SetConfig};
use crate::wire::{CounterModCommand, Message, MessageKind, PortReason};
use std::rc::Rc;

/// Dispatch one inbound message.
///
/// Unknown or controller-to-switch types arriving from a switch are logged and dropped;
/// handler work always runs to completion without yielding.
pub fn dispatch(
    ctrl: &mut Controller,
    conn_id: ConnId,
    sink: &Rc<dyn MessageSink>,
    message: Message,
) {
    match message {
        Message::Hello(_) => handle_hello(ctrl, sink),
        Message::EchoRequest(request) => {
            if let Err(e) = sink.send_message(&Message::EchoReply(request.reply())) {
                log::warn!("{}: echo reply failed: {}", conn_id, e);
            }
        }
        Message::EchoReply(reply) => {
            // Liveness bookkeeping happened in the framing layer; just settle the xid.
            if let Some(conn) = ctrl.connection_mut(conn_id) {
                conn.complete_request(reply.xid);
            }
        }
        Message::FeaturesReply(features) => handle_features_reply(ctrl, conn_id, sink, features),
        Message::GetConfigReply(reply) => {
            let device_id = reply.device_id;

            if let Some(conn) = ctrl.connection_mut(conn_id) {
                conn.complete_request(reply.xid);
            }

            ctrl.raise(Some(conn_id), Event::GetConfigReply { device_id, reply });
        }
        Message::PortStatus(status) => handle_port_status(ctrl, conn_id, status),
        Message::ResourceReport(report) => handle_resource_report(ctrl, conn_id, report),
        Message::PacketIn(packet) => {
            let device_id = device_of(ctrl, conn_id);

            ctrl.raise(Some(conn_id), Event::PacketIn { device_id, packet });
        }
        Message::Error(error) => {
            let device_id = error.device_id;

            ctrl.raise(Some(conn_id), Event::ErrorIn { device_id, error });
        }
        Message::FlowRemoved(removed) => {
            let device_id = device_of(ctrl, conn_id);

            ctrl.raise(Some(conn_id), Event::FlowRemoved { device_id, removed });
        }
        Message::BarrierReply(reply) => {
            let device_id = device_of(ctrl, conn_id);

            ctrl.raise(
                Some(conn_id),
                Event::BarrierIn {
                    device_id,
                    xid: reply.xid,
                },
            );
        }
        Message::CounterReply(carrier) => {
            let device_id = device_of(ctrl, conn_id);
            let mut counter = carrier.counter;

            counter.command = CounterModCommand::QueryReply;

            if let Err(e) = ctrl.manager.database_mut().set_counter(device_id, counter) {
                log::warn!("{}: stale counter reply: {}", conn_id, e);
            }

            ctrl.raise(Some(conn_id), Event::CounterReply { device_id, counter });
        }
        Message::MultipartRequest(msg) => raise_raw(ctrl, conn_id, MessageKind::MultipartRequest, msg.xid),
        Message::MultipartReply(msg) => raise_raw(ctrl, conn_id, MessageKind::MultipartReply, msg.xid),
        Message::Experimenter(msg) => raise_raw(ctrl, conn_id, MessageKind::Experimenter, msg.xid),
        other => {
            log::warn!(
                "{}: unexpected {:?} from switch; dropping",
                conn_id,
                other.kind()
            );
        }
    }
}

fn device_of(ctrl: &Controller, conn_id: ConnId) -> u32 {
    ctrl.connection(conn_id)
        .and_then(|conn| conn.device_id)
        .unwrap_or_default()
}

fn raise_raw(ctrl: &mut Controller, conn_id: ConnId, kind: MessageKind, xid: u32) {
    let device_id = device_of(ctrl, conn_id);

    ctrl.raise(Some(conn_id), Event::Raw { device_id, kind, xid });
}

/// HELLO: ask for the peer's features.
fn handle_hello(ctrl: &mut Controller, sink: &Rc<dyn MessageSink>) {
    let xid = ctrl.manager.next_xid();

    if let Err(e) = sink.send_message(&Message::FeaturesRequest(FeaturesRequest::new(xid))) {
        log::warn!("features request failed: {}", e);
    }
}

/// FEATURES_REPLY: install the device, configure it, and arm the port-status countdown.
fn handle_features_reply(
    ctrl: &mut Controller,
    conn_id: ConnId,
    sink: &Rc<dyn MessageSink>,
    features: crate::wire::message::FeaturesReply,
) {
    let device_id = features.device_id;

    if let Some(conn) = ctrl.connection_mut(conn_id) {
        conn.features_received(features.clone());
    }

    // A reconnecting device starts from clean state.
    if ctrl.manager.database().switch(device_id).is_err() {
        if let Err(e) = ctrl.manager.database_mut().add_switch(device_id) {
            log::error!("{}: install switch {:#x}: {}", conn_id, device_id, e);

            return;
        }
    }

    if let Err(e) = ctrl
        .manager
        .database_mut()
        .set_features(device_id, features.clone())
    {
        log::error!("{}: install features: {}", conn_id, e);
    }

    ctrl.manager
        .add_switch(SwitchHandle::new(device_id, Rc::clone(sink)));

    // Raise the punted-packet size before asking for the configuration back.
    let set_config = Message::SetConfig(SetConfig {
        xid: ctrl.manager.next_xid(),
        flags: 0,
        miss_send_len: 0xffff,
    });

    let get_config = Message::GetConfigRequest(GetConfigRequest::new(ctrl.manager.next_xid()));

    for message in [&set_config, &get_config] {
        if let Err(e) = sink.send_message(message) {
            log::warn!("{}: handshake send failed: {}", conn_id, e);
        }
    }

    if let Some(conn) = ctrl.connection_mut(conn_id) {
        conn.track_request(get_config.xid(), MessageKind::GetConfigRequest);
    }

    ctrl.raise(
        Some(conn_id),
        Event::FeaturesReceived {
            device_id,
            features,
        },
    );
}

/// PORT_STATUS: maintain the port cache and count down the handshake.
fn handle_port_status(
    ctrl: &mut Controller,
    conn_id: ConnId,
    status: crate::wire::message::PortStatus,
) {
    let device_id = device_of(ctrl, conn_id);

    let result = if status.reason == PortReason::Delete {
        ctrl.manager
            .database_mut()
            .delete_port_status(device_id, status.desc.port_id)
    } else {
        ctrl.manager
            .database_mut()
            .set_port_status(device_id, status.clone())
    };

    if let Err(e) = result {
        log::warn!("{}: port status: {}", conn_id, e);
    }

    ctrl.raise(
        Some(conn_id),
        Event::PortStatus {
            device_id,
            status,
        },
    );

    let completed = ctrl
        .connection_mut(conn_id)
        .map(|conn| conn.port_status_received())
        .unwrap_or(false);

    if completed {
        ctrl.manager.mark_connected(device_id);

        let features = ctrl
            .connection(conn_id)
            .and_then(|conn| conn.features.clone())
            .unwrap_or_default();

        log::info!("[{:#x} {}] connected", device_id, conn_id);

        ctrl.raise(
            Some(conn_id),
            Event::ConnectionUp {
                device_id,
                features,
            },
        );
    }
}

/// RESOURCE_REPORT: install the resource map, compute table-id bases, start the keepalive.
fn handle_resource_report(
    ctrl: &mut Controller,
    conn_id: ConnId,
    report: crate::wire::message::ResourceReport,
) {
    let device_id = device_of(ctrl, conn_id);

    if report.resource_type == 0 {
        if let Err(e) = ctrl
            .manager
            .database_mut()
            .set_resource_report(device_id, report.clone())
        {
            log::warn!("{}: resource report: {}", conn_id, e);
        }
    }

    if let Some(conn) = ctrl.connection_mut(conn_id) {
        conn.keepalive_started = true;
    }

    ctrl.raise(Some(conn_id), Event::ResourceReport { device_id, report });
}
