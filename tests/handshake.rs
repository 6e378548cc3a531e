//! Replaying the connection handshake from raw bytes: the happy path and the bad-version
//! teardown.

mod util;

use pofctl::event::Event;
use pofctl::wire::message::PacketIn;
use pofctl::wire::{Message, MessageKind};
use pofctl_wire::PofWireWrite;
use util::{features_reply, port_status, resource_report, Harness, DEVICE};

#[test]
fn handshake_raises_exactly_one_connection_up() {
    let mut harness = Harness::new();

    // The controller's HELLO went out on accept: 8 bytes, version 4.
    let hello = harness.capture.sent_bytes()[0].clone();
    assert_eq!(hello.len(), 8);
    assert_eq!(hello[0], 0x04);
    assert_eq!(hello[1], u8::from(MessageKind::Hello));
    assert_eq!(&hello[4..8], &[0, 0, 0, 1]);

    // Switch sends its 216-byte FEATURES_REPLY.
    let features = Message::FeaturesReply(features_reply(2)).pack_vec();
    assert_eq!(features.len(), 216);
    assert!(harness.feed(&features).is_none());

    // The controller answers with SET_CONFIG and GET_CONFIG_REQUEST.
    let kinds: Vec<MessageKind> = harness.capture.sent().iter().map(Message::kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::Hello,
            MessageKind::SetConfig,
            MessageKind::GetConfigRequest
        ]
    );

    // Not up yet: only one of two ports has reported.
    harness.feed_message(Message::PortStatus(port_status(1)));
    assert_eq!(
        harness.count_events(|e| matches!(e, Event::ConnectionUp { .. })),
        0
    );

    harness.feed_message(Message::PortStatus(port_status(2)));
    harness.feed_message(Message::ResourceReport(resource_report()));

    assert_eq!(
        harness.count_events(
            |e| matches!(e, Event::ConnectionUp { device_id, .. } if *device_id == DEVICE)
        ),
        1
    );

    // The resource map is installed with all four table resources.
    let db = harness.controller.manager.database();
    let resources = db.switch(DEVICE).unwrap().resources(0).unwrap();
    assert_eq!(resources.table_resources.len(), 4);

    // The cached port is queryable.
    let port = harness
        .controller
        .manager
        .get_port_status(DEVICE, 2)
        .unwrap();
    assert_eq!(port.desc.name, "eth2");
    assert_eq!(
        harness.controller.manager.get_port_id_by_name(DEVICE, "eth2").unwrap(),
        2
    );
}

#[test]
fn features_reply_split_across_segments_reassembles() {
    let mut harness = Harness::new();
    let features = Message::FeaturesReply(features_reply(1)).pack_vec();

    // Arbitrary TCP segmentation: 3 fragments.
    assert!(harness.feed(&features[..100]).is_none());
    assert!(harness.feed(&features[100..200]).is_none());
    assert!(harness.feed(&features[200..]).is_none());

    assert_eq!(
        harness.count_events(|e| matches!(e, Event::FeaturesReceived { .. })),
        1
    );
}

#[test]
fn bad_version_packet_in_tears_the_connection_down() {
    let mut harness = Harness::new();
    harness.complete_handshake();

    // A PACKET_IN whose header claims version 3: length 40 = 32 fixed + 8 payload bytes.
    let mut frame = Message::PacketIn(PacketIn {
        total_len: 8,
        device_id: DEVICE,
        data: vec![0xaa; 8],
        ..PacketIn::default()
    })
    .pack_vec();

    assert_eq!(frame.len(), 40);
    frame[0] = 0x03;

    let teardown = harness.feed(&frame);

    assert!(teardown.is_some());

    // No PacketIn event came through, and exactly one ConnectionDown did.
    assert_eq!(
        harness.count_events(|e| matches!(e, Event::PacketIn { .. })),
        0
    );
    assert_eq!(
        harness.count_events(
            |e| matches!(e, Event::ConnectionDown { device_id } if *device_id == DEVICE)
        ),
        1
    );

    // The switch and its state are gone.
    assert!(!harness.controller.manager.is_connected(DEVICE));
    assert!(harness.controller.manager.database().switch(DEVICE).is_err());
}

#[test]
fn echo_request_from_switch_is_answered_in_kind() {
    let mut harness = Harness::new();
    harness.complete_handshake();
    harness.capture.clear();

    harness.feed_message(Message::EchoRequest(pofctl::wire::message::EchoRequest {
        xid: 0x55,
        body: b"ping".to_vec(),
    }));

    let sent = harness.capture.sent();
    assert_eq!(sent.len(), 1);

    match &sent[0] {
        Message::EchoReply(reply) => {
            assert_eq!(reply.xid, 0x55);
            assert_eq!(reply.body, b"ping");
        }
        other => panic!("expected EchoReply, got {:?}", other.kind()),
    }
}

#[test]
fn packet_in_surfaces_after_handshake() {
    let mut harness = Harness::new();
    harness.complete_handshake();

    harness.feed_message(Message::PacketIn(PacketIn {
        total_len: 64,
        device_id: DEVICE,
        slot_port_id: 2,
        data: vec![0xbb; 64],
        ..PacketIn::default()
    }));

    assert_eq!(
        harness.count_events(|e| matches!(
            e,
            Event::PacketIn { device_id, packet }
                if *device_id == DEVICE && packet.data.len() == 64
        )),
        1
    );
}
