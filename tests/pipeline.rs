//! Driving the manager API end to end over an emulated switch: table and entry lifecycle,
//! cascading deletes, port enablement.

mod util;

use pofctl::db::FIRST_ENTRY_TABLE_NAME;
use pofctl::wire::{
    FlowModCommand, Match20, Message, PhyPort, TableModCommand, TableType,
};
use util::{Harness, DEVICE};

fn dmac_field(harness: &mut Harness) -> Match20 {
    let field_id = harness.controller.manager.new_field("DMAC", 0, 48);

    harness
        .controller
        .manager
        .database()
        .field(field_id)
        .unwrap()
        .descriptor()
}

#[test]
fn first_table_and_entry_get_id_zero() {
    let mut harness = Harness::new();
    harness.complete_handshake();
    harness.capture.clear();

    let field = dmac_field(&mut harness);

    let global_id = harness
        .controller
        .manager
        .add_flow_table(DEVICE, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, &[field])
        .unwrap();

    assert_eq!(global_id, 0);

    // One 152-byte TABLE_MOD(ADD) went out.
    let bytes = harness.capture.sent_bytes();
    assert_eq!(bytes.len(), 1);
    assert_eq!(bytes[0].len(), 152);
    // command / table_id / table_type right after the header.
    assert_eq!(&bytes[0][8..11], &[0, 0, 0]);

    let matchx = harness
        .controller
        .manager
        .new_matchx(field.field_id, "0026b954ee0f", "ffffffffffff")
        .unwrap();

    let output = harness.controller.manager.new_action_output(2, 0, 0, 0);
    let apply = harness
        .controller
        .manager
        .new_ins_apply_actions(&[output])
        .unwrap();

    let entry_id = harness
        .controller
        .manager
        .add_flow_entry(DEVICE, global_id, &[matchx], &[apply], 0, true)
        .unwrap();

    assert_eq!(entry_id, 0);

    let bytes = harness.capture.sent_bytes();
    assert_eq!(bytes.len(), 2);
    assert_eq!(bytes[1].len(), 2192);
    // FLOW_MOD(ADD) with one match and one instruction.
    assert_eq!(&bytes[1][8..11], &[0, 1, 1]);
}

#[test]
fn cascading_delete_emits_entries_then_table() {
    let mut harness = Harness::new();
    harness.complete_handshake();

    let field = dmac_field(&mut harness);

    let global_id = harness
        .controller
        .manager
        .add_flow_table(DEVICE, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, &[field])
        .unwrap();

    let matchx = harness
        .controller
        .manager
        .new_matchx(field.field_id, "0026b954ee0f", "ffffffffffff")
        .unwrap();

    for _ in 0..3 {
        harness
            .controller
            .manager
            .add_flow_entry(DEVICE, global_id, &[matchx], &[], 0, false)
            .unwrap();
    }

    harness.capture.clear();

    harness
        .controller
        .manager
        .del_flow_table_and_all_sub_entries(DEVICE, global_id)
        .unwrap();

    let sent = harness.capture.sent();
    assert_eq!(sent.len(), 4);

    for message in &sent[0..3] {
        match message {
            Message::FlowMod(entry) => assert_eq!(entry.command, FlowModCommand::Delete),
            other => panic!("expected FlowMod, got {:?}", other.kind()),
        }
    }

    match &sent[3] {
        Message::TableMod(table_mod) => {
            assert_eq!(table_mod.table.command, TableModCommand::Delete)
        }
        other => panic!("expected TableMod, got {:?}", other.kind()),
    }

    // Controller-side state is fully released.
    let manager = &harness.controller.manager;
    assert!(manager.get_flow_table(DEVICE, global_id).is_err());
    assert!(manager
        .database()
        .flow_entries(DEVICE, global_id)
        .is_none());
    assert_eq!(
        manager
            .database()
            .switch(DEVICE)
            .unwrap()
            .free_table_ids(TableType::Mm),
        vec![0]
    );
}

#[test]
fn deleted_table_id_is_reused_for_the_next_table() {
    let mut harness = Harness::new();
    harness.complete_handshake();

    let field = dmac_field(&mut harness);
    let manager = &mut harness.controller.manager;

    let first = manager
        .add_flow_table(DEVICE, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, &[field])
        .unwrap();
    let second = manager
        .add_flow_table(DEVICE, "NextTable", TableType::Mm, 32, &[field])
        .unwrap();

    assert_eq!((first, second), (0, 1));

    manager.del_flow_table_and_all_sub_entries(DEVICE, second).unwrap();

    // Smallest freed id comes back first.
    let again = manager
        .add_flow_table(DEVICE, "NextTableAgain", TableType::Mm, 32, &[field])
        .unwrap();

    assert_eq!(again, 1);
}

#[test]
fn port_enable_flips_the_byte_on_the_wire() {
    let mut harness = Harness::new();
    harness.complete_handshake();
    harness.capture.clear();

    harness
        .controller
        .manager
        .set_port_of_enable(DEVICE, 2, true)
        .unwrap();

    // The cache reflects the change.
    assert!(
        harness
            .controller
            .manager
            .get_port_status(DEVICE, 2)
            .unwrap()
            .desc
            .of_enable
    );

    // One PORT_MOD(MODIFY) carrying the mutated port.
    let bytes = harness.capture.sent_bytes();
    assert_eq!(bytes.len(), 1);
    assert_eq!(bytes[0].len(), 136);
    // reason byte.
    assert_eq!(bytes[0][8], 2);
    // of_enable inside the port area (after header + reason/pad).
    assert_eq!(bytes[0][16 + PhyPort::OF_ENABLE_OFFSET], 1);
}

#[test]
fn table_id_translation_round_trips() {
    let mut harness = Harness::new();
    harness.complete_handshake();

    let manager = &harness.controller.manager;

    // 8 tables of each type declared by the canned resource report.
    for (slot, table_type) in TableType::ALL.into_iter().enumerate() {
        for local in 0..8u8 {
            let global = manager
                .parse_to_global_table_id(DEVICE, table_type, local)
                .unwrap();

            assert_eq!(global, (slot as u32) * 8 + u32::from(local));
            assert_eq!(
                manager.parse_to_small_table_id(DEVICE, global).unwrap(),
                (table_type, local)
            );
        }
    }
}
