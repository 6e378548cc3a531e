//! The POF manager: the high-level API controller applications program against.
//!
//! Every mutating call validates its input, updates the PM database, packages the result
//! into the right wire message with the right command byte, hands it to the switch's
//! connection, and logs one line. Database state is committed before the message leaves, so
//! a query immediately after a call observes the new state even if the message is still
//! queued.

use crate::db::PmDatabase;
use crate::error::{Error, Item};
use crate::wire::instruction::JmpOffset;
use crate::wire::match_field::parse_hex;
use crate::wire::message::{
    CounterCarrier, FlowMod, GroupMod, Message, MeterMod, PacketOut, PortMod, PortStatus,
    TableMod,
};
use crate::wire::{
    Action, CalcType, Counter, CounterModCommand, DropReason, FlowModCommand, FlowTable,
    GroupModCommand, GroupType, Instruction, Match20, MatchX, MeterModCommand, PacketInReason,
    PortReason, TableModCommand, TableType, ValueOrField, MAX_ACTIONS, MAX_INSTRUCTIONS,
    MAX_MATCH_FIELDS, NO_BUFFER,
};
use crate::xid::XidGenerator;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

/// Where a switch's outbound messages go.
///
/// The connection layer implements this over its socket and deferred queue; tests implement
/// it with a capturing buffer.
pub trait MessageSink {
    /// Serialize and send one message towards the switch.
    fn send_message(&self, message: &Message) -> Result<(), Error>;
}

/// A connected switch as the manager sees it.
#[derive(Clone)]
pub struct SwitchHandle {
    /// The device id from FEATURES_REPLY.
    pub device_id: u32,
    /// When the handshake completed, if it has.
    pub connected_at: Option<Instant>,
    sink: Rc<dyn MessageSink>,
}

impl SwitchHandle {
    /// Wrap a message sink for `device_id`.
    pub fn new(device_id: u32, sink: Rc<dyn MessageSink>) -> Self {
        Self {
            device_id,
            connected_at: None,
            sink,
        }
    }
}

impl core::fmt::Debug for SwitchHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SwitchHandle")
            .field("device_id", &self.device_id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// The manager façade over the PM database and the connected switches.
#[derive(Debug)]
pub struct PofManager {
    database: PmDatabase,
    switches: BTreeMap<u32, SwitchHandle>,
    xids: XidGenerator,
    user_xids: XidGenerator,
}

impl Default for PofManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PofManager {
    /// A fresh manager with an empty database.
    pub fn new() -> Self {
        Self {
            database: PmDatabase::new(),
            switches: BTreeMap::new(),
            xids: XidGenerator::controller(),
            user_xids: XidGenerator::user(),
        }
    }

    /// Borrow the underlying database.
    pub fn database(&self) -> &PmDatabase {
        &self.database
    }

    /// Mutably borrow the underlying database.
    pub fn database_mut(&mut self) -> &mut PmDatabase {
        &mut self.database
    }

    /// Take a controller-side transaction id.
    pub fn next_xid(&self) -> u32 {
        self.xids.next()
    }

    /// Take a user-side transaction id (upper half of the xid space).
    pub fn next_user_xid(&self) -> u32 {
        self.user_xids.next()
    }

    // Switch handles

    /// Register a connected switch.
    pub fn add_switch(&mut self, handle: SwitchHandle) {
        self.switches.insert(handle.device_id, handle);
    }

    /// Mark a switch's handshake as complete.
    pub fn mark_connected(&mut self, device_id: u32) {
        if let Some(handle) = self.switches.get_mut(&device_id) {
            handle.connected_at = Some(Instant::now());
        }
    }

    /// Drop a switch handle.
    pub fn remove_switch(&mut self, device_id: u32) -> Option<SwitchHandle> {
        self.switches.remove(&device_id)
    }

    /// Whether a switch is currently connected.
    pub fn is_connected(&self, device_id: u32) -> bool {
        self.switches.contains_key(&device_id)
    }

    /// All connected switch ids, ascending.
    pub fn switch_ids(&self) -> Vec<u32> {
        self.switches.keys().copied().collect()
    }

    /// Send a pre-built message to a switch.
    pub fn write_of(&self, device_id: u32, message: &Message) -> Result<(), Error> {
        let handle = self.switches.get(&device_id).ok_or(Error::NotFound {
            item: Item::Switch,
            index: Some(u64::from(device_id)),
        })?;

        handle.sink.send_message(message)
    }

    // Protocols and fields

    /// Define a protocol over existing fields; returns the protocol id.
    pub fn add_protocol(&mut self, name: &str, field_ids: Vec<i16>) -> Result<u16, Error> {
        let protocol_id = self
            .database
            .add_protocol(name, field_ids)
            .inspect_err(|e| log::error!("add protocol {}: {}", name, e))?;

        log::info!("ADD <protocol[{}]> [NAME] {}", protocol_id, name);

        Ok(protocol_id)
    }

    /// Replace a protocol's field list.
    pub fn modify_protocol(&mut self, protocol_id: u16, field_ids: Vec<i16>) -> Result<(), Error> {
        self.database
            .modify_protocol(protocol_id, field_ids)
            .inspect_err(|e| log::error!("modify protocol {}: {}", protocol_id, e))
    }

    /// Delete a protocol and every field it owns.
    pub fn del_protocol(&mut self, protocol_id: u16) -> Result<(), Error> {
        let protocol = self
            .database
            .delete_protocol(protocol_id)
            .inspect_err(|e| log::error!("delete protocol {}: {}", protocol_id, e))?;

        log::info!("DELETE <protocol[{}]> [NAME] {}", protocol_id, protocol.name);

        Ok(())
    }

    /// Delete every protocol.
    pub fn del_all_protocols(&mut self) -> Result<(), Error> {
        let ids: Vec<u16> = self.database.protocols().map(|p| p.protocol_id).collect();

        for protocol_id in ids {
            self.del_protocol(protocol_id)?;
        }

        Ok(())
    }

    /// Create a field in the pool, returning its id.
    pub fn new_field(&mut self, name: &str, offset: u16, length: u16) -> i16 {
        let field_id = self.database.new_field(name, offset, length);

        log::info!(
            "ADD <field[{}]> [OFFSET] {} [LENGTH] {} [NAME] {}",
            field_id,
            offset,
            length,
            name
        );

        field_id
    }

    /// Update a field in place.
    pub fn modify_field(
        &mut self,
        field_id: i16,
        name: &str,
        offset: u16,
        length: u16,
    ) -> Result<(), Error> {
        self.database
            .modify_field(field_id, name, offset, length)
            .inspect_err(|e| log::error!("modify field {}: {}", field_id, e))
    }

    /// Delete a field from the pool.
    pub fn delete_field(&mut self, field_id: i16) -> Result<(), Error> {
        self.database
            .delete_field(field_id)
            .map(|_| ())
            .inspect_err(|e| log::error!("delete field {}: {}", field_id, e))
    }

    /// One protocol by id.
    pub fn get_protocol_by_id(&self, protocol_id: u16) -> Option<&crate::db::Protocol> {
        self.database.protocol(protocol_id)
    }

    /// One protocol by name.
    pub fn get_protocol_by_name(&self, name: &str) -> Option<&crate::db::Protocol> {
        self.database.protocol_by_name(name)
    }

    /// All protocols, ascending by id.
    pub fn get_all_protocols(&self) -> Vec<&crate::db::Protocol> {
        self.database.protocols().collect()
    }

    /// One field by pool id.
    pub fn get_field(&self, field_id: i16) -> Option<&crate::db::FieldDef> {
        self.database.field(field_id)
    }

    /// All fields named `name`, including a matching metadata field.
    pub fn get_fields_by_name(&self, name: &str) -> Vec<&crate::db::FieldDef> {
        self.database.fields_by_name(name)
    }

    /// All pool fields, ascending by id.
    pub fn get_all_fields(&self) -> Vec<&crate::db::FieldDef> {
        self.database.all_fields()
    }

    /// The protocol a field belongs to, if any.
    pub fn get_belonged_protocol(&self, field_id: i16) -> Option<&crate::db::Protocol> {
        self.database
            .protocols()
            .find(|protocol| protocol.field_ids.contains(&field_id))
    }

    // Metadata

    /// The ordered metadata list.
    pub fn get_metadata(&self) -> &[crate::db::FieldDef] {
        self.database.metadata()
    }

    /// One metadata field by name.
    pub fn get_metadata_field(&self, name: &str) -> Option<&crate::db::FieldDef> {
        self.database.metadata_field(name)
    }

    /// Replace the whole metadata list.
    pub fn modify_metadata(&mut self, metadata: Vec<crate::db::FieldDef>) {
        self.database.set_metadata(metadata);
    }

    /// Drop all metadata fields.
    pub fn remove_all_metadata(&mut self) {
        self.database.clear_metadata();
    }

    /// Append a metadata field.
    pub fn new_metadata_field(&mut self, name: &str, offset: u16, length: u16) -> Result<(), Error> {
        self.database
            .new_metadata_field(name, offset, length)
            .inspect(|_| {
                log::info!(
                    "ADD <metadata> [OFFSET] {} [LENGTH] {} [NAME] {}",
                    offset,
                    length,
                    name
                )
            })
            .inspect_err(|e| log::error!("add metadata {}: {}", name, e))
    }

    // Flow tables

    /// Create a flow table on a switch and announce it with TABLE_MOD(ADD).
    ///
    /// Returns the new global table id. The first table created on any switch must be the
    /// MM [`FIRST_ENTRY_TABLE_NAME`](crate::db::FIRST_ENTRY_TABLE_NAME); it receives global
    /// id 0.
    pub fn add_flow_table(
        &mut self,
        device_id: u32,
        table_name: &str,
        table_type: TableType,
        table_size: u32,
        match_fields: &[Match20],
    ) -> Result<u32, Error> {
        self.require_switch(device_id)?;

        let fields = bounded_fields(match_fields)?;

        let global_id = self
            .database
            .add_flow_table(device_id, table_name, table_type, table_size, fields)
            .inspect_err(|e| log::error!("add flow table {}: {}", table_name, e))?;

        let table = self.database.flow_table(device_id, global_id)?.clone();

        self.send_table_mod(device_id, table.clone())?;

        log::info!(
            "ADD <table[{}][{}]> [G_TID] {} [T_NAME] {}",
            table.table_type,
            table.table_id,
            global_id,
            table.table_name
        );

        Ok(global_id)
    }

    /// All tables installed on a switch.
    pub fn get_all_flow_tables(&self, device_id: u32) -> Result<Vec<&FlowTable>, Error> {
        Ok(self.database.switch(device_id)?.tables().values().collect())
    }

    /// One table by global id.
    pub fn get_flow_table(&self, device_id: u32, global_id: u32) -> Result<&FlowTable, Error> {
        self.database.flow_table(device_id, global_id)
    }

    /// Resolve a table's global id from its name.
    pub fn get_flow_table_id(&self, device_id: u32, table_name: &str) -> Result<u32, Error> {
        self.database.flow_table_id_by_name(device_id, table_name)
    }

    /// Delete a table that holds no entries, announcing TABLE_MOD(DELETE).
    ///
    /// Deleting a table that does not exist is a no-op; deleting one that still holds
    /// entries is a [`Error::Conflict`].
    pub fn del_empty_flow_table(&mut self, device_id: u32, global_id: u32) -> Result<(), Error> {
        self.require_switch(device_id)?;

        if self.database.flow_table(device_id, global_id).is_err() {
            return Ok(());
        }

        let mut table = self
            .database
            .delete_flow_table(device_id, global_id)
            .inspect_err(|e| log::error!("delete flow table {}: {}", global_id, e))?;

        table.command = TableModCommand::Delete;

        self.send_table_mod(device_id, table.clone())?;

        log::info!(
            "DELETE <table[{}][{}]> [G_TID] {} [T_NAME] {}",
            table.table_type,
            table.table_id,
            global_id,
            table.table_name
        );

        Ok(())
    }

    /// Delete a table and every entry in it: one FLOW_MOD(DELETE) per entry, then the
    /// TABLE_MOD(DELETE), in that order.
    pub fn del_flow_table_and_all_sub_entries(
        &mut self,
        device_id: u32,
        global_id: u32,
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let entry_ids = match self.database.flow_entries(device_id, global_id) {
            Some(entries) => entries.keys().copied().collect::<Vec<_>>(),
            None => return Ok(()),
        };

        for entry_id in entry_ids {
            self.delete_flow_entry(device_id, global_id, entry_id)?;
        }

        self.del_empty_flow_table(device_id, global_id)
    }

    /// Delete every table on a switch.
    pub fn del_all_flow_tables(&mut self, device_id: u32) -> Result<(), Error> {
        let global_ids: Vec<u32> = self
            .database
            .switch(device_id)?
            .tables()
            .keys()
            .copied()
            .collect();

        for global_id in global_ids {
            self.del_flow_table_and_all_sub_entries(device_id, global_id)?;
        }

        Ok(())
    }

    /// Translate a global table id to `(type, local id)`.
    pub fn parse_to_small_table_id(
        &self,
        device_id: u32,
        global_id: u32,
    ) -> Result<(TableType, u8), Error> {
        self.database.to_local_table_id(device_id, global_id)
    }

    /// Translate `(type, local id)` to the global table id.
    pub fn parse_to_global_table_id(
        &self,
        device_id: u32,
        table_type: TableType,
        local_id: u8,
    ) -> Result<u32, Error> {
        self.database.to_global_table_id(device_id, table_type, local_id)
    }

    // Flow entries

    /// Install a flow entry and announce it with FLOW_MOD(ADD); returns the entry id.
    pub fn add_flow_entry(
        &mut self,
        device_id: u32,
        global_id: u32,
        matches: &[MatchX],
        instructions: &[Instruction],
        priority: u16,
        counter_enable: bool,
    ) -> Result<u32, Error> {
        self.require_switch(device_id)?;

        let matches = bounded_matches(matches)?;
        let instructions = bounded_instructions(instructions)?;

        let entry_id = self
            .database
            .add_flow_entry(
                device_id,
                global_id,
                matches,
                instructions,
                priority,
                counter_enable,
            )
            .inspect_err(|e| log::error!("add flow entry: {}", e))?;

        let entry = self.database.flow_entry(device_id, global_id, entry_id)?.clone();

        self.send_flow_mod(device_id, entry.clone(), FlowModCommand::Add)?;

        log::info!(
            "ADD <entry[{}][{}][{}]>",
            entry.table_type,
            entry.table_id,
            entry.index
        );

        Ok(entry_id)
    }

    /// One entry of one table.
    pub fn get_flow_entry(
        &self,
        device_id: u32,
        global_id: u32,
        entry_id: u32,
    ) -> Result<&FlowMod, Error> {
        self.database.flow_entry(device_id, global_id, entry_id)
    }

    /// All entries of one table, ascending by entry id.
    pub fn get_all_flow_entries(&self, device_id: u32, global_id: u32) -> Result<Vec<&FlowMod>, Error> {
        self.database
            .flow_entries(device_id, global_id)
            .map(|entries| entries.values().collect())
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: Some(u64::from(global_id)),
            })
    }

    /// Replace an entry's key/program and announce FLOW_MOD(MODIFY).
    pub fn modify_flow_entry(
        &mut self,
        device_id: u32,
        global_id: u32,
        entry_id: u32,
        matches: &[MatchX],
        instructions: &[Instruction],
        priority: u16,
        counter_enable: bool,
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let matches = bounded_matches(matches)?;
        let instructions = bounded_instructions(instructions)?;

        self.database
            .modify_flow_entry(
                device_id,
                global_id,
                entry_id,
                matches,
                instructions,
                priority,
                counter_enable,
            )
            .inspect_err(|e| log::error!("modify flow entry {}: {}", entry_id, e))?;

        let entry = self.database.flow_entry(device_id, global_id, entry_id)?.clone();

        self.send_flow_mod(device_id, entry.clone(), FlowModCommand::Modify)?;

        log::info!(
            "MOD <entry[{}][{}][{}]>",
            entry.table_type,
            entry.table_id,
            entry.index
        );

        Ok(())
    }

    /// Remove an entry and announce FLOW_MOD(DELETE).
    pub fn delete_flow_entry(
        &mut self,
        device_id: u32,
        global_id: u32,
        entry_id: u32,
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let entry = self
            .database
            .delete_flow_entry(device_id, global_id, entry_id)
            .inspect_err(|e| log::error!("delete flow entry {}: {}", entry_id, e))?;

        self.send_flow_mod(device_id, entry.clone(), FlowModCommand::Delete)?;

        log::info!(
            "DELETE <entry[{}][{}][{}]>",
            entry.table_type,
            entry.table_id,
            entry.index
        );

        Ok(())
    }

    // Ports

    /// Cache a port status message.
    pub fn set_port_status(&mut self, device_id: u32, status: PortStatus) -> Result<(), Error> {
        self.database.set_port_status(device_id, status)
    }

    /// The cached status of one port.
    pub fn get_port_status(&self, device_id: u32, port_id: u32) -> Result<&PortStatus, Error> {
        self.database.port_status(device_id, port_id)
    }

    /// Resolve a port id by name.
    pub fn get_port_id_by_name(&self, device_id: u32, name: &str) -> Result<u32, Error> {
        self.database
            .switch(device_id)?
            .port_id_by_name(name)
            .ok_or(Error::NotFound {
                item: Item::Port,
                index: None,
            })
    }

    /// All cached port ids of one switch.
    pub fn get_all_port_ids(&self, device_id: u32) -> Result<Vec<u32>, Error> {
        self.database.port_ids(device_id)
    }

    /// Flip a port's POF-enable flag and announce it with PORT_MOD(MODIFY) carrying the
    /// mutated port description.
    pub fn set_port_of_enable(
        &mut self,
        device_id: u32,
        port_id: u32,
        enable: bool,
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let desc = self
            .database
            .set_port_of_enable(device_id, port_id, enable)
            .inspect_err(|e| log::error!("set port enable {:#x}: {}", port_id, e))?;

        let message = Message::PortMod(PortMod {
            xid: self.xids.next(),
            reason: PortReason::Modify,
            desc: desc.clone(),
        });

        self.write_of(device_id, &message)?;

        log::info!("Port [{:#x}] Set POF Enable [{}]", port_id, desc.device_id);

        Ok(())
    }

    // Counters

    /// Allocate a counter id and announce COUNTER_MOD(ADD).
    pub fn allocate_counter(&mut self, device_id: u32) -> Result<u32, Error> {
        self.require_switch(device_id)?;

        let counter_id = self.database.allocate_counter(device_id)?;

        let message = Message::CounterMod(CounterCarrier::new(
            self.xids.next(),
            Counter::new(CounterModCommand::Add, counter_id),
        ));

        self.write_of(device_id, &message)?;

        log::info!("ADD <counter[{}]>", counter_id);

        Ok(counter_id)
    }

    /// Free a counter id and announce COUNTER_MOD(DELETE).
    pub fn free_counter(&mut self, device_id: u32, counter_id: u32) -> Result<(), Error> {
        self.require_switch(device_id)?;

        self.database
            .free_counter(device_id, counter_id)
            .inspect_err(|e| log::error!("free counter {}: {}", counter_id, e))?;

        let message = Message::CounterMod(CounterCarrier::new(
            self.xids.next(),
            Counter::new(CounterModCommand::Delete, counter_id),
        ));

        self.write_of(device_id, &message)?;

        log::info!("DELETE <counter[{}]>", counter_id);

        Ok(())
    }

    /// Zero a counter controller-side and announce COUNTER_MOD(CLEAR).
    pub fn reset_counter(
        &mut self,
        device_id: u32,
        counter_id: u32,
        write_to_switch: bool,
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        self.database
            .reset_counter(device_id, counter_id)
            .inspect_err(|e| log::error!("reset counter {}: {}", counter_id, e))?;

        if write_to_switch {
            let message = Message::CounterMod(CounterCarrier::new(
                self.xids.next(),
                Counter::new(CounterModCommand::Clear, counter_id),
            ));

            self.write_of(device_id, &message)?;
        }

        Ok(())
    }

    /// Ask the switch for a counter's value; the COUNTER_REPLY surfaces via the event bus.
    pub fn query_counter_value(&mut self, device_id: u32, counter_id: u32) -> Result<(), Error> {
        self.require_switch(device_id)?;
        self.database.counter(device_id, counter_id)?;

        let message = Message::CounterRequest(CounterCarrier::query(self.xids.next(), counter_id));

        self.write_of(device_id, &message)
    }

    /// The last-known record of a counter.
    pub fn get_counter(&self, device_id: u32, counter_id: u32) -> Result<&Counter, Error> {
        self.database.counter(device_id, counter_id)
    }

    // Meters

    /// Install a meter with `rate` and announce METER_MOD(ADD); returns the meter id.
    pub fn add_meter_entry(&mut self, device_id: u32, rate: u32) -> Result<u32, Error> {
        self.require_switch(device_id)?;

        let (meter_id, mut meter) = self
            .database
            .add_meter(device_id, rate)
            .inspect_err(|e| log::error!("add meter: {}", e))?;

        meter.xid = self.xids.next();
        meter.command = MeterModCommand::Add;

        self.write_of(device_id, &Message::MeterMod(meter))?;

        log::info!("ADD <meter[{}]> [RATE] {}", meter_id, rate);

        Ok(meter_id)
    }

    /// Change a meter's rate and announce METER_MOD(MODIFY).
    pub fn modify_meter(&mut self, device_id: u32, meter_id: u32, rate: u32) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let mut meter = self
            .database
            .modify_meter(device_id, meter_id, rate)
            .inspect_err(|e| log::error!("modify meter {}: {}", meter_id, e))?;

        meter.xid = self.xids.next();
        meter.command = MeterModCommand::Modify;

        self.write_of(device_id, &Message::MeterMod(meter))?;

        log::info!("MOD <meter[{}]> [RATE] {}", meter_id, rate);

        Ok(())
    }

    /// Free a meter and announce METER_MOD(DELETE).
    pub fn free_meter(&mut self, device_id: u32, meter_id: u32) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let mut meter = self
            .database
            .free_meter(device_id, meter_id)
            .inspect_err(|e| log::error!("free meter {}: {}", meter_id, e))?;

        meter.xid = self.xids.next();
        meter.command = MeterModCommand::Delete;

        self.write_of(device_id, &Message::MeterMod(meter))?;

        log::info!("DELETE <meter[{}]>", meter_id);

        Ok(())
    }

    /// The last definition sent for a meter.
    pub fn get_meter(&self, device_id: u32, meter_id: u32) -> Result<&MeterMod, Error> {
        self.database.meter(device_id, meter_id)
    }

    // Groups

    /// Install a group and announce GROUP_MOD(ADD); returns the group id.
    pub fn add_group_entry(
        &mut self,
        device_id: u32,
        group_type: GroupType,
        actions: &[Action],
        counter_enable: bool,
    ) -> Result<u32, Error> {
        self.require_switch(device_id)?;

        let actions = bounded_actions(actions)?;

        let (group_id, mut group) = self
            .database
            .add_group(device_id, group_type, actions, counter_enable)
            .inspect_err(|e| log::error!("add group: {}", e))?;

        group.xid = self.xids.next();
        group.command = GroupModCommand::Add;

        self.write_of(device_id, &Message::GroupMod(group))?;

        log::info!("ADD <group[{}]>", group_id);

        Ok(group_id)
    }

    /// Replace a group's actions and announce GROUP_MOD(MODIFY).
    pub fn modify_group_entry(
        &mut self,
        device_id: u32,
        group_id: u32,
        group_type: GroupType,
        actions: &[Action],
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let actions = bounded_actions(actions)?;

        let mut group = self
            .database
            .modify_group(device_id, group_id, group_type, actions)
            .inspect_err(|e| log::error!("modify group {}: {}", group_id, e))?;

        group.xid = self.xids.next();
        group.command = GroupModCommand::Modify;

        self.write_of(device_id, &Message::GroupMod(group))?;

        log::info!("MOD <group[{}]>", group_id);

        Ok(())
    }

    /// Free a group and announce GROUP_MOD(DELETE).
    pub fn free_group_entry(&mut self, device_id: u32, group_id: u32) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let mut group = self
            .database
            .free_group(device_id, group_id)
            .inspect_err(|e| log::error!("free group {}: {}", group_id, e))?;

        group.xid = self.xids.next();
        group.command = GroupModCommand::Delete;

        self.write_of(device_id, &Message::GroupMod(group))?;

        log::info!("DELETE <group[{}]>", group_id);

        Ok(())
    }

    /// The last definition sent for a group.
    pub fn get_group_entry(&self, device_id: u32, group_id: u32) -> Result<&GroupMod, Error> {
        self.database.group(device_id, group_id)
    }

    // Packet out

    /// Inject a packet through a switch with up to 6 actions applied.
    pub fn send_packet_out(
        &mut self,
        device_id: u32,
        in_port: u32,
        actions: &[Action],
        data: Vec<u8>,
    ) -> Result<(), Error> {
        self.require_switch(device_id)?;

        let actions = bounded_actions(actions)?;

        let message = Message::PacketOut(PacketOut {
            xid: self.xids.next(),
            buffer_id: NO_BUFFER,
            in_port,
            actions,
            data,
        });

        self.write_of(device_id, &message)
    }

    // Builders

    /// Build a matchx over a pool field with hex value/mask strings.
    pub fn new_matchx(&self, field_id: i16, value: &str, mask: &str) -> Result<MatchX, Error> {
        let field = self.database.field(field_id).ok_or(Error::NotFound {
            item: Item::Field,
            index: Some(field_id as u64),
        })?;

        Ok(MatchX::from_hex(field.descriptor(), value, mask)?)
    }

    /// Build a GOTO_TABLE instruction towards `next_global_table_id`, copying the target
    /// table's key layout into the instruction.
    pub fn new_ins_goto_table(
        &self,
        device_id: u32,
        next_global_table_id: u32,
        packet_offset: u16,
    ) -> Result<Instruction, Error> {
        let next_table = self.database.flow_table(device_id, next_global_table_id)?;

        Ok(Instruction::GotoTable {
            next_table_id: next_global_table_id as u8,
            packet_offset,
            match_fields: next_table.match_fields.clone(),
        })
    }

    /// Build a GOTO_DIRECT_TABLE instruction.
    pub fn new_ins_goto_direct_table(
        &self,
        next_global_table_id: u32,
        packet_offset: u16,
        index: ValueOrField,
    ) -> Instruction {
        Instruction::GotoDirectTable {
            next_table_id: next_global_table_id as u8,
            packet_offset,
            index,
        }
    }

    /// Build a WRITE_METADATA instruction from a hex value.
    pub fn new_ins_write_metadata(
        &self,
        metadata_offset: u16,
        write_length: u16,
        value: &str,
    ) -> Result<Instruction, Error> {
        Ok(Instruction::WriteMetadata {
            metadata_offset,
            write_length,
            value: parse_hex(value)?,
        })
    }

    /// Build a WRITE_METADATA_FROM_PACKET instruction.
    pub fn new_ins_write_metadata_from_packet(
        &self,
        metadata_offset: u16,
        write_length: u16,
        packet_offset: u16,
    ) -> Instruction {
        Instruction::WriteMetadataFromPacket {
            metadata_offset,
            packet_offset,
            write_length,
        }
    }

    /// Build a METER instruction.
    pub fn new_ins_meter(&self, meter_id: u32) -> Instruction {
        Instruction::Meter { meter_id }
    }

    /// Build a CALCULATE_FIELD instruction.
    pub fn new_ins_calculate_field(
        &self,
        calc_type: CalcType,
        dst: Match20,
        src: ValueOrField,
    ) -> Instruction {
        Instruction::CalculateField {
            calc_type,
            dst,
            src,
        }
    }

    /// Build a CONDITIONAL_JMP instruction.
    pub fn new_ins_conditional_jmp(
        &self,
        field1: Match20,
        field2: ValueOrField,
        offsets: [JmpOffset; 3],
    ) -> Instruction {
        Instruction::ConditionalJmp {
            field1,
            field2,
            offsets,
        }
    }

    /// Build an APPLY_ACTIONS instruction.
    pub fn new_ins_apply_actions(&self, actions: &[Action]) -> Result<Instruction, Error> {
        Ok(Instruction::ApplyActions {
            actions: bounded_actions(actions)?,
        })
    }

    /// Build an output action towards an immediate port id.
    pub fn new_action_output(
        &self,
        port_id: u32,
        metadata_offset: u16,
        metadata_length: u16,
        packet_offset: u16,
    ) -> Action {
        Action::Output {
            port: ValueOrField::Value(port_id),
            metadata_offset,
            metadata_length,
            packet_offset,
        }
    }

    /// Build a set-field action.
    pub fn new_action_set_field(&self, field: MatchX) -> Action {
        Action::SetField { field }
    }

    /// Build a set-field-from-metadata action.
    pub fn new_action_set_field_from_metadata(
        &self,
        field: Match20,
        metadata_offset: u16,
    ) -> Action {
        Action::SetFieldFromMetadata {
            field,
            metadata_offset,
        }
    }

    /// Build a modify-field action.
    pub fn new_action_modify_field(&self, field: Match20, increment: i32) -> Action {
        Action::ModifyField { field, increment }
    }

    /// Build an add-field action from a hex value.
    pub fn new_action_add_field(
        &self,
        field_id: u16,
        position: u16,
        length: u32,
        value: &str,
    ) -> Result<Action, Error> {
        Ok(Action::AddField {
            field_id,
            position,
            length,
            value: parse_hex(value)?,
        })
    }

    /// Build a delete-field action.
    pub fn new_action_delete_field(&self, position: u16, length: ValueOrField) -> Action {
        Action::DeleteField { position, length }
    }

    /// Build a calculate-checksum action.
    #[allow(clippy::too_many_arguments)]
    pub fn new_action_calculate_checksum(
        &self,
        checksum_pos_type: u8,
        calc_pos_type: u8,
        checksum_position: u16,
        checksum_length: u16,
        calc_start_position: u16,
        calc_length: u16,
    ) -> Action {
        Action::CalculateChecksum {
            checksum_pos_type,
            calc_pos_type,
            checksum_position,
            checksum_length,
            calc_start_position,
            calc_length,
        }
    }

    /// Build a group action.
    pub fn new_action_group(&self, group_id: u32) -> Action {
        Action::Group { group_id }
    }

    /// Build a drop action.
    pub fn new_action_drop(&self, reason: DropReason) -> Action {
        Action::Drop { reason }
    }

    /// Build a packet-in action.
    pub fn new_action_packetin(&self, reason: PacketInReason) -> Action {
        Action::PacketIn { reason }
    }

    /// Build a counter action.
    pub fn new_action_counter(&self, counter_id: u32) -> Action {
        Action::Counter { counter_id }
    }

    // Internals

    fn require_switch(&self, device_id: u32) -> Result<(), Error> {
        if self.switches.contains_key(&device_id) {
            Ok(())
        } else {
            log::error!("no such switch {:#x}", device_id);

            Err(Error::NotFound {
                item: Item::Switch,
                index: Some(u64::from(device_id)),
            })
        }
    }

    fn send_table_mod(&self, device_id: u32, table: FlowTable) -> Result<(), Error> {
        let message = Message::TableMod(TableMod {
            xid: self.xids.next(),
            table,
        });

        self.write_of(device_id, &message)
    }

    fn send_flow_mod(
        &self,
        device_id: u32,
        mut entry: FlowMod,
        command: FlowModCommand,
    ) -> Result<(), Error> {
        entry.xid = self.xids.next();
        entry.command = command;

        self.write_of(device_id, &Message::FlowMod(entry))
    }
}

fn bounded_fields(fields: &[Match20]) -> Result<heapless::Vec<Match20, MAX_MATCH_FIELDS>, Error> {
    heapless::Vec::from_slice(fields).map_err(|_| Error::InvalidArgument("too many match fields"))
}

fn bounded_matches(matches: &[MatchX]) -> Result<heapless::Vec<MatchX, MAX_MATCH_FIELDS>, Error> {
    heapless::Vec::from_slice(matches).map_err(|_| Error::InvalidArgument("too many matches"))
}

fn bounded_instructions(
    instructions: &[Instruction],
) -> Result<heapless::Vec<Instruction, MAX_INSTRUCTIONS>, Error> {
    heapless::Vec::from_slice(instructions)
        .map_err(|_| Error::InvalidArgument("too many instructions"))
}

fn bounded_actions(actions: &[Action]) -> Result<heapless::Vec<Action, MAX_ACTIONS>, Error> {
    heapless::Vec::from_slice(actions).map_err(|_| Error::InvalidArgument("too many actions"))
}
