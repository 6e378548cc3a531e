//! The PM database: the controller's in-memory model of protocols, fields, metadata and all
//! per-switch pipeline state.
//!
//! Mutators here are pure: they validate, update maps and id pools, and return typed errors.
//! Nothing in this module touches the wire; the manager composes database mutation with
//! message emission.

pub mod alloc;
pub mod switch;

pub use alloc::{DataTable, IdAllocator};
pub use switch::{FlowTableDb, SwitchDb};

use crate::error::{Error, Item};
use crate::wire::match_field::METADATA_FIELD_ID;
use crate::wire::message::{FeaturesReply, FlowMod, GroupMod, MeterMod, PortStatus, ResourceReport};
use crate::wire::{
    Action, Counter, CounterModCommand, FlowModCommand, FlowTable, GroupModCommand, GroupType,
    Instruction, Match20, MatchX, MeterModCommand, PhyPort, TableModCommand, TableType,
    MAX_ACTIONS, MAX_INSTRUCTIONS, MAX_MATCH_FIELDS, NAME_MAX_LEN,
};
use std::collections::{BTreeMap, HashMap};

/// The mandatory name of the first table installed on every switch.
pub const FIRST_ENTRY_TABLE_NAME: &str = "FirstEntryTable";

/// Counter id meaning "no counter attached".
pub const COUNTER_ID_INVALID: u32 = 0;

/// First protocol id handed out.
const PROTOCOL_ID_START: u16 = 1;

/// A named field descriptor in the controller's field pool.
///
/// The name never goes on the wire; [`FieldDef::descriptor`] yields the 8-byte wire form.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldDef {
    /// Pool id, or [`METADATA_FIELD_ID`] for metadata fields.
    pub field_id: i16,
    /// Controller-side name.
    pub name: String,
    /// Offset in bits.
    pub offset: u16,
    /// Length in bits.
    pub length: u16,
}

impl FieldDef {
    /// The wire-form descriptor of this field.
    pub fn descriptor(&self) -> Match20 {
        Match20::new(self.field_id, self.offset, self.length)
    }
}

/// A protocol: a named, ordered group of fields from the pool.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Protocol {
    /// Protocol id, monotone from 1.
    pub protocol_id: u16,
    /// Unique protocol name.
    pub name: String,
    /// Sum of the field lengths, in bits.
    pub total_length: u16,
    /// Member field ids, in header order.
    pub field_ids: Vec<i16>,
}

/// The controller-side database.
#[derive(Debug, Default)]
pub struct PmDatabase {
    switches: BTreeMap<u32, SwitchDb>,
    protocols: BTreeMap<u16, Protocol>,
    protocol_names: HashMap<String, u16>,
    next_protocol_id: u16,
    fields: BTreeMap<i16, FieldDef>,
    next_field_id: i16,
    metadata: Vec<FieldDef>,
}

impl PmDatabase {
    /// An empty database.
    pub fn new() -> Self {
        Self {
            next_protocol_id: PROTOCOL_ID_START,
            ..Self::default()
        }
    }

    // Switch lifecycle

    /// Create the state for a newly handshaking switch.
    pub fn add_switch(&mut self, device_id: u32) -> Result<(), Error> {
        if self.switches.contains_key(&device_id) {
            return Err(Error::Conflict("switch already exists"));
        }

        self.switches.insert(device_id, SwitchDb::new(device_id));

        Ok(())
    }

    /// Drop all state for a disconnected switch.
    pub fn remove_switch(&mut self, device_id: u32) -> Option<SwitchDb> {
        self.switches.remove(&device_id)
    }

    /// All known switch ids, ascending.
    pub fn switch_ids(&self) -> Vec<u32> {
        self.switches.keys().copied().collect()
    }

    /// Borrow one switch's state.
    pub fn switch(&self, device_id: u32) -> Result<&SwitchDb, Error> {
        self.switches.get(&device_id).ok_or(Error::NotFound {
            item: Item::Switch,
            index: Some(u64::from(device_id)),
        })
    }

    /// Mutably borrow one switch's state.
    pub fn switch_mut(&mut self, device_id: u32) -> Result<&mut SwitchDb, Error> {
        self.switches.get_mut(&device_id).ok_or(Error::NotFound {
            item: Item::Switch,
            index: Some(u64::from(device_id)),
        })
    }

    // Field pool

    /// Create a field, returning its fresh id (monotone from 0).
    pub fn new_field(&mut self, name: &str, offset: u16, length: u16) -> i16 {
        let field_id = self.next_field_id;
        self.next_field_id += 1;

        self.fields.insert(
            field_id,
            FieldDef {
                field_id,
                name: name.to_owned(),
                offset,
                length,
            },
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
        let field = self.fields.get_mut(&field_id).ok_or(Error::NotFound {
            item: Item::Field,
            index: Some(field_id as u64),
        })?;

        field.name = name.to_owned();
        field.offset = offset;
        field.length = length;

        Ok(())
    }

    /// Remove a field from the pool.
    pub fn delete_field(&mut self, field_id: i16) -> Result<FieldDef, Error> {
        self.fields.remove(&field_id).ok_or(Error::NotFound {
            item: Item::Field,
            index: Some(field_id as u64),
        })
    }

    /// Look up a field by id.
    pub fn field(&self, field_id: i16) -> Option<&FieldDef> {
        self.fields.get(&field_id)
    }

    /// All fields matching `name`, pool fields first, then any metadata field of that name.
    pub fn fields_by_name(&self, name: &str) -> Vec<&FieldDef> {
        let mut found: Vec<&FieldDef> = self
            .fields
            .values()
            .filter(|field| field.name == name)
            .collect();

        if let Some(meta) = self.metadata_field(name) {
            found.push(meta);
        }

        found
    }

    /// All pool fields, ascending by id.
    pub fn all_fields(&self) -> Vec<&FieldDef> {
        self.fields.values().collect()
    }

    // Protocol pool

    /// Group existing pool fields into a named protocol, returning its id.
    ///
    /// The field list must be non-empty, every id must exist, and field offsets must be
    /// non-decreasing with no overlap.
    pub fn add_protocol(&mut self, name: &str, field_ids: Vec<i16>) -> Result<u16, Error> {
        if self.protocol_names.contains_key(name) {
            return Err(Error::Conflict("protocol name already exists"));
        }

        let total_length = self.check_protocol_fields(&field_ids)?;

        let protocol_id = self.next_protocol_id;
        self.next_protocol_id += 1;

        self.protocols.insert(
            protocol_id,
            Protocol {
                protocol_id,
                name: name.to_owned(),
                total_length,
                field_ids,
            },
        );
        self.protocol_names.insert(name.to_owned(), protocol_id);

        Ok(protocol_id)
    }

    /// Replace a protocol's field list.
    pub fn modify_protocol(&mut self, protocol_id: u16, field_ids: Vec<i16>) -> Result<(), Error> {
        let total_length = self.check_protocol_fields(&field_ids)?;

        let protocol = self.protocols.get_mut(&protocol_id).ok_or(Error::NotFound {
            item: Item::Protocol,
            index: Some(u64::from(protocol_id)),
        })?;

        protocol.total_length = total_length;
        protocol.field_ids = field_ids;

        Ok(())
    }

    /// Remove a protocol along with every field it owns.
    pub fn delete_protocol(&mut self, protocol_id: u16) -> Result<Protocol, Error> {
        let protocol = self.protocols.remove(&protocol_id).ok_or(Error::NotFound {
            item: Item::Protocol,
            index: Some(u64::from(protocol_id)),
        })?;

        self.protocol_names.remove(&protocol.name);

        for field_id in &protocol.field_ids {
            self.fields.remove(field_id);
        }

        Ok(protocol)
    }

    /// Look up a protocol by id.
    pub fn protocol(&self, protocol_id: u16) -> Option<&Protocol> {
        self.protocols.get(&protocol_id)
    }

    /// Look up a protocol by name.
    pub fn protocol_by_name(&self, name: &str) -> Option<&Protocol> {
        self.protocol_names
            .get(name)
            .and_then(|id| self.protocols.get(id))
    }

    /// All protocols, ascending by id.
    pub fn protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    fn check_protocol_fields(&self, field_ids: &[i16]) -> Result<u16, Error> {
        if field_ids.is_empty() {
            return Err(Error::InvalidArgument("protocol needs at least one field"));
        }

        let mut end_of_previous = 0u16;
        let mut total_length = 0u16;

        for field_id in field_ids {
            let field = self.fields.get(field_id).ok_or(Error::NotFound {
                item: Item::Field,
                index: Some(*field_id as u64),
            })?;

            if field.offset < end_of_previous {
                return Err(Error::InvalidArgument("field offsets overlap"));
            }

            end_of_previous = field.offset + field.length;
            total_length += field.length;
        }

        Ok(total_length)
    }

    // Metadata

    /// Append a metadata field; its offset must start at or after the end of the last one.
    pub fn new_metadata_field(
        &mut self,
        name: &str,
        offset: u16,
        length: u16,
    ) -> Result<(), Error> {
        if let Some(last) = self.metadata.last() {
            if offset < last.offset + last.length {
                return Err(Error::InvalidArgument("metadata offset overlaps"));
            }
        }

        self.metadata.push(FieldDef {
            field_id: METADATA_FIELD_ID,
            name: name.to_owned(),
            offset,
            length,
        });

        Ok(())
    }

    /// Replace the whole metadata list.
    pub fn set_metadata(&mut self, metadata: Vec<FieldDef>) {
        self.metadata = metadata;
    }

    /// The ordered metadata list.
    pub fn metadata(&self) -> &[FieldDef] {
        &self.metadata
    }

    /// Drop all metadata fields.
    pub fn clear_metadata(&mut self) {
        self.metadata.clear();
    }

    /// Look up a metadata field by name.
    pub fn metadata_field(&self, name: &str) -> Option<&FieldDef> {
        self.metadata.iter().find(|field| field.name == name)
    }

    // Flow tables

    /// Create a flow table, returning its global id.
    ///
    /// Validates everything §size/type/shape: the table must hold at least one entry, LINEAR
    /// tables take no match fields while every other type requires them, and the very first
    /// table on a switch must be the MM table named [`FIRST_ENTRY_TABLE_NAME`] (it receives
    /// global id 0).
    pub fn add_flow_table(
        &mut self,
        device_id: u32,
        table_name: &str,
        table_type: TableType,
        table_size: u32,
        match_fields: heapless::Vec<Match20, MAX_MATCH_FIELDS>,
    ) -> Result<u32, Error> {
        if table_name.is_empty() {
            return Err(Error::InvalidArgument("empty table name"));
        }

        if table_name.len() > NAME_MAX_LEN {
            return Err(Error::StringTooLong {
                max_length: NAME_MAX_LEN,
                string_length: table_name.len(),
            });
        }

        if table_size == 0 {
            return Err(Error::InvalidArgument("table size must be non-zero"));
        }

        if table_type == TableType::Linear && !match_fields.is_empty() {
            return Err(Error::InvalidArgument("LINEAR table takes no match fields"));
        }

        if table_type != TableType::Linear && match_fields.is_empty() {
            return Err(Error::InvalidArgument("match field list is empty"));
        }

        let key_length: u16 = match_fields.iter().map(|field| field.length).sum();

        let switch = self.switch_mut(device_id)?;
        let global_id = switch.alloc_table_id(table_type)?;

        if global_id == 0
            && (table_name != FIRST_ENTRY_TABLE_NAME || table_type != TableType::Mm)
        {
            switch.release_table_id(table_type, global_id);

            return Err(Error::InvalidArgument(
                "first table must be the MM FirstEntryTable",
            ));
        }

        let base = switch.table_base(table_type)?;

        let table = FlowTable {
            command: TableModCommand::Add,
            table_id: (global_id - base) as u8,
            table_type,
            table_size,
            key_length,
            table_name: table_name.to_owned(),
            match_fields,
        };

        switch.insert_table(global_id, table);

        Ok(global_id)
    }

    /// Remove a table whose entry map is empty, returning its id to the type's free list.
    pub fn delete_flow_table(&mut self, device_id: u32, global_id: u32) -> Result<FlowTable, Error> {
        let switch = self.switch_mut(device_id)?;

        let occupied = switch
            .table_db(global_id)
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: Some(u64::from(global_id)),
            })?
            .len();

        if occupied != 0 {
            return Err(Error::Conflict("table still holds entries"));
        }

        let table = switch.remove_table(global_id).ok_or(Error::NotFound {
            item: Item::FlowTable,
            index: Some(u64::from(global_id)),
        })?;

        switch.release_table_id(table.table_type, global_id);

        Ok(table)
    }

    /// The table under `global_id`.
    pub fn flow_table(&self, device_id: u32, global_id: u32) -> Result<&FlowTable, Error> {
        self.switch(device_id)?
            .table(global_id)
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: Some(u64::from(global_id)),
            })
    }

    /// Resolve a table's global id from its name.
    pub fn flow_table_id_by_name(&self, device_id: u32, table_name: &str) -> Result<u32, Error> {
        self.switch(device_id)?
            .tables()
            .iter()
            .find(|(_, table)| table.table_name == table_name)
            .map(|(id, _)| *id)
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: None,
            })
    }

    /// Translate a global table id to `(type, local id)`.
    pub fn to_local_table_id(
        &self,
        device_id: u32,
        global_id: u32,
    ) -> Result<(TableType, u8), Error> {
        self.switch(device_id)?.to_local_table_id(global_id)
    }

    /// Translate a `(type, local id)` pair to the global table id.
    pub fn to_global_table_id(
        &self,
        device_id: u32,
        table_type: TableType,
        local_id: u8,
    ) -> Result<u32, Error> {
        self.switch(device_id)?.to_global_table_id(table_type, local_id)
    }

    // Flow entries

    /// Install a flow entry, returning its entry id within the table.
    ///
    /// The sum of match lengths must equal the table's key length, LINEAR tables take no
    /// matches, and `counter_enable` allocates a counter id from the switch pool.
    pub fn add_flow_entry(
        &mut self,
        device_id: u32,
        global_id: u32,
        matches: heapless::Vec<MatchX, MAX_MATCH_FIELDS>,
        instructions: heapless::Vec<Instruction, MAX_INSTRUCTIONS>,
        priority: u16,
        counter_enable: bool,
    ) -> Result<u32, Error> {
        let table = self.flow_table(device_id, global_id)?.clone();

        Self::check_entry_key(&table, &matches)?;

        let switch = self.switch_mut(device_id)?;

        let counter_id = if counter_enable {
            let id = switch.counters.alloc()?;

            switch
                .counters
                .put(id, Counter::new(CounterModCommand::Add, id));

            id
        } else {
            COUNTER_ID_INVALID
        };

        let table_db = switch.table_db_mut(global_id).ok_or(Error::NotFound {
            item: Item::FlowTable,
            index: Some(u64::from(global_id)),
        })?;

        let entry_id = table_db.alloc_entry_id()?;

        let entry = FlowMod {
            xid: 0,
            command: FlowModCommand::Add,
            counter_id,
            cookie: 0,
            cookie_mask: 0,
            table_id: table.table_id,
            table_type: table.table_type,
            idle_timeout: 0,
            hard_timeout: 0,
            priority,
            index: entry_id,
            matches,
            instructions,
        };

        table_db.insert(entry_id, entry);

        Ok(entry_id)
    }

    /// Replace an entry's matches, instructions and priority; counter allocation follows the
    /// `counter_enable` toggle.
    pub fn modify_flow_entry(
        &mut self,
        device_id: u32,
        global_id: u32,
        entry_id: u32,
        matches: heapless::Vec<MatchX, MAX_MATCH_FIELDS>,
        instructions: heapless::Vec<Instruction, MAX_INSTRUCTIONS>,
        priority: u16,
        counter_enable: bool,
    ) -> Result<(), Error> {
        let table = self.flow_table(device_id, global_id)?.clone();

        Self::check_entry_key(&table, &matches)?;

        let switch = self.switch_mut(device_id)?;

        let current_counter = switch
            .table_db(global_id)
            .and_then(|db| db.get(entry_id))
            .map(|entry| entry.counter_id)
            .ok_or(Error::NotFound {
                item: Item::FlowEntry,
                index: Some(u64::from(entry_id)),
            })?;

        let counter_id = match (counter_enable, current_counter) {
            (true, COUNTER_ID_INVALID) => {
                let id = switch.counters.alloc()?;

                switch
                    .counters
                    .put(id, Counter::new(CounterModCommand::Add, id));

                id
            }
            (true, id) => id,
            (false, COUNTER_ID_INVALID) => COUNTER_ID_INVALID,
            (false, id) => {
                switch.counters.remove(id);

                COUNTER_ID_INVALID
            }
        };

        let entry = switch
            .table_db_mut(global_id)
            .and_then(|db| db.get_mut(entry_id))
            .ok_or(Error::NotFound {
                item: Item::FlowEntry,
                index: Some(u64::from(entry_id)),
            })?;

        entry.matches = matches;
        entry.instructions = instructions;
        entry.priority = priority;
        entry.counter_id = counter_id;

        Ok(())
    }

    /// Remove an entry, freeing its id and any attached counter.
    pub fn delete_flow_entry(
        &mut self,
        device_id: u32,
        global_id: u32,
        entry_id: u32,
    ) -> Result<FlowMod, Error> {
        let switch = self.switch_mut(device_id)?;

        let entry = switch
            .table_db_mut(global_id)
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: Some(u64::from(global_id)),
            })?
            .remove(entry_id)
            .ok_or(Error::NotFound {
                item: Item::FlowEntry,
                index: Some(u64::from(entry_id)),
            })?;

        if entry.counter_id != COUNTER_ID_INVALID {
            switch.counters.remove(entry.counter_id);
        }

        Ok(entry)
    }

    /// One entry of one table.
    pub fn flow_entry(
        &self,
        device_id: u32,
        global_id: u32,
        entry_id: u32,
    ) -> Result<&FlowMod, Error> {
        self.switch(device_id)?
            .table_db(global_id)
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: Some(u64::from(global_id)),
            })?
            .get(entry_id)
            .ok_or(Error::NotFound {
                item: Item::FlowEntry,
                index: Some(u64::from(entry_id)),
            })
    }

    /// The entry map of one table, if the table exists.
    pub fn flow_entries(&self, device_id: u32, global_id: u32) -> Option<&BTreeMap<u32, FlowMod>> {
        self.switch(device_id)
            .ok()?
            .table_db(global_id)
            .map(|db| db.entries())
    }

    fn check_entry_key(
        table: &FlowTable,
        matches: &heapless::Vec<MatchX, MAX_MATCH_FIELDS>,
    ) -> Result<(), Error> {
        if table.table_type == TableType::Linear {
            if !matches.is_empty() {
                return Err(Error::InvalidArgument("LINEAR entry takes no matches"));
            }

            return Ok(());
        }

        if matches.is_empty() {
            return Err(Error::InvalidArgument("match list is empty"));
        }

        let total: u16 = matches.iter().map(|m| m.field.length).sum();

        if total != table.key_length {
            return Err(Error::InvalidArgument(
                "sum of match lengths differs from table key length",
            ));
        }

        Ok(())
    }

    // Counters

    /// Allocate a counter id and remember its record.
    pub fn allocate_counter(&mut self, device_id: u32) -> Result<u32, Error> {
        let switch = self.switch_mut(device_id)?;
        let id = switch.counters.alloc()?;

        switch
            .counters
            .put(id, Counter::new(CounterModCommand::Add, id));

        Ok(id)
    }

    /// Free a counter id, returning its last-known record.
    pub fn free_counter(&mut self, device_id: u32, counter_id: u32) -> Result<Counter, Error> {
        self.switch_mut(device_id)?
            .counters
            .remove(counter_id)
            .ok_or(Error::NotFound {
                item: Item::Counter,
                index: Some(u64::from(counter_id)),
            })
    }

    /// Update the stored record of a counter (e.g. from a COUNTER_REPLY).
    pub fn set_counter(&mut self, device_id: u32, counter: Counter) -> Result<(), Error> {
        self.switch_mut(device_id)?
            .counters
            .put(counter.counter_id, counter);

        Ok(())
    }

    /// The last-known record of a counter.
    pub fn counter(&self, device_id: u32, counter_id: u32) -> Result<&Counter, Error> {
        self.switch(device_id)?
            .counters
            .get(counter_id)
            .ok_or(Error::NotFound {
                item: Item::Counter,
                index: Some(u64::from(counter_id)),
            })
    }

    /// Zero the stored tallies of a counter.
    pub fn reset_counter(&mut self, device_id: u32, counter_id: u32) -> Result<Counter, Error> {
        let switch = self.switch_mut(device_id)?;

        let counter = switch
            .counters
            .get_mut(counter_id)
            .ok_or(Error::NotFound {
                item: Item::Counter,
                index: Some(u64::from(counter_id)),
            })?;

        counter.counter_value = 0;
        counter.byte_value = 0;

        Ok(*counter)
    }

    // Meters

    /// Allocate a meter with the given rate, returning `(meter_id, definition)`.
    pub fn add_meter(&mut self, device_id: u32, rate: u32) -> Result<(u32, MeterMod), Error> {
        let switch = self.switch_mut(device_id)?;
        let meter_id = switch.meters.alloc()?;

        let meter = MeterMod {
            xid: 0,
            command: MeterModCommand::Add,
            slot_id: 0,
            meter_id,
            rate,
        };

        switch.meters.put(meter_id, meter);

        Ok((meter_id, meter))
    }

    /// Change a meter's rate, returning the updated definition.
    pub fn modify_meter(&mut self, device_id: u32, meter_id: u32, rate: u32) -> Result<MeterMod, Error> {
        let switch = self.switch_mut(device_id)?;

        let meter = switch.meters.get_mut(meter_id).ok_or(Error::NotFound {
            item: Item::Meter,
            index: Some(u64::from(meter_id)),
        })?;

        meter.rate = rate;

        Ok(*meter)
    }

    /// Free a meter id, returning the last definition sent.
    pub fn free_meter(&mut self, device_id: u32, meter_id: u32) -> Result<MeterMod, Error> {
        self.switch_mut(device_id)?
            .meters
            .remove(meter_id)
            .ok_or(Error::NotFound {
                item: Item::Meter,
                index: Some(u64::from(meter_id)),
            })
    }

    /// The last definition sent for a meter.
    pub fn meter(&self, device_id: u32, meter_id: u32) -> Result<&MeterMod, Error> {
        self.switch(device_id)?
            .meters
            .get(meter_id)
            .ok_or(Error::NotFound {
                item: Item::Meter,
                index: Some(u64::from(meter_id)),
            })
    }

    // Groups

    /// Allocate a group, returning `(group_id, definition)`.
    pub fn add_group(
        &mut self,
        device_id: u32,
        group_type: GroupType,
        actions: heapless::Vec<Action, MAX_ACTIONS>,
        counter_enable: bool,
    ) -> Result<(u32, GroupMod), Error> {
        let switch = self.switch_mut(device_id)?;
        let group_id = switch.groups.alloc()?;

        let counter_id = if counter_enable {
            let id = switch.counters.alloc()?;

            switch
                .counters
                .put(id, Counter::new(CounterModCommand::Add, id));

            id
        } else {
            COUNTER_ID_INVALID
        };

        let group = GroupMod {
            xid: 0,
            command: GroupModCommand::Add,
            group_type,
            group_id,
            counter_id,
            actions,
        };

        switch.groups.put(group_id, group.clone());

        Ok((group_id, group))
    }

    /// Replace a group's type and actions, returning the updated definition.
    pub fn modify_group(
        &mut self,
        device_id: u32,
        group_id: u32,
        group_type: GroupType,
        actions: heapless::Vec<Action, MAX_ACTIONS>,
    ) -> Result<GroupMod, Error> {
        let switch = self.switch_mut(device_id)?;

        let group = switch.groups.get_mut(group_id).ok_or(Error::NotFound {
            item: Item::Group,
            index: Some(u64::from(group_id)),
        })?;

        group.group_type = group_type;
        group.actions = actions;

        Ok(group.clone())
    }

    /// Free a group id, releasing any attached counter as well.
    pub fn free_group(&mut self, device_id: u32, group_id: u32) -> Result<GroupMod, Error> {
        let switch = self.switch_mut(device_id)?;

        let group = switch.groups.remove(group_id).ok_or(Error::NotFound {
            item: Item::Group,
            index: Some(u64::from(group_id)),
        })?;

        if group.counter_id != COUNTER_ID_INVALID {
            switch.counters.remove(group.counter_id);
        }

        Ok(group)
    }

    /// The last definition sent for a group.
    pub fn group(&self, device_id: u32, group_id: u32) -> Result<&GroupMod, Error> {
        self.switch(device_id)?
            .groups
            .get(group_id)
            .ok_or(Error::NotFound {
                item: Item::Group,
                index: Some(u64::from(group_id)),
            })
    }

    // Ports

    /// Cache a port status message.
    pub fn set_port_status(&mut self, device_id: u32, status: PortStatus) -> Result<(), Error> {
        self.switch_mut(device_id)?.put_port(status);

        Ok(())
    }

    /// Drop a cached port.
    pub fn delete_port_status(&mut self, device_id: u32, port_id: u32) -> Result<(), Error> {
        self.switch_mut(device_id)?.remove_port(port_id);

        Ok(())
    }

    /// The cached status of one port.
    pub fn port_status(&self, device_id: u32, port_id: u32) -> Result<&PortStatus, Error> {
        self.switch(device_id)?.port(port_id).ok_or(Error::NotFound {
            item: Item::Port,
            index: Some(u64::from(port_id)),
        })
    }

    /// Flip a cached port's POF-enable flag, returning the updated description.
    pub fn set_port_of_enable(
        &mut self,
        device_id: u32,
        port_id: u32,
        enable: bool,
    ) -> Result<PhyPort, Error> {
        let status = self
            .switch_mut(device_id)?
            .port_mut(port_id)
            .ok_or(Error::NotFound {
                item: Item::Port,
                index: Some(u64::from(port_id)),
            })?;

        status.desc.of_enable = enable;

        Ok(status.desc.clone())
    }

    /// All cached port ids of one switch, ascending.
    pub fn port_ids(&self, device_id: u32) -> Result<Vec<u32>, Error> {
        Ok(self.switch(device_id)?.ports().keys().copied().collect())
    }

    // Features / resources

    /// Install a features reply for its slot.
    pub fn set_features(&mut self, device_id: u32, features: FeaturesReply) -> Result<(), Error> {
        self.switch_mut(device_id)?.set_features(features);

        Ok(())
    }

    /// Install a resource report: pools are capped and table-id bases computed.
    pub fn set_resource_report(
        &mut self,
        device_id: u32,
        report: ResourceReport,
    ) -> Result<(), Error> {
        self.switch_mut(device_id)?.set_resources(report);

        Ok(())
    }

    // Snapshot plumbing

    /// Re-insert a field under its original id, keeping the id counter ahead of it.
    pub(crate) fn restore_field(&mut self, field: FieldDef) {
        if field.field_id >= self.next_field_id {
            self.next_field_id = field.field_id + 1;
        }

        self.fields.insert(field.field_id, field);
    }

    /// Re-insert a protocol under its original id.
    pub(crate) fn restore_protocol(&mut self, protocol: Protocol) {
        if protocol.protocol_id >= self.next_protocol_id {
            self.next_protocol_id = protocol.protocol_id + 1;
        }

        self.protocol_names
            .insert(protocol.name.clone(), protocol.protocol_id);
        self.protocols.insert(protocol.protocol_id, protocol);
    }

    /// Re-insert a table and its entry store under their original global id.
    pub(crate) fn restore_table(
        &mut self,
        device_id: u32,
        global_id: u32,
        table: FlowTable,
        entries: FlowTableDb,
    ) -> Result<(), Error> {
        self.switch_mut(device_id)?
            .restore_table(global_id, table, entries);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::table::TableResource;
    use crate::wire::MAX_TABLE_TYPES;

    pub(crate) fn resource_report(counts: [u8; 4]) -> ResourceReport {
        ResourceReport {
            xid: 0,
            resource_type: 0,
            slot_id: 0,
            counter_num: 64,
            meter_num: 32,
            group_num: 16,
            table_resources: core::array::from_fn::<_, MAX_TABLE_TYPES, _>(|i| TableResource {
                device_id: 1,
                table_type: TableType::ALL[i],
                table_num: counts[i],
                key_length: 320,
                total_size: 128,
            }),
        }
    }

    fn db_with_switch() -> PmDatabase {
        let mut db = PmDatabase::new();

        db.add_switch(1).unwrap();
        db.set_resource_report(1, resource_report([8, 4, 2, 2])).unwrap();

        db
    }

    fn first_table_fields() -> heapless::Vec<Match20, MAX_MATCH_FIELDS> {
        let mut fields = heapless::Vec::new();
        fields.push(Match20::new(0, 0, 48)).unwrap();

        fields
    }

    fn dmac_match() -> heapless::Vec<MatchX, MAX_MATCH_FIELDS> {
        let mut matches = heapless::Vec::new();
        matches
            .push(MatchX::from_hex(Match20::new(0, 0, 48), "0026b954ee0f", "ffffffffffff").unwrap())
            .unwrap();

        matches
    }

    #[test]
    fn first_table_must_be_the_mm_first_entry_table() {
        let mut db = db_with_switch();

        let wrong_name =
            db.add_flow_table(1, "SomethingElse", TableType::Mm, 32, first_table_fields());

        assert_eq!(
            wrong_name,
            Err(Error::InvalidArgument(
                "first table must be the MM FirstEntryTable"
            ))
        );

        let id = db
            .add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();

        assert_eq!(id, 0);
        // The failed attempt must not leak id 0.
        assert_eq!(db.flow_table(1, 0).unwrap().table_name, FIRST_ENTRY_TABLE_NAME);
    }

    #[test]
    fn linear_tables_take_no_match_fields() {
        let mut db = db_with_switch();

        db.add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();

        assert!(db
            .add_flow_table(1, "linear", TableType::Linear, 8, first_table_fields())
            .is_err());

        let id = db
            .add_flow_table(1, "linear", TableType::Linear, 8, heapless::Vec::new())
            .unwrap();

        // LINEAR base: 8 MM + 4 LPM + 2 EM.
        assert_eq!(id, 14);
        assert_eq!(db.flow_table(1, id).unwrap().key_length, 0);
    }

    #[test]
    fn entry_key_length_must_match_table() {
        let mut db = db_with_switch();

        db.add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();

        // 16-bit match against a 48-bit key.
        let mut short = heapless::Vec::new();
        short
            .push(MatchX::from_hex(Match20::new(0, 0, 16), "0800", "ffff").unwrap())
            .unwrap();

        assert!(db
            .add_flow_entry(1, 0, short, heapless::Vec::new(), 0, false)
            .is_err());

        let entry_id = db
            .add_flow_entry(1, 0, dmac_match(), heapless::Vec::new(), 0, false)
            .unwrap();

        assert_eq!(entry_id, 0);
    }

    #[test]
    fn counter_lifecycle_follows_entries() {
        let mut db = db_with_switch();

        db.add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();

        let entry_id = db
            .add_flow_entry(1, 0, dmac_match(), heapless::Vec::new(), 0, true)
            .unwrap();

        let counter_id = db.flow_entry(1, 0, entry_id).unwrap().counter_id;

        assert_ne!(counter_id, COUNTER_ID_INVALID);
        assert!(db.counter(1, counter_id).is_ok());

        db.delete_flow_entry(1, 0, entry_id).unwrap();

        assert!(db.counter(1, counter_id).is_err());
    }

    #[test]
    fn modify_toggles_counter_allocation() {
        let mut db = db_with_switch();

        db.add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();

        let entry_id = db
            .add_flow_entry(1, 0, dmac_match(), heapless::Vec::new(), 0, false)
            .unwrap();

        assert_eq!(db.flow_entry(1, 0, entry_id).unwrap().counter_id, COUNTER_ID_INVALID);

        db.modify_flow_entry(1, 0, entry_id, dmac_match(), heapless::Vec::new(), 1, true)
            .unwrap();

        let counter_id = db.flow_entry(1, 0, entry_id).unwrap().counter_id;
        assert_ne!(counter_id, COUNTER_ID_INVALID);

        db.modify_flow_entry(1, 0, entry_id, dmac_match(), heapless::Vec::new(), 1, false)
            .unwrap();

        assert_eq!(db.flow_entry(1, 0, entry_id).unwrap().counter_id, COUNTER_ID_INVALID);
        assert!(db.counter(1, counter_id).is_err());
    }

    #[test]
    fn occupied_table_cannot_be_deleted() {
        let mut db = db_with_switch();

        db.add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();
        db.add_flow_entry(1, 0, dmac_match(), heapless::Vec::new(), 0, false)
            .unwrap();

        assert_eq!(
            db.delete_flow_table(1, 0),
            Err(Error::Conflict("table still holds entries"))
        );

        db.delete_flow_entry(1, 0, 0).unwrap();
        db.delete_flow_table(1, 0).unwrap();

        assert!(db.flow_table(1, 0).is_err());
        assert_eq!(db.switch(1).unwrap().free_table_ids(TableType::Mm), vec![0]);
    }

    #[test]
    fn entry_ids_reuse_freed_slots() {
        let mut db = db_with_switch();

        db.add_flow_table(1, FIRST_ENTRY_TABLE_NAME, TableType::Mm, 32, first_table_fields())
            .unwrap();

        for expected in 0..3 {
            let id = db
                .add_flow_entry(1, 0, dmac_match(), heapless::Vec::new(), 0, false)
                .unwrap();

            assert_eq!(id, expected);
        }

        db.delete_flow_entry(1, 0, 1).unwrap();

        assert_eq!(
            db.add_flow_entry(1, 0, dmac_match(), heapless::Vec::new(), 0, false)
                .unwrap(),
            1
        );
    }

    #[test]
    fn protocol_deletes_cascade_to_fields() {
        let mut db = PmDatabase::new();

        let dmac = db.new_field("DMAC", 0, 48);
        let smac = db.new_field("SMAC", 48, 48);

        let protocol_id = db.add_protocol("ETH", vec![dmac, smac]).unwrap();

        assert_eq!(protocol_id, 1);
        assert_eq!(db.protocol(protocol_id).unwrap().total_length, 96);

        db.delete_protocol(protocol_id).unwrap();

        assert!(db.field(dmac).is_none());
        assert!(db.field(smac).is_none());
        assert!(db.protocol_by_name("ETH").is_none());
    }

    #[test]
    fn overlapping_protocol_fields_are_rejected() {
        let mut db = PmDatabase::new();

        let first = db.new_field("A", 0, 48);
        let overlapping = db.new_field("B", 32, 16);

        assert_eq!(
            db.add_protocol("BAD", vec![first, overlapping]),
            Err(Error::InvalidArgument("field offsets overlap"))
        );
    }

    #[test]
    fn metadata_rejects_overlap() {
        let mut db = PmDatabase::new();

        db.new_metadata_field("pkt_len", 0, 16).unwrap();
        db.new_metadata_field("in_port", 16, 16).unwrap();

        assert_eq!(
            db.new_metadata_field("bad", 24, 8),
            Err(Error::InvalidArgument("metadata offset overlaps"))
        );

        assert_eq!(db.metadata().len(), 2);
        assert_eq!(db.metadata_field("in_port").unwrap().offset, 16);
    }

    #[test]
    fn field_lookup_by_name_includes_metadata() {
        let mut db = PmDatabase::new();

        db.new_field("ttl", 64, 8);
        db.new_metadata_field("ttl", 0, 8).unwrap();

        let found = db.fields_by_name("ttl");

        assert_eq!(found.len(), 2);
        assert_eq!(found[1].field_id, METADATA_FIELD_ID);
    }
}
