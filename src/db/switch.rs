//! Per-switch controller state: features, ports, resources, flow tables and the id pools
//! that partition the global table-id namespace.

use crate::db::alloc::{DataTable, IdAllocator};
use crate::error::{Error, Item};
use crate::wire::message::{FeaturesReply, FlowMod, GroupMod, MeterMod, PortStatus, ResourceReport};
use crate::wire::{Counter, FlowTable, TableType, MAX_TABLE_TYPES};
use std::collections::{BTreeMap, HashMap};

/// First id handed out by the counter/meter/group pools; 0 is the "no counter" sentinel.
pub const POOL_ID_START: u32 = 1;

/// The entry store of one flow table: entry records plus the entry-id pool.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowTableDb {
    entries: BTreeMap<u32, FlowMod>,
    ids: IdAllocator,
}

impl Default for FlowTableDb {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowTableDb {
    /// A fresh, empty entry store. Entry ids start at 0.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            ids: IdAllocator::new(Item::FlowEntry, 0),
        }
    }

    /// Allocate the next entry id: smallest freed id first, else the monotone counter.
    pub fn alloc_entry_id(&mut self) -> Result<u32, Error> {
        self.ids.alloc()
    }

    /// Store an entry under its index.
    pub fn insert(&mut self, entry_id: u32, entry: FlowMod) {
        self.entries.insert(entry_id, entry);
    }

    /// Look up one entry.
    pub fn get(&self, entry_id: u32) -> Option<&FlowMod> {
        self.entries.get(&entry_id)
    }

    /// Mutable access to one entry.
    pub fn get_mut(&mut self, entry_id: u32) -> Option<&mut FlowMod> {
        self.entries.get_mut(&entry_id)
    }

    /// Remove one entry, returning its id to the pool.
    pub fn remove(&mut self, entry_id: u32) -> Option<FlowMod> {
        let entry = self.entries.remove(&entry_id)?;

        self.ids.release(entry_id);

        Some(entry)
    }

    /// All entries, ascending by id.
    pub fn entries(&self) -> &BTreeMap<u32, FlowMod> {
        &self.entries
    }

    /// All entry ids, ascending.
    pub fn entry_ids(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    /// Number of installed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All controller-side state for one connected device.
#[derive(Debug)]
pub struct SwitchDb {
    /// The device id this state belongs to.
    pub device_id: u32,
    features: BTreeMap<u16, FeaturesReply>,
    ports: BTreeMap<u32, PortStatus>,
    port_names: HashMap<String, u32>,
    resources: BTreeMap<u16, ResourceReport>,
    type_bases: [Option<u32>; MAX_TABLE_TYPES],
    table_ids: [Option<IdAllocator>; MAX_TABLE_TYPES],
    tables: BTreeMap<u32, FlowTable>,
    table_dbs: BTreeMap<u32, FlowTableDb>,
    /// Counter pool and last-known counter records.
    pub counters: DataTable<Counter>,
    /// Meter pool and last-sent meter definitions.
    pub meters: DataTable<MeterMod>,
    /// Group pool and last-sent group definitions.
    pub groups: DataTable<GroupMod>,
}

impl SwitchDb {
    /// Fresh state for a newly handshaking device.
    pub fn new(device_id: u32) -> Self {
        Self {
            device_id,
            features: BTreeMap::new(),
            ports: BTreeMap::new(),
            port_names: HashMap::new(),
            resources: BTreeMap::new(),
            type_bases: [None; MAX_TABLE_TYPES],
            table_ids: [const { None }; MAX_TABLE_TYPES],
            tables: BTreeMap::new(),
            table_dbs: BTreeMap::new(),
            counters: DataTable::new(Item::Counter, POOL_ID_START),
            meters: DataTable::new(Item::Meter, POOL_ID_START),
            groups: DataTable::new(Item::Group, POOL_ID_START),
        }
    }

    // Features

    /// Install the features reported by one slot.
    pub fn set_features(&mut self, features: FeaturesReply) {
        self.features.insert(features.slot_id, features);
    }

    /// Features of one slot.
    pub fn features(&self, slot_id: u16) -> Option<&FeaturesReply> {
        self.features.get(&slot_id)
    }

    /// All per-slot features.
    pub fn features_map(&self) -> &BTreeMap<u16, FeaturesReply> {
        &self.features
    }

    // Ports

    /// Cache a port, keeping the name index in sync.
    pub fn put_port(&mut self, status: PortStatus) {
        let port_id = status.desc.port_id;

        self.port_names.insert(status.desc.name.clone(), port_id);
        self.ports.insert(port_id, status);
    }

    /// Drop a port and its name index entry.
    pub fn remove_port(&mut self, port_id: u32) -> Option<PortStatus> {
        let status = self.ports.remove(&port_id)?;

        self.port_names.retain(|_, id| *id != port_id);

        Some(status)
    }

    /// The cached status of one port.
    pub fn port(&self, port_id: u32) -> Option<&PortStatus> {
        self.ports.get(&port_id)
    }

    /// Mutable access to one cached port.
    pub fn port_mut(&mut self, port_id: u32) -> Option<&mut PortStatus> {
        self.ports.get_mut(&port_id)
    }

    /// Resolve a port by name.
    pub fn port_id_by_name(&self, name: &str) -> Option<u32> {
        self.port_names.get(name).copied()
    }

    /// All cached ports, ascending by id.
    pub fn ports(&self) -> &BTreeMap<u32, PortStatus> {
        &self.ports
    }

    // Resources

    /// Install a resource report: store it, cap the counter/meter/group pools, and compute
    /// the per-type table-id bases that partition the global id namespace.
    ///
    /// Bases are assigned in [`TableType::ALL`] order by summing the declared capacities, so
    /// `global_id = base[type] + local_id` is bijective within the switch.
    pub fn set_resources(&mut self, report: ResourceReport) {
        self.counters.set_max(report.counter_num);
        self.meters.set_max(report.meter_num);
        self.groups.set_max(report.group_num);

        let mut base = 0u32;

        for table_type in TableType::ALL {
            let capacity = u32::from(report.resource_for(table_type).table_num);
            let slot = table_type as usize;

            self.type_bases[slot] = Some(base);

            let mut ids = IdAllocator::new(Item::FlowTable, base);
            ids.set_limit(base + capacity);

            self.table_ids[slot] = Some(ids);

            base += capacity;
        }

        self.resources.insert(report.slot_id, report);
    }

    /// The resource report of one slot.
    pub fn resources(&self, slot_id: u16) -> Option<&ResourceReport> {
        self.resources.get(&slot_id)
    }

    /// All per-slot resource reports.
    pub fn resources_map(&self) -> &BTreeMap<u16, ResourceReport> {
        &self.resources
    }

    // Table id translation

    /// The first global table id assigned to `table_type`.
    pub fn table_base(&self, table_type: TableType) -> Result<u32, Error> {
        self.type_bases[table_type as usize].ok_or(Error::NotFound {
            item: Item::FlowTable,
            index: None,
        })
    }

    /// Translate a global table id to its `(type, local id)` pair.
    pub fn to_local_table_id(&self, global_id: u32) -> Result<(TableType, u8), Error> {
        if let Some(table) = self.tables.get(&global_id) {
            return Ok((table.table_type, table.table_id));
        }

        for table_type in TableType::ALL.iter().rev() {
            if let Some(base) = self.type_bases[*table_type as usize] {
                if global_id >= base {
                    return Ok((*table_type, (global_id - base) as u8));
                }
            }
        }

        Err(Error::NotFound {
            item: Item::FlowTable,
            index: Some(u64::from(global_id)),
        })
    }

    /// Translate a `(type, local id)` pair to the global table id.
    pub fn to_global_table_id(&self, table_type: TableType, local_id: u8) -> Result<u32, Error> {
        Ok(self.table_base(table_type)? + u32::from(local_id))
    }

    /// Allocate the next global table id for `table_type`.
    pub fn alloc_table_id(&mut self, table_type: TableType) -> Result<u32, Error> {
        self.table_ids[table_type as usize]
            .as_mut()
            .ok_or(Error::NotFound {
                item: Item::FlowTable,
                index: None,
            })?
            .alloc()
    }

    /// Return a global table id to its type's free list.
    pub fn release_table_id(&mut self, table_type: TableType, global_id: u32) {
        if let Some(ids) = self.table_ids[table_type as usize].as_mut() {
            ids.release(global_id);
        }
    }

    /// The freed global ids of one type, ascending.
    pub fn free_table_ids(&self, table_type: TableType) -> Vec<u32> {
        self.table_ids[table_type as usize]
            .as_ref()
            .map(|ids| ids.free_ids().collect())
            .unwrap_or_default()
    }

    // Tables

    /// Install a table definition and its entry store under a global id.
    pub fn insert_table(&mut self, global_id: u32, table: FlowTable) {
        self.tables.insert(global_id, table);
        self.table_dbs.insert(global_id, FlowTableDb::new());
    }

    /// Remove a table definition and its (empty) entry store.
    pub fn remove_table(&mut self, global_id: u32) -> Option<FlowTable> {
        self.table_dbs.remove(&global_id);
        self.tables.remove(&global_id)
    }

    /// The table definition under a global id.
    pub fn table(&self, global_id: u32) -> Option<&FlowTable> {
        self.tables.get(&global_id)
    }

    /// All installed tables keyed by global id.
    pub fn tables(&self) -> &BTreeMap<u32, FlowTable> {
        &self.tables
    }

    /// The entry store of one table.
    pub fn table_db(&self, global_id: u32) -> Option<&FlowTableDb> {
        self.table_dbs.get(&global_id)
    }

    /// Mutable entry store of one table.
    pub fn table_db_mut(&mut self, global_id: u32) -> Option<&mut FlowTableDb> {
        self.table_dbs.get_mut(&global_id)
    }

    /// All entry stores keyed by global table id.
    pub fn table_dbs(&self) -> &BTreeMap<u32, FlowTableDb> {
        &self.table_dbs
    }

    pub(crate) fn restore_table(&mut self, global_id: u32, table: FlowTable, db: FlowTableDb) {
        if let Some(ids) = self.table_ids[table.table_type as usize].as_mut() {
            ids.reserve(global_id);
        }

        self.tables.insert(global_id, table);
        self.table_dbs.insert(global_id, db);
    }
}
