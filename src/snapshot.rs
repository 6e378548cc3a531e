//! Database snapshots: a structured JSON dump of protocols, fields, metadata and per-switch
//! pipeline state, loadable at startup to repopulate the PM database before any connection
//! is admitted.

use crate::db::{DataTable, FieldDef, FlowTableDb, Protocol};
use crate::error::Error;
use crate::manager::PofManager;
use crate::wire::message::{GroupMod, MeterMod, ResourceReport};
use crate::wire::{Counter, FlowTable};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct SwitchSnapshot {
    device_id: u32,
    resources: Vec<ResourceReport>,
    tables: BTreeMap<u32, FlowTable>,
    entries: BTreeMap<u32, FlowTableDb>,
    counters: DataTable<Counter>,
    meters: DataTable<MeterMod>,
    groups: DataTable<GroupMod>,
}

/// The on-disk document. The schema of the fields is the contract; the encoding (JSON) is
/// an implementation detail.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    protocols: Vec<Protocol>,
    fields: Vec<FieldDef>,
    metadata: Vec<FieldDef>,
    switches: Vec<SwitchSnapshot>,
}

/// Write a snapshot of the manager's database to `path`.
pub fn save(manager: &PofManager, path: &Path) -> Result<(), Error> {
    let db = manager.database();

    let switches = db
        .switch_ids()
        .into_iter()
        .filter_map(|device_id| {
            let switch = db.switch(device_id).ok()?;

            Some(SwitchSnapshot {
                device_id,
                resources: switch.resources_map().values().cloned().collect(),
                tables: switch.tables().clone(),
                entries: switch.table_dbs().clone(),
                counters: switch.counters.clone(),
                meters: switch.meters.clone(),
                groups: switch.groups.clone(),
            })
        })
        .collect();

    let snapshot = Snapshot {
        protocols: db.protocols().cloned().collect(),
        fields: db.all_fields().into_iter().cloned().collect(),
        metadata: db.metadata().to_vec(),
        switches,
    };

    let body = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| {
            log::error!("snapshot encode failed: {}", e);

            Error::InvalidArgument("snapshot encode")
        })?;

    fs::write(path, body)?;

    log::info!("saved database snapshot to {}", path.display());

    Ok(())
}

/// Load a snapshot from `path` into the manager's database.
///
/// Intended for startup, before the listener admits connections; restored state keeps its
/// original ids, and all id pools resume past the highest restored id.
pub fn load(manager: &mut PofManager, path: &Path) -> Result<(), Error> {
    let body = fs::read(path)?;

    let snapshot: Snapshot = serde_json::from_slice(&body).map_err(|e| {
        log::error!("snapshot parse failed: {}", e);

        Error::InvalidArgument("snapshot parse")
    })?;

    let db = manager.database_mut();

    for field in snapshot.fields {
        db.restore_field(field);
    }

    for protocol in snapshot.protocols {
        db.restore_protocol(protocol);
    }

    db.set_metadata(snapshot.metadata);

    for switch in snapshot.switches {
        if db.switch(switch.device_id).is_err() {
            db.add_switch(switch.device_id)?;
        }

        for report in switch.resources {
            db.set_resource_report(switch.device_id, report)?;
        }

        for (global_id, table) in switch.tables {
            let entries = switch
                .entries
                .get(&global_id)
                .cloned()
                .unwrap_or_default();

            db.restore_table(switch.device_id, global_id, table, entries)?;
        }

        let state = db.switch_mut(switch.device_id)?;

        state.counters = switch.counters;
        state.meters = switch.meters;
        state.groups = switch.groups;
    }

    Ok(())
}
