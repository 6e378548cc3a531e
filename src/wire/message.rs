//! The POF message catalogue and its type-byte dispatch.
//!
//! Every message is the common 8-byte header followed by a fixed-layout body; only echo and
//! packet-in bodies are variable-length. [`Message::unpack`] decodes any catalogued message
//! from a framed buffer, and [`Message`]'s [`PofWireWrite`] impl emits the exact documented
//! byte length for each type.

use crate::wire::{
    action,
    counter::Counter,
    header::Header,
    instruction,
    match_field::{MatchX, StdMatch},
    port::PhyPort,
    table::{FlowTable, TableResource},
    wire_enum, CounterModCommand, FlowModCommand, GroupModCommand, GroupType, MeterModCommand,
    PacketInReason, PortReason, TableType, ACTION_SLOT_LEN, ERROR_STR_MAX_LEN,
    INSTRUCTION_SLOT_LEN, MAX_ACTIONS, MAX_INSTRUCTIONS, MAX_MATCH_FIELDS, MAX_TABLE_TYPES,
    NAME_MAX_LEN, NO_BUFFER, PACKET_IN_MAX_LEN, POF_VERSION,
};
use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError, WireReader, WireWriter};

wire_enum! {
    /// Message type byte.
    pub enum MessageKind: "message" {
        /// Version negotiation.
        Hello = 0,
        /// Switch-reported error.
        Error = 1,
        /// Keepalive request.
        EchoRequest = 2,
        /// Keepalive response.
        EchoReply = 3,
        /// Experimenter extension.
        Experimenter = 4,
        /// Ask for device features.
        FeaturesRequest = 5,
        /// Device features.
        FeaturesReply = 6,
        /// Ask for switch configuration.
        GetConfigRequest = 7,
        /// Switch configuration.
        GetConfigReply = 8,
        /// Set switch configuration.
        SetConfig = 9,
        /// Packet punted to the controller.
        PacketIn = 10,
        /// A flow entry expired or was deleted.
        FlowRemoved = 11,
        /// Port appeared/changed/went away.
        PortStatus = 12,
        /// Per-type table capacities and counter/meter/group pools.
        ResourceReport = 13,
        /// Packet injected by the controller.
        PacketOut = 14,
        /// Add/modify/delete a flow entry.
        FlowMod = 15,
        /// Add/modify/delete a group.
        GroupMod = 16,
        /// Modify a port.
        PortMod = 17,
        /// Add/modify/delete a flow table.
        TableMod = 18,
        /// Multipart request (framing only).
        MultipartRequest = 19,
        /// Multipart reply (framing only).
        MultipartReply = 20,
        /// Barrier request.
        BarrierRequest = 21,
        /// Barrier reply.
        BarrierReply = 22,
        /// Add/modify/delete a meter.
        MeterMod = 30,
        /// Install/free/clear a counter.
        CounterMod = 31,
        /// Query a counter.
        CounterRequest = 32,
        /// Counter query response.
        CounterReply = 33,
    }
}

bitflags::bitflags! {
    /// Switch capability bits reported by FEATURES_REPLY.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct Capabilities: u32 {
        /// Flow statistics.
        const FLOW_STATS = 1;
        /// Table statistics.
        const TABLE_STATS = 2;
        /// Port statistics.
        const PORT_STATS = 4;
        /// Group statistics.
        const GROUP_STATS = 8;
        /// IP reassembly.
        const IP_REASM = 32;
        /// Queue statistics.
        const QUEUE_STATS = 64;
        /// Port blocking.
        const PORT_BLOCKED = 256;
    }
}

/// Generates the body-less messages that are nothing but a header.
macro_rules! header_only_message {
    (
        $(#[$meta:meta])*
        $name:ident => $kind:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            /// Transaction id.
            pub xid: u32,
        }

        impl $name {
            /// Total packed length.
            pub const PACKED_LEN: usize = Header::LEN;

            /// Build with the given transaction id.
            pub fn new(xid: u32) -> Self {
                Self { xid }
            }
        }

        impl From<$name> for Message {
            fn from(msg: $name) -> Self {
                Message::$kind(msg)
            }
        }
    };
}

header_only_message! {
    /// Version negotiation; the controller sends one immediately on accept.
    Hello => Hello
}

header_only_message! {
    /// Request for a FEATURES_REPLY.
    FeaturesRequest => FeaturesRequest
}

header_only_message! {
    /// Request for a GET_CONFIG_REPLY.
    GetConfigRequest => GetConfigRequest
}

header_only_message! {
    /// Multipart request; only the framing is defined for this dialect.
    MultipartRequest => MultipartRequest
}

header_only_message! {
    /// Multipart reply; only the framing is defined for this dialect.
    MultipartReply => MultipartReply
}

header_only_message! {
    /// Barrier request.
    BarrierRequest => BarrierRequest
}

header_only_message! {
    /// Barrier reply.
    BarrierReply => BarrierReply
}

/// ERROR: a switch-reported failure (280 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMsg {
    /// Transaction id, usually echoing the offending request.
    pub xid: u32,
    /// Error type, see [`error_type_name`].
    pub error_type: u16,
    /// Error code within the type, see [`error_code_name`].
    pub error_code: u16,
    /// Reporting device.
    pub device_id: u32,
    /// Reporting slot.
    pub slot_id: u16,
    /// Free-form message bytes (at most 256).
    pub data: Vec<u8>,
}

impl ErrorMsg {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + 16 + ERROR_STR_MAX_LEN;

    /// Human-readable `type/code` rendering for log lines.
    pub fn describe(&self) -> String {
        let type_name = error_type_name(self.error_type);

        match error_code_name(self.error_type, self.error_code) {
            Some(code_name) => format!("{} ({})", type_name, code_name),
            None => format!("{} (code {})", type_name, self.error_code),
        }
    }

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        if self.data.len() > ERROR_STR_MAX_LEN {
            return Err(WireError::TooLong);
        }

        writer.put(&self.error_type)?;
        writer.put(&self.error_code)?;
        writer.put(&self.device_id)?;
        writer.put(&self.slot_id)?;
        writer.pad(6)?;
        writer.put_bytes(&self.data)?;
        writer.pad(ERROR_STR_MAX_LEN - self.data.len())
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let error_type = reader.take()?;
        let error_code = reader.take()?;
        let device_id = reader.take()?;
        let slot_id = reader.take()?;
        reader.skip(6)?;

        let raw = reader.slice(ERROR_STR_MAX_LEN)?;
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);

        Ok(Self {
            xid,
            error_type,
            error_code,
            device_id,
            slot_id,
            data: raw[..end].to_vec(),
        })
    }
}

/// ECHO_REQUEST: keepalive with an arbitrary body the peer must echo back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoRequest {
    /// Transaction id.
    pub xid: u32,
    /// Opaque body.
    pub body: Vec<u8>,
}

impl EchoRequest {
    /// Build with the given transaction id and an empty body.
    pub fn new(xid: u32) -> Self {
        Self {
            xid,
            body: Vec::new(),
        }
    }

    /// The reply this request expects: same xid, same body.
    pub fn reply(&self) -> EchoReply {
        EchoReply {
            xid: self.xid,
            body: self.body.clone(),
        }
    }
}

/// ECHO_REPLY: response to an [`EchoRequest`], body unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoReply {
    /// Transaction id of the request.
    pub xid: u32,
    /// Body copied from the request.
    pub body: Vec<u8>,
}

/// EXPERIMENTER: opaque extension message (12 bytes).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Experimenter {
    /// Transaction id.
    pub xid: u32,
    /// Experimenter id.
    pub experimenter: u32,
}

/// FEATURES_REPLY: device identity and engine names (216 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeaturesReply {
    /// Transaction id.
    pub xid: u32,
    /// Device id; becomes the controller-side switch key.
    pub device_id: u32,
    /// Reporting slot.
    pub slot_id: u16,
    /// Number of ports; the handshake waits for this many PORT_STATUS messages.
    pub port_num: u16,
    /// Number of tables.
    pub table_num: u16,
    /// Capability bits.
    pub capabilities: Capabilities,
    /// Vendor name.
    pub experimenter_name: String,
    /// Forwarding engine name.
    pub forward_engine_name: String,
    /// Lookup engine name.
    pub lookup_engine_name: String,
}

impl FeaturesReply {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + 16 + 3 * NAME_MAX_LEN;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.device_id)?;
        writer.put(&self.slot_id)?;
        writer.put(&self.port_num)?;
        writer.put(&self.table_num)?;
        writer.pad(2)?;
        writer.put(&self.capabilities.bits())?;
        writer.put_zstr(&self.experimenter_name, NAME_MAX_LEN)?;
        writer.put_zstr(&self.forward_engine_name, NAME_MAX_LEN)?;
        writer.put_zstr(&self.lookup_engine_name, NAME_MAX_LEN)
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let device_id = reader.take()?;
        let slot_id = reader.take()?;
        let port_num = reader.take()?;
        let table_num = reader.take()?;
        reader.skip(2)?;
        let capabilities = Capabilities::from_bits_retain(reader.take()?);

        Ok(Self {
            xid,
            device_id,
            slot_id,
            port_num,
            table_num,
            capabilities,
            experimenter_name: reader.take_zstr(NAME_MAX_LEN)?,
            forward_engine_name: reader.take_zstr(NAME_MAX_LEN)?,
            lookup_engine_name: reader.take_zstr(NAME_MAX_LEN)?,
        })
    }
}

/// GET_CONFIG_REPLY: current switch configuration (16 bytes).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GetConfigReply {
    /// Transaction id of the request.
    pub xid: u32,
    /// Reporting device.
    pub device_id: u32,
    /// Fragmentation handling flags.
    pub flags: u16,
    /// Bytes of each punted packet sent to the controller.
    pub miss_send_len: u16,
}

/// SET_CONFIG: set switch configuration (12 bytes).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SetConfig {
    /// Transaction id.
    pub xid: u32,
    /// Fragmentation handling flags.
    pub flags: u16,
    /// Bytes of each punted packet sent to the controller.
    pub miss_send_len: u16,
}

/// PACKET_IN: a packet (or its prefix) punted to the controller (32 bytes + payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    /// Transaction id.
    pub xid: u32,
    /// Switch buffer holding the full packet, or [`NO_BUFFER`].
    pub buffer_id: u32,
    /// Full length of the punted packet.
    pub total_len: u16,
    /// Why the packet was punted.
    pub reason: PacketInReason,
    /// Table the miss/action happened in.
    pub table_id: u8,
    /// Cookie of the matching entry.
    pub cookie: u64,
    /// Reporting device.
    pub device_id: u32,
    /// Combined slot and port id of ingress.
    pub slot_port_id: u32,
    /// Packet bytes.
    pub data: Vec<u8>,
}

impl Default for PacketIn {
    fn default() -> Self {
        Self {
            xid: 0,
            buffer_id: NO_BUFFER,
            total_len: 0,
            reason: PacketInReason::NoMatch,
            table_id: 0,
            cookie: 0,
            device_id: 0,
            slot_port_id: 0,
            data: Vec::new(),
        }
    }
}

impl PacketIn {
    /// Packed length of the fixed prefix, header included.
    pub const FIXED_LEN: usize = 32;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.buffer_id)?;
        writer.put(&self.total_len)?;
        writer.put(&self.reason)?;
        writer.put(&self.table_id)?;
        writer.put(&self.cookie)?;
        writer.put(&self.device_id)?;
        writer.put(&self.slot_port_id)?;
        writer.put_bytes(&self.data)
    }

    fn unpack_body(
        xid: u32,
        reader: &mut WireReader<'_>,
        length: usize,
    ) -> Result<Self, WireError> {
        let payload_len = length
            .checked_sub(Self::FIXED_LEN)
            .ok_or(WireError::InvalidValue("packet-in length"))?;

        let buffer_id = reader.take()?;
        let total_len = reader.take()?;
        let reason = reader.take()?;
        let table_id = reader.take()?;
        let cookie = reader.take()?;
        let device_id = reader.take()?;
        let slot_port_id = reader.take()?;

        let data = reader.slice(payload_len)?.to_vec();

        Ok(Self {
            xid,
            buffer_id,
            total_len,
            reason,
            table_id,
            cookie,
            device_id,
            slot_port_id,
            data,
        })
    }
}

/// FLOW_REMOVED: a flow entry expired or was deleted (88 bytes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRemoved {
    /// Transaction id.
    pub xid: u32,
    /// Legacy fixed-layout match of the removed entry.
    pub matched: StdMatch,
    /// Entry cookie.
    pub cookie: u64,
    /// Entry priority.
    pub priority: u16,
    /// Removal reason (idle/hard timeout, delete).
    pub reason: u8,
    /// Lifetime seconds.
    pub duration_sec: u32,
    /// Lifetime nanoseconds beyond `duration_sec`.
    pub duration_nsec: u32,
    /// Idle timeout the entry had.
    pub idle_timeout: u16,
    /// Packets matched.
    pub packet_count: u64,
    /// Bytes matched.
    pub byte_count: u64,
}

impl FlowRemoved {
    /// Total packed length.
    pub const PACKED_LEN: usize = 88;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.matched)?;
        writer.put(&self.cookie)?;
        writer.put(&self.priority)?;
        writer.put(&self.reason)?;
        writer.pad(1)?;
        writer.put(&self.duration_sec)?;
        writer.put(&self.duration_nsec)?;
        writer.put(&self.idle_timeout)?;
        writer.pad(2)?;
        writer.put(&self.packet_count)?;
        writer.put(&self.byte_count)
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let matched = reader.take()?;
        let cookie = reader.take()?;
        let priority = reader.take()?;
        let reason = reader.take()?;
        reader.skip(1)?;
        let duration_sec = reader.take()?;
        let duration_nsec = reader.take()?;
        let idle_timeout = reader.take()?;
        reader.skip(2)?;

        Ok(Self {
            xid,
            matched,
            cookie,
            priority,
            reason,
            duration_sec,
            duration_nsec,
            idle_timeout,
            packet_count: reader.take()?,
            byte_count: reader.take()?,
        })
    }
}

/// PORT_STATUS: a port appeared, changed or went away (136 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    /// Transaction id.
    pub xid: u32,
    /// What happened to the port.
    pub reason: PortReason,
    /// Port description.
    pub desc: PhyPort,
}

impl PortStatus {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + 8 + PhyPort::PACKED_LEN;
}

/// PORT_MOD: controller-requested port change (136 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMod {
    /// Transaction id.
    pub xid: u32,
    /// Change kind; MODIFY for attribute updates.
    pub reason: PortReason,
    /// Desired port description.
    pub desc: PhyPort,
}

impl PortMod {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + 8 + PhyPort::PACKED_LEN;
}

fn pack_port_body(
    writer: &mut WireWriter<'_>,
    reason: PortReason,
    desc: &PhyPort,
) -> Result<(), WireError> {
    writer.put(&reason)?;
    writer.pad(7)?;
    writer.put(desc)
}

fn unpack_port_body(reader: &mut WireReader<'_>) -> Result<(PortReason, PhyPort), WireError> {
    let reason = reader.take()?;
    reader.skip(7)?;

    Ok((reason, reader.take()?))
}

/// RESOURCE_REPORT: counter/meter/group pool sizes plus one capacity record per table type
/// (88 bytes).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResourceReport {
    /// Transaction id.
    pub xid: u32,
    /// Resource kind; 0 = flow table resources.
    pub resource_type: u8,
    /// Reporting slot.
    pub slot_id: u16,
    /// Counter pool size.
    pub counter_num: u32,
    /// Meter pool size.
    pub meter_num: u32,
    /// Group pool size.
    pub group_num: u32,
    /// Capacity per table type, in [`TableType::ALL`] order.
    pub table_resources: [TableResource; MAX_TABLE_TYPES],
}

impl ResourceReport {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + 16 + MAX_TABLE_TYPES * TableResource::PACKED_LEN;

    /// The capacity record for one table type.
    pub fn resource_for(&self, table_type: TableType) -> &TableResource {
        &self.table_resources[table_type as usize]
    }

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.resource_type)?;
        writer.pad(1)?;
        writer.put(&self.slot_id)?;
        writer.put(&self.counter_num)?;
        writer.put(&self.meter_num)?;
        writer.put(&self.group_num)?;

        for resource in &self.table_resources {
            writer.put(resource)?;
        }

        Ok(())
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let resource_type = reader.take()?;
        reader.skip(1)?;
        let slot_id = reader.take()?;
        let counter_num = reader.take()?;
        let meter_num = reader.take()?;
        let group_num = reader.take()?;

        let mut table_resources = [TableResource {
            device_id: 0,
            table_type: TableType::Mm,
            table_num: 0,
            key_length: 0,
            total_size: 0,
        }; MAX_TABLE_TYPES];

        for slot in &mut table_resources {
            *slot = reader.take()?;
        }

        Ok(Self {
            xid,
            resource_type,
            slot_id,
            counter_num,
            meter_num,
            group_num,
            table_resources,
        })
    }
}

/// PACKET_OUT: controller-injected packet with up to 6 actions (2360 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    /// Transaction id.
    pub xid: u32,
    /// Switch buffer to send instead of `data`, or [`NO_BUFFER`].
    pub buffer_id: u32,
    /// Ingress port the packet should appear to arrive on.
    pub in_port: u32,
    /// Actions applied to the packet, in order.
    pub actions: heapless::Vec<crate::wire::Action, MAX_ACTIONS>,
    /// Packet bytes (at most 2048).
    pub data: Vec<u8>,
}

impl PacketOut {
    /// Total packed length.
    pub const PACKED_LEN: usize =
        Header::LEN + 16 + MAX_ACTIONS * ACTION_SLOT_LEN + PACKET_IN_MAX_LEN;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        if self.data.len() > PACKET_IN_MAX_LEN {
            return Err(WireError::TooLong);
        }

        writer.put(&self.buffer_id)?;
        writer.put(&self.in_port)?;
        writer.put(&(self.actions.len() as u8))?;
        writer.pad(3)?;
        writer.put(&(self.data.len() as u32))?;
        action::pack_slots(writer, &self.actions)?;
        writer.put_bytes(&self.data)?;
        writer.pad(PACKET_IN_MAX_LEN - self.data.len())
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let buffer_id = reader.take()?;
        let in_port = reader.take()?;
        let action_num = reader.take::<u8>()?;
        reader.skip(3)?;
        let data_len = reader.take::<u32>()? as usize;

        if data_len > PACKET_IN_MAX_LEN {
            return Err(WireError::InvalidValue("packet-out data length"));
        }

        let actions = action::unpack_slots(reader, usize::from(action_num))?;
        let data = reader.slice(data_len)?.to_vec();
        reader.skip(PACKET_IN_MAX_LEN - data_len)?;

        Ok(Self {
            xid,
            buffer_id,
            in_port,
            actions,
            data,
        })
    }
}

/// FLOW_MOD: add/modify/delete one flow entry (2192 bytes).
///
/// The same record is also the controller-side representation of an installed entry; the
/// `command` byte distinguishes the three operations on the wire.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlowMod {
    /// Transaction id.
    pub xid: u32,
    /// Add, modify or delete.
    pub command: FlowModCommand,
    /// Attached counter id; 0 when counting is disabled.
    pub counter_id: u32,
    /// Opaque cookie.
    pub cookie: u64,
    /// Cookie mask.
    pub cookie_mask: u64,
    /// Type-local table id.
    pub table_id: u8,
    /// Table type.
    pub table_type: TableType,
    /// Idle timeout in seconds, 0 = permanent.
    pub idle_timeout: u16,
    /// Hard timeout in seconds, 0 = permanent.
    pub hard_timeout: u16,
    /// Matching priority.
    pub priority: u16,
    /// Entry index within the table.
    pub index: u32,
    /// Match key; sum of field lengths must equal the table key length.
    pub matches: heapless::Vec<MatchX, MAX_MATCH_FIELDS>,
    /// Instruction program, up to 6 entries.
    pub instructions: heapless::Vec<crate::wire::Instruction, MAX_INSTRUCTIONS>,
}

impl FlowMod {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN
        + 40
        + MAX_MATCH_FIELDS * MatchX::PACKED_LEN
        + MAX_INSTRUCTIONS * INSTRUCTION_SLOT_LEN;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.command)?;
        writer.put(&(self.matches.len() as u8))?;
        writer.put(&(self.instructions.len() as u8))?;
        writer.pad(1)?;
        writer.put(&self.counter_id)?;
        writer.put(&self.cookie)?;
        writer.put(&self.cookie_mask)?;
        writer.put(&self.table_id)?;
        writer.put(&self.table_type)?;
        writer.put(&self.idle_timeout)?;
        writer.put(&self.hard_timeout)?;
        writer.put(&self.priority)?;
        writer.put(&self.index)?;
        writer.pad(4)?;

        let match_region = writer.pos();

        for matchx in &self.matches {
            writer.put(matchx)?;
        }

        writer.pad_to(match_region + MAX_MATCH_FIELDS * MatchX::PACKED_LEN)?;

        instruction::pack_slots(writer, &self.instructions)
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let command = reader.take()?;
        let match_field_num = reader.take::<u8>()?;
        let instruction_num = reader.take::<u8>()?;
        reader.skip(1)?;
        let counter_id = reader.take()?;
        let cookie = reader.take()?;
        let cookie_mask = reader.take()?;
        let table_id = reader.take()?;
        let table_type = reader.take()?;
        let idle_timeout = reader.take()?;
        let hard_timeout = reader.take()?;
        let priority = reader.take()?;
        let index = reader.take()?;
        reader.skip(4)?;

        if usize::from(match_field_num) > MAX_MATCH_FIELDS {
            return Err(WireError::InvalidValue("match field count"));
        }

        let mut matches = heapless::Vec::new();

        for slot in 0..MAX_MATCH_FIELDS {
            let matchx = reader.take::<MatchX>()?;

            if slot < usize::from(match_field_num) {
                matches.push(matchx).ok();
            }
        }

        let instructions = instruction::unpack_slots(reader, usize::from(instruction_num))?;

        Ok(Self {
            xid,
            command,
            counter_id,
            cookie,
            cookie_mask,
            table_id,
            table_type,
            idle_timeout,
            hard_timeout,
            priority,
            index,
            matches,
            instructions,
        })
    }
}

/// GROUP_MOD: add/modify/delete one group (312 bytes).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupMod {
    /// Transaction id.
    pub xid: u32,
    /// Add, modify or delete.
    pub command: GroupModCommand,
    /// Group semantics.
    pub group_type: GroupType,
    /// Group id from the controller pool.
    pub group_id: u32,
    /// Counter attached to the group.
    pub counter_id: u32,
    /// Bucket actions, up to 6.
    pub actions: heapless::Vec<crate::wire::Action, MAX_ACTIONS>,
}

impl GroupMod {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + 16 + MAX_ACTIONS * ACTION_SLOT_LEN;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.command)?;
        writer.put(&self.group_type)?;
        writer.put(&(self.actions.len() as u8))?;
        writer.pad(1)?;
        writer.put(&self.group_id)?;
        writer.put(&self.counter_id)?;
        writer.pad(4)?;
        action::pack_slots(writer, &self.actions)
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let command = reader.take()?;
        let group_type = reader.take()?;
        let action_num = reader.take::<u8>()?;
        reader.skip(1)?;
        let group_id = reader.take()?;
        let counter_id = reader.take()?;
        reader.skip(4)?;
        let actions = action::unpack_slots(reader, usize::from(action_num))?;

        Ok(Self {
            xid,
            command,
            group_type,
            group_id,
            counter_id,
            actions,
        })
    }
}

/// TABLE_MOD: add/modify/delete one flow table (152 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMod {
    /// Transaction id.
    pub xid: u32,
    /// Table definition, including the command byte.
    pub table: FlowTable,
}

impl TableMod {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + FlowTable::PACKED_LEN;
}

/// METER_MOD: add/modify/delete one meter (24 bytes).
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MeterMod {
    /// Transaction id.
    pub xid: u32,
    /// Add, modify or delete.
    pub command: MeterModCommand,
    /// Target slot.
    pub slot_id: u16,
    /// Meter id from the controller pool.
    pub meter_id: u32,
    /// Rate limit in kbps.
    pub rate: u32,
}

impl MeterMod {
    /// Total packed length.
    pub const PACKED_LEN: usize = 24;

    fn pack_body(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        writer.put(&self.command)?;
        writer.pad(1)?;
        writer.put(&self.slot_id)?;
        writer.put(&self.meter_id)?;
        writer.put(&self.rate)?;
        writer.pad(4)
    }

    fn unpack_body(xid: u32, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let command = reader.take()?;
        reader.skip(1)?;
        let slot_id = reader.take()?;
        let meter_id = reader.take()?;
        let rate = reader.take()?;
        reader.skip(4)?;

        Ok(Self {
            xid,
            command,
            slot_id,
            meter_id,
            rate,
        })
    }
}

/// COUNTER_MOD / COUNTER_REQUEST / COUNTER_REPLY: one counter record after the header
/// (32 bytes each).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CounterCarrier {
    /// Transaction id.
    pub xid: u32,
    /// The carried counter.
    pub counter: Counter,
}

impl CounterCarrier {
    /// Total packed length.
    pub const PACKED_LEN: usize = Header::LEN + Counter::PACKED_LEN;

    /// Build a carrier for `counter`.
    pub fn new(xid: u32, counter: Counter) -> Self {
        Self { xid, counter }
    }

    /// A COUNTER_REQUEST querying `counter_id`.
    pub fn query(xid: u32, counter_id: u32) -> Self {
        Self::new(xid, Counter::new(CounterModCommand::Query, counter_id))
    }
}

/// A decoded POF message of any catalogued type.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Type 0.
    Hello(Hello),
    /// Type 1.
    Error(ErrorMsg),
    /// Type 2.
    EchoRequest(EchoRequest),
    /// Type 3.
    EchoReply(EchoReply),
    /// Type 4.
    Experimenter(Experimenter),
    /// Type 5.
    FeaturesRequest(FeaturesRequest),
    /// Type 6.
    FeaturesReply(FeaturesReply),
    /// Type 7.
    GetConfigRequest(GetConfigRequest),
    /// Type 8.
    GetConfigReply(GetConfigReply),
    /// Type 9.
    SetConfig(SetConfig),
    /// Type 10.
    PacketIn(PacketIn),
    /// Type 11.
    FlowRemoved(FlowRemoved),
    /// Type 12.
    PortStatus(PortStatus),
    /// Type 13.
    ResourceReport(ResourceReport),
    /// Type 14.
    PacketOut(PacketOut),
    /// Type 15.
    FlowMod(FlowMod),
    /// Type 16.
    GroupMod(GroupMod),
    /// Type 17.
    PortMod(PortMod),
    /// Type 18.
    TableMod(TableMod),
    /// Type 19.
    MultipartRequest(MultipartRequest),
    /// Type 20.
    MultipartReply(MultipartReply),
    /// Type 21.
    BarrierRequest(BarrierRequest),
    /// Type 22.
    BarrierReply(BarrierReply),
    /// Type 30.
    MeterMod(MeterMod),
    /// Type 31.
    CounterMod(CounterCarrier),
    /// Type 32.
    CounterRequest(CounterCarrier),
    /// Type 33.
    CounterReply(CounterCarrier),
}

impl Message {
    /// The message type.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello(_) => MessageKind::Hello,
            Message::Error(_) => MessageKind::Error,
            Message::EchoRequest(_) => MessageKind::EchoRequest,
            Message::EchoReply(_) => MessageKind::EchoReply,
            Message::Experimenter(_) => MessageKind::Experimenter,
            Message::FeaturesRequest(_) => MessageKind::FeaturesRequest,
            Message::FeaturesReply(_) => MessageKind::FeaturesReply,
            Message::GetConfigRequest(_) => MessageKind::GetConfigRequest,
            Message::GetConfigReply(_) => MessageKind::GetConfigReply,
            Message::SetConfig(_) => MessageKind::SetConfig,
            Message::PacketIn(_) => MessageKind::PacketIn,
            Message::FlowRemoved(_) => MessageKind::FlowRemoved,
            Message::PortStatus(_) => MessageKind::PortStatus,
            Message::ResourceReport(_) => MessageKind::ResourceReport,
            Message::PacketOut(_) => MessageKind::PacketOut,
            Message::FlowMod(_) => MessageKind::FlowMod,
            Message::GroupMod(_) => MessageKind::GroupMod,
            Message::PortMod(_) => MessageKind::PortMod,
            Message::TableMod(_) => MessageKind::TableMod,
            Message::MultipartRequest(_) => MessageKind::MultipartRequest,
            Message::MultipartReply(_) => MessageKind::MultipartReply,
            Message::BarrierRequest(_) => MessageKind::BarrierRequest,
            Message::BarrierReply(_) => MessageKind::BarrierReply,
            Message::MeterMod(_) => MessageKind::MeterMod,
            Message::CounterMod(_) => MessageKind::CounterMod,
            Message::CounterRequest(_) => MessageKind::CounterRequest,
            Message::CounterReply(_) => MessageKind::CounterReply,
        }
    }

    /// The transaction id.
    pub fn xid(&self) -> u32 {
        match self {
            Message::Hello(msg) => msg.xid,
            Message::Error(msg) => msg.xid,
            Message::EchoRequest(msg) => msg.xid,
            Message::EchoReply(msg) => msg.xid,
            Message::Experimenter(msg) => msg.xid,
            Message::FeaturesRequest(msg) => msg.xid,
            Message::FeaturesReply(msg) => msg.xid,
            Message::GetConfigRequest(msg) => msg.xid,
            Message::GetConfigReply(msg) => msg.xid,
            Message::SetConfig(msg) => msg.xid,
            Message::PacketIn(msg) => msg.xid,
            Message::FlowRemoved(msg) => msg.xid,
            Message::PortStatus(msg) => msg.xid,
            Message::ResourceReport(msg) => msg.xid,
            Message::PacketOut(msg) => msg.xid,
            Message::FlowMod(msg) => msg.xid,
            Message::GroupMod(msg) => msg.xid,
            Message::PortMod(msg) => msg.xid,
            Message::TableMod(msg) => msg.xid,
            Message::MultipartRequest(msg) => msg.xid,
            Message::MultipartReply(msg) => msg.xid,
            Message::BarrierRequest(msg) => msg.xid,
            Message::BarrierReply(msg) => msg.xid,
            Message::MeterMod(msg) => msg.xid,
            Message::CounterMod(msg) => msg.xid,
            Message::CounterRequest(msg) => msg.xid,
            Message::CounterReply(msg) => msg.xid,
        }
    }

    /// Total packed length, header included.
    pub fn wire_len(&self) -> usize {
        match self {
            Message::Hello(_)
            | Message::FeaturesRequest(_)
            | Message::GetConfigRequest(_)
            | Message::MultipartRequest(_)
            | Message::MultipartReply(_)
            | Message::BarrierRequest(_)
            | Message::BarrierReply(_) => Header::LEN,
            Message::Error(_) => ErrorMsg::PACKED_LEN,
            Message::EchoRequest(msg) => Header::LEN + msg.body.len(),
            Message::EchoReply(msg) => Header::LEN + msg.body.len(),
            Message::Experimenter(_) => 12,
            Message::FeaturesReply(_) => FeaturesReply::PACKED_LEN,
            Message::GetConfigReply(_) => 16,
            Message::SetConfig(_) => 12,
            Message::PacketIn(msg) => PacketIn::FIXED_LEN + msg.data.len(),
            Message::FlowRemoved(_) => FlowRemoved::PACKED_LEN,
            Message::PortStatus(_) => PortStatus::PACKED_LEN,
            Message::ResourceReport(_) => ResourceReport::PACKED_LEN,
            Message::PacketOut(_) => PacketOut::PACKED_LEN,
            Message::FlowMod(_) => FlowMod::PACKED_LEN,
            Message::GroupMod(_) => GroupMod::PACKED_LEN,
            Message::PortMod(_) => PortMod::PACKED_LEN,
            Message::TableMod(_) => TableMod::PACKED_LEN,
            Message::MeterMod(_) => MeterMod::PACKED_LEN,
            Message::CounterMod(_) | Message::CounterRequest(_) | Message::CounterReply(_) => {
                CounterCarrier::PACKED_LEN
            }
        }
    }

    /// Decode one framed message.
    ///
    /// `buf` must hold the complete message (the connection layer buffers until the header's
    /// `length` bytes are available). A version byte other than [`POF_VERSION`] is rejected
    /// for everything except an incoming HELLO.
    pub fn unpack(buf: &[u8]) -> Result<Self, WireError> {
        let header = Header::unpack_from_slice(buf)?;
        let length = usize::from(header.length);

        if length < Header::LEN {
            return Err(WireError::InvalidValue("message length"));
        }

        if header.version != POF_VERSION && header.kind != u8::from(MessageKind::Hello) {
            return Err(WireError::Version(header.version));
        }

        let kind = MessageKind::try_from(header.kind)?;

        if buf.len() < length {
            return Err(WireError::ReadBufferUnderrun {
                wanted: length,
                available: buf.len(),
            });
        }

        let mut reader = WireReader::new(&buf[Header::LEN..length]);
        let body_len = length - Header::LEN;
        let xid = header.xid;

        let message = match kind {
            MessageKind::Hello => Message::Hello(Hello::new(xid)),
            MessageKind::Error => Message::Error(ErrorMsg::unpack_body(xid, &mut reader)?),
            MessageKind::EchoRequest => Message::EchoRequest(EchoRequest {
                xid,
                body: reader.slice(body_len)?.to_vec(),
            }),
            MessageKind::EchoReply => Message::EchoReply(EchoReply {
                xid,
                body: reader.slice(body_len)?.to_vec(),
            }),
            MessageKind::Experimenter => Message::Experimenter(Experimenter {
                xid,
                experimenter: reader.take()?,
            }),
            MessageKind::FeaturesRequest => Message::FeaturesRequest(FeaturesRequest::new(xid)),
            MessageKind::FeaturesReply => {
                Message::FeaturesReply(FeaturesReply::unpack_body(xid, &mut reader)?)
            }
            MessageKind::GetConfigRequest => Message::GetConfigRequest(GetConfigRequest::new(xid)),
            MessageKind::GetConfigReply => Message::GetConfigReply(GetConfigReply {
                xid,
                device_id: reader.take()?,
                flags: reader.take()?,
                miss_send_len: reader.take()?,
            }),
            MessageKind::SetConfig => Message::SetConfig(SetConfig {
                xid,
                flags: reader.take()?,
                miss_send_len: reader.take()?,
            }),
            MessageKind::PacketIn => {
                Message::PacketIn(PacketIn::unpack_body(xid, &mut reader, length)?)
            }
            MessageKind::FlowRemoved => {
                Message::FlowRemoved(FlowRemoved::unpack_body(xid, &mut reader)?)
            }
            MessageKind::PortStatus => {
                let (reason, desc) = unpack_port_body(&mut reader)?;

                Message::PortStatus(PortStatus { xid, reason, desc })
            }
            MessageKind::ResourceReport => {
                Message::ResourceReport(ResourceReport::unpack_body(xid, &mut reader)?)
            }
            MessageKind::PacketOut => Message::PacketOut(PacketOut::unpack_body(xid, &mut reader)?),
            MessageKind::FlowMod => Message::FlowMod(FlowMod::unpack_body(xid, &mut reader)?),
            MessageKind::GroupMod => Message::GroupMod(GroupMod::unpack_body(xid, &mut reader)?),
            MessageKind::PortMod => {
                let (reason, desc) = unpack_port_body(&mut reader)?;

                Message::PortMod(PortMod { xid, reason, desc })
            }
            MessageKind::TableMod => Message::TableMod(TableMod {
                xid,
                table: reader.take()?,
            }),
            MessageKind::MultipartRequest => Message::MultipartRequest(MultipartRequest::new(xid)),
            MessageKind::MultipartReply => Message::MultipartReply(MultipartReply::new(xid)),
            MessageKind::BarrierRequest => Message::BarrierRequest(BarrierRequest::new(xid)),
            MessageKind::BarrierReply => Message::BarrierReply(BarrierReply::new(xid)),
            MessageKind::MeterMod => Message::MeterMod(MeterMod::unpack_body(xid, &mut reader)?),
            MessageKind::CounterMod => Message::CounterMod(CounterCarrier {
                xid,
                counter: reader.take()?,
            }),
            MessageKind::CounterRequest => Message::CounterRequest(CounterCarrier {
                xid,
                counter: reader.take()?,
            }),
            MessageKind::CounterReply => Message::CounterReply(CounterCarrier {
                xid,
                counter: reader.take()?,
            }),
        };

        reader.finish(body_len)?;

        Ok(message)
    }
}

impl PofWireWrite for Message {
    fn packed_len(&self) -> usize {
        self.wire_len()
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let len = self.wire_len();
        let mut writer = WireWriter::new(buf);

        writer.put(&Header::new(self.kind(), len, self.xid()))?;

        match self {
            Message::Hello(_)
            | Message::FeaturesRequest(_)
            | Message::GetConfigRequest(_)
            | Message::MultipartRequest(_)
            | Message::MultipartReply(_)
            | Message::BarrierRequest(_)
            | Message::BarrierReply(_) => {}
            Message::Error(msg) => msg.pack_body(&mut writer)?,
            Message::EchoRequest(msg) => writer.put_bytes(&msg.body)?,
            Message::EchoReply(msg) => writer.put_bytes(&msg.body)?,
            Message::Experimenter(msg) => writer.put(&msg.experimenter)?,
            Message::FeaturesReply(msg) => msg.pack_body(&mut writer)?,
            Message::GetConfigReply(msg) => {
                writer.put(&msg.device_id)?;
                writer.put(&msg.flags)?;
                writer.put(&msg.miss_send_len)?;
            }
            Message::SetConfig(msg) => {
                writer.put(&msg.flags)?;
                writer.put(&msg.miss_send_len)?;
            }
            Message::PacketIn(msg) => msg.pack_body(&mut writer)?,
            Message::FlowRemoved(msg) => msg.pack_body(&mut writer)?,
            Message::PortStatus(msg) => pack_port_body(&mut writer, msg.reason, &msg.desc)?,
            Message::ResourceReport(msg) => msg.pack_body(&mut writer)?,
            Message::PacketOut(msg) => msg.pack_body(&mut writer)?,
            Message::FlowMod(msg) => msg.pack_body(&mut writer)?,
            Message::GroupMod(msg) => msg.pack_body(&mut writer)?,
            Message::PortMod(msg) => pack_port_body(&mut writer, msg.reason, &msg.desc)?,
            Message::TableMod(msg) => writer.put(&msg.table)?,
            Message::MeterMod(msg) => msg.pack_body(&mut writer)?,
            Message::CounterMod(msg) | Message::CounterRequest(msg) | Message::CounterReply(msg) => {
                writer.put(&msg.counter)?
            }
        }

        writer.finish(len)?;

        Ok(&buf[0..len])
    }
}

/// Human-readable name for an ERROR message's `type` field.
pub fn error_type_name(error_type: u16) -> &'static str {
    match error_type {
        0 => "HELLO_FAILED",
        1 => "BAD_REQUEST",
        2 => "BAD_ACTION",
        3 => "BAD_INSTRUCTION",
        4 => "BAD_MATCH",
        5 => "FLOW_MOD_FAILED",
        6 => "GROUP_MOD_FAILED",
        7 => "PORT_MOD_FAILED",
        8 => "TABLE_MOD_FAILED",
        9 => "QUEUE_OP_FAILED",
        10 => "SWITCH_CONFIG_FAILED",
        11 => "ROLE_REQUEST_FAILED",
        12 => "METER_MOD_FAILED",
        13 => "TABLE_FEATURES_FAILED",
        14 => "SOFTWARE_FAILED",
        0xffff => "EXPERIMENTER_ERROR",
        _ => "UNKNOWN_ERROR_TYPE",
    }
}

/// Human-readable name for an ERROR message's `code` within its `type`, where defined.
pub fn error_code_name(error_type: u16, code: u16) -> Option<&'static str> {
    let name = match (error_type, code) {
        (0, 0) => "INCOMPATIBLE",
        (0, 1) => "EPERM",

        (1, 0) => "BAD_VERSION",
        (1, 1) => "BAD_TYPE",
        (1, 2) => "BAD_MULTIPART",
        (1, 3) => "BAD_EXPERIMENTER",
        (1, 4) => "BAD_EXPERIMENTER_TYPE",
        (1, 5) => "EPERM",
        (1, 6) => "BAD_LEN",
        (1, 7) => "BUFFER_EMPTY",
        (1, 8) => "BUFFER_UNKNOWN",
        (1, 9) => "BAD_TABLE_ID",
        (1, 10) => "IS_SLAVE",
        (1, 11) => "BAD_PORT",
        (1, 12) => "BAD_PACKET",
        (1, 13) => "MULTIPART_BUFFER_OVERFLOW",

        (2, 0) => "BAD_TYPE",
        (2, 1) => "BAD_LEN",
        (2, 2) => "BAD_EXPERIMENTER",
        (2, 3) => "BAD_EXPERIMENTER_TYPE",
        (2, 4) => "BAD_OUT_PORT",
        (2, 5) => "BAD_ARGUMENT",
        (2, 6) => "EPERM",
        (2, 7) => "TOO_MANY",
        (2, 8) => "BAD_QUEUE",
        (2, 9) => "BAD_OUT_GROUP",
        (2, 10) => "MATCH_INCONSISTENT",
        (2, 11) => "UNSUPPORTED_ORDER",
        (2, 12) => "BAD_TAG",
        (2, 13) => "BAD_SET_TYPE",
        (2, 14) => "BAD_SET_LEN",
        (2, 15) => "BAD_SET_ARGUMENT",

        (3, 0) => "UNKNOWN_INST",
        (3, 1) => "UNSUP_INST",
        (3, 2) => "BAD_TABLE_ID",
        (3, 3) => "UNSUP_METADATA",
        (3, 4) => "UNSUP_METADATA_MASK",
        (3, 5) => "BAD_EXPERIMENTER",
        (3, 6) => "BAD_EXPERIMENTER_TYPE",
        (3, 7) => "BAD_LEN",
        (3, 8) => "EPERM",
        (3, 9) => "TOO_MANY_ACTIONS",
        (3, 17) => "TABLE_UNEXIST",
        (3, 18) => "ENTRY_UNEXIST",
        (3, 19) => "BAD_OFFSET",
        (3, 20) => "JUMP_TO_INVALID_INST",

        (4, 0) => "BAD_TYPE",
        (4, 1) => "BAD_LEN",
        (4, 2) => "BAD_TAG",
        (4, 3) => "BAD_DL_ADDR_MASK",
        (4, 4) => "BAD_NW_ADDR_MASK",
        (4, 5) => "BAD_WILDCARD",
        (4, 6) => "BAD_FIELD",
        (4, 7) => "BAD_VALUE",
        (4, 8) => "BAD_MASK",
        (4, 9) => "BAD_PREREQ",
        (4, 10) => "DUP_FIELD",
        (4, 11) => "EPERM",

        (5, 0) => "UNKNOWN",
        (5, 1) => "TABLE_FULL",
        (5, 2) => "BAD_TABLE_ID",
        (5, 3) => "OVERLAP",
        (5, 4) => "EPERM",
        (5, 5) => "BAD_TIMEOUT",
        (5, 6) => "BAD_COMMAND",
        (5, 7) => "BAD_FLAGS",
        (5, 8) => "ENTRY_EXIST",
        (5, 9) => "ENTRY_UNEXIST",

        (6, 0) => "GROUP_EXISTS",
        (6, 1) => "INVALID_GROUP",
        (6, 2) => "WEIGHT_UNSUPPORTED",
        (6, 3) => "OUT_OF_GROUPS",
        (6, 4) => "OUT_OF_BUCKETS",
        (6, 5) => "CHAINING_UNSUPPORTED",
        (6, 6) => "WATCH_UNSUPPORTED",
        (6, 7) => "LOOP",
        (6, 8) => "UNKNOWN_GROUP",
        (6, 9) => "CHAINED_GROUP",
        (6, 10) => "BAD_TYPE",
        (6, 11) => "BAD_COMMAND",
        (6, 12) => "BAD_BUCKET",
        (6, 13) => "BAD_WATCH",
        (6, 14) => "EPERM",

        (7, 0) => "BAD_PORT",
        (7, 1) => "BAD_HW_ADDR",

        (8, 0) => "UNKNOWN",
        (8, 1) => "BAD_COMMAND",
        (8, 2) => "BAD_TABLE_TYPE",
        (8, 3) => "BAD_TABLE_ID",

        (9, 0) => "BAD_PORT",
        (9, 1) => "BAD_QUEUE",
        (9, 2) => "EPERM",

        (12, 0) => "UNKNOWN",
        (12, 1) => "METER_EXISTS",
        (12, 2) => "INVALID_METER",
        (12, 3) => "UNKNOWN_METER",
        (12, 4) => "BAD_COMMAND",
        (12, 5) => "BAD_FLAGS",
        (12, 6) => "BAD_RATE",
        (12, 7) => "BAD_BURST",
        (12, 8) => "BAD_BAND",
        (12, 9) => "BAD_BAND_VALUE",
        (12, 10) => "OUT_OF_METERS",
        (12, 11) => "OUT_OF_BANDS",

        (14, 0) => "OK",
        (14, 0x5001) => "ALLOCATE_RESOURCE_FAILURE",
        (14, 0x5002) => "ADD_EXIST_FLOW",
        (14, 0x5003) => "DELETE_UNEXIST_FLOW",
        (14, 0x5004) => "COUNTER_REQUEST_FAILURE",
        (14, 0x5005) => "DELETE_NOT_EMPTY_TABLE",
        (14, 0x6000) => "INVALID_TABLE_TYPE",
        (14, 0x6001) => "INVALID_KEY_LENGTH",
        (14, 0x6002) => "INVALID_TABLE_SIZE",
        (14, 0x6003) => "INVALID_MATCH_KEY",
        (14, 0x6004) => "UNSUPPORTED_INSTRUCTION_LENGTH",
        (14, 0x6005) => "UNSUPPORTED_INSTRUCTION_TYPE",
        (14, 0x6006) => "UNSUPPORTED_ACTION_LENGTH",
        (14, 0x6007) => "UNSUPPORTED_ACTION_TYPE",
        (14, 0x6008) => "TABLE_NOT_CREATED",
        (14, 0x6009) => "UNSUPPORTED_COMMAND",
        (14, 0x600a) => "UNSUPPORTED_FLOW_TABLE_COMMAND",
        (14, 0x600b) => "UPFORWARD_TOO_LARGE_PACKET",
        (14, 0x7001) => "CREATE_SOCKET_FAILURE",
        (14, 0x7002) => "CONNECT_SERVER_FAILURE",
        (14, 0x7003) => "SEND_MSG_FAILURE",
        (14, 0x7004) => "RECEIVE_MSG_FAILURE",
        (14, 0x7005) => "WRONG_CHANNEL_STATE",
        (14, 0x7006) => "WRITE_MSG_QUEUE_FAILURE",
        (14, 0x7007) => "READ_MSG_QUEUE_FAILURE",
        (14, 0x7008) => "MESSAGE_SIZE_TOO_BIG",
        (14, 0x8001) => "IPC_SEND_FAILURE",
        (14, 0x8002) => "CREATE_TASK_FAILURE",
        (14, 0x8003) => "CREATE_MSGQUEUE_FAILURE",
        (14, 0x8004) => "CREATE_TIMER_FAILURE",
        (14, 0xffff) => "ERROR",

        _ => return None,
    };

    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Action, Instruction, Match20, ValueOrField};

    fn round_trip(message: Message) -> Vec<u8> {
        let packed = message.pack_vec();

        assert_eq!(packed.len(), message.wire_len());
        assert_eq!(Message::unpack(&packed).unwrap(), message);

        packed
    }

    #[test]
    fn hello_is_8_bytes() {
        let packed = round_trip(Message::Hello(Hello::new(1)));

        assert_eq!(packed, [0x04, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn features_reply_is_216_bytes() {
        let message = Message::FeaturesReply(FeaturesReply {
            xid: 2,
            device_id: 0x8404_5e6e,
            slot_id: 0,
            port_num: 2,
            table_num: 20,
            capabilities: Capabilities::FLOW_STATS | Capabilities::TABLE_STATS,
            experimenter_name: "pofswitch".to_owned(),
            forward_engine_name: "fe".to_owned(),
            lookup_engine_name: "le".to_owned(),
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 216);
        assert_eq!(&packed[8..12], &[0x84, 0x04, 0x5e, 0x6e]);
    }

    #[test]
    fn error_is_280_bytes() {
        let message = Message::Error(ErrorMsg {
            xid: 3,
            error_type: 5,
            error_code: 1,
            device_id: 7,
            slot_id: 0,
            data: b"table full".to_vec(),
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 280);
    }

    #[test]
    fn error_describe_maps_type_and_code() {
        let msg = ErrorMsg {
            error_type: 5,
            error_code: 1,
            ..ErrorMsg::default()
        };

        assert_eq!(msg.describe(), "FLOW_MOD_FAILED (TABLE_FULL)");

        let software = ErrorMsg {
            error_type: 14,
            error_code: 0x5005,
            ..ErrorMsg::default()
        };

        assert_eq!(
            software.describe(),
            "SOFTWARE_FAILED (DELETE_NOT_EMPTY_TABLE)"
        );
    }

    #[test]
    fn resource_report_is_88_bytes() {
        let table_resources = core::array::from_fn::<_, MAX_TABLE_TYPES, _>(|i| TableResource {
            device_id: 1,
            table_type: TableType::ALL[i],
            table_num: 4,
            key_length: 320,
            total_size: 128,
        });

        let message = Message::ResourceReport(ResourceReport {
            xid: 4,
            resource_type: 0,
            slot_id: 0,
            counter_num: 512,
            meter_num: 256,
            group_num: 64,
            table_resources,
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 88);
    }

    #[test]
    fn flow_mod_is_2192_bytes() {
        let mut matches = heapless::Vec::new();
        matches
            .push(MatchX::from_hex(Match20::new(0, 0, 48), "0026b954ee0f", "ffffffffffff").unwrap())
            .unwrap();

        let mut actions = heapless::Vec::new();
        actions
            .push(Action::Output {
                port: ValueOrField::Value(2),
                metadata_offset: 0,
                metadata_length: 0,
                packet_offset: 0,
            })
            .unwrap();

        let mut instructions = heapless::Vec::new();
        instructions
            .push(Instruction::ApplyActions { actions })
            .unwrap();

        let message = Message::FlowMod(FlowMod {
            xid: 5,
            command: FlowModCommand::Add,
            counter_id: 0,
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            table_type: TableType::Mm,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0,
            index: 0,
            matches,
            instructions,
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 2192);
        // command byte straight after the header.
        assert_eq!(packed[8], 0);
        // match_field_num and instruction_num.
        assert_eq!(packed[9], 1);
        assert_eq!(packed[10], 1);
    }

    #[test]
    fn table_mod_is_152_bytes() {
        let mut match_fields = heapless::Vec::new();
        match_fields.push(Match20::new(0, 0, 48)).unwrap();

        let message = Message::TableMod(TableMod {
            xid: 6,
            table: FlowTable {
                command: crate::wire::TableModCommand::Add,
                table_id: 0,
                table_type: TableType::Mm,
                table_size: 32,
                key_length: 48,
                table_name: "FirstEntryTable".to_owned(),
                match_fields,
            },
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 152);
    }

    #[test]
    fn packet_out_is_2360_bytes() {
        let mut actions = heapless::Vec::new();
        actions
            .push(Action::Output {
                port: ValueOrField::Value(1),
                metadata_offset: 0,
                metadata_length: 0,
                packet_offset: 0,
            })
            .unwrap();

        let message = Message::PacketOut(PacketOut {
            xid: 7,
            buffer_id: NO_BUFFER,
            in_port: 0xffff,
            actions,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 2360);
    }

    #[test]
    fn group_mod_is_312_bytes() {
        let message = Message::GroupMod(GroupMod {
            xid: 8,
            command: GroupModCommand::Add,
            group_type: GroupType::All,
            group_id: 1,
            counter_id: 2,
            actions: heapless::Vec::new(),
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 312);
    }

    #[test]
    fn meter_mod_is_24_bytes() {
        let message = Message::MeterMod(MeterMod {
            xid: 9,
            command: MeterModCommand::Add,
            slot_id: 0,
            meter_id: 1,
            rate: 10_000,
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 24);
    }

    #[test]
    fn counter_messages_are_32_bytes() {
        let packed = round_trip(Message::CounterRequest(CounterCarrier::query(10, 5)));

        assert_eq!(packed.len(), 32);
        assert_eq!(packed[8], u8::from(CounterModCommand::Query));
    }

    #[test]
    fn packet_in_round_trips_with_payload() {
        let message = Message::PacketIn(PacketIn {
            xid: 11,
            buffer_id: NO_BUFFER,
            total_len: 64,
            reason: PacketInReason::NoMatch,
            table_id: 0,
            cookie: 0,
            device_id: 0x8404_5e6e,
            slot_port_id: 0x0001_0002,
            data: vec![0xaa; 64],
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 96);
    }

    #[test]
    fn flow_removed_is_88_bytes() {
        let message = Message::FlowRemoved(FlowRemoved {
            xid: 12,
            matched: StdMatch::default(),
            cookie: 1,
            priority: 2,
            reason: 0,
            duration_sec: 60,
            duration_nsec: 0,
            idle_timeout: 10,
            packet_count: 100,
            byte_count: 6400,
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 88);
    }

    #[test]
    fn port_status_round_trips() {
        let message = Message::PortStatus(PortStatus {
            xid: 13,
            reason: PortReason::Add,
            desc: PhyPort {
                port_id: 2,
                device_id: 0x8404_5e6e,
                name: "eth2".to_owned(),
                ..PhyPort::default()
            },
        });

        let packed = round_trip(message);

        assert_eq!(packed.len(), 136);
    }

    #[test]
    fn echo_reply_echoes_the_request() {
        let request = EchoRequest {
            xid: 14,
            body: vec![1, 2, 3],
        };

        let reply = request.reply();

        assert_eq!(reply.xid, 14);
        assert_eq!(reply.body, vec![1, 2, 3]);

        round_trip(Message::EchoRequest(request));
        round_trip(Message::EchoReply(reply));
    }

    #[test]
    fn non_hello_bad_version_is_rejected() {
        let mut packed = Message::PacketIn(PacketIn::default()).pack_vec();
        packed[0] = 0x03;

        assert_eq!(Message::unpack(&packed), Err(WireError::Version(0x03)));
    }

    #[test]
    fn hello_with_other_version_still_decodes() {
        let mut packed = Message::Hello(Hello::new(1)).pack_vec();
        packed[0] = 0x01;

        assert!(matches!(
            Message::unpack(&packed).unwrap(),
            Message::Hello(_)
        ));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut packed = Message::Hello(Hello::new(1)).pack_vec();
        packed[1] = 77;

        assert_eq!(
            Message::unpack(&packed),
            Err(WireError::UnknownDiscriminant {
                kind: "message",
                value: 77
            })
        );
    }

    #[test]
    fn truncated_message_is_rejected() {
        let packed = Message::FeaturesReply(FeaturesReply::default()).pack_vec();

        assert!(matches!(
            Message::unpack(&packed[..100]),
            Err(WireError::ReadBufferUnderrun { .. })
        ));
    }
}
