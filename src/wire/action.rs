//! Actions: the leaf operations carried inside APPLY_ACTIONS instructions, groups and
//! packet-out messages.
//!
//! Every action is a 4-byte `(type, length)` header plus a fixed-size body. When an action is
//! stored in a list it occupies a 48-byte slot, zero-padded past its own length.

use crate::wire::{
    match_field::{Match20, MatchX, ValueOrField},
    DropReason, PacketInReason, ACTION_SLOT_LEN, MAX_ACTIONS, MAX_FIELD_LEN_BYTES,
};
use pofctl_wire::{PofWireRead, PofWireWrite, WireError, WireReader, WireWriter};

/// One forwarding action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Action {
    /// Emit the packet on a port, optionally prepending a metadata window.
    Output {
        /// Egress port: immediate id or field holding it.
        port: ValueOrField,
        /// Offset in bits of metadata to prepend.
        metadata_offset: u16,
        /// Length in bits of metadata to prepend.
        metadata_length: u16,
        /// Offset in bits into the packet at which output starts.
        packet_offset: u16,
    },
    /// Overwrite a field with a masked value.
    SetField {
        /// Field, value and mask.
        field: MatchX,
    },
    /// Overwrite a field from metadata.
    SetFieldFromMetadata {
        /// Destination field.
        field: Match20,
        /// Source offset in metadata, in bits.
        metadata_offset: u16,
    },
    /// Add a signed increment to a field.
    ModifyField {
        /// Field to modify.
        field: Match20,
        /// Signed increment.
        increment: i32,
    },
    /// Insert a new field (tag push).
    AddField {
        /// Field id of the inserted field.
        field_id: u16,
        /// Insert position in bits.
        position: u16,
        /// Length in bits of the inserted field.
        length: u32,
        /// Value to insert, left-aligned.
        value: [u8; MAX_FIELD_LEN_BYTES],
    },
    /// Remove a field (tag pop).
    DeleteField {
        /// Position in bits of the removed range.
        position: u16,
        /// Length of the removed range: immediate bits or a field holding them.
        length: ValueOrField,
    },
    /// Recompute a checksum over a packet/metadata range.
    CalculateChecksum {
        /// 0: checksum lives in the packet; 1: in metadata.
        checksum_pos_type: u8,
        /// 0: summed range is in the packet; 1: in metadata.
        calc_pos_type: u8,
        /// Checksum position in bits.
        checksum_position: u16,
        /// Checksum length in bits.
        checksum_length: u16,
        /// Start of the summed range in bits.
        calc_start_position: u16,
        /// Length of the summed range in bits.
        calc_length: u16,
    },
    /// Hand the packet to a group.
    Group {
        /// Target group id.
        group_id: u32,
    },
    /// Drop the packet.
    Drop {
        /// Why the packet is dropped.
        reason: DropReason,
    },
    /// Punt the packet to the controller.
    PacketIn {
        /// Reason reported in the resulting PACKET_IN.
        reason: PacketInReason,
    },
    /// Bump a counter.
    Counter {
        /// Counter id from the controller pool.
        counter_id: u32,
    },
    /// Experimenter extension.
    Experimenter {
        /// Opaque experimenter id.
        experimenter: u32,
    },
}

impl Action {
    /// The action type byte.
    pub fn kind(&self) -> u8 {
        match self {
            Action::Output { .. } => 0,
            Action::SetField { .. } => 1,
            Action::SetFieldFromMetadata { .. } => 2,
            Action::ModifyField { .. } => 3,
            Action::AddField { .. } => 4,
            Action::DeleteField { .. } => 5,
            Action::CalculateChecksum { .. } => 6,
            Action::Group { .. } => 7,
            Action::Drop { .. } => 8,
            Action::PacketIn { .. } => 9,
            Action::Counter { .. } => 10,
            Action::Experimenter { .. } => 11,
        }
    }

    /// Packed length of this action including its 4-byte header.
    pub fn wire_len(&self) -> usize {
        match self {
            Action::Output { .. } => 20,
            Action::SetField { .. } => 44,
            Action::SetFieldFromMetadata { .. } => 20,
            Action::ModifyField { .. } => 20,
            Action::AddField { .. } => 28,
            Action::DeleteField { .. } => 20,
            Action::CalculateChecksum { .. } => 20,
            Action::Group { .. }
            | Action::Drop { .. }
            | Action::PacketIn { .. }
            | Action::Counter { .. }
            | Action::Experimenter { .. } => 12,
        }
    }
}

impl PofWireWrite for Action {
    fn packed_len(&self) -> usize {
        self.wire_len()
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let len = self.wire_len();
        let mut writer = WireWriter::new(buf);

        writer.put(&u16::from(self.kind()))?;
        writer.put(&(len as u16))?;

        match self {
            Action::Output {
                port,
                metadata_offset,
                metadata_length,
                packet_offset,
            } => {
                writer.put(&port.kind())?;
                writer.pad(1)?;
                writer.put(metadata_offset)?;
                writer.put(metadata_length)?;
                writer.put(packet_offset)?;
                port.pack_slot(&mut writer)?;
            }
            Action::SetField { field } => {
                writer.put(field)?;
            }
            Action::SetFieldFromMetadata {
                field,
                metadata_offset,
            } => {
                writer.put(field)?;
                writer.put(metadata_offset)?;
                writer.pad(6)?;
            }
            Action::ModifyField { field, increment } => {
                writer.put(field)?;
                writer.put(increment)?;
                writer.pad(4)?;
            }
            Action::AddField {
                field_id,
                position,
                length,
                value,
            } => {
                writer.put(field_id)?;
                writer.put(position)?;
                writer.put(length)?;
                writer.put(value)?;
            }
            Action::DeleteField { position, length } => {
                writer.put(position)?;
                writer.put(&length.kind())?;
                writer.pad(5)?;
                length.pack_slot(&mut writer)?;
            }
            Action::CalculateChecksum {
                checksum_pos_type,
                calc_pos_type,
                checksum_position,
                checksum_length,
                calc_start_position,
                calc_length,
            } => {
                writer.put(checksum_pos_type)?;
                writer.put(calc_pos_type)?;
                writer.put(checksum_position)?;
                writer.put(checksum_length)?;
                writer.put(calc_start_position)?;
                writer.put(calc_length)?;
                writer.pad(6)?;
            }
            Action::Group { group_id } => {
                writer.put(group_id)?;
                writer.pad(4)?;
            }
            Action::Drop { reason } => {
                writer.put(&u32::from(u8::from(*reason)))?;
                writer.pad(4)?;
            }
            Action::PacketIn { reason } => {
                writer.put(&u32::from(u8::from(*reason)))?;
                writer.pad(4)?;
            }
            Action::Counter { counter_id } => {
                writer.put(counter_id)?;
                writer.pad(4)?;
            }
            Action::Experimenter { experimenter } => {
                writer.put(experimenter)?;
                writer.pad(4)?;
            }
        }

        writer.finish(len)?;

        Ok(&buf[0..len])
    }
}

impl PofWireRead for Action {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let kind = reader.take::<u16>()?;
        let length = usize::from(reader.take::<u16>()?);

        let action = match kind {
            0 => {
                let port_kind = reader.take::<u8>()?;
                reader.skip(1)?;
                let metadata_offset = reader.take()?;
                let metadata_length = reader.take()?;
                let packet_offset = reader.take()?;
                let port = ValueOrField::unpack_slot(port_kind, &mut reader)?;

                Action::Output {
                    port,
                    metadata_offset,
                    metadata_length,
                    packet_offset,
                }
            }
            1 => Action::SetField {
                field: reader.take()?,
            },
            2 => {
                let field = reader.take()?;
                let metadata_offset = reader.take()?;
                reader.skip(6)?;

                Action::SetFieldFromMetadata {
                    field,
                    metadata_offset,
                }
            }
            3 => {
                let field = reader.take()?;
                let increment = reader.take()?;
                reader.skip(4)?;

                Action::ModifyField { field, increment }
            }
            4 => Action::AddField {
                field_id: reader.take()?,
                position: reader.take()?,
                length: reader.take()?,
                value: reader.take()?,
            },
            5 => {
                let position = reader.take()?;
                let length_kind = reader.take::<u8>()?;
                reader.skip(5)?;
                let length = ValueOrField::unpack_slot(length_kind, &mut reader)?;

                Action::DeleteField { position, length }
            }
            6 => {
                let checksum_pos_type = reader.take()?;
                let calc_pos_type = reader.take()?;
                let checksum_position = reader.take()?;
                let checksum_length = reader.take()?;
                let calc_start_position = reader.take()?;
                let calc_length = reader.take()?;
                reader.skip(6)?;

                Action::CalculateChecksum {
                    checksum_pos_type,
                    calc_pos_type,
                    checksum_position,
                    checksum_length,
                    calc_start_position,
                    calc_length,
                }
            }
            7 => {
                let group_id = reader.take()?;
                reader.skip(4)?;

                Action::Group { group_id }
            }
            8 => {
                let reason = reason_byte(reader.take()?)?;
                reader.skip(4)?;

                Action::Drop {
                    reason: DropReason::try_from(reason)?,
                }
            }
            9 => {
                let reason = reason_byte(reader.take()?)?;
                reader.skip(4)?;

                Action::PacketIn {
                    reason: PacketInReason::try_from(reason)?,
                }
            }
            10 => {
                let counter_id = reader.take()?;
                reader.skip(4)?;

                Action::Counter { counter_id }
            }
            11 => {
                let experimenter = reader.take()?;
                reader.skip(4)?;

                Action::Experimenter { experimenter }
            }
            other => {
                return Err(WireError::UnknownDiscriminant {
                    kind: "action",
                    value: other,
                })
            }
        };

        if length != action.wire_len() {
            return Err(WireError::LengthMismatch {
                expected: length,
                actual: action.wire_len(),
            });
        }

        reader.finish(length)?;

        Ok(action)
    }
}

fn reason_byte(raw: u32) -> Result<u8, WireError> {
    u8::try_from(raw).map_err(|_| WireError::InvalidValue("reason"))
}

/// Serialize `actions` into the full run of [`MAX_ACTIONS`] 48-byte slots, zero-padding
/// unused slots and slot tails.
pub(crate) fn pack_slots(writer: &mut WireWriter<'_>, actions: &[Action]) -> Result<(), WireError> {
    if actions.len() > MAX_ACTIONS {
        return Err(WireError::TooLong);
    }

    let start = writer.pos();

    for (slot, action) in actions.iter().enumerate() {
        let offset = start + slot * ACTION_SLOT_LEN;

        writer.pad_to(offset)?;
        writer.put(action)?;
        writer.pad_to(offset + ACTION_SLOT_LEN)?;
    }

    writer.pad_to(start + MAX_ACTIONS * ACTION_SLOT_LEN)
}

/// Decode `count` actions from the full run of [`MAX_ACTIONS`] 48-byte slots.
pub(crate) fn unpack_slots(
    reader: &mut WireReader<'_>,
    count: usize,
) -> Result<heapless::Vec<Action, MAX_ACTIONS>, WireError> {
    if count > MAX_ACTIONS {
        return Err(WireError::InvalidValue("action count"));
    }

    let mut actions = heapless::Vec::new();

    for slot in 0..MAX_ACTIONS {
        let raw = reader.slice(ACTION_SLOT_LEN)?;

        if slot < count {
            actions.push(Action::unpack_from_slice(raw)?).ok();
        }
    }

    Ok(actions)
}
