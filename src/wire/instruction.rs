//! Instructions: the per-entry programs carried inside FLOW_MOD messages.
//!
//! Each instruction is an 8-byte header (`type`, `length`, 4 pad bytes) plus a fixed body.
//! Inside a flow mod every instruction occupies a 304-byte slot.
//!
//! Types 3 (WRITE_ACTIONS) and 5 (CLEAR_ACTIONS) are reserved in this dialect: they carry no
//! body and no defined semantics, so they cannot be constructed here and are rejected on
//! decode.

use crate::wire::{
    action::{self, Action},
    match_field::{Match20, ValueOrField},
    CalcType, INSTRUCTION_SLOT_LEN, MAX_ACTIONS, MAX_FIELD_LEN_BYTES, MAX_INSTRUCTIONS,
    MAX_MATCH_FIELDS,
};
use pofctl_wire::{PofWireRead, PofWireWrite, WireError, WireReader, WireWriter};

/// Jump direction for CONDITIONAL_JMP offsets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JmpDirection {
    /// Jump forward over the offset.
    Forward,
    /// Jump backward over the offset.
    Backward,
}

impl JmpDirection {
    fn byte(self) -> u8 {
        match self {
            JmpDirection::Forward => 0,
            JmpDirection::Backward => 1,
        }
    }

    fn from_byte(raw: u8) -> Result<Self, WireError> {
        match raw {
            0 => Ok(JmpDirection::Forward),
            1 => Ok(JmpDirection::Backward),
            _ => Err(WireError::InvalidValue("jump direction")),
        }
    }
}

/// One relative jump target of a CONDITIONAL_JMP.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JmpOffset {
    /// Which way to move.
    pub direction: JmpDirection,
    /// How far: an immediate entry offset or a field holding it.
    pub offset: ValueOrField,
}

impl Default for JmpOffset {
    fn default() -> Self {
        Self {
            direction: JmpDirection::Forward,
            offset: ValueOrField::Value(0),
        }
    }
}

/// One flow entry instruction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Instruction {
    /// Continue matching at another table.
    GotoTable {
        /// Type-local id of the next table.
        next_table_id: u8,
        /// Offset in bits at which the next key starts.
        packet_offset: u16,
        /// Key layout of the next table.
        match_fields: heapless::Vec<Match20, MAX_MATCH_FIELDS>,
    },
    /// Write an immediate value into metadata.
    WriteMetadata {
        /// Destination offset in bits.
        metadata_offset: u16,
        /// Length in bits to write.
        write_length: u16,
        /// Value, left-aligned.
        value: [u8; MAX_FIELD_LEN_BYTES],
    },
    /// Execute a list of actions immediately.
    ApplyActions {
        /// Up to 6 actions, executed in order.
        actions: heapless::Vec<Action, MAX_ACTIONS>,
    },
    /// Rate-limit through a meter.
    Meter {
        /// Meter id from the controller pool.
        meter_id: u32,
    },
    /// Copy packet bytes into metadata.
    WriteMetadataFromPacket {
        /// Destination offset in metadata, in bits.
        metadata_offset: u16,
        /// Source offset in the packet, in bits.
        packet_offset: u16,
        /// Length in bits to copy.
        write_length: u16,
    },
    /// Jump straight to an entry of a LINEAR table.
    GotoDirectTable {
        /// Type-local id of the next table.
        next_table_id: u8,
        /// Offset in bits at which matching resumes.
        packet_offset: u16,
        /// Entry index: immediate or field-carried.
        index: ValueOrField,
    },
    /// Compare a field against a reference and jump accordingly.
    ConditionalJmp {
        /// Left-hand comparison field.
        field1: Match20,
        /// Right-hand comparison value or field.
        field2: ValueOrField,
        /// Jump targets for less-than, equal and greater-than.
        offsets: [JmpOffset; 3],
    },
    /// Compute `dst = dst <op> src`.
    CalculateField {
        /// Operation to apply.
        calc_type: CalcType,
        /// Destination field.
        dst: Match20,
        /// Source: immediate or field.
        src: ValueOrField,
    },
}

impl Instruction {
    /// The instruction type byte.
    pub fn kind(&self) -> u8 {
        match self {
            Instruction::GotoTable { .. } => 1,
            Instruction::WriteMetadata { .. } => 2,
            Instruction::ApplyActions { .. } => 4,
            Instruction::Meter { .. } => 6,
            Instruction::WriteMetadataFromPacket { .. } => 7,
            Instruction::GotoDirectTable { .. } => 8,
            Instruction::ConditionalJmp { .. } => 9,
            Instruction::CalculateField { .. } => 10,
        }
    }

    /// Packed length of this instruction including its 8-byte header.
    pub fn wire_len(&self) -> usize {
        match self {
            Instruction::GotoTable { .. } => 80,
            Instruction::WriteMetadata { .. } => 32,
            Instruction::ApplyActions { .. } => INSTRUCTION_SLOT_LEN,
            Instruction::Meter { .. } => 16,
            Instruction::WriteMetadataFromPacket { .. } => 16,
            Instruction::GotoDirectTable { .. } => 24,
            Instruction::ConditionalJmp { .. } => 56,
            Instruction::CalculateField { .. } => 32,
        }
    }
}

impl PofWireWrite for Instruction {
    fn packed_len(&self) -> usize {
        self.wire_len()
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let len = self.wire_len();
        let mut writer = WireWriter::new(buf);

        writer.put(&u16::from(self.kind()))?;
        writer.put(&(len as u16))?;
        writer.pad(4)?;

        match self {
            Instruction::GotoTable {
                next_table_id,
                packet_offset,
                match_fields,
            } => {
                writer.put(next_table_id)?;
                writer.put(&(match_fields.len() as u8))?;
                writer.put(packet_offset)?;
                writer.pad(4)?;

                for field in match_fields {
                    writer.put(field)?;
                }

                writer.pad_to(len)?;
            }
            Instruction::WriteMetadata {
                metadata_offset,
                write_length,
                value,
            } => {
                writer.put(metadata_offset)?;
                writer.put(write_length)?;
                writer.put(value)?;
                writer.pad(4)?;
            }
            Instruction::ApplyActions { actions } => {
                writer.put(&(actions.len() as u8))?;
                writer.pad(7)?;
                action::pack_slots(&mut writer, actions)?;
            }
            Instruction::Meter { meter_id } => {
                writer.put(meter_id)?;
                writer.pad(4)?;
            }
            Instruction::WriteMetadataFromPacket {
                metadata_offset,
                packet_offset,
                write_length,
            } => {
                writer.put(metadata_offset)?;
                writer.put(packet_offset)?;
                writer.put(write_length)?;
                writer.pad(2)?;
            }
            Instruction::GotoDirectTable {
                next_table_id,
                packet_offset,
                index,
            } => {
                writer.put(next_table_id)?;
                writer.put(&index.kind())?;
                writer.put(packet_offset)?;
                writer.pad(4)?;
                index.pack_slot(&mut writer)?;
            }
            Instruction::ConditionalJmp {
                field1,
                field2,
                offsets,
            } => {
                writer.put(&field2.kind())?;

                for target in offsets {
                    writer.put(&target.direction.byte())?;
                    writer.put(&target.offset.kind())?;
                }

                writer.pad(1)?;
                writer.put(field1)?;
                field2.pack_slot(&mut writer)?;

                for target in offsets {
                    target.offset.pack_slot(&mut writer)?;
                }
            }
            Instruction::CalculateField {
                calc_type,
                dst,
                src,
            } => {
                writer.put(&u16::from(u8::from(*calc_type)))?;
                writer.put(&src.kind())?;
                writer.pad(5)?;
                writer.put(dst)?;
                src.pack_slot(&mut writer)?;
            }
        }

        writer.finish(len)?;

        Ok(&buf[0..len])
    }
}

impl PofWireRead for Instruction {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let kind = reader.take::<u16>()?;
        let length = usize::from(reader.take::<u16>()?);
        reader.skip(4)?;

        let instruction = match kind {
            1 => {
                let next_table_id = reader.take()?;
                let match_field_num = reader.take::<u8>()?;
                let packet_offset = reader.take()?;
                reader.skip(4)?;

                if usize::from(match_field_num) > MAX_MATCH_FIELDS {
                    return Err(WireError::InvalidValue("match field count"));
                }

                let mut match_fields = heapless::Vec::new();

                for slot in 0..MAX_MATCH_FIELDS {
                    let field = reader.take::<Match20>()?;

                    if slot < usize::from(match_field_num) {
                        match_fields.push(field).ok();
                    }
                }

                Instruction::GotoTable {
                    next_table_id,
                    packet_offset,
                    match_fields,
                }
            }
            2 => {
                let metadata_offset = reader.take()?;
                let write_length = reader.take()?;
                let value = reader.take()?;
                reader.skip(4)?;

                Instruction::WriteMetadata {
                    metadata_offset,
                    write_length,
                    value,
                }
            }
            4 => {
                let action_num = reader.take::<u8>()?;
                reader.skip(7)?;
                let actions = action::unpack_slots(&mut reader, usize::from(action_num))?;

                Instruction::ApplyActions { actions }
            }
            6 => {
                let meter_id = reader.take()?;
                reader.skip(4)?;

                Instruction::Meter { meter_id }
            }
            7 => {
                let metadata_offset = reader.take()?;
                let packet_offset = reader.take()?;
                let write_length = reader.take()?;
                reader.skip(2)?;

                Instruction::WriteMetadataFromPacket {
                    metadata_offset,
                    packet_offset,
                    write_length,
                }
            }
            8 => {
                let next_table_id = reader.take()?;
                let index_kind = reader.take::<u8>()?;
                let packet_offset = reader.take()?;
                reader.skip(4)?;
                let index = ValueOrField::unpack_slot(index_kind, &mut reader)?;

                Instruction::GotoDirectTable {
                    next_table_id,
                    packet_offset,
                    index,
                }
            }
            9 => {
                let field2_kind = reader.take::<u8>()?;
                let mut flags = [(0u8, 0u8); 3];

                for slot in &mut flags {
                    slot.0 = reader.take()?;
                    slot.1 = reader.take()?;
                }

                reader.skip(1)?;

                let field1 = reader.take()?;
                let field2 = ValueOrField::unpack_slot(field2_kind, &mut reader)?;

                let mut offsets = [JmpOffset::default(); 3];

                for (target, (direction, offset_kind)) in offsets.iter_mut().zip(flags) {
                    target.direction = JmpDirection::from_byte(direction)?;
                    target.offset = ValueOrField::unpack_slot(offset_kind, &mut reader)?;
                }

                Instruction::ConditionalJmp {
                    field1,
                    field2,
                    offsets,
                }
            }
            10 => {
                let calc_type_raw = reader.take::<u16>()?;
                let src_kind = reader.take::<u8>()?;
                reader.skip(5)?;
                let dst = reader.take()?;
                let src = ValueOrField::unpack_slot(src_kind, &mut reader)?;

                let calc_type = u8::try_from(calc_type_raw)
                    .map_err(|_| WireError::InvalidValue("calc type"))
                    .and_then(CalcType::try_from)?;

                Instruction::CalculateField {
                    calc_type,
                    dst,
                    src,
                }
            }
            3 | 5 => return Err(WireError::InvalidValue("reserved instruction type")),
            other => {
                return Err(WireError::UnknownDiscriminant {
                    kind: "instruction",
                    value: other,
                })
            }
        };

        if length != instruction.wire_len() {
            return Err(WireError::LengthMismatch {
                expected: length,
                actual: instruction.wire_len(),
            });
        }

        reader.finish(length)?;

        Ok(instruction)
    }
}

/// Serialize `instructions` into the full run of [`MAX_INSTRUCTIONS`] 304-byte slots.
pub(crate) fn pack_slots(
    writer: &mut WireWriter<'_>,
    instructions: &[Instruction],
) -> Result<(), WireError> {
    if instructions.len() > MAX_INSTRUCTIONS {
        return Err(WireError::TooLong);
    }

    let start = writer.pos();

    for (slot, instruction) in instructions.iter().enumerate() {
        let offset = start + slot * INSTRUCTION_SLOT_LEN;

        writer.pad_to(offset)?;
        writer.put(instruction)?;
        writer.pad_to(offset + INSTRUCTION_SLOT_LEN)?;
    }

    writer.pad_to(start + MAX_INSTRUCTIONS * INSTRUCTION_SLOT_LEN)
}

/// Decode `count` instructions from the full run of [`MAX_INSTRUCTIONS`] 304-byte slots.
pub(crate) fn unpack_slots(
    reader: &mut WireReader<'_>,
    count: usize,
) -> Result<heapless::Vec<Instruction, MAX_INSTRUCTIONS>, WireError> {
    if count > MAX_INSTRUCTIONS {
        return Err(WireError::InvalidValue("instruction count"));
    }

    let mut instructions = heapless::Vec::new();

    for slot in 0..MAX_INSTRUCTIONS {
        let raw = reader.slice(INSTRUCTION_SLOT_LEN)?;

        if slot < count {
            instructions.push(Instruction::unpack_from_slice(raw)?).ok();
        }
    }

    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ACTION_SLOT_LEN;

    #[test]
    fn goto_table_is_80_bytes() {
        let mut match_fields = heapless::Vec::new();
        match_fields.push(Match20::new(0, 0, 48)).unwrap();

        let instruction = Instruction::GotoTable {
            next_table_id: 1,
            packet_offset: 14,
            match_fields,
        };

        assert_eq!(instruction.wire_len(), 80);

        let mut buf = [0u8; 80];
        instruction.pack_to_slice(&mut buf).unwrap();

        assert_eq!(&buf[0..4], &[0, 1, 0, 80]);
        assert_eq!(Instruction::unpack_from_slice(&buf).unwrap(), instruction);
    }

    #[test]
    fn apply_actions_fills_the_slot() {
        let mut actions = heapless::Vec::new();
        actions
            .push(Action::Output {
                port: ValueOrField::Value(2),
                metadata_offset: 0,
                metadata_length: 0,
                packet_offset: 0,
            })
            .unwrap();

        let instruction = Instruction::ApplyActions { actions };

        assert_eq!(instruction.wire_len(), 304);

        let mut buf = [0u8; INSTRUCTION_SLOT_LEN];
        instruction.pack_to_slice(&mut buf).unwrap();

        // action_num then 7 pad bytes then the first action slot.
        assert_eq!(buf[8], 1);
        assert_eq!(&buf[16..20], &[0, 0, 0, 20]);
        // Slots past the first stay zeroed.
        assert_eq!(&buf[16 + ACTION_SLOT_LEN..], &[0u8; 5 * ACTION_SLOT_LEN]);
        assert_eq!(Instruction::unpack_from_slice(&buf).unwrap(), instruction);
    }

    #[test]
    fn remaining_kinds_round_trip() {
        let instructions = [
            Instruction::WriteMetadata {
                metadata_offset: 32,
                write_length: 16,
                value: crate::wire::match_field::parse_hex("0806").unwrap(),
            },
            Instruction::Meter { meter_id: 3 },
            Instruction::WriteMetadataFromPacket {
                metadata_offset: 32,
                packet_offset: 96,
                write_length: 32,
            },
            Instruction::GotoDirectTable {
                next_table_id: 4,
                packet_offset: 34,
                index: ValueOrField::Value(9),
            },
            Instruction::ConditionalJmp {
                field1: Match20::new(2, 96, 32),
                field2: ValueOrField::Value(0x0a00_0001),
                offsets: [
                    JmpOffset {
                        direction: JmpDirection::Forward,
                        offset: ValueOrField::Value(1),
                    },
                    JmpOffset {
                        direction: JmpDirection::Forward,
                        offset: ValueOrField::Value(2),
                    },
                    JmpOffset {
                        direction: JmpDirection::Backward,
                        offset: ValueOrField::Field(Match20::new(-1, 0, 32)),
                    },
                ],
            },
            Instruction::CalculateField {
                calc_type: CalcType::BitwiseXor,
                dst: Match20::new(5, 0, 16),
                src: ValueOrField::Value(0xffff),
            },
        ];

        for instruction in instructions {
            let mut buf = [0u8; INSTRUCTION_SLOT_LEN];
            let packed_len = instruction.pack_to_slice(&mut buf).unwrap().len();

            assert_eq!(packed_len, instruction.wire_len());
            assert_eq!(Instruction::unpack_from_slice(&buf).unwrap(), instruction);
        }
    }

    #[test]
    fn conditional_jmp_is_56_bytes() {
        let instruction = Instruction::ConditionalJmp {
            field1: Match20::new(1, 0, 8),
            field2: ValueOrField::Value(6),
            offsets: [JmpOffset::default(); 3],
        };

        assert_eq!(instruction.wire_len(), 56);
    }

    #[test]
    fn reserved_types_do_not_decode() {
        for kind in [3u8, 5] {
            let mut buf = [0u8; INSTRUCTION_SLOT_LEN];
            buf[1] = kind;
            buf[3] = 8;

            assert_eq!(
                Instruction::unpack_from_slice(&buf),
                Err(WireError::InvalidValue("reserved instruction type"))
            );
        }
    }
}
