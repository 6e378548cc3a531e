//! The POF wire codec: fixed-layout packing/unpacking of every message, match, action and
//! instruction the dialect defines.
//!
//! Wire version `0x04`. All multi-byte integers are big endian. Records are padded to a single
//! fixed size per type: list slots are always serialized at maximum cardinality with unused
//! tail bytes zeroed, and strings are left-justified into fixed-width zero-padded buffers.

pub mod action;
pub mod counter;
pub mod header;
pub mod instruction;
pub mod match_field;
pub mod message;
pub mod port;
pub mod table;

pub use action::Action;
pub use counter::Counter;
pub use header::Header;
pub use instruction::Instruction;
pub use match_field::{Match20, MatchX, StdMatch, ValueOrField};
pub use message::{Message, MessageKind};
pub use port::PhyPort;
pub use table::{FlowTable, TableResource};

use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError};

/// Protocol version carried in every header.
pub const POF_VERSION: u8 = 0x04;

/// Fixed width of device/table/engine name slots.
pub const NAME_MAX_LEN: usize = 64;

/// Fixed width of the error message body.
pub const ERROR_STR_MAX_LEN: usize = 256;

/// Maximum packet-in (and packet-out) payload.
pub const PACKET_IN_MAX_LEN: usize = 2048;

/// Maximum length in bytes of one match field value/mask.
pub const MAX_FIELD_LEN_BYTES: usize = 16;

/// Maximum number of match fields per flow entry or table key.
pub const MAX_MATCH_FIELDS: usize = 8;

/// Maximum number of instructions per flow entry.
pub const MAX_INSTRUCTIONS: usize = 6;

/// Maximum number of actions per instruction or group.
pub const MAX_ACTIONS: usize = 6;

/// Maximum packed length of a single action body including its header.
pub const MAX_ACTION_LEN: usize = 44;

/// Width of one action slot inside an instruction, group or packet-out.
pub const ACTION_SLOT_LEN: usize = MAX_ACTION_LEN + 4;

/// Width of one instruction slot inside a flow mod.
pub const INSTRUCTION_SLOT_LEN: usize = 8 + 8 + MAX_ACTIONS * ACTION_SLOT_LEN;

/// Number of flow table types a switch reports resources for.
pub const MAX_TABLE_TYPES: usize = 4;

/// "No buffer" sentinel for packet in/out buffer ids.
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// Default `miss_send_len` switch configuration.
pub const DEFAULT_MISS_SEND_LEN: u16 = 128;

/// Defines a `#[repr(u8)]` wire enum along with its conversions and single-byte codec.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $kind:literal {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[repr(u8)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = WireError;

            fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(WireError::UnknownDiscriminant {
                        kind: $kind,
                        value: u16::from(other),
                    }),
                }
            }
        }

        impl PofWireWrite for $name {
            fn packed_len(&self) -> usize {
                1
            }

            fn pack_to_slice<'buf>(
                &self,
                buf: &'buf mut [u8],
            ) -> Result<&'buf [u8], WireError> {
                u8::from(*self).pack_to_slice(buf)
            }
        }

        impl PofWireRead for $name {
            fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
                u8::unpack_from_slice(buf).and_then(Self::try_from)
            }
        }

        impl PofWireSized for $name {
            const PACKED_LEN: usize = 1;
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Flow table lookup discipline.
    pub enum TableType: "table type" {
        /// Masked match.
        Mm = 0,
        /// Longest prefix match.
        Lpm = 1,
        /// Exact match.
        Em = 2,
        /// Linear (indexed, no key).
        Linear = 3,
    }
}

impl TableType {
    /// All types, in the order switch resource reports enumerate them.
    pub const ALL: [TableType; MAX_TABLE_TYPES] = [
        TableType::Mm,
        TableType::Lpm,
        TableType::Em,
        TableType::Linear,
    ];
}

impl core::fmt::Display for TableType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TableType::Mm => f.write_str("MM"),
            TableType::Lpm => f.write_str("LPM"),
            TableType::Em => f.write_str("EM"),
            TableType::Linear => f.write_str("LINEAR"),
        }
    }
}

wire_enum! {
    /// Command byte of a TABLE_MOD.
    pub enum TableModCommand: "table mod command" {
        /// Install a new table.
        Add = 0,
        /// Modify an existing table.
        Modify = 1,
        /// Remove a table.
        Delete = 2,
    }
}

wire_enum! {
    /// Command byte of a FLOW_MOD.
    pub enum FlowModCommand: "flow mod command" {
        /// Install a new entry.
        Add = 0,
        /// Modify matching entries.
        Modify = 1,
        /// Strictly modify one entry.
        ModifyStrict = 2,
        /// Delete matching entries.
        Delete = 3,
        /// Strictly delete one entry.
        DeleteStrict = 4,
    }
}

wire_enum! {
    /// Command byte of a GROUP_MOD.
    pub enum GroupModCommand: "group mod command" {
        /// Install a group.
        Add = 0,
        /// Modify a group.
        Modify = 1,
        /// Remove a group.
        Delete = 2,
    }
}

wire_enum! {
    /// Group semantics.
    pub enum GroupType: "group type" {
        /// Execute all buckets.
        All = 0,
        /// Execute one bucket.
        Select = 1,
        /// Single-bucket indirection.
        Indirect = 2,
        /// Fast failover.
        FastFailover = 3,
    }
}

wire_enum! {
    /// Command byte of a METER_MOD.
    pub enum MeterModCommand: "meter mod command" {
        /// Install a meter.
        Add = 0,
        /// Modify a meter.
        Modify = 1,
        /// Remove a meter.
        Delete = 2,
    }
}

wire_enum! {
    /// Command byte carried inside counter records.
    pub enum CounterModCommand: "counter mod command" {
        /// Allocate a counter.
        Add = 0,
        /// Free a counter.
        Delete = 1,
        /// Zero a counter.
        Clear = 2,
        /// Ask the switch for the current value.
        Query = 3,
        /// Switch response to a query.
        QueryReply = 4,
    }
}

wire_enum! {
    /// Reason byte of PORT_STATUS / PORT_MOD.
    pub enum PortReason: "port reason" {
        /// Port appeared.
        Add = 0,
        /// Port went away.
        Delete = 1,
        /// Port attributes changed.
        Modify = 2,
    }
}

wire_enum! {
    /// Reason byte of a PACKET_IN.
    pub enum PacketInReason: "packet-in reason" {
        /// No matching entry.
        NoMatch = 0,
        /// Explicit packet-in action.
        Action = 1,
        /// TTL was invalid.
        InvalidTtl = 2,
    }
}

wire_enum! {
    /// Reason carried by a drop action.
    pub enum DropReason: "drop reason" {
        /// Lifetime expired.
        Timeout = 0,
        /// Lookup miss.
        HitMiss = 1,
        /// Unspecified.
        Unknown = 2,
    }
}

wire_enum! {
    /// Arithmetic performed by a CALCULATE_FIELD instruction.
    pub enum CalcType: "calc type" {
        /// `dst + src`
        Add = 0,
        /// `dst - src`
        Subtract = 1,
        /// `dst << src`
        LeftShift = 2,
        /// `dst >> src`
        RightShift = 3,
        /// `dst & src`
        BitwiseAnd = 4,
        /// `dst | src`
        BitwiseOr = 5,
        /// `dst ^ src`
        BitwiseXor = 6,
        /// `~(dst | src)`
        BitwiseNor = 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_type_round_trip() {
        for ty in TableType::ALL {
            assert_eq!(TableType::try_from(u8::from(ty)).unwrap(), ty);
        }

        assert!(TableType::try_from(4).is_err());
    }

    #[test]
    fn instruction_slot_width() {
        // 8-byte instruction header + 8 byte body prefix + six 48-byte action slots.
        assert_eq!(INSTRUCTION_SLOT_LEN, 304);
        assert_eq!(ACTION_SLOT_LEN, 48);
    }
}
