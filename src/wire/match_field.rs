//! Match descriptors: the 8-byte field descriptor ("match20"), the 40-byte value+mask match
//! ("matchx"), and the legacy fixed match carried by FLOW_REMOVED.

use crate::wire::MAX_FIELD_LEN_BYTES;
use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError, WireReader, WireWriter};

/// Field id denoting a metadata field rather than a packet field.
pub const METADATA_FIELD_ID: i16 = -1;

/// A field descriptor: a bit range at `offset..offset + length` within a packet or metadata.
///
/// This is the fundamental POF matching unit. The controller-side name of a field lives in the
/// PM database, not on the wire.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct Match20 {
    /// Field id; [`METADATA_FIELD_ID`] denotes a metadata field.
    pub field_id: i16,
    /// Offset in bits.
    pub offset: u16,
    /// Length in bits.
    pub length: u16,
}

impl Match20 {
    /// Build a descriptor over a packet field.
    pub fn new(field_id: i16, offset: u16, length: u16) -> Self {
        Self {
            field_id,
            offset,
            length,
        }
    }
}

impl PofWireWrite for Match20 {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.field_id)?;
        writer.put(&self.offset)?;
        writer.put(&self.length)?;
        writer.pad(2)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for Match20 {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let out = Self {
            field_id: reader.take()?,
            offset: reader.take()?,
            length: reader.take()?,
        };

        reader.skip(2)?;
        reader.finish(Self::PACKED_LEN)?;

        Ok(out)
    }
}

impl PofWireSized for Match20 {
    const PACKED_LEN: usize = 8;
}

/// A match: field descriptor plus value and mask, each zero-padded to 16 bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchX {
    /// The field being matched.
    pub field: Match20,
    /// Match value, left-aligned.
    pub value: [u8; MAX_FIELD_LEN_BYTES],
    /// Match mask, left-aligned.
    pub mask: [u8; MAX_FIELD_LEN_BYTES],
}

impl MatchX {
    /// Build a matchx from raw value/mask bytes, zero-padding on the right.
    ///
    /// Fails with [`WireError::TooLong`] if either slice exceeds the 16-byte slot.
    pub fn from_bytes(field: Match20, value: &[u8], mask: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            field,
            value: pad_field_bytes(value)?,
            mask: pad_field_bytes(mask)?,
        })
    }

    /// Build a matchx from hex-string value/mask, e.g. `"0026b954ee0f"`.
    ///
    /// Odd-length strings get a trailing zero nibble; strings longer than 32 nibbles are
    /// rejected.
    pub fn from_hex(field: Match20, value: &str, mask: &str) -> Result<Self, WireError> {
        Ok(Self {
            field,
            value: parse_hex(value)?,
            mask: parse_hex(mask)?,
        })
    }
}

impl PofWireWrite for MatchX {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.field)?;
        writer.put(&self.value)?;
        writer.put(&self.mask)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for MatchX {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let out = Self {
            field: reader.take()?,
            value: reader.take()?,
            mask: reader.take()?,
        };

        reader.finish(Self::PACKED_LEN)?;

        Ok(out)
    }
}

impl PofWireSized for MatchX {
    const PACKED_LEN: usize = 40;
}

/// Parse a hex string into a left-aligned, zero-padded 16-byte field value.
///
/// Values are nibble-aligned: an odd-length string gets a trailing zero nibble, so `"abc"`
/// parses as `[0xab, 0xc0, 0, ..]`.
pub fn parse_hex(s: &str) -> Result<[u8; MAX_FIELD_LEN_BYTES], WireError> {
    if s.len() > MAX_FIELD_LEN_BYTES * 2 {
        return Err(WireError::TooLong);
    }

    let mut out = [0u8; MAX_FIELD_LEN_BYTES];

    for (i, c) in s.chars().enumerate() {
        let nibble = c
            .to_digit(16)
            .ok_or(WireError::InvalidValue("hex string"))? as u8;

        if i % 2 == 0 {
            out[i / 2] = nibble << 4;
        } else {
            out[i / 2] |= nibble;
        }
    }

    Ok(out)
}

fn pad_field_bytes(raw: &[u8]) -> Result<[u8; MAX_FIELD_LEN_BYTES], WireError> {
    if raw.len() > MAX_FIELD_LEN_BYTES {
        return Err(WireError::TooLong);
    }

    let mut out = [0u8; MAX_FIELD_LEN_BYTES];

    out[..raw.len()].copy_from_slice(raw);

    Ok(out)
}

/// An 8-byte slot holding either an immediate `u32` or a field descriptor, selected by a
/// one-byte discriminant elsewhere in the record.
///
/// Output actions, delete-field actions and several instructions use this shape.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ValueOrField {
    /// Immediate value.
    Value(u32),
    /// Take the value from a field at packet/metadata runtime.
    Field(Match20),
}

impl ValueOrField {
    /// Slot width on the wire.
    pub const SLOT_LEN: usize = 8;

    /// The discriminant byte: 0 for an immediate value, 1 for a field.
    pub fn kind(&self) -> u8 {
        match self {
            ValueOrField::Value(_) => 0,
            ValueOrField::Field(_) => 1,
        }
    }

    pub(crate) fn pack_slot(&self, writer: &mut WireWriter<'_>) -> Result<(), WireError> {
        match self {
            ValueOrField::Value(value) => {
                writer.put(value)?;
                writer.pad(4)
            }
            ValueOrField::Field(field) => writer.put(field),
        }
    }

    pub(crate) fn unpack_slot(kind: u8, reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        match kind {
            0 => {
                let value = reader.take()?;
                reader.skip(4)?;

                Ok(ValueOrField::Value(value))
            }
            1 => Ok(ValueOrField::Field(reader.take()?)),
            _ => Err(WireError::InvalidValue("value/field discriminant")),
        }
    }
}

impl Default for ValueOrField {
    fn default() -> Self {
        ValueOrField::Value(0)
    }
}

/// The legacy fixed-layout match carried by FLOW_REMOVED (40 bytes).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct StdMatch {
    /// Wildcard bits.
    pub wildcards: u32,
    /// Ingress port.
    pub in_port: u16,
    /// Ethernet source.
    pub dl_src: [u8; 6],
    /// Ethernet destination.
    pub dl_dst: [u8; 6],
    /// VLAN id.
    pub dl_vlan: u16,
    /// VLAN priority code point.
    pub dl_vlan_pcp: u8,
    /// Ethertype.
    pub dl_type: u16,
    /// IP type of service.
    pub nw_tos: u8,
    /// IP protocol.
    pub nw_proto: u8,
    /// IP source.
    pub nw_src: u32,
    /// IP destination.
    pub nw_dst: u32,
    /// Transport source port.
    pub tp_src: u16,
    /// Transport destination port.
    pub tp_dst: u16,
}

impl PofWireWrite for StdMatch {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.wildcards)?;
        writer.put(&self.in_port)?;
        writer.put(&self.dl_src)?;
        writer.put(&self.dl_dst)?;
        writer.put(&self.dl_vlan)?;
        writer.put(&self.dl_vlan_pcp)?;
        writer.pad(1)?;
        writer.put(&self.dl_type)?;
        writer.put(&self.nw_tos)?;
        writer.put(&self.nw_proto)?;
        writer.pad(2)?;
        writer.put(&self.nw_src)?;
        writer.put(&self.nw_dst)?;
        writer.put(&self.tp_src)?;
        writer.put(&self.tp_dst)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for StdMatch {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let mut out = Self {
            wildcards: reader.take()?,
            in_port: reader.take()?,
            dl_src: reader.take()?,
            dl_dst: reader.take()?,
            dl_vlan: reader.take()?,
            dl_vlan_pcp: reader.take()?,
            ..Self::default()
        };

        reader.skip(1)?;
        out.dl_type = reader.take()?;
        out.nw_tos = reader.take()?;
        out.nw_proto = reader.take()?;
        reader.skip(2)?;
        out.nw_src = reader.take()?;
        out.nw_dst = reader.take()?;
        out.tp_src = reader.take()?;
        out.tp_dst = reader.take()?;
        reader.finish(Self::PACKED_LEN)?;

        Ok(out)
    }
}

impl PofWireSized for StdMatch {
    const PACKED_LEN: usize = 40;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match20_layout() {
        let field = Match20::new(-1, 48, 16);
        let mut buf = [0u8; 8];

        field.pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf, [0xff, 0xff, 0x00, 0x30, 0x00, 0x10, 0x00, 0x00]);
        assert_eq!(Match20::unpack_from_slice(&buf).unwrap(), field);
    }

    #[test]
    fn matchx_round_trip() {
        let matchx =
            MatchX::from_hex(Match20::new(1, 0, 48), "0026b954ee0f", "ffffffffffff").unwrap();

        let mut buf = [0u8; 40];
        matchx.pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf.len(), 40);
        assert_eq!(&buf[8..14], &[0x00, 0x26, 0xb9, 0x54, 0xee, 0x0f]);
        assert_eq!(&buf[14..24], &[0u8; 10]);
        assert_eq!(&buf[24..30], &[0xff; 6]);
        assert_eq!(MatchX::unpack_from_slice(&buf).unwrap(), matchx);
    }

    #[test]
    fn hex_odd_length_gets_trailing_zero_nibble() {
        let value = parse_hex("abc").unwrap();

        assert_eq!(value[0], 0xab);
        assert_eq!(value[1], 0xc0);
        assert_eq!(&value[2..], &[0u8; 14]);
    }

    #[test]
    fn hex_too_long_is_rejected() {
        let long = "00".repeat(17);

        assert_eq!(parse_hex(&long), Err(WireError::TooLong));
    }

    #[test]
    fn hex_rejects_non_hex() {
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn std_match_length() {
        let mut buf = [0u8; 64];
        let packed = StdMatch::default().pack_to_slice(&mut buf).unwrap();

        assert_eq!(packed.len(), 40);
    }
}
