//! Flow table definition and per-type table resources.

use crate::wire::{
    match_field::Match20, TableModCommand, TableType, MAX_MATCH_FIELDS, NAME_MAX_LEN,
};
use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError, WireReader, WireWriter};

/// Switch-side capacity report for one table type (16 bytes), carried inside
/// RESOURCE_REPORT.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TableResource {
    /// Reporting device.
    pub device_id: u32,
    /// Table type the capacities apply to.
    pub table_type: TableType,
    /// Number of tables of this type the switch supports.
    pub table_num: u8,
    /// Maximum key length in bits.
    pub key_length: u16,
    /// Total entry capacity across tables of this type.
    pub total_size: u32,
}

impl PofWireWrite for TableResource {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.device_id)?;
        writer.put(&self.table_type)?;
        writer.put(&self.table_num)?;
        writer.put(&self.key_length)?;
        writer.put(&self.total_size)?;
        writer.pad(4)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for TableResource {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let out = Self {
            device_id: reader.take()?,
            table_type: reader.take()?,
            table_num: reader.take()?,
            key_length: reader.take()?,
            total_size: reader.take()?,
        };

        reader.skip(4)?;
        reader.finish(Self::PACKED_LEN)?;

        Ok(out)
    }
}

impl PofWireSized for TableResource {
    const PACKED_LEN: usize = 16;
}

/// A flow table definition as carried by TABLE_MOD (144 bytes with its padded match list).
///
/// `table_id` is the switch-facing id, local to `table_type`; the controller-side global id
/// is a PM database concern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlowTable {
    /// What the receiving switch should do with this definition.
    pub command: TableModCommand,
    /// Type-local table id.
    pub table_id: u8,
    /// Lookup discipline.
    pub table_type: TableType,
    /// Entry capacity.
    pub table_size: u32,
    /// Sum of match field lengths, in bits. Zero for LINEAR tables.
    pub key_length: u16,
    /// Table name (at most 64 bytes).
    pub table_name: String,
    /// Key layout; up to 8 field descriptors.
    pub match_fields: heapless::Vec<Match20, MAX_MATCH_FIELDS>,
}

impl FlowTable {
    /// Number of match fields in the key.
    pub fn match_field_num(&self) -> u8 {
        self.match_fields.len() as u8
    }
}

impl PofWireWrite for FlowTable {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.command)?;
        writer.put(&self.table_id)?;
        writer.put(&self.table_type)?;
        writer.put(&self.match_field_num())?;
        writer.put(&self.table_size)?;
        writer.put(&self.key_length)?;
        writer.pad(6)?;
        writer.put_zstr(&self.table_name, NAME_MAX_LEN)?;

        for field in &self.match_fields {
            writer.put(field)?;
        }

        writer.pad_to(Self::PACKED_LEN)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for FlowTable {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let command = reader.take()?;
        let table_id = reader.take()?;
        let table_type = reader.take()?;
        let match_field_num = reader.take::<u8>()?;
        let table_size = reader.take()?;
        let key_length = reader.take()?;
        reader.skip(6)?;
        let table_name = reader.take_zstr(NAME_MAX_LEN)?;

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

        reader.finish(Self::PACKED_LEN)?;

        Ok(Self {
            command,
            table_id,
            table_type,
            table_size,
            key_length,
            table_name,
            match_fields,
        })
    }
}

impl PofWireSized for FlowTable {
    // 16-byte fixed prefix + 64-byte name + 8 field slots of 8 bytes.
    const PACKED_LEN: usize = 16 + NAME_MAX_LEN + MAX_MATCH_FIELDS * Match20::PACKED_LEN;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_resource_round_trip() {
        let resource = TableResource {
            device_id: 0x8404_5e6e,
            table_type: TableType::Lpm,
            table_num: 8,
            key_length: 128,
            total_size: 1024,
        };

        let mut buf = [0u8; TableResource::PACKED_LEN];
        resource.pack_to_slice(&mut buf).unwrap();

        assert_eq!(TableResource::unpack_from_slice(&buf).unwrap(), resource);
    }

    #[test]
    fn flow_table_is_144_bytes() {
        assert_eq!(FlowTable::PACKED_LEN, 144);
    }

    #[test]
    fn flow_table_round_trip() {
        let mut match_fields = heapless::Vec::new();
        match_fields.push(Match20::new(0, 0, 48)).unwrap();

        let table = FlowTable {
            command: TableModCommand::Add,
            table_id: 0,
            table_type: TableType::Mm,
            table_size: 32,
            key_length: 48,
            table_name: "FirstEntryTable".to_owned(),
            match_fields,
        };

        let mut buf = [0u8; FlowTable::PACKED_LEN];
        table.pack_to_slice(&mut buf).unwrap();

        // command/id/type/field count prefix.
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        // Unused field slots stay zeroed.
        assert_eq!(&buf[80 + 8..], &[0u8; 56]);
        assert_eq!(FlowTable::unpack_from_slice(&buf).unwrap(), table);
    }
}
