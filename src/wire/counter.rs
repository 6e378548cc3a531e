//! Counter record shared by COUNTER_MOD, COUNTER_REQUEST and COUNTER_REPLY.

use crate::wire::CounterModCommand;
use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError, WireReader, WireWriter};

/// A counter: id plus packet and byte tallies (24 bytes).
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Counter {
    /// What the carrying message asks the switch to do.
    pub command: CounterModCommand,
    /// Counter id from the controller pool.
    pub counter_id: u32,
    /// Packet count.
    pub counter_value: u64,
    /// Byte count.
    pub byte_value: u64,
}

impl Counter {
    /// A fresh counter record with zeroed tallies.
    pub fn new(command: CounterModCommand, counter_id: u32) -> Self {
        Self {
            command,
            counter_id,
            counter_value: 0,
            byte_value: 0,
        }
    }
}

impl PofWireWrite for Counter {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.command)?;
        writer.pad(3)?;
        writer.put(&self.counter_id)?;
        writer.put(&self.counter_value)?;
        writer.put(&self.byte_value)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for Counter {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let command = reader.take()?;
        reader.skip(3)?;

        let out = Self {
            command,
            counter_id: reader.take()?,
            counter_value: reader.take()?,
            byte_value: reader.take()?,
        };

        reader.finish(Self::PACKED_LEN)?;

        Ok(out)
    }
}

impl PofWireSized for Counter {
    const PACKED_LEN: usize = 24;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let counter = Counter {
            command: CounterModCommand::Query,
            counter_id: 7,
            counter_value: 1234,
            byte_value: 99_000,
        };

        let mut buf = [0u8; Counter::PACKED_LEN];
        counter.pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf[0], 3);
        assert_eq!(Counter::unpack_from_slice(&buf).unwrap(), counter);
    }
}
