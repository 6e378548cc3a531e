//! Exercising the cursor reader/writer against a realistic fixed-layout record.

use pofctl_wire::{PofWireSized, WireError, WireReader, WireWriter};

/// A toy record shaped like the real composites: a few integers, padding, a fixed-width
/// string and a zero-padded value slot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    kind: u8,
    index: u16,
    cookie: u64,
    name: String,
    value: [u8; 8],
}

impl Record {
    const PACKED_LEN: usize = 1 + 1 + 2 + 8 + 16 + 8;

    fn pack(&self, buf: &mut [u8]) -> Result<usize, WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.kind)?;
        writer.pad(1)?;
        writer.put(&self.index)?;
        writer.put(&self.cookie)?;
        writer.put_zstr(&self.name, 16)?;
        writer.put(&self.value)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(Self::PACKED_LEN)
    }

    fn unpack(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let kind = reader.take()?;
        reader.skip(1)?;
        let index = reader.take()?;
        let cookie = reader.take()?;
        let name = reader.take_zstr(16)?;
        let value = reader.take()?;
        reader.finish(Self::PACKED_LEN)?;

        Ok(Self {
            kind,
            index,
            cookie,
            name,
            value,
        })
    }
}

fn record() -> Record {
    Record {
        kind: 7,
        index: 0x0102,
        cookie: 0xdead_beef_0000_0001,
        name: "flow0".to_owned(),
        value: [1, 2, 3, 4, 5, 6, 7, 8],
    }
}

#[test]
fn round_trip() {
    let mut buf = [0u8; Record::PACKED_LEN];

    assert_eq!(record().pack(&mut buf).unwrap(), Record::PACKED_LEN);
    assert_eq!(Record::unpack(&buf).unwrap(), record());
}

#[test]
fn layout_is_big_endian_with_zero_padding() {
    let mut buf = [0xffu8; Record::PACKED_LEN];

    record().pack(&mut buf).unwrap();

    assert_eq!(buf[0], 7);
    // Pad byte is zeroed even over a dirty buffer.
    assert_eq!(buf[1], 0);
    assert_eq!(&buf[2..4], &[0x01, 0x02]);
    assert_eq!(&buf[4..8], &[0xde, 0xad, 0xbe, 0xef]);
    // Name slot: content then zero fill.
    assert_eq!(&buf[12..17], b"flow0");
    assert_eq!(&buf[17..28], &[0u8; 11]);
}

#[test]
fn short_destination_is_an_error_not_a_panic() {
    let mut buf = [0u8; 4];

    assert!(record().pack(&mut buf).is_err());
}

#[test]
fn truncated_source_reports_underrun() {
    let mut buf = [0u8; Record::PACKED_LEN];
    record().pack(&mut buf).unwrap();

    assert!(matches!(
        Record::unpack(&buf[..10]),
        Err(WireError::ReadBufferUnderrun { .. })
    ));
}

#[test]
fn packed_len_constants_line_up() {
    assert_eq!(<u64 as PofWireSized>::PACKED_LEN, 8);
    assert_eq!(<[u8; 8] as PofWireSized>::PACKED_LEN, 8);
}
