//! The 8-byte header prefixed to every POF message.

use crate::wire::message::MessageKind;
use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError, WireReader, WireWriter};

/// Message header: version, type, total length, transaction id.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    /// Wire version; always [`POF_VERSION`](crate::wire::POF_VERSION) on emission.
    pub version: u8,
    /// Raw message type byte.
    pub kind: u8,
    /// Total message length in bytes, header included.
    pub length: u16,
    /// Transaction id.
    pub xid: u32,
}

impl Header {
    /// Packed size.
    pub const LEN: usize = 8;

    pub(crate) fn new(kind: MessageKind, length: usize, xid: u32) -> Self {
        Self {
            version: crate::wire::POF_VERSION,
            kind: u8::from(kind),
            length: length as u16,
            xid,
        }
    }

    /// Peek a header off the front of a receive buffer without consuming it.
    ///
    /// Used by the connection framing loop to learn how many bytes to wait for.
    pub fn peek(buf: &[u8]) -> Result<Self, WireError> {
        Self::unpack_from_slice(buf)
    }
}

impl PofWireWrite for Header {
    fn packed_len(&self) -> usize {
        Self::LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.version)?;
        writer.put(&self.kind)?;
        writer.put(&self.length)?;
        writer.put(&self.xid)?;

        Ok(&buf[0..Self::LEN])
    }
}

impl PofWireRead for Header {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let header = Self {
            version: reader.take()?,
            kind: reader.take()?,
            length: reader.take()?,
            xid: reader.take()?,
        };

        Ok(header)
    }
}

impl PofWireSized for Header {
    const PACKED_LEN: usize = Self::LEN;
}
