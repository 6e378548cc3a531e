//! Builtin implementations for primitive types, plus the cursor reader/writer every
//! record codec is written against.

use crate::{PofWireRead, PofWireSized, PofWireWrite, WireError};

macro_rules! impl_primitive_wire_field {
    ($ty:ty, $size:expr) => {
        impl PofWireWrite for $ty {
            fn packed_len(&self) -> usize {
                $size
            }

            fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
                let chunk = buf
                    .get_mut(0..$size)
                    .ok_or(WireError::WriteBufferTooShort)?;

                chunk.copy_from_slice(&self.to_be_bytes());

                Ok(chunk)
            }
        }

        impl PofWireRead for $ty {
            fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
                buf.get(0..$size)
                    .ok_or(WireError::ReadBufferUnderrun {
                        wanted: $size,
                        available: buf.len(),
                    })
                    .and_then(|raw| {
                        raw.try_into()
                            .map_err(|_| WireError::InvalidValue("primitive"))
                    })
                    .map(Self::from_be_bytes)
            }
        }

        impl PofWireSized for $ty {
            const PACKED_LEN: usize = $size;
        }
    };
}

impl_primitive_wire_field!(u8, 1);
impl_primitive_wire_field!(u16, 2);
impl_primitive_wire_field!(u32, 4);
impl_primitive_wire_field!(u64, 8);
impl_primitive_wire_field!(i8, 1);
impl_primitive_wire_field!(i16, 2);
impl_primitive_wire_field!(i32, 4);
impl_primitive_wire_field!(i64, 8);

impl<const N: usize> PofWireWrite for [u8; N] {
    fn packed_len(&self) -> usize {
        N
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let chunk = buf.get_mut(0..N).ok_or(WireError::WriteBufferTooShort)?;

        chunk.copy_from_slice(self);

        Ok(chunk)
    }
}

impl<const N: usize> PofWireRead for [u8; N] {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        buf.get(0..N)
            .ok_or(WireError::ReadBufferUnderrun {
                wanted: N,
                available: buf.len(),
            })
            .and_then(|raw| raw.try_into().map_err(|_| WireError::InvalidValue("array")))
    }
}

impl<const N: usize> PofWireSized for [u8; N] {
    const PACKED_LEN: usize = N;
}

/// Cursor over a receive buffer.
///
/// Every composite unpacker takes one of these and must consume exactly the record's declared
/// length; [`WireReader::finish`] checks that invariant.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read one fixed-size value and advance past it.
    pub fn take<T>(&mut self) -> Result<T, WireError>
    where
        T: PofWireRead + PofWireSized,
    {
        let value = T::unpack_from_slice(&self.buf[self.pos..])?;

        self.pos += T::PACKED_LEN;

        Ok(value)
    }

    /// Read `len` raw bytes and advance past them.
    pub fn slice(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let out = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or(WireError::ReadBufferUnderrun {
                wanted: len,
                available: self.remaining(),
            })?;

        self.pos += len;

        Ok(out)
    }

    /// Skip `len` padding bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), WireError> {
        self.slice(len).map(|_| ())
    }

    /// Read a fixed-width zero-padded string slot, trimming the padding.
    pub fn take_zstr(&mut self, width: usize) -> Result<String, WireError> {
        let raw = self.slice(width)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(width);

        core::str::from_utf8(&raw[..end])
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidValue("string"))
    }

    /// Assert that exactly `expected` bytes were consumed.
    ///
    /// A mismatch means the record layout and the decoder disagree, which is a protocol error
    /// for the whole message.
    pub fn finish(self, expected: usize) -> Result<(), WireError> {
        if self.pos == expected {
            Ok(())
        } else {
            Err(WireError::LengthMismatch {
                expected,
                actual: self.pos,
            })
        }
    }
}

/// Cursor over a transmit buffer.
#[derive(Debug)]
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    /// Create a writer over `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Write one value and advance past it.
    pub fn put<T>(&mut self, value: &T) -> Result<(), WireError>
    where
        T: PofWireWrite,
    {
        let written = value.pack_to_slice(&mut self.buf[self.pos..])?.len();

        self.pos += written;

        Ok(())
    }

    /// Write raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let chunk = self
            .buf
            .get_mut(self.pos..self.pos + bytes.len())
            .ok_or(WireError::WriteBufferTooShort)?;

        chunk.copy_from_slice(bytes);

        self.pos += bytes.len();

        Ok(())
    }

    /// Write `len` zero bytes of padding.
    pub fn pad(&mut self, len: usize) -> Result<(), WireError> {
        let chunk = self
            .buf
            .get_mut(self.pos..self.pos + len)
            .ok_or(WireError::WriteBufferTooShort)?;

        chunk.fill(0);

        self.pos += len;

        Ok(())
    }

    /// Zero-fill up to an absolute offset from the start of the writer.
    pub fn pad_to(&mut self, offset: usize) -> Result<(), WireError> {
        if offset < self.pos {
            return Err(WireError::TooLong);
        }

        let len = offset - self.pos;

        self.pad(len)
    }

    /// Write a string left-justified into a fixed-width slot, right-padded with zero bytes.
    pub fn put_zstr(&mut self, value: &str, width: usize) -> Result<(), WireError> {
        if value.len() > width {
            return Err(WireError::TooLong);
        }

        self.put_bytes(value.as_bytes())?;

        self.pad(width - value.len())
    }

    /// Assert that exactly `expected` bytes were written.
    pub fn finish(self, expected: usize) -> Result<(), WireError> {
        if self.pos == expected {
            Ok(())
        } else {
            Err(WireError::LengthMismatch {
                expected,
                actual: self.pos,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_big_endian() {
        let mut buf = [0u8; 4];

        0x8404_5e6eu32.pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf, [0x84, 0x04, 0x5e, 0x6e]);
        assert_eq!(u32::unpack_from_slice(&buf).unwrap(), 0x8404_5e6e);
    }

    #[test]
    fn signed_field_id() {
        let mut buf = [0u8; 2];

        (-1i16).pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf, [0xff, 0xff]);
        assert_eq!(i16::unpack_from_slice(&buf).unwrap(), -1);
    }

    #[test]
    fn underrun_reports_sizes() {
        assert_eq!(
            u32::unpack_from_slice(&[0u8; 2]),
            Err(WireError::ReadBufferUnderrun {
                wanted: 4,
                available: 2
            })
        );
    }

    #[test]
    fn reader_tracks_consumption() {
        let buf = [0x00, 0x01, 0xab, 0xcd, 0x00, 0x00];
        let mut reader = WireReader::new(&buf);

        assert_eq!(reader.take::<u16>().unwrap(), 1);
        assert_eq!(reader.take::<u16>().unwrap(), 0xabcd);
        reader.skip(2).unwrap();

        reader.finish(6).unwrap();
    }

    #[test]
    fn reader_finish_rejects_partial_consumption() {
        let buf = [0u8; 8];
        let mut reader = WireReader::new(&buf);

        reader.skip(4).unwrap();

        assert_eq!(
            reader.finish(8),
            Err(WireError::LengthMismatch {
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn zstr_round_trip() {
        let mut buf = [0xffu8; 8];

        {
            let mut writer = WireWriter::new(&mut buf);
            writer.put_zstr("eth0", 8).unwrap();
            writer.finish(8).unwrap();
        }

        assert_eq!(&buf, b"eth0\0\0\0\0");

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.take_zstr(8).unwrap(), "eth0");
    }

    #[test]
    fn zstr_too_long() {
        let mut buf = [0u8; 4];
        let mut writer = WireWriter::new(&mut buf);

        assert_eq!(writer.put_zstr("too long", 4), Err(WireError::TooLong));
    }
}
