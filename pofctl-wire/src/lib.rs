//! Traits used to pack/unpack structs and messages from POF packets on the wire.
//!
//! POF (like the OpenFlow it descends from) is big-endian on the wire, and its records are
//! fixed-layout: every variable-cardinality list is serialized into a maximum-length,
//! zero-padded slot so that each record type has a single on-wire size. This crate holds the
//! codec plumbing only; the record definitions themselves live in `pofctl::wire`.

#![deny(missing_docs)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

mod error;
mod impls;

pub use error::WireError;
pub use impls::{WireReader, WireWriter};

/// A type that can be read off the wire (big endian, packed POF layout).
pub trait PofWireRead: Sized {
    /// Unpack this type from the beginning of the given buffer.
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError>;
}

/// A type that can be written to the wire (big endian, packed POF layout).
pub trait PofWireWrite {
    /// The length in bytes of this item when packed.
    fn packed_len(&self) -> usize;

    /// Pack the type and write it into the beginning of `buf`.
    ///
    /// Returns the written prefix of `buf`. Errors if the buffer is too short.
    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError>;

    /// Pack the type into a freshly allocated buffer.
    fn pack_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.packed_len()];

        // The buffer is sized from `packed_len` so the only possible failure is a bug in the
        // implementation itself.
        let used = self
            .pack_to_slice(&mut buf)
            .expect("pack_vec buffer sizing")
            .len();

        buf.truncate(used);

        buf
    }
}

/// Implemented for types with a known packed size at compile time.
///
/// This is every POF record except the handful of messages with a trailing variable body
/// (echo payloads, packet-in data).
pub trait PofWireSized: PofWireWrite {
    /// Packed size in bytes.
    const PACKED_LEN: usize;
}
