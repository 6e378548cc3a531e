//! Encode/decode error.

/// Wire encode/decode errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Ran out of buffer while reading.
    ReadBufferUnderrun {
        /// Bytes wanted by the read.
        wanted: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// The destination buffer is too short for the packed representation.
    WriteBufferTooShort,
    /// A value is too long to fit in its fixed-size slot.
    TooLong,
    /// A field holds a value that is not valid for its type.
    InvalidValue(&'static str),
    /// An unknown discriminant was encountered while decoding a tagged record.
    UnknownDiscriminant {
        /// What kind of record was being decoded, e.g. `"message"` or `"action"`.
        kind: &'static str,
        /// The offending raw value.
        value: u16,
    },
    /// A record consumed a different number of bytes than its declared length.
    LengthMismatch {
        /// Declared length in bytes.
        expected: usize,
        /// Bytes actually consumed.
        actual: usize,
    },
    /// The version byte of an incoming header is not the supported POF version.
    Version(u8),
}

impl std::error::Error for WireError {}

impl core::fmt::Display for WireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireError::ReadBufferUnderrun { wanted, available } => {
                write!(f, "wanted {} bytes but only {} available", wanted, available)
            }
            WireError::WriteBufferTooShort => f.write_str("write buffer too short"),
            WireError::TooLong => f.write_str("value too long for fixed-size slot"),
            WireError::InvalidValue(field) => write!(f, "invalid value for {}", field),
            WireError::UnknownDiscriminant { kind, value } => {
                write!(f, "unknown {} type {:#x}", kind, value)
            }
            WireError::LengthMismatch { expected, actual } => {
                write!(
                    f,
                    "record declared {} bytes but consumed {}",
                    expected, actual
                )
            }
            WireError::Version(version) => write!(f, "unsupported version {:#04x}", version),
        }
    }
}
