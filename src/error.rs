//! Controller error types.

pub use pofctl_wire::WireError;

/// A pofctl error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied argument is invalid (bad field list, bad table type, wrong
    /// key-length sum, reserved instruction, …).
    InvalidArgument(&'static str),
    /// An item could not be found.
    NotFound {
        /// Item kind.
        item: Item,
        /// An identifier within the item's namespace, where one applies.
        index: Option<u64>,
    },
    /// The operation conflicts with existing state, e.g. deleting a table that still holds
    /// entries.
    Conflict(&'static str),
    /// An id pool reached its switch-declared maximum.
    ResourceExhausted(Item),
    /// A string is too long to fit in a fixed-size wire buffer.
    StringTooLong {
        /// The length of the fixed-size buffer.
        max_length: usize,
        /// The length of the input string.
        string_length: usize,
    },
    /// An error occurred encoding or decoding a wire record.
    Wire(WireError),
    /// A socket read/write failed.
    Transport(std::io::ErrorKind),
    /// The peer connection is down.
    Disconnected,
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Error::NotFound { item, index } => match index {
                Some(index) => write!(f, "{:?} {} not found", item, index),
                None => write!(f, "{:?} not found", item),
            },
            Error::Conflict(what) => write!(f, "conflict: {}", what),
            Error::ResourceExhausted(item) => write!(f, "{:?} pool exhausted", item),
            Error::StringTooLong {
                max_length,
                string_length,
            } => write!(
                f,
                "string of {} bytes is too long to fit in max storage of {} bytes",
                string_length, max_length
            ),
            Error::Wire(e) => write!(f, "wire encode/decode error: {}", e),
            Error::Transport(kind) => write!(f, "transport error: {:?}", kind),
            Error::Disconnected => f.write_str("connection is down"),
        }
    }
}

/// The kind of item being looked for or allocated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Item {
    /// A connected switch.
    Switch,
    /// A flow table.
    FlowTable,
    /// A flow entry.
    FlowEntry,
    /// A field descriptor.
    Field,
    /// A protocol definition.
    Protocol,
    /// A metadata field.
    Metadata,
    /// A switch port.
    Port,
    /// A counter id.
    Counter,
    /// A meter id.
    Meter,
    /// A group id.
    Group,
}

impl From<WireError> for Error {
    fn from(value: WireError) -> Self {
        Self::Wire(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Transport(value.kind())
    }
}
