//! Per-switch connection state: receive framing, the handshake state machine, and the
//! chunked send queue that backs the deferred sender.

use crate::error::Error;
use crate::wire::message::FeaturesReply;
use crate::wire::{Header, Message, MessageKind, POF_VERSION};
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Write};
use std::time::Instant;

/// Largest unit handed to one socket write, so partial progress stays measurable.
///
/// Matches the conventional POSIX pipe buffer size.
pub const MAX_SEND_CHUNK: usize = 4096;

/// Identifier of one TCP session. A reconnecting switch gets a fresh id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

impl core::fmt::Display for ConnId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "con{}", self.0)
    }
}

/// The per-connection handshake state machine.
///
/// There is exactly one authoritative state per connection; handlers advance it instead of
/// chaining temporary listeners.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// TCP accepted; HELLO not yet sent.
    New,
    /// HELLO sent; waiting for the peer's FEATURES_REPLY.
    WaitFeatures,
    /// Features installed; counting the peer's boot-time PORT_STATUS messages.
    WaitPorts {
        /// PORT_STATUS messages the features promised.
        expected: u16,
        /// PORT_STATUS messages seen so far.
        received: u16,
    },
    /// Handshake complete; the switch is usable.
    Up,
    /// Torn down; no further I/O.
    Down,
}

/// Result of feeding received bytes through the framing layer.
#[derive(Debug)]
pub struct Ingest {
    /// Complete, decoded messages in arrival order.
    pub messages: Vec<Message>,
    /// Set when the stream is poisoned and the connection must be torn down.
    pub teardown: Option<Error>,
}

/// Controller-side state of one switch TCP session.
#[derive(Debug)]
pub struct Connection {
    /// Session id.
    pub id: ConnId,
    /// Handshake progress.
    pub state: HandshakeState,
    /// Device id learned from FEATURES_REPLY.
    pub device_id: Option<u32>,
    /// Features learned from FEATURES_REPLY.
    pub features: Option<FeaturesReply>,
    /// When the handshake completed.
    pub connect_time: Option<Instant>,
    /// Last time bytes arrived.
    pub last_seen: Instant,
    /// Whether the periodic keepalive has been armed.
    pub keepalive_started: bool,
    buf: Vec<u8>,
    in_flight: BTreeMap<u32, MessageKind>,
}

impl Connection {
    /// Fresh state for an accepted session.
    pub fn new(id: ConnId) -> Self {
        Self {
            id,
            state: HandshakeState::New,
            device_id: None,
            features: None,
            connect_time: None,
            last_seen: Instant::now(),
            keepalive_started: false,
            buf: Vec::new(),
            in_flight: BTreeMap::new(),
        }
    }

    /// Note an outstanding request so its reply can be correlated by xid.
    pub fn track_request(&mut self, xid: u32, kind: MessageKind) {
        self.in_flight.insert(xid, kind);
    }

    /// Correlate a reply with its request, forgetting the xid.
    ///
    /// Returns the kind of the request, or `None` for an unsolicited reply.
    pub fn complete_request(&mut self, xid: u32) -> Option<MessageKind> {
        self.in_flight.remove(&xid)
    }

    /// Number of requests still awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Note that the initial HELLO went out.
    pub fn hello_sent(&mut self) {
        if self.state == HandshakeState::New {
            self.state = HandshakeState::WaitFeatures;
        }
    }

    /// Install features and start counting port-status messages.
    pub fn features_received(&mut self, features: FeaturesReply) {
        self.device_id = Some(features.device_id);
        self.state = HandshakeState::WaitPorts {
            expected: features.port_num,
            received: 0,
        };
        self.features = Some(features);
    }

    /// Count one boot-time PORT_STATUS.
    ///
    /// Returns `true` when this was the last expected one: the connection transitions to
    /// [`HandshakeState::Up`] and stamps its connect time.
    pub fn port_status_received(&mut self) -> bool {
        if let HandshakeState::WaitPorts { expected, received } = self.state {
            let received = received + 1;

            if received >= expected {
                self.state = HandshakeState::Up;
                self.connect_time = Some(Instant::now());

                return true;
            }

            self.state = HandshakeState::WaitPorts { expected, received };
        }

        false
    }

    /// Feed received bytes through the framing layer.
    ///
    /// Buffers until a full `length` worth of message is available, then decodes. A version
    /// byte other than [`POF_VERSION`] on anything but a HELLO poisons the stream; a
    /// malformed message body is dropped and logged without killing the connection.
    pub fn ingest(&mut self, bytes: &[u8]) -> Ingest {
        self.last_seen = Instant::now();
        self.buf.extend_from_slice(bytes);

        let mut messages = Vec::new();
        let mut teardown = None;
        let mut offset = 0;

        while self.buf.len() - offset >= Header::LEN {
            let header = match Header::peek(&self.buf[offset..]) {
                Ok(header) => header,
                Err(e) => {
                    teardown = Some(Error::Wire(e));
                    break;
                }
            };

            if header.version != POF_VERSION && header.kind != u8::from(MessageKind::Hello) {
                log::warn!(
                    "bad version {:#04x} on {}; dropping connection",
                    header.version,
                    self.id
                );

                teardown = Some(Error::Wire(pofctl_wire::WireError::Version(header.version)));
                break;
            }

            let length = usize::from(header.length).max(Header::LEN);

            if self.buf.len() - offset < length {
                break;
            }

            match Message::unpack(&self.buf[offset..offset + length]) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    log::warn!("dropping malformed message on {}: {}", self.id, e);
                }
            }

            offset += length;
        }

        if offset > 0 {
            self.buf.drain(..offset);
        }

        Ingest { messages, teardown }
    }

    /// Bytes currently buffered awaiting a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// The ordered, chunked queue behind the deferred sender.
///
/// While the queue is non-empty every new payload is appended to it, so per-connection
/// submission order is preserved across back-pressure.
#[derive(Debug, Default)]
pub struct SendQueue {
    chunks: VecDeque<Vec<u8>>,
}

impl SendQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a payload, slicing it into chunks of at most [`MAX_SEND_CHUNK`] bytes.
    pub fn push(&mut self, data: &[u8]) {
        for chunk in data.chunks(MAX_SEND_CHUNK) {
            self.chunks.push_back(chunk.to_vec());
        }
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total queued bytes.
    pub fn pending_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Write queued chunks until drained or the writer blocks.
    ///
    /// Returns `Ok(true)` when the queue drained completely, `Ok(false)` when the writer
    /// would block with data still queued. Partial writes shrink the front chunk in place so
    /// no byte is ever sent twice.
    pub fn pump(&mut self, writer: &mut impl Write) -> io::Result<bool> {
        while let Some(front) = self.chunks.front_mut() {
            match writer.write(front) {
                Ok(written) if written == front.len() => {
                    self.chunks.pop_front();
                }
                Ok(written) => {
                    front.drain(..written);

                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }

    /// Send `data` directly if the queue is idle, spilling any unsent remainder into the
    /// queue.
    ///
    /// Returns `Ok(true)` when everything was written synchronously; `Ok(false)` means some
    /// or all of `data` is now queued and the deferred sender must take over.
    pub fn send_or_queue(&mut self, writer: &mut impl Write, data: &[u8]) -> io::Result<bool> {
        if !self.is_empty() {
            self.push(data);

            return Ok(false);
        }

        let mut sent = 0;

        while sent < data.len() {
            let end = (sent + MAX_SEND_CHUNK).min(data.len());

            match writer.write(&data[sent..end]) {
                Ok(written) => sent += written,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.push(&data[sent..]);

                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::{Hello, PacketIn};
    use pofctl_wire::PofWireWrite;

    #[test]
    fn handshake_counts_ports() {
        let mut conn = Connection::new(ConnId(1));

        conn.hello_sent();
        assert_eq!(conn.state, HandshakeState::WaitFeatures);

        conn.features_received(FeaturesReply {
            device_id: 0x8404_5e6e,
            port_num: 2,
            ..FeaturesReply::default()
        });

        assert_eq!(
            conn.state,
            HandshakeState::WaitPorts {
                expected: 2,
                received: 0
            }
        );

        assert!(!conn.port_status_received());
        assert!(conn.port_status_received());
        assert_eq!(conn.state, HandshakeState::Up);
        assert!(conn.connect_time.is_some());
    }

    #[test]
    fn in_flight_requests_settle_by_xid() {
        let mut conn = Connection::new(ConnId(1));

        conn.track_request(42, MessageKind::EchoRequest);
        conn.track_request(43, MessageKind::GetConfigRequest);

        assert_eq!(conn.in_flight(), 2);
        assert_eq!(conn.complete_request(43), Some(MessageKind::GetConfigRequest));
        assert_eq!(conn.complete_request(43), None);
        assert_eq!(conn.in_flight(), 1);
    }

    #[test]
    fn ingest_reassembles_split_frames() {
        let mut conn = Connection::new(ConnId(1));
        let packed = Message::Hello(Hello::new(9)).pack_vec();

        let first = conn.ingest(&packed[..5]);
        assert!(first.messages.is_empty());
        assert!(first.teardown.is_none());

        let second = conn.ingest(&packed[5..]);
        assert_eq!(second.messages.len(), 1);
        assert_eq!(conn.buffered(), 0);
    }

    #[test]
    fn ingest_decodes_back_to_back_frames() {
        let mut conn = Connection::new(ConnId(1));

        let mut stream = Message::Hello(Hello::new(1)).pack_vec();
        stream.extend(Message::EchoRequest(crate::wire::message::EchoRequest::new(2)).pack_vec());

        let out = conn.ingest(&stream);

        assert_eq!(out.messages.len(), 2);
        assert!(matches!(out.messages[0], Message::Hello(_)));
        assert!(matches!(out.messages[1], Message::EchoRequest(_)));
    }

    #[test]
    fn bad_version_poisons_the_stream() {
        let mut conn = Connection::new(ConnId(1));

        let mut packed = Message::PacketIn(PacketIn::default()).pack_vec();
        packed[0] = 0x03;

        let out = conn.ingest(&packed);

        assert!(out.messages.is_empty());
        assert!(out.teardown.is_some());
    }

    #[test]
    fn hello_with_foreign_version_passes() {
        let mut conn = Connection::new(ConnId(1));

        let mut packed = Message::Hello(Hello::new(1)).pack_vec();
        packed[0] = 0x01;

        let out = conn.ingest(&packed);

        assert_eq!(out.messages.len(), 1);
        assert!(out.teardown.is_none());
    }

    #[test]
    fn malformed_body_is_dropped_without_teardown() {
        let mut conn = Connection::new(ConnId(1));

        // Valid header claiming a features reply, but the body is all wrong (length 12
        // instead of 216), followed by a good hello.
        let mut stream = vec![0x04, 0x06, 0x00, 0x0c, 0, 0, 0, 1, 0xde, 0xad, 0xbe, 0xef];
        stream.extend(Message::Hello(Hello::new(2)).pack_vec());

        let out = conn.ingest(&stream);

        assert_eq!(out.messages.len(), 1);
        assert!(matches!(out.messages[0], Message::Hello(_)));
        assert!(out.teardown.is_none());
    }

    /// An `io::Write` that accepts a scripted number of bytes per call.
    struct ScriptedWriter {
        accepts: VecDeque<io::Result<usize>>,
        written: Vec<u8>,
    }

    impl ScriptedWriter {
        fn new(accepts: Vec<io::Result<usize>>) -> Self {
            Self {
                accepts: accepts.into(),
                written: Vec::new(),
            }
        }

        fn accept_all() -> Self {
            Self {
                accepts: VecDeque::new(),
                written: Vec::new(),
            }
        }
    }

    impl Write for ScriptedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.accepts.pop_front() {
                None => {
                    self.written.extend_from_slice(buf);

                    Ok(buf.len())
                }
                Some(Ok(n)) => {
                    let n = n.min(buf.len());
                    self.written.extend_from_slice(&buf[..n]);

                    Ok(n)
                }
                Some(Err(e)) => Err(e),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn would_block() -> io::Error {
        io::Error::from(io::ErrorKind::WouldBlock)
    }

    #[test]
    fn push_slices_into_chunks() {
        let mut queue = SendQueue::new();

        queue.push(&vec![0xab; MAX_SEND_CHUNK * 2 + 100]);

        assert_eq!(queue.chunks.len(), 3);
        assert_eq!(queue.pending_bytes(), MAX_SEND_CHUNK * 2 + 100);
    }

    #[test]
    fn direct_send_spills_remainder_on_would_block() {
        let mut queue = SendQueue::new();
        let mut writer = ScriptedWriter::new(vec![Ok(10), Err(would_block())]);

        let data: Vec<u8> = (0..100).collect();
        let done = queue.send_or_queue(&mut writer, &data).unwrap();

        assert!(!done);
        assert_eq!(writer.written, &data[..10]);
        assert_eq!(queue.pending_bytes(), 90);

        // Once writable again, the queue drains the exact remainder.
        let mut writer2 = ScriptedWriter::accept_all();
        assert!(queue.pump(&mut writer2).unwrap());
        assert_eq!(writer2.written, &data[10..]);
    }

    #[test]
    fn queued_sends_preserve_submission_order() {
        let mut queue = SendQueue::new();
        let mut blocked = ScriptedWriter::new(vec![Err(would_block())]);

        // Two fully written messages, then the third hits EAGAIN.
        let mut writer = ScriptedWriter::accept_all();
        assert!(queue.send_or_queue(&mut writer, b"first").unwrap());
        assert!(queue.send_or_queue(&mut writer, b"second").unwrap());
        assert!(!queue.send_or_queue(&mut blocked, b"third").unwrap());

        // Everything after the block goes through the queue, in order.
        assert!(!queue.send_or_queue(&mut writer, b"fourth").unwrap());
        assert!(!queue.send_or_queue(&mut writer, b"fifth").unwrap());

        let mut drain = ScriptedWriter::accept_all();
        assert!(queue.pump(&mut drain).unwrap());
        assert_eq!(drain.written, b"thirdfourthfifth");
    }

    #[test]
    fn thousand_messages_drain_in_order_without_duplicates() {
        let mut queue = SendQueue::new();

        let payloads: Vec<Vec<u8>> = (0..1000u32)
            .map(|i| {
                let mut payload = vec![0u8; 16];
                payload[..4].copy_from_slice(&i.to_be_bytes());
                payload
            })
            .collect();

        // First two delivered directly, the third send hits EAGAIN mid-way.
        let mut writer = ScriptedWriter::accept_all();
        assert!(queue.send_or_queue(&mut writer, &payloads[0]).unwrap());
        assert!(queue.send_or_queue(&mut writer, &payloads[1]).unwrap());

        let mut blocked = ScriptedWriter::new(vec![Ok(7), Err(would_block())]);
        assert!(!queue.send_or_queue(&mut blocked, &payloads[2]).unwrap());

        for payload in &payloads[3..] {
            assert!(!queue.send_or_queue(&mut writer, payload).unwrap());
        }

        // The socket becomes writable in fits and starts.
        let mut drained = Vec::new();
        let mut stalls = 0;

        loop {
            let mut sink = ScriptedWriter::new(vec![Ok(1000), Ok(1000), Err(would_block())]);
            let done = queue.pump(&mut sink).unwrap();

            drained.extend_from_slice(&sink.written);

            if done {
                break;
            }

            stalls += 1;
            assert!(stalls < 100, "drain did not make progress");
        }

        let mut expected = payloads[2][7..].to_vec();

        for payload in &payloads[3..] {
            expected.extend_from_slice(payload);
        }

        assert_eq!(drained, expected);
        assert!(queue.is_empty());
    }
}
