//! Physical port description (120 bytes on the wire).

use crate::wire::NAME_MAX_LEN;
use pofctl_wire::{PofWireRead, PofWireSized, PofWireWrite, WireError, WireReader, WireWriter};

bitflags::bitflags! {
    /// Port administrative configuration bits.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct PortConfig: u32 {
        /// Port is administratively down.
        const PORT_DOWN = 1;
        /// Drop all packets received by the port.
        const NO_RECV = 4;
        /// Drop packets forwarded to the port.
        const NO_FWD = 32;
        /// Do not send packet-in messages for the port.
        const NO_PACKET_IN = 64;
    }
}

bitflags::bitflags! {
    /// Port link state bits.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct PortState: u32 {
        /// No physical link present.
        const LINK_DOWN = 1;
        /// Port is blocked.
        const BLOCKED = 2;
        /// Live for fast failover.
        const LIVE = 4;
    }
}

bitflags::bitflags! {
    /// Port feature/speed bits, used for `curr`/`advertised`/`supported`/`peer`.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct PortFeatures: u32 {
        /// 10 Mb half-duplex.
        const RATE_10MB_HD = 1;
        /// 10 Mb full-duplex.
        const RATE_10MB_FD = 2;
        /// 100 Mb half-duplex.
        const RATE_100MB_HD = 4;
        /// 100 Mb full-duplex.
        const RATE_100MB_FD = 8;
        /// 1 Gb half-duplex.
        const RATE_1GB_HD = 16;
        /// 1 Gb full-duplex.
        const RATE_1GB_FD = 32;
        /// 10 Gb full-duplex.
        const RATE_10GB_FD = 64;
        /// 40 Gb full-duplex.
        const RATE_40GB_FD = 128;
        /// 100 Gb full-duplex.
        const RATE_100GB_FD = 256;
        /// 1 Tb full-duplex.
        const RATE_1TB_FD = 512;
        /// Other rate.
        const OTHER = 1024;
        /// Copper medium.
        const COPPER = 2048;
        /// Fiber medium.
        const FIBER = 4096;
        /// Auto-negotiation.
        const AUTONEG = 8192;
        /// Pause.
        const PAUSE = 16384;
        /// Asymmetric pause.
        const PAUSE_ASYM = 32768;
    }
}

/// Description of a physical switch port.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PhyPort {
    /// Port id, unique within the device.
    pub port_id: u32,
    /// Owning device id.
    pub device_id: u32,
    /// MAC address.
    pub hw_addr: [u8; 6],
    /// Human-readable port name (at most 64 bytes).
    pub name: String,
    /// Administrative configuration.
    pub config: PortConfig,
    /// Link state.
    pub state: PortState,
    /// Current features.
    pub curr: PortFeatures,
    /// Advertised features.
    pub advertised: PortFeatures,
    /// Supported features.
    pub supported: PortFeatures,
    /// Features advertised by the peer.
    pub peer: PortFeatures,
    /// Current speed in kbps.
    pub curr_speed: u32,
    /// Maximum speed in kbps.
    pub max_speed: u32,
    /// Whether the port participates in POF forwarding.
    pub of_enable: bool,
}

impl PhyPort {
    /// Byte offset of the `of_enable` flag within the packed port.
    pub const OF_ENABLE_OFFSET: usize = 112;
}

impl PofWireWrite for PhyPort {
    fn packed_len(&self) -> usize {
        Self::PACKED_LEN
    }

    fn pack_to_slice<'buf>(&self, buf: &'buf mut [u8]) -> Result<&'buf [u8], WireError> {
        let mut writer = WireWriter::new(buf);

        writer.put(&self.port_id)?;
        writer.put(&self.device_id)?;
        writer.put(&self.hw_addr)?;
        writer.pad(2)?;
        writer.put_zstr(&self.name, NAME_MAX_LEN)?;
        writer.put(&self.config.bits())?;
        writer.put(&self.state.bits())?;
        writer.put(&self.curr.bits())?;
        writer.put(&self.advertised.bits())?;
        writer.put(&self.supported.bits())?;
        writer.put(&self.peer.bits())?;
        writer.put(&self.curr_speed)?;
        writer.put(&self.max_speed)?;
        writer.put(&u8::from(self.of_enable))?;
        writer.pad(7)?;
        writer.finish(Self::PACKED_LEN)?;

        Ok(&buf[0..Self::PACKED_LEN])
    }
}

impl PofWireRead for PhyPort {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(buf);

        let port_id = reader.take()?;
        let device_id = reader.take()?;
        let hw_addr = reader.take()?;
        reader.skip(2)?;
        let name = reader.take_zstr(NAME_MAX_LEN)?;
        let config = PortConfig::from_bits_retain(reader.take()?);
        let state = PortState::from_bits_retain(reader.take()?);
        let curr = PortFeatures::from_bits_retain(reader.take()?);
        let advertised = PortFeatures::from_bits_retain(reader.take()?);
        let supported = PortFeatures::from_bits_retain(reader.take()?);
        let peer = PortFeatures::from_bits_retain(reader.take()?);
        let curr_speed = reader.take()?;
        let max_speed = reader.take()?;
        let of_enable = reader.take::<u8>()? != 0;
        reader.skip(7)?;
        reader.finish(Self::PACKED_LEN)?;

        Ok(Self {
            port_id,
            device_id,
            hw_addr,
            name,
            config,
            state,
            curr,
            advertised,
            supported,
            peer,
            curr_speed,
            max_speed,
            of_enable,
        })
    }
}

impl PofWireSized for PhyPort {
    const PACKED_LEN: usize = 120;
}

impl core::fmt::Display for PhyPort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.name, self.port_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_port() -> PhyPort {
        PhyPort {
            port_id: 2,
            device_id: 0x8404_5e6e,
            hw_addr: [0x00, 0x26, 0xb9, 0x54, 0xee, 0x0f],
            name: "eth2".to_owned(),
            config: PortConfig::empty(),
            state: PortState::LIVE,
            curr: PortFeatures::RATE_1GB_FD | PortFeatures::COPPER,
            advertised: PortFeatures::RATE_1GB_FD,
            supported: PortFeatures::RATE_1GB_FD | PortFeatures::RATE_100MB_FD,
            peer: PortFeatures::empty(),
            curr_speed: 1_000_000,
            max_speed: 1_000_000,
            of_enable: true,
        }
    }

    #[test]
    fn round_trip() {
        let port = example_port();
        let mut buf = [0u8; PhyPort::PACKED_LEN];

        port.pack_to_slice(&mut buf).unwrap();

        assert_eq!(PhyPort::unpack_from_slice(&buf).unwrap(), port);
    }

    #[test]
    fn of_enable_offset() {
        let port = example_port();
        let mut buf = [0u8; PhyPort::PACKED_LEN];

        port.pack_to_slice(&mut buf).unwrap();

        assert_eq!(buf[PhyPort::OF_ENABLE_OFFSET], 1);
        // Trailing pad after the flag.
        assert_eq!(&buf[PhyPort::OF_ENABLE_OFFSET + 1..], &[0u8; 7]);
    }

    #[test]
    fn name_slot_is_zero_padded() {
        let port = example_port();
        let mut buf = [0u8; PhyPort::PACKED_LEN];

        port.pack_to_slice(&mut buf).unwrap();

        assert_eq!(&buf[16..20], b"eth2");
        assert_eq!(&buf[20..80], &[0u8; 60]);
    }

    #[test]
    fn oversized_name_is_rejected() {
        let mut port = example_port();
        port.name = "x".repeat(NAME_MAX_LEN + 1);

        let mut buf = [0u8; PhyPort::PACKED_LEN];

        assert_eq!(port.pack_to_slice(&mut buf), Err(WireError::TooLong));
    }
}
