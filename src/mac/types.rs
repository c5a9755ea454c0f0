//! Properties used in LoRaWAN MAC processing.

use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

use lora_modulation::{Bandwidth, SpreadingFactor};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// LoRaWAN L2 specification versions, ordered by release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum MacVersion {
    V1_0,
    V1_0_1,
    V1_0_2,
    V1_0_3,
    V1_0_4,
    V1_1,
}

impl MacVersion {
    /// DR 15 and TX power 15 in LinkADRReq mean "keep the current value".
    pub fn supports_link_adr_no_change(self) -> bool {
        self >= MacVersion::V1_0_4
    }

    /// The device answers each LinkADRReq of a block on its own, repeating the same answer.
    pub fn allows_duplicate_link_adr_ans(self) -> bool {
        matches!(self, MacVersion::V1_0_2 | MacVersion::V1_0_3 | MacVersion::V1_0_4)
    }

    /// LinkADRReq blocks are not atomic; every request gets its own, independent answer.
    pub fn link_adr_answer_per_request(self) -> bool {
        self < MacVersion::V1_0_2
    }

    /// Minor version as carried by ResetInd/RekeyInd and their confirmations.
    pub fn minor(self) -> u8 {
        match self {
            MacVersion::V1_1 => 1,
            _ => 0,
        }
    }
}

/// LoRaWAN device classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum DeviceClass {
    A,
    B,
    C,
}

/// Message type of a PHY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum MType {
    JoinRequest,
    JoinAccept,
    UnconfirmedDataUp,
    UnconfirmedDataDown,
    ConfirmedDataUp,
    ConfirmedDataDown,
    RejoinRequest,
    Proprietary,
}

impl MType {
    /// Uplink data frames, the only frames carrying MAC commands and ADR history.
    pub fn is_data_uplink(self) -> bool {
        matches!(self, MType::UnconfirmedDataUp | MType::ConfirmedDataUp)
    }
}

/// Device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DevAddr(pub u32);

/// AES-128 key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AES128(pub [u8; 16]);

/// Power source reported by DevStatusAns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum PowerState {
    #[default]
    Unknown,
    External,
    Battery,
}

/// LoRa modulation parameters in plain numbers, so that they can be stored and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoraDataRate {
    /// Spreading factor, 5 to 12.
    pub spreading_factor: u8,
    /// Bandwidth in Hz.
    pub bandwidth: u32,
}

impl LoraDataRate {
    /// Creation from modulation parameters.
    #[allow(unreachable_patterns)]
    pub fn from_modulation(spreading_factor: SpreadingFactor, bandwidth: Bandwidth) -> Self {
        let spreading_factor = match spreading_factor {
            SpreadingFactor::_5 => 5,
            SpreadingFactor::_6 => 6,
            SpreadingFactor::_7 => 7,
            SpreadingFactor::_8 => 8,
            SpreadingFactor::_9 => 9,
            SpreadingFactor::_10 => 10,
            SpreadingFactor::_11 => 11,
            SpreadingFactor::_12 => 12,
            _ => 0,
        };
        let bandwidth = match bandwidth {
            Bandwidth::_125KHz => 125_000,
            Bandwidth::_250KHz => 250_000,
            Bandwidth::_500KHz => 500_000,
            _ => 0,
        };
        Self { spreading_factor, bandwidth }
    }

    /// Modulation parameters, when they name a known spreading factor and a LoRaWAN bandwidth.
    pub fn modulation(&self) -> Option<(SpreadingFactor, Bandwidth)> {
        let spreading_factor = match self.spreading_factor {
            5 => SpreadingFactor::_5,
            6 => SpreadingFactor::_6,
            7 => SpreadingFactor::_7,
            8 => SpreadingFactor::_8,
            9 => SpreadingFactor::_9,
            10 => SpreadingFactor::_10,
            11 => SpreadingFactor::_11,
            12 => SpreadingFactor::_12,
            _ => return None,
        };
        let bandwidth = match self.bandwidth {
            125_000 => Bandwidth::_125KHz,
            250_000 => Bandwidth::_250KHz,
            500_000 => Bandwidth::_500KHz,
            _ => return None,
        };
        Some((spreading_factor, bandwidth))
    }
}

/// Modulation of a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum DataRate {
    Lora(LoraDataRate),
    Fsk { bit_rate: u32 },
    LrFhss { modulation_type: u8, operating_channel_width: u32, coding_rate: u8 },
}

impl DataRate {
    /// LoRa data rate shorthand.
    pub const fn lora(spreading_factor: u8, bandwidth: u32) -> Self {
        DataRate::Lora(LoraDataRate { spreading_factor, bandwidth })
    }
}

/// Radio settings an uplink was received with.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct TxSettings {
    pub data_rate: DataRate,
    pub frequency: u64,
}

/// Gateway identifier the network uses for traffic forwarded by Packet Broker.
pub const PACKET_BROKER_GATEWAY_ID: &str = "packetbroker";

/// Forwarding network of an uplink that arrived through Packet Broker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct PacketBrokerMetadata {
    pub forwarder_net_id: u32,
    pub forwarder_tenant_id: String,
    pub forwarder_cluster_id: String,
}

/// Reception of an uplink by one gateway.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RxMetadata {
    /// Receiving gateway, or the Packet Broker pseudo-gateway.
    pub gateway_id: String,
    /// Signal to noise ratio in dB, absent when the gateway does not report it.
    pub snr: Option<f32>,
    /// Received signal strength in dBm.
    pub rssi: f32,
    /// GPS time of reception, as elapsed since the GPS epoch.
    pub gps_time: Option<Duration>,
    /// Reception time, as elapsed since the Unix epoch.
    pub received_at: Option<Duration>,
    /// Set when the uplink came through Packet Broker.
    pub packet_broker: Option<PacketBrokerMetadata>,
}

/// A deduplicated data uplink as seen by the MAC layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UplinkMessage {
    /// Message type, which ADR checks for data uplinks.
    pub m_type: MType,
    /// Address the uplink was sent from.
    pub dev_addr: DevAddr,
    /// Full 32-bit frame counter.
    pub f_cnt: u32,
    /// ADR bit of FCtrl.
    pub adr: bool,
    /// Data rate and frequency the uplink was sent at.
    pub settings: TxSettings,
    /// One entry per receiving gateway.
    pub rx_metadata: Vec<RxMetadata>,
    /// Time the network server received the uplink, as elapsed since the Unix epoch.
    pub received_at: Duration,
}

impl UplinkMessage {
    /// Best SNR among the gateways that report one.
    pub fn max_snr(&self) -> Option<f32> {
        self.rx_metadata.iter().filter_map(|md| md.snr).reduce(f32::max)
    }
}

/// Seconds between the Unix epoch and the GPS epoch (1980-01-06).
const GPS_EPOCH_OFFSET: u64 = 315_964_800;
/// Leap seconds GPS time is ahead of UTC, as of 2017-01-01.
const GPS_LEAP_SECONDS: u64 = 18;

/// Converts a Unix timestamp to GPS time.
pub fn gps_time(unix: Duration) -> Duration {
    unix.saturating_sub(Duration::from_secs(GPS_EPOCH_OFFSET))
        + Duration::from_secs(GPS_LEAP_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gates() {
        assert!(!MacVersion::V1_0_3.supports_link_adr_no_change());
        assert!(MacVersion::V1_0_4.supports_link_adr_no_change());
        assert!(MacVersion::V1_1.supports_link_adr_no_change());
        assert!(MacVersion::V1_0_1.link_adr_answer_per_request());
        assert!(MacVersion::V1_0_2.allows_duplicate_link_adr_ans());
        assert!(MacVersion::V1_0_4.allows_duplicate_link_adr_ans());
        assert!(!MacVersion::V1_1.allows_duplicate_link_adr_ans());
        assert_eq!(MacVersion::V1_1.minor(), 1);
    }

    #[test]
    fn lora_modulation_round_trip() {
        let dr = LoraDataRate::from_modulation(SpreadingFactor::_9, Bandwidth::_125KHz);
        assert_eq!(dr, LoraDataRate { spreading_factor: 9, bandwidth: 125_000 });
        assert!(dr.modulation().is_some());
        assert!(LoraDataRate { spreading_factor: 13, bandwidth: 125_000 }.modulation().is_none());
    }

    #[test]
    fn gps_time_from_unix() {
        assert_eq!(gps_time(Duration::from_secs(GPS_EPOCH_OFFSET)), Duration::from_secs(18));
    }
}
