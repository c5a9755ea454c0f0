//! MAC command identifiers, their descriptors, and the decoded commands exchanged with devices.
//!
//! Byte layout is owned by the codec; the core only reasons about payload widths.

use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::channel_mask::ChannelMask;
use crate::mac::device::relay::{
    RelayEndDeviceMode, RelayForwardLimits, RelayResetLimitCounter, RelaySecondChannel,
};
use crate::mac::types::{DevAddr, DeviceClass, MacVersion, AES128};

/// Fixed properties of a MAC command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacCommandDescriptor {
    /// Payload width sent by the network, excluding the CID.
    pub downlink_length: u16,
    /// Payload width sent by the device, excluding the CID.
    pub uplink_length: u16,
    /// Whether a network request is answered by the device.
    pub expect_answer: bool,
    /// Whether the device opens the exchange.
    pub device_initiated: bool,
    /// First MAC version defining the command.
    pub min_version: MacVersion,
}

macro_rules! mac_command_registry {
    (
        $(
            $(#[$outer:meta])*
            $variant:ident[cid=$cid:literal, name=$name:literal, down=$down:literal, up=$up:literal,
                answer=$answer:literal, device=$device:literal, since=$version:ident]
        )*
    ) => {
        /// MAC command identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[repr(u8)]
        pub enum Cid {
            $(
                $(#[$outer])*
                $variant = $cid,
            )*
        }

        impl Cid {
            /// Payload widths and version gating of the command.
            pub const fn descriptor(self) -> MacCommandDescriptor {
                match self {
                    $(
                        Cid::$variant => MacCommandDescriptor {
                            downlink_length: $down,
                            uplink_length: $up,
                            expect_answer: $answer,
                            device_initiated: $device,
                            min_version: MacVersion::$version,
                        },
                    )*
                }
            }

            /// Snake case name, as used in event names.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Cid::$variant => $name, )*
                }
            }

            /// Looks a command up by its identifier byte.
            pub fn from_u8(cid: u8) -> Option<Cid> {
                match cid {
                    $( $cid => Some(Cid::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

mac_command_registry! {
    /// ResetInd/ResetConf.
    Reset[cid=0x01, name="reset", down=1, up=1, answer=false, device=true, since=V1_1]
    /// LinkCheckReq/LinkCheckAns.
    LinkCheck[cid=0x02, name="link_check", down=2, up=0, answer=false, device=true, since=V1_0]
    /// LinkADRReq/LinkADRAns.
    LinkAdr[cid=0x03, name="link_adr", down=4, up=1, answer=true, device=false, since=V1_0]
    /// DutyCycleReq/DutyCycleAns.
    DutyCycle[cid=0x04, name="duty_cycle", down=1, up=0, answer=true, device=false, since=V1_0]
    /// RXParamSetupReq/RXParamSetupAns.
    RxParamSetup[cid=0x05, name="rx_param_setup", down=4, up=1, answer=true, device=false, since=V1_0]
    /// DevStatusReq/DevStatusAns.
    DevStatus[cid=0x06, name="dev_status", down=0, up=2, answer=true, device=false, since=V1_0]
    /// NewChannelReq/NewChannelAns.
    NewChannel[cid=0x07, name="new_channel", down=5, up=1, answer=true, device=false, since=V1_0]
    /// RXTimingSetupReq/RXTimingSetupAns.
    RxTimingSetup[cid=0x08, name="rx_timing_setup", down=1, up=0, answer=true, device=false, since=V1_0]
    /// TxParamSetupReq/TxParamSetupAns.
    TxParamSetup[cid=0x09, name="tx_param_setup", down=1, up=0, answer=true, device=false, since=V1_0_2]
    /// DlChannelReq/DlChannelAns.
    DlChannel[cid=0x0A, name="dl_channel", down=4, up=1, answer=true, device=false, since=V1_0_2]
    /// RekeyInd/RekeyConf.
    Rekey[cid=0x0B, name="rekey", down=1, up=1, answer=false, device=true, since=V1_1]
    /// ADRParamSetupReq/ADRParamSetupAns.
    AdrParamSetup[cid=0x0C, name="adr_param_setup", down=1, up=0, answer=true, device=false, since=V1_1]
    /// DeviceTimeReq/DeviceTimeAns.
    DeviceTime[cid=0x0D, name="device_time", down=5, up=0, answer=false, device=true, since=V1_0_3]
    /// Registered for completeness; the rejoin procedure is not driven by this crate.
    ForceRejoin[cid=0x0E, name="force_rejoin", down=2, up=0, answer=false, device=false, since=V1_1]
    /// RejoinParamSetupReq/RejoinParamSetupAns.
    RejoinParamSetup[cid=0x0F, name="rejoin_param_setup", down=1, up=1, answer=true, device=false, since=V1_1]
    /// PingSlotInfoReq/PingSlotInfoAns.
    PingSlotInfo[cid=0x10, name="ping_slot_info", down=0, up=1, answer=false, device=true, since=V1_0_3]
    /// PingSlotChannelReq/PingSlotChannelAns.
    PingSlotChannel[cid=0x11, name="ping_slot_channel", down=4, up=1, answer=true, device=false, since=V1_0_3]
    /// Deprecated since 1.0.3; registered so that its width is known.
    BeaconTiming[cid=0x12, name="beacon_timing", down=3, up=0, answer=false, device=true, since=V1_0_3]
    /// BeaconFreqReq/BeaconFreqAns.
    BeaconFreq[cid=0x13, name="beacon_freq", down=3, up=1, answer=true, device=false, since=V1_0_3]
    /// DeviceModeInd/DeviceModeConf.
    DeviceMode[cid=0x20, name="device_mode", down=1, up=1, answer=false, device=true, since=V1_1]
    /// RelayConfReq/RelayConfAns.
    RelayConf[cid=0x40, name="relay_conf", down=5, up=1, answer=true, device=false, since=V1_0_4]
    /// EndDeviceConfReq/EndDeviceConfAns.
    RelayEndDeviceConf[cid=0x41, name="relay_end_device_conf", down=6, up=1, answer=true, device=false, since=V1_0_4]
    /// UpdateUplinkListReq/UpdateUplinkListAns.
    RelayUpdateUplinkList[cid=0x43, name="relay_update_uplink_list", down=26, up=0, answer=true, device=false, since=V1_0_4]
    /// CtrlUplinkListReq/CtrlUplinkListAns.
    RelayCtrlUplinkList[cid=0x44, name="relay_ctrl_uplink_list", down=1, up=5, answer=true, device=false, since=V1_0_4]
    /// ConfigureFwdLimitReq/ConfigureFwdLimitAns.
    RelayConfigureFwdLimit[cid=0x45, name="relay_configure_fwd_limit", down=5, up=0, answer=true, device=false, since=V1_0_4]
    /// NotifyNewEndDeviceReq, sent by a relay.
    RelayNotifyNewEndDevice[cid=0x46, name="relay_notify_new_end_device", down=0, up=6, answer=false, device=true, since=V1_0_4]
}

/// EIRP levels a device can be limited to with TxParamSetupReq, in dBm.
const DEVICE_EIRP_DBM: [f32; 16] =
    [8.0, 10.0, 12.0, 13.0, 14.0, 16.0, 18.0, 20.0, 21.0, 24.0, 26.0, 27.0, 29.0, 30.0, 33.0, 36.0];

/// Index into the TxParamSetupReq EIRP table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceEirp(u8);

impl DeviceEirp {
    /// Largest table entry not above `dbm`, or the smallest entry.
    pub fn from_dbm(dbm: f32) -> Self {
        let index = DEVICE_EIRP_DBM.iter().rposition(|level| *level <= dbm).unwrap_or(0);
        Self(index as u8)
    }

    /// EIRP of the table entry, in dBm.
    pub fn to_dbm(self) -> f32 {
        DEVICE_EIRP_DBM[usize::from(self.0 & 0x0F)]
    }

    /// Wire index.
    pub fn index(self) -> u8 {
        self.0
    }
}

/// ABP device reset, with its LoRaWAN minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct ResetInd {
    pub minor_version: u8,
}

/// Answer to ResetInd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct ResetConf {
    pub minor_version: u8,
}

/// Demodulation margin and gateway count of the last LinkCheckReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct LinkCheckAns {
    pub margin: u8,
    pub gateway_count: u8,
}

/// One request of a LinkADRReq block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct LinkAdrReq {
    pub data_rate_index: u8,
    pub tx_power_index: u8,
    pub nb_trans: u8,
    pub channel_mask_control: u8,
    pub channel_mask: ChannelMask,
}

/// Device acknowledgement of a LinkADRReq block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct LinkAdrAns {
    pub channel_mask_ack: bool,
    pub data_rate_index_ack: bool,
    pub tx_power_index_ack: bool,
}

/// Aggregated duty cycle limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DutyCycleReq {
    pub max_duty_cycle: u8,
}

/// RX1 data rate offset and RX2 settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RxParamSetupReq {
    pub rx1_data_rate_offset: u8,
    pub rx2_data_rate_index: u8,
    pub rx2_frequency: u64,
}

/// Device acknowledgement of RxParamSetupReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RxParamSetupAns {
    pub rx1_data_rate_offset_ack: bool,
    pub rx2_data_rate_index_ack: bool,
    pub rx2_frequency_ack: bool,
}

/// Battery level and demodulation margin of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DevStatusAns {
    /// 0 for external power, 255 when unknown, else the battery level.
    pub battery: u8,
    /// Demodulation margin of the last DevStatusReq, in dB.
    pub margin: i8,
}

/// Creation (or deletion, with a zero frequency) of an uplink channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct NewChannelReq {
    pub channel_index: u8,
    pub frequency: u64,
    pub min_data_rate_index: u8,
    pub max_data_rate_index: u8,
}

/// Device acknowledgement of NewChannelReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct NewChannelAns {
    pub frequency_ack: bool,
    pub data_rate_ack: bool,
}

/// RX1 delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RxTimingSetupReq {
    /// RX1 delay in seconds; 0 means 1.
    pub delay: u8,
}

/// Dwell time and maximum EIRP limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct TxParamSetupReq {
    pub max_eirp_index: DeviceEirp,
    pub uplink_dwell_time: bool,
    pub downlink_dwell_time: bool,
}

/// RX1 downlink frequency of an uplink channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DlChannelReq {
    pub channel_index: u8,
    pub frequency: u64,
}

/// Device acknowledgement of DlChannelReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DlChannelAns {
    pub channel_index_ack: bool,
    pub frequency_ack: bool,
}

/// LoRaWAN 1.1 security context indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RekeyInd {
    pub minor_version: u8,
}

/// Answer to RekeyInd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RekeyConf {
    pub minor_version: u8,
}

/// ADR acknowledgement limit and delay exponents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct AdrParamSetupReq {
    pub adr_ack_limit_exponent: u8,
    pub adr_ack_delay_exponent: u8,
}

/// Network time of the requesting uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceTimeAns {
    /// GPS time of the uplink carrying the request.
    pub time: Duration,
}

/// Periodic rejoin limits, as exponents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RejoinParamSetupReq {
    pub max_time_exponent: u8,
    pub max_count_exponent: u8,
}

/// Device acknowledgement of RejoinParamSetupReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RejoinParamSetupAns {
    pub max_time_exponent_ack: bool,
}

/// Class B ping slot periodicity chosen by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct PingSlotInfoReq {
    pub period: u8,
}

/// Class B ping slot frequency and data rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct PingSlotChannelReq {
    pub frequency: u64,
    pub data_rate_index: u8,
}

/// Device acknowledgement of PingSlotChannelReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct PingSlotChannelAns {
    pub frequency_ack: bool,
    pub data_rate_index_ack: bool,
}

/// Class B beacon frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct BeaconFreqReq {
    pub frequency: u64,
}

/// Device acknowledgement of BeaconFreqReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct BeaconFreqAns {
    pub frequency_ack: bool,
}

/// Device class switch announced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DeviceModeInd {
    pub class: DeviceClass,
}

/// Answer to DeviceModeInd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DeviceModeConf {
    pub class: DeviceClass,
}

/// Serving relay settings carried by RelayConfReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayConfiguration {
    pub second_channel: Option<RelaySecondChannel>,
    pub default_channel_index: u8,
    pub cad_periodicity: u8,
}

/// Serving relay configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayConfReq {
    /// Absent to disable the relay.
    pub configuration: Option<RelayConfiguration>,
}

/// Relay acknowledgement of RelayConfReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayConfAns {
    pub second_channel_frequency_ack: bool,
    pub second_channel_ack_offset_ack: bool,
    pub second_channel_data_rate_index_ack: bool,
    pub second_channel_index_ack: bool,
    pub default_channel_index_ack: bool,
    pub cad_periodicity_ack: bool,
}

impl RelayConfAns {
    /// Every field was accepted.
    pub fn accepted(&self) -> bool {
        self.second_channel_frequency_ack
            && self.second_channel_ack_offset_ack
            && self.second_channel_data_rate_index_ack
            && self.second_channel_index_ack
            && self.default_channel_index_ack
            && self.cad_periodicity_ack
    }
}

/// Served end device settings carried by RelayEndDeviceConfReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayEndDeviceConfiguration {
    pub mode: RelayEndDeviceMode,
    pub backoff: u8,
    pub second_channel: Option<RelaySecondChannel>,
}

/// Served end device relay configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayEndDeviceConfReq {
    /// Absent to stop using a relay.
    pub configuration: Option<RelayEndDeviceConfiguration>,
}

/// Served device acknowledgement of RelayEndDeviceConfReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayEndDeviceConfAns {
    pub second_channel_frequency_ack: bool,
    pub second_channel_ack_offset_ack: bool,
    pub second_channel_data_rate_index_ack: bool,
    pub second_channel_index_ack: bool,
    pub backoff_ack: bool,
}

impl RelayEndDeviceConfAns {
    /// Every field was accepted.
    pub fn accepted(&self) -> bool {
        self.second_channel_frequency_ack
            && self.second_channel_ack_offset_ack
            && self.second_channel_data_rate_index_ack
            && self.second_channel_index_ack
            && self.backoff_ack
    }
}

/// Uplink forwarding rule for one served device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayUpdateUplinkListReq {
    /// Slot of the rule in the relay.
    pub rule_index: u8,
    /// Forwarding limits of the served device.
    pub forward_limits: Option<RelayForwardLimits>,
    /// Address of the served device.
    pub dev_addr: DevAddr,
    /// Last known WOR frame counter of the served device.
    pub w_f_cnt: u32,
    /// Root key the relay derives the served device's WOR keys from.
    pub root_wor_s_key: AES128,
    /// Served device, kept so that the answer can be applied.
    pub device_id: String,
    /// Session the root key was derived from.
    pub session_key_id: Vec<u8>,
}

/// Operation of RelayCtrlUplinkListReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum RelayCtrlUplinkListAction {
    ReadWFCnt,
    RemoveTrustedEndDevice,
}

/// Read or removal of an uplink forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayCtrlUplinkListReq {
    pub rule_index: u8,
    pub action: RelayCtrlUplinkListAction,
}

/// Relay answer to RelayCtrlUplinkListReq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayCtrlUplinkListAns {
    pub rule_index_ack: bool,
    pub w_f_cnt: u32,
}

/// Relay forwarding limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayConfigureFwdLimitReq {
    pub reset_limit_counter: RelayResetLimitCounter,
    pub join_request_limits: Option<RelayForwardLimits>,
    pub notify_limits: Option<RelayForwardLimits>,
    pub global_uplink_limits: Option<RelayForwardLimits>,
    pub overall_limits: Option<RelayForwardLimits>,
}

/// Relay notice of an unknown device heard nearby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayNotifyNewEndDeviceReq {
    pub dev_addr: DevAddr,
    pub snr: i8,
    pub rssi: i16,
}

/// A decoded MAC command, in either direction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum MacCommand {
    ResetInd(ResetInd),
    ResetConf(ResetConf),
    LinkCheckReq,
    LinkCheckAns(LinkCheckAns),
    LinkAdrReq(LinkAdrReq),
    LinkAdrAns(LinkAdrAns),
    DutyCycleReq(DutyCycleReq),
    DutyCycleAns,
    RxParamSetupReq(RxParamSetupReq),
    RxParamSetupAns(RxParamSetupAns),
    DevStatusReq,
    DevStatusAns(DevStatusAns),
    NewChannelReq(NewChannelReq),
    NewChannelAns(NewChannelAns),
    RxTimingSetupReq(RxTimingSetupReq),
    RxTimingSetupAns,
    TxParamSetupReq(TxParamSetupReq),
    TxParamSetupAns,
    DlChannelReq(DlChannelReq),
    DlChannelAns(DlChannelAns),
    RekeyInd(RekeyInd),
    RekeyConf(RekeyConf),
    AdrParamSetupReq(AdrParamSetupReq),
    AdrParamSetupAns,
    DeviceTimeReq,
    DeviceTimeAns(DeviceTimeAns),
    RejoinParamSetupReq(RejoinParamSetupReq),
    RejoinParamSetupAns(RejoinParamSetupAns),
    PingSlotInfoReq(PingSlotInfoReq),
    PingSlotInfoAns,
    PingSlotChannelReq(PingSlotChannelReq),
    PingSlotChannelAns(PingSlotChannelAns),
    BeaconFreqReq(BeaconFreqReq),
    BeaconFreqAns(BeaconFreqAns),
    DeviceModeInd(DeviceModeInd),
    DeviceModeConf(DeviceModeConf),
    RelayConfReq(RelayConfReq),
    RelayConfAns(RelayConfAns),
    RelayEndDeviceConfReq(RelayEndDeviceConfReq),
    RelayEndDeviceConfAns(RelayEndDeviceConfAns),
    RelayUpdateUplinkListReq(RelayUpdateUplinkListReq),
    RelayUpdateUplinkListAns,
    RelayCtrlUplinkListReq(RelayCtrlUplinkListReq),
    RelayCtrlUplinkListAns(RelayCtrlUplinkListAns),
    RelayConfigureFwdLimitReq(RelayConfigureFwdLimitReq),
    RelayConfigureFwdLimitAns,
    RelayNotifyNewEndDeviceReq(RelayNotifyNewEndDeviceReq),
}

impl MacCommand {
    /// Identifier of the command.
    pub fn cid(&self) -> Cid {
        match self {
            MacCommand::ResetInd(_) | MacCommand::ResetConf(_) => Cid::Reset,
            MacCommand::LinkCheckReq | MacCommand::LinkCheckAns(_) => Cid::LinkCheck,
            MacCommand::LinkAdrReq(_) | MacCommand::LinkAdrAns(_) => Cid::LinkAdr,
            MacCommand::DutyCycleReq(_) | MacCommand::DutyCycleAns => Cid::DutyCycle,
            MacCommand::RxParamSetupReq(_) | MacCommand::RxParamSetupAns(_) => Cid::RxParamSetup,
            MacCommand::DevStatusReq | MacCommand::DevStatusAns(_) => Cid::DevStatus,
            MacCommand::NewChannelReq(_) | MacCommand::NewChannelAns(_) => Cid::NewChannel,
            MacCommand::RxTimingSetupReq(_) | MacCommand::RxTimingSetupAns => Cid::RxTimingSetup,
            MacCommand::TxParamSetupReq(_) | MacCommand::TxParamSetupAns => Cid::TxParamSetup,
            MacCommand::DlChannelReq(_) | MacCommand::DlChannelAns(_) => Cid::DlChannel,
            MacCommand::RekeyInd(_) | MacCommand::RekeyConf(_) => Cid::Rekey,
            MacCommand::AdrParamSetupReq(_) | MacCommand::AdrParamSetupAns => Cid::AdrParamSetup,
            MacCommand::DeviceTimeReq | MacCommand::DeviceTimeAns(_) => Cid::DeviceTime,
            MacCommand::RejoinParamSetupReq(_) | MacCommand::RejoinParamSetupAns(_) => {
                Cid::RejoinParamSetup
            }
            MacCommand::PingSlotInfoReq(_) | MacCommand::PingSlotInfoAns => Cid::PingSlotInfo,
            MacCommand::PingSlotChannelReq(_) | MacCommand::PingSlotChannelAns(_) => {
                Cid::PingSlotChannel
            }
            MacCommand::BeaconFreqReq(_) | MacCommand::BeaconFreqAns(_) => Cid::BeaconFreq,
            MacCommand::DeviceModeInd(_) | MacCommand::DeviceModeConf(_) => Cid::DeviceMode,
            MacCommand::RelayConfReq(_) | MacCommand::RelayConfAns(_) => Cid::RelayConf,
            MacCommand::RelayEndDeviceConfReq(_) | MacCommand::RelayEndDeviceConfAns(_) => {
                Cid::RelayEndDeviceConf
            }
            MacCommand::RelayUpdateUplinkListReq(_) | MacCommand::RelayUpdateUplinkListAns => {
                Cid::RelayUpdateUplinkList
            }
            MacCommand::RelayCtrlUplinkListReq(_) | MacCommand::RelayCtrlUplinkListAns(_) => {
                Cid::RelayCtrlUplinkList
            }
            MacCommand::RelayConfigureFwdLimitReq(_) | MacCommand::RelayConfigureFwdLimitAns => {
                Cid::RelayConfigureFwdLimit
            }
            MacCommand::RelayNotifyNewEndDeviceReq(_) => Cid::RelayNotifyNewEndDevice,
        }
    }

    /// Sent by the end device.
    pub fn uplink(&self) -> bool {
        matches!(
            self,
            MacCommand::ResetInd(_)
                | MacCommand::LinkCheckReq
                | MacCommand::LinkAdrAns(_)
                | MacCommand::DutyCycleAns
                | MacCommand::RxParamSetupAns(_)
                | MacCommand::DevStatusAns(_)
                | MacCommand::NewChannelAns(_)
                | MacCommand::RxTimingSetupAns
                | MacCommand::TxParamSetupAns
                | MacCommand::DlChannelAns(_)
                | MacCommand::RekeyInd(_)
                | MacCommand::AdrParamSetupAns
                | MacCommand::DeviceTimeReq
                | MacCommand::RejoinParamSetupAns(_)
                | MacCommand::PingSlotInfoReq(_)
                | MacCommand::PingSlotChannelAns(_)
                | MacCommand::BeaconFreqAns(_)
                | MacCommand::DeviceModeInd(_)
                | MacCommand::RelayConfAns(_)
                | MacCommand::RelayEndDeviceConfAns(_)
                | MacCommand::RelayUpdateUplinkListAns
                | MacCommand::RelayCtrlUplinkListAns(_)
                | MacCommand::RelayConfigureFwdLimitAns
                | MacCommand::RelayNotifyNewEndDeviceReq(_)
        )
    }

    /// Length in bytes of the command on the wire, including the CID.
    pub fn wire_len(&self) -> usize {
        let descriptor = self.cid().descriptor();
        let payload = if self.uplink() {
            descriptor.uplink_length
        } else {
            descriptor.downlink_length
        };
        1 + usize::from(payload)
    }
}

/// Calculates the len in bytes of a sequence of mac commands, including the CIDs.
pub fn mac_commands_len(cmds: &[MacCommand]) -> usize {
    cmds.iter().map(MacCommand::wire_len).sum()
}
