//! End device records as seen by the network: identity, session and MAC state.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mac::command::MacCommand;
use crate::mac::rejection::DataRateRange;
use crate::mac::settings::MacSettings;
use crate::mac::types::{DevAddr, DeviceClass, MacVersion, PowerState, UplinkMessage, AES128};
use crate::Error;

pub mod relay;

use relay::RelayParameters;

/// Largest number of uplinks kept for ADR.
pub const RECENT_UPLINKS: usize = 20;
/// Capacity of the rejected data rate and TX power index sets.
pub const REJECTED_INDEXES: usize = 16;

/// Identifiers of an end device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct EndDeviceIdentifiers {
    pub application_id: String,
    pub device_id: String,
    pub dev_eui: Option<[u8; 8]>,
    pub dev_addr: Option<DevAddr>,
}

/// Network session keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct SessionKeys {
    pub session_key_id: Vec<u8>,
    pub f_nwk_s_int_key: Option<AES128>,
    pub s_nwk_s_int_key: Option<AES128>,
    pub nwk_s_enc_key: Option<AES128>,
}

/// Security context shared with the device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct Session {
    pub dev_addr: DevAddr,
    pub keys: SessionKeys,
    pub last_f_cnt_up: u32,
    pub last_n_f_cnt_down: u32,
    pub last_a_f_cnt_down: u32,
}

/// Join request the pending session was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct JoinRequest {
    pub dev_addr: DevAddr,
    pub received_at: Duration,
}

/// Uplink channel, with its downlink frequency for RX1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct Channel {
    pub uplink_frequency: u64,
    pub downlink_frequency: u64,
    pub min_data_rate_index: u8,
    pub max_data_rate_index: u8,
    pub enable_uplink: bool,
}

/// Radio and link parameters, either in use by the device or targeted by the network.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct MacParameters {
    /// Maximum EIRP in dBm.
    pub max_eirp: f32,
    pub adr_data_rate_index: u8,
    pub adr_tx_power_index: u8,
    pub adr_nb_trans: u8,
    pub adr_ack_limit_exponent: Option<u8>,
    pub adr_ack_delay_exponent: Option<u8>,
    /// RX1 delay in seconds.
    pub rx1_delay: u8,
    pub rx1_data_rate_offset: u8,
    pub rx2_data_rate_index: u8,
    pub rx2_frequency: u64,
    pub max_duty_cycle: u8,
    pub rejoin_time_periodicity: u8,
    pub rejoin_count_periodicity: u8,
    pub ping_slot_frequency: u64,
    pub ping_slot_data_rate_index: Option<u8>,
    pub beacon_frequency: u64,
    /// Sparse: a `None` keeps the index of the channels after it.
    pub channels: Vec<Option<Channel>>,
    pub uplink_dwell_time: Option<bool>,
    pub downlink_dwell_time: Option<bool>,
    pub relay: Option<RelayParameters>,
}

impl MacParameters {
    /// Channel at `index`, if set.
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index).and_then(Option::as_ref)
    }

    /// Uplink enable flags, one per slot, padded with disabled slots to `len`.
    pub fn uplink_mask(&self, len: usize) -> Vec<bool> {
        let mut mask: Vec<bool> = self
            .channels
            .iter()
            .map(|channel| channel.map_or(false, |channel| channel.enable_uplink))
            .collect();
        mask.resize(len.max(mask.len()), false);
        mask
    }

    /// Data rates every enabled channel supports. `None` when no channel is enabled or the
    /// enabled channels share no data rate.
    pub fn enabled_data_rate_range(&self) -> Option<(u8, u8)> {
        self.channels
            .iter()
            .flatten()
            .filter(|channel| channel.enable_uplink)
            .map(|channel| (channel.min_data_rate_index, channel.max_data_rate_index))
            .reduce(|(min, max), (ch_min, ch_max)| (min.max(ch_min), max.min(ch_max)))
            .filter(|(min, max)| min <= max)
    }
}

/// Per-session MAC state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct MacState {
    pub lorawan_version: MacVersion,
    pub device_class: DeviceClass,
    pub current_parameters: MacParameters,
    pub desired_parameters: MacParameters,
    /// Requests sent on the last downlink and still awaiting an answer.
    pub pending_requests: Vec<MacCommand>,
    /// Answers and confirmations for the next downlink.
    pub queued_responses: Vec<MacCommand>,
    pub rejected_adr_data_rate_indexes: heapless::Vec<u8, REJECTED_INDEXES>,
    pub rejected_adr_tx_power_indexes: heapless::Vec<u8, REJECTED_INDEXES>,
    pub rejected_frequencies: Vec<u64>,
    pub rejected_data_rate_ranges: BTreeMap<u64, Vec<DataRateRange>>,
    pub recent_uplinks: heapless::Vec<UplinkMessage, RECENT_UPLINKS>,
    pub last_adr_change_f_cnt_up: u32,
    pub last_dev_status_f_cnt_up: u32,
    pub ping_slot_periodicity: Option<u8>,
    pub pending_join_request: Option<JoinRequest>,
}

impl MacState {
    /// State with no history and nothing in flight.
    pub fn new(
        lorawan_version: MacVersion,
        device_class: DeviceClass,
        current_parameters: MacParameters,
        desired_parameters: MacParameters,
    ) -> Self {
        Self {
            lorawan_version,
            device_class,
            current_parameters,
            desired_parameters,
            pending_requests: Vec::new(),
            queued_responses: Vec::new(),
            rejected_adr_data_rate_indexes: heapless::Vec::new(),
            rejected_adr_tx_power_indexes: heapless::Vec::new(),
            rejected_frequencies: Vec::new(),
            rejected_data_rate_ranges: BTreeMap::new(),
            recent_uplinks: heapless::Vec::new(),
            last_adr_change_f_cnt_up: 0,
            last_dev_status_f_cnt_up: 0,
            ping_slot_periodicity: None,
            pending_join_request: None,
        }
    }

    /// Records an uplink for ADR, evicting the oldest when the history is full.
    pub fn push_recent_uplink(&mut self, up: UplinkMessage) {
        if self.recent_uplinks.is_full() {
            self.recent_uplinks.remove(0);
        }
        self.recent_uplinks.push(up).ok();
    }
}

/// The device record the MAC layer operates on.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct EndDevice {
    pub ids: EndDeviceIdentifiers,
    pub frequency_plan_id: String,
    pub lorawan_version: MacVersion,
    pub supports_join: bool,
    pub multicast: bool,
    pub supports_class_b: bool,
    pub supports_class_c: bool,
    pub mac_settings: Option<MacSettings>,
    pub mac_state: Option<MacState>,
    pub pending_mac_state: Option<MacState>,
    pub session: Option<Session>,
    pub pending_session: Option<Session>,
    pub last_dev_status_received_at: Option<Duration>,
    pub power_state: PowerState,
    /// Battery level in `[0, 1]`, when running on battery.
    pub battery_percentage: Option<f32>,
    pub downlink_margin: i8,
}

impl EndDevice {
    /// Unicast class A device without MAC state.
    pub fn new(ids: EndDeviceIdentifiers, frequency_plan_id: &str, lorawan_version: MacVersion) -> Self {
        Self {
            ids,
            frequency_plan_id: frequency_plan_id.to_string(),
            lorawan_version,
            supports_join: false,
            multicast: false,
            supports_class_b: false,
            supports_class_c: false,
            mac_settings: None,
            mac_state: None,
            pending_mac_state: None,
            session: None,
            pending_session: None,
            last_dev_status_received_at: None,
            power_state: PowerState::Unknown,
            battery_percentage: None,
            downlink_margin: 0,
        }
    }

    /// MAC state of the session, which every handler needs.
    pub fn mac_state(&self) -> Result<&MacState, Error> {
        self.mac_state.as_ref().ok_or(Error::MissingMacState)
    }

    /// Mutable counterpart of [`EndDevice::mac_state`].
    pub fn mac_state_mut(&mut self) -> Result<&mut MacState, Error> {
        self.mac_state.as_mut().ok_or(Error::MissingMacState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::types::{DataRate, MType, TxSettings};

    fn uplink(f_cnt: u32) -> UplinkMessage {
        UplinkMessage {
            m_type: MType::UnconfirmedDataUp,
            dev_addr: DevAddr(1),
            f_cnt,
            adr: true,
            settings: TxSettings { data_rate: DataRate::lora(12, 125_000), frequency: 868_100_000 },
            rx_metadata: Vec::new(),
            received_at: Duration::from_secs(0),
        }
    }

    #[test]
    fn recent_uplinks_evict_oldest() {
        let mut state =
            MacState::new(MacVersion::V1_0_3, DeviceClass::A, Default::default(), Default::default());
        for f_cnt in 0..25 {
            state.push_recent_uplink(uplink(f_cnt));
        }
        assert_eq!(state.recent_uplinks.len(), RECENT_UPLINKS);
        assert_eq!(state.recent_uplinks[0].f_cnt, 5);
        assert_eq!(state.recent_uplinks[RECENT_UPLINKS - 1].f_cnt, 24);
    }

    #[test]
    fn data_rate_range_of_enabled_channels() {
        let channel = |min, max, enable_uplink| {
            Some(Channel {
                uplink_frequency: 868_100_000,
                downlink_frequency: 868_100_000,
                min_data_rate_index: min,
                max_data_rate_index: max,
                enable_uplink,
            })
        };
        let mut params = MacParameters {
            channels: vec![channel(0, 5, true), None, channel(2, 7, true), channel(6, 7, false)],
            ..Default::default()
        };
        assert_eq!(params.enabled_data_rate_range(), Some((2, 5)));
        assert_eq!(params.uplink_mask(5), vec![true, false, true, false, false]);
        assert_eq!(params.channel(1), None);

        params.channels[3] = channel(6, 7, true);
        assert_eq!(params.enabled_data_rate_range(), None);
        params.channels.clear();
        assert_eq!(params.enabled_data_rate_range(), None);
    }

    #[test]
    fn missing_mac_state() {
        let dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_3);
        assert_eq!(dev.mac_state().err(), Some(Error::MissingMacState));
    }
}
