//! MAC settings: per-device overrides and network-wide defaults.
//!
//! Every knob is optional. A value is looked up on the device first, then in the network
//! defaults, then in the frequency plan or band where one applies.

use alloc::vec::Vec;
use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mac::device::relay::RelayParameters;
use crate::mac::frequency_plan::FrequencyPlan;
use crate::mac::region::Region;

/// DevStatusReq is sent at least every this many uplinks.
pub const DEFAULT_STATUS_COUNT_PERIODICITY: u32 = 200;
/// DevStatusReq is sent at least this often.
pub const DEFAULT_STATUS_TIME_PERIODICITY: Duration = Duration::from_secs(24 * 60 * 60);
/// Time to wait for a class B device to answer.
pub const DEFAULT_CLASS_B_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Time to wait for a class C device to answer.
pub const DEFAULT_CLASS_C_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Link margin in dB the ADR algorithm keeps in reserve.
pub const DEFAULT_ADR_MARGIN: f32 = 15.0;
/// Lower bound of the dynamic NbTrans range.
pub const DEFAULT_MIN_NB_TRANS: u8 = 1;
/// Upper bound of the dynamic NbTrans range.
pub const DEFAULT_MAX_NB_TRANS: u8 = 3;

/// Values assigned by the static ADR mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct StaticAdrSettings {
    pub data_rate_index: u8,
    pub tx_power_index: u8,
    pub nb_trans: u8,
}

/// Bounds of the dynamic ADR mode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DynamicAdrSettings {
    pub margin: Option<f32>,
    pub min_data_rate_index: Option<u8>,
    pub max_data_rate_index: Option<u8>,
    pub min_tx_power_index: Option<u8>,
    pub max_tx_power_index: Option<u8>,
    pub min_nb_trans: Option<u8>,
    pub max_nb_trans: Option<u8>,
}

/// ADR mode of a device.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum AdrSettings {
    Disabled,
    Static(StaticAdrSettings),
    Dynamic(DynamicAdrSettings),
}

/// Per device MAC settings. Unset fields fall back to the plan, the band or the defaults.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct MacSettings {
    pub adr: Option<AdrSettings>,
    /// Frequencies the device was programmed with; only these are enabled initially.
    pub factory_preset_frequencies: Vec<u64>,
    pub resets_f_cnt: Option<bool>,
    pub supports_32_bit_f_cnt: Option<bool>,
    pub ping_slot_periodicity: Option<u8>,
    pub status_count_periodicity: Option<u32>,
    pub status_time_periodicity: Option<Duration>,
    pub class_b_timeout: Option<Duration>,
    pub class_c_timeout: Option<Duration>,
    pub rx1_delay: Option<u8>,
    pub desired_rx1_delay: Option<u8>,
    pub rx1_data_rate_offset: Option<u8>,
    pub desired_rx1_data_rate_offset: Option<u8>,
    pub rx2_data_rate_index: Option<u8>,
    pub desired_rx2_data_rate_index: Option<u8>,
    pub rx2_frequency: Option<u64>,
    pub desired_rx2_frequency: Option<u64>,
    pub max_duty_cycle: Option<u8>,
    pub desired_max_duty_cycle: Option<u8>,
    pub desired_max_eirp: Option<f32>,
    pub desired_adr_ack_limit_exponent: Option<u8>,
    pub desired_adr_ack_delay_exponent: Option<u8>,
    pub ping_slot_frequency: Option<u64>,
    pub desired_ping_slot_frequency: Option<u64>,
    pub beacon_frequency: Option<u64>,
    pub desired_beacon_frequency: Option<u64>,
    pub ping_slot_data_rate_index: Option<u8>,
    pub desired_ping_slot_data_rate_index: Option<u8>,
    pub uplink_dwell_time: Option<bool>,
    pub downlink_dwell_time: Option<bool>,
    pub desired_rejoin_time_periodicity: Option<u8>,
    pub desired_rejoin_count_periodicity: Option<u8>,
    pub relay: Option<RelayParameters>,
    pub desired_relay: Option<RelayParameters>,
}

fn resolve<T>(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    field: impl Fn(&MacSettings) -> Option<T>,
) -> Option<T> {
    device.and_then(&field).or_else(|| field(defaults))
}

/// Uplinks between two DevStatusReq.
pub fn device_status_count_periodicity(device: Option<&MacSettings>, defaults: &MacSettings) -> u32 {
    resolve(device, defaults, |s| s.status_count_periodicity)
        .unwrap_or(DEFAULT_STATUS_COUNT_PERIODICITY)
}

/// Maximum time between two DevStatusReq.
pub fn device_status_time_periodicity(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
) -> Duration {
    resolve(device, defaults, |s| s.status_time_periodicity)
        .unwrap_or(DEFAULT_STATUS_TIME_PERIODICITY)
}

/// Time a class B device has to answer a confirmed downlink.
pub fn device_class_b_timeout(device: Option<&MacSettings>, defaults: &MacSettings) -> Duration {
    resolve(device, defaults, |s| s.class_b_timeout).unwrap_or(DEFAULT_CLASS_B_TIMEOUT)
}

/// Time a class C device has to answer a confirmed downlink.
pub fn device_class_c_timeout(device: Option<&MacSettings>, defaults: &MacSettings) -> Duration {
    resolve(device, defaults, |s| s.class_c_timeout).unwrap_or(DEFAULT_CLASS_C_TIMEOUT)
}

/// Whether the device resets its frame counters when it restarts.
pub fn device_resets_f_cnt(device: Option<&MacSettings>, defaults: &MacSettings) -> bool {
    resolve(device, defaults, |s| s.resets_f_cnt).unwrap_or(false)
}

/// Whether the device uses 32-bit frame counters.
pub fn device_supports_32_bit_f_cnt(device: Option<&MacSettings>, defaults: &MacSettings) -> bool {
    resolve(device, defaults, |s| s.supports_32_bit_f_cnt).unwrap_or(true)
}

/// Class B ping slot periodicity, if known.
pub fn device_ping_slot_periodicity(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
) -> Option<u8> {
    resolve(device, defaults, |s| s.ping_slot_periodicity)
}

/// RX1 delay in seconds.
pub fn device_rx1_delay(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u8 {
    resolve(device, defaults, |s| s.rx1_delay).unwrap_or_else(|| band.default_rx_delay())
}

/// Desired RX1 delay in seconds, falling back to the current one.
pub fn device_desired_rx1_delay(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u8 {
    resolve(device, defaults, |s| s.desired_rx1_delay)
        .unwrap_or_else(|| device_rx1_delay(device, defaults, band))
}

/// Data rate offset between the uplink and RX1.
pub fn device_rx1_data_rate_offset(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u8 {
    resolve(device, defaults, |s| s.rx1_data_rate_offset)
        .unwrap_or_else(|| band.default_rx1_data_rate_offset())
}

/// Desired RX1 data rate offset, falling back to the current one.
pub fn device_desired_rx1_data_rate_offset(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u8 {
    resolve(device, defaults, |s| s.desired_rx1_data_rate_offset)
        .unwrap_or_else(|| device_rx1_data_rate_offset(device, defaults, band))
}

/// RX2 data rate: device, then frequency plan, then network default, then band.
pub fn device_rx2_data_rate_index(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> u8 {
    device
        .and_then(|s| s.rx2_data_rate_index)
        .or(fp.default_rx2_data_rate)
        .or(defaults.rx2_data_rate_index)
        .unwrap_or_else(|| band.default_rx2_data_rate())
}

/// Desired RX2 data rate, falling back to the current one.
pub fn device_desired_rx2_data_rate_index(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> u8 {
    device
        .and_then(|s| s.desired_rx2_data_rate_index)
        .or(fp.default_rx2_data_rate)
        .or(defaults.desired_rx2_data_rate_index)
        .unwrap_or_else(|| device_rx2_data_rate_index(device, defaults, band, fp))
}

/// RX2 frequency in Hz.
///
/// The network default is gated on the device override, so it never applies: a non-zero
/// device override is returned first.
pub fn device_rx2_frequency(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> u64 {
    let device_frequency = device.and_then(|s| s.rx2_frequency);
    match (device_frequency, fp.rx2_channel, defaults.rx2_frequency) {
        (Some(frequency), _, _) if frequency != 0 => frequency,
        (_, Some(channel), _) => channel.frequency,
        (Some(device_frequency), None, Some(frequency)) if device_frequency != 0 => frequency,
        _ => band.default_rx2_frequency(),
    }
}

/// Desired RX2 frequency, falling back to the current one.
pub fn device_desired_rx2_frequency(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> u64 {
    device
        .and_then(|s| s.desired_rx2_frequency)
        .filter(|frequency| *frequency != 0)
        .or(fp.rx2_channel.map(|channel| channel.frequency))
        .or(defaults.desired_rx2_frequency.filter(|frequency| *frequency != 0))
        .unwrap_or_else(|| device_rx2_frequency(device, defaults, band, fp))
}

/// Maximum duty cycle as the DutyCycleReq exponent.
pub fn device_max_duty_cycle(device: Option<&MacSettings>, defaults: &MacSettings) -> u8 {
    resolve(device, defaults, |s| s.max_duty_cycle).unwrap_or(0)
}

/// Desired maximum duty cycle, falling back to the current one.
pub fn device_desired_max_duty_cycle(device: Option<&MacSettings>, defaults: &MacSettings) -> u8 {
    resolve(device, defaults, |s| s.desired_max_duty_cycle)
        .unwrap_or_else(|| device_max_duty_cycle(device, defaults))
}

/// Maximum EIRP in dBm, never above what the band and plan allow.
pub fn device_desired_max_eirp(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> f32 {
    let limit = match fp.max_eirp {
        Some(max_eirp) => band.max_eirp().min(max_eirp),
        None => band.max_eirp(),
    };
    match resolve(device, defaults, |s| s.desired_max_eirp) {
        Some(eirp) => eirp.min(limit),
        None => limit,
    }
}

/// Desired ADR_ACK_LIMIT exponent, if any.
pub fn device_desired_adr_ack_limit_exponent(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
) -> Option<u8> {
    resolve(device, defaults, |s| s.desired_adr_ack_limit_exponent)
}

/// Desired ADR_ACK_DELAY exponent, if any.
pub fn device_desired_adr_ack_delay_exponent(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
) -> Option<u8> {
    resolve(device, defaults, |s| s.desired_adr_ack_delay_exponent)
}

/// Ping slot frequency, or 0 to hop as the band defines.
pub fn device_ping_slot_frequency(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u64 {
    resolve(device, defaults, |s| s.ping_slot_frequency)
        .or_else(|| band.ping_slot_frequency())
        .unwrap_or(0)
}

/// Desired ping slot frequency: device, then frequency plan, then network default.
pub fn device_desired_ping_slot_frequency(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> u64 {
    device
        .and_then(|s| s.desired_ping_slot_frequency)
        .or(fp.ping_slot.map(|channel| channel.frequency))
        .or(defaults.desired_ping_slot_frequency)
        .unwrap_or_else(|| device_ping_slot_frequency(device, defaults, band))
}

/// Ping slot data rate, defaulting to the beacon data rate.
pub fn device_ping_slot_data_rate_index(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> Option<u8> {
    resolve(device, defaults, |s| s.ping_slot_data_rate_index)
        .or_else(|| Some(band.beacon_data_rate_index()))
}

/// Desired ping slot data rate: device, then frequency plan, then network default.
pub fn device_desired_ping_slot_data_rate_index(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> Option<u8> {
    device
        .and_then(|s| s.desired_ping_slot_data_rate_index)
        .or(fp.ping_slot_default_data_rate)
        .or(defaults.desired_ping_slot_data_rate_index)
        .or_else(|| device_ping_slot_data_rate_index(device, defaults, band))
}

/// Beacon frequency, or 0 to hop as the band defines.
pub fn device_beacon_frequency(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u64 {
    resolve(device, defaults, |s| s.beacon_frequency)
        .or_else(|| band.beacon_frequency())
        .unwrap_or(0)
}

/// Desired beacon frequency, falling back to the current one.
pub fn device_desired_beacon_frequency(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
) -> u64 {
    resolve(device, defaults, |s| s.desired_beacon_frequency)
        .unwrap_or_else(|| device_beacon_frequency(device, defaults, band))
}

/// Dwell time flags, falling back to the frequency plan.
pub fn device_dwell_time(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    fp: &FrequencyPlan,
) -> (Option<bool>, Option<bool>) {
    (
        resolve(device, defaults, |s| s.uplink_dwell_time).or(fp.dwell_time.uplinks),
        resolve(device, defaults, |s| s.downlink_dwell_time).or(fp.dwell_time.downlinks),
    )
}

/// ADR mode, falling back to dynamic ADR for unicast devices of bands that allow it.
pub fn device_adr_settings(
    device: Option<&MacSettings>,
    defaults: &MacSettings,
    band: &dyn Region,
    multicast: bool,
) -> AdrSettings {
    match resolve(device, defaults, |s| s.adr) {
        Some(adr) => adr,
        None if band.enable_adr() && !multicast => AdrSettings::Dynamic(Default::default()),
        None => AdrSettings::Disabled,
    }
}

fn dynamic_adr(settings: Option<&MacSettings>) -> Option<DynamicAdrSettings> {
    match settings?.adr? {
        AdrSettings::Dynamic(dynamic) => Some(dynamic),
        _ => None,
    }
}

/// Link margin in dB the ADR algorithm keeps in reserve.
pub fn device_adr_margin(device: Option<&MacSettings>, defaults: &MacSettings) -> f32 {
    dynamic_adr(device)
        .and_then(|dynamic| dynamic.margin)
        .or_else(|| dynamic_adr(Some(defaults)).and_then(|dynamic| dynamic.margin))
        .unwrap_or(DEFAULT_ADR_MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::frequency_plan::FrequencyPlanChannel;
    use crate::mac::region::EU868;

    #[test]
    fn device_overrides_defaults() {
        let device = MacSettings { status_count_periodicity: Some(5), ..Default::default() };
        let defaults = MacSettings {
            status_count_periodicity: Some(10),
            status_time_periodicity: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        assert_eq!(device_status_count_periodicity(Some(&device), &defaults), 5);
        assert_eq!(device_status_time_periodicity(Some(&device), &defaults), Duration::from_secs(60));
        assert_eq!(
            device_class_b_timeout(None, &MacSettings::default()),
            DEFAULT_CLASS_B_TIMEOUT
        );
    }

    #[test]
    fn rx2_frequency_network_default_is_shadowed() {
        let fp = FrequencyPlan::new("EU_863_870");
        let defaults = MacSettings { rx2_frequency: Some(869_000_000), ..Default::default() };
        assert_eq!(device_rx2_frequency(None, &defaults, &EU868, &fp), 869_525_000);

        let device = MacSettings { rx2_frequency: Some(868_500_000), ..Default::default() };
        assert_eq!(device_rx2_frequency(Some(&device), &defaults, &EU868, &fp), 868_500_000);

        let fp = FrequencyPlan {
            rx2_channel: Some(FrequencyPlanChannel::at(869_100_000)),
            ..FrequencyPlan::new("EU_863_870")
        };
        assert_eq!(device_rx2_frequency(None, &defaults, &EU868, &fp), 869_100_000);
    }

    #[test]
    fn adr_fallbacks() {
        let defaults = MacSettings::default();
        assert!(matches!(
            device_adr_settings(None, &defaults, &EU868, false),
            AdrSettings::Dynamic(_)
        ));
        assert_eq!(device_adr_settings(None, &defaults, &EU868, true), AdrSettings::Disabled);
        assert_eq!(device_adr_margin(None, &defaults), DEFAULT_ADR_MARGIN);
        let device = MacSettings {
            adr: Some(AdrSettings::Dynamic(DynamicAdrSettings {
                margin: Some(2.0),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(device_adr_margin(Some(&device), &defaults), 2.0);
    }

    #[test]
    fn max_eirp_is_capped() {
        let fp = FrequencyPlan { max_eirp: Some(14.0), ..FrequencyPlan::new("EU_863_870") };
        let defaults = MacSettings::default();
        assert_eq!(device_desired_max_eirp(None, &defaults, &EU868, &fp), 14.0);
        let device = MacSettings { desired_max_eirp: Some(12.0), ..Default::default() };
        assert_eq!(device_desired_max_eirp(Some(&device), &defaults, &EU868, &fp), 12.0);
    }
}
