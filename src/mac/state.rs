//! Initial MAC state of a session.

use alloc::vec::Vec;

use crate::mac::device::{Channel, EndDevice, MacParameters, MacState};
use crate::mac::frequency_plan::{FrequencyPlan, FrequencyPlanStore};
use crate::mac::region::Region;
use crate::mac::settings::*;
use crate::mac::types::DeviceClass;
use crate::Error;

/// Data rate range of factory preset channels that are not part of the band.
const PRESET_DATA_RATE_RANGE: (u8, u8) = (0, 5);

/// Class a device starts a session in.
pub fn device_default_class(dev: &EndDevice) -> Result<DeviceClass, Error> {
    if dev.supports_join || !dev.multicast {
        Ok(DeviceClass::A)
    } else if dev.supports_class_c {
        Ok(DeviceClass::C)
    } else if dev.supports_class_b {
        Ok(DeviceClass::B)
    } else {
        Err(Error::ClassAMulticast)
    }
}

fn band_uplink_channels(band: &dyn Region) -> Vec<Option<Channel>> {
    let downlink_channels = band.default_channels(false).max(1);
    (0..band.default_channels(true))
        .map(|i| {
            let (min_data_rate_index, max_data_rate_index) = band.mandatory_ul_data_rate_range(i);
            Some(Channel {
                uplink_frequency: band.mandatory_frequency(i, true),
                downlink_frequency: band.mandatory_frequency(i % downlink_channels, false),
                min_data_rate_index,
                max_data_rate_index,
                enable_uplink: true,
            })
        })
        .collect()
}

fn current_channels(dev: &EndDevice, band: &dyn Region) -> Result<Vec<Option<Channel>>, Error> {
    if dev.multicast {
        let channels = (0..band.default_channels(false))
            .map(|i| {
                Some(Channel {
                    uplink_frequency: 0,
                    downlink_frequency: band.mandatory_frequency(i, false),
                    min_data_rate_index: 0,
                    max_data_rate_index: 0,
                    enable_uplink: false,
                })
            })
            .collect();
        return Ok(channels);
    }

    let mut channels = band_uplink_channels(band);
    let presets = dev
        .mac_settings
        .as_ref()
        .map(|settings| settings.factory_preset_frequencies.as_slice())
        .unwrap_or_default();
    if presets.is_empty() {
        return Ok(channels);
    }
    for channel in channels.iter_mut().flatten() {
        channel.enable_uplink = presets.contains(&channel.uplink_frequency);
    }
    let (_, max_data_rate_index) = band.ul_data_rate_range();
    for frequency in presets {
        if channels.iter().flatten().any(|channel| channel.uplink_frequency == *frequency) {
            continue;
        }
        channels.push(Some(Channel {
            uplink_frequency: *frequency,
            downlink_frequency: *frequency,
            min_data_rate_index: PRESET_DATA_RATE_RANGE.0,
            max_data_rate_index: PRESET_DATA_RATE_RANGE.1.min(max_data_rate_index),
            enable_uplink: true,
        }));
    }
    if channels.len() > band.max_uplink_channels() {
        return Err(Error::TooManyChannels {
            count: channels.len(),
            max: band.max_uplink_channels(),
        });
    }
    Ok(channels)
}

/// Channels the frequency plan enables. Band channels the plan does not use are kept, disabled,
/// so that indexes stay aligned with the current channels.
fn desired_channels(
    current: &[Option<Channel>],
    band: &dyn Region,
    fp: &FrequencyPlan,
) -> Result<Vec<Option<Channel>>, Error> {
    if fp.uplink_channels.is_empty() {
        return Ok(current.to_vec());
    }
    let mut channels = band_uplink_channels(band);
    for channel in channels.iter_mut().flatten() {
        channel.enable_uplink = false;
    }
    for (i, fp_channel) in fp.uplink_channels.iter().enumerate() {
        let downlink_frequency = fp
            .downlink_channels
            .get(i)
            .map_or(fp_channel.frequency, |channel| channel.frequency);
        if let Some(channel) = channels
            .iter_mut()
            .flatten()
            .find(|channel| channel.uplink_frequency == fp_channel.frequency)
        {
            channel.min_data_rate_index = fp_channel.min_data_rate;
            channel.max_data_rate_index = fp_channel.max_data_rate;
            channel.enable_uplink = true;
            continue;
        }
        channels.push(Some(Channel {
            uplink_frequency: fp_channel.frequency,
            downlink_frequency,
            min_data_rate_index: fp_channel.min_data_rate,
            max_data_rate_index: fp_channel.max_data_rate,
            enable_uplink: true,
        }));
    }
    if channels.len() > band.max_uplink_channels() {
        return Err(Error::TooManyChannels {
            count: channels.len(),
            max: band.max_uplink_channels(),
        });
    }
    Ok(channels)
}

/// Exponent of a power of two ADR acknowledgement parameter.
fn exponent(value: u16) -> u8 {
    value.trailing_zeros() as u8
}

/// Computes the MAC state a new session of `dev` starts with.
///
/// Current parameters are what the device uses right after activation: band defaults,
/// overridden by the network defaults and then by the device settings. Desired parameters
/// additionally follow the frequency plan. For multicast devices both are the same.
pub fn new_state(
    dev: &EndDevice,
    frequency_plans: &dyn FrequencyPlanStore,
    defaults: &MacSettings,
) -> Result<MacState, Error> {
    let fp = frequency_plans.get(&dev.frequency_plan_id)?;
    let band = fp.band()?;
    let class = device_default_class(dev)?;
    let settings = dev.mac_settings.as_ref();

    let (ul_min_data_rate_index, _) = band.ul_data_rate_range();
    let current = MacParameters {
        max_eirp: band.max_eirp(),
        adr_data_rate_index: ul_min_data_rate_index,
        adr_tx_power_index: 0,
        adr_nb_trans: 1,
        adr_ack_limit_exponent: Some(exponent(band.default_adr_ack_limit())),
        adr_ack_delay_exponent: Some(exponent(band.default_adr_ack_delay())),
        rx1_delay: device_rx1_delay(settings, defaults, band),
        rx1_data_rate_offset: device_rx1_data_rate_offset(settings, defaults, band),
        rx2_data_rate_index: device_rx2_data_rate_index(settings, defaults, band, fp),
        rx2_frequency: device_rx2_frequency(settings, defaults, band, fp),
        max_duty_cycle: device_max_duty_cycle(settings, defaults),
        rejoin_time_periodicity: 0,
        rejoin_count_periodicity: 0,
        ping_slot_frequency: device_ping_slot_frequency(settings, defaults, band),
        ping_slot_data_rate_index: device_ping_slot_data_rate_index(settings, defaults, band),
        beacon_frequency: device_beacon_frequency(settings, defaults, band),
        channels: current_channels(dev, band)?,
        uplink_dwell_time: None,
        downlink_dwell_time: None,
        relay: settings
            .and_then(|s| s.relay.clone())
            .or_else(|| defaults.relay.clone()),
    };

    let desired = if dev.multicast {
        current.clone()
    } else {
        let (uplink_dwell_time, downlink_dwell_time) = device_dwell_time(settings, defaults, fp);
        MacParameters {
            max_eirp: device_desired_max_eirp(settings, defaults, band, fp),
            adr_ack_limit_exponent: device_desired_adr_ack_limit_exponent(settings, defaults)
                .or(current.adr_ack_limit_exponent),
            adr_ack_delay_exponent: device_desired_adr_ack_delay_exponent(settings, defaults)
                .or(current.adr_ack_delay_exponent),
            rx1_delay: device_desired_rx1_delay(settings, defaults, band),
            rx1_data_rate_offset: device_desired_rx1_data_rate_offset(settings, defaults, band),
            rx2_data_rate_index: device_desired_rx2_data_rate_index(settings, defaults, band, fp),
            rx2_frequency: device_desired_rx2_frequency(settings, defaults, band, fp),
            max_duty_cycle: device_desired_max_duty_cycle(settings, defaults),
            rejoin_time_periodicity: settings
                .and_then(|s| s.desired_rejoin_time_periodicity)
                .or(defaults.desired_rejoin_time_periodicity)
                .unwrap_or(current.rejoin_time_periodicity),
            rejoin_count_periodicity: settings
                .and_then(|s| s.desired_rejoin_count_periodicity)
                .or(defaults.desired_rejoin_count_periodicity)
                .unwrap_or(current.rejoin_count_periodicity),
            ping_slot_frequency: device_desired_ping_slot_frequency(settings, defaults, band, fp),
            ping_slot_data_rate_index: device_desired_ping_slot_data_rate_index(
                settings, defaults, band, fp,
            ),
            beacon_frequency: device_desired_beacon_frequency(settings, defaults, band),
            channels: desired_channels(&current.channels, band, fp)?,
            uplink_dwell_time,
            downlink_dwell_time,
            relay: settings
                .and_then(|s| s.desired_relay.clone())
                .or_else(|| defaults.desired_relay.clone())
                .or_else(|| current.relay.clone()),
            ..current.clone()
        }
    };

    let mut state = MacState::new(dev.lorawan_version, class, current, desired);
    state.ping_slot_periodicity = device_ping_slot_periodicity(settings, defaults);
    debug!("initialized MAC state with {} channels", state.current_parameters.channels.len());
    Ok(state)
}
