//! Adaptive data rate: chooses the data rate, TX power and NbTrans a device should use.
//!
//! The algorithm estimates the link margin from the best SNR of the recent uplinks sent at
//! the current data rate, spends it on faster data rates first and on lower TX power next,
//! and derives NbTrans from the frame loss rate. It only writes the desired parameters;
//! LinkADRReq carries them to the device.

use alloc::vec::Vec;

use lora_modulation::{Bandwidth, SpreadingFactor};

use crate::mac::device::EndDevice;
use crate::mac::region::Region;
use crate::mac::rejection::RejectionSet;
use crate::mac::settings::{
    device_adr_margin, device_adr_settings, AdrSettings, MacSettings, DEFAULT_MAX_NB_TRANS,
    DEFAULT_MIN_NB_TRANS,
};
use crate::mac::types::{DataRate, LoraDataRate, UplinkMessage};
use crate::Error;

/// Margin in dB taken off when fewer than [`OPTIMAL_ADR_UPLINK_COUNT`] uplinks are known.
pub const SAFETY_MARGIN: f32 = 2.5;
/// Link margin in dB consumed by one data rate step.
pub const DR_STEP: f32 = 2.5;
/// Number of uplinks needed for a confident estimate.
pub const OPTIMAL_ADR_UPLINK_COUNT: usize = 20;
/// Number of uplinks needed to estimate the loss rate.
const NB_TRANS_UPLINK_COUNT: usize = 10;

/// Minimum SNR in dB needed to demodulate a LoRa transmission.
#[allow(unreachable_patterns)]
pub fn demodulation_floor(data_rate: &LoraDataRate) -> Option<f32> {
    let (spreading_factor, bandwidth) = data_rate.modulation()?;
    let floors = match spreading_factor {
        SpreadingFactor::_6 => [-5.0, -2.0, 1.0],
        SpreadingFactor::_7 => [-7.5, -4.5, -1.5],
        SpreadingFactor::_8 => [-10.0, -7.0, -4.0],
        SpreadingFactor::_9 => [-12.5, -9.5, -6.5],
        SpreadingFactor::_10 => [-15.0, -12.0, -9.0],
        SpreadingFactor::_11 => [-17.5, -14.5, -11.5],
        SpreadingFactor::_12 => [-20.0, -17.0, -14.0],
        _ => return None,
    };
    match bandwidth {
        Bandwidth::_125KHz => Some(floors[0]),
        Bandwidth::_250KHz => Some(floors[1]),
        Bandwidth::_500KHz => Some(floors[2]),
        _ => None,
    }
}

/// Whether the network should run ADR for the device before the next downlink.
pub fn device_should_adapt_data_rate(
    dev: &EndDevice,
    defaults: &MacSettings,
    band: &dyn Region,
) -> bool {
    if dev.multicast {
        return false;
    }
    match device_adr_settings(dev.mac_settings.as_ref(), defaults, band, dev.multicast) {
        AdrSettings::Disabled => false,
        AdrSettings::Static(_) => true,
        AdrSettings::Dynamic(_) => {
            band.enable_adr()
                && dev
                    .mac_state
                    .as_ref()
                    .and_then(|state| state.recent_uplinks.last())
                    .map_or(false, |up| up.adr)
        }
    }
}

/// Latest uplinks sent at `data_rate_index` since the last ADR change, oldest first.
fn adr_uplinks<'a>(
    recent_uplinks: &'a [UplinkMessage],
    data_rate_index: u8,
    last_adr_change_f_cnt_up: u32,
    band: &dyn Region,
) -> Vec<&'a UplinkMessage> {
    let mut ups: Vec<&UplinkMessage> = recent_uplinks
        .iter()
        .rev()
        .take_while(|up| {
            up.m_type.is_data_uplink()
                && up.f_cnt > last_adr_change_f_cnt_up
                && band.find_uplink_data_rate(&up.settings.data_rate) == Some(data_rate_index)
        })
        .collect();
    ups.reverse();
    ups
}

/// Share of frames lost between the first and the last uplink, counted from the last
/// frame counter reset.
fn uplink_loss_rate(ups: &[&UplinkMessage]) -> f32 {
    let Some(first) = ups.first() else {
        return 0.0;
    };
    let (mut min, mut max) = (first.f_cnt, first.f_cnt);
    let mut lost = 0u32;
    for pair in ups.windows(2) {
        let (prev, f_cnt) = (pair[0].f_cnt, pair[1].f_cnt);
        if f_cnt == prev {
            continue;
        }
        if f_cnt < prev {
            min = f_cnt;
            lost = 0;
        } else {
            lost += f_cnt - prev - 1;
        }
        max = f_cnt;
    }
    lost as f32 / (1 + max - min) as f32
}

fn strip_rejected(mut min: u8, mut max: u8, rejected: &[u8]) -> Option<(u8, u8)> {
    while min <= max && rejected.binary_search(&min).is_ok() {
        min = min.checked_add(1)?;
    }
    while min <= max && rejected.binary_search(&max).is_ok() {
        max = max.checked_sub(1)?;
    }
    (min <= max).then_some((min, max))
}

/// Updates the desired data rate, TX power and NbTrans of the device from its recent uplinks.
pub fn adapt_data_rate(
    dev: &mut EndDevice,
    band: &dyn Region,
    defaults: &MacSettings,
) -> Result<(), Error> {
    let adr = device_adr_settings(dev.mac_settings.as_ref(), defaults, band, dev.multicast);
    let adr_margin = device_adr_margin(dev.mac_settings.as_ref(), defaults);
    let state = dev.mac_state.as_mut().ok_or(Error::MissingMacState)?;

    let dynamic = match adr {
        AdrSettings::Disabled => return Ok(()),
        AdrSettings::Static(settings) => {
            let desired = &mut state.desired_parameters;
            desired.adr_data_rate_index = settings.data_rate_index;
            desired.adr_tx_power_index = settings.tx_power_index;
            desired.adr_nb_trans = settings.nb_trans;
            return Ok(());
        }
        AdrSettings::Dynamic(dynamic) => dynamic,
    };

    let current_data_rate_index = state.current_parameters.adr_data_rate_index;
    let ups = adr_uplinks(
        &state.recent_uplinks,
        current_data_rate_index,
        state.last_adr_change_f_cnt_up,
        band,
    );
    let Some(last) = ups.last() else {
        trace!("no uplinks at data rate {} since the last ADR change", current_data_rate_index);
        return Ok(());
    };

    let (min_dr, max_dr) = state
        .current_parameters
        .enabled_data_rate_range()
        .ok_or(Error::CorruptedMacState("enabled channels share no data rate"))?;
    let min_dr = dynamic.min_data_rate_index.map_or(min_dr, |dr| min_dr.max(dr));
    let max_dr = dynamic
        .max_data_rate_index
        .map_or(max_dr, |dr| max_dr.min(dr))
        .min(band.max_adr_data_rate_index());
    let rejected_drs = &state.rejected_adr_data_rate_indexes;
    let Some((min_dr, max_dr)) = strip_rejected(min_dr, max_dr, rejected_drs) else {
        trace!("no data rate left to choose from");
        return Ok(());
    };
    let min_dr = min_dr.max(current_data_rate_index);
    if min_dr > max_dr {
        trace!("current data rate {} above the admissible range", current_data_rate_index);
        return Ok(());
    }

    let max_tx_power_index = band.max_tx_power_index();
    let min_tx = dynamic.min_tx_power_index.unwrap_or(0);
    let max_tx = dynamic
        .max_tx_power_index
        .map_or(max_tx_power_index, |tx| tx.min(max_tx_power_index));
    let rejected_txs = &state.rejected_adr_tx_power_indexes;
    let Some((min_tx, max_tx)) = strip_rejected(min_tx, max_tx, rejected_txs) else {
        trace!("no TX power left to choose from");
        return Ok(());
    };

    let DataRate::Lora(data_rate) = last.settings.data_rate else {
        return Err(Error::InvalidDataRate);
    };
    let floor = demodulation_floor(&data_rate).ok_or(Error::InvalidDataRate)?;
    let Some(max_snr) = ups
        .iter()
        .flat_map(|up| up.rx_metadata.iter())
        .filter_map(|md| md.snr)
        .reduce(f32::max)
    else {
        trace!("no SNR reported");
        return Ok(());
    };
    let mut margin = max_snr - floor - adr_margin;
    if ups.len() < OPTIMAL_ADR_UPLINK_COUNT {
        margin -= SAFETY_MARGIN;
    }

    let tx_delta = |from: u8, to: u8| {
        band.tx_offset(from).unwrap_or(0.0) - band.tx_offset(to).unwrap_or(0.0)
    };
    let desired = &mut state.desired_parameters;

    let start = current_data_rate_index;
    let steps = ((margin - tx_delta(0, min_tx)) / DR_STEP).min(f32::from(max_dr - start));
    let cap = if steps < 0.0 { min_dr } else { start + steps as u8 };
    let mut data_rate_index = min_dr;
    let mut candidate = cap;
    while candidate > min_dr {
        if !rejected_drs.contains_sorted(&candidate) {
            data_rate_index = candidate;
            break;
        }
        candidate -= 1;
    }
    margin -= f32::from(data_rate_index - start) * DR_STEP;
    if data_rate_index > start {
        desired.adr_tx_power_index = 0;
    }
    desired.adr_data_rate_index = data_rate_index;

    let mut tx_power_index = desired.adr_tx_power_index;
    if tx_power_index < min_tx {
        margin -= tx_delta(tx_power_index, min_tx);
        tx_power_index = min_tx;
    } else if tx_power_index > max_tx {
        margin += tx_delta(max_tx, tx_power_index);
        tx_power_index = max_tx;
    }
    let mut candidate = max_tx;
    while candidate > min_tx {
        if !rejected_txs.contains_sorted(&candidate)
            && tx_delta(tx_power_index, candidate) <= margin
        {
            tx_power_index = candidate;
            break;
        }
        candidate -= 1;
    }
    desired.adr_tx_power_index = tx_power_index;

    let mut nb_trans = state.current_parameters.adr_nb_trans.max(1);
    if ups.len() >= NB_TRANS_UPLINK_COUNT {
        let loss_rate = uplink_loss_rate(&ups);
        nb_trans = if loss_rate < 0.05 {
            1 + nb_trans / 3
        } else if loss_rate < 0.1 {
            nb_trans
        } else if loss_rate < 0.3 {
            2 + nb_trans / 2
        } else {
            3
        };
    }
    let min_nb_trans = dynamic.min_nb_trans.unwrap_or(DEFAULT_MIN_NB_TRANS);
    let max_nb_trans = dynamic.max_nb_trans.unwrap_or(DEFAULT_MAX_NB_TRANS);
    desired.adr_nb_trans = nb_trans.max(min_nb_trans).min(max_nb_trans);

    debug!(
        "ADR chose data rate {}, TX power {}, NbTrans {}",
        desired.adr_data_rate_index,
        desired.adr_tx_power_index,
        desired.adr_nb_trans
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::{Channel, MacParameters, MacState};
    use crate::mac::region::EU868;
    use crate::mac::settings::DynamicAdrSettings;
    use crate::mac::types::{DevAddr, DeviceClass, MType, MacVersion, RxMetadata, TxSettings};
    use core::time::Duration;

    fn uplink(f_cnt: u32, spreading_factor: u8, m_type: MType) -> UplinkMessage {
        UplinkMessage {
            m_type,
            dev_addr: DevAddr(1),
            f_cnt,
            adr: true,
            settings: TxSettings {
                data_rate: DataRate::lora(spreading_factor, 125_000),
                frequency: 868_100_000,
            },
            rx_metadata: alloc::vec![RxMetadata { snr: Some(0.0), ..Default::default() }],
            received_at: Duration::from_secs(u64::from(f_cnt)),
        }
    }

    #[test]
    fn floor_table() {
        let floor = |sf, bw| demodulation_floor(&LoraDataRate { spreading_factor: sf, bandwidth: bw });
        assert_eq!(floor(12, 125_000), Some(-20.0));
        assert_eq!(floor(12, 500_000), Some(-14.0));
        assert_eq!(floor(7, 250_000), Some(-4.5));
        assert_eq!(floor(5, 125_000), None);
    }

    #[test]
    fn uplinks_stop_at_data_rate_change_and_marker() {
        let ups = [
            uplink(3, 12, MType::UnconfirmedDataUp),
            uplink(4, 11, MType::UnconfirmedDataUp),
            uplink(5, 12, MType::ConfirmedDataUp),
            uplink(6, 12, MType::UnconfirmedDataUp),
        ];
        let kept = adr_uplinks(&ups, 0, 0, &EU868);
        assert_eq!(kept.iter().map(|up| up.f_cnt).collect::<Vec<_>>(), [5, 6]);
        assert_eq!(adr_uplinks(&ups, 0, 5, &EU868).len(), 1);
        let joined = [uplink(1, 12, MType::UnconfirmedDataUp), uplink(2, 12, MType::JoinRequest)];
        assert!(adr_uplinks(&joined, 0, 0, &EU868).is_empty());
    }

    #[test]
    fn loss_rate_resets_on_rollback() {
        let ups: Vec<UplinkMessage> =
            [1, 2, 4, 4, 6].iter().map(|f| uplink(*f, 12, MType::UnconfirmedDataUp)).collect();
        let refs: Vec<&UplinkMessage> = ups.iter().collect();
        assert_eq!(uplink_loss_rate(&refs), 2.0 / 6.0);

        let ups: Vec<UplinkMessage> =
            [10, 12, 1, 2, 4].iter().map(|f| uplink(*f, 12, MType::UnconfirmedDataUp)).collect();
        let refs: Vec<&UplinkMessage> = ups.iter().collect();
        assert_eq!(uplink_loss_rate(&refs), 1.0 / 4.0);
    }

    #[test]
    fn data_rate_capped_by_the_slowest_channel() {
        let channel = |uplink_frequency, max_data_rate_index| {
            Some(Channel {
                uplink_frequency,
                downlink_frequency: uplink_frequency,
                min_data_rate_index: 0,
                max_data_rate_index,
                enable_uplink: true,
            })
        };
        let mut current = MacParameters {
            channels: (0..8).map(|i| channel(867_100_000 + 200_000 * i, 5)).collect(),
            ..Default::default()
        };
        current.channels[1] = channel(867_300_000, 3);
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_3);
        dev.mac_settings = Some(MacSettings {
            adr: Some(AdrSettings::Dynamic(DynamicAdrSettings { margin: Some(0.0), ..Default::default() })),
            ..Default::default()
        });
        let mut state = MacState::new(MacVersion::V1_0_3, DeviceClass::A, current.clone(), current);
        for f_cnt in 1..=20 {
            let mut up = uplink(f_cnt, 12, MType::UnconfirmedDataUp);
            up.rx_metadata[0].snr = Some(10.0);
            state.push_recent_uplink(up);
        }
        dev.mac_state = Some(state);

        adapt_data_rate(&mut dev, &EU868, &MacSettings::default()).unwrap();
        let desired = &dev.mac_state().unwrap().desired_parameters;
        assert_eq!(desired.adr_data_rate_index, 3);
        assert_eq!(desired.adr_tx_power_index, 7);
        assert_eq!(desired.adr_nb_trans, 1);

        let state = dev.mac_state_mut().unwrap();
        state.current_parameters.channels[2] = Some(Channel {
            min_data_rate_index: 4,
            ..state.current_parameters.channels[2].unwrap()
        });
        assert_eq!(
            adapt_data_rate(&mut dev, &EU868, &MacSettings::default()),
            Err(Error::CorruptedMacState("enabled channels share no data rate"))
        );
    }

    #[test]
    fn strip_rejected_from_both_ends() {
        assert_eq!(strip_rejected(0, 5, &[0, 1, 5]), Some((2, 4)));
        assert_eq!(strip_rejected(0, 1, &[0, 1]), None);
        assert_eq!(strip_rejected(0, 0, &[0]), None);
    }
}
