//! DevStatusReq: battery level and demodulation margin of the device.

use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;

use super::{enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::command::{Cid, DevStatusAns, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::mac::settings::{
    device_status_count_periodicity, device_status_time_periodicity, MacSettings,
};
use crate::mac::types::PowerState;
use crate::Error;

const EXTERNAL_POWER: u8 = 0;
const UNKNOWN_BATTERY: u8 = 255;

/// Whether the status is due, either by frame count or by time since the last answer.
pub fn device_needs_dev_status(dev: &EndDevice, defaults: &MacSettings, transmit_at: Duration) -> bool {
    let Some(state) = negotiable_state(dev, Cid::DevStatus) else {
        return false;
    };
    let settings = dev.mac_settings.as_ref();
    let count_periodicity = device_status_count_periodicity(settings, defaults);
    let time_periodicity = device_status_time_periodicity(settings, defaults);
    if count_periodicity == 0 && time_periodicity.is_zero() {
        return false;
    }
    let Some(last_received_at) = dev.last_dev_status_received_at else {
        return true;
    };
    let last_f_cnt_up = dev.session.as_ref().map_or(0, |session| session.last_f_cnt_up);
    (count_periodicity > 0
        && state.last_dev_status_f_cnt_up.saturating_add(count_periodicity) <= last_f_cnt_up)
        || (!time_periodicity.is_zero()
            && last_received_at
                .checked_add(time_periodicity)
                .map_or(false, |due| due <= transmit_at))
}

/// Enqueues a DevStatusReq when the status is due.
pub fn enqueue_dev_status(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    defaults: &MacSettings,
    transmit_at: Duration,
) -> EnqueueState {
    if !device_needs_dev_status(dev, defaults, transmit_at) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    enqueue_requests(dev, Cid::DevStatus, max_down_len, max_up_len, vec![MacCommand::DevStatusReq])
}

/// Records the device status reported in the uplink with frame counter `f_cnt_up`.
pub fn handle_dev_status_ans(
    dev: &mut EndDevice,
    answer: &DevStatusAns,
    f_cnt_up: u32,
    received_at: Duration,
) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::DevStatus, false, |dev, request| {
        if *request != MacCommand::DevStatusReq {
            return Err(mismatched_request());
        }
        match answer.battery {
            EXTERNAL_POWER => {
                dev.power_state = PowerState::External;
                dev.battery_percentage = None;
            }
            UNKNOWN_BATTERY => {
                dev.power_state = PowerState::Unknown;
                dev.battery_percentage = None;
            }
            level => {
                dev.power_state = PowerState::Battery;
                dev.battery_percentage = Some(f32::from(level - 1) / 253.0);
            }
        }
        dev.downlink_margin = answer.margin;
        dev.last_dev_status_received_at = Some(received_at);
        dev.mac_state_mut()?.last_dev_status_f_cnt_up = f_cnt_up;
        Ok(())
    })?;
    debug!("device status: battery {}, margin {}", answer.battery, answer.margin);
    Ok(vec![Event::AnswerReceived(MacCommand::DevStatusAns(*answer))])
}
