//! BeaconFreqReq: frequency of class B beacons. Zero restores the regional default.

use alloc::vec;
use alloc::vec::Vec;

use super::{answer_event, enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::frequency;
use crate::mac::command::{BeaconFreqAns, BeaconFreqReq, Cid, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

/// Whether a class B device should move to the desired beacon frequency.
pub fn device_needs_beacon_freq(dev: &EndDevice) -> bool {
    dev.supports_class_b
        && negotiable_state(dev, Cid::BeaconFreq).map_or(false, |state| {
            state.desired_parameters.beacon_frequency != state.current_parameters.beacon_frequency
        })
}

/// Enqueues a BeaconFreqReq carrying the desired beacon frequency.
pub fn enqueue_beacon_freq(dev: &mut EndDevice, max_down_len: u16, max_up_len: u16) -> EnqueueState {
    if !device_needs_beacon_freq(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let frequency = match state.desired_parameters.beacon_frequency {
        0 => Ok(0),
        frequency => frequency::validate(frequency),
    };
    match frequency {
        Ok(frequency) => enqueue_requests(
            dev,
            Cid::BeaconFreq,
            max_down_len,
            max_up_len,
            vec![MacCommand::BeaconFreqReq(BeaconFreqReq { frequency })],
        ),
        Err(error) => generation_failed(Cid::BeaconFreq, max_down_len, max_up_len, error),
    }
}

/// Applies the beacon frequency if the device acknowledged it.
pub fn handle_beacon_freq_ans(dev: &mut EndDevice, answer: &BeaconFreqAns) -> Result<Vec<Event>, Error> {
    let mut event = None;
    handle_mac_response(dev, Cid::BeaconFreq, false, |dev, request| {
        let MacCommand::BeaconFreqReq(req) = request else {
            return Err(mismatched_request());
        };
        if answer.frequency_ack {
            dev.mac_state_mut()?.current_parameters.beacon_frequency = req.frequency;
        } else {
            warn!("beacon frequency {} rejected", req.frequency);
        }
        event = Some(answer_event(
            request.clone(),
            MacCommand::BeaconFreqAns(*answer),
            answer.frequency_ack,
        ));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}
