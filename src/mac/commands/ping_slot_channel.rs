//! PingSlotChannelReq: frequency and data rate of class B ping slots.

use alloc::vec;
use alloc::vec::Vec;

use super::{answer_event, enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::frequency;
use crate::mac::command::{Cid, MacCommand, PingSlotChannelAns, PingSlotChannelReq};
use crate::mac::device::{EndDevice, MacParameters};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::mac::region::Region;
use crate::Error;

/// Whether a class B device should move its ping slots.
pub fn device_needs_ping_slot_channel(dev: &EndDevice) -> bool {
    if !dev.supports_class_b {
        return false;
    }
    negotiable_state(dev, Cid::PingSlotChannel).map_or(false, |state| {
        let (current, desired) = (&state.current_parameters, &state.desired_parameters);
        desired.ping_slot_frequency != current.ping_slot_frequency
            || (desired.ping_slot_data_rate_index.is_some()
                && desired.ping_slot_data_rate_index != current.ping_slot_data_rate_index)
    })
}

fn generate(params: &MacParameters, band: &dyn Region) -> Result<PingSlotChannelReq, Error> {
    let data_rate_index = params
        .ping_slot_data_rate_index
        .unwrap_or_else(|| band.beacon_data_rate_index());
    band.convert_data_rate(data_rate_index)
        .map_err(|_| Error::InvalidDataRateIndex { index: data_rate_index })?;
    let frequency = match params.ping_slot_frequency {
        0 => 0,
        frequency => frequency::validate(frequency)?,
    };
    Ok(PingSlotChannelReq { frequency, data_rate_index })
}

/// Enqueues a PingSlotChannelReq, defaulting the data rate to the beacon one.
pub fn enqueue_ping_slot_channel(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    band: &dyn Region,
) -> EnqueueState {
    if !device_needs_ping_slot_channel(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    match generate(&state.desired_parameters, band) {
        Ok(request) => enqueue_requests(
            dev,
            Cid::PingSlotChannel,
            max_down_len,
            max_up_len,
            vec![MacCommand::PingSlotChannelReq(request)],
        ),
        Err(error) => generation_failed(Cid::PingSlotChannel, max_down_len, max_up_len, error),
    }
}

/// Applies the ping slot channel if both fields were acknowledged.
pub fn handle_ping_slot_channel_ans(
    dev: &mut EndDevice,
    answer: &PingSlotChannelAns,
) -> Result<Vec<Event>, Error> {
    let accepted = answer.frequency_ack && answer.data_rate_index_ack;
    let mut event = None;
    handle_mac_response(dev, Cid::PingSlotChannel, false, |dev, request| {
        let MacCommand::PingSlotChannelReq(req) = request else {
            return Err(mismatched_request());
        };
        if accepted {
            let current = &mut dev.mac_state_mut()?.current_parameters;
            current.ping_slot_frequency = req.frequency;
            current.ping_slot_data_rate_index = Some(req.data_rate_index);
        } else {
            warn!("ping slot channel {} rejected", req.frequency);
        }
        event = Some(answer_event(request.clone(), MacCommand::PingSlotChannelAns(*answer), accepted));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}
