//! RxParamSetupReq: RX1 data rate offset and RX2 channel.
//!
//! The three fields are accepted or rejected together.

use alloc::vec;
use alloc::vec::Vec;

use super::{answer_event, enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::frequency;
use crate::mac::command::{Cid, MacCommand, RxParamSetupAns, RxParamSetupReq};
use crate::mac::device::{EndDevice, MacParameters};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::mac::region::Region;
use crate::Error;

/// Whether the RX1 offset or the RX2 data rate or frequency should change.
pub fn device_needs_rx_param_setup(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RxParamSetup).map_or(false, |state| {
        let (current, desired) = (&state.current_parameters, &state.desired_parameters);
        desired.rx1_data_rate_offset != current.rx1_data_rate_offset
            || desired.rx2_data_rate_index != current.rx2_data_rate_index
            || desired.rx2_frequency != current.rx2_frequency
    })
}

fn generate(desired: &MacParameters, band: &dyn Region) -> Result<RxParamSetupReq, Error> {
    if desired.rx1_data_rate_offset > band.max_rx1_data_rate_offset() {
        return Err(crate::mac::region::Error::UnsupportedRx1DROffset(desired.rx1_data_rate_offset)
            .into());
    }
    band.convert_data_rate(desired.rx2_data_rate_index)
        .map_err(|_| Error::InvalidDataRateIndex { index: desired.rx2_data_rate_index })?;
    Ok(RxParamSetupReq {
        rx1_data_rate_offset: desired.rx1_data_rate_offset,
        rx2_data_rate_index: desired.rx2_data_rate_index,
        rx2_frequency: frequency::validate(desired.rx2_frequency)?,
    })
}

/// Enqueues an RxParamSetupReq after checking the offset and data rate against the band.
pub fn enqueue_rx_param_setup(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    band: &dyn Region,
) -> EnqueueState {
    if !device_needs_rx_param_setup(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    match generate(&state.desired_parameters, band) {
        Ok(request) => enqueue_requests(
            dev,
            Cid::RxParamSetup,
            max_down_len,
            max_up_len,
            vec![MacCommand::RxParamSetupReq(request)],
        ),
        Err(error) => generation_failed(Cid::RxParamSetup, max_down_len, max_up_len, error),
    }
}

/// Applies the request only if all three fields were acknowledged.
pub fn handle_rx_param_setup_ans(
    dev: &mut EndDevice,
    answer: &RxParamSetupAns,
) -> Result<Vec<Event>, Error> {
    let accepted =
        answer.rx1_data_rate_offset_ack && answer.rx2_data_rate_index_ack && answer.rx2_frequency_ack;
    let mut event = None;
    handle_mac_response(dev, Cid::RxParamSetup, false, |dev, request| {
        let MacCommand::RxParamSetupReq(req) = request else {
            return Err(mismatched_request());
        };
        if accepted {
            let current = &mut dev.mac_state_mut()?.current_parameters;
            current.rx1_data_rate_offset = req.rx1_data_rate_offset;
            current.rx2_data_rate_index = req.rx2_data_rate_index;
            current.rx2_frequency = req.rx2_frequency;
        } else {
            warn!(
                "RxParamSetupReq rejected: offset {}, data rate {}, frequency {}",
                answer.rx1_data_rate_offset_ack,
                answer.rx2_data_rate_index_ack,
                answer.rx2_frequency_ack
            );
        }
        event = Some(answer_event(
            request.clone(),
            MacCommand::RxParamSetupAns(*answer),
            accepted,
        ));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}
