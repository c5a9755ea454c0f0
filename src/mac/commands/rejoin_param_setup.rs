//! RejoinParamSetupReq: periodicity of type 0 rejoin requests.

use alloc::vec;
use alloc::vec::Vec;

use super::{answer_event, enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::command::{Cid, MacCommand, RejoinParamSetupAns, RejoinParamSetupReq};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

/// Whether the desired rejoin periodicities differ from the current ones.
pub fn device_needs_rejoin_param_setup(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RejoinParamSetup).map_or(false, |state| {
        let (current, desired) = (&state.current_parameters, &state.desired_parameters);
        desired.rejoin_time_periodicity != current.rejoin_time_periodicity
            || desired.rejoin_count_periodicity != current.rejoin_count_periodicity
    })
}

/// Enqueues a RejoinParamSetupReq carrying the desired periodicities.
pub fn enqueue_rejoin_param_setup(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
) -> EnqueueState {
    if !device_needs_rejoin_param_setup(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let request = MacCommand::RejoinParamSetupReq(RejoinParamSetupReq {
        max_time_exponent: state.desired_parameters.rejoin_time_periodicity,
        max_count_exponent: state.desired_parameters.rejoin_count_periodicity,
    });
    enqueue_requests(dev, Cid::RejoinParamSetup, max_down_len, max_up_len, vec![request])
}

/// The count periodicity is always applied. A rejected time periodicity is given up on:
/// the desired value falls back to the current one.
pub fn handle_rejoin_param_setup_ans(
    dev: &mut EndDevice,
    answer: &RejoinParamSetupAns,
) -> Result<Vec<Event>, Error> {
    let mut event = None;
    handle_mac_response(dev, Cid::RejoinParamSetup, false, |dev, request| {
        let MacCommand::RejoinParamSetupReq(req) = request else {
            return Err(mismatched_request());
        };
        let state = dev.mac_state_mut()?;
        state.current_parameters.rejoin_count_periodicity = req.max_count_exponent;
        if answer.max_time_exponent_ack {
            state.current_parameters.rejoin_time_periodicity = req.max_time_exponent;
        } else {
            warn!("rejoin time periodicity {} rejected", req.max_time_exponent);
            state.desired_parameters.rejoin_time_periodicity =
                state.current_parameters.rejoin_time_periodicity;
        }
        event = Some(answer_event(
            request.clone(),
            MacCommand::RejoinParamSetupAns(*answer),
            answer.max_time_exponent_ack,
        ));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}
