//! DutyCycleReq: aggregated transmit duty cycle limit.

use alloc::vec;
use alloc::vec::Vec;

use super::{enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::command::{Cid, DutyCycleReq, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

/// Whether the desired maximum duty cycle differs from the current one.
pub fn device_needs_duty_cycle(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::DutyCycle).map_or(false, |state| {
        state.desired_parameters.max_duty_cycle != state.current_parameters.max_duty_cycle
    })
}

/// Enqueues a DutyCycleReq carrying the desired maximum duty cycle.
pub fn enqueue_duty_cycle(dev: &mut EndDevice, max_down_len: u16, max_up_len: u16) -> EnqueueState {
    if !device_needs_duty_cycle(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let request = MacCommand::DutyCycleReq(DutyCycleReq {
        max_duty_cycle: state.desired_parameters.max_duty_cycle,
    });
    enqueue_requests(dev, Cid::DutyCycle, max_down_len, max_up_len, vec![request])
}

/// Applies the requested maximum duty cycle.
pub fn handle_duty_cycle_ans(dev: &mut EndDevice) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::DutyCycle, false, |dev, request| {
        let MacCommand::DutyCycleReq(request) = request else {
            return Err(mismatched_request());
        };
        dev.mac_state_mut()?.current_parameters.max_duty_cycle = request.max_duty_cycle;
        Ok(())
    })?;
    Ok(vec![Event::AnswerReceived(MacCommand::DutyCycleAns)])
}
