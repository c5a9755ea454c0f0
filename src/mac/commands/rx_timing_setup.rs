//! RxTimingSetupReq: delay of the first receive window.

use alloc::vec;
use alloc::vec::Vec;

use super::{enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::command::{Cid, MacCommand, RxTimingSetupReq};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

/// Whether the desired RX1 delay differs from the current one.
pub fn device_needs_rx_timing_setup(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RxTimingSetup).map_or(false, |state| {
        state.desired_parameters.rx1_delay != state.current_parameters.rx1_delay
    })
}

/// Enqueues an RxTimingSetupReq carrying the desired RX1 delay.
pub fn enqueue_rx_timing_setup(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
) -> EnqueueState {
    if !device_needs_rx_timing_setup(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let request =
        MacCommand::RxTimingSetupReq(RxTimingSetupReq { delay: state.desired_parameters.rx1_delay });
    enqueue_requests(dev, Cid::RxTimingSetup, max_down_len, max_up_len, vec![request])
}

/// Applies the requested RX1 delay.
pub fn handle_rx_timing_setup_ans(dev: &mut EndDevice) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::RxTimingSetup, false, |dev, request| {
        let MacCommand::RxTimingSetupReq(request) = request else {
            return Err(mismatched_request());
        };
        dev.mac_state_mut()?.current_parameters.rx1_delay = request.delay;
        Ok(())
    })?;
    Ok(vec![Event::AnswerReceived(MacCommand::RxTimingSetupAns)])
}
