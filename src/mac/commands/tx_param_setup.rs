//! TxParamSetupReq: maximum EIRP and dwell time limits.

use alloc::vec;
use alloc::vec::Vec;

use super::{enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::command::{Cid, DeviceEirp, MacCommand, TxParamSetupReq};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::mac::region::Region;
use crate::Error;

/// EIRP is compared after quantization, so that a value the table cannot express settles
/// once the closest entry was accepted.
pub fn device_needs_tx_param_setup(dev: &EndDevice, band: &dyn Region) -> bool {
    if !band.supports_tx_param_setup() {
        return false;
    }
    negotiable_state(dev, Cid::TxParamSetup).map_or(false, |state| {
        let (current, desired) = (&state.current_parameters, &state.desired_parameters);
        let dwell_time_differs = |desired: Option<bool>, current: Option<bool>| {
            desired.is_some() && desired != current
        };
        DeviceEirp::from_dbm(desired.max_eirp) != DeviceEirp::from_dbm(current.max_eirp)
            || dwell_time_differs(desired.uplink_dwell_time, current.uplink_dwell_time)
            || dwell_time_differs(desired.downlink_dwell_time, current.downlink_dwell_time)
    })
}

/// Enqueues a TxParamSetupReq with the quantized EIRP and dwell times.
pub fn enqueue_tx_param_setup(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    band: &dyn Region,
) -> EnqueueState {
    if !device_needs_tx_param_setup(dev, band) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let (current, desired) = (&state.current_parameters, &state.desired_parameters);
    let request = MacCommand::TxParamSetupReq(TxParamSetupReq {
        max_eirp_index: DeviceEirp::from_dbm(desired.max_eirp),
        uplink_dwell_time: desired.uplink_dwell_time.or(current.uplink_dwell_time).unwrap_or(false),
        downlink_dwell_time: desired
            .downlink_dwell_time
            .or(current.downlink_dwell_time)
            .unwrap_or(false),
    });
    enqueue_requests(dev, Cid::TxParamSetup, max_down_len, max_up_len, vec![request])
}

/// Applies the requested EIRP and dwell times.
pub fn handle_tx_param_setup_ans(dev: &mut EndDevice) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::TxParamSetup, false, |dev, request| {
        let MacCommand::TxParamSetupReq(request) = request else {
            return Err(mismatched_request());
        };
        let current = &mut dev.mac_state_mut()?.current_parameters;
        current.max_eirp = request.max_eirp_index.to_dbm();
        current.uplink_dwell_time = Some(request.uplink_dwell_time);
        current.downlink_dwell_time = Some(request.downlink_dwell_time);
        Ok(())
    })?;
    Ok(vec![Event::AnswerReceived(MacCommand::TxParamSetupAns)])
}
