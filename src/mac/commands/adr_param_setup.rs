//! ADRParamSetupReq: ADR_ACK_LIMIT and ADR_ACK_DELAY exponents.

use alloc::vec;
use alloc::vec::Vec;

use super::{enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::command::{AdrParamSetupReq, Cid, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

/// Whether the desired ADR_ACK limit or delay differs from the current one.
pub fn device_needs_adr_param_setup(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::AdrParamSetup).map_or(false, |state| {
        let (current, desired) = (&state.current_parameters, &state.desired_parameters);
        let differs = |desired: Option<u8>, current: Option<u8>| {
            desired.is_some() && desired != current
        };
        differs(desired.adr_ack_limit_exponent, current.adr_ack_limit_exponent)
            || differs(desired.adr_ack_delay_exponent, current.adr_ack_delay_exponent)
    })
}

/// Enqueues an ADRParamSetupReq carrying the desired exponents.
pub fn enqueue_adr_param_setup(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
) -> EnqueueState {
    if !device_needs_adr_param_setup(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let (current, desired) = (&state.current_parameters, &state.desired_parameters);
    let request = MacCommand::AdrParamSetupReq(AdrParamSetupReq {
        adr_ack_limit_exponent: desired
            .adr_ack_limit_exponent
            .or(current.adr_ack_limit_exponent)
            .unwrap_or_default(),
        adr_ack_delay_exponent: desired
            .adr_ack_delay_exponent
            .or(current.adr_ack_delay_exponent)
            .unwrap_or_default(),
    });
    enqueue_requests(dev, Cid::AdrParamSetup, max_down_len, max_up_len, vec![request])
}

/// Applies the requested exponents.
pub fn handle_adr_param_setup_ans(dev: &mut EndDevice) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::AdrParamSetup, false, |dev, request| {
        let MacCommand::AdrParamSetupReq(request) = request else {
            return Err(mismatched_request());
        };
        let current = &mut dev.mac_state_mut()?.current_parameters;
        current.adr_ack_limit_exponent = Some(request.adr_ack_limit_exponent);
        current.adr_ack_delay_exponent = Some(request.adr_ack_delay_exponent);
        Ok(())
    })?;
    Ok(vec![Event::AnswerReceived(MacCommand::AdrParamSetupAns)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::MacState;
    use crate::mac::types::{DeviceClass, MacVersion};

    fn device(version: MacVersion) -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", version);
        let mut state = MacState::new(version, DeviceClass::A, Default::default(), Default::default());
        state.current_parameters.adr_ack_limit_exponent = Some(6);
        state.current_parameters.adr_ack_delay_exponent = Some(5);
        state.desired_parameters.adr_ack_limit_exponent = Some(8);
        dev.mac_state = Some(state);
        dev
    }

    #[test]
    fn only_for_1_1() {
        assert!(!device_needs_adr_param_setup(&device(MacVersion::V1_0_4)));
        assert!(device_needs_adr_param_setup(&device(MacVersion::V1_1)));
    }

    #[test]
    fn unset_exponent_keeps_current() {
        let mut dev = device(MacVersion::V1_1);
        assert!(enqueue_adr_param_setup(&mut dev, 2, 1).ok);
        assert_eq!(
            dev.mac_state().unwrap().pending_requests,
            [MacCommand::AdrParamSetupReq(AdrParamSetupReq {
                adr_ack_limit_exponent: 8,
                adr_ack_delay_exponent: 5,
            })]
        );
        handle_adr_param_setup_ans(&mut dev).unwrap();
        assert!(!device_needs_adr_param_setup(&dev));
    }
}
