//! RelayConfigureFwdLimitReq: token buckets of a serving relay.

use alloc::vec;
use alloc::vec::Vec;

use super::serving;
use crate::mac::command::{Cid, MacCommand, RelayConfigureFwdLimitReq};
use crate::mac::commands::{enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::device::relay::ServingRelayForwardingLimits;
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

fn desired_limits(dev: &EndDevice) -> Option<ServingRelayForwardingLimits> {
    let state = negotiable_state(dev, Cid::RelayConfigureFwdLimit)?;
    let desired = serving(&state.desired_parameters)?.limits.unwrap_or_default();
    let current = serving(&state.current_parameters)
        .and_then(|serving| serving.limits)
        .unwrap_or_default();
    (desired != current).then_some(desired)
}

/// Limits are compared against the desired serving parameters, which RelayConfReq enforces
/// earlier in the same downlink.
pub fn device_needs_relay_configure_fwd_limit(dev: &EndDevice) -> bool {
    desired_limits(dev).is_some()
}

/// Enqueues a RelayConfigureFwdLimitReq carrying the desired limits.
pub fn enqueue_relay_configure_fwd_limit(dev: &mut EndDevice, max_down_len: u16, max_up_len: u16) -> EnqueueState {
    let Some(limits) = desired_limits(dev) else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let request = MacCommand::RelayConfigureFwdLimitReq(RelayConfigureFwdLimitReq {
        reset_limit_counter: limits.reset_behavior,
        join_request_limits: limits.join_requests,
        notify_limits: limits.notifications,
        global_uplink_limits: limits.uplink_messages,
        overall_limits: limits.overall,
    });
    enqueue_requests(dev, Cid::RelayConfigureFwdLimit, max_down_len, max_up_len, vec![request])
}

/// The answer carries no status, receiving it means the limits are in effect.
pub fn handle_relay_configure_fwd_limit_ans(dev: &mut EndDevice) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::RelayConfigureFwdLimit, false, |dev, request| {
        let MacCommand::RelayConfigureFwdLimitReq(req) = request else {
            return Err(mismatched_request());
        };
        let current = &mut dev.mac_state_mut()?.current_parameters;
        let Some(serving) = current.relay.as_mut().and_then(|relay| relay.serving_mut()) else {
            warn!("forwarding limits answered by a device that is not a serving relay");
            return Ok(());
        };
        let limits = ServingRelayForwardingLimits {
            reset_behavior: req.reset_limit_counter,
            join_requests: req.join_request_limits,
            notifications: req.notify_limits,
            uplink_messages: req.global_uplink_limits,
            overall: req.overall_limits,
        };
        serving.limits = Some(limits);
        Ok(())
    })?;
    Ok(vec![Event::AnswerReceived(MacCommand::RelayConfigureFwdLimitAns)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::commands::relay::conf::serving_device;
    use crate::mac::device::relay::{RelayForwardLimits, RelayParameters, RelayResetLimitCounter};
    use crate::mac::types::MacVersion;

    fn device_with_limits() -> EndDevice {
        let mut dev = serving_device(MacVersion::V1_0_4);
        let state = dev.mac_state_mut().unwrap();
        state.current_parameters.relay = state.desired_parameters.relay.clone();
        if let Some(RelayParameters::Serving(serving)) = &mut state.desired_parameters.relay {
            serving.limits = Some(ServingRelayForwardingLimits {
                reset_behavior: RelayResetLimitCounter::Max,
                join_requests: Some(RelayForwardLimits { bucket_size: 2, reload_rate: 10 }),
                ..Default::default()
            });
        }
        dev
    }

    #[test]
    fn empty_limits_need_nothing() {
        let mut dev = device_with_limits();
        assert!(device_needs_relay_configure_fwd_limit(&dev));
        if let Some(RelayParameters::Serving(serving)) = &mut dev.mac_state_mut().unwrap().desired_parameters.relay {
            serving.limits = Some(Default::default());
        }
        assert!(!device_needs_relay_configure_fwd_limit(&dev));
    }

    #[test]
    fn answer_applies_limits() {
        let mut dev = device_with_limits();
        assert!(enqueue_relay_configure_fwd_limit(&mut dev, 6, 1).ok);
        let events = handle_relay_configure_fwd_limit_ans(&mut dev).unwrap();
        assert_eq!(events, [Event::AnswerReceived(MacCommand::RelayConfigureFwdLimitAns)]);
        let state = dev.mac_state().unwrap();
        assert_eq!(state.current_parameters.relay, state.desired_parameters.relay);
        assert!(!device_needs_relay_configure_fwd_limit(&dev));
    }

    #[test]
    fn unsolicited_answer() {
        let mut dev = device_with_limits();
        assert_eq!(
            handle_relay_configure_fwd_limit_ans(&mut dev),
            Err(Error::RequestNotFound { cid: Cid::RelayConfigureFwdLimit })
        );
    }
}
