//! RelayConfReq: turns a device into a serving relay, or back into a plain device.

use alloc::vec;
use alloc::vec::Vec;

use super::{serving, validate_second_channel};
use crate::mac::command::{Cid, MacCommand, RelayConfAns, RelayConfReq, RelayConfiguration};
use crate::mac::commands::{answer_event, enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::mac::device::relay::RelayParameters;
use crate::mac::device::{EndDevice, MacParameters};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

fn configuration(params: &MacParameters) -> Option<RelayConfiguration> {
    serving(params).map(|serving| RelayConfiguration {
        second_channel: serving.second_channel,
        default_channel_index: serving.default_channel_index,
        cad_periodicity: serving.cad_periodicity,
    })
}

/// Whether the serving relay configuration should change.
pub fn device_needs_relay_conf(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RelayConf).map_or(false, |state| {
        configuration(&state.desired_parameters) != configuration(&state.current_parameters)
    })
}

/// Enqueues a RelayConfReq carrying the desired serving parameters.
pub fn enqueue_relay_conf(dev: &mut EndDevice, max_down_len: u16, max_up_len: u16) -> EnqueueState {
    if !device_needs_relay_conf(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let configuration = configuration(&state.desired_parameters);
    if let Err(error) = validate_second_channel(configuration.as_ref().and_then(|c| c.second_channel.as_ref())) {
        return generation_failed(Cid::RelayConf, max_down_len, max_up_len, error);
    }
    let request = MacCommand::RelayConfReq(RelayConfReq { configuration });
    enqueue_requests(dev, Cid::RelayConf, max_down_len, max_up_len, vec![request])
}

/// Forwarding rules and limits of an already serving relay survive a reconfiguration.
pub fn handle_relay_conf_ans(dev: &mut EndDevice, answer: &RelayConfAns) -> Result<Vec<Event>, Error> {
    let accepted = answer.accepted();
    let mut event = None;
    handle_mac_response(dev, Cid::RelayConf, false, |dev, request| {
        let MacCommand::RelayConfReq(req) = request else {
            return Err(mismatched_request());
        };
        let current = &mut dev.mac_state_mut()?.current_parameters;
        match (accepted, req.configuration) {
            (false, _) => warn!("relay configuration rejected"),
            (true, None) => {
                info!("relay disabled");
                current.relay = None;
            }
            (true, Some(configuration)) => {
                let mut serving = current
                    .relay
                    .take()
                    .and_then(|relay| match relay {
                        RelayParameters::Serving(serving) => Some(serving),
                        RelayParameters::Served(_) => None,
                    })
                    .unwrap_or_default();
                serving.second_channel = configuration.second_channel;
                serving.default_channel_index = configuration.default_channel_index;
                serving.cad_periodicity = configuration.cad_periodicity;
                current.relay = Some(RelayParameters::Serving(serving));
            }
        }
        event = Some(answer_event(request.clone(), MacCommand::RelayConfAns(*answer), accepted));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}

#[cfg(test)]
pub(crate) fn serving_device(version: crate::mac::types::MacVersion) -> EndDevice {
    use crate::mac::device::relay::{RelaySecondChannel, ServingRelayParameters};
    use crate::mac::device::MacState;
    use crate::mac::types::DeviceClass;

    let mut dev = EndDevice::new(Default::default(), "EU_863_870", version);
    let mut state = MacState::new(version, DeviceClass::A, Default::default(), Default::default());
    state.desired_parameters.relay = Some(RelayParameters::Serving(ServingRelayParameters {
        second_channel: Some(RelaySecondChannel {
            ack_offset: 2,
            data_rate_index: 3,
            frequency: 868_300_000,
        }),
        default_channel_index: 1,
        cad_periodicity: 4,
        ..Default::default()
    }));
    dev.mac_state = Some(state);
    dev
}
