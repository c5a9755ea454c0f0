//! RelayEndDeviceConfReq: makes a device send its uplinks through a relay.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use super::{served, validate_second_channel};
use crate::mac::command::{Cid, MacCommand, RelayEndDeviceConfAns, RelayEndDeviceConfReq, RelayEndDeviceConfiguration};
use crate::mac::commands::{answer_event, enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::mac::device::relay::{RelayParameters, ServedRelayParameters};
use crate::mac::device::{EndDevice, MacParameters};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

fn configuration(params: &MacParameters) -> Option<RelayEndDeviceConfiguration> {
    served(params).map(|served| RelayEndDeviceConfiguration {
        mode: served.mode,
        backoff: served.backoff,
        second_channel: served.second_channel,
    })
}

/// Whether the served device's relay configuration should change.
pub fn device_needs_relay_end_device_conf(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RelayEndDeviceConf).map_or(false, |state| {
        configuration(&state.desired_parameters) != configuration(&state.current_parameters)
    })
}

/// Enqueues an EndDeviceConfReq carrying the desired served parameters.
pub fn enqueue_relay_end_device_conf(dev: &mut EndDevice, max_down_len: u16, max_up_len: u16) -> EnqueueState {
    if !device_needs_relay_end_device_conf(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let configuration = configuration(&state.desired_parameters);
    if let Err(error) = validate_second_channel(configuration.as_ref().and_then(|c| c.second_channel.as_ref())) {
        return generation_failed(Cid::RelayEndDeviceConf, max_down_len, max_up_len, error);
    }
    let request = MacCommand::RelayEndDeviceConfReq(RelayEndDeviceConfReq { configuration });
    enqueue_requests(dev, Cid::RelayEndDeviceConf, max_down_len, max_up_len, vec![request])
}

/// Makes the requested configuration current once every field is acknowledged.
pub fn handle_relay_end_device_conf_ans(
    dev: &mut EndDevice,
    answer: &RelayEndDeviceConfAns,
) -> Result<Vec<Event>, Error> {
    let accepted = answer.accepted();
    let mut event = None;
    handle_mac_response(dev, Cid::RelayEndDeviceConf, false, |dev, request| {
        let MacCommand::RelayEndDeviceConfReq(req) = request else {
            return Err(mismatched_request());
        };
        let state = dev.mac_state_mut()?;
        match (accepted, req.configuration) {
            (false, _) => warn!("relay end device configuration rejected"),
            (true, None) => state.current_parameters.relay = None,
            (true, Some(configuration)) => {
                let serving_device_id = served(&state.desired_parameters)
                    .map(|served| served.serving_device_id.clone())
                    .unwrap_or_else(String::new);
                state.current_parameters.relay = Some(RelayParameters::Served(ServedRelayParameters {
                    mode: configuration.mode,
                    backoff: configuration.backoff,
                    second_channel: configuration.second_channel,
                    serving_device_id,
                }));
            }
        }
        event = Some(answer_event(request.clone(), MacCommand::RelayEndDeviceConfAns(*answer), accepted));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::relay::{RelayEndDeviceMode, RelaySecondChannel};
    use crate::mac::device::MacState;
    use crate::mac::types::{DeviceClass, MacVersion};
    use alloc::string::ToString;

    fn device() -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_4);
        let mut state = MacState::new(MacVersion::V1_0_4, DeviceClass::A, Default::default(), Default::default());
        state.desired_parameters.relay = Some(RelayParameters::Served(ServedRelayParameters {
            mode: RelayEndDeviceMode::Dynamic { smart_enable_level: 2 },
            backoff: 8,
            second_channel: None,
            serving_device_id: "relay-1".to_string(),
        }));
        dev.mac_state = Some(state);
        dev
    }

    fn answer(ack: bool) -> RelayEndDeviceConfAns {
        RelayEndDeviceConfAns {
            second_channel_frequency_ack: true,
            second_channel_ack_offset_ack: true,
            second_channel_data_rate_index_ack: true,
            second_channel_index_ack: true,
            backoff_ack: ack,
        }
    }

    #[test]
    fn accepted_configuration_records_serving_device() {
        let mut dev = device();
        assert!(enqueue_relay_end_device_conf(&mut dev, 7, 2).ok);
        handle_relay_end_device_conf_ans(&mut dev, &answer(true)).unwrap();
        let state = dev.mac_state().unwrap();
        assert_eq!(state.current_parameters.relay, state.desired_parameters.relay);
        assert!(!device_needs_relay_end_device_conf(&dev));
    }

    #[test]
    fn backoff_nack_rejects() {
        let mut dev = device();
        assert!(enqueue_relay_end_device_conf(&mut dev, 7, 2).ok);
        let events = handle_relay_end_device_conf_ans(&mut dev, &answer(false)).unwrap();
        assert!(matches!(events[..], [Event::AnswerRejected { .. }]));
        assert_eq!(dev.mac_state().unwrap().current_parameters.relay, None);
    }

    #[test]
    fn unrepresentable_second_channel() {
        let mut dev = device();
        if let Some(RelayParameters::Served(served)) = &mut dev.mac_state_mut().unwrap().desired_parameters.relay {
            served.second_channel =
                Some(RelaySecondChannel { ack_offset: 0, data_rate_index: 3, frequency: 868_300_001 });
        }
        let state = enqueue_relay_end_device_conf(&mut dev, 7, 2);
        assert!(state.ok);
        assert_eq!(
            state.queued_events,
            [Event::GenerationFailed {
                cid: Cid::RelayEndDeviceConf,
                error: Error::InvalidFrequency { frequency: 868_300_001 },
            }]
        );
        assert!(dev.mac_state().unwrap().pending_requests.is_empty());
    }
}
