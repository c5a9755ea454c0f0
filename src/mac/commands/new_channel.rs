//! NewChannelReq: creation, modification and deletion of uplink channels.

use alloc::vec::Vec;

use super::{answer_event, enqueue_requests, mismatched_request, negotiable_state};
use crate::frequency;
use crate::mac::command::{Cid, MacCommand, NewChannelAns, NewChannelReq};
use crate::mac::device::{Channel, EndDevice, MacState};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::mac::region::channel_plan::dynamic;
use crate::mac::region::Region;
use crate::mac::rejection::{DataRateRange, RejectionSet};
use crate::Error;

/// Channels can only be defined one by one on bands with a dynamic channel plan.
pub(crate) fn band_defines_channels(band: &dyn Region) -> bool {
    band.max_uplink_channels() <= dynamic::MAX_CHANNELS
}

fn rejected(state: &MacState, request: &NewChannelReq) -> bool {
    let range = DataRateRange {
        min_data_rate_index: request.min_data_rate_index,
        max_data_rate_index: request.max_data_rate_index,
    };
    state.rejected_frequencies.contains_sorted(&request.frequency)
        || state
            .rejected_data_rate_ranges
            .get(&request.frequency)
            .map_or(false, |ranges| ranges.contains_sorted(&range))
}

fn differs(current: Option<&Channel>, desired: &Channel) -> bool {
    current.map_or(true, |current| {
        current.uplink_frequency != desired.uplink_frequency
            || current.min_data_rate_index != desired.min_data_rate_index
            || current.max_data_rate_index != desired.max_data_rate_index
    })
}

/// Requests turning the current channels into the desired ones, skipping values the device
/// rejected before.
pub(crate) fn new_channel_requests(state: &MacState) -> Vec<NewChannelReq> {
    let (current, desired) = (&state.current_parameters, &state.desired_parameters);
    let len = current.channels.len().max(desired.channels.len());
    (0..len)
        .filter_map(|i| {
            let channel_index = u8::try_from(i).ok()?;
            let request = match (current.channel(i), desired.channel(i)) {
                (Some(_), None) => NewChannelReq {
                    channel_index,
                    frequency: 0,
                    min_data_rate_index: 0,
                    max_data_rate_index: 0,
                },
                (current, Some(desired)) if differs(current, desired) => NewChannelReq {
                    channel_index,
                    frequency: desired.uplink_frequency,
                    min_data_rate_index: desired.min_data_rate_index,
                    max_data_rate_index: desired.max_data_rate_index,
                },
                _ => return None,
            };
            if rejected(state, &request) {
                trace!("skipping rejected channel {} at {}", channel_index, request.frequency);
                return None;
            }
            Some(request)
        })
        .collect()
}

/// Whether some uplink channel should be created, changed or removed.
pub fn device_needs_new_channel(dev: &EndDevice, band: &dyn Region) -> bool {
    band_defines_channels(band)
        && negotiable_state(dev, Cid::NewChannel)
            .map_or(false, |state| !new_channel_requests(state).is_empty())
}

/// Enqueues as many channel definitions as fit. Definitions with a frequency that cannot be
/// sent are dropped with a generation failure.
pub fn enqueue_new_channel(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    band: &dyn Region,
) -> EnqueueState {
    if !device_needs_new_channel(dev, band) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let mut failures = Vec::new();
    let requests: Vec<MacCommand> = new_channel_requests(state)
        .into_iter()
        .filter(|request| {
            if request.frequency == 0 {
                return true;
            }
            match frequency::validate(request.frequency) {
                Ok(_) => true,
                Err(error) => {
                    warn!("channel {} has an invalid frequency", request.channel_index);
                    failures.push(Event::GenerationFailed { cid: Cid::NewChannel, error });
                    false
                }
            }
        })
        .map(MacCommand::NewChannelReq)
        .collect();
    let mut state = enqueue_requests(dev, Cid::NewChannel, max_down_len, max_up_len, requests);
    failures.append(&mut state.queued_events);
    state.queued_events = failures;
    state
}

/// Applies a definition both fields of which were acknowledged. A rejected frequency or data
/// rate range is remembered and not requested again.
pub fn handle_new_channel_ans(
    dev: &mut EndDevice,
    answer: &NewChannelAns,
) -> Result<Vec<Event>, Error> {
    let accepted = answer.frequency_ack && answer.data_rate_ack;
    let mut event = None;
    handle_mac_response(dev, Cid::NewChannel, false, |dev, request| {
        let MacCommand::NewChannelReq(req) = request else {
            return Err(mismatched_request());
        };
        let state = dev.mac_state_mut()?;
        let index = usize::from(req.channel_index);
        if accepted {
            let channels = &mut state.current_parameters.channels;
            if req.frequency == 0 {
                if let Some(slot) = channels.get_mut(index) {
                    *slot = None;
                }
            } else {
                if channels.len() <= index {
                    channels.resize(index + 1, None);
                }
                channels[index] = Some(Channel {
                    uplink_frequency: req.frequency,
                    downlink_frequency: req.frequency,
                    min_data_rate_index: req.min_data_rate_index,
                    max_data_rate_index: req.max_data_rate_index,
                    enable_uplink: true,
                });
            }
        } else {
            warn!("channel {} at {} rejected", req.channel_index, req.frequency);
            if !answer.frequency_ack {
                state.rejected_frequencies.insert_sorted(req.frequency);
            }
            if !answer.data_rate_ack {
                state.rejected_data_rate_ranges.entry(req.frequency).or_default().insert_sorted(
                    DataRateRange {
                        min_data_rate_index: req.min_data_rate_index,
                        max_data_rate_index: req.max_data_rate_index,
                    },
                );
            }
        }
        event = Some(answer_event(request.clone(), MacCommand::NewChannelAns(*answer), accepted));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::region::{EU868, US915};
    use crate::mac::types::{DeviceClass, MacVersion};
    use alloc::vec;

    fn channel(uplink_frequency: u64) -> Option<Channel> {
        Some(Channel {
            uplink_frequency,
            downlink_frequency: uplink_frequency,
            min_data_rate_index: 0,
            max_data_rate_index: 5,
            enable_uplink: true,
        })
    }

    fn device() -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_3);
        let mut state =
            MacState::new(MacVersion::V1_0_3, DeviceClass::A, Default::default(), Default::default());
        state.current_parameters.channels =
            vec![channel(868_100_000), channel(868_300_000), channel(868_500_000), channel(867_500_000)];
        state.desired_parameters.channels = vec![
            channel(868_100_000),
            channel(868_300_000),
            channel(868_500_000),
            None,
            channel(867_100_000),
        ];
        dev.mac_state = Some(state);
        dev
    }

    #[test]
    fn creation_and_deletion() {
        let dev = device();
        let requests = new_channel_requests(dev.mac_state().unwrap());
        assert_eq!(requests.len(), 2);
        assert_eq!((requests[0].channel_index, requests[0].frequency), (3, 0));
        assert_eq!((requests[1].channel_index, requests[1].frequency), (4, 867_100_000));
        assert!(!device_needs_new_channel(&dev, &US915));
    }

    #[test]
    fn partial_enqueue() {
        let mut dev = device();
        let state = enqueue_new_channel(&mut dev, 6, 10, &EU868);
        assert!(!state.ok);
        assert_eq!(dev.mac_state().unwrap().pending_requests.len(), 1);
    }

    #[test]
    fn accepted_definitions_grow_channels() {
        let mut dev = device();
        assert!(enqueue_new_channel(&mut dev, 12, 4, &EU868).ok);
        let ack = NewChannelAns { frequency_ack: true, data_rate_ack: true };
        handle_new_channel_ans(&mut dev, &ack).unwrap();
        handle_new_channel_ans(&mut dev, &ack).unwrap();
        let state = dev.mac_state().unwrap();
        assert_eq!(state.current_parameters.channels, state.desired_parameters.channels);
        assert!(!device_needs_new_channel(&dev, &EU868));
    }

    #[test]
    fn rejections_are_remembered() {
        let mut dev = device();
        dev.mac_state_mut().unwrap().desired_parameters.channels[3] = channel(867_500_000);
        enqueue_new_channel(&mut dev, 12, 4, &EU868);
        let nack = NewChannelAns { frequency_ack: false, data_rate_ack: false };
        let events = handle_new_channel_ans(&mut dev, &nack).unwrap();
        assert!(matches!(events[..], [Event::AnswerRejected { .. }]));

        let state = dev.mac_state().unwrap();
        assert_eq!(state.rejected_frequencies, [867_100_000]);
        assert_eq!(state.rejected_data_rate_ranges[&867_100_000].len(), 1);
        assert!(!device_needs_new_channel(&dev, &EU868));
    }
}
