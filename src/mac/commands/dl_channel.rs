//! DlChannelReq: downlink frequency of the RX1 window of an existing channel.

use alloc::vec::Vec;

use super::new_channel::band_defines_channels;
use super::{answer_event, enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::frequency;
use crate::mac::command::{Cid, DlChannelAns, DlChannelReq, MacCommand};
use crate::mac::device::{EndDevice, MacState};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::mac::region::Region;
use crate::mac::rejection::RejectionSet;
use crate::Error;

/// A NewChannelReq for the channel is in flight or still to be sent.
fn uplink_frequency_settling(state: &MacState, index: usize) -> bool {
    let pending = state.pending_requests.iter().any(|cmd| {
        matches!(cmd, MacCommand::NewChannelReq(req) if usize::from(req.channel_index) == index)
    });
    let current = state.current_parameters.channel(index).map(|ch| ch.uplink_frequency);
    let desired = state.desired_parameters.channel(index).map(|ch| ch.uplink_frequency);
    pending || current != desired
}

fn dl_channel_requests(state: &MacState) -> Vec<DlChannelReq> {
    let (current, desired) = (&state.current_parameters, &state.desired_parameters);
    desired
        .channels
        .iter()
        .enumerate()
        .filter_map(|(i, desired)| {
            let desired = desired.as_ref()?;
            let current = current.channel(i)?;
            if desired.downlink_frequency == current.downlink_frequency
                || desired.downlink_frequency == 0
                || uplink_frequency_settling(state, i)
            {
                return None;
            }
            if state.rejected_frequencies.contains_sorted(&desired.downlink_frequency) {
                trace!("skipping rejected downlink frequency {}", desired.downlink_frequency);
                return None;
            }
            Some(DlChannelReq {
                channel_index: u8::try_from(i).ok()?,
                frequency: desired.downlink_frequency,
            })
        })
        .collect()
}

/// Whether an existing channel should move its RX1 downlink frequency.
pub fn device_needs_dl_channel(dev: &EndDevice, band: &dyn Region) -> bool {
    band_defines_channels(band)
        && negotiable_state(dev, Cid::DlChannel)
            .map_or(false, |state| !dl_channel_requests(state).is_empty())
}

/// Enqueues as many DlChannelReq as fit.
pub fn enqueue_dl_channel(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    band: &dyn Region,
) -> EnqueueState {
    if !device_needs_dl_channel(dev, band) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let requests = dl_channel_requests(state);
    if let Some(error) = requests.iter().find_map(|req| frequency::validate(req.frequency).err()) {
        return generation_failed(Cid::DlChannel, max_down_len, max_up_len, error);
    }
    let requests = requests.into_iter().map(MacCommand::DlChannelReq).collect();
    enqueue_requests(dev, Cid::DlChannel, max_down_len, max_up_len, requests)
}

/// A rejected frequency is remembered and not requested again.
pub fn handle_dl_channel_ans(dev: &mut EndDevice, answer: &DlChannelAns) -> Result<Vec<Event>, Error> {
    let accepted = answer.channel_index_ack && answer.frequency_ack;
    let mut event = None;
    handle_mac_response(dev, Cid::DlChannel, false, |dev, request| {
        let MacCommand::DlChannelReq(req) = request else {
            return Err(mismatched_request());
        };
        let state = dev.mac_state_mut()?;
        if accepted {
            let Some(Some(channel)) =
                state.current_parameters.channels.get_mut(usize::from(req.channel_index))
            else {
                warn!("downlink frequency acknowledged for unknown channel {}", req.channel_index);
                return Err(Error::CorruptedMacState("acknowledged channel does not exist"));
            };
            channel.downlink_frequency = req.frequency;
        } else {
            warn!("downlink frequency {} of channel {} rejected", req.frequency, req.channel_index);
            if !answer.frequency_ack {
                state.rejected_frequencies.insert_sorted(req.frequency);
            }
        }
        event = Some(answer_event(request.clone(), MacCommand::DlChannelAns(*answer), accepted));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::command::NewChannelReq;
    use crate::mac::device::Channel;
    use crate::mac::region::EU868;
    use crate::mac::types::{DeviceClass, MacVersion};
    use alloc::vec;

    fn channel(uplink_frequency: u64, downlink_frequency: u64) -> Option<Channel> {
        Some(Channel {
            uplink_frequency,
            downlink_frequency,
            min_data_rate_index: 0,
            max_data_rate_index: 5,
            enable_uplink: true,
        })
    }

    fn device(version: MacVersion) -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", version);
        let mut state = MacState::new(version, DeviceClass::A, Default::default(), Default::default());
        state.current_parameters.channels =
            vec![channel(868_100_000, 868_100_000), channel(867_100_000, 867_100_000)];
        state.desired_parameters.channels =
            vec![channel(868_100_000, 869_100_000), channel(867_300_000, 869_300_000)];
        dev.mac_state = Some(state);
        dev
    }

    #[test]
    fn skips_channels_with_settling_uplink() {
        let dev = device(MacVersion::V1_0_3);
        let requests = dl_channel_requests(dev.mac_state().unwrap());
        assert_eq!(requests, [DlChannelReq { channel_index: 0, frequency: 869_100_000 }]);
        assert!(!device_needs_dl_channel(&device(MacVersion::V1_0_1), &EU868));
    }

    #[test]
    fn pending_new_channel_blocks() {
        let mut dev = device(MacVersion::V1_0_3);
        dev.mac_state_mut().unwrap().pending_requests.push(MacCommand::NewChannelReq(NewChannelReq {
            channel_index: 0,
            frequency: 868_100_000,
            min_data_rate_index: 0,
            max_data_rate_index: 5,
        }));
        assert!(!device_needs_dl_channel(&dev, &EU868));
    }

    #[test]
    fn frequency_nack_is_remembered() {
        let mut dev = device(MacVersion::V1_0_3);
        assert!(enqueue_dl_channel(&mut dev, 5, 2, &EU868).ok);
        let nack = DlChannelAns { channel_index_ack: true, frequency_ack: false };
        handle_dl_channel_ans(&mut dev, &nack).unwrap();
        assert_eq!(dev.mac_state().unwrap().rejected_frequencies, [869_100_000]);
        assert!(!device_needs_dl_channel(&dev, &EU868));
    }
}
