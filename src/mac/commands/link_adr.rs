//! LinkADRReq: data rate, TX power, NbTrans and uplink channel mask.
//!
//! A change is sent as a block of requests, one per channel mask block the band needs,
//! all carrying the same data rate, TX power and NbTrans. The block is enqueued whole or
//! not at all. Devices before 1.0.2 answer every request on its own and apply them one by
//! one; later devices apply the block atomically and answer once, with 1.0.2 to 1.0.4
//! allowed to repeat that answer once per request.

use alloc::vec::Vec;

use super::{answer_event, generation_failed, negotiable_state};
use crate::channel_mask::ChMaskCntlPair;
use crate::mac::command::{Cid, LinkAdrAns, LinkAdrReq, MacCommand};
use crate::mac::device::{EndDevice, MacState};
use crate::mac::event::Event;
use crate::mac::packer::{
    enqueue_mac_command, handle_mac_response, handle_mac_response_block, EnqueueState,
};
use crate::mac::region::Region;
use crate::mac::rejection::RejectionSet;
use crate::Error;

/// Data rate and TX power index meaning "keep the current value", from 1.0.4 on.
pub const NO_CHANGE_INDEX: u8 = 15;

/// Whether the channel mask, data rate, TX power or NbTrans should change.
pub fn device_needs_link_adr(dev: &EndDevice, band: &dyn Region) -> bool {
    let Some(state) = negotiable_state(dev, Cid::LinkAdr) else {
        return false;
    };
    let (current, desired) = (&state.current_parameters, &state.desired_parameters);
    let max = band.max_uplink_channels();
    current.uplink_mask(max) != desired.uplink_mask(max)
        || current.adr_data_rate_index != desired.adr_data_rate_index
        || current.adr_tx_power_index != desired.adr_tx_power_index
        || current.adr_nb_trans != desired.adr_nb_trans
}

fn generate(state: &MacState, band: &dyn Region) -> Result<Vec<LinkAdrReq>, Error> {
    let (current, desired) = (&state.current_parameters, &state.desired_parameters);
    let max = band.max_uplink_channels();
    for params in [current, desired] {
        if params.channels.len() > max {
            return Err(Error::TooManyChannels { count: params.channels.len(), max });
        }
    }
    if let Some(index) = desired.channels.iter().position(|channel| {
        matches!(channel, Some(channel) if channel.enable_uplink && channel.uplink_frequency == 0)
    }) {
        return Err(Error::NoUplinkFrequency { index });
    }

    let (current_chs, desired_chs) = (current.uplink_mask(max), desired.uplink_mask(max));
    let mut pairs = band.generate_ch_masks(&current_chs, &desired_chs)?;
    let mask_changed = !pairs.is_empty();
    if !mask_changed {
        pairs = band.describe_ch_mask(&desired_chs)?;
    }

    let max_tx_power_index = band.max_tx_power_index();
    if desired.adr_tx_power_index > max_tx_power_index {
        return Err(Error::InvalidTxPowerIndex {
            index: desired.adr_tx_power_index,
            max: max_tx_power_index,
        });
    }
    let data_rate_index = desired.adr_data_rate_index;
    band.convert_data_rate(data_rate_index)
        .map_err(|_| Error::InvalidDataRateIndex { index: data_rate_index })?;
    let supported = desired.channels.iter().flatten().any(|channel| {
        channel.enable_uplink
            && (channel.min_data_rate_index..=channel.max_data_rate_index).contains(&data_rate_index)
    });
    if !supported {
        return Err(Error::IncompatibleChannelMask { data_rate_index });
    }

    let no_change = state.lorawan_version.supports_link_adr_no_change();
    let dr_rejected = |index: u8| state.rejected_adr_data_rate_indexes.contains_sorted(&index);
    let tx_rejected = |index: u8| state.rejected_adr_tx_power_indexes.contains_sorted(&index);
    let fallback = |index: u8, rejected: &dyn Fn(u8) -> bool| {
        if !rejected(index) {
            Ok(index)
        } else if no_change && !rejected(NO_CHANGE_INDEX) {
            Ok(NO_CHANGE_INDEX)
        } else {
            Err(Error::RejectedParameters)
        }
    };

    let (mut dr, mut tx) = (desired.adr_data_rate_index, desired.adr_tx_power_index);
    if dr_rejected(dr) || tx_rejected(tx) {
        if !mask_changed && desired.adr_nb_trans == current.adr_nb_trans {
            trace!("desired data rate {} or TX power {} rejected", dr, tx);
            return Err(Error::RejectedParameters);
        }
        dr = fallback(current.adr_data_rate_index, &dr_rejected)?;
        tx = fallback(current.adr_tx_power_index, &tx_rejected)?;
    }
    if no_change {
        if dr == current.adr_data_rate_index && !dr_rejected(NO_CHANGE_INDEX) {
            dr = NO_CHANGE_INDEX;
        }
        if tx == current.adr_tx_power_index && !tx_rejected(NO_CHANGE_INDEX) {
            tx = NO_CHANGE_INDEX;
        }
    }

    Ok(pairs
        .into_iter()
        .map(|pair| LinkAdrReq {
            data_rate_index: dr,
            tx_power_index: tx,
            nb_trans: desired.adr_nb_trans,
            channel_mask_control: pair.cntl,
            channel_mask: pair.mask,
        })
        .collect())
}

/// Enqueues the whole block of requests, or nothing if it does not fit.
pub fn enqueue_link_adr(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    band: &dyn Region,
) -> EnqueueState {
    if !device_needs_link_adr(dev, band) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let requests = match generate(state, band) {
        Ok(requests) => requests,
        Err(error) => return generation_failed(Cid::LinkAdr, max_down_len, max_up_len, error),
    };
    let version = state.lorawan_version;
    let answers = if version.link_adr_answer_per_request() || version.allows_duplicate_link_adr_ans()
    {
        requests.len()
    } else {
        1
    };

    let (cmds, enqueue_state) =
        enqueue_mac_command(Cid::LinkAdr, max_down_len, max_up_len, |max_down, max_up| {
            if requests.len() > usize::from(max_down) || answers > usize::from(max_up) {
                trace!("LinkADRReq block of {} does not fit", requests.len());
                return (Vec::new(), 0, Vec::new(), false);
            }
            let cmds: Vec<MacCommand> = requests.into_iter().map(MacCommand::LinkAdrReq).collect();
            let events = cmds.iter().cloned().map(Event::RequestEnqueued).collect();
            (cmds, answers as u16, events, true)
        });
    debug!("enqueued {} LinkADRReq", cmds.len());
    if let Some(state) = dev.mac_state.as_mut() {
        state.pending_requests.extend(cmds);
    }
    enqueue_state
}

/// Applies a LinkADRAns received in the uplink with frame counter `f_cnt_up`.
///
/// `dup_count` is the number of identical answers following this one in the same uplink,
/// which only devices repeating the answer per request may send.
pub fn handle_link_adr_ans(
    dev: &mut EndDevice,
    answer: &LinkAdrAns,
    dup_count: usize,
    f_cnt_up: u32,
    band: &dyn Region,
) -> Result<Vec<Event>, Error> {
    let state = dev.mac_state()?;
    let version = state.lorawan_version;
    let mut block: Vec<LinkAdrReq> = state
        .pending_requests
        .iter()
        .skip_while(|cmd| cmd.cid() != Cid::LinkAdr)
        .map_while(|cmd| match cmd {
            MacCommand::LinkAdrReq(req) => Some(*req),
            _ => None,
        })
        .collect();
    if version.link_adr_answer_per_request() {
        block.truncate(1);
    }
    let Some(last) = block.last().copied() else {
        warn!("LinkADRAns without pending LinkADRReq");
        return Err(Error::RequestNotFound { cid: Cid::LinkAdr });
    };
    if dup_count > 0 && (!version.allows_duplicate_link_adr_ans() || dup_count + 1 > block.len()) {
        warn!("{} duplicate LinkADRAns for {} requests", dup_count, block.len());
        return Err(Error::InvalidPayload { cid: Cid::LinkAdr });
    }

    let pairs: Vec<ChMaskCntlPair> = block
        .iter()
        .map(|req| ChMaskCntlPair { cntl: req.channel_mask_control, mask: req.channel_mask })
        .collect();
    let mask = band.parse_ch_mask(&pairs)?;
    if let Some((index, _)) = mask
        .iter()
        .find(|(index, enabled)| **enabled && state.current_parameters.channel(**index).is_none())
    {
        warn!("LinkADRReq enabled unknown channel {}", index);
        return Err(Error::CorruptedMacState("channel mask enables an unknown channel"));
    }

    if version.link_adr_answer_per_request() {
        handle_mac_response(dev, Cid::LinkAdr, false, |_, _| Ok(()))?;
    } else {
        handle_mac_response_block(dev, Cid::LinkAdr, false, |_, _| Ok(()))?;
    }

    let accepted =
        answer.channel_mask_ack && answer.data_rate_index_ack && answer.tx_power_index_ack;
    let apply_mask = if version.link_adr_answer_per_request() {
        answer.channel_mask_ack
    } else {
        accepted
    };
    let state = dev.mac_state_mut()?;
    if apply_mask {
        for (index, enabled) in mask {
            if let Some(Some(channel)) = state.current_parameters.channels.get_mut(index) {
                channel.enable_uplink = enabled;
            }
        }
    }
    if !answer.data_rate_index_ack {
        warn!("data rate {} rejected", last.data_rate_index);
        state.rejected_adr_data_rate_indexes.insert_sorted(last.data_rate_index);
    }
    if !answer.tx_power_index_ack {
        warn!("TX power {} rejected", last.tx_power_index);
        state.rejected_adr_tx_power_indexes.insert_sorted(last.tx_power_index);
    }
    if accepted {
        let no_change = version.supports_link_adr_no_change();
        let current = &mut state.current_parameters;
        if !(no_change && last.data_rate_index == NO_CHANGE_INDEX) {
            current.adr_data_rate_index = last.data_rate_index;
        }
        if !(no_change && last.tx_power_index == NO_CHANGE_INDEX) {
            current.adr_tx_power_index = last.tx_power_index;
        }
        if last.nb_trans > 0 {
            current.adr_nb_trans = last.nb_trans;
        }
        state.last_adr_change_f_cnt_up = f_cnt_up;
        debug!("LinkADRReq block of {} accepted", block.len());
    }
    Ok(alloc::vec![answer_event(
        MacCommand::LinkAdrReq(last),
        MacCommand::LinkAdrAns(*answer),
        accepted
    )])
}
