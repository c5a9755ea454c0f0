//! Per-command negotiation.
//!
//! Network-initiated commands expose `device_needs_*`, which compares current and desired
//! parameters, `enqueue_*`, which turns the difference into requests within the downlink
//! budget, and `handle_*`, which applies the answer. Device-initiated commands only expose
//! `handle_*`, which queues the response.

use alloc::vec::Vec;

use crate::mac::command::{Cid, MacCommand};
use crate::mac::device::{EndDevice, MacState};
use crate::mac::event::Event;
use crate::mac::packer::{enqueue_mac_command, EnqueueState};
use crate::Error;

pub mod adr_param_setup;
pub mod beacon_freq;
pub mod dev_status;
pub mod device_mode;
pub mod device_time;
pub mod dl_channel;
pub mod duty_cycle;
pub mod link_adr;
pub mod link_check;
pub mod new_channel;
pub mod ping_slot_channel;
pub mod ping_slot_info;
pub mod rejoin_param_setup;
pub mod rekey;
pub mod relay;
pub mod reset;
pub mod rx_param_setup;
pub mod rx_timing_setup;
pub mod tx_param_setup;

/// MAC state of a unicast device whose version defines `cid`.
pub(crate) fn negotiable_state(dev: &EndDevice, cid: Cid) -> Option<&MacState> {
    if dev.multicast {
        return None;
    }
    dev.mac_state
        .as_ref()
        .filter(|state| state.lorawan_version >= cid.descriptor().min_version)
}

/// Enqueues as many of `requests` as the budgets admit, in order.
pub(crate) fn enqueue_requests(
    dev: &mut EndDevice,
    cid: Cid,
    max_down_len: u16,
    max_up_len: u16,
    requests: Vec<MacCommand>,
) -> EnqueueState {
    let answered = cid.descriptor().expect_answer;
    let (cmds, state) = enqueue_mac_command(cid, max_down_len, max_up_len, |max_down, max_up| {
        let fit = usize::from(max_down.min(max_up));
        let ok = requests.len() <= fit;
        let cmds: Vec<MacCommand> = requests.into_iter().take(fit).collect();
        let answers = if answered { cmds.len() as u16 } else { 0 };
        let events = cmds.iter().cloned().map(Event::RequestEnqueued).collect();
        (cmds, answers, events, ok)
    });
    debug!("enqueued {} requests of command {}", cmds.len(), cid as u8);
    if let Some(mac_state) = dev.mac_state.as_mut() {
        mac_state.pending_requests.extend(cmds);
    }
    state
}

/// Enqueue outcome of a request that could not be generated.
pub(crate) fn generation_failed(
    cid: Cid,
    max_down_len: u16,
    max_up_len: u16,
    error: Error,
) -> EnqueueState {
    warn!("failed to generate command {}", cid as u8);
    EnqueueState {
        max_down_len,
        max_up_len,
        queued_events: alloc::vec![Event::GenerationFailed { cid, error }],
        ok: true,
    }
}

/// Queues a response for the next downlink.
pub(crate) fn queue_response(state: &mut MacState, response: MacCommand) -> Event {
    state.queued_responses.push(response.clone());
    Event::AnswerEnqueued(response)
}

pub(crate) fn answer_event(request: MacCommand, answer: MacCommand, accepted: bool) -> Event {
    if accepted {
        Event::AnswerAccepted { request, answer }
    } else {
        Event::AnswerRejected { request, answer }
    }
}

/// A pending request matched by identifier is not of the expected kind.
pub(crate) fn mismatched_request() -> Error {
    Error::CorruptedMacState("pending request does not match its identifier")
}
