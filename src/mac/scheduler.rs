//! Building the MAC commands of a downlink.
//!
//! Queued answers go first, then requests in a fixed order. Requests that do not fit wait for
//! the next downlink opportunity.

use alloc::vec::Vec;
use core::time::Duration;

use crate::mac::adr::{adapt_data_rate, device_should_adapt_data_rate};
use crate::mac::command::{Cid, MacCommand};
use crate::mac::commands::relay::{
    conf, configure_fwd_limit, ctrl_uplink_list, end_device_conf, update_uplink_list, RelayKeyService,
};
use crate::mac::commands::{
    adr_param_setup, beacon_freq, dev_status, dl_channel, duty_cycle, link_adr, new_channel,
    ping_slot_channel, rejoin_param_setup, rx_param_setup, rx_timing_setup, tx_param_setup,
};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::packer::EnqueueState;
use crate::mac::region::Region;
use crate::mac::settings::MacSettings;

/// Collaborators the request generators read from.
#[derive(Clone, Copy)]
pub struct DownlinkContext<'a> {
    /// Band of the device's frequency plan.
    pub band: &'a dyn Region,
    /// Network-wide MAC settings.
    pub defaults: &'a MacSettings,
    /// Needed to install relay forwarding rules.
    pub relay_keys: Option<&'a dyn RelayKeyService>,
}

/// Order in which requests are generated.
///
/// NewChannelReq precedes LinkADRReq so that masks can enable the new channels. Relay
/// configuration precedes its limits, which precede the forwarding rules.
pub const ENQUEUE_ORDER: [Cid; 17] = [
    Cid::DutyCycle,
    Cid::RxParamSetup,
    Cid::DevStatus,
    Cid::NewChannel,
    Cid::DlChannel,
    Cid::RxTimingSetup,
    Cid::PingSlotChannel,
    Cid::BeaconFreq,
    Cid::TxParamSetup,
    Cid::AdrParamSetup,
    Cid::LinkAdr,
    Cid::RejoinParamSetup,
    Cid::RelayConf,
    Cid::RelayEndDeviceConf,
    Cid::RelayConfigureFwdLimit,
    Cid::RelayCtrlUplinkList,
    Cid::RelayUpdateUplinkList,
];

fn enqueue(
    cid: Cid,
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    transmit_at: Duration,
    ctx: &DownlinkContext<'_>,
) -> EnqueueState {
    let (d, u) = (max_down_len, max_up_len);
    match cid {
        Cid::DutyCycle => duty_cycle::enqueue_duty_cycle(dev, d, u),
        Cid::RxParamSetup => rx_param_setup::enqueue_rx_param_setup(dev, d, u, ctx.band),
        Cid::DevStatus => dev_status::enqueue_dev_status(dev, d, u, ctx.defaults, transmit_at),
        Cid::NewChannel => new_channel::enqueue_new_channel(dev, d, u, ctx.band),
        Cid::DlChannel => dl_channel::enqueue_dl_channel(dev, d, u, ctx.band),
        Cid::RxTimingSetup => rx_timing_setup::enqueue_rx_timing_setup(dev, d, u),
        Cid::PingSlotChannel => ping_slot_channel::enqueue_ping_slot_channel(dev, d, u, ctx.band),
        Cid::BeaconFreq => beacon_freq::enqueue_beacon_freq(dev, d, u),
        Cid::TxParamSetup => tx_param_setup::enqueue_tx_param_setup(dev, d, u, ctx.band),
        Cid::AdrParamSetup => adr_param_setup::enqueue_adr_param_setup(dev, d, u),
        Cid::LinkAdr => link_adr::enqueue_link_adr(dev, d, u, ctx.band),
        Cid::RejoinParamSetup => rejoin_param_setup::enqueue_rejoin_param_setup(dev, d, u),
        Cid::RelayConf => conf::enqueue_relay_conf(dev, d, u),
        Cid::RelayEndDeviceConf => end_device_conf::enqueue_relay_end_device_conf(dev, d, u),
        Cid::RelayConfigureFwdLimit => configure_fwd_limit::enqueue_relay_configure_fwd_limit(dev, d, u),
        Cid::RelayCtrlUplinkList => ctrl_uplink_list::enqueue_relay_ctrl_uplink_list(dev, d, u),
        Cid::RelayUpdateUplinkList => {
            update_uplink_list::enqueue_relay_update_uplink_list(dev, d, u, ctx.relay_keys)
        }
        _ => EnqueueState::unchanged(d, u),
    }
}

/// Moves as many queued answers as fit in `max_down_len` out of the queue, in order.
fn take_queued_responses(dev: &mut EndDevice, max_down_len: &mut u16) -> (Vec<MacCommand>, bool) {
    let Some(state) = dev.mac_state.as_mut() else {
        return (Vec::new(), true);
    };
    let mut fit = 0;
    for response in &state.queued_responses {
        let len = response.wire_len() as u16;
        if len > *max_down_len {
            break;
        }
        *max_down_len -= len;
        fit += 1;
    }
    let responses: Vec<MacCommand> = state.queued_responses.drain(..fit).collect();
    (responses, state.queued_responses.is_empty())
}

/// Builds the MAC commands of the next downlink of `dev`.
///
/// `max_down_len` is the FOpts budget of the downlink and `max_up_len` the budget for the
/// answers of the next uplink. ADR runs first so that LinkADRReq targets fresh parameters.
/// Requests still pending from an earlier downlink are dropped and generated again if still
/// needed.
///
/// Returns the commands, the events to publish once the device is committed, and whether
/// everything that needed sending did fit.
pub fn build_downlink_mac_commands(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    transmit_at: Duration,
    ctx: &DownlinkContext<'_>,
) -> (Vec<MacCommand>, Vec<Event>, bool) {
    let mut events = Vec::new();
    if dev.mac_state.is_none() {
        warn!("no MAC state to build downlink commands from");
        return (Vec::new(), events, true);
    }
    if device_should_adapt_data_rate(dev, ctx.defaults, ctx.band) {
        if let Err(error) = adapt_data_rate(dev, ctx.band, ctx.defaults) {
            warn!("failed to adapt data rate");
            events.push(Event::GenerationFailed { cid: Cid::LinkAdr, error });
        }
    }
    if let Some(state) = dev.mac_state.as_mut() {
        if !state.pending_requests.is_empty() {
            debug!("dropping {} unanswered requests", state.pending_requests.len());
            state.pending_requests.clear();
        }
    }

    let mut max_down_len = max_down_len;
    let mut max_up_len = max_up_len;
    let (mut cmds, mut ok) = take_queued_responses(dev, &mut max_down_len);
    if ok {
        for cid in ENQUEUE_ORDER {
            let state = enqueue(cid, dev, max_down_len, max_up_len, transmit_at, ctx);
            max_down_len = state.max_down_len;
            max_up_len = state.max_up_len;
            events.extend(state.queued_events);
            if !state.ok {
                trace!("downlink full at command {}", cid as u8);
                ok = false;
                break;
            }
        }
    }
    if let Some(state) = dev.mac_state.as_ref() {
        cmds.extend(state.pending_requests.iter().cloned());
    }
    debug!("built {} downlink MAC commands, {} bytes left", cmds.len(), max_down_len);
    (cmds, events, ok)
}
