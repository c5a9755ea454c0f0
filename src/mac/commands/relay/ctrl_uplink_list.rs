//! RelayCtrlUplinkListReq: removes forwarding rules the relay should no longer hold.

use alloc::vec::Vec;

use super::serving;
use crate::mac::command::{
    Cid, MacCommand, RelayCtrlUplinkListAction, RelayCtrlUplinkListAns, RelayCtrlUplinkListReq,
};
use crate::mac::commands::{answer_event, enqueue_requests, mismatched_request, negotiable_state};
use crate::mac::device::relay::MAX_UPLINK_FORWARDING_RULES;
use crate::mac::device::{EndDevice, MacState};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

fn removal_requests(state: &MacState) -> Vec<RelayCtrlUplinkListReq> {
    let (Some(current), Some(desired)) =
        (serving(&state.current_parameters), serving(&state.desired_parameters))
    else {
        return Vec::new();
    };
    current
        .uplink_forwarding_rules
        .iter()
        .enumerate()
        .take(MAX_UPLINK_FORWARDING_RULES)
        .filter(|(i, rule)| rule.is_some() && desired.rule(*i).is_none())
        .map(|(i, _)| RelayCtrlUplinkListReq {
            rule_index: i as u8,
            action: RelayCtrlUplinkListAction::RemoveTrustedEndDevice,
        })
        .collect()
}

/// Whether the relay holds forwarding rules the network no longer wants.
pub fn device_needs_relay_ctrl_uplink_list(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RelayCtrlUplinkList).map_or(false, |state| !removal_requests(state).is_empty())
}

/// Enqueues as many rule removals as fit.
pub fn enqueue_relay_ctrl_uplink_list(dev: &mut EndDevice, max_down_len: u16, max_up_len: u16) -> EnqueueState {
    if !device_needs_relay_ctrl_uplink_list(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let requests = removal_requests(state)
        .into_iter()
        .map(MacCommand::RelayCtrlUplinkListReq)
        .collect();
    enqueue_requests(dev, Cid::RelayCtrlUplinkList, max_down_len, max_up_len, requests)
}

/// An acknowledged read records the WFCnt the relay holds for the rule.
pub fn handle_relay_ctrl_uplink_list_ans(
    dev: &mut EndDevice,
    answer: &RelayCtrlUplinkListAns,
) -> Result<Vec<Event>, Error> {
    let accepted = answer.rule_index_ack;
    let mut event = None;
    handle_mac_response(dev, Cid::RelayCtrlUplinkList, false, |dev, request| {
        let MacCommand::RelayCtrlUplinkListReq(req) = request else {
            return Err(mismatched_request());
        };
        let index = usize::from(req.rule_index);
        let current = &mut dev.mac_state_mut()?.current_parameters;
        let rule = current
            .relay
            .as_mut()
            .and_then(|relay| relay.serving_mut())
            .and_then(|serving| serving.uplink_forwarding_rules.get_mut(index));
        match (accepted, req.action, rule) {
            (false, _, _) => warn!("relay rule {} unknown to the relay", req.rule_index),
            (true, RelayCtrlUplinkListAction::RemoveTrustedEndDevice, Some(rule)) => {
                debug!("relay rule {} removed", req.rule_index);
                *rule = None;
            }
            (true, RelayCtrlUplinkListAction::ReadWFCnt, Some(Some(rule))) => {
                rule.last_w_f_cnt = answer.w_f_cnt;
            }
            (true, _, _) => warn!("relay rule {} acknowledged but not known", req.rule_index),
        }
        event = Some(answer_event(
            MacCommand::RelayCtrlUplinkListReq(*req),
            MacCommand::RelayCtrlUplinkListAns(*answer),
            accepted,
        ));
        Ok(())
    })?;
    Ok(event.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::commands::relay::conf::serving_device;
    use crate::mac::device::relay::{RelayParameters, RelayUplinkForwardingRule};
    use crate::mac::types::MacVersion;
    use alloc::string::ToString;
    use alloc::vec;

    fn rule(device_id: &str) -> Option<RelayUplinkForwardingRule> {
        Some(RelayUplinkForwardingRule {
            limits: None,
            last_w_f_cnt: 0,
            device_id: device_id.to_string(),
            session_key_id: vec![1],
        })
    }

    fn device() -> EndDevice {
        let mut dev = serving_device(MacVersion::V1_0_4);
        let state = dev.mac_state_mut().unwrap();
        if let Some(RelayParameters::Serving(serving)) = &mut state.desired_parameters.relay {
            serving.uplink_forwarding_rules = vec![rule("a"), None, None];
        }
        let mut current = state.desired_parameters.relay.clone();
        if let Some(RelayParameters::Serving(serving)) = &mut current {
            serving.uplink_forwarding_rules = vec![rule("a"), rule("b"), None, rule("d")];
        }
        state.current_parameters.relay = current;
        dev
    }

    #[test]
    fn stale_rules_are_removed_partially() {
        let mut dev = device();
        let state = enqueue_relay_ctrl_uplink_list(&mut dev, 2, 6);
        assert!(!state.ok);
        assert_eq!(
            dev.mac_state().unwrap().pending_requests,
            [MacCommand::RelayCtrlUplinkListReq(RelayCtrlUplinkListReq {
                rule_index: 1,
                action: RelayCtrlUplinkListAction::RemoveTrustedEndDevice,
            })]
        );
        let ack = RelayCtrlUplinkListAns { rule_index_ack: true, w_f_cnt: 0 };
        handle_relay_ctrl_uplink_list_ans(&mut dev, &ack).unwrap();
        assert!(device_needs_relay_ctrl_uplink_list(&dev));
        assert!(enqueue_relay_ctrl_uplink_list(&mut dev, 2, 6).ok);
        handle_relay_ctrl_uplink_list_ans(&mut dev, &ack).unwrap();
        assert!(!device_needs_relay_ctrl_uplink_list(&dev));
    }

    #[test]
    fn read_records_w_f_cnt() {
        let mut dev = device();
        dev.mac_state_mut().unwrap().pending_requests.push(MacCommand::RelayCtrlUplinkListReq(
            RelayCtrlUplinkListReq { rule_index: 0, action: RelayCtrlUplinkListAction::ReadWFCnt },
        ));
        let ack = RelayCtrlUplinkListAns { rule_index_ack: true, w_f_cnt: 77 };
        let events = handle_relay_ctrl_uplink_list_ans(&mut dev, &ack).unwrap();
        assert!(matches!(events[..], [Event::AnswerAccepted { .. }]));
        let state = dev.mac_state().unwrap();
        let serving = serving(&state.current_parameters).unwrap();
        assert_eq!(serving.rule(0).map(|rule| rule.last_w_f_cnt), Some(77));
    }
}
