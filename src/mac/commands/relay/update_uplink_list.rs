//! RelayUpdateUplinkListReq: installs forwarding rules, with the root WOR key of each
//! served session.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use super::keys::RelayKeyService;
use super::serving;
use crate::mac::command::{Cid, MacCommand, RelayUpdateUplinkListReq};
use crate::mac::commands::{enqueue_requests, generation_failed, mismatched_request, negotiable_state};
use crate::mac::device::relay::{RelayUplinkForwardingRule, MAX_UPLINK_FORWARDING_RULES};
use crate::mac::device::{EndDevice, MacState};
use crate::mac::event::Event;
use crate::mac::packer::{handle_mac_response, EnqueueState};
use crate::Error;

fn same_session(a: &RelayUplinkForwardingRule, b: &RelayUplinkForwardingRule) -> bool {
    a.device_id == b.device_id && a.session_key_id == b.session_key_id
}

/// Desired rules the relay does not hold yet, by rule index.
fn outdated_rules(state: &MacState) -> Vec<(u8, &RelayUplinkForwardingRule)> {
    let Some(desired) = serving(&state.desired_parameters) else {
        return Vec::new();
    };
    let current = serving(&state.current_parameters);
    desired
        .uplink_forwarding_rules
        .iter()
        .enumerate()
        .take(MAX_UPLINK_FORWARDING_RULES)
        .filter_map(|(i, rule)| {
            let rule = rule.as_ref()?;
            let up_to_date = current
                .and_then(|current| current.rule(i))
                .map_or(false, |current| same_session(current, rule) && current.limits == rule.limits);
            (!up_to_date).then_some((i as u8, rule))
        })
        .collect()
}

/// Whether some desired forwarding rule is missing or outdated on the relay.
pub fn device_needs_relay_update_uplink_list(dev: &EndDevice) -> bool {
    negotiable_state(dev, Cid::RelayUpdateUplinkList).map_or(false, |state| !outdated_rules(state).is_empty())
}

fn generate(
    dev: &EndDevice,
    state: &MacState,
    keys: &dyn RelayKeyService,
) -> Result<Vec<RelayUpdateUplinkListReq>, Error> {
    let rules = outdated_rules(state);
    let device_ids: Vec<String> = rules.iter().map(|(_, rule)| rule.device_id.clone()).collect();
    let session_key_ids: Vec<Vec<u8>> = rules.iter().map(|(_, rule)| rule.session_key_id.clone()).collect();
    let derived = keys.batch_derive_root_wor_s_key(&dev.ids.application_id, &device_ids, &session_key_ids)?;
    if derived.len() != rules.len() {
        return Err(Error::KeyService);
    }
    let current = serving(&state.current_parameters);
    Ok(rules
        .into_iter()
        .zip(derived)
        .filter_map(|((index, rule), keys)| {
            let (Some(dev_addr), Some(root_wor_s_key)) = keys else {
                debug!("no session keys for relay rule {}", index);
                return None;
            };
            let w_f_cnt = current
                .and_then(|current| current.rule(usize::from(index)))
                .filter(|current| same_session(current, rule))
                .map_or(0, |current| current.last_w_f_cnt);
            Some(RelayUpdateUplinkListReq {
                rule_index: index,
                forward_limits: rule.limits,
                dev_addr,
                w_f_cnt,
                root_wor_s_key,
                device_id: rule.device_id.clone(),
                session_key_id: rule.session_key_id.clone(),
            })
        })
        .collect())
}

/// Without a key service the rules cannot be generated and a generation failure is reported.
pub fn enqueue_relay_update_uplink_list(
    dev: &mut EndDevice,
    max_down_len: u16,
    max_up_len: u16,
    keys: Option<&dyn RelayKeyService>,
) -> EnqueueState {
    if !device_needs_relay_update_uplink_list(dev) {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    }
    let Ok(state) = dev.mac_state() else {
        return EnqueueState::unchanged(max_down_len, max_up_len);
    };
    let requests = match keys {
        Some(keys) => generate(dev, state, keys),
        None => Err(Error::KeyService),
    };
    match requests {
        Ok(requests) => {
            let requests = requests.into_iter().map(MacCommand::RelayUpdateUplinkListReq).collect();
            enqueue_requests(dev, Cid::RelayUpdateUplinkList, max_down_len, max_up_len, requests)
        }
        Err(error) => generation_failed(Cid::RelayUpdateUplinkList, max_down_len, max_up_len, error),
    }
}

/// Installs the requested rule.
pub fn handle_relay_update_uplink_list_ans(dev: &mut EndDevice) -> Result<Vec<Event>, Error> {
    handle_mac_response(dev, Cid::RelayUpdateUplinkList, false, |dev, request| {
        let MacCommand::RelayUpdateUplinkListReq(req) = request else {
            return Err(mismatched_request());
        };
        let current = &mut dev.mac_state_mut()?.current_parameters;
        let Some(serving) = current.relay.as_mut().and_then(|relay| relay.serving_mut()) else {
            warn!("relay rule {} installed on a device that is not a serving relay", req.rule_index);
            return Ok(());
        };
        let index = usize::from(req.rule_index);
        if serving.uplink_forwarding_rules.len() <= index {
            serving.uplink_forwarding_rules.resize(index + 1, None);
        }
        serving.uplink_forwarding_rules[index] = Some(RelayUplinkForwardingRule {
            limits: req.forward_limits,
            last_w_f_cnt: req.w_f_cnt,
            device_id: req.device_id.clone(),
            session_key_id: req.session_key_id.clone(),
        });
        Ok(())
    })?;
    Ok(vec![Event::AnswerReceived(MacCommand::RelayUpdateUplinkListAns)])
}
