//! Routing of the MAC commands of an uplink to their handlers.

use alloc::vec::Vec;

use crate::mac::command::MacCommand;
use crate::mac::commands::relay::{conf, configure_fwd_limit, ctrl_uplink_list, end_device_conf};
use crate::mac::commands::relay::{notify_new_end_device, update_uplink_list};
use crate::mac::commands::{
    adr_param_setup, beacon_freq, dev_status, device_mode, device_time, dl_channel, duty_cycle,
    link_adr, link_check, new_channel, ping_slot_channel, ping_slot_info, rejoin_param_setup, rekey,
    reset, rx_param_setup, rx_timing_setup, tx_param_setup,
};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::frequency_plan::FrequencyPlanStore;
use crate::mac::region::Region;
use crate::mac::settings::MacSettings;
use crate::mac::types::UplinkMessage;
use crate::Error;

/// Collaborators the uplink handlers read from.
#[derive(Clone, Copy)]
pub struct UplinkContext<'a> {
    /// Band of the device's frequency plan.
    pub band: &'a dyn Region,
    /// Resolves frequency plans when a device resets its MAC state.
    pub frequency_plans: &'a dyn FrequencyPlanStore,
    /// Network-wide MAC settings.
    pub defaults: &'a MacSettings,
}

/// Number of answers identical to `commands[0]` that follow it.
fn duplicate_link_adr_answers(commands: &[MacCommand]) -> usize {
    match commands.split_first() {
        Some((first @ MacCommand::LinkAdrAns(_), rest)) => {
            rest.iter().take_while(|cmd| *cmd == first).count()
        }
        _ => 0,
    }
}

fn handle(
    dev: &mut EndDevice,
    up: &UplinkMessage,
    cmd: &MacCommand,
    dup_count: usize,
    ctx: &UplinkContext<'_>,
) -> Result<Vec<Event>, Error> {
    match cmd {
        MacCommand::ResetInd(payload) => {
            reset::handle_reset_ind(dev, payload, ctx.frequency_plans, ctx.defaults)
        }
        MacCommand::LinkCheckReq => link_check::handle_link_check_req(dev, up),
        MacCommand::LinkAdrAns(answer) => {
            link_adr::handle_link_adr_ans(dev, answer, dup_count, up.f_cnt, ctx.band)
        }
        MacCommand::DutyCycleAns => duty_cycle::handle_duty_cycle_ans(dev),
        MacCommand::RxParamSetupAns(answer) => rx_param_setup::handle_rx_param_setup_ans(dev, answer),
        MacCommand::DevStatusAns(answer) => {
            dev_status::handle_dev_status_ans(dev, answer, up.f_cnt, up.received_at)
        }
        MacCommand::NewChannelAns(answer) => new_channel::handle_new_channel_ans(dev, answer),
        MacCommand::RxTimingSetupAns => rx_timing_setup::handle_rx_timing_setup_ans(dev),
        MacCommand::TxParamSetupAns => tx_param_setup::handle_tx_param_setup_ans(dev),
        MacCommand::DlChannelAns(answer) => dl_channel::handle_dl_channel_ans(dev, answer),
        MacCommand::RekeyInd(payload) => rekey::handle_rekey_ind(dev, payload, up.dev_addr),
        MacCommand::AdrParamSetupAns => adr_param_setup::handle_adr_param_setup_ans(dev),
        MacCommand::DeviceTimeReq => device_time::handle_device_time_req(dev, up),
        MacCommand::RejoinParamSetupAns(answer) => {
            rejoin_param_setup::handle_rejoin_param_setup_ans(dev, answer)
        }
        MacCommand::PingSlotInfoReq(payload) => ping_slot_info::handle_ping_slot_info_req(dev, payload),
        MacCommand::PingSlotChannelAns(answer) => {
            ping_slot_channel::handle_ping_slot_channel_ans(dev, answer)
        }
        MacCommand::BeaconFreqAns(answer) => beacon_freq::handle_beacon_freq_ans(dev, answer),
        MacCommand::DeviceModeInd(payload) => device_mode::handle_device_mode_ind(dev, payload),
        MacCommand::RelayConfAns(answer) => conf::handle_relay_conf_ans(dev, answer),
        MacCommand::RelayEndDeviceConfAns(answer) => {
            end_device_conf::handle_relay_end_device_conf_ans(dev, answer)
        }
        MacCommand::RelayUpdateUplinkListAns => {
            update_uplink_list::handle_relay_update_uplink_list_ans(dev)
        }
        MacCommand::RelayCtrlUplinkListAns(answer) => {
            ctrl_uplink_list::handle_relay_ctrl_uplink_list_ans(dev, answer)
        }
        MacCommand::RelayConfigureFwdLimitAns => {
            configure_fwd_limit::handle_relay_configure_fwd_limit_ans(dev)
        }
        MacCommand::RelayNotifyNewEndDeviceReq(req) => {
            notify_new_end_device::handle_relay_notify_new_end_device_req(dev, req)
        }
        downlink => Err(Error::InvalidPayload { cid: downlink.cid() }),
    }
}

/// Handles the MAC commands of `up` in order.
///
/// A failing command does not stop the dispatch: it is reported as a
/// [`Event::HandleFailed`] and the commands after it are still handled. The first failure is
/// returned along with every event, in order.
///
/// Devices repeating their LinkADRAns once per request of a block send identical answers
/// back to back. These are handled as one answer to the whole block.
pub fn dispatch_uplink_mac_commands(
    dev: &mut EndDevice,
    up: &UplinkMessage,
    commands: &[MacCommand],
    ctx: &UplinkContext<'_>,
) -> (Vec<Event>, Result<(), Error>) {
    let mut events = Vec::new();
    let mut result = Ok(());
    let mut rest = commands;
    while let Some(cmd) = rest.first() {
        let cid = cmd.cid();
        let version = dev.mac_state().map(|state| state.lorawan_version);
        let handled = match version {
            Ok(version) if version < cid.descriptor().min_version => {
                Err(Error::UnsupportedCommand { cid, version })
            }
            Ok(version) => {
                let dup_count = if version.allows_duplicate_link_adr_ans() {
                    duplicate_link_adr_answers(rest)
                } else {
                    0
                };
                trace!("handling command {} with {} duplicates", cid as u8, dup_count);
                rest = &rest[dup_count..];
                handle(dev, up, cmd, dup_count, ctx)
            }
            Err(error) => Err(error),
        };
        rest = &rest[1..];
        match handled {
            Ok(handled) => events.extend(handled),
            Err(error) => {
                warn!("failed to handle command {}", cid as u8);
                events.push(Event::HandleFailed { cid, error: error.clone() });
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
    }
    debug!("dispatched {} MAC commands, {} events", commands.len(), events.len());
    (events, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::command::{Cid, DutyCycleReq, LinkAdrAns, RxTimingSetupReq};
    use crate::mac::device::MacState;
    use crate::mac::frequency_plan::StaticFrequencyPlanStore;
    use crate::mac::region::EU868;
    use crate::mac::types::{DataRate, DevAddr, DeviceClass, MType, MacVersion, TxSettings};
    use alloc::vec;
    use core::time::Duration;

    fn device(version: MacVersion) -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", version);
        dev.mac_state = Some(MacState::new(version, DeviceClass::A, Default::default(), Default::default()));
        dev
    }

    fn uplink() -> UplinkMessage {
        UplinkMessage {
            m_type: MType::UnconfirmedDataUp,
            dev_addr: DevAddr(0x2600_0001),
            f_cnt: 12,
            adr: true,
            settings: TxSettings { data_rate: DataRate::lora(7, 125_000), frequency: 868_100_000 },
            rx_metadata: Vec::new(),
            received_at: Duration::from_secs(100),
        }
    }

    fn dispatch(dev: &mut EndDevice, commands: &[MacCommand]) -> (Vec<Event>, Result<(), Error>) {
        let plans = StaticFrequencyPlanStore::new();
        let defaults = MacSettings::default();
        let ctx = UplinkContext { band: &EU868, frequency_plans: &plans, defaults: &defaults };
        dispatch_uplink_mac_commands(dev, &uplink(), commands, &ctx)
    }

    #[test]
    fn failures_do_not_stop_dispatch() {
        let mut dev = device(MacVersion::V1_0_3);
        dev.mac_state_mut().unwrap().pending_requests =
            vec![MacCommand::RxTimingSetupReq(RxTimingSetupReq { delay: 3 })];
        let (events, result) = dispatch(
            &mut dev,
            &[MacCommand::DutyCycleAns, MacCommand::RxTimingSetupAns, MacCommand::DevStatusReq],
        );
        assert_eq!(result, Err(Error::RequestNotFound { cid: Cid::DutyCycle }));
        assert_eq!(
            events,
            [
                Event::HandleFailed { cid: Cid::DutyCycle, error: Error::RequestNotFound { cid: Cid::DutyCycle } },
                Event::AnswerReceived(MacCommand::RxTimingSetupAns),
                Event::HandleFailed { cid: Cid::DevStatus, error: Error::InvalidPayload { cid: Cid::DevStatus } },
            ]
        );
        assert_eq!(dev.mac_state().unwrap().current_parameters.rx1_delay, 3);
    }

    #[test]
    fn commands_newer_than_the_device_are_refused() {
        let mut dev = device(MacVersion::V1_0_2);
        let (events, result) = dispatch(&mut dev, &[MacCommand::DeviceTimeReq, MacCommand::LinkCheckReq]);
        assert_eq!(result, Err(Error::UnsupportedCommand { cid: Cid::DeviceTime, version: MacVersion::V1_0_2 }));
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Event::HandleFailed { cid: Cid::DeviceTime, .. }));
        assert_eq!(dev.mac_state().unwrap().queued_responses.len(), 1);
    }

    #[test]
    fn duplicate_link_adr_answers_are_counted() {
        let ack = MacCommand::LinkAdrAns(LinkAdrAns {
            channel_mask_ack: true,
            data_rate_index_ack: true,
            tx_power_index_ack: true,
        });
        let commands = [ack.clone(), ack.clone(), ack, MacCommand::DutyCycleAns];
        assert_eq!(duplicate_link_adr_answers(&commands), 2);
        assert_eq!(duplicate_link_adr_answers(&commands[2..]), 0);

        let mut dev = device(MacVersion::V1_0_3);
        dev.mac_state_mut().unwrap().pending_requests =
            vec![MacCommand::DutyCycleReq(DutyCycleReq { max_duty_cycle: 4 })];
        let (events, _) = dispatch(&mut dev, &commands);
        let failed: Vec<Cid> = events
            .iter()
            .filter_map(|event| match event {
                Event::HandleFailed { cid, .. } => Some(*cid),
                _ => None,
            })
            .collect();
        assert_eq!(failed, [Cid::LinkAdr]);
        assert!(dev.mac_state().unwrap().pending_requests.is_empty());
    }
}
