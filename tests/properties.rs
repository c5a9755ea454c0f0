mod common;

use core::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lorawan_ns_mac::mac::command::{mac_commands_len, Cid, LinkAdrAns, MacCommand};
use lorawan_ns_mac::mac::commands::link_adr::{enqueue_link_adr, handle_link_adr_ans, NO_CHANGE_INDEX};
use lorawan_ns_mac::mac::commands::{dev_status, duty_cycle, new_channel, rx_param_setup, rx_timing_setup};
use lorawan_ns_mac::mac::device::EndDevice;
use lorawan_ns_mac::mac::event::Event;
use lorawan_ns_mac::mac::region::{lookup_by_id, Region};
use lorawan_ns_mac::mac::rejection::RejectionSet;
use lorawan_ns_mac::mac::settings::MacSettings;
use lorawan_ns_mac::mac::types::MacVersion;
use lorawan_ns_mac::{adapt_data_rate, build_downlink_mac_commands, DownlinkContext};

use common::{device, init_logger, metadata, uplink};

const ROUNDS: usize = 200;

fn eu868() -> &'static dyn Region {
    lookup_by_id("EU_863_870").unwrap()
}

/// Device whose desired channels are the ones it already uses.
fn settled_device(version: MacVersion) -> EndDevice {
    let mut dev = device(version);
    let state = dev.mac_state.as_mut().unwrap();
    state.desired_parameters.channels = state.current_parameters.channels.clone();
    dev
}

fn pending_link_adr(dev: &EndDevice) -> usize {
    dev.mac_state
        .as_ref()
        .unwrap()
        .pending_requests
        .iter()
        .filter(|cmd| cmd.cid() == Cid::LinkAdr)
        .count()
}

#[test]
fn adr_never_lowers_the_data_rate() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0x0adf);
    let band = eu868();
    for _ in 0..ROUNDS {
        let mut dev = device(MacVersion::V1_0_3);
        let current = rng.gen_range(0..=5u8);
        let state = dev.mac_state.as_mut().unwrap();
        state.current_parameters.adr_data_rate_index = current;
        state.desired_parameters.adr_data_rate_index = current;
        for _ in 0..rng.gen_range(0..3) {
            state.rejected_adr_data_rate_indexes.insert_sorted(rng.gen_range(0..=5));
        }
        for _ in 0..rng.gen_range(0..3) {
            state.rejected_adr_tx_power_indexes.insert_sorted(rng.gen_range(0..=7));
        }
        let count = rng.gen_range(1..=20u32);
        for f_cnt in 1..=count {
            let snr = rng.gen_range(-25.0..15.0f32);
            state.push_recent_uplink(uplink(f_cnt, 12 - current, 125_000, vec![metadata("gw", snr)]));
        }

        adapt_data_rate(&mut dev, band, &MacSettings::default()).unwrap();
        let desired = &dev.mac_state.as_ref().unwrap().desired_parameters;
        assert!(desired.adr_data_rate_index >= current);
        assert!(desired.adr_tx_power_index <= band.max_tx_power_index());
    }
}

#[test]
fn replayed_rejection_changes_nothing() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0x4e4b);
    let band = eu868();
    for _ in 0..ROUNDS {
        let mut dev = settled_device(MacVersion::V1_0_3);
        let state = dev.mac_state.as_mut().unwrap();
        state.desired_parameters.adr_data_rate_index = rng.gen_range(1..=5);
        state.desired_parameters.adr_tx_power_index = rng.gen_range(0..=7);
        assert!(enqueue_link_adr(&mut dev, 15, 15, band).ok);
        let pending = dev.mac_state.as_ref().unwrap().pending_requests.clone();
        let dup_count = pending.len() - 1;
        let answer = LinkAdrAns {
            channel_mask_ack: true,
            data_rate_index_ack: rng.gen_bool(0.5),
            tx_power_index_ack: false,
        };

        handle_link_adr_ans(&mut dev, &answer, dup_count, 10, band).unwrap();
        let state = dev.mac_state.as_ref().unwrap();
        let rejected = (
            state.rejected_adr_data_rate_indexes.clone(),
            state.rejected_adr_tx_power_indexes.clone(),
        );

        dev.mac_state.as_mut().unwrap().pending_requests = pending;
        handle_link_adr_ans(&mut dev, &answer, dup_count, 11, band).unwrap();
        let state = dev.mac_state.as_ref().unwrap();
        assert_eq!(state.rejected_adr_data_rate_indexes, rejected.0);
        assert_eq!(state.rejected_adr_tx_power_indexes, rejected.1);
    }
}

#[test]
fn downlink_respects_both_budgets() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0xb0d6);
    let defaults = MacSettings::default();
    let ctx = DownlinkContext { band: eu868(), defaults: &defaults, relay_keys: None };
    for _ in 0..ROUNDS {
        let mut dev = device(MacVersion::V1_0_3);
        let state = dev.mac_state.as_mut().unwrap();
        let desired = &mut state.desired_parameters;
        desired.max_duty_cycle = rng.gen_range(0..4);
        desired.rx1_delay = rng.gen_range(1..4);
        desired.rx1_data_rate_offset = rng.gen_range(0..3);
        desired.adr_data_rate_index = rng.gen_range(0..=5);
        let (max_down_len, max_up_len) = (rng.gen_range(0..=60u16), rng.gen_range(0..=30u16));
        let needed: Vec<Cid> = [
            (Cid::DutyCycle, duty_cycle::device_needs_duty_cycle(&dev)),
            (Cid::RxParamSetup, rx_param_setup::device_needs_rx_param_setup(&dev)),
            (Cid::DevStatus, dev_status::device_needs_dev_status(&dev, &defaults, Duration::ZERO)),
            (Cid::NewChannel, new_channel::device_needs_new_channel(&dev, ctx.band)),
            (Cid::RxTimingSetup, rx_timing_setup::device_needs_rx_timing_setup(&dev)),
        ]
        .into_iter()
        .filter_map(|(cid, needs)| needs.then_some(cid))
        .collect();

        let (cmds, _, ok) = build_downlink_mac_commands(&mut dev, max_down_len, max_up_len, Duration::ZERO, &ctx);
        assert!(mac_commands_len(&cmds) <= usize::from(max_down_len));
        let answers: usize = dev
            .mac_state
            .as_ref()
            .unwrap()
            .pending_requests
            .iter()
            .map(|cmd| cmd.cid().descriptor())
            .filter(|descriptor| descriptor.expect_answer)
            .map(|descriptor| 1 + usize::from(descriptor.uplink_length))
            .sum();
        assert!(answers <= usize::from(max_up_len));
        if ok {
            for cid in needed {
                assert!(cmds.iter().any(|cmd| cmd.cid() == cid), "{cid:?} missing from {cmds:?}");
            }
        }
    }
}

#[test]
fn accepted_link_adr_becomes_current() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0x11ad);
    let band = eu868();
    for _ in 0..ROUNDS {
        let version = if rng.gen_bool(0.5) { MacVersion::V1_0_3 } else { MacVersion::V1_0_4 };
        let mut dev = settled_device(version);
        let state = dev.mac_state.as_mut().unwrap();
        state.desired_parameters.adr_data_rate_index = rng.gen_range(0..=5);
        state.desired_parameters.adr_tx_power_index = rng.gen_range(0..=7);
        state.desired_parameters.adr_nb_trans = rng.gen_range(1..=3);
        for _ in 0..rng.gen_range(0..3) {
            state.rejected_adr_data_rate_indexes.insert_sorted(rng.gen_range(0..=5));
        }
        for _ in 0..rng.gen_range(0..3) {
            state.rejected_adr_tx_power_indexes.insert_sorted(rng.gen_range(0..=7));
        }
        let before = state.current_parameters.clone();

        let enqueued = enqueue_link_adr(&mut dev, 15, 15, band);
        if enqueued.queued_events.iter().any(|event| matches!(event, Event::GenerationFailed { .. })) {
            continue;
        }
        let requests: Vec<_> = dev
            .mac_state
            .as_ref()
            .unwrap()
            .pending_requests
            .iter()
            .filter_map(|cmd| match cmd {
                MacCommand::LinkAdrReq(req) => Some(*req),
                _ => None,
            })
            .collect();
        let Some(last) = requests.last() else {
            continue;
        };
        let ack = LinkAdrAns { channel_mask_ack: true, data_rate_index_ack: true, tx_power_index_ack: true };
        handle_link_adr_ans(&mut dev, &ack, requests.len() - 1, 42, band).unwrap();

        let state = dev.mac_state.as_ref().unwrap();
        let current = &state.current_parameters;
        let expect = |requested: u8, previous: u8| {
            if version.supports_link_adr_no_change() && requested == NO_CHANGE_INDEX {
                previous
            } else {
                requested
            }
        };
        assert_eq!(current.adr_data_rate_index, expect(last.data_rate_index, before.adr_data_rate_index));
        assert_eq!(current.adr_tx_power_index, expect(last.tx_power_index, before.adr_tx_power_index));
        assert_eq!(current.adr_nb_trans, last.nb_trans);
        assert_eq!(state.last_adr_change_f_cnt_up, 42);
        assert_eq!(pending_link_adr(&dev), 0);
    }
}

#[test]
fn dl_channel_waits_for_new_channel() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0xd1c4);
    let defaults = MacSettings::default();
    let ctx = DownlinkContext { band: eu868(), defaults: &defaults, relay_keys: None };
    for _ in 0..ROUNDS {
        let mut dev = settled_device(MacVersion::V1_0_3);
        let index = rng.gen_range(0..3usize);
        let moved = rng.gen_bool(0.5);
        let state = dev.mac_state.as_mut().unwrap();
        let channel = state.desired_parameters.channels[index].as_mut().unwrap();
        if moved {
            channel.uplink_frequency = 867_100_000 + 200_000 * index as u64;
        }
        channel.downlink_frequency = 869_100_000 + 200_000 * index as u64;

        let (cmds, _, ok) = build_downlink_mac_commands(&mut dev, 60, 30, Duration::ZERO, &ctx);
        assert!(ok);
        let new_channel = cmds.iter().any(|cmd| {
            matches!(cmd, MacCommand::NewChannelReq(req) if usize::from(req.channel_index) == index)
        });
        let dl_channel = cmds.iter().any(|cmd| {
            matches!(cmd, MacCommand::DlChannelReq(req) if usize::from(req.channel_index) == index)
        });
        assert_eq!(new_channel, moved);
        assert_eq!(dl_channel, !moved);
    }
}
