#![allow(dead_code)]

use core::time::Duration;

use lorawan_ns_mac::mac::device::EndDevice;
use lorawan_ns_mac::mac::frequency_plan::{FrequencyPlan, FrequencyPlanChannel, StaticFrequencyPlanStore};
use lorawan_ns_mac::mac::settings::MacSettings;
use lorawan_ns_mac::mac::types::{DataRate, DevAddr, MType, MacVersion, RxMetadata, TxSettings, UplinkMessage};
use lorawan_ns_mac::new_state;

pub const PLAN_ID: &str = "EU_863_870_TTN";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn frequency_plans() -> StaticFrequencyPlanStore {
    let channel = |frequency| FrequencyPlanChannel { frequency, min_data_rate: 0, max_data_rate: 5 };
    let plan = FrequencyPlan {
        uplink_channels: vec![
            channel(868_100_000),
            channel(868_300_000),
            channel(868_500_000),
            channel(867_100_000),
            channel(867_300_000),
            channel(867_500_000),
            channel(867_700_000),
            channel(867_900_000),
        ],
        rx2_channel: Some(FrequencyPlanChannel::at(869_525_000)),
        default_rx2_data_rate: Some(3),
        ..FrequencyPlan::new("EU_863_870")
    };
    StaticFrequencyPlanStore::new().with_plan(PLAN_ID, plan)
}

/// Unicast device with a freshly initialized MAC state.
pub fn device(version: MacVersion) -> EndDevice {
    let mut dev = EndDevice::new(Default::default(), PLAN_ID, version);
    dev.supports_join = true;
    let state = new_state(&dev, &frequency_plans(), &MacSettings::default()).unwrap();
    dev.mac_state = Some(state);
    dev
}

pub fn metadata(gateway_id: &str, snr: f32) -> RxMetadata {
    RxMetadata { gateway_id: gateway_id.to_string(), snr: Some(snr), rssi: -100.0, ..Default::default() }
}

pub fn uplink(f_cnt: u32, spreading_factor: u8, bandwidth: u32, rx_metadata: Vec<RxMetadata>) -> UplinkMessage {
    UplinkMessage {
        m_type: MType::UnconfirmedDataUp,
        dev_addr: DevAddr(0x2601_0203),
        f_cnt,
        adr: true,
        settings: TxSettings {
            data_rate: DataRate::lora(spreading_factor, bandwidth),
            frequency: 868_100_000,
        },
        rx_metadata,
        received_at: Duration::from_secs(1_000 + u64::from(f_cnt)),
    }
}
