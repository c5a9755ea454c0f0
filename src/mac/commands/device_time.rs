//! DeviceTimeReq: GPS time of the uplink carrying the request.

use alloc::vec;
use alloc::vec::Vec;
use core::time::Duration;

use super::queue_response;
use crate::mac::command::{DeviceTimeAns, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::types::{gps_time, UplinkMessage};
use crate::Error;

/// Best known GPS time of the end of the uplink: a gateway GPS timestamp, else the reception
/// time of the first gateway, else the time the network received it.
fn uplink_gps_time(up: &UplinkMessage) -> Duration {
    if let Some(time) = up.rx_metadata.iter().find_map(|md| md.gps_time) {
        return time;
    }
    let received_at = up.rx_metadata.first().and_then(|md| md.received_at);
    gps_time(received_at.unwrap_or(up.received_at))
}

/// Queues a DeviceTimeAns with the reception time of the request.
pub fn handle_device_time_req(dev: &mut EndDevice, up: &UplinkMessage) -> Result<Vec<Event>, Error> {
    let answer = DeviceTimeAns { time: uplink_gps_time(up) };
    let state = dev.mac_state_mut()?;
    Ok(vec![
        Event::IndicationReceived(MacCommand::DeviceTimeReq),
        queue_response(state, MacCommand::DeviceTimeAns(answer)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::MacState;
    use crate::mac::types::{DataRate, DevAddr, DeviceClass, MType, MacVersion, RxMetadata, TxSettings};

    const RECEIVED_AT: Duration = Duration::from_secs(1_700_000_000);

    fn uplink(rx_metadata: Vec<RxMetadata>) -> UplinkMessage {
        UplinkMessage {
            m_type: MType::ConfirmedDataUp,
            dev_addr: DevAddr(1),
            f_cnt: 3,
            adr: false,
            settings: TxSettings { data_rate: DataRate::lora(7, 125_000), frequency: 868_100_000 },
            rx_metadata,
            received_at: RECEIVED_AT,
        }
    }

    #[test]
    fn time_sources_in_order() {
        let at = |secs| Some(Duration::from_secs(secs));
        let up = uplink(vec![
            RxMetadata { received_at: at(1_600_000_000), ..Default::default() },
            RxMetadata { gps_time: at(1_300_000_000), ..Default::default() },
            RxMetadata { gps_time: at(1_300_000_001), ..Default::default() },
        ]);
        assert_eq!(uplink_gps_time(&up), Duration::from_secs(1_300_000_000));

        let up = uplink(vec![RxMetadata { received_at: at(1_600_000_000), ..Default::default() }]);
        assert_eq!(uplink_gps_time(&up), gps_time(Duration::from_secs(1_600_000_000)));

        let up = uplink(vec![RxMetadata::default()]);
        assert_eq!(uplink_gps_time(&up), gps_time(RECEIVED_AT));
    }

    #[test]
    fn answer_is_queued() {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_3);
        dev.mac_state =
            Some(MacState::new(MacVersion::V1_0_3, DeviceClass::A, Default::default(), Default::default()));
        let events = handle_device_time_req(&mut dev, &uplink(Vec::new())).unwrap();
        assert_eq!(events[0], Event::IndicationReceived(MacCommand::DeviceTimeReq));
        assert_eq!(
            dev.mac_state().unwrap().queued_responses,
            [MacCommand::DeviceTimeAns(DeviceTimeAns { time: gps_time(RECEIVED_AT) })]
        );
    }
}
