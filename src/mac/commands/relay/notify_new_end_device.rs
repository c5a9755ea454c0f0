//! RelayNotifyNewEndDeviceReq: a relay heard an end device it has no rule for.

use alloc::vec;
use alloc::vec::Vec;

use super::serving;
use crate::mac::command::{Cid, MacCommand, RelayNotifyNewEndDeviceReq};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::Error;

/// Only serving relays notify. The notification is surfaced as an event and left to the host.
pub fn handle_relay_notify_new_end_device_req(
    dev: &mut EndDevice,
    req: &RelayNotifyNewEndDeviceReq,
) -> Result<Vec<Event>, Error> {
    let state = dev.mac_state()?;
    if serving(&state.current_parameters).is_none() {
        warn!("new end device notification from a device that is not a serving relay");
        return Err(Error::NoPayload { cid: Cid::RelayNotifyNewEndDevice });
    }
    info!("relay heard new end device {}", req.dev_addr.0);
    Ok(vec![Event::IndicationReceived(MacCommand::RelayNotifyNewEndDeviceReq(*req))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::commands::relay::conf::serving_device;
    use crate::mac::types::{DevAddr, MacVersion};

    #[test]
    fn serving_relays_only() {
        let req = RelayNotifyNewEndDeviceReq { dev_addr: DevAddr(0x2600_0042), snr: -5, rssi: -110 };
        let mut dev = serving_device(MacVersion::V1_0_4);
        assert_eq!(
            handle_relay_notify_new_end_device_req(&mut dev, &req),
            Err(Error::NoPayload { cid: Cid::RelayNotifyNewEndDevice })
        );
        let state = dev.mac_state_mut().unwrap();
        state.current_parameters.relay = state.desired_parameters.relay.clone();
        assert_eq!(
            handle_relay_notify_new_end_device_req(&mut dev, &req),
            Ok(vec![Event::IndicationReceived(MacCommand::RelayNotifyNewEndDeviceReq(req))])
        );
    }
}
