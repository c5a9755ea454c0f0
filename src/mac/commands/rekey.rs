//! RekeyInd: a LoRaWAN 1.1 device confirms the session derived from its last join.

use alloc::vec;
use alloc::vec::Vec;

use super::queue_response;
use crate::mac::command::{Cid, MacCommand, RekeyConf, RekeyInd};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::types::{DevAddr, MacVersion};
use crate::Error;

/// Switches to the pending session when the indication arrived under its address, then
/// confirms. `dev_addr` is the address of the uplink carrying the indication.
pub fn handle_rekey_ind(
    dev: &mut EndDevice,
    payload: &RekeyInd,
    dev_addr: DevAddr,
) -> Result<Vec<Event>, Error> {
    if !dev.supports_join {
        warn!("RekeyInd from a device activated by personalization");
        return Err(Error::NoPayload { cid: Cid::Rekey });
    }
    let joined = dev.mac_state()?.pending_join_request.is_some();
    if joined && dev.pending_session.as_ref().map_or(false, |session| session.dev_addr == dev_addr) {
        dev.ids.dev_addr = Some(dev_addr);
        dev.session = dev.pending_session.take();
        info!("switched to the session of the last join, DevAddr {}", dev_addr.0);
    }
    dev.pending_session = None;
    dev.pending_mac_state = None;

    let state = dev.mac_state_mut()?;
    state.pending_join_request = None;
    state.lorawan_version = MacVersion::V1_1;
    let conf = RekeyConf { minor_version: payload.minor_version.min(MacVersion::V1_1.minor()) };
    Ok(vec![
        Event::IndicationReceived(MacCommand::RekeyInd(*payload)),
        queue_response(state, MacCommand::RekeyConf(conf)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::{JoinRequest, MacState, Session};
    use crate::mac::types::DeviceClass;
    use core::time::Duration;

    fn joined_device() -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_1);
        dev.supports_join = true;
        let mut state =
            MacState::new(MacVersion::V1_1, DeviceClass::A, Default::default(), Default::default());
        state.pending_join_request =
            Some(JoinRequest { dev_addr: DevAddr(0x2600_0001), received_at: Duration::from_secs(5) });
        dev.mac_state = Some(state);
        dev.pending_mac_state = dev.mac_state.clone();
        dev.pending_session = Some(Session { dev_addr: DevAddr(0x2600_0001), ..Default::default() });
        dev
    }

    #[test]
    fn other_address_keeps_session() {
        let mut dev = joined_device();
        dev.session = Some(Session { dev_addr: DevAddr(0x2600_0000), ..Default::default() });
        handle_rekey_ind(&mut dev, &RekeyInd { minor_version: 1 }, DevAddr(0x2600_0000)).unwrap();
        assert_eq!(dev.session.as_ref().map(|s| s.dev_addr), Some(DevAddr(0x2600_0000)));
        assert!(dev.pending_session.is_none());
        assert!(dev.mac_state().unwrap().pending_join_request.is_none());
    }

    #[test]
    fn minor_version_is_capped() {
        let mut dev = joined_device();
        handle_rekey_ind(&mut dev, &RekeyInd { minor_version: 3 }, DevAddr(0x2600_0001)).unwrap();
        assert_eq!(
            dev.mac_state().unwrap().queued_responses,
            [MacCommand::RekeyConf(RekeyConf { minor_version: 1 })]
        );
    }

    #[test]
    fn personalized_devices_do_not_rekey() {
        let mut dev = joined_device();
        dev.supports_join = false;
        assert_eq!(
            handle_rekey_ind(&mut dev, &RekeyInd { minor_version: 1 }, DevAddr(0x2600_0001)),
            Err(Error::NoPayload { cid: Cid::Rekey })
        );
    }
}
