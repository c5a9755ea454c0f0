//! PingSlotInfoReq: ping slot periodicity chosen by a class B device.

use alloc::vec;
use alloc::vec::Vec;

use super::queue_response;
use crate::mac::command::{Cid, MacCommand, PingSlotInfoReq};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::Error;

/// Records the ping slot periodicity and queues the answer.
pub fn handle_ping_slot_info_req(
    dev: &mut EndDevice,
    payload: &PingSlotInfoReq,
) -> Result<Vec<Event>, Error> {
    if !dev.supports_class_b {
        warn!("PingSlotInfoReq from a device without class B support");
        return Err(Error::NoPayload { cid: Cid::PingSlotInfo });
    }
    let state = dev.mac_state_mut()?;
    state.ping_slot_periodicity = Some(payload.period);
    debug!("ping slot periodicity set to {}", payload.period);
    Ok(vec![
        Event::IndicationReceived(MacCommand::PingSlotInfoReq(*payload)),
        queue_response(state, MacCommand::PingSlotInfoAns),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::MacState;
    use crate::mac::types::{DeviceClass, MacVersion};

    #[test]
    fn periodicity_is_recorded() {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_0_4);
        dev.mac_state =
            Some(MacState::new(MacVersion::V1_0_4, DeviceClass::A, Default::default(), Default::default()));
        let req = PingSlotInfoReq { period: 3 };
        assert_eq!(
            handle_ping_slot_info_req(&mut dev, &req),
            Err(Error::NoPayload { cid: Cid::PingSlotInfo })
        );

        dev.supports_class_b = true;
        handle_ping_slot_info_req(&mut dev, &req).unwrap();
        let state = dev.mac_state().unwrap();
        assert_eq!(state.ping_slot_periodicity, Some(3));
        assert_eq!(state.queued_responses, [MacCommand::PingSlotInfoAns]);
    }
}
