//! DeviceModeInd: the device asks to operate in another class.

use alloc::vec::Vec;

use super::queue_response;
use crate::mac::command::{DeviceModeConf, DeviceModeInd, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::types::DeviceClass;
use crate::Error;

fn supports_class(dev: &EndDevice, class: DeviceClass) -> bool {
    match class {
        DeviceClass::A => true,
        DeviceClass::B => dev.supports_class_b,
        DeviceClass::C => dev.supports_class_c,
    }
}

/// Switches class when the device supports the requested one, and confirms the class the
/// device ends up in.
pub fn handle_device_mode_ind(dev: &mut EndDevice, payload: &DeviceModeInd) -> Result<Vec<Event>, Error> {
    let supported = supports_class(dev, payload.class);
    let state = dev.mac_state_mut()?;
    let mut events = alloc::vec![Event::IndicationReceived(MacCommand::DeviceModeInd(*payload))];
    let from = state.device_class;
    if !supported {
        warn!("device does not support the requested class");
    } else if from != payload.class {
        state.device_class = payload.class;
        info!("device class switched");
        events.push(Event::ClassSwitched { from, to: payload.class });
    }
    let conf = DeviceModeConf { class: state.device_class };
    events.push(queue_response(state, MacCommand::DeviceModeConf(conf)));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::device::MacState;
    use crate::mac::types::MacVersion;

    fn device(supports_class_c: bool) -> EndDevice {
        let mut dev = EndDevice::new(Default::default(), "EU_863_870", MacVersion::V1_1);
        dev.supports_class_c = supports_class_c;
        dev.mac_state =
            Some(MacState::new(MacVersion::V1_1, DeviceClass::A, Default::default(), Default::default()));
        dev
    }

    #[test]
    fn switch_to_class_c() {
        let mut dev = device(true);
        let events = handle_device_mode_ind(&mut dev, &DeviceModeInd { class: DeviceClass::C }).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], Event::ClassSwitched { from: DeviceClass::A, to: DeviceClass::C });
        let state = dev.mac_state().unwrap();
        assert_eq!(state.device_class, DeviceClass::C);
        assert_eq!(
            state.queued_responses,
            [MacCommand::DeviceModeConf(DeviceModeConf { class: DeviceClass::C })]
        );
    }

    #[test]
    fn unsupported_class_is_refused() {
        let mut dev = device(false);
        let events = handle_device_mode_ind(&mut dev, &DeviceModeInd { class: DeviceClass::C }).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            dev.mac_state().unwrap().queued_responses,
            [MacCommand::DeviceModeConf(DeviceModeConf { class: DeviceClass::A })]
        );
    }
}
