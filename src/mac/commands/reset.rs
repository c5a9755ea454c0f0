//! ResetInd: a LoRaWAN 1.1 device activated by personalization restarted.

use alloc::vec;
use alloc::vec::Vec;

use super::queue_response;
use crate::mac::command::{Cid, MacCommand, ResetConf, ResetInd};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::frequency_plan::FrequencyPlanStore;
use crate::mac::settings::MacSettings;
use crate::mac::state::new_state;
use crate::mac::types::MacVersion;
use crate::Error;

/// Restarts the MAC state from scratch and confirms.
pub fn handle_reset_ind(
    dev: &mut EndDevice,
    payload: &ResetInd,
    frequency_plans: &dyn FrequencyPlanStore,
    defaults: &MacSettings,
) -> Result<Vec<Event>, Error> {
    if dev.supports_join {
        warn!("ResetInd from a device activated over the air");
        return Err(Error::NoPayload { cid: Cid::Reset });
    }
    let mut state = new_state(dev, frequency_plans, defaults)?;
    state.lorawan_version = MacVersion::V1_1;
    let conf = ResetConf { minor_version: payload.minor_version.min(MacVersion::V1_1.minor()) };
    let event = queue_response(&mut state, MacCommand::ResetConf(conf));
    dev.mac_state = Some(state);
    debug!("MAC state reset");
    Ok(vec![Event::IndicationReceived(MacCommand::ResetInd(*payload)), event])
}
