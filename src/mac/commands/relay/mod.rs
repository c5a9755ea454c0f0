//! TS011 relay commands.
//!
//! A serving relay is configured first ([`conf`]), then its forwarding limits
//! ([`configure_fwd_limit`]) and finally its uplink forwarding rules ([`ctrl_uplink_list`],
//! [`update_uplink_list`]). The later steps are generated against the desired serving
//! parameters, assuming the earlier requests of the same downlink are accepted.

use crate::frequency;
use crate::mac::device::relay::{
    RelaySecondChannel, ServedRelayParameters, ServingRelayParameters,
};
use crate::mac::device::MacParameters;
use crate::Error;

pub mod conf;
pub mod configure_fwd_limit;
pub mod ctrl_uplink_list;
pub mod end_device_conf;
pub mod keys;
pub mod notify_new_end_device;
pub mod update_uplink_list;

pub use keys::{derive_root_wor_s_key, RelayKeyService, StaticRelayKeyService};

pub(crate) fn serving(params: &MacParameters) -> Option<&ServingRelayParameters> {
    params.relay.as_ref().and_then(|relay| relay.serving())
}

pub(crate) fn served(params: &MacParameters) -> Option<&ServedRelayParameters> {
    params.relay.as_ref().and_then(|relay| relay.served())
}

pub(crate) fn validate_second_channel(channel: Option<&RelaySecondChannel>) -> Result<(), Error> {
    match channel {
        Some(channel) => frequency::validate(channel.frequency).map(|_| ()),
        None => Ok(()),
    }
}
