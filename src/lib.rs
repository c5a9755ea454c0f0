#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod channel_mask;
pub mod frequency;
pub mod mac;

use mac::command::Cid;
use mac::frequency_plan;
use mac::region;
use mac::types::MacVersion;

pub use mac::adr::adapt_data_rate;
pub use mac::dispatch::{dispatch_uplink_mac_commands, UplinkContext};
pub use mac::scheduler::{build_downlink_mac_commands, DownlinkContext};
pub use mac::state::new_state;

/// Failures of the MAC control core.
///
/// Handler failures are scoped to the command that raised them: the dispatcher keeps
/// processing the rest of the uplink and the scheduler turns enqueue failures into events.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Error {
    Region(region::Error),
    FrequencyPlan(frequency_plan::Error),
    /// The device record carries no MAC state.
    MissingMacState,
    /// An uplink carried a command that the device is not allowed to send.
    NoPayload { cid: Cid },
    /// An answer arrived without a matching pending request.
    RequestNotFound { cid: Cid },
    /// The MAC state violates one of its own invariants.
    CorruptedMacState(&'static str),
    /// The data rate is not LoRa or has no demodulation floor.
    InvalidDataRate,
    InvalidDataRateIndex { index: u8 },
    InvalidTxPowerIndex { index: u8, max: u8 },
    /// The frequency cannot be represented on the wire.
    InvalidFrequency { frequency: u64 },
    TooManyChannels { count: usize, max: usize },
    NoUplinkFrequency { index: usize },
    /// No data rate and TX power combination is left that the device did not reject.
    RejectedParameters,
    IncompatibleChannelMask { data_rate_index: u8 },
    InvalidPayload { cid: Cid },
    ClassAMulticast,
    UnsupportedCommand { cid: Cid, version: MacVersion },
    /// The relay key service could not derive the requested keys.
    KeyService,
}

impl From<region::Error> for Error {
    fn from(value: region::Error) -> Self {
        Self::Region(value)
    }
}

impl From<frequency_plan::Error> for Error {
    fn from(value: frequency_plan::Error) -> Self {
        Self::FrequencyPlan(value)
    }
}
