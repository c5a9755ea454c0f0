//! Relay parameters of a device, either serving other devices or served by a relay.

use alloc::string::String;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest number of uplink forwarding rules a serving relay holds.
pub const MAX_UPLINK_FORWARDING_RULES: usize = 16;

/// Second wake-on-radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelaySecondChannel {
    pub ack_offset: u8,
    pub data_rate_index: u8,
    pub frequency: u64,
}

/// Token bucket limiting a class of forwarded traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct RelayForwardLimits {
    pub bucket_size: u8,
    pub reload_rate: u8,
}

/// What the relay does with its limit counters when new limits are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum RelayResetLimitCounter {
    Zero,
    Current,
    Max,
    #[default]
    NoReset,
}

/// Trusted end device whose uplinks the relay forwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayUplinkForwardingRule {
    /// Limits of this device only, on top of the relay-wide ones.
    pub limits: Option<RelayForwardLimits>,
    /// Last wake-on-radio frame counter reported by the relay.
    pub last_w_f_cnt: u32,
    /// Served device.
    pub device_id: String,
    /// Session the rule's root key was derived from.
    pub session_key_id: Vec<u8>,
}

/// Forwarding limits a serving relay applies to one served device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct ServingRelayForwardingLimits {
    pub reset_behavior: RelayResetLimitCounter,
    pub join_requests: Option<RelayForwardLimits>,
    pub notifications: Option<RelayForwardLimits>,
    pub uplink_messages: Option<RelayForwardLimits>,
    pub overall: Option<RelayForwardLimits>,
}

impl ServingRelayForwardingLimits {
    /// No limit is set, whatever the reset behavior.
    pub fn is_empty(&self) -> bool {
        self.join_requests.is_none()
            && self.notifications.is_none()
            && self.uplink_messages.is_none()
            && self.overall.is_none()
    }
}

/// Parameters of a device acting as a relay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServingRelayParameters {
    /// Second wake-on-radio channel, if any.
    pub second_channel: Option<RelaySecondChannel>,
    /// Index of the relay's default wake-on-radio channel.
    pub default_channel_index: u8,
    /// Channel activity detection period, as the TS011 enumeration.
    pub cad_periodicity: u8,
    /// Sparse list of rules, indexed by rule index.
    pub uplink_forwarding_rules: Vec<Option<RelayUplinkForwardingRule>>,
    /// Relay-wide forwarding limits.
    pub limits: Option<ServingRelayForwardingLimits>,
}

impl ServingRelayParameters {
    /// Rule at `index`, if set.
    pub fn rule(&self, index: usize) -> Option<&RelayUplinkForwardingRule> {
        self.uplink_forwarding_rules.get(index).and_then(Option::as_ref)
    }
}

/// How a served end device decides to go through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum RelayEndDeviceMode {
    Always,
    Dynamic { smart_enable_level: u8 },
    EndDeviceControlled,
}

/// Parameters of a device whose traffic goes through a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct ServedRelayParameters {
    pub mode: RelayEndDeviceMode,
    pub backoff: u8,
    pub second_channel: Option<RelaySecondChannel>,
    pub serving_device_id: String,
}

/// Relay role of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum RelayParameters {
    Serving(ServingRelayParameters),
    Served(ServedRelayParameters),
}

impl RelayParameters {
    /// Serving side parameters, if the device is a relay.
    pub fn serving(&self) -> Option<&ServingRelayParameters> {
        match self {
            RelayParameters::Serving(serving) => Some(serving),
            RelayParameters::Served(_) => None,
        }
    }

    /// Mutable serving side parameters, if the device is a relay.
    pub fn serving_mut(&mut self) -> Option<&mut ServingRelayParameters> {
        match self {
            RelayParameters::Serving(serving) => Some(serving),
            RelayParameters::Served(_) => None,
        }
    }

    /// Served side parameters, if the device is behind a relay.
    pub fn served(&self) -> Option<&ServedRelayParameters> {
        match self {
            RelayParameters::Served(served) => Some(served),
            RelayParameters::Serving(_) => None,
        }
    }
}
