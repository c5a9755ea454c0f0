//! Frequency plans: the network operator's selection of channels within a band.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mac::region::{self, Region};

/// Frequency plan lookup error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Error {
    NotFound,
}

/// A channel of a frequency plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct FrequencyPlanChannel {
    pub frequency: u64,
    pub min_data_rate: u8,
    pub max_data_rate: u8,
}

impl FrequencyPlanChannel {
    /// Channel without data rate constraints, as used for RX2 and ping slots.
    pub const fn at(frequency: u64) -> Self {
        Self { frequency, min_data_rate: 0, max_data_rate: 0 }
    }
}

/// Dwell time limits the plan imposes, when it imposes any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct DwellTime {
    pub uplinks: Option<bool>,
    pub downlinks: Option<bool>,
}

/// Channels and limits used by devices of a frequency plan.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrequencyPlan {
    /// Identifier of the band the plan is defined in.
    pub band_id: String,
    /// Uplink channels, in channel index order.
    pub uplink_channels: Vec<FrequencyPlanChannel>,
    /// Downlink frequencies, matched to the uplink channels by index.
    pub downlink_channels: Vec<FrequencyPlanChannel>,
    /// Limit on the band's maximum EIRP, in dBm.
    pub max_eirp: Option<f32>,
    /// Dwell time restrictions of the plan.
    pub dwell_time: DwellTime,
    /// RX2 data rate overriding the band default.
    pub default_rx2_data_rate: Option<u8>,
    /// RX2 channel overriding the band default.
    pub rx2_channel: Option<FrequencyPlanChannel>,
    /// Class B ping slot channel.
    pub ping_slot: Option<FrequencyPlanChannel>,
    /// Data rate of the class B ping slots.
    pub ping_slot_default_data_rate: Option<u8>,
}

impl FrequencyPlan {
    /// Empty plan of a band.
    pub fn new(band_id: &str) -> Self {
        Self { band_id: band_id.to_string(), ..Default::default() }
    }

    /// Resolves the band of the plan.
    pub fn band(&self) -> Result<&'static dyn Region, region::Error> {
        region::lookup_by_id(&self.band_id)
    }
}

/// Source of frequency plans, shared read-only between devices.
pub trait FrequencyPlanStore {
    /// Gets the plan with the given identifier.
    fn get(&self, id: &str) -> Result<&FrequencyPlan, Error>;
}

/// Frequency plans held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticFrequencyPlanStore {
    plans: BTreeMap<String, FrequencyPlan>,
}

impl StaticFrequencyPlanStore {
    /// Store without plans.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plan, replacing any plan with the same identifier.
    pub fn with_plan(mut self, id: &str, plan: FrequencyPlan) -> Self {
        self.plans.insert(id.to_string(), plan);
        self
    }
}

impl FrequencyPlanStore for StaticFrequencyPlanStore {
    fn get(&self, id: &str) -> Result<&FrequencyPlan, Error> {
        self.plans.get(id).ok_or(Error::NotFound)
    }
}
