//! Processing for the AS923 region, which uses a dynamic channel plan with dwell time limits.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use lora_modulation::{Bandwidth, SpreadingFactor};

use super::channel_plan::dynamic;
use super::{Error, Region};
use crate::channel_mask::ChMaskCntlPair;
use crate::mac::types::{DataRate, LoraDataRate};

pub(crate) const ID: &str = "AS_923";

const JOIN_CHANNELS: [u64; 2] = [923_200_000, 923_400_000];

/// Specific processing for the AS923 region.
#[derive(Debug, Clone, Copy)]
pub struct AS923;

impl Region for AS923 {
    fn id(&self) -> &'static str {
        ID
    }
    fn default_channels(&self, _is_uplink: bool) -> usize {
        JOIN_CHANNELS.len()
    }
    fn mandatory_frequency(&self, index: usize, _is_uplink: bool) -> u64 {
        JOIN_CHANNELS[index % JOIN_CHANNELS.len()]
    }
    fn mandatory_ul_data_rate_range(&self, _index: usize) -> (u8, u8) {
        (0, 5)
    }
    fn max_uplink_channels(&self) -> usize {
        dynamic::MAX_CHANNELS
    }
    fn ul_data_rate_range(&self) -> (u8, u8) {
        (0, 7)
    }
    fn convert_data_rate(&self, dr: u8) -> Result<DataRate, Error> {
        let lora = |sf, bw| Ok(DataRate::Lora(LoraDataRate::from_modulation(sf, bw)));
        match dr {
            0 => lora(SpreadingFactor::_12, Bandwidth::_125KHz),
            1 => lora(SpreadingFactor::_11, Bandwidth::_125KHz),
            2 => lora(SpreadingFactor::_10, Bandwidth::_125KHz),
            3 => lora(SpreadingFactor::_9, Bandwidth::_125KHz),
            4 => lora(SpreadingFactor::_8, Bandwidth::_125KHz),
            5 => lora(SpreadingFactor::_7, Bandwidth::_125KHz),
            6 => lora(SpreadingFactor::_7, Bandwidth::_250KHz),
            7 => Ok(DataRate::Fsk { bit_rate: 50_000 }),
            _ => Err(Error::DataRateNotSupported(dr)),
        }
    }
    fn tx_offset(&self, index: u8) -> Option<f32> {
        (index <= self.max_tx_power_index()).then(|| -2.0 * f32::from(index))
    }
    fn max_tx_power_index(&self) -> u8 {
        7
    }
    fn max_adr_data_rate_index(&self) -> u8 {
        5
    }
    fn max_eirp(&self) -> f32 {
        16.0
    }
    fn min_frequency(&self) -> u64 {
        915_000_000
    }
    fn max_frequency(&self) -> u64 {
        928_000_000
    }
    fn default_rx2_frequency(&self) -> u64 {
        923_200_000
    }
    fn default_rx2_data_rate(&self) -> u8 {
        2
    }
    fn max_rx1_data_rate_offset(&self) -> u8 {
        7
    }
    fn beacon_data_rate_index(&self) -> u8 {
        3
    }
    fn beacon_frequency(&self) -> Option<u64> {
        Some(923_400_000)
    }
    fn ping_slot_frequency(&self) -> Option<u64> {
        Some(923_400_000)
    }
    fn supports_tx_param_setup(&self) -> bool {
        true
    }
    fn generate_ch_masks(
        &self,
        current: &[bool],
        desired: &[bool],
    ) -> Result<Vec<ChMaskCntlPair>, Error> {
        dynamic::generate_ch_masks(current, desired)
    }
    fn parse_ch_mask(&self, pairs: &[ChMaskCntlPair]) -> Result<BTreeMap<usize, bool>, Error> {
        dynamic::parse_ch_mask(pairs)
    }
}
