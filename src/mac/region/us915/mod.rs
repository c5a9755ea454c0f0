//! Processing for the US915 region, which uses a fixed channel plan.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use lora_modulation::{Bandwidth, SpreadingFactor};

use super::channel_plan::fixed;
use super::{Error, Region};
use crate::channel_mask::ChMaskCntlPair;
use crate::mac::types::{DataRate, LoraDataRate};

pub(crate) const ID: &str = "US_902_928";

/// Specific processing for the US915 region.
#[derive(Debug, Clone, Copy)]
pub struct US915;

impl Region for US915 {
    fn id(&self) -> &'static str {
        ID
    }
    fn default_channels(&self, is_uplink: bool) -> usize {
        if is_uplink {
            fixed::MAX_CHANNELS
        } else {
            8
        }
    }
    fn mandatory_frequency(&self, index: usize, is_uplink: bool) -> u64 {
        let index = index as u64;
        if is_uplink {
            // upstream: 64 (902.3 to 914.9 [+ by 0.2]) + 8 (903.0 to 914.2 [+ by 1.6])
            if index < 64 {
                902_300_000 + 200_000 * index
            } else {
                903_000_000 + 1_600_000 * (index - 64)
            }
        } else {
            // downstream: 8 (923.3 to 927.5 [+ by 0.6])
            923_300_000 + 600_000 * (index % 8)
        }
    }
    fn mandatory_ul_data_rate_range(&self, index: usize) -> (u8, u8) {
        // 64 125 KHz channels using DR0 through DR3 + 8 500 KHz channels using DR4
        if index < fixed::NARROW_CHANNELS {
            (0, 3)
        } else {
            (4, 4)
        }
    }
    fn max_uplink_channels(&self) -> usize {
        fixed::MAX_CHANNELS
    }
    fn ul_data_rate_range(&self) -> (u8, u8) {
        (0, 4)
    }
    fn convert_data_rate(&self, dr: u8) -> Result<DataRate, Error> {
        let lora = |sf, bw| Ok(DataRate::Lora(LoraDataRate::from_modulation(sf, bw)));
        match dr {
            0 => lora(SpreadingFactor::_10, Bandwidth::_125KHz),
            1 => lora(SpreadingFactor::_9, Bandwidth::_125KHz),
            2 => lora(SpreadingFactor::_8, Bandwidth::_125KHz),
            3 => lora(SpreadingFactor::_7, Bandwidth::_125KHz),
            4 => lora(SpreadingFactor::_8, Bandwidth::_500KHz),
            8 => lora(SpreadingFactor::_12, Bandwidth::_500KHz),
            9 => lora(SpreadingFactor::_11, Bandwidth::_500KHz),
            10 => lora(SpreadingFactor::_10, Bandwidth::_500KHz),
            11 => lora(SpreadingFactor::_9, Bandwidth::_500KHz),
            12 => lora(SpreadingFactor::_8, Bandwidth::_500KHz),
            13 => lora(SpreadingFactor::_7, Bandwidth::_500KHz),
            _ => Err(Error::DataRateNotSupported(dr)),
        }
    }
    fn tx_offset(&self, index: u8) -> Option<f32> {
        (index <= self.max_tx_power_index()).then(|| -2.0 * f32::from(index))
    }
    fn max_tx_power_index(&self) -> u8 {
        14
    }
    fn max_adr_data_rate_index(&self) -> u8 {
        3
    }
    fn max_eirp(&self) -> f32 {
        30.0
    }
    fn min_frequency(&self) -> u64 {
        902_000_000
    }
    fn max_frequency(&self) -> u64 {
        928_000_000
    }
    fn default_rx2_frequency(&self) -> u64 {
        923_300_000
    }
    fn default_rx2_data_rate(&self) -> u8 {
        8
    }
    fn max_rx1_data_rate_offset(&self) -> u8 {
        3
    }
    fn beacon_data_rate_index(&self) -> u8 {
        8
    }
    fn beacon_frequency(&self) -> Option<u64> {
        None
    }
    fn ping_slot_frequency(&self) -> Option<u64> {
        None
    }
    fn supports_tx_param_setup(&self) -> bool {
        false
    }
    fn generate_ch_masks(
        &self,
        current: &[bool],
        desired: &[bool],
    ) -> Result<Vec<ChMaskCntlPair>, Error> {
        fixed::generate_ch_masks(current, desired)
    }
    fn parse_ch_mask(&self, pairs: &[ChMaskCntlPair]) -> Result<BTreeMap<usize, bool>, Error> {
        fixed::parse_ch_mask(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_layout() {
        assert_eq!(US915.mandatory_frequency(0, true), 902_300_000);
        assert_eq!(US915.mandatory_frequency(63, true), 914_900_000);
        assert_eq!(US915.mandatory_frequency(64, true), 903_000_000);
        assert_eq!(US915.mandatory_frequency(71, true), 914_200_000);
        assert_eq!(US915.mandatory_frequency(9, false), 923_900_000);
        assert_eq!(US915.mandatory_ul_data_rate_range(70), (4, 4));
    }

    #[test]
    fn data_rates() {
        assert_eq!(US915.convert_data_rate(4), Ok(DataRate::lora(8, 500_000)));
        assert_eq!(US915.convert_data_rate(5), Err(Error::DataRateNotSupported(5)));
        assert_eq!(US915.find_uplink_data_rate(&DataRate::lora(10, 125_000)), Some(0));
    }
}
