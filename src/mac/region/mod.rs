//! Specification of functionality implemented for each supported LoRaWAN region.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::channel_mask::ChMaskCntlPair;
use crate::mac::types::DataRate;

pub mod as923;
pub mod channel_plan;
pub mod eu868;
pub mod us915;

pub use as923::AS923;
pub use eu868::EU868;
pub use us915::US915;

/// Band error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Error {
    UnknownBand,
    InvalidChannelMaskCtrl(u8),
    InvalidChannelCount,
    DataRateNotSupported(u8),
    UnsupportedRx1DROffset(u8),
}

/// Specification of functionality to describe regional characteristics.
///
/// Bands are read-only and shared between all devices, so every method takes `&self`
/// and the trait stays object safe.
pub trait Region: Sync {
    /// Band identifier, as referenced by frequency plans.
    fn id(&self) -> &'static str;
    /// Get the number of default uplink or downlink channels for the region.
    fn default_channels(&self, is_uplink: bool) -> usize;
    /// Get the default uplink or downlink frequency based on channel index for the region.
    fn mandatory_frequency(&self, index: usize, is_uplink: bool) -> u64;
    /// Get the default uplink data rate based on channel index for the region.
    fn mandatory_ul_data_rate_range(&self, index: usize) -> (u8, u8);
    /// Largest number of uplink channels a device may hold.
    fn max_uplink_channels(&self) -> usize;
    /// Get the uplink data rate range.
    fn ul_data_rate_range(&self) -> (u8, u8);
    /// Convert the data rate index to modulation parameters for the region.
    fn convert_data_rate(&self, dr: u8) -> Result<DataRate, Error>;
    /// Finds the uplink data rate index matching the modulation parameters.
    fn find_uplink_data_rate(&self, data_rate: &DataRate) -> Option<u8> {
        let (min, max) = self.ul_data_rate_range();
        (min..=max).find(|dr| self.convert_data_rate(*dr).ok().as_ref() == Some(data_rate))
    }
    /// Offset from the maximum EIRP in dB, for the TX power index.
    fn tx_offset(&self, index: u8) -> Option<f32>;
    /// Largest TX power index of the region.
    fn max_tx_power_index(&self) -> u8;
    /// Largest data rate index the ADR algorithm may assign.
    fn max_adr_data_rate_index(&self) -> u8;
    /// Whether the network may run ADR for devices in this region.
    fn enable_adr(&self) -> bool {
        true
    }
    /// Get the maximum EIRP for the region.
    fn max_eirp(&self) -> f32;
    /// Get the minimum frequency for the region.
    fn min_frequency(&self) -> u64;
    /// Get the maximum frequency for the region.
    fn max_frequency(&self) -> u64;
    /// Get the default RX2 frequency for the region.
    fn default_rx2_frequency(&self) -> u64;
    /// Get the default RX2 data rate for the region.
    fn default_rx2_data_rate(&self) -> u8;
    /// Get the default RX1 data rate offset for the region.
    fn default_rx1_data_rate_offset(&self) -> u8 {
        0
    }
    /// Largest RX1 data rate offset the region defines.
    fn max_rx1_data_rate_offset(&self) -> u8;
    /// Get the default RX1 delay for the region, in seconds.
    fn default_rx_delay(&self) -> u8 {
        1
    }
    /// Get the default ADR acknowledgement limit for the region.
    fn default_adr_ack_limit(&self) -> u16 {
        64
    }
    /// Get the default ADR acknowledgement delay for the region.
    fn default_adr_ack_delay(&self) -> u16 {
        32
    }
    /// Data rate index of class B beacons.
    fn beacon_data_rate_index(&self) -> u8;
    /// Fixed beacon frequency, absent when beacons hop.
    fn beacon_frequency(&self) -> Option<u64>;
    /// Fixed ping slot frequency, absent when ping slots hop.
    fn ping_slot_frequency(&self) -> Option<u64>;
    /// Does the region support TXParamSetupReq packet processing?
    fn supports_tx_param_setup(&self) -> bool;
    /// Smallest sequence of mask blocks that turns `current` into `desired`.
    /// The result is empty exactly when both masks enable the same channels.
    fn generate_ch_masks(
        &self,
        current: &[bool],
        desired: &[bool],
    ) -> Result<Vec<ChMaskCntlPair>, Error>;
    /// Mask blocks that fully re-assert `desired`, whatever the device holds.
    fn describe_ch_mask(&self, desired: &[bool]) -> Result<Vec<ChMaskCntlPair>, Error> {
        let inverted: Vec<bool> = desired.iter().map(|enabled| !enabled).collect();
        self.generate_ch_masks(&inverted, desired)
    }
    /// Channel states set by a block of mask pairs, applied in order.
    fn parse_ch_mask(&self, pairs: &[ChMaskCntlPair]) -> Result<BTreeMap<usize, bool>, Error>;
}

static EU868_BAND: EU868 = EU868;
static US915_BAND: US915 = US915;
static AS923_BAND: AS923 = AS923;

/// Resolves a band by its identifier.
pub fn lookup_by_id(id: &str) -> Result<&'static dyn Region, Error> {
    match id {
        eu868::ID => Ok(&EU868_BAND),
        us915::ID => Ok(&US915_BAND),
        as923::ID => Ok(&AS923_BAND),
        _ => Err(Error::UnknownBand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_bands() {
        assert_eq!(lookup_by_id("EU_863_870").map(|b| b.id()), Ok("EU_863_870"));
        assert_eq!(lookup_by_id("US_902_928").map(|b| b.max_uplink_channels()), Ok(72));
        assert_eq!(lookup_by_id("AS_923").map(|b| b.supports_tx_param_setup()), Ok(true));
        assert!(matches!(lookup_by_id("CN_470_510"), Err(Error::UnknownBand)));
    }

    #[test]
    fn find_uplink_data_rate_by_modulation() {
        let band = lookup_by_id("EU_863_870").unwrap();
        assert_eq!(band.find_uplink_data_rate(&DataRate::lora(12, 125_000)), Some(0));
        assert_eq!(band.find_uplink_data_rate(&DataRate::lora(7, 125_000)), Some(5));
        assert_eq!(band.find_uplink_data_rate(&DataRate::lora(12, 500_000)), None);
    }

    #[test]
    fn describe_re_asserts_everything() {
        let band = lookup_by_id("EU_863_870").unwrap();
        let desired = [true, true, true];
        let pairs = band.describe_ch_mask(&desired).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].cntl, 0);
        assert_eq!(pairs[0].mask.bits(), 0b111);
    }
}
