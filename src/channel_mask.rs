//! Wire representation of a 16-channel uplink enable mask.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sixteen channel enable bits, least significant bit first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelMask([u8; 2]);

impl ChannelMask {
    /// Builds a mask from up to sixteen enable flags. Flags past the sixteenth are ignored.
    pub fn from_statuses(statuses: &[bool]) -> Self {
        let mut mask = Self::default();
        for (index, enabled) in statuses.iter().take(16).enumerate() {
            if *enabled {
                mask.0[index >> 3] |= 1 << (index & 0x07);
            }
        }
        mask
    }

    fn channel_enabled(&self, index: usize) -> bool {
        self.0[index >> 3] & (1 << (index & 0x07)) != 0
    }

    /// Verifies if a given channel is enabled.
    pub fn is_enabled(&self, index: usize) -> Option<bool> {
        (index < 16).then(|| self.channel_enabled(index))
    }

    /// Provides information for each of the 16 channels if they are enabled.
    pub fn statuses(&self) -> [bool; 16] {
        let mut res = [false; 16];
        for (i, c) in res.iter_mut().enumerate() {
            *c = self.channel_enabled(i);
        }
        res
    }

    /// Bits as a little endian word.
    pub fn bits(&self) -> u16 {
        u16::from_le_bytes(self.0)
    }
}

impl From<[u8; 2]> for ChannelMask {
    fn from(v: [u8; 2]) -> Self {
        ChannelMask(v)
    }
}

impl From<u16> for ChannelMask {
    fn from(v: u16) -> Self {
        ChannelMask(v.to_le_bytes())
    }
}

impl AsRef<[u8]> for ChannelMask {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

/// One `(ChMaskCntl, ChMask)` pair of a LinkADRReq block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChMaskCntlPair {
    /// Selects which slice of channels `mask` applies to.
    pub cntl: u8,
    /// Enable bits of the selected slice.
    pub mask: ChannelMask,
}

impl ChMaskCntlPair {
    pub(crate) fn new(cntl: u8, statuses: &[bool]) -> Self {
        Self { cntl, mask: ChannelMask::from_statuses(statuses) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_bit_order() {
        let mask = ChannelMask::from([0b0000_0101, 0b1000_0000]);
        let statuses = mask.statuses();
        assert!(statuses[0]);
        assert!(!statuses[1]);
        assert!(statuses[2]);
        assert!(statuses[15]);
        assert_eq!(mask.is_enabled(16), None);
        assert_eq!(ChannelMask::from_statuses(&statuses), mask);
        assert_eq!(mask.bits(), 0x8005);
    }
}
