//! Dynamic channel plans: up to 16 channels, addressed by a single mask block.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use super::pad_mask;
use crate::channel_mask::ChMaskCntlPair;
use crate::mac::region::Error;

/// Number of channels a dynamic channel plan can hold.
pub const MAX_CHANNELS: usize = 16;

pub(crate) fn generate_ch_masks(
    current: &[bool],
    desired: &[bool],
) -> Result<Vec<ChMaskCntlPair>, Error> {
    if current.len() > MAX_CHANNELS || desired.len() > MAX_CHANNELS {
        return Err(Error::InvalidChannelCount);
    }
    let current = pad_mask(current, MAX_CHANNELS);
    let desired = pad_mask(desired, MAX_CHANNELS);
    if current == desired {
        return Ok(Vec::new());
    }
    Ok(vec![ChMaskCntlPair::new(0, &desired)])
}

pub(crate) fn parse_ch_mask(pairs: &[ChMaskCntlPair]) -> Result<BTreeMap<usize, bool>, Error> {
    let mut channels = BTreeMap::new();
    for pair in pairs {
        match pair.cntl {
            0 => {
                for (index, enabled) in pair.mask.statuses().iter().enumerate() {
                    channels.insert(index, *enabled);
                }
            }
            cntl => return Err(Error::InvalidChannelMaskCtrl(cntl)),
        }
    }
    Ok(channels)
}
