//! Fixed channel plans: 64 narrow channels in four 16-channel blocks plus 8 wide channels.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use super::pad_mask;
use crate::channel_mask::ChMaskCntlPair;
use crate::mac::region::Error;

/// Number of channels of a fixed channel plan.
pub const MAX_CHANNELS: usize = 72;
/// Number of 125 kHz channels.
pub const NARROW_CHANNELS: usize = 64;
const BLOCK_LEN: usize = 16;
const NUM_OF_BLOCKS: usize = NARROW_CHANNELS / BLOCK_LEN;
const NUM_OF_CHANNELS_IN_BANK: usize = 8;

// Every block that differs, wide channels last.
fn block_diff(current: &[bool], desired: &[bool]) -> Vec<ChMaskCntlPair> {
    let mut pairs = Vec::new();
    for block in 0..NUM_OF_BLOCKS {
        let range = block * BLOCK_LEN..(block + 1) * BLOCK_LEN;
        if current[range.clone()] != desired[range.clone()] {
            pairs.push(ChMaskCntlPair::new(block as u8, &desired[range]));
        }
    }
    if current[NARROW_CHANNELS..] != desired[NARROW_CHANNELS..] {
        pairs.push(ChMaskCntlPair::new(NUM_OF_BLOCKS as u8, &desired[NARROW_CHANNELS..]));
    }
    pairs
}

// Global switch of the narrow channels, then the non-empty blocks when not all are on.
fn reset(desired: &[bool]) -> Vec<ChMaskCntlPair> {
    let wide = &desired[NARROW_CHANNELS..];
    if desired[..NARROW_CHANNELS].iter().all(|enabled| *enabled) {
        return vec![ChMaskCntlPair::new(6, wide)];
    }
    let mut pairs = vec![ChMaskCntlPair::new(7, wide)];
    for block in 0..NUM_OF_BLOCKS {
        let range = block * BLOCK_LEN..(block + 1) * BLOCK_LEN;
        if desired[range.clone()].iter().any(|enabled| *enabled) {
            pairs.push(ChMaskCntlPair::new(block as u8, &desired[range]));
        }
    }
    pairs
}

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
    let diff = block_diff(&current, &desired);
    let reset = reset(&desired);
    Ok(if reset.len() < diff.len() { reset } else { diff })
}

pub(crate) fn parse_ch_mask(pairs: &[ChMaskCntlPair]) -> Result<BTreeMap<usize, bool>, Error> {
    let mut channels = BTreeMap::new();
    for pair in pairs {
        let statuses = pair.mask.statuses();
        match pair.cntl {
            cntl @ 0..=3 => {
                let offset = cntl as usize * BLOCK_LEN;
                for (index, enabled) in statuses.iter().enumerate() {
                    channels.insert(offset + index, *enabled);
                }
            }
            4 => {
                for (index, enabled) in statuses.iter().take(MAX_CHANNELS - NARROW_CHANNELS).enumerate() {
                    channels.insert(NARROW_CHANNELS + index, *enabled);
                }
            }
            5 => {
                for (bank, enabled) in statuses.iter().take(NUM_OF_CHANNELS_IN_BANK).enumerate() {
                    for index in 0..NUM_OF_CHANNELS_IN_BANK {
                        channels.insert(bank * NUM_OF_CHANNELS_IN_BANK + index, *enabled);
                    }
                    channels.insert(NARROW_CHANNELS + bank, *enabled);
                }
            }
            cntl @ (6 | 7) => {
                for index in 0..NARROW_CHANNELS {
                    channels.insert(index, cntl == 6);
                }
                for (index, enabled) in statuses.iter().take(MAX_CHANNELS - NARROW_CHANNELS).enumerate() {
                    channels.insert(NARROW_CHANNELS + index, *enabled);
                }
            }
            cntl => return Err(Error::InvalidChannelMaskCtrl(cntl)),
        }
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_band(band: usize) -> Vec<bool> {
        let mut mask = vec![false; MAX_CHANNELS];
        for index in band * 8..(band + 1) * 8 {
            mask[index] = true;
        }
        mask[NARROW_CHANNELS + band] = true;
        mask
    }

    #[test]
    fn selects_sub_band_with_reset() {
        let current = vec![true; MAX_CHANNELS];
        let pairs = generate_ch_masks(&current, &sub_band(1)).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].cntl, 7);
        assert_eq!(pairs[0].mask.bits(), 0b10);
        assert_eq!(pairs[1].cntl, 0);
        assert_eq!(pairs[1].mask.bits(), 0xFF00);
        let parsed = parse_ch_mask(&pairs).unwrap();
        for index in 0..MAX_CHANNELS {
            assert_eq!(parsed.get(&index), Some(&sub_band(1)[index]), "channel {}", index);
        }
    }

    #[test]
    fn small_change_uses_block_diff() {
        let current = sub_band(0);
        let mut desired = current.clone();
        desired[3] = false;
        let pairs = generate_ch_masks(&current, &desired).unwrap();
        assert_eq!(pairs, vec![ChMaskCntlPair::new(0, &desired[..16])]);
    }

    #[test]
    fn all_narrow_channels_on() {
        let mut desired = vec![true; NARROW_CHANNELS];
        desired.resize(MAX_CHANNELS, false);
        let pairs = generate_ch_masks(&sub_band(2), &desired).unwrap();
        assert_eq!(pairs, vec![ChMaskCntlPair::new(6, &[false; 8])]);
    }

    #[test]
    fn sub_band_control() {
        let pair = ChMaskCntlPair::new(5, &[false, false, true]);
        let parsed = parse_ch_mask(&[pair]).unwrap();
        assert_eq!(parsed.get(&16), Some(&true));
        assert_eq!(parsed.get(&15), Some(&false));
        assert_eq!(parsed.get(&66), Some(&true));
        assert_eq!(parsed.get(&64), Some(&false));
    }
}
