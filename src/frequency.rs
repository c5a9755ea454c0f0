//! Frequencies as carried by MAC commands: 24 bits in steps of 100 Hz.

use crate::Error;

/// A frequency that fits the 3-byte MAC command field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frequency([u8; 3]);

#[cfg(feature = "defmt")]
impl defmt::Format for Frequency {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Frequency({})", self.value())
    }
}

impl Frequency {
    /// Largest frequency the field can carry, in Hz.
    pub const MAX: u64 = 0x00FF_FFFF * 100;

    /// Converts a frequency in Hz, failing when it is not a multiple of 100 Hz or overflows the field.
    pub fn try_from_hz(hz: u64) -> Result<Self, Error> {
        if hz % 100 != 0 || hz > Self::MAX {
            return Err(Error::InvalidFrequency { frequency: hz });
        }
        let data = ((hz / 100) as u32).to_le_bytes();
        Ok(Self([data[0], data[1], data[2]]))
    }

    /// Provides the decimal value in Hz of the frequency.
    pub fn value(&self) -> u64 {
        (u64::from(self.0[2]) << 16 | u64::from(self.0[1]) << 8 | u64::from(self.0[0])) * 100
    }
}

impl From<[u8; 3]> for Frequency {
    fn from(v: [u8; 3]) -> Self {
        Self(v)
    }
}

impl AsRef<[u8]> for Frequency {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

/// Checks that `hz` can be sent in a MAC command.
pub(crate) fn validate(hz: u64) -> Result<u64, Error> {
    Frequency::try_from_hz(hz).map(|f| f.value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_range() {
        assert_eq!(Frequency::try_from_hz(868_100_000).map(|f| f.value()), Ok(868_100_000));
        assert_eq!(
            Frequency::try_from_hz(868_100_050),
            Err(Error::InvalidFrequency { frequency: 868_100_050 })
        );
        assert!(Frequency::try_from_hz(Frequency::MAX + 100).is_err());
        assert_eq!(Frequency::from([0x28, 0x76, 0x84]).value(), 868_100_000);
    }
}
