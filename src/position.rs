//! Target/current position as carried by position-class frames: a 14-bit
//! magnitude split into two 7-bit bytes.

use crate::error::{Error, Result};

/// Lowest position a joint may be commanded to.
pub const MINIMUM_POSITION: u16 = 3500;
/// Highest position a joint may be commanded to.
pub const MAXIMUM_POSITION: u16 = 11500;
/// Centre of the servo travel.
pub const NEUTRAL_POSITION: u16 = 7500;
/// Largest magnitude the two 7-bit bytes can carry.
pub const REPRESENTABLE_MAX: u16 = 0x3FFF;

/// Split `position` into its `[high, low]` pair.
pub fn encode(position: u16) -> Result<[u8; 2]> {
    if position > REPRESENTABLE_MAX {
        return Err(Error::parameter(
            "position",
            u32::from(position),
            0,
            u32::from(REPRESENTABLE_MAX),
        ));
    }
    Ok([(position >> 7) as u8 & 0x7F, position as u8 & 0x7F])
}

/// Recombine a `[high, low]` pair.
pub fn decode(high: u8, low: u8) -> u16 {
    (u16::from(high) << 7) + u16::from(low)
}
