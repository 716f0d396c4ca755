//! One-nibble-per-byte wire encoding used by the servo EEPROM.
//!
//! Every logical byte travels as two wire bytes, high nibble first, each in
//! `0x0..=0xF`. A 16-bit value travels as four wire bytes.

use serde::{Deserialize, Serialize};

use crate::eeprom::Field;
use crate::error::{Error, Result};

const SIGN: u8 = 0b0000_1000;

fn nibble(b: u8) -> Result<u8> {
    if b > 0x0F {
        return Err(Error::Nibble(b));
    }
    Ok(b)
}

fn expect_len(bs: &[u8], expected: usize) -> Result<()> {
    if bs.len() != expected {
        return Err(Error::length(expected, bs.len()));
    }
    Ok(())
}

/// Decode two wire bytes into an unsigned byte.
pub fn decode_u8(bs: &[u8]) -> Result<u8> {
    expect_len(bs, 2)?;
    Ok(nibble(bs[0])? << 4 | nibble(bs[1])?)
}

/// Encode an unsigned byte into two wire bytes.
pub fn encode_u8(u: u8) -> [u8; 2] {
    [u >> 4, u & 0x0F]
}

/// Decode two wire bytes holding a sign-magnitude value.
///
/// Bit 3 of the first wire byte set means negative; the other seven bits are
/// the magnitude. A negative zero decodes to 0.
pub fn decode_i8(bs: &[u8]) -> Result<i8> {
    expect_len(bs, 2)?;
    let (high, low) = (nibble(bs[0])?, nibble(bs[1])?);
    let magnitude = ((high & !SIGN) << 4 | low) as i8;
    if high & SIGN == 0 {
        Ok(magnitude)
    } else {
        Ok(-magnitude)
    }
}

/// Encode a signed byte as sign-magnitude. `-128` has no representation and
/// saturates to `-127`.
pub fn encode_i8(i: i8) -> [u8; 2] {
    let magnitude = i.unsigned_abs().min(0x7F);
    let [high, low] = encode_u8(magnitude);
    if i < 0 {
        [high | SIGN, low]
    } else {
        [high, low]
    }
}

/// Decode four wire bytes, most significant nibble first.
pub fn decode_u16(bs: &[u8]) -> Result<u16> {
    expect_len(bs, 4)?;
    bs.iter()
        .try_fold(0u16, |acc, &b| Ok(acc << 4 | u16::from(nibble(b)?)))
}

/// Encode a 16-bit value into four wire bytes.
pub fn encode_u16(u: u16) -> [u8; 4] {
    [
        (u >> 12) as u8 & 0x0F,
        (u >> 8) as u8 & 0x0F,
        (u >> 4) as u8 & 0x0F,
        u as u8 & 0x0F,
    ]
}

/// Servo behaviour flags, stored in two wire bytes.
///
/// ```text
/// byte 0: 0000 S00R   S = slave mode, R = rotation mode
/// byte 1: 0000 P1FV   P = PWM inhibit, F = free, V = reverse
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flag {
    pub reverse: bool,
    pub free: bool,
    pub pwminh: bool,
    pub rotation_mode: bool,
    pub slave_mode: bool,
}

const SLAVE_MODE: u8 = 0b1000;
const ROTATION_MODE: u8 = 0b0001;
const PWMINH: u8 = 0b1000;
const FIXED: u8 = 0b0100;
const FREE: u8 = 0b0010;
const REVERSE: u8 = 0b0001;

/// Decode the flag bytes, rejecting set reserved bits and a clear fixed bit.
pub fn decode_flag(bs: &[u8]) -> Result<Flag> {
    expect_len(bs, 2)?;
    let raw = i32::from(bs[0]) << 8 | i32::from(bs[1]);
    if bs[0] & !(SLAVE_MODE | ROTATION_MODE) != 0 || bs[1] & 0xF0 != 0 || bs[1] & FIXED == 0 {
        return Err(Error::mismatch(Field::Flag, raw));
    }
    Ok(Flag {
        slave_mode: bs[0] & SLAVE_MODE != 0,
        rotation_mode: bs[0] & ROTATION_MODE != 0,
        pwminh: bs[1] & PWMINH != 0,
        free: bs[1] & FREE != 0,
        reverse: bs[1] & REVERSE != 0,
    })
}

/// Encode flags; the fixed bit is always written as 1.
pub fn encode_flag(flag: Flag) -> [u8; 2] {
    let bit = |set: bool, mask: u8| if set { mask } else { 0 };
    [
        bit(flag.slave_mode, SLAVE_MODE) | bit(flag.rotation_mode, ROTATION_MODE),
        bit(flag.pwminh, PWMINH) | FIXED | bit(flag.free, FREE) | bit(flag.reverse, REVERSE),
    ]
}
