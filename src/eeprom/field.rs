//! Static layout of the 64-byte EEPROM image.

use std::fmt;

use super::SignalSpeed;
use crate::error::{Error, Result};
use crate::nibble::{self, Flag};

/// Wire form of the fixed marker (logical `0x5A`).
pub(crate) const MARKER: [u8; 2] = [0x05, 0x0A];

/// Number of recognized fields, the marker included.
pub const FIELD_COUNT: usize = 19;

/// A recognized region of the EEPROM image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Fixed,
    StretchGain,
    Speed,
    Punch,
    DeadBand,
    Damping,
    SafeTimer,
    Flag,
    MaximumPulseLimit,
    MinimumPulseLimit,
    SignalSpeed,
    TemperatureLimit,
    CurrentLimit,
    Response,
    UserOffset,
    Id,
    CharacteristicChangeStretch1,
    CharacteristicChangeStretch2,
    CharacteristicChangeStretch3,
}

impl Field {
    /// Every field in image order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Fixed,
        Field::StretchGain,
        Field::Speed,
        Field::Punch,
        Field::DeadBand,
        Field::Damping,
        Field::SafeTimer,
        Field::Flag,
        Field::MaximumPulseLimit,
        Field::MinimumPulseLimit,
        Field::SignalSpeed,
        Field::TemperatureLimit,
        Field::CurrentLimit,
        Field::Response,
        Field::UserOffset,
        Field::Id,
        Field::CharacteristicChangeStretch1,
        Field::CharacteristicChangeStretch2,
        Field::CharacteristicChangeStretch3,
    ];

    /// Kebab-case name, as used in the address map export.
    pub fn name(self) -> &'static str {
        match self {
            Field::Fixed => "fixed",
            Field::StretchGain => "stretch-gain",
            Field::Speed => "speed",
            Field::Punch => "punch",
            Field::DeadBand => "dead-band",
            Field::Damping => "damping",
            Field::SafeTimer => "safe-timer",
            Field::Flag => "flag",
            Field::MaximumPulseLimit => "maximum-pulse-limit",
            Field::MinimumPulseLimit => "minimum-pulse-limit",
            Field::SignalSpeed => "signal-speed",
            Field::TemperatureLimit => "temperature-limit",
            Field::CurrentLimit => "current-limit",
            Field::Response => "response",
            Field::UserOffset => "user-offset",
            Field::Id => "id",
            Field::CharacteristicChangeStretch1 => "characteristic-change-stretch1",
            Field::CharacteristicChangeStretch2 => "characteristic-change-stretch2",
            Field::CharacteristicChangeStretch3 => "characteristic-change-stretch3",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    Flag(Flag),
    SignalSpeed(SignalSpeed),
}

impl Value {
    /// Nibble-encoded wire bytes for this value.
    pub fn to_wire(self) -> Vec<u8> {
        match self {
            Value::U8(v) => nibble::encode_u8(v).to_vec(),
            Value::I8(v) => nibble::encode_i8(v).to_vec(),
            Value::U16(v) => nibble::encode_u16(v).to_vec(),
            Value::Flag(v) => nibble::encode_flag(v).to_vec(),
            Value::SignalSpeed(v) => nibble::encode_u8(v.code()).to_vec(),
        }
    }
}

/// How a field is carried on the wire and which values it accepts.
pub(crate) enum Kind {
    Marker,
    Unsigned(fn(u8) -> bool),
    Signed(fn(i8) -> bool),
    Wide(fn(u16) -> bool),
    Flag,
    SignalSpeed,
}

impl Kind {
    pub(crate) fn width(&self) -> usize {
        match *self {
            Kind::Wide(_) => 4,
            _ => 2,
        }
    }

    pub(crate) fn decode(&self, field: Field, bs: &[u8]) -> Result<Value> {
        match *self {
            Kind::Marker => {
                if bs != &MARKER[..] {
                    let raw = bs.iter().fold(0i32, |acc, &b| acc << 4 | i32::from(b));
                    return Err(Error::mismatch(field, raw));
                }
                Ok(Value::U8(0x5A))
            }
            Kind::Unsigned(valid) => {
                let v = nibble::decode_u8(bs)?;
                if !valid(v) {
                    return Err(Error::mismatch(field, v));
                }
                Ok(Value::U8(v))
            }
            Kind::Signed(valid) => {
                let v = nibble::decode_i8(bs)?;
                if !valid(v) {
                    return Err(Error::mismatch(field, v));
                }
                Ok(Value::I8(v))
            }
            Kind::Wide(valid) => {
                let v = nibble::decode_u16(bs)?;
                if !valid(v) {
                    return Err(Error::mismatch(field, v));
                }
                Ok(Value::U16(v))
            }
            Kind::Flag => nibble::decode_flag(bs).map(Value::Flag),
            Kind::SignalSpeed => {
                let code = nibble::decode_u8(bs)?;
                SignalSpeed::from_code(code)
                    .map(Value::SignalSpeed)
                    .ok_or_else(|| Error::mismatch(field, code))
            }
        }
    }
}

/// One step of the image walk.
pub(crate) enum Entry {
    Field(Field, Kind),
    /// Reserved wire bytes, left untouched.
    Skip(usize),
}

fn even(v: u8) -> bool {
    v % 2 == 0
}
fn up_to_127(v: u8) -> bool {
    v <= 127
}
fn up_to_10(v: u8) -> bool {
    v <= 10
}
fn nonzero(v: u8) -> bool {
    v != 0
}
fn pulse(v: u16) -> bool {
    (3500..=11500).contains(&v)
}
fn temperature(v: u8) -> bool {
    (1..=127).contains(&v)
}
fn current(v: u8) -> bool {
    (1..=63).contains(&v)
}
fn response(v: u8) -> bool {
    (1..=5).contains(&v)
}
fn offset(v: i8) -> bool {
    v != i8::MIN
}
fn id(v: u8) -> bool {
    v <= 31
}
fn stretch(v: u8) -> bool {
    v != 0 && v % 2 == 0
}

/// The image, left to right. Wire widths sum to 64.
pub(crate) static LAYOUT: [Entry; 22] = [
    Entry::Field(Field::Fixed, Kind::Marker),
    Entry::Field(Field::StretchGain, Kind::Unsigned(even)),
    Entry::Field(Field::Speed, Kind::Unsigned(up_to_127)),
    Entry::Field(Field::Punch, Kind::Unsigned(up_to_10)),
    Entry::Field(Field::DeadBand, Kind::Unsigned(up_to_10)),
    Entry::Field(Field::Damping, Kind::Unsigned(nonzero)),
    Entry::Field(Field::SafeTimer, Kind::Unsigned(nonzero)),
    Entry::Field(Field::Flag, Kind::Flag),
    Entry::Field(Field::MaximumPulseLimit, Kind::Wide(pulse)),
    Entry::Field(Field::MinimumPulseLimit, Kind::Wide(pulse)),
    Entry::Skip(2),
    Entry::Field(Field::SignalSpeed, Kind::SignalSpeed),
    Entry::Field(Field::TemperatureLimit, Kind::Unsigned(temperature)),
    Entry::Field(Field::CurrentLimit, Kind::Unsigned(current)),
    Entry::Skip(18),
    Entry::Field(Field::Response, Kind::Unsigned(response)),
    Entry::Field(Field::UserOffset, Kind::Signed(offset)),
    Entry::Skip(2),
    Entry::Field(Field::Id, Kind::Unsigned(id)),
    Entry::Field(Field::CharacteristicChangeStretch1, Kind::Unsigned(stretch)),
    Entry::Field(Field::CharacteristicChangeStretch2, Kind::Unsigned(stretch)),
    Entry::Field(Field::CharacteristicChangeStretch3, Kind::Unsigned(stretch)),
];
