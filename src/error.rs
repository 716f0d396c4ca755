use std::fmt;

use crate::eeprom::Field;

/// Errors raised by the codecs, the transport and the robot topology.
///
/// Nothing is retried internally: every error goes straight back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A byte slice does not have the length its decoder requires.
    #[error("data length mismatch: expected {expected} bytes, got {actual}")]
    DataLength { expected: usize, actual: usize },
    /// A decoded field violates its validity domain.
    #[error("field `{field}` holds {value}, which is outside its valid domain")]
    DataMismatch { field: Field, value: i32 },
    /// A wire byte that should carry a single nibble is above 0x0F.
    #[error("wire byte {0:#04X} is not a nibble")]
    Nibble(u8),
    /// The serial transmitter failed.
    #[error("serial write failed: {0}")]
    TransportWrite(String),
    /// The serial receiver failed.
    #[error("serial read failed: {0}")]
    TransportRead(String),
    /// The bytes echoed by the bus differ from the bytes written.
    #[error("echo mismatch: sent [{}], echoed [{}]", Hex(.sent), Hex(.echoed))]
    EchoMismatch { sent: Vec<u8>, echoed: Vec<u8> },
    /// The bus returned fewer bytes than were written.
    #[error("short echo: sent [{}], received only [{}]", Hex(.sent), Hex(.received))]
    ShortEcho { sent: Vec<u8>, received: Vec<u8> },
    /// The reply following the echo has the wrong size for the command.
    #[error("{command} reply should carry {expected} bytes, got [{}]", Hex(.response))]
    PayloadShape {
        command: &'static str,
        expected: usize,
        response: Vec<u8>,
    },
    #[error("speed {0} is above 127")]
    InvalidSpeed(u8),
    #[error("{name} {value} is outside {min}..={max}")]
    InvalidParameter {
        name: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("no joint is named `{0}`")]
    UnknownJoint(String),
    /// A joint was addressed through the side that does not own it.
    #[error("joint `{0}` is on the other bus")]
    WrongBus(&'static str),
    /// `Eeprom::set` was handed a value of the wrong kind for the field.
    #[error("field `{0}` cannot be assigned this kind of value")]
    FieldType(Field),
}

impl Error {
    pub(crate) fn length(expected: usize, actual: usize) -> Error {
        Error::DataLength { expected, actual }
    }
    pub(crate) fn mismatch<V: Into<i32>>(field: Field, value: V) -> Error {
        Error::DataMismatch {
            field,
            value: value.into(),
        }
    }
    pub(crate) fn parameter(name: &'static str, value: u32, min: u32, max: u32) -> Error {
        Error::InvalidParameter {
            name,
            value,
            min,
            max,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Space separated upper-case hex rendering of a byte slice, for logs and errors.
pub struct Hex<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}
