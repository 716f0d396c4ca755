//! KONDO ICS command protocol.
//!
//! Every command is one frame written to the bus followed by one read. The
//! half-duplex line echoes the written bytes back before the servo answers,
//! so a reply is only trusted once its echo prefix matches the frame.

mod ics;
#[cfg(test)]
pub(crate) mod mock;

pub use self::ics::Controller;

/// Largest read of a single exchange: a 66 byte EEPROM write echo plus its
/// 2 byte acknowledgement, or a 2 byte read echo plus a 66 byte reply.
pub const RESPONSE_CAPACITY: usize = 68;

/// Highest servo ID an opcode can address.
pub const MAX_ID: u8 = 31;

/// Serial line parameters the servo bus runs at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub even_parity: bool,
    pub stop_bits: u8,
}

/// Settings startup code should open each bus with.
pub const LINE_SETTINGS: LineSettings = LineSettings {
    baud_rate: 1_250_000,
    data_bits: 8,
    even_parity: true,
    stop_bits: 1,
};

/// Target of an EEPROM read or write command.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubCommand {
    /// The whole 64-byte image.
    Eeprom = 0x00,
    Stretch = 0x01,
    Speed = 0x02,
    Current = 0x03,
    Temperature = 0x04,
}
