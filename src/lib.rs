//! Rust implementation of the KONDO ICS serial servo protocol.
//!
//! The crate covers the servo EEPROM image codec, the half-duplex command
//! exchange with echo verification, and the joint layout of the KHR-3HV.
//!
//! ## Example
//!
//! ```ignore
//! extern crate kondo;
//!
//! use kondo::motors::KHR_3HV::{Joint, Robot};
//!
//! fn main() {
//!     let mut robot = Robot::new(
//!         kondo::with_ics(left_rx, left_tx),
//!         kondo::with_ics(right_rx, right_tx),
//!     );
//!
//!     let mut eeprom = robot.read_eeprom(Joint::LeftKnee).unwrap().clone();
//!     eeprom.speed = 100;
//!     robot.write_eeprom(Joint::LeftKnee, &eeprom).unwrap();
//!
//!     loop {
//!         let pos = robot.set_free(Joint::LeftKnee).unwrap();
//!         robot.set_position(Joint::RightKnee, pos).ok();
//!     }
//! }
//! ```

extern crate embedded_hal as hal;
use hal::serial::{Read, Write};

#[macro_use]
extern crate log;
#[macro_use(block)]
extern crate nb;

mod error;
pub mod eeprom;
pub mod motors;
pub mod nibble;
pub mod position;
pub mod protocol;

pub use error::{Error, Hex, Result};
pub use protocol::{Controller, SubCommand};

/// Create a controller for one ICS bus using a serial RX/TX
pub fn with_ics<RX, TX>(rx: RX, tx: TX) -> Controller<RX, TX>
where
    RX: Read<u8>,
    RX::Error: std::fmt::Debug,
    TX: Write<u8>,
    TX::Error: std::fmt::Debug,
{
    Controller::new(rx, tx)
}
