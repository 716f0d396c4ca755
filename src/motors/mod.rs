//! Per-servo state and robot models built on top of the [`Controller`].

use std::fmt;

use hal::serial::{Read, Write};

use crate::eeprom::{self, Eeprom};
use crate::error::{Error, Result};
use crate::protocol::{Controller, SubCommand};

#[allow(non_snake_case)]
pub mod KHR_3HV;

/// Which of the two serial buses a servo hangs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bus {
    /// Head and the left limbs.
    Left,
    /// Waist and the right limbs.
    Right,
}

/// Last known state of one servo.
///
/// Every cached value is only replaced by a successful round trip; a failed
/// command leaves the cache as it was.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Motor {
    id: u8,
    position: u16,
    stretch: u8,
    speed: u8,
    current: u8,
    temperature: u8,
    image: Option<Vec<u8>>,
    eeprom: Option<Eeprom>,
    last_sent: Option<u16>,
}

impl Motor {
    /// A servo at `id` with nothing cached yet.
    pub fn new(id: u8) -> Motor {
        Motor {
            id,
            position: 0,
            stretch: 0,
            speed: 0,
            current: 0,
            temperature: 0,
            image: None,
            eeprom: None,
            last_sent: None,
        }
    }

    /// ID the servo is addressed by on its bus.
    pub fn id(&self) -> u8 {
        self.id
    }
    pub(crate) fn set_id(&mut self, id: u8) {
        self.id = id;
    }
    /// Position reported by the last position or free command.
    pub fn position(&self) -> u16 {
        self.position
    }
    /// Last stretch value read.
    pub fn stretch(&self) -> u8 {
        self.stretch
    }
    /// Last speed written or read.
    pub fn speed(&self) -> u8 {
        self.speed
    }
    /// Last current value read.
    pub fn current(&self) -> u8 {
        self.current
    }
    /// Last temperature read.
    pub fn temperature(&self) -> u8 {
        self.temperature
    }
    /// Last EEPROM record read from or written to the servo.
    pub fn eeprom(&self) -> Option<&Eeprom> {
        self.eeprom.as_ref()
    }
    /// Raw image behind [`Motor::eeprom`].
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }
    /// Last target successfully sent with a position command.
    pub fn last_sent(&self) -> Option<u16> {
        self.last_sent
    }

    pub(crate) fn set_position<RX, TX>(&mut self, bus: &mut Controller<RX, TX>, target: u16) -> Result<u16>
    where
        RX: Read<u8>,
        RX::Error: fmt::Debug,
        TX: Write<u8>,
        TX::Error: fmt::Debug,
    {
        let current = bus.set_position(self.id, target)?;
        self.position = current;
        self.last_sent = Some(target);
        Ok(current)
    }

    pub(crate) fn set_free<RX, TX>(&mut self, bus: &mut Controller<RX, TX>) -> Result<u16>
    where
        RX: Read<u8>,
        RX::Error: fmt::Debug,
        TX: Write<u8>,
        TX::Error: fmt::Debug,
    {
        let current = bus.set_free(self.id)?;
        self.position = current;
        Ok(current)
    }

    pub(crate) fn set_speed<RX, TX>(&mut self, bus: &mut Controller<RX, TX>, speed: u8) -> Result<Vec<u8>>
    where
        RX: Read<u8>,
        RX::Error: fmt::Debug,
        TX: Write<u8>,
        TX::Error: fmt::Debug,
    {
        let response = bus.set_speed(self.id, speed)?;
        self.speed = speed;
        Ok(response)
    }

    /// Read one single-byte parameter (stretch, speed, current or
    /// temperature) into the cache. The whole image goes through
    /// [`Motor::read_eeprom`] instead.
    pub(crate) fn refresh<RX, TX>(&mut self, bus: &mut Controller<RX, TX>, sc: SubCommand) -> Result<u8>
    where
        RX: Read<u8>,
        RX::Error: fmt::Debug,
        TX: Write<u8>,
        TX::Error: fmt::Debug,
    {
        if sc == SubCommand::Eeprom {
            return Err(Error::parameter("subcommand", 0, 1, 4));
        }
        let payload = bus.read_eeprom(self.id, sc)?;
        if payload.len() != 1 {
            return Err(Error::PayloadShape {
                command: "read",
                expected: 1,
                response: payload,
            });
        }
        let value = payload[0];
        match sc {
            SubCommand::Stretch => self.stretch = value,
            SubCommand::Speed => self.speed = value,
            SubCommand::Current => self.current = value,
            SubCommand::Temperature => self.temperature = value,
            SubCommand::Eeprom => unreachable!(),
        }
        Ok(value)
    }

    pub(crate) fn read_eeprom<RX, TX>(&mut self, bus: &mut Controller<RX, TX>) -> Result<&Eeprom>
    where
        RX: Read<u8>,
        RX::Error: fmt::Debug,
        TX: Write<u8>,
        TX::Error: fmt::Debug,
    {
        let image = bus.read_eeprom(self.id, SubCommand::Eeprom)?;
        let record = eeprom::parse(&image)?;
        self.image = Some(image);
        Ok(&*self.eeprom.insert(record))
    }

    /// Compose `record` over the cached image and write it. The image is read
    /// from the servo first if nothing is cached yet.
    pub(crate) fn write_eeprom<RX, TX>(&mut self, bus: &mut Controller<RX, TX>, record: &Eeprom) -> Result<Vec<u8>>
    where
        RX: Read<u8>,
        RX::Error: fmt::Debug,
        TX: Write<u8>,
        TX::Error: fmt::Debug,
    {
        if self.image.is_none() {
            self.read_eeprom(bus)?;
        }
        let original = self.image.as_deref().unwrap_or_default();
        let image = eeprom::compose(original, record)?;
        let response = bus.write_eeprom(self.id, SubCommand::Eeprom, &image)?;
        self.eeprom = Some(eeprom::parse(&image)?);
        self.image = Some(image);
        Ok(response)
    }
}
