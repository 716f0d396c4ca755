use std::fmt;

use hal::serial::{Read, Write};

use super::{SubCommand, MAX_ID, RESPONSE_CAPACITY};
use crate::eeprom::{self, IMAGE_LEN};
use crate::error::{Error, Hex, Result};
use crate::position;

/// Consecutive empty polls after which a reply is considered complete.
const IDLE_POLLS: u32 = 10_000;

/// Reply to a position or free command: reply opcode, then the position pair.
const POSITION_REPLY_LEN: usize = 3;
/// Reply opcode and subcommand in front of every read reply.
const READ_HEADER_LEN: usize = 2;
/// Single-byte parameters come back as header plus value.
const PARAMETER_REPLY_LEN: usize = READ_HEADER_LEN + 1;

/// Controller for one servo bus.
///
/// Exchanges take `&mut self`, so a bus never has two requests in flight.
/// Drive each bus from its own owner to run them in parallel.
pub struct Controller<RX, TX> {
    rx: RX,
    tx: TX,

    idle_polls: u32,
}

impl<RX, TX> Controller<RX, TX>
where
    RX: Read<u8>,
    RX::Error: fmt::Debug,
    TX: Write<u8>,
    TX::Error: fmt::Debug,
{
    /// Create a new controller over a serial RX/TX pair.
    pub fn new(rx: RX, tx: TX) -> Controller<RX, TX> {
        Controller {
            rx,
            tx,
            idle_polls: IDLE_POLLS,
        }
    }
    /// Set how many consecutive empty polls end a reply.
    ///
    /// The count must outlast the servo's turnaround time between echo and
    /// answer at the polling rate of the receiver. A reply that arrives after
    /// the count ran out fails its command with [`Error::PayloadShape`] and is
    /// discarded before the next frame goes out.
    pub fn with_idle_polls(mut self, idle_polls: u32) -> Controller<RX, TX> {
        self.idle_polls = idle_polls;
        self
    }
    /// Release the serial pair.
    pub fn release(self) -> (RX, TX) {
        (self.rx, self.tx)
    }
    /// Move servo `id` to `target` and return the position it reports.
    pub fn set_position(&mut self, id: u8, target: u16) -> Result<u16> {
        let frame = Frame::position(id, target)?;
        self.position_exchange("position", &frame)
    }
    /// Release the torque of servo `id` and return its current position.
    pub fn set_free(&mut self, id: u8) -> Result<u16> {
        let frame = Frame::free(id)?;
        self.position_exchange("free", &frame)
    }
    /// Read `sc` from servo `id`.
    ///
    /// For [`SubCommand::Eeprom`] the returned payload is guaranteed to be a
    /// valid 64-byte image, for the other subcommands it is a single byte.
    pub fn read_eeprom(&mut self, id: u8, sc: SubCommand) -> Result<Vec<u8>> {
        let frame = Frame::read(id, sc)?;
        let reply_len = match sc {
            SubCommand::Eeprom => READ_HEADER_LEN + IMAGE_LEN,
            _ => PARAMETER_REPLY_LEN,
        };
        let response = self.write_then_read("read", &frame.as_bytes(), reply_len)?;
        let payload = response[READ_HEADER_LEN..].to_vec();
        if sc == SubCommand::Eeprom {
            eeprom::parse(&payload)?;
        }
        Ok(payload)
    }
    /// Write `payload` to `sc` of servo `id` and return the servo's
    /// acknowledgement: `[opcode, sc]` for an image, `[opcode, sc, value]`
    /// for a single parameter.
    ///
    /// An image sent with [`SubCommand::Eeprom`] must parse; a malformed one
    /// is refused before anything reaches the bus.
    pub fn write_eeprom(&mut self, id: u8, sc: SubCommand, payload: &[u8]) -> Result<Vec<u8>> {
        let reply_len = match sc {
            SubCommand::Eeprom => {
                eeprom::parse(payload)?;
                READ_HEADER_LEN
            }
            _ => PARAMETER_REPLY_LEN,
        };
        let frame = Frame::write(id, sc, payload)?;
        self.write_then_read("write", &frame.as_bytes(), reply_len)
    }
    /// Set the speed parameter of servo `id` (0 to 127).
    pub fn set_speed(&mut self, id: u8, speed: u8) -> Result<Vec<u8>> {
        if speed > 127 {
            return Err(Error::InvalidSpeed(speed));
        }
        self.write_eeprom(id, SubCommand::Speed, &[speed])
    }

    fn position_exchange(&mut self, command: &'static str, frame: &Frame) -> Result<u16> {
        let response = self.write_then_read(command, &frame.as_bytes(), POSITION_REPLY_LEN)?;
        Ok(position::decode(response[1], response[2]))
    }
    /// Write `frame`, read the echo and everything after it until the line
    /// goes idle, and return the part after the echo. That part must be
    /// exactly `reply_len` bytes long.
    fn write_then_read(&mut self, command: &'static str, frame: &[u8], reply_len: usize) -> Result<Vec<u8>> {
        self.discard()?;
        debug!("-> [{}]", Hex(frame));
        for &b in frame {
            block!(self.tx.write(b)).map_err(|e| Error::TransportWrite(format!("{:?}", e)))?;
        }
        block!(self.tx.flush()).map_err(|e| Error::TransportWrite(format!("{:?}", e)))?;

        let mut buf = [0u8; RESPONSE_CAPACITY];
        let (n, overflow) = self.recv(&mut buf)?;
        let read = &buf[..n];
        debug!("<- [{}]", Hex(read));

        if n < frame.len() {
            warn!("short echo: wrote {} bytes, read {}", frame.len(), n);
            return Err(Error::ShortEcho {
                sent: frame.to_vec(),
                received: read.to_vec(),
            });
        }
        let (echo, response) = read.split_at(frame.len());
        if echo != frame {
            warn!("echo mismatch: [{}] came back as [{}]", Hex(frame), Hex(echo));
            return Err(Error::EchoMismatch {
                sent: frame.to_vec(),
                echoed: echo.to_vec(),
            });
        }
        if overflow > 0 || response.len() != reply_len {
            warn!(
                "{} reply: expected {} bytes after the echo, got {}",
                command,
                reply_len,
                response.len() + overflow
            );
            return Err(Error::PayloadShape {
                command,
                expected: reply_len,
                response: response.to_vec(),
            });
        }
        Ok(response.to_vec())
    }
    /// Read until the line goes idle. Blocks until the first byte arrives.
    /// Bytes that do not fit `buf` are consumed and counted; returns the
    /// number kept and the number dropped.
    fn recv(&mut self, buf: &mut [u8]) -> Result<(usize, usize)> {
        let mut len = 0;
        let mut overflow = 0;
        let mut idle = 0;
        loop {
            match self.rx.read() {
                Ok(b) => {
                    if len < buf.len() {
                        buf[len] = b;
                        len += 1;
                    } else {
                        overflow += 1;
                    }
                    idle = 0;
                }
                Err(nb::Error::WouldBlock) => {
                    if len > 0 {
                        idle += 1;
                        if idle >= self.idle_polls {
                            break;
                        }
                    }
                }
                Err(nb::Error::Other(e)) => return Err(Error::TransportRead(format!("{:?}", e))),
            }
        }
        Ok((len, overflow))
    }
    /// Drop whatever is already waiting in the receiver, such as a reply that
    /// arrived after its exchange gave up.
    fn discard(&mut self) -> Result<usize> {
        let mut stale = 0;
        loop {
            match self.rx.read() {
                Ok(_) => stale += 1,
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(Error::TransportRead(format!("{:?}", e))),
            }
        }
        if stale > 0 {
            warn!("discarded {} stale bytes", stale);
        }
        Ok(stale)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Instruction {
    Position = 0b1000_0000,
    Read = 0b1010_0000,
    Write = 0b1100_0000,
}

/// Frames are `[INST | ID, PARAM 1, ..., PARAM N]`.
#[derive(Debug)]
struct Frame {
    id: u8,
    instruction: Instruction,
    parameters: Vec<u8>,
}
impl Frame {
    fn new(id: u8, instruction: Instruction, parameters: Vec<u8>) -> Result<Frame> {
        if id > MAX_ID {
            return Err(Error::parameter("id", u32::from(id), 0, u32::from(MAX_ID)));
        }
        Ok(Frame {
            id,
            instruction,
            parameters,
        })
    }
    fn position(id: u8, target: u16) -> Result<Frame> {
        let [high, low] = position::encode(target)?;
        Frame::new(id, Instruction::Position, vec![high, low])
    }
    fn free(id: u8) -> Result<Frame> {
        Frame::new(id, Instruction::Position, vec![0, 0])
    }
    fn read(id: u8, sc: SubCommand) -> Result<Frame> {
        Frame::new(id, Instruction::Read, vec![sc as u8])
    }
    fn write(id: u8, sc: SubCommand, payload: &[u8]) -> Result<Frame> {
        let mut parameters = Vec::with_capacity(1 + payload.len());
        parameters.push(sc as u8);
        parameters.extend_from_slice(payload);
        Frame::new(id, Instruction::Write, parameters)
    }
    fn as_bytes(&self) -> Vec<u8> {
        let mut buff = vec![self.instruction as u8 | self.id];
        buff.extend(&self.parameters);
        buff
    }
}
