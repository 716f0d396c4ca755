//! Scripted serial pair for tests.
//!
//! `loopback` behaves like the real half-duplex bus: every written byte is
//! echoed back, followed by the next queued reply once the frame is flushed.
//! `raw` never echoes, so a queued reply is the whole read.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Wire {
    echo: bool,
    written: Vec<u8>,
    pending: Vec<u8>,
    inbox: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
}

pub(crate) struct FakeRx(Arc<Mutex<Wire>>);
pub(crate) struct FakeTx(Arc<Mutex<Wire>>);

/// Test-side handle on the wire shared by a `FakeRx`/`FakeTx` pair.
#[derive(Clone)]
pub(crate) struct Probe(Arc<Mutex<Wire>>);

fn pair(echo: bool) -> (FakeRx, FakeTx, Probe) {
    let wire = Arc::new(Mutex::new(Wire {
        echo,
        ..Wire::default()
    }));
    (FakeRx(wire.clone()), FakeTx(wire.clone()), Probe(wire))
}

pub(crate) fn loopback() -> (FakeRx, FakeTx, Probe) {
    pair(true)
}

pub(crate) fn raw() -> (FakeRx, FakeTx, Probe) {
    pair(false)
}

impl Probe {
    /// Queue the bytes the bus returns after the next flushed frame.
    pub(crate) fn reply(&self, bytes: &[u8]) {
        self.0.lock().unwrap().replies.push_back(bytes.to_vec());
    }
    /// Bytes that reach the receiver right away, outside any exchange.
    pub(crate) fn inject(&self, bytes: &[u8]) {
        self.0.lock().unwrap().inbox.extend(bytes);
    }
    /// Everything written so far; clears the record.
    pub(crate) fn written(&self) -> Vec<u8> {
        let mut wire = self.0.lock().unwrap();
        ::std::mem::replace(&mut wire.written, Vec::new())
    }
    pub(crate) fn fail_reads(&self) {
        self.0.lock().unwrap().fail_reads = true;
    }
    pub(crate) fn fail_writes(&self) {
        self.0.lock().unwrap().fail_writes = true;
    }
}

impl hal::serial::Read<u8> for FakeRx {
    type Error = &'static str;
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let mut wire = self.0.lock().unwrap();
        if wire.fail_reads {
            return Err(nb::Error::Other("framing error"));
        }
        wire.inbox.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl hal::serial::Write<u8> for FakeTx {
    type Error = &'static str;
    fn write(&mut self, b: u8) -> nb::Result<(), Self::Error> {
        let mut wire = self.0.lock().unwrap();
        if wire.fail_writes {
            return Err(nb::Error::Other("port closed"));
        }
        wire.written.push(b);
        wire.pending.push(b);
        Ok(())
    }
    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        let mut wire = self.0.lock().unwrap();
        let frame = ::std::mem::replace(&mut wire.pending, Vec::new());
        if wire.echo {
            wire.inbox.extend(frame);
        }
        if let Some(reply) = wire.replies.pop_front() {
            wire.inbox.extend(reply);
        }
        Ok(())
    }
}
