//! Register-map emulation of an ANC350 controller.
//!
//! Good enough to drive the engine, poller and CLI without hardware: reads
//! and writes hit a table keyed by `(address, index)`, and the motion
//! commands update the counters and status bits the way a finished move
//! would. Moves complete instantly.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use anc350_telegram::address::{self, status, Access, Parameter, Scope};
use anc350_telegram::{
    decode_telegram, encode_telegram, Ack, Header, Reason, Telegram, TelegramError,
    TelegramReader, TelegramWriter,
};
use anc350_transport::{ControllerStream, TcpEndpoint, Transport};
use bytes::BytesMut;
use tracing::{debug, info, warn};

use crate::correlation::MAX_CORRELATION;
use crate::error::Result;

/// Default drive amplitude in mV.
const DEFAULT_AMPLITUDE: i32 = 30_000;
/// Default sensor reference voltage in mV.
const DEFAULT_SENSOR_VOLTAGE: i32 = 2_000;

/// Misbehaviour applied to the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Apply the request but send no reply.
    Silence,
    /// Reply with a correlation number that does not match.
    WrongCorrelation,
}

#[derive(Debug)]
struct SimState {
    axes: usize,
    registers: HashMap<(i32, i32), i32>,
    faults: VecDeque<Fault>,
    requests: u64,
}

impl SimState {
    fn register(&self, address: i32, index: i32) -> i32 {
        self.registers.get(&(address, index)).copied().unwrap_or(0)
    }

    fn store(&mut self, address: i32, index: i32, value: i32) {
        self.registers.insert((address, index), value);
    }

    fn update_status(&mut self, index: i32, set: i32, clear: i32) {
        let bits = self.register(address::STATUS, index);
        self.store(address::STATUS, index, (bits | set) & !clear);
    }

    fn check(&self, parameter: &Parameter, index: i32) -> std::result::Result<(), Reason> {
        let valid = match parameter.scope {
            Scope::Axis => (0..self.axes as i32).contains(&index),
            Scope::Trigger => (0..=address::MAX_TRIGGER_INDEX).contains(&index),
            Scope::Controller => index == 0,
        };
        if valid {
            Ok(())
        } else {
            Err(Reason::Range)
        }
    }

    fn get(&self, header: &Header) -> std::result::Result<i32, Reason> {
        let parameter = Parameter::lookup(header.address).ok_or(Reason::InvalidAddress)?;
        self.check(parameter, header.index)?;
        Ok(self.register(header.address, header.index))
    }

    fn set(&mut self, header: &Header, value: i32) -> std::result::Result<i32, Reason> {
        let parameter = Parameter::lookup(header.address).ok_or(Reason::InvalidAddress)?;
        self.check(parameter, header.index)?;
        if matches!(parameter.access, Access::ReadOnly | Access::EventOnly) {
            return Err(Reason::Ignored);
        }

        let index = header.index;
        match header.address {
            address::ACTORPS_SAVE
                if value != address::ACTORPS_SAVE_STORE && value != address::ACTORPS_SAVE_CLEAR =>
            {
                return Err(Reason::Range);
            }
            address::RUN_TARGET => {
                let target = self.register(address::TARGET, index);
                self.store(address::COUNTER, index, target);
                self.update_status(index, 0, status::RUNNING);
            }
            address::RUN_RELATIVE => {
                let counter = self.register(address::COUNTER, index);
                let step = self.register(address::TARGET, index);
                self.store(address::COUNTER, index, counter.wrapping_add(step));
                self.update_status(index, 0, status::RUNNING);
            }
            address::CONT_FWD | address::CONT_BKWD => {
                // The reference mark is found as soon as the actor starts.
                let counter = self.register(address::COUNTER, index);
                self.store(address::REFCOUNTER, index, counter);
                self.update_status(index, status::RUNNING | status::REF_VALID, 0);
            }
            address::SGL_FWD | address::SGL_BKWD => {
                self.update_status(index, 0, status::RUNNING);
            }
            address::POS_RESET => self.store(address::COUNTER, index, 0),
            address::MOVE_REF => {
                let reference = self.register(address::REFCOUNTER, index);
                self.store(address::COUNTER, index, reference);
            }
            _ => {}
        }
        self.store(header.address, index, value);
        Ok(value)
    }
}

/// Shared handle to one simulated controller.
#[derive(Debug, Clone)]
pub struct Simulator {
    state: Arc<Mutex<SimState>>,
}

impl Simulator {
    /// A powered-up controller with `axes` enabled axes at position 0.
    pub fn new(axes: usize) -> Self {
        let mut state = SimState {
            axes,
            registers: HashMap::new(),
            faults: VecDeque::new(),
            requests: 0,
        };
        for index in 0..axes as i32 {
            state.store(address::STATUS, index, status::ENABLE);
            state.store(address::AMPL, index, DEFAULT_AMPLITUDE);
            state.store(address::UNIT, index, 0x02);
        }
        state.store(address::TEMP_STATUS, 0, 1);
        state.store(address::SENSOR_VOLT, 0, DEFAULT_SENSOR_VOLTAGE);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn axes(&self) -> usize {
        self.lock().axes
    }

    pub fn register(&self, address: i32, index: i32) -> i32 {
        self.lock().register(address, index)
    }

    /// Overwrite a register directly, bypassing access checks and effects.
    pub fn set_register(&self, address: i32, index: i32, value: i32) {
        self.lock().store(address, index, value);
    }

    /// Queue a fault for an upcoming request. Faults apply in order.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Requests handled so far.
    pub fn requests(&self) -> u64 {
        self.lock().requests
    }

    /// Apply one request and build the reply, if one is due.
    ///
    /// Only Get and Set are answered, and only when they carry a non-zero
    /// correlation number.
    pub fn handle(&self, request: &Telegram) -> Option<Telegram> {
        let mut state = self.lock();
        state.requests += 1;
        let header = *request.header();

        let outcome = match request {
            Telegram::Get(header) => state.get(header),
            Telegram::Set { header, data } => state.set(header, data.first().copied()?),
            Telegram::Ack(_) | Telegram::Tell { .. } => return None,
        };
        let fault = state.faults.pop_front();
        drop(state);

        if header.correlation == 0 || fault == Some(Fault::Silence) {
            return None;
        }

        let correlation = if fault == Some(Fault::WrongCorrelation) {
            header.correlation % MAX_CORRELATION + 1
        } else {
            header.correlation
        };
        let (reason, value) = match outcome {
            Ok(value) => (Reason::Ok, value),
            Err(reason) => (reason, 0),
        };
        Some(Telegram::Ack(Ack {
            header: Header {
                correlation,
                ..header
            },
            reason: reason.code(),
            data: vec![value],
        }))
    }

    /// An in-memory link to this simulator.
    pub fn link(&self) -> SimLink {
        SimLink {
            sim: self.clone(),
            inbound: BytesMut::new(),
            outbound: VecDeque::new(),
            chunk: usize::MAX,
        }
    }

    /// Serve connections accepted on `endpoint`, one thread each. Blocks.
    pub fn serve(&self, endpoint: &TcpEndpoint) -> Result<()> {
        info!(addr = %endpoint.local_addr(), "simulator serving");
        loop {
            let stream = endpoint.accept()?;
            let sim = self.clone();
            thread::spawn(move || sim.serve_connection(stream));
        }
    }

    /// Bind `addr` and serve it from a background thread.
    pub fn spawn(&self, addr: &str) -> Result<SocketAddr> {
        let endpoint = TcpEndpoint::bind(addr)?;
        let local_addr = endpoint.local_addr();
        let sim = self.clone();
        thread::spawn(move || {
            if let Err(err) = sim.serve(&endpoint) {
                warn!(error = %err, "simulator stopped");
            }
        });
        Ok(local_addr)
    }

    fn serve_connection(&self, stream: ControllerStream) {
        let peer = stream.peer_addr().ok();
        let write_half = match stream.try_clone() {
            Ok(write_half) => write_half,
            Err(err) => {
                warn!(error = %err, "cannot split simulator connection");
                return;
            }
        };
        let mut reader = TelegramReader::new(stream);
        let mut writer = TelegramWriter::new(write_half);

        loop {
            let request = match reader.read_telegram() {
                Ok(request) => request,
                Err(TelegramError::ConnectionClosed) => break,
                Err(err) => {
                    warn!(error = %err, "dropping simulator connection");
                    break;
                }
            };
            debug!(
                opcode = %request.opcode(),
                address = request.header().address,
                index = request.header().index,
                correlation = request.correlation(),
                "simulator request"
            );
            if let Some(reply) = self.handle(&request) {
                if let Err(err) = writer.send(&reply) {
                    warn!(error = %err, "simulator reply failed");
                    break;
                }
            }
        }
        debug!(?peer, "simulator connection closed");
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(3)
    }
}

/// In-memory [`Transport`] wired straight into a [`Simulator`].
///
/// Replies become readable as soon as the request has been written. An
/// empty receive side reads as a timeout.
#[derive(Debug)]
pub struct SimLink {
    sim: Simulator,
    inbound: BytesMut,
    outbound: VecDeque<u8>,
    chunk: usize,
}

impl SimLink {
    /// Deliver replies in reads of at most `chunk` bytes.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Queue raw bytes on the receive side, as if sent unsolicited.
    pub fn push_unsolicited(&mut self, bytes: &[u8]) {
        self.outbound.extend(bytes);
    }
}

impl Read for SimLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outbound.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(self.chunk).min(self.outbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inbound.extend_from_slice(buf);
        while let Some(request) = decode_telegram(&mut self.inbound).map_err(io::Error::other)? {
            if let Some(reply) = self.sim.handle(&request) {
                let mut wire = BytesMut::new();
                encode_telegram(&reply, &mut wire).map_err(io::Error::other)?;
                self.outbound.extend(wire.iter());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for SimLink {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> anc350_transport::Result<()> {
        Ok(())
    }

    fn discard_pending(&mut self) -> anc350_transport::Result<usize> {
        let n = self.outbound.len();
        self.outbound.clear();
        Ok(n)
    }
}
