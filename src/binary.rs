//! The register/FIFO protocol spoken by the NanoVNA V2 (S-A-A-2) family.
//!
//! Every frame is a one-byte opcode, a one-byte register address, and a fixed
//! width little-endian payload. The sweep is configured by writing the start,
//! step and point-count registers, and measurements are streamed back from a
//! FIFO as 32-byte [`FifoRecord`]s.
//!
//! ```rust
//! # use nanovna::{binary::{self, SweepProgram}, transport::Transport};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Transport::open_serial("/dev/ttyACM0")?;
//! let program = SweepProgram::new(100_000_000, 1_000_000, 101, false);
//! binary::program_sweep(&transport, &program, Duration::from_millis(50))?;
//! let samples = binary::read_sweep(&transport, 101, false, Duration::ZERO)?;
//! # Ok(())
//! # }
//! ```

use crate::{
    backend::Backend,
    error::{BinaryError, FifoShortReadError},
    transport::{Exchange, Transport},
};
use num_complex::Complex64;
use std::{io, thread, time::Duration};

/// Define `u8` constants for a table of protocol codes along with a `name()`
/// lookup used when logging frames.
///
/// Each code is a brace-enclosed (`{...}`) item holding the numerical value
/// and the name as space-separated idents. The constant is named after the
/// words in upper snake case.
macro_rules! define_codes {
    // Main entry case. Concatenate the words in the name before generating the
    // constants.
    (
        $(
            { $value:literal, $($name_word:ident)+ }
        ),+
        $(,)?
    ) => {
        paste::paste! {
            define_codes!{@main
                $({
                    $value,
                    $($name_word)+,
                    [< $($name_word:camel)+ >]
                }),+
            }
        }
    };

    (@main
        $(
            { $value:literal, $($name_word:ident)+, $name:ident }
        ),+
    ) => {
        paste::paste! {
            $(
                #[doc = "The" $(" " $name_word)+ " (`" $value "`) code."]
                pub const [< $name:snake:upper >]: u8 = $value;
            )+

            /// Get the name of a code.
            ///
            /// Returns None if the code is not recognized.
            pub fn name(code: u8) -> Option<&'static str> {
                match code {
                    $(
                        $value => Some(stringify!($($name_word)+)),
                    )+
                    _ => None,
                }
            }
        }
    };
}

pub mod command;
mod record;
pub mod register;

pub use record::FifoRecord;

/// The frame that returns the protocol parser to a known state.
pub const RESET: [u8; 8] = [0; 8];
/// The maximum number of records requested by a single FIFO read.
pub const MAX_BATCH: usize = 255;
/// The lowest sweep start frequency the hardware accepts, in Hz.
pub const MIN_START_FREQUENCY: u64 = 50_000;
/// The register that selects the ADF4350 output power.
const TX_POWER_REGISTER: u8 = register::ADF4350_TX_POWER;

/// The width of a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// One byte, sent with [`WRITE`](command::WRITE).
    One,
    /// Two bytes, sent with [`WRITE2`](command::WRITE2).
    Two,
    /// Four bytes, sent with [`WRITE4`](command::WRITE4).
    Four,
    /// Eight bytes, sent with [`WRITE8`](command::WRITE8).
    Eight,
}

impl Width {
    const fn opcode(self) -> u8 {
        match self {
            Width::One => command::WRITE,
            Width::Two => command::WRITE2,
            Width::Four => command::WRITE4,
            Width::Eight => command::WRITE8,
        }
    }

    const fn len(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
            Width::Eight => 8,
        }
    }
}

/// Append a register write frame to `frame`.
///
/// Only the low `width` bytes of `value` are sent.
pub fn encode_write(frame: &mut Vec<u8>, address: u8, value: u64, width: Width) {
    frame.push(width.opcode());
    frame.push(address);
    frame.extend_from_slice(&value.to_le_bytes()[..width.len()]);
}

/// Write the eight zero bytes that reset the protocol parser.
pub fn reset_protocol<B: Backend>(exchange: &mut Exchange<'_, B>) -> Result<(), BinaryError> {
    exchange.write(&RESET)?;
    Ok(())
}

/// Write a single register.
pub fn write_register<B: Backend>(
    transport: &Transport<B>,
    address: u8,
    value: u64,
    width: Width,
) -> Result<(), BinaryError> {
    let mut frame = Vec::with_capacity(2 + width.len());
    encode_write(&mut frame, address, value, width);
    transport.lock()?.write(&frame)?;
    log::debug!(
        "set register {} (0x{address:02x}, {} bytes) to 0x{value:x}",
        register::name(address).unwrap_or("<unknown>"),
        width.len()
    );
    Ok(())
}

/// Read two single-byte registers in one request.
///
/// The instrument needs time to prepare the answer, so nothing is read until
/// `settle` has elapsed. A missing answer is fatal: the caller cannot proceed
/// without the identity these registers hold.
pub fn read_register_pair<B: Backend>(
    transport: &Transport<B>,
    first: u8,
    second: u8,
    settle: Duration,
) -> Result<[u8; 2], BinaryError> {
    let mut exchange = transport.lock()?;
    exchange.write(&[command::READ, first, command::READ, second])?;
    thread::sleep(settle);
    let response = exchange.read(2)?;
    match response[..] {
        [a, b] => Ok([a, b]),
        _ => {
            log::error!(
                "timeout reading registers {} and {}, got {response:?}",
                register::name(first).unwrap_or("<unknown>"),
                register::name(second).unwrap_or("<unknown>"),
            );
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout reading version registers").into())
        }
    }
}

/// The register values describing one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgram {
    /// The first frequency, in Hz.
    pub start: u64,
    /// The distance between consecutive frequencies, in Hz.
    pub step: u64,
    /// The number of frequencies.
    pub points: u16,
    /// Whether to sweep one extra, leading, throwaway point.
    ///
    /// Firmware up to 1.0.1 returns garbage for the first point of a sweep.
    pub s21_hack: bool,
}

impl SweepProgram {
    /// Create a new program.
    pub const fn new(start: u64, step: u64, points: u16, s21_hack: bool) -> Self {
        SweepProgram {
            start,
            step,
            points,
            s21_hack,
        }
    }

    /// The frame writing the start, step, points and values-per-frequency registers.
    ///
    /// With the S21 hack the sweep starts one step early and has one more
    /// point. The start frequency never drops below [`MIN_START_FREQUENCY`].
    pub fn encode(&self) -> Vec<u8> {
        let hack = u64::from(self.s21_hack);
        let start = self.start.saturating_sub(self.step * hack).max(MIN_START_FREQUENCY);
        let mut frame = Vec::with_capacity(32);
        encode_write(&mut frame, register::SWEEP_START, start, Width::Eight);
        encode_write(&mut frame, register::SWEEP_STEP, self.step, Width::Eight);
        encode_write(
            &mut frame,
            register::SWEEP_POINTS,
            u64::from(self.points) + hack,
            Width::Two,
        );
        encode_write(&mut frame, register::SWEEP_VALS_PER_FREQ, 1, Width::Two);
        frame
    }
}

/// Reprogram the instrument's sweep and wait for it to take effect.
pub fn program_sweep<B: Backend>(
    transport: &Transport<B>,
    program: &SweepProgram,
    wait: Duration,
) -> Result<(), BinaryError> {
    log::info!(
        "{}: set sweep start {} step {}",
        transport.name(),
        program.start,
        program.step
    );
    let mut exchange = transport.lock()?;
    exchange.write(&program.encode())?;
    thread::sleep(wait);
    Ok(())
}

/// The read timeout for FIFO batches of a sweep of `points` points.
///
/// Empirically a 101 point batch takes just over 3 seconds and a 255 point
/// batch about 7 seconds.
pub fn batch_timeout(points: usize) -> Duration {
    Duration::from_millis(points.min(MAX_BATCH) as u64 * 35 + 100)
}

/// Read one full sweep from the FIFO.
///
/// Returns the (reflection, through) coefficients for each of the `points`
/// frequencies, ordered by frequency index. The FIFO is read in batches of at
/// most [`MAX_BATCH`] records. If a batch comes back short, one more read is
/// attempted for the remainder before the sweep is abandoned with a
/// [`FifoShortReadError`].
#[allow(clippy::cast_possible_truncation)]
pub fn read_sweep<B: Backend>(
    transport: &Transport<B>,
    points: usize,
    s21_hack: bool,
    pause: Duration,
) -> Result<Vec<(Complex64, Complex64)>, BinaryError> {
    let total = points + usize::from(s21_hack);
    let mut exchange = transport.lock()?;
    reset_protocol(&mut exchange)?;
    thread::sleep(pause);
    exchange.write(&[command::WRITE, register::VALUES_FIFO, 0])?;
    thread::sleep(pause);

    let mut sweep = vec![(Complex64::default(), Complex64::default()); total];
    let mut guard = exchange.timeout_guard(Some(batch_timeout(total)))?;
    let mut remaining = total;
    while remaining > 0 {
        let batch = remaining.min(MAX_BATCH);
        guard.write(&[command::READFIFO, register::VALUES_FIFO, batch as u8])?;
        thread::sleep(pause);

        let expected = batch * FifoRecord::LEN;
        let mut bytes = guard.read(expected)?;
        if bytes.len() != expected {
            log::warn!("expected {expected} bytes, got {}", bytes.len());
            // Keep what already arrived and try once for the rest.
            let rest = guard.read(expected - bytes.len())?;
            bytes.extend_from_slice(&rest);
        }
        if bytes.len() != expected {
            return Err(FifoShortReadError::new(expected, bytes.len()).into());
        }
        place_records(&bytes, &mut sweep);
        remaining -= batch;
    }
    drop(guard);

    if s21_hack {
        sweep.remove(0);
    }
    Ok(sweep)
}

/// Decode every record in `bytes` into `sweep` at its frequency index.
fn place_records(bytes: &[u8], sweep: &mut [(Complex64, Complex64)]) {
    let mut last_index = None;
    for (i, record) in bytes
        .chunks_exact(FifoRecord::LEN)
        .filter_map(FifoRecord::decode)
        .enumerate()
    {
        if i == 0 {
            log::debug!("freq index from: {}", record.freq_index);
        }
        let index = usize::from(record.freq_index);
        match sweep.get_mut(index) {
            Some(slot) => *slot = (record.reflection(), record.transmission()),
            None => log::warn!("discarding record with out of range frequency index {index}"),
        }
        last_index = Some(index);
    }
    if let Some(index) = last_index {
        log::debug!("freq index to: {index}");
    }
}

/// The output power levels of the ADF4350 synthesizer, which drives the port
/// from 140 MHz upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxPower {
    /// 9 dB below maximum.
    Attenuation9dB = 0,
    /// 6 dB below maximum.
    Attenuation6dB = 1,
    /// 3 dB below maximum.
    Attenuation3dB = 2,
    /// Full power, the default.
    Maximum = 3,
}

impl TxPower {
    /// The lowest frequency the ADF4350 power setting applies to, in Hz.
    pub const RANGE_START: u64 = 140_000_000;

    /// Every level, from the default (maximum) downward.
    pub const ALL: [TxPower; 4] = [
        TxPower::Maximum,
        TxPower::Attenuation3dB,
        TxPower::Attenuation6dB,
        TxPower::Attenuation9dB,
    ];

    /// A human readable description of the level.
    pub fn description(self) -> &'static str {
        match self {
            TxPower::Attenuation9dB => "9dB attenuation",
            TxPower::Attenuation6dB => "6dB attenuation",
            TxPower::Attenuation3dB => "3dB attenuation",
            TxPower::Maximum => "Maximum",
        }
    }

    /// Find the level with the given [`description`](TxPower::description).
    pub fn from_description(description: &str) -> Option<TxPower> {
        TxPower::ALL
            .into_iter()
            .find(|power| power.description() == description)
    }
}

/// Select the ADF4350 output power.
pub fn set_tx_power<B: Backend>(transport: &Transport<B>, power: TxPower) -> Result<(), BinaryError> {
    write_register(transport, TX_POWER_REGISTER, power as u64, Width::One)
}

#[cfg(test)]
mod test;
