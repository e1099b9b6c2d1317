//! Run a background sweep worker against a device and print the results.

use nanovna::{
    calibration::Uncalibrated,
    device::DeviceOptions,
    sweep::{Sweep, SweepMode},
    worker::{Worker, WorkerOptions},
};
use simple_logger::SimpleLogger;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    // Connect to the first instrument found and describe it.
    let device = DeviceOptions::new().open_nth(0)?;
    println!("{}", device.info()?);

    // Sweep 1-30 MHz in two segments of 101 points, averaging 3 reads per
    // segment and dropping the worst one.
    let mut sweep = Sweep::new(1_000_000, 30_000_000, 101, 2)?;
    sweep.set_mode(SweepMode::Average).set_averages(3, 1);

    let worker = Worker::new(device, Uncalibrated, WorkerOptions::new());
    worker.set_sweep(sweep)?;
    let handle = worker.spawn()?;
    let data = handle.data();

    while handle.is_running() {
        println!("{:.0}%", handle.percentage());
        if data.wait_for_pass(0, Duration::from_millis(500))?.is_some() {
            break;
        }
    }
    handle.stop();
    let worker = handle.join().unwrap();

    if let Some(error) = worker.data().last_error()? {
        return Err(error.into());
    }
    let result = data.snapshot()?;
    for (frequency, s11, s21) in result.rows().step_by(20) {
        println!("{frequency:>10} Hz  S11 {s11:.4}  S21 {s21:.4}");
    }
    Ok(())
}
