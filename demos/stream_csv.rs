//! Stream sweeps from a device, record them to CSV, and replay them.

use nanovna::{
    calibration::Uncalibrated,
    device::DeviceOptions,
    record::{self, RecordOptions},
    stream::Stream,
};
use simple_logger::SimpleLogger;
use std::{fs::File, io::BufReader, time::Duration};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    // Record 10 sweeps of whatever the instrument is sweeping, after
    // letting it settle for 5.
    let mut device = DeviceOptions::new().open_nth(0)?;
    let calibration = Uncalibrated;
    let mut options = RecordOptions::new();
    options.sweeps(Some(10));
    let recorded = record::write_stream(
        File::create("sweeps.csv")?,
        Stream::new(&mut device, &calibration),
        &options,
    )?;
    device.disconnect()?;
    println!("recorded {recorded} sweeps");

    // Play them back at roughly the instrument's pace.
    let replay = record::read_stream(BufReader::new(File::open("sweeps.csv")?))
        .with_delay(Duration::from_millis(100));
    for sweep in replay {
        let sweep = sweep?;
        let worst = sweep
            .reflection()
            .iter()
            .map(|dp| dp.z().norm())
            .fold(0.0, f64::max);
        println!("{} points, largest |S11| {worst:.3}", sweep.len());
    }
    Ok(())
}
