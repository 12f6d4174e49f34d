use std::convert::TryInto;
use std::env;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{bail, Context};
use linux_embedded_hal::I2cdev;

use unit_thermo::thermal2::{self, Frame, Thermal2, WIDTH};
use unit_thermo::{PeriodicMeasurement, SystemTimer};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 4 {
        bail!("Arguments: <I2C bus> [refresh rate (Hz)] [frames]");
    }
    let bus = I2cdev::new(Path::new(&args[1])).context("opening the I2C bus")?;
    let refresh_rate: thermal2::RefreshRate = match args.get(2) {
        Some(arg) => arg.parse::<f32>()?.try_into()?,
        None => thermal2::RefreshRate::Four,
    };
    let frames: usize = match args.get(3) {
        Some(arg) => arg.parse()?,
        None => 10,
    };
    let config = thermal2::Config {
        refresh_rate,
        ..thermal2::Config::default()
    };
    let mut camera = Thermal2::new(bus, thermal2::DEFAULT_ADDRESS, SystemTimer::new(), config);
    camera.begin()?;

    let mut received = 0;
    while received < frames {
        camera.update(false)?;
        if camera.was_pressed() {
            println!("button pressed");
        }
        if let Some(frame) = camera.oldest() {
            print_summary(frame);
            camera.discard();
            received += 1;
        }
        sleep(Duration::from_millis(5));
    }
    camera.stop_periodic_measurement()?;

    // Both halves of the image at once
    let [zero, one] = camera.measure_singleshot()?;
    print_image(&zero, &one);
    Ok(())
}

fn print_summary(frame: &Frame) {
    let hottest = frame.highest_position();
    println!(
        "subpage {:?}: median {:5.1}°C, average {:5.1}°C, {:5.1}°C to {:5.1}°C (hottest at {},{})",
        frame.subpage(),
        frame.median(),
        frame.average(),
        frame.lowest(),
        frame.highest(),
        hottest.x,
        hottest.y
    );
}

/// Print the full image, taking alternating pixels from each subpage.
fn print_image(zero: &Frame, one: &Frame) {
    let mut pixels = zero.temperatures().zip(one.temperatures());
    for row in 0..thermal2::HEIGHT {
        for _ in 0..(WIDTH / 2) {
            let (even, odd) = pixels.next().unwrap_or((f32::NAN, f32::NAN));
            // The subpages swap columns every row
            let (left, right) = if row % 2 == 0 { (even, odd) } else { (odd, even) };
            print!("{:5.1} {:5.1} ", left, right);
        }
        println!();
    }
}
