use std::env;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use linux_embedded_hal::I2cdev;

use unit_thermo::mlx90614::{self, Mlx90614};
use unit_thermo::ncir2::{self, Ncir2};
use unit_thermo::{
    Mlx90614BaaDriver, Mlx90614Driver, PeriodicMeasurement, SystemTimer,
};

const USAGE: &str = "Arguments: <I2C bus> <mlx90614|mlx90614baa|ncir2> [address] [samples]";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 5 {
        bail!(USAGE);
    }
    let bus = I2cdev::new(Path::new(&args[1])).context("opening the I2C bus")?;
    let address = args.get(3).map(|arg| parse_address(arg)).transpose()?;
    let samples: usize = match args.get(4) {
        Some(arg) => arg.parse()?,
        None => 20,
    };
    match args[2].as_ref() {
        "mlx90614" => {
            let mut thermometer: Mlx90614Driver<_, _> = Mlx90614::new(
                bus,
                address.unwrap_or(mlx90614::DEFAULT_ADDRESS),
                SystemTimer::new(),
                mlx90614::Config::default(),
            );
            thermometer.begin()?;
            run(&mut thermometer, samples, |t| {
                format!(
                    "ambient {:6.2}°C  object {:6.2}°C",
                    t.ambient_celsius(),
                    t.object1_celsius()
                )
            })
        }
        "mlx90614baa" => {
            let mut thermometer: Mlx90614BaaDriver<_, _> = Mlx90614::new(
                bus,
                address.unwrap_or(mlx90614::DEFAULT_ADDRESS),
                SystemTimer::new(),
                mlx90614::Config::default(),
            );
            thermometer.begin()?;
            run(&mut thermometer, samples, |t| {
                format!(
                    "ambient {:6.2}°C  object {:6.2}°C / {:6.2}°C",
                    t.ambient_celsius(),
                    t.object1_celsius(),
                    t.object2_celsius()
                )
            })
        }
        "ncir2" => {
            let mut thermometer = Ncir2::new(
                bus,
                address.unwrap_or(ncir2::DEFAULT_ADDRESS),
                SystemTimer::new(),
                ncir2::Config::default(),
            );
            thermometer.begin()?;
            run(&mut thermometer, samples, |t| {
                let button = if t.was_pressed() { "  (button)" } else { "" };
                format!("object {:6.2}°C{}", t.celsius(), button)
            })
        }
        other => Err(anyhow!("unknown unit '{}'\n{}", other, USAGE)),
    }
}

/// Poll `thermometer` until `samples` new measurements have been printed.
fn run<D, F>(thermometer: &mut D, samples: usize, describe: F) -> anyhow::Result<()>
where
    D: PeriodicMeasurement,
    D::Error: std::error::Error + Send + Sync + 'static,
    F: Fn(&D) -> String,
{
    let mut printed = 0;
    while printed < samples {
        thermometer.update(false)?;
        if thermometer.updated() {
            println!("{}", describe(thermometer));
            thermometer.discard();
            printed += 1;
        }
        sleep(Duration::from_millis(10));
    }
    thermometer.stop_periodic_measurement()?;
    Ok(())
}

fn parse_address(arg: &str) -> anyhow::Result<u8> {
    let address = match arg.strip_prefix("0x") {
        Some(hex_digits) => u8::from_str_radix(hex_digits, 16)?,
        None => arg.parse()?,
    };
    Ok(address)
}
