use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use sds011::serial::SerialPort;
use sds011::{Config, DataPoint, ReportingMode, Sds011, WorkMode};

mod monitor;

type Sensor = Sds011<SerialPort>;

#[derive(Parser)]
#[command(name = "sds011", version, about = "Read an SDS011 fine dust sensor")]
struct Cli {
    /// Device / socket path to connect to
    #[arg(
        short,
        long,
        env = "SDS011_DEVICE",
        default_value = "/dev/ttyUSB0",
        global = true
    )]
    device: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the firmware version and current settings
    Info,
    /// Put the sensor to sleep or wake it up
    SetWorkMode { mode: WorkMode },
    /// Switch between active and query reporting
    SetReportingMode { mode: ReportingMode },
    /// Set the minutes between measurement cycles (0 = continuous)
    SetWorkPeriod {
        #[arg(allow_negative_numbers = true)]
        minutes: i32,
    },
    /// Take a single measurement
    Read {
        /// Seconds to wait for fan / air flow to settle before measuring
        #[arg(long, default_value_t = 30)]
        spin_up: u64,
    },
    /// Measure periodically and log the readings
    Log(Timing),
    /// Measure periodically and serve the latest reading over HTTP
    Monitor {
        #[command(flatten)]
        timing: Timing,
        /// Server endpoint to listen on
        #[arg(short = 's', long, default_value = "0.0.0.0:8000")]
        listen: SocketAddr,
        /// Failed cycles in a row before the device is reopened
        #[arg(long, default_value_t = 3)]
        max_failures: u32,
    },
}

#[derive(Args, Clone, Copy, Debug)]
struct Timing {
    /// Seconds to wait for fan / air flow to settle before measuring
    #[arg(long, default_value_t = 30)]
    spin_up: u64,
    /// Seconds to wait between measurements
    #[arg(long, default_value_t = 300)]
    interval: u64,
}

impl Timing {
    fn spin_up(&self) -> Duration {
        Duration::from_secs(self.spin_up)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let device = cli.device.as_str();

    match cli.command {
        Commands::Info => {
            let mut sensor = connect(device)?;
            println!("Firmware:       {}", sensor.get_firmware().await?);
            println!("Work mode:      {}", sensor.get_work_mode().await?);
            println!("Reporting mode: {}", sensor.get_reporting_mode().await?);
            println!("Work period:    {} min", sensor.get_work_period().await?);
        }
        Commands::SetWorkMode { mode } => {
            connect(device)?.set_work_mode(mode).await?;
            info!("Work mode set to {}", mode);
        }
        Commands::SetReportingMode { mode } => {
            connect(device)?.set_reporting_mode(mode).await?;
            info!("Reporting mode set to {}", mode);
        }
        Commands::SetWorkPeriod { minutes } => {
            connect(device)?.set_work_period(minutes).await?;
            info!("Work period set to {} min", minutes);
        }
        Commands::Read { spin_up } => {
            let mut sensor = connect(device)?;
            prepare(&mut sensor, device).await;
            println!("{}", sample(&mut sensor, device, Duration::from_secs(spin_up)).await?);
        }
        Commands::Log(timing) => {
            let mut sensor = connect(device)?;
            prepare(&mut sensor, device).await;
            tokio::select! {
                _ = log_readings(&mut sensor, device, timing) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
            }
            put_to_sleep(&mut sensor, device).await;
        }
        Commands::Monitor {
            timing,
            listen,
            max_failures,
        } => monitor::run(device, timing, listen, max_failures).await?,
    }

    Ok(())
}

fn connect(device: &str) -> Result<Sensor> {
    Sds011::open(device, Config::default()).with_context(|| format!("Error opening {device}"))
}

/// Makes sure the device is awake, then enables query reporting.
async fn prepare(sensor: &mut Sensor, device: &str) {
    if let Err(e) = sensor.set_work_mode(WorkMode::Active).await {
        error!("Error setting active mode on {}: {}", device, e);
    }
    if let Err(e) = sensor.set_reporting_mode(ReportingMode::Query).await {
        error!("Error setting query reporting mode on {}: {}", device, e);
    }
}

// Sleep mode conserves the lifetime of the laser.
async fn put_to_sleep(sensor: &mut Sensor, device: &str) {
    if let Err(e) = sensor.set_work_mode(WorkMode::Sleep).await {
        error!("Error setting sleep mode on {}: {}", device, e);
    }
}

/// One measurement cycle: activate laser and fan, wait for a stable air flow,
/// read a single data point and put the sensor back to sleep.
async fn sample(sensor: &mut Sensor, device: &str, spin_up: Duration) -> Result<DataPoint> {
    sensor
        .set_work_mode(WorkMode::Active)
        .await
        .with_context(|| format!("Error setting active mode on {device}"))?;
    tokio::time::sleep(spin_up).await;

    let reading = sensor
        .query_data()
        .await
        .with_context(|| format!("Error reading data from {device}"));
    put_to_sleep(sensor, device).await;
    reading
}

async fn log_readings(sensor: &mut Sensor, device: &str, timing: Timing) {
    loop {
        match sample(sensor, device, timing.spin_up()).await {
            Ok(point) => info!("Read data from {}: {}", device, point),
            Err(e) => error!("{:#}", e),
        }
        tokio::time::sleep(timing.interval()).await;
    }
}
