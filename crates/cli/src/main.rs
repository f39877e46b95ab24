//! aoap-switch
//!
//! Command-line front end for the accessory-mode transition coordinator:
//! list USB devices, query their accessory protocol support, reset them, or
//! switch them into Android accessory mode.

mod config;
mod selector;

use anyhow::{Context, Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand};
use common::{TransitionCommand, create_outcome_channel, setup_logging};
use config::{AccessoryOverrides, AppConfig};
use coordinator::{ChannelListener, Controller, HotplugMonitor, RusbTransport, TransitionTiming};
use protocol::DeviceInfo;
use selector::DeviceSelector;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "aoap-switch")]
#[command(
    author,
    version,
    about = "Reset USB devices and switch Android devices into accessory mode"
)]
#[command(long_about = "
Drives USB devices through port resets and Android Open Accessory (AOA)
mode switches, waiting for each device to leave the bus and come back.

EXAMPLES:
    # List devices, accessory-mode ones are marked
    aoap-switch list

    # Ask a device which AOA protocol version it speaks
    aoap-switch probe 0x18d1:0x4ee2

    # Switch the phone on port 1-2 into accessory mode
    aoap-switch start 1-2 --manufacturer Acme --model \"Head Unit\"

    # Reset the device at bus 1, address 7
    aoap-switch reset 1:7

SELECTORS:
    BUS-PORT[.PORT...]   port path, e.g. 1-2.3
    BUS:ADDR             bus number and device address, e.g. 1:7
    0xVID:0xPID          vendor and product ID, e.g. 0x18d1:0x4ee2

CONFIGURATION:
    Settings are read from the path given with --config, then
    ~/.config/aoap-switch/config.toml, then built-in defaults.
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List USB devices
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the accessory protocol version a device reports
    Probe { selector: DeviceSelector },
    /// Reset a device and wait for it to come back
    Reset { selector: DeviceSelector },
    /// Switch a device into accessory mode
    Start {
        selector: DeviceSelector,
        #[command(flatten)]
        strings: StringArgs,
    },
    /// Write the default configuration file and exit
    SaveConfig,
}

/// Identification strings; unset ones come from the configuration file
#[derive(ClapArgs, Debug)]
struct StringArgs {
    #[arg(long)]
    manufacturer: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long = "accessory-version", value_name = "VERSION")]
    version: Option<String>,
    #[arg(long)]
    uri: Option<String>,
    #[arg(long)]
    serial: Option<String>,
}

impl From<StringArgs> for AccessoryOverrides {
    fn from(args: StringArgs) -> Self {
        Self {
            manufacturer: args.manufacturer,
            model: args.model,
            description: args.description,
            version: args.version,
            uri: args.uri,
            serial: args.serial,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle save-config before loading anything
    if let Command::SaveConfig = args.command {
        let path = args.config.unwrap_or_else(AppConfig::default_path);
        AppConfig::default()
            .save(&path)
            .context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = match args.config {
        Some(path) => AppConfig::load(Some(path)).context("Failed to load configuration")?,
        None => AppConfig::load_or_default(),
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("aoap-switch v{}", env!("CARGO_PKG_VERSION"));

    let transport = RusbTransport::new().context("Failed to initialize libusb")?;

    match args.command {
        Command::List { json } => list_devices(&transport, json),
        Command::Probe { selector } => probe_device(&transport, &selector),
        Command::Reset { selector } => {
            let device = find_device(&transport, &selector)?;
            run_transition(transport, config.timing, TransitionCommand::ResetDevice { device })
                .await
        }
        Command::Start { selector, strings } => {
            let device = find_device(&transport, &selector)?;
            let request = config.accessory.request_for(device, strings.into());
            run_transition(transport, config.timing, TransitionCommand::StartAoap { request })
                .await
        }
        Command::SaveConfig => Ok(()),
    }
}

fn find_device(transport: &RusbTransport, selector: &DeviceSelector) -> Result<DeviceInfo> {
    let devices = transport
        .list_devices()
        .context("Failed to enumerate USB devices")?;
    selector.select(&devices)
}

fn list_devices(transport: &RusbTransport, json: bool) -> Result<()> {
    let devices = transport
        .list_devices()
        .context("Failed to enumerate USB devices")?;

    if json {
        let output =
            serde_json::to_string_pretty(&devices).context("Failed to serialize device list")?;
        println!("{}", output);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices {
        let port = device
            .port_path()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  Bus {:03} Device {:03}  {:04x}:{:04x}  port {}{}",
            device.bus_number,
            device.device_address,
            device.vendor_id,
            device.product_id,
            port,
            if device.is_accessory_mode() {
                "  [accessory]"
            } else {
                ""
            }
        );
        if let Some(serial) = &device.serial_number {
            println!("      Serial: {}", serial);
        }
    }

    Ok(())
}

fn probe_device(transport: &RusbTransport, selector: &DeviceSelector) -> Result<()> {
    let device = find_device(transport, selector)?;
    let version = transport
        .accessory_protocol_version(&device)
        .with_context(|| format!("Failed to query accessory protocol on {}", device))?;

    println!("{}: accessory protocol {}", device, version);
    if !version.is_supported() {
        println!("  Device does not support accessory mode");
    }
    Ok(())
}

/// Run one transition through a controller and wait for its outcome or Ctrl-C
async fn run_transition(
    transport: RusbTransport,
    timing: TransitionTiming,
    command: TransitionCommand,
) -> Result<()> {
    let monitor = HotplugMonitor::new(transport.context().clone());
    let (tx, rx) = create_outcome_channel();

    let mut controller = Controller::new(
        Arc::new(transport),
        Box::new(monitor),
        Arc::new(ChannelListener::new(tx)),
    )
    .with_timing(timing);
    controller
        .init()
        .context("Failed to start transition controller")?;

    match command {
        TransitionCommand::ResetDevice { device } => controller.start_device_reset(device),
        TransitionCommand::StartAoap { request } => controller.start_aoap(request),
    }

    // An accessory restart can run two full cycles
    let budget = (timing.detach_budget() + timing.attach_budget()) * 2 + Duration::from_secs(5);

    let result = tokio::select! {
        outcome = rx.recv_timeout(budget) => match outcome {
            Some(outcome) if outcome.is_success() => {
                println!("{}", outcome);
                Ok(())
            }
            Some(outcome) => Err(anyhow!("{}", outcome)),
            None => Err(anyhow!("No outcome within {:?}", budget)),
        },
        _ = signal::ctrl_c() => {
            warn!("Interrupted, cancelling transition");
            Err(anyhow!("Interrupted"))
        }
    };

    controller.release();
    result
}
