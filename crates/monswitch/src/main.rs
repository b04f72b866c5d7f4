//! monswitch - turns the display off when a chosen USB device disconnects
//!
//! Typical use is a keyboard or receiver behind a KVM switch: when the switch
//! moves it to another machine the display here goes dark, and comes back on
//! after the configured delay unless the device returns first.
//!
//! `monswitch run` also accepts commands on an interactive terminal (see
//! `console`), so the selection and delay can change without a restart.
//!
//! Set RUST_LOG=debug (or pass -v) for verbose output.

mod console;
mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::{validate_delay, ConsoleCommand};
use display::CommandDisplay;
use monswitch_core::config::{default_settings_path, load_settings, save_settings, Settings};
use monswitch_core::{
    DeviceEnumerator, DisplayController, LogOnlyDisplay, MonitorEvent, MonitorHandle,
    MonitorService, StableId, StatusReport,
};
use monswitch_usb::UsbEnumerator;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "monswitch")]
#[command(version)]
#[command(about = "Turn the display off while a chosen USB device is disconnected")]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Cmd {
    /// Monitor the selected device (default)
    Run {
        /// Log display actions instead of running the display commands
        #[arg(long)]
        dry_run: bool,
    },

    /// List attached USB devices
    List,

    /// Choose the device to monitor, as vendor:product in hex
    Select { device: StableId },

    /// Seconds before the display turns back on after a disconnect
    Delay { secs: u64 },

    /// Show the current settings
    Status,

    /// Turn the display off, then on again after a second
    TestDisplay,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    let settings_path = cli.settings.unwrap_or_else(default_settings_path);
    log::debug!("monswitch: settings at {:?}", settings_path);

    match cli.command.unwrap_or(Cmd::Run { dry_run: false }) {
        Cmd::Run { dry_run } => run(settings_path, dry_run),
        Cmd::List => {
            list();
            Ok(())
        }
        Cmd::Select { device } => select(&settings_path, device),
        Cmd::Delay { secs } => set_delay(&settings_path, secs),
        Cmd::Status => {
            status(&settings_path);
            Ok(())
        }
        Cmd::TestDisplay => {
            let settings = load_settings(&settings_path);
            CommandDisplay::new(settings.display).test_sequence(Duration::from_secs(1));
            Ok(())
        }
    }
}

fn run(settings_path: PathBuf, dry_run: bool) -> Result<()> {
    let settings = load_settings(&settings_path);
    if settings.selected_device.is_none() {
        println!("No device selected yet. Use `monswitch list` and `monswitch select <vvvv:pppp>`.");
    }

    let display: Box<dyn DisplayController> = if dry_run {
        Box::new(LogOnlyDisplay)
    } else {
        Box::new(CommandDisplay::new(settings.display.clone()))
    };

    let handle = MonitorService::spawn(UsbEnumerator::new(), display, settings, Some(settings_path))
        .context("Failed to start monitor service")?;
    let console = console::spawn_reader();

    loop {
        crossbeam::select! {
            recv(handle.events()) -> event => match event {
                Ok(event) => print_event(&event),
                Err(_) => {
                    log::warn!("monswitch: monitor service stopped");
                    break;
                }
            },
            recv(console) -> cmd => match cmd {
                Ok(cmd) => apply_console(&handle, cmd),
                Err(_) => {
                    log::info!("monswitch: input closed, exiting");
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Forward a console command to the running monitor
fn apply_console(handle: &MonitorHandle, cmd: ConsoleCommand) {
    match cmd {
        ConsoleCommand::Select(id) => handle.select(id),
        ConsoleCommand::Delay(secs) => handle.set_delay(Duration::from_secs(secs)),
        ConsoleCommand::Refresh => handle.refresh(),
        ConsoleCommand::Status => match handle.status() {
            Some(report) => print_report(&report),
            None => println!("Monitor is not responding"),
        },
        ConsoleCommand::Help => println!("{}", console::USAGE),
    }
}

fn print_report(report: &StatusReport) {
    match report.selected {
        Some(id) => println!("Device:  {} ({})", id, report.state),
        None => println!("Device:  none ({})", report.state),
    }
    println!("Delay:   {:?}", report.screen_off_delay);
    if let Some(left) = report.pending_restore {
        println!("Display back on in {}s", left.as_secs());
    }
    for device in &report.devices {
        println!("  {}  {}", device.stable_id(), device.display_name());
    }
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Status(message) => println!("{}", message),
        MonitorEvent::StateChanged(state) => log::debug!("monswitch: state {}", state),
        MonitorEvent::DevicesChanged(devices) => {
            log::debug!("monswitch: {} devices attached", devices.len())
        }
        _ => {}
    }
}

fn list() {
    let devices = UsbEnumerator::new().snapshot_or_empty();
    if devices.is_empty() {
        println!("No USB devices found");
        return;
    }

    for device in &devices {
        println!(
            "{}  {:<24}  {}",
            device.stable_id(),
            device.raw_id(),
            device.display_name()
        );
    }
}

fn select(settings_path: &Path, device: StableId) -> Result<()> {
    let mut settings = load_settings(settings_path);
    settings.selected_device = Some(device);
    save_settings(&settings, settings_path)?;

    let attached = UsbEnumerator::new()
        .snapshot_or_empty()
        .into_iter()
        .find(|d| d.stable_id() == device);
    match attached {
        Some(d) => println!("Selected device: {}", d.display_name()),
        None => println!("Selected device: {} (not connected)", device),
    }
    Ok(())
}

fn set_delay(settings_path: &Path, secs: u64) -> Result<()> {
    validate_delay(secs)?;

    let mut settings = load_settings(settings_path);
    settings.screen_off_delay_secs = secs;
    save_settings(&settings, settings_path)?;

    println!("Screen off delay: {}s", secs);
    Ok(())
}

fn status(settings_path: &Path) {
    let settings: Settings = load_settings(settings_path);

    println!("Settings:        {}", settings_path.display());
    match settings.selected_device {
        Some(id) => println!("Device:          {}", id),
        None => println!("Device:          none"),
    }
    println!("Screen off delay: {:?}", settings.screen_off_delay());
    println!("Poll interval:   {:?}", settings.poll_interval());
    println!("Turn on:         {}", settings.display.turn_on.join(" "));
    println!("Turn off:        {}", settings.display.turn_off.join(" "));
}
