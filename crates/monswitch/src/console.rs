//! Interactive commands for a running monitor
//!
//! While `monswitch run` is attached to a terminal, each input line is one
//! command:
//!
//! ```text
//! select 0951:1666   monitor another device
//! delay 15           seconds before the display comes back on
//! refresh            enumerate USB devices now
//! status             show the monitor state
//! help
//! ```
//!
//! End of input (Ctrl-D) stops the monitor.

use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::Receiver;
use monswitch_core::config::{MAX_SCREEN_OFF_DELAY_SECS, MIN_SCREEN_OFF_DELAY_SECS};
use monswitch_core::StableId;
use std::io::{BufRead, IsTerminal};
use std::thread;

pub const USAGE: &str = "commands: select <vvvv:pppp> | delay <secs> | refresh | status | help";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Select(StableId),
    Delay(u64),
    Refresh,
    Status,
    Help,
}

/// Parse one input line; blank lines give `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        bail!("too many arguments for '{}'", verb);
    }

    let cmd = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("select", Some(id)) => ConsoleCommand::Select(id.parse()?),
        ("delay", Some(secs)) => {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("'{}' is not a number of seconds", secs))?;
            validate_delay(secs)?;
            ConsoleCommand::Delay(secs)
        }
        ("refresh", None) => ConsoleCommand::Refresh,
        ("status", None) => ConsoleCommand::Status,
        ("help" | "?", None) => ConsoleCommand::Help,
        ("select" | "delay", None) => bail!("'{}' needs an argument", verb),
        ("refresh" | "status" | "help" | "?", Some(_)) => bail!("'{}' takes no argument", verb),
        _ => return Err(anyhow!("unknown command '{}'", verb)),
    };
    Ok(Some(cmd))
}

/// Check a screen off delay against the supported range
pub fn validate_delay(secs: u64) -> Result<()> {
    if !(MIN_SCREEN_OFF_DELAY_SECS..=MAX_SCREEN_OFF_DELAY_SECS).contains(&secs) {
        bail!(
            "Delay must be between {} and {} seconds, got {}",
            MIN_SCREEN_OFF_DELAY_SECS,
            MAX_SCREEN_OFF_DELAY_SECS,
            secs
        );
    }
    Ok(())
}

/// Read commands from an interactive stdin on a background thread
///
/// The channel disconnects at end of input. Non-interactive stdin is
/// ignored so the monitor can run detached.
pub fn spawn_reader() -> Receiver<ConsoleCommand> {
    if !std::io::stdin().is_terminal() {
        return crossbeam::channel::never();
    }

    let (tx, rx) = crossbeam::channel::unbounded();
    let spawned = thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(Result::ok) {
                match parse_line(&line) {
                    Ok(Some(cmd)) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{:#}\n{}", e, USAGE),
                }
            }
        });

    match spawned {
        Ok(_) => rx,
        Err(e) => {
            log::warn!("console: failed to start input thread: {}", e);
            crossbeam::channel::never()
        }
    }
}
