//! Display controller that shells out to platform commands

use anyhow::{bail, Context, Result};
use monswitch_core::config::DisplayCommands;
use monswitch_core::DisplayController;
use std::process::Command;
use std::thread;
use std::time::Duration;

/// Runs the configured on/off commands
#[derive(Debug, Clone)]
pub struct CommandDisplay {
    commands: DisplayCommands,
}

impl CommandDisplay {
    pub fn new(commands: DisplayCommands) -> Self {
        Self { commands }
    }

    /// Turn the display off, wait `pause`, turn it back on
    pub fn test_sequence(&mut self, pause: Duration) {
        log::info!("display: test sequence (off, wait {:?}, on)", pause);
        self.turn_off();
        thread::sleep(pause);
        self.turn_on();
    }

    fn run_logged(&self, action: &str, argv: &[String]) {
        match run_command(argv) {
            Ok(()) => log::debug!("display: {} ok", action),
            Err(e) => log::error!("display: {} failed: {:#}", action, e),
        }
    }
}

impl DisplayController for CommandDisplay {
    fn turn_on(&mut self) {
        self.run_logged("turn_on", &self.commands.turn_on);
    }

    fn turn_off(&mut self) {
        self.run_logged("turn_off", &self.commands.turn_off);
    }
}

/// Run a program with arguments and wait for it
///
/// An empty command line is a no-op.
fn run_command(argv: &[String]) -> Result<()> {
    let Some((program, args)) = argv.split_first() else {
        log::warn!("display: no command configured, skipping");
        return Ok(());
    };

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to start {}", program))?;

    if !status.success() {
        bail!("{} exited with {}", argv.join(" "), status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_command_is_noop() {
        assert!(run_command(&[]).is_ok());
    }

    #[test]
    fn test_missing_program_is_error() {
        let err = run_command(&argv(&["monswitch-no-such-program"])).unwrap_err();
        assert!(err.to_string().contains("monswitch-no-such-program"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_checked() {
        assert!(run_command(&argv(&["true"])).is_ok());
        assert!(run_command(&argv(&["false"])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failures_are_not_propagated() {
        let mut display = CommandDisplay::new(DisplayCommands {
            turn_on: argv(&["false"]),
            turn_off: argv(&["monswitch-no-such-program"]),
        });
        display.turn_on();
        display.turn_off();
        display.test_sequence(Duration::ZERO);
    }
}
