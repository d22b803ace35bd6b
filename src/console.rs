//! Line based stand-in for the tray UI: turns typed commands into
//! [`Command`]s and prints snapshots. Owns no control logic.

use std::io::{self, BufRead};

use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum};

use crate::controller::{Command, ControlHandle};
use crate::curve::{CurveTable, BREAKPOINTS_C};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::profile::Profile;

#[derive(Parser, Debug)]
#[command(name = "clevofan", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Console commands, one per line")]
struct Line {
    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Switch to auto, max, half or custom1..custom3
    Profile {
        #[arg(value_parser = parse_profile)]
        profile: Profile,
    },

    /// Set one point of the active custom curve
    Curve {
        #[arg(value_parser = parse_device)]
        device: Device,
        /// Breakpoint in Celsius, 40 to 85 in steps of 5
        #[arg(value_parser = parse_breakpoint)]
        breakpoint_c: i32,
        #[arg(value_parser = parse_percent)]
        pct: u8,
    },

    /// Replace the whole active custom curve, one percentage per breakpoint
    CurveAll {
        #[arg(value_parser = parse_device)]
        device: Device,
        #[arg(required = true, num_args = 10, value_parser = parse_percent)]
        pcts: Vec<u8>,
    },

    /// Temperature at which both fans are forced to 100%
    Safety {
        #[arg(value_parser = parse_device)]
        device: Device,
        temp_c: i32,
    },

    /// Minimum speed on AC power; omitting the percentage keeps the stored one
    Floor {
        #[arg(value_parser = parse_device)]
        device: Device,
        state: Switch,
        #[arg(value_parser = parse_percent)]
        pct: Option<u8>,
    },

    /// Show GPU readings while on battery
    Battmon { state: Switch },

    /// Restart the running maximum from the current temperature
    ResetMax {
        #[arg(value_parser = parse_device)]
        device: Device,
    },

    /// Print the current readings and speeds
    Status,

    /// Hand the fans back to the EC and exit
    #[command(alias = "exit")]
    Quit,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    #[value(alias = "true", alias = "1")]
    On,
    #[value(alias = "false", alias = "0")]
    Off,
}

impl Switch {
    fn enabled(self) -> bool {
        self == Switch::On
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    Control(Command),
    Status,
    /// Rendered help text
    Help(String),
}

pub fn parse(line: &str) -> Result<Request> {
    let parsed = match Line::try_parse_from(line.split_whitespace()) {
        Ok(parsed) => parsed,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            return Ok(Request::Help(err.render().to_string()));
        }
        Err(err) => {
            let msg = err.render().to_string();
            return Err(Error::InvalidInput(msg.trim_end().to_string()));
        }
    };

    let cmd = match parsed.command {
        Action::Profile { profile } => Command::SelectProfile(profile),
        Action::Curve {
            device,
            breakpoint_c,
            pct,
        } => Command::SetCurvePoint {
            device,
            breakpoint_c,
            pct,
        },
        Action::CurveAll { device, pcts } => {
            let pcts: [u8; 10] = pcts
                .try_into()
                .map_err(|_| Error::InvalidInput("a curve has 10 points".to_string()))?;
            Command::SetCurve {
                device,
                table: CurveTable::new(pcts),
            }
        }
        Action::Safety { device, temp_c } => Command::SetSafetyTemp { device, temp_c },
        Action::Floor { device, state, pct } => Command::SetAcFloor {
            device,
            enabled: state.enabled(),
            pct,
        },
        Action::Battmon { state } => Command::SetGpuBatteryMonitor(state.enabled()),
        Action::ResetMax { device } => Command::ResetMax(device),
        Action::Status => return Ok(Request::Status),
        Action::Quit => Command::Shutdown,
    };
    Ok(Request::Control(cmd))
}

fn parse_device(s: &str) -> std::result::Result<Device, String> {
    Device::from_name(s).ok_or_else(|| format!("'{}' is not cpu or gpu", s))
}

fn parse_profile(s: &str) -> std::result::Result<Profile, String> {
    Profile::from_name(s).ok_or_else(|| format!("'{}' is not auto, max, half or custom1..3", s))
}

fn parse_breakpoint(s: &str) -> std::result::Result<i32, String> {
    s.parse()
        .ok()
        .filter(|c| BREAKPOINTS_C.contains(c))
        .ok_or_else(|| format!("breakpoints are {:?}", BREAKPOINTS_C))
}

fn parse_percent(s: &str) -> std::result::Result<u8, String> {
    s.trim_end_matches('%')
        .parse()
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| format!("'{}' is not a percentage", s))
}

/// Reads stdin until EOF or `quit`. EOF only ends the console, the control
/// loop keeps running.
pub fn run(handle: ControlHandle) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Ok(Request::Status) => println!("{}", handle.snapshot().summary()),
            Ok(Request::Help(text)) => println!("{}", text),
            Ok(Request::Control(cmd)) => {
                let quit = cmd == Command::Shutdown;
                if let Err(err) = handle.send(cmd) {
                    log::warn!("{}", err);
                    return;
                }
                if quit {
                    return;
                }
            }
            Err(err) => println!("{}", err),
        }
    }
    log::debug!("console closed");
}
