use std::fmt::Write as _;

use crate::config;
use crate::device::{Device, PerDevice};
use crate::profile::Profile;
use crate::safety::SafetyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub temp_c: i32,
    pub max_temp_c: i32,
    /// Speed the pipeline settled on this tick; `None` while the EC is in charge
    pub fan_pct: Option<u8>,
    pub safety_tripped: bool,
}

/// Read-only view of the control loop, published after every tick and command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub devices: PerDevice<DeviceStatus>,
    pub profile: Profile,
    pub on_ac: bool,
    pub safety: SafetyConfig,
    pub gpu_battery_monitor: bool,
}

impl Snapshot {
    pub fn device(&self, device: Device) -> &DeviceStatus {
        &self.devices[device]
    }

    /// Multi-line summary in the tray tooltip layout
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for device in Device::ALL {
            let status = self.device(device);
            let _ = writeln!(out, "{}", device);

            if device == Device::Gpu && !self.on_ac && !self.gpu_battery_monitor {
                let _ = writeln!(out, "  Batt.");
                continue;
            }
            if device == Device::Gpu && status.temp_c < config::GPU_ASLEEP_BELOW_C {
                let _ = writeln!(out, "  Asleep");
                continue;
            }

            let trip = if status.safety_tripped { " !" } else { "" };
            let _ = writeln!(
                out,
                "  Temp: {}°{} (max {}°)",
                status.temp_c, trip, status.max_temp_c
            );
            match status.fan_pct {
                Some(pct) => {
                    let _ = writeln!(out, "  Fan: {}%", pct);
                }
                None => {
                    let _ = writeln!(out, "  Fan: auto");
                }
            }
        }
        let _ = write!(out, "Profile: {}{}", self.profile, if self.on_ac { " (AC)" } else { "" });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot {
            devices: PerDevice::new(
                DeviceStatus {
                    temp_c: 62,
                    max_temp_c: 71,
                    fan_pct: Some(50),
                    safety_tripped: false,
                },
                DeviceStatus {
                    temp_c: 48,
                    max_temp_c: 60,
                    fan_pct: Some(40),
                    safety_tripped: false,
                },
            ),
            profile: Profile::Custom(1),
            on_ac: true,
            ..Snapshot::default()
        }
    }

    #[test]
    fn summary_lists_both_devices() {
        let text = snapshot().summary();
        assert_eq!(
            text,
            "CPU\n  Temp: 62° (max 71°)\n  Fan: 50%\n\
             GPU\n  Temp: 48° (max 60°)\n  Fan: 40%\n\
             Profile: custom1 (AC)"
        );
    }

    #[test]
    fn sleeping_gpu_is_shown_as_asleep() {
        let mut snap = snapshot();
        snap.devices.gpu.temp_c = 0;
        assert!(snap.summary().contains("GPU\n  Asleep\n"));
    }

    #[test]
    fn gpu_hidden_on_battery_unless_monitored() {
        let mut snap = snapshot();
        snap.on_ac = false;
        assert!(snap.summary().contains("GPU\n  Batt.\n"));

        snap.gpu_battery_monitor = true;
        assert!(snap.summary().contains("GPU\n  Temp: 48°"));
    }

    #[test]
    fn tripped_and_auto_markers() {
        let mut snap = snapshot();
        snap.devices.cpu.safety_tripped = true;
        snap.devices.cpu.fan_pct = None;
        let text = snap.summary();
        assert!(text.contains("Temp: 62° !"));
        assert!(text.contains("Fan: auto"));
    }
}
