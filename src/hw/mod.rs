//! Hardware access used by the control loop.
//!
//! The controller only sees [`FanControl`] and [`PowerSource`]; the concrete
//! EC and sysfs implementations live in the submodules.

pub mod ec;
pub mod power;

use crate::error::{Error, Result};

pub use ec::EcFanControl;
pub use power::{PowerSource, SysfsPower};

/// Fan channel that addresses both fans at once on some EC firmwares
pub const FAN_COMBINED: u8 = 0;

/// Every channel that gets handed back to the EC on exit
pub const ALL_FAN_CHANNELS: [u8; 3] = [FAN_COMBINED, 1, 2];

/// Sensor reads and fan actuation. The handle is released on drop.
#[cfg_attr(test, mockall::automock)]
pub trait FanControl {
    /// Raw temperature of `sensor_id` (1 = CPU, 2 = GPU) in Celsius
    fn read_sensor(&mut self, sensor_id: u8) -> Result<i32>;

    /// Sets fan `fan_id` to `pct` percent duty
    fn set_fan_speed(&mut self, fan_id: u8, pct: u8) -> Result<()>;

    /// Returns fan `fan_id` to the EC's own control
    fn set_fan_auto(&mut self, fan_id: u8) -> Result<()>;
}

/// Stand-in used when the EC could not be opened. Writes are dropped and
/// reads report [`Error::HardwareUnavailable`], which the sampler absorbs.
#[derive(Debug, Default)]
pub struct NullFanControl;

impl FanControl for NullFanControl {
    fn read_sensor(&mut self, _sensor_id: u8) -> Result<i32> {
        Err(Error::HardwareUnavailable)
    }

    fn set_fan_speed(&mut self, _fan_id: u8, _pct: u8) -> Result<()> {
        Ok(())
    }

    fn set_fan_auto(&mut self, _fan_id: u8) -> Result<()> {
        Ok(())
    }
}

/// Best effort: every channel back to EC control, errors are only logged.
pub fn release_to_auto(hw: &mut dyn FanControl) {
    for fan_id in ALL_FAN_CHANNELS {
        if let Err(err) = hw.set_fan_auto(fan_id) {
            log::warn!("could not return fan {} to auto: {}", fan_id, err);
        }
    }
}

/// Both fans to 100%, errors are only logged.
pub fn set_fans_to_maximum(hw: &mut dyn FanControl) {
    for device in crate::device::Device::ALL {
        let fan_id = device.info().fan_id;
        if let Err(err) = hw.set_fan_speed(fan_id, 100) {
            log::error!("could not force fan {} to 100%: {}", fan_id, err);
        }
    }
}
