use crate::config;
use crate::device::{Device, PerDevice};

/// Minimum speed enforced while on external power
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcFloor {
    pub enabled: bool,
    pub pct: u8,
}

impl Default for AcFloor {
    fn default() -> Self {
        Self {
            enabled: false,
            pct: config::DEFAULT_AC_FLOOR_PCT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyConfig {
    pub safety_temp_c: PerDevice<i32>,
    pub ac_floor: PerDevice<AcFloor>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            safety_temp_c: PerDevice::from_fn(|d| d.info().default_safety_temp_c),
            ac_floor: PerDevice::default(),
        }
    }
}

impl SafetyConfig {
    /// Whether `device` alone is at or over its threshold
    pub fn is_tripped(&self, device: Device, temp_c: i32) -> bool {
        temp_c >= self.safety_temp_c[device]
    }

    /// Whether any device is at or over its threshold
    pub fn any_tripped(&self, temps_c: &PerDevice<i32>) -> bool {
        Device::ALL.iter().any(|&d| self.is_tripped(d, temps_c[d]))
    }
}

/// Forces both fans to 100% while either sensor is over its threshold.
///
/// No latch: the override ends on the first tick both readings are back under.
pub fn govern(
    targets: PerDevice<u8>,
    temps_c: &PerDevice<i32>,
    cfg: &SafetyConfig,
) -> PerDevice<u8> {
    if cfg.any_tripped(temps_c) {
        PerDevice::new(100, 100)
    } else {
        targets
    }
}

/// Raises targets to the enabled AC floors. Never lowers a speed and does
/// nothing on battery.
pub fn apply_ac_floor(targets: PerDevice<u8>, on_ac: bool, cfg: &SafetyConfig) -> PerDevice<u8> {
    if !on_ac {
        return targets;
    }

    PerDevice::from_fn(|d| {
        let floor = cfg.ac_floor[d];
        if floor.enabled {
            targets[d].max(floor.pct)
        } else {
            targets[d]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_floors(cpu: AcFloor, gpu: AcFloor) -> SafetyConfig {
        SafetyConfig {
            ac_floor: PerDevice::new(cpu, gpu),
            ..SafetyConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = SafetyConfig::default();
        assert_eq!(cfg.safety_temp_c, PerDevice::new(90, 85));
        assert!(!cfg.ac_floor.cpu.enabled);
        assert!(!cfg.ac_floor.gpu.enabled);
    }

    #[test]
    fn trip_on_one_device_forces_both() {
        let cfg = SafetyConfig::default();
        let targets = PerDevice::new(40, 30);

        assert_eq!(govern(targets, &PerDevice::new(95, 50), &cfg), PerDevice::new(100, 100));
        assert_eq!(govern(targets, &PerDevice::new(50, 85), &cfg), PerDevice::new(100, 100));
        assert_eq!(govern(targets, &PerDevice::new(89, 84), &cfg), targets);
    }

    #[test]
    fn governor_respects_custom_thresholds() {
        let mut cfg = SafetyConfig::default();
        cfg.safety_temp_c.cpu = 70;

        let idle = PerDevice::new(0, 0);
        assert_eq!(govern(idle, &PerDevice::new(70, 30), &cfg), PerDevice::new(100, 100));
        assert_eq!(govern(idle, &PerDevice::new(69, 30), &cfg), idle);
    }

    #[test]
    fn ac_floor_only_raises_on_ac() {
        let on = AcFloor { enabled: true, pct: 30 };
        let cfg = with_floors(on, on);

        assert_eq!(apply_ac_floor(PerDevice::new(20, 45), true, &cfg), PerDevice::new(30, 45));
        assert_eq!(apply_ac_floor(PerDevice::new(20, 45), false, &cfg), PerDevice::new(20, 45));
    }

    #[test]
    fn ac_floor_is_per_device() {
        let cfg = with_floors(
            AcFloor { enabled: true, pct: 60 },
            AcFloor { enabled: false, pct: 60 },
        );

        assert_eq!(apply_ac_floor(PerDevice::new(10, 10), true, &cfg), PerDevice::new(60, 10));
    }

    #[test]
    fn ac_floor_never_lowers_a_tripped_fan() {
        let on = AcFloor { enabled: true, pct: 30 };
        let cfg = with_floors(on, on);
        let governed = govern(PerDevice::new(10, 10), &PerDevice::new(91, 40), &cfg);

        assert_eq!(apply_ac_floor(governed, true, &cfg), PerDevice::new(100, 100));
    }
}
