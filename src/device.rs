use std::fmt;
use std::ops::{Index, IndexMut};

use crate::config;

/// One of the two thermally controlled components. Each has its own sensor,
/// its own fan and its own curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Gpu,
}

/// Per-device constants
pub struct DeviceInfo {
    pub name: &'static str,
    /// EC sensor index
    pub sensor_id: u8,
    /// EC fan channel
    pub fan_id: u8,
    pub default_safety_temp_c: i32,
    /// Temperature at which the 85 °C breakpoint takes over
    pub top_breakpoint_c: i32,
}

const CPU: DeviceInfo = DeviceInfo {
    name: "CPU",
    sensor_id: 1,
    fan_id: 1,
    default_safety_temp_c: config::DEFAULT_CPU_SAFETY_TEMP_C,
    top_breakpoint_c: 90,
};

const GPU: DeviceInfo = DeviceInfo {
    name: "GPU",
    sensor_id: 2,
    fan_id: 2,
    default_safety_temp_c: config::DEFAULT_GPU_SAFETY_TEMP_C,
    top_breakpoint_c: 85,
};

impl Device {
    pub const ALL: [Device; 2] = [Device::Cpu, Device::Gpu];

    pub fn info(self) -> &'static DeviceInfo {
        match self {
            Device::Cpu => &CPU,
            Device::Gpu => &GPU,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cpu" => Some(Device::Cpu),
            "gpu" => Some(Device::Gpu),
            _ => None,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// A value held once per device, indexable by [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerDevice<T> {
    pub cpu: T,
    pub gpu: T,
}

impl<T> PerDevice<T> {
    pub fn new(cpu: T, gpu: T) -> Self {
        Self { cpu, gpu }
    }

    pub fn from_fn(mut f: impl FnMut(Device) -> T) -> Self {
        Self {
            cpu: f(Device::Cpu),
            gpu: f(Device::Gpu),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerDevice<U> {
        PerDevice {
            cpu: f(&self.cpu),
            gpu: f(&self.gpu),
        }
    }
}

impl<T> Index<Device> for PerDevice<T> {
    type Output = T;

    fn index(&self, device: Device) -> &T {
        match device {
            Device::Cpu => &self.cpu,
            Device::Gpu => &self.gpu,
        }
    }
}

impl<T> IndexMut<Device> for PerDevice<T> {
    fn index_mut(&mut self, device: Device) -> &mut T {
        match device {
            Device::Cpu => &mut self.cpu,
            Device::Gpu => &mut self.gpu,
        }
    }
}
