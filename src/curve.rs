use crate::config;
use crate::device::{Device, PerDevice};
use crate::profile::Profile;

/// Fixed temperature breakpoints every curve is defined on
pub const BREAKPOINTS_C: [i32; 10] = [40, 45, 50, 55, 60, 65, 70, 75, 80, 85];

/// Fan percentage for each of the [`BREAKPOINTS_C`], in ascending order.
///
/// Only the percentages are data; no ordering between them is enforced, a
/// curve that dips in the middle is applied as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveTable([u8; 10]);

/// The CPU and GPU curves that make up one profile
pub type CurvePair = PerDevice<CurveTable>;

impl CurveTable {
    pub fn new(percentages: [u8; 10]) -> Self {
        Self(percentages.map(|p| p.min(100)))
    }

    pub fn uniform(pct: u8) -> Self {
        Self::new([pct; 10])
    }

    pub fn percentages(&self) -> &[u8; 10] {
        &self.0
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    /// Sets the percentage of the breakpoint at `breakpoint_c`, returns false
    /// when that temperature is not a breakpoint.
    pub fn set(&mut self, breakpoint_c: i32, pct: u8) -> bool {
        match breakpoint_index(breakpoint_c) {
            Some(idx) => {
                self.0[idx] = pct.min(100);
                true
            }
            None => false,
        }
    }
}

impl Default for CurveTable {
    fn default() -> Self {
        Self::new(config::DEFAULT_CURVE)
    }
}

pub fn default_pair() -> CurvePair {
    PerDevice::new(CurveTable::default(), CurveTable::default())
}

pub fn breakpoint_index(breakpoint_c: i32) -> Option<usize> {
    BREAKPOINTS_C.iter().position(|&b| b == breakpoint_c)
}

/// Target fan percentage for `temp_c` on `table`.
///
/// Picks the highest breakpoint at or below the temperature. The 85 °C slot
/// only takes over at the device's own top test (90 °C for the CPU, 85 °C for
/// the GPU). Below 40 °C the profile decides.
pub fn evaluate(device: Device, temp_c: i32, table: &CurveTable, profile: Profile) -> u8 {
    let top = BREAKPOINTS_C.len() - 1;
    if temp_c >= device.info().top_breakpoint_c {
        return table.0[top];
    }

    for idx in (0..top).rev() {
        if temp_c >= BREAKPOINTS_C[idx] {
            return table.0[idx];
        }
    }

    profile.below_floor_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_table() -> CurveTable {
        CurveTable::new([10, 20, 30, 40, 50, 60, 70, 80, 90, 100])
    }

    #[test]
    fn picks_highest_breakpoint_at_or_below() {
        let table = ramp_table();
        let custom = Profile::Custom(1);

        for device in Device::ALL {
            for (idx, bp) in BREAKPOINTS_C.iter().enumerate().take(9) {
                assert_eq!(evaluate(device, *bp, &table, custom), table.0[idx]);
                assert_eq!(evaluate(device, *bp + 4, &table, custom), table.0[idx]);
            }
        }
    }

    #[test]
    fn top_breakpoint_is_device_specific() {
        let table = ramp_table();
        let custom = Profile::Custom(2);

        assert_eq!(evaluate(Device::Gpu, 85, &table, custom), 100);
        assert_eq!(evaluate(Device::Gpu, 99, &table, custom), 100);

        // the CPU stays on the 80 slot until 90
        assert_eq!(evaluate(Device::Cpu, 85, &table, custom), 90);
        assert_eq!(evaluate(Device::Cpu, 89, &table, custom), 90);
        assert_eq!(evaluate(Device::Cpu, 90, &table, custom), 100);
    }

    #[test]
    fn below_lowest_breakpoint_uses_profile_default() {
        let table = ramp_table();

        assert_eq!(evaluate(Device::Cpu, 39, &table, Profile::Custom(3)), 0);
        assert_eq!(evaluate(Device::Cpu, 0, &table, Profile::VendorAutomatic), 40);
        assert_eq!(evaluate(Device::Gpu, 12, &table, Profile::FixedMax), 100);
        assert_eq!(evaluate(Device::Gpu, -5, &table, Profile::FixedHalf), 50);
    }

    #[test]
    fn non_monotonic_curve_is_applied_as_configured() {
        let table = CurveTable::new([80, 20, 90, 0, 50, 10, 100, 5, 60, 30]);

        assert_eq!(evaluate(Device::Cpu, 47, &table, Profile::Custom(1)), 20);
        assert_eq!(evaluate(Device::Cpu, 56, &table, Profile::Custom(1)), 0);
        assert_eq!(evaluate(Device::Gpu, 77, &table, Profile::Custom(1)), 5);
    }

    #[test]
    fn set_only_accepts_breakpoints() {
        let mut table = CurveTable::default();

        assert!(table.set(70, 65));
        assert_eq!(table.get(6), Some(65));
        assert!(!table.set(71, 65));
        assert!(table.set(85, 250));
        assert_eq!(table.get(9), Some(100));
    }
}
