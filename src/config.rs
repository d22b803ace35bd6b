use std::time::Duration;

/// Polling rate
/// How often we sample temperatures and potentially change fan speeds
pub const POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// How often the status refresher republishes the summary
pub const STATUS_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// Downward ramp step in percentage points
pub const RAMP_STEP_PCT: u8 = 5;

/// Pause before each downward ramp step
pub const RAMP_STEP_DELAY: Duration = Duration::from_millis(100);

/// Unchanged speeds get re-sent to the EC once this much tick time has passed,
/// in case the firmware quietly took control back
pub const WATCHDOG_WINDOW: Duration = Duration::from_secs(60);

/// Readings above this are EC glitches, not temperatures
pub const MAX_PLAUSIBLE_TEMP_C: i32 = 100;

/// GPU readings below this mean the dGPU is powered down (display only)
pub const GPU_ASLEEP_BELOW_C: i32 = 20;

pub const DEFAULT_CPU_SAFETY_TEMP_C: i32 = 90;
pub const DEFAULT_GPU_SAFETY_TEMP_C: i32 = 85;

/// Safety thresholds outside this range are rejected
pub const SAFETY_TEMP_RANGE_C: std::ops::RangeInclusive<i32> = 40..=100;

pub const DEFAULT_AC_FLOOR_PCT: u8 = 30;

/// Fan percentages per breakpoint for a freshly created custom slot
pub const DEFAULT_CURVE: [u8; 10] = [40, 40, 40, 40, 50, 50, 60, 60, 70, 70];

pub const CONFIG_FILE_NAME: &str = "clevofan.cfg";
pub const CONFIG_DIR_ENV: &str = "CLEVOFAN_CONFIG_DIR";
pub const APP_DIR_NAME: &str = "clevofan";

pub fn curve_file_name(slot: u8) -> String {
    format!("userfancurve-{}.cfg", slot)
}
