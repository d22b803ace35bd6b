use std::fmt;

use crate::curve::CurveTable;

pub const CUSTOM_SLOTS: std::ops::RangeInclusive<u8> = 1..=3;

/// Selects what drives the fans. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// The EC's own fan logic, nothing is computed here
    VendorAutomatic,
    FixedMax,
    FixedHalf,
    /// User-editable curve pair stored in slot 1..=3
    Custom(u8),
}

impl Profile {
    pub fn custom(slot: u8) -> Option<Self> {
        CUSTOM_SLOTS.contains(&slot).then_some(Profile::Custom(slot))
    }

    /// Speed used when the temperature is below the lowest breakpoint
    pub fn below_floor_default(self) -> u8 {
        match self {
            Profile::Custom(_) => 0,
            Profile::VendorAutomatic => 40,
            Profile::FixedMax => 100,
            Profile::FixedHalf => 50,
        }
    }

    /// The table a fixed profile substitutes for both devices
    pub fn fixed_table(self) -> Option<CurveTable> {
        match self {
            Profile::FixedMax => Some(CurveTable::uniform(100)),
            Profile::FixedHalf => Some(CurveTable::uniform(50)),
            _ => None,
        }
    }

    /// Code stored in the config file
    pub fn code(self) -> u8 {
        match self {
            Profile::VendorAutomatic => 0,
            Profile::FixedMax => 1,
            Profile::FixedHalf => 2,
            Profile::Custom(slot) => 2 + slot,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Profile::VendorAutomatic),
            1 => Some(Profile::FixedMax),
            2 => Some(Profile::FixedHalf),
            c => c.checked_sub(2).and_then(Profile::custom),
        }
    }

    /// Parses the names used by the console: auto, max, half, custom1..custom3
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" | "default" => Some(Profile::VendorAutomatic),
            "max" => Some(Profile::FixedMax),
            "half" | "50" => Some(Profile::FixedHalf),
            other => other
                .strip_prefix("custom")
                .and_then(|n| n.parse().ok())
                .and_then(Profile::custom),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Custom(1)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::VendorAutomatic => f.write_str("auto"),
            Profile::FixedMax => f.write_str("max"),
            Profile::FixedHalf => f.write_str("half"),
            Profile::Custom(slot) => write!(f, "custom{}", slot),
        }
    }
}
