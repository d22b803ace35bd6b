//! Config and custom curve files.
//!
//! Both are plain text, one value per line, order significant. Unreadable or
//! out-of-range lines fall back to their compiled-in default and the file is
//! rewritten with the values actually in use.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config;
use crate::curve::{self, CurvePair, CurveTable, BREAKPOINTS_C};
use crate::device::{Device, PerDevice};
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::safety::SafetyConfig;

/// Where the window was last shown. Only stored for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowPlacement {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    pub profile: Profile,
    pub window: WindowPlacement,
    pub always_on_top: bool,
    pub safety: SafetyConfig,
    pub gpu_battery_monitor: bool,
}

pub struct Store {
    dir: PathBuf,
}

/// `$CLEVOFAN_CONFIG_DIR`, then the XDG config dir, then `/etc`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = env::var(config::CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join(config::APP_DIR_NAME);
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".config").join(config::APP_DIR_NAME);
    }
    Path::new("/etc").join(config::APP_DIR_NAME)
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join(config::CONFIG_FILE_NAME)
    }

    fn curves_path(&self, slot: u8) -> PathBuf {
        self.dir.join(config::curve_file_name(slot))
    }

    /// Loads the main config, creating or repairing the file as needed.
    pub fn load_settings(&self) -> Settings {
        let path = self.settings_path();
        let Some(text) = read_or_first_run(&path) else {
            let settings = Settings::default();
            self.save_settings_logged(&settings);
            return settings;
        };

        let defaults = Settings::default();
        let mut fields = Fields::new(&text, &path);
        let settings = Settings {
            profile: fields.next("profile", defaults.profile, |s| {
                s.parse().ok().and_then(Profile::from_code)
            }),
            window: WindowPlacement {
                x: fields.next("window x", 0, |s| s.parse().ok()),
                y: fields.next("window y", 0, |s| s.parse().ok()),
            },
            always_on_top: fields.next("always on top", false, parse_bool),
            safety: {
                let mut safety = defaults.safety;
                for d in Device::ALL {
                    safety.ac_floor[d].enabled = fields.next("AC floor enabled", false, parse_bool);
                }
                for d in Device::ALL {
                    safety.ac_floor[d].pct =
                        fields.next("AC floor percent", config::DEFAULT_AC_FLOOR_PCT, parse_pct);
                }
                for d in Device::ALL {
                    safety.safety_temp_c[d] = fields.next(
                        "safety temperature",
                        d.info().default_safety_temp_c,
                        parse_safety_temp,
                    );
                }
                safety
            },
            gpu_battery_monitor: fields.next("GPU battery monitor", false, parse_bool),
        };

        if fields.fell_back {
            self.save_settings_logged(&settings);
        }
        settings
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let s = &settings.safety;
        let mut out = String::new();
        let _ = writeln!(out, "{}", settings.profile.code());
        let _ = writeln!(out, "{}", settings.window.x);
        let _ = writeln!(out, "{}", settings.window.y);
        let _ = writeln!(out, "{}", settings.always_on_top);
        for d in Device::ALL {
            let _ = writeln!(out, "{}", s.ac_floor[d].enabled);
        }
        for d in Device::ALL {
            let _ = writeln!(out, "{}", s.ac_floor[d].pct);
        }
        for d in Device::ALL {
            let _ = writeln!(out, "{}", s.safety_temp_c[d]);
        }
        let _ = writeln!(out, "{}", settings.gpu_battery_monitor);

        write_file(&self.dir, &self.settings_path(), &out)
    }

    fn save_settings_logged(&self, settings: &Settings) {
        match self.save_settings(settings) {
            Ok(()) => log::info!("wrote {}", self.settings_path().display()),
            Err(err) => log::warn!("{}", err),
        }
    }

    /// Loads the curves of custom slot `slot`, creating them from defaults
    /// when the file is missing or repairing bad lines.
    pub fn load_curves(&self, slot: u8) -> CurvePair {
        let path = self.curves_path(slot);
        let Some(text) = read_or_first_run(&path) else {
            let pair = curve::default_pair();
            self.save_curves_logged(slot, &pair);
            return pair;
        };

        let defaults = CurveTable::default();
        let mut fields = Fields::new(&text, &path);
        let pair = PerDevice::from_fn(|_| {
            let mut pcts = [0u8; 10];
            for (idx, pct) in pcts.iter_mut().enumerate() {
                let fallback = defaults.percentages()[idx];
                *pct = fields.next("curve point", fallback, parse_pct);
            }
            CurveTable::new(pcts)
        });

        if fields.fell_back {
            self.save_curves_logged(slot, &pair);
        }
        pair
    }

    pub fn save_curves(&self, slot: u8, pair: &CurvePair) -> Result<()> {
        let mut out = String::new();
        for d in Device::ALL {
            for pct in pair[d].percentages() {
                let _ = writeln!(out, "{}", pct);
            }
        }
        debug_assert_eq!(out.lines().count(), BREAKPOINTS_C.len() * 2);

        write_file(&self.dir, &self.curves_path(slot), &out)
    }

    fn save_curves_logged(&self, slot: u8, pair: &CurvePair) {
        match self.save_curves(slot, pair) {
            Ok(()) => log::info!("wrote {}", self.curves_path(slot).display()),
            Err(err) => log::warn!("{}", err),
        }
    }
}

/// `None` when the file has to be (re)created from defaults
fn read_or_first_run(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("{} not found, creating defaults", path.display());
            None
        }
        Err(source) => {
            let err = Error::FileRead {
                path: path.to_path_buf(),
                source,
            };
            log::warn!("{}, regenerating defaults", err);
            None
        }
    }
}

fn write_file(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    let to_err = |source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(to_err)?;
    fs::write(path, contents).map_err(to_err)
}

/// Sequential line reader with per-field fallback
struct Fields<'a> {
    lines: std::str::Lines<'a>,
    path: &'a Path,
    line_no: usize,
    fell_back: bool,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str, path: &'a Path) -> Self {
        Self {
            lines: text.lines(),
            path,
            line_no: 0,
            fell_back: false,
        }
    }

    fn next<T: std::fmt::Debug>(
        &mut self,
        name: &str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> T {
        self.line_no += 1;
        let raw = self.lines.next().map(str::trim);
        match raw.and_then(|s| parse(s)) {
            Some(value) => value,
            None => {
                log::warn!(
                    "{}:{}: bad {} {:?}, using {:?}",
                    self.path.display(),
                    self.line_no,
                    name,
                    raw.unwrap_or("<missing>"),
                    default
                );
                self.fell_back = true;
                default
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_pct(s: &str) -> Option<u8> {
    s.parse().ok().filter(|p| *p <= 100)
}

fn parse_safety_temp(s: &str) -> Option<i32> {
    s.parse().ok().filter(|t| config::SAFETY_TEMP_RANGE_C.contains(t))
}
