use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config;
use crate::curve::{self, CurvePair, CurveTable};
use crate::device::{Device, PerDevice};
use crate::error::{Error, Result};
use crate::hw::{self, FanControl, PowerSource};
use crate::profile::Profile;
use crate::ramp::{Ramp, Watchdog};
use crate::safety::{self, AcFloor};
use crate::sensor::Sampler;
use crate::status::{DeviceStatus, Snapshot};
use crate::store::{Settings, Store};

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static PANIC_REPORT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Keeps panics inside the control loop off stderr until the fans are at
/// 100%; the report is then carried by [`Error::ControlLoopPanicked`].
/// Panics anywhere else go to the previous hook.
pub fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if GUARDED.with(Cell::get) {
            PANIC_REPORT.with(|report| *report.borrow_mut() = Some(info.to_string()));
        } else {
            previous(info);
        }
    }));
}

/// Requests from the UI side, applied by the control loop between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectProfile(Profile),
    SetCurvePoint {
        device: Device,
        breakpoint_c: i32,
        pct: u8,
    },
    SetCurve {
        device: Device,
        table: CurveTable,
    },
    SetSafetyTemp {
        device: Device,
        temp_c: i32,
    },
    /// `pct: None` keeps the stored floor percentage
    SetAcFloor {
        device: Device,
        enabled: bool,
        pct: Option<u8>,
    },
    SetGpuBatteryMonitor(bool),
    ResetMax(Device),
    Shutdown,
}

/// Cloneable handle for everything outside the control loop: sends
/// commands and reads the latest snapshot, never touches the hardware.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<Command>,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl ControlHandle {
    pub fn new(tx: Sender<Command>, snapshot: Arc<Mutex<Snapshot>>) -> Self {
        Self { tx, snapshot }
    }

    pub fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).map_err(|_| Error::LoopStopped)
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct DeviceState {
    sampler: Sampler,
    temp_c: i32,
    max_temp_c: i32,
    /// Pipeline output of the last tick
    target_pct: Option<u8>,
    /// Last value the EC accepted
    commanded_pct: Option<u8>,
}

/// Owns the hardware, the active profile and all per-device control state.
pub struct Controller {
    hw: Box<dyn FanControl>,
    power: Box<dyn PowerSource>,
    store: Store,
    settings: Settings,
    curves: CurvePair,
    devices: PerDevice<DeviceState>,
    ramp: Ramp,
    watchdog: Watchdog,
    tripped: bool,
    on_ac: bool,
}

impl Controller {
    /// Loads the saved config and enters the saved profile.
    pub fn new(hw: Box<dyn FanControl>, power: Box<dyn PowerSource>, store: Store) -> Self {
        let settings = store.load_settings();
        let mut controller = Self {
            hw,
            power,
            store,
            settings,
            curves: curve::default_pair(),
            devices: PerDevice::default(),
            ramp: Ramp::default(),
            watchdog: Watchdog::default(),
            tripped: false,
            on_ac: false,
        };
        controller.enter_profile(settings.profile);
        log::info!("starting with profile {}", settings.profile);
        controller
    }

    #[cfg(test)]
    pub fn set_ramp(&mut self, ramp: Ramp) {
        self.ramp = ramp;
    }

    #[cfg(test)]
    pub fn profile(&self) -> Profile {
        self.settings.profile
    }

    #[cfg(test)]
    pub fn curves(&self) -> &CurvePair {
        &self.curves
    }

    fn delegated(&self) -> bool {
        self.settings.profile == Profile::VendorAutomatic
    }

    /// One poll: sample, compute, govern, floor, actuate.
    pub fn tick(&mut self) {
        for d in Device::ALL {
            let reading = self.hw.read_sensor(d.info().sensor_id);
            let state = &mut self.devices[d];
            state.temp_c = state.sampler.sample(reading);
            state.max_temp_c = state.max_temp_c.max(state.temp_c);
        }
        let temps = self.devices.map(|s| s.temp_c);
        let reassert = self.watchdog.tick();
        self.on_ac = self.power.on_ac();

        if self.delegated() {
            log::trace!("EC in charge, CPU {}C GPU {}C", temps.cpu, temps.gpu);
            return;
        }

        let profile = self.settings.profile;
        let safety_cfg = &self.settings.safety;
        let computed =
            PerDevice::from_fn(|d| curve::evaluate(d, temps[d], &self.curves[d], profile));
        let governed = safety::govern(computed, &temps, safety_cfg);
        let targets = safety::apply_ac_floor(governed, self.on_ac, safety_cfg);

        let tripped = safety_cfg.any_tripped(&temps);
        if tripped != self.tripped {
            if tripped {
                log::warn!(
                    "safety temperature reached (CPU {}C, GPU {}C), fans to 100%",
                    temps.cpu,
                    temps.gpu
                );
            } else {
                log::info!("temperatures back under safety thresholds");
            }
            self.tripped = tripped;
        }

        log::debug!(
            "CPU {}C -> {}%, GPU {}C -> {}%{}",
            temps.cpu,
            targets.cpu,
            temps.gpu,
            targets.gpu,
            if reassert { " (reassert)" } else { "" }
        );

        for d in Device::ALL {
            let target = targets[d];
            let state = &mut self.devices[d];
            state.target_pct = Some(target);
            if state.commanded_pct == Some(target) && !reassert {
                continue;
            }
            if let Err(err) = self.ramp.drive(
                self.hw.as_mut(),
                d.info().fan_id,
                &mut state.commanded_pct,
                target,
            ) {
                log::warn!("{} fan: {}, retrying next tick", d, err);
            }
        }
    }

    /// Runs [`Self::tick`], turning a panic into max fans and an error.
    pub fn guarded_tick(&mut self) -> Result<()> {
        self.guarded(|c| {
            c.tick();
            Ok(())
        })
    }

    fn guarded(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        GUARDED.with(|g| g.set(true));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        GUARDED.with(|g| g.set(false));

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                self.fail_safe();
                let msg = PANIC_REPORT
                    .with(|report| report.borrow_mut().take())
                    .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(Error::ControlLoopPanicked(msg))
            }
        }
    }

    pub fn fail_safe(&mut self) {
        log::error!("unexpected failure, setting fans to 100% for safety");
        hw::set_fans_to_maximum(self.hw.as_mut());
        for d in Device::ALL {
            self.devices[d].commanded_pct = Some(100);
        }
    }

    /// Switches profile: saves the slot being left, then runs the entry
    /// action of the new one.
    pub fn select_profile(&mut self, profile: Profile) {
        let current = self.settings.profile;
        if profile == current {
            log::debug!("profile {} already active", profile);
            return;
        }

        if let Profile::Custom(slot) = current {
            self.save_slot(slot);
        }

        log::info!("profile {} -> {}", current, profile);
        self.enter_profile(profile);
        self.settings.profile = profile;
        self.save_settings();
    }

    fn enter_profile(&mut self, profile: Profile) {
        match profile {
            Profile::VendorAutomatic => {
                hw::release_to_auto(self.hw.as_mut());
                for d in Device::ALL {
                    self.devices[d].target_pct = None;
                    self.devices[d].commanded_pct = None;
                }
            }
            Profile::FixedMax | Profile::FixedHalf => {
                if let Some(table) = profile.fixed_table() {
                    self.curves = PerDevice::new(table, table);
                }
            }
            Profile::Custom(slot) => {
                self.curves = self.store.load_curves(slot);
            }
        }
    }

    fn save_slot(&self, slot: u8) {
        if let Err(err) = self.store.save_curves(slot, &self.curves) {
            log::warn!("could not save custom profile {}: {}", slot, err);
        }
    }

    fn save_settings(&self) {
        if let Err(err) = self.store.save_settings(&self.settings) {
            log::warn!("could not save config: {}", err);
        }
    }

    fn custom_slot(&self) -> Result<u8> {
        match self.settings.profile {
            Profile::Custom(slot) => Ok(slot),
            other => Err(Error::InvalidInput(format!(
                "curves can only be edited in a custom profile, not {}",
                other
            ))),
        }
    }

    pub fn set_curve_point(&mut self, device: Device, breakpoint_c: i32, pct: u8) -> Result<()> {
        let slot = self.custom_slot()?;
        if pct > 100 {
            return Err(Error::InvalidInput(format!("{}% is not a fan speed", pct)));
        }
        if !self.curves[device].set(breakpoint_c, pct) {
            return Err(Error::InvalidInput(format!("{}C is not a breakpoint", breakpoint_c)));
        }
        self.store.save_curves(slot, &self.curves)
    }

    pub fn set_curve(&mut self, device: Device, table: CurveTable) -> Result<()> {
        let slot = self.custom_slot()?;
        self.curves[device] = table;
        self.store.save_curves(slot, &self.curves)
    }

    pub fn set_safety_temp(&mut self, device: Device, temp_c: i32) -> Result<()> {
        if !config::SAFETY_TEMP_RANGE_C.contains(&temp_c) {
            return Err(Error::InvalidInput(format!(
                "safety temperature {}C outside {:?}",
                temp_c,
                config::SAFETY_TEMP_RANGE_C
            )));
        }
        self.settings.safety.safety_temp_c[device] = temp_c;
        self.store.save_settings(&self.settings)
    }

    pub fn set_ac_floor(&mut self, device: Device, floor: AcFloor) -> Result<()> {
        if floor.pct > 100 {
            return Err(Error::InvalidInput(format!("{}% is not a fan speed", floor.pct)));
        }
        self.settings.safety.ac_floor[device] = floor;
        self.store.save_settings(&self.settings)
    }

    pub fn set_gpu_battery_monitor(&mut self, enabled: bool) -> Result<()> {
        self.settings.gpu_battery_monitor = enabled;
        self.store.save_settings(&self.settings)
    }

    pub fn reset_max(&mut self, device: Device) {
        let state = &mut self.devices[device];
        state.max_temp_c = state.temp_c;
    }

    /// Applies one command. `Shutdown` is handled by [`Self::run`].
    pub fn apply(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::SelectProfile(profile) => {
                self.select_profile(profile);
                Ok(())
            }
            Command::SetCurvePoint {
                device,
                breakpoint_c,
                pct,
            } => self.set_curve_point(device, breakpoint_c, pct),
            Command::SetCurve { device, table } => self.set_curve(device, table),
            Command::SetSafetyTemp { device, temp_c } => self.set_safety_temp(device, temp_c),
            Command::SetAcFloor {
                device,
                enabled,
                pct,
            } => {
                let current = self.settings.safety.ac_floor[device];
                let floor = AcFloor {
                    enabled,
                    pct: pct.unwrap_or(current.pct),
                };
                self.set_ac_floor(device, floor)
            }
            Command::SetGpuBatteryMonitor(enabled) => self.set_gpu_battery_monitor(enabled),
            Command::ResetMax(device) => {
                self.reset_max(device);
                Ok(())
            }
            Command::Shutdown => Ok(()),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            devices: PerDevice::from_fn(|d| {
                let state = &self.devices[d];
                DeviceStatus {
                    temp_c: state.temp_c,
                    max_temp_c: state.max_temp_c,
                    fan_pct: state.target_pct,
                    safety_tripped: self.settings.safety.is_tripped(d, state.temp_c),
                }
            }),
            profile: self.settings.profile,
            on_ac: self.on_ac,
            safety: self.settings.safety,
            gpu_battery_monitor: self.settings.gpu_battery_monitor,
        }
    }

    /// Ticks every `period` until [`Command::Shutdown`] arrives or every
    /// sender is gone, then hands the fans back to the EC.
    ///
    /// A downward ramp blocks inside its tick, the next tick is scheduled
    /// from whenever that one finished.
    pub fn run(
        mut self,
        rx: Receiver<Command>,
        shared: Arc<Mutex<Snapshot>>,
        period: Duration,
    ) -> Result<()> {
        let publish = |c: &Controller| {
            *shared.lock().unwrap_or_else(PoisonError::into_inner) = c.snapshot();
        };

        let mut next_tick = Instant::now();
        loop {
            let now = Instant::now();
            if now >= next_tick {
                self.guarded_tick()?;
                publish(&self);
                next_tick += period;
                let now = Instant::now();
                if next_tick < now {
                    next_tick = now + period;
                }
                continue;
            }

            match rx.recv_timeout(next_tick - now) {
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(cmd) => {
                    log::debug!("applying {:?}", cmd);
                    if let Err(err) = self.guarded(|c| c.apply(cmd)) {
                        if let Error::ControlLoopPanicked(_) = err {
                            return Err(err);
                        }
                        log::warn!("{}", err);
                    }
                    publish(&self);
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Saves state and returns every fan channel to EC control.
    pub fn shutdown(mut self) {
        log::info!("stopping, handing fans back to the EC");
        hw::release_to_auto(self.hw.as_mut());
        if let Profile::Custom(slot) = self.settings.profile {
            self.save_slot(slot);
        }
        self.save_settings();
    }
}
