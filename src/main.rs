mod config;
mod console;
mod controller;
mod curve;
mod device;
mod error;
mod hw;
mod profile;
mod ramp;
mod safety;
mod sensor;
mod status;
mod store;


use std::{
    sync::{mpsc, Arc, Mutex},
    thread,
};

use controller::{Command, ControlHandle, Controller};
use hw::{EcFanControl, FanControl, NullFanControl, SysfsPower};
use store::Store;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SIGINT, SIGTERM and SIGHUP all ask the loop to shut down, so the fans
/// are handed back to the EC however the process is stopped.
fn install_signal_handler(handle: ControlHandle) -> Result<(), String> {
    ctrlc::set_handler(move || {
        log::info!("stopping...");
        let _ = handle.send(Command::Shutdown);
    })
    .map_err(|err| format!("error setting signal handler: {}", err))
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting ({})...", VERSION);
    controller::install_panic_hook();

    let hw: Box<dyn FanControl> = match EcFanControl::open() {
        Ok(ec) => Box::new(ec),
        Err(err) => {
            log::error!("{}; fans are left to the EC", err);
            Box::new(NullFanControl)
        }
    };

    let store = Store::new(store::config_dir());
    log::debug!("config dir: {}", store.dir().display());

    let controller = Controller::new(hw, Box::new(SysfsPower::new()), store);

    let (tx, rx) = mpsc::channel();
    let shared = Arc::new(Mutex::new(controller.snapshot()));
    let handle = ControlHandle::new(tx, shared.clone());

    install_signal_handler(handle.clone())?;

    // status refresh, read only
    let status_handle = handle.clone();
    thread::spawn(move || {
        let mut last = None;
        loop {
            thread::sleep(config::STATUS_REFRESH_INTERVAL);
            let snapshot = status_handle.snapshot();
            if last != Some(snapshot) {
                log::debug!("status:\n{}", snapshot.summary());
                last = Some(snapshot);
            }
        }
    });

    let console_handle = handle;
    thread::spawn(move || console::run(console_handle));

    controller
        .run(rx, shared, config::POLL_INTERVAL)
        .map_err(|err| {
            log::error!("{}", err);
            format!("{}, fans have been set to 100% for safety", err)
        })
}
