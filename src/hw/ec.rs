//! Clevo embedded controller access through the ACPI EC command and data
//! ports, via `/dev/port` (needs root).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use super::FanControl;
use crate::error::{Error, Result};

const DEV_PORT: &str = "/dev/port";

const EC_DATA_PORT: u16 = 0x62;
const EC_CMD_PORT: u16 = 0x66;

/// Status bits read from the command port
const EC_STATUS_OBF: u8 = 1 << 0;
const EC_STATUS_IBF: u8 = 1 << 1;

const EC_CMD_READ: u8 = 0x80;
/// Clevo vendor command: set fan duty
const EC_CMD_FAN: u8 = 0x99;
/// First argument of [`EC_CMD_FAN`] that selects automatic mode
const EC_FAN_ARG_AUTO: u8 = 0xff;

const EC_REG_CPU_TEMP: u8 = 0x07;
const EC_REG_GPU_TEMP: u8 = 0xcd;

const EC_WAIT_POLLS: u32 = 100;
const EC_WAIT_POLL_DELAY: Duration = Duration::from_millis(1);

/// Byte-wide x86 port I/O
pub trait PortIo {
    fn inb(&self, port: u16) -> std::io::Result<u8>;
    fn outb(&self, port: u16, value: u8) -> std::io::Result<()>;
}

impl PortIo for File {
    fn inb(&self, port: u16) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_at(&mut buf, port as u64)?;
        Ok(buf[0])
    }

    fn outb(&self, port: u16, value: u8) -> std::io::Result<()> {
        self.write_all_at(&[value], port as u64)
    }
}

pub struct EcFanControl<P: PortIo = File> {
    ports: P,
}

impl EcFanControl<File> {
    pub fn open() -> Result<Self> {
        Self::open_at(Path::new(DEV_PORT))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let ports = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::DeviceOpen {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("opened EC ports through {}", path.display());
        Ok(Self::with_ports(ports))
    }
}

impl<P: PortIo> EcFanControl<P> {
    pub fn with_ports(ports: P) -> Self {
        Self { ports }
    }

    fn status(&self) -> Result<u8> {
        self.ports.inb(EC_CMD_PORT).map_err(Error::PortIo)
    }

    fn wait_input_empty(&self) -> Result<()> {
        for _ in 0..EC_WAIT_POLLS {
            if self.status()? & EC_STATUS_IBF == 0 {
                return Ok(());
            }
            thread::sleep(EC_WAIT_POLL_DELAY);
        }
        Err(Error::EcTimeout("input buffer"))
    }

    fn wait_output_full(&self) -> Result<()> {
        for _ in 0..EC_WAIT_POLLS {
            if self.status()? & EC_STATUS_OBF != 0 {
                return Ok(());
            }
            thread::sleep(EC_WAIT_POLL_DELAY);
        }
        Err(Error::EcTimeout("output buffer"))
    }

    fn write_cmd(&self, cmd: u8) -> Result<()> {
        self.wait_input_empty()?;
        self.ports.outb(EC_CMD_PORT, cmd).map_err(Error::PortIo)
    }

    fn write_data(&self, value: u8) -> Result<()> {
        self.wait_input_empty()?;
        self.ports.outb(EC_DATA_PORT, value).map_err(Error::PortIo)
    }

    fn read_register(&self, register: u8) -> Result<u8> {
        self.write_cmd(EC_CMD_READ)?;
        self.write_data(register)?;
        self.wait_output_full()?;
        self.ports.inb(EC_DATA_PORT).map_err(Error::PortIo)
    }

    fn fan_command(&self, arg: u8, value: u8) -> Result<()> {
        self.write_cmd(EC_CMD_FAN)?;
        self.write_data(arg)?;
        self.write_data(value)?;
        self.wait_input_empty()
    }
}

impl<P: PortIo> FanControl for EcFanControl<P> {
    fn read_sensor(&mut self, sensor_id: u8) -> Result<i32> {
        let register = match sensor_id {
            1 => EC_REG_CPU_TEMP,
            2 => EC_REG_GPU_TEMP,
            other => return Err(Error::InvalidInput(format!("unknown sensor {}", other))),
        };
        self.read_register(register).map(i32::from)
    }

    fn set_fan_speed(&mut self, fan_id: u8, pct: u8) -> Result<()> {
        let duty = (pct.min(100) as u32 * 255 / 100) as u8;
        log::trace!("fan {}: {}% (duty {:#04x})", fan_id, pct, duty);
        self.fan_command(fan_id, duty)
    }

    fn set_fan_auto(&mut self, fan_id: u8) -> Result<()> {
        log::trace!("fan {}: auto", fan_id);
        self.fan_command(EC_FAN_ARG_AUTO, fan_id)
    }
}

impl<P: PortIo> Drop for EcFanControl<P> {
    fn drop(&mut self) {
        log::debug!("releasing EC handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Always-ready EC that answers register reads from a map
    #[derive(Default)]
    struct FakePorts {
        registers: HashMap<u8, u8>,
        writes: RefCell<Vec<(u16, u8)>>,
        busy: bool,
    }

    impl PortIo for FakePorts {
        fn inb(&self, port: u16) -> std::io::Result<u8> {
            match port {
                EC_CMD_PORT if self.busy => Ok(EC_STATUS_IBF),
                EC_CMD_PORT => Ok(EC_STATUS_OBF),
                EC_DATA_PORT => {
                    let writes = self.writes.borrow();
                    let register = writes.last().map(|w| w.1).unwrap_or_default();
                    Ok(*self.registers.get(&register).unwrap_or(&0))
                }
                _ => Ok(0),
            }
        }

        fn outb(&self, port: u16, value: u8) -> std::io::Result<()> {
            self.writes.borrow_mut().push((port, value));
            Ok(())
        }
    }

    #[test]
    fn reads_temperature_registers() {
        let ports = FakePorts {
            registers: HashMap::from([(EC_REG_CPU_TEMP, 61), (EC_REG_GPU_TEMP, 48)]),
            ..Default::default()
        };
        let mut ec = EcFanControl::with_ports(ports);

        assert_eq!(ec.read_sensor(1).unwrap(), 61);
        assert_eq!(ec.read_sensor(2).unwrap(), 48);
        assert!(matches!(ec.read_sensor(7), Err(Error::InvalidInput(_))));

        let writes = ec.ports.writes.borrow();
        assert_eq!(writes[0], (EC_CMD_PORT, EC_CMD_READ));
        assert_eq!(writes[1], (EC_DATA_PORT, EC_REG_CPU_TEMP));
    }

    #[test]
    fn fan_speed_is_scaled_to_duty() {
        let mut ec = EcFanControl::with_ports(FakePorts::default());
        ec.set_fan_speed(2, 100).unwrap();
        ec.set_fan_speed(1, 50).unwrap();

        let writes = ec.ports.writes.borrow();
        assert_eq!(
            *writes,
            vec![
                (EC_CMD_PORT, EC_CMD_FAN),
                (EC_DATA_PORT, 2),
                (EC_DATA_PORT, 255),
                (EC_CMD_PORT, EC_CMD_FAN),
                (EC_DATA_PORT, 1),
                (EC_DATA_PORT, 127),
            ]
        );
    }

    #[test]
    fn auto_mode_uses_auto_argument() {
        let mut ec = EcFanControl::with_ports(FakePorts::default());
        ec.set_fan_auto(0).unwrap();

        let writes = ec.ports.writes.borrow();
        assert_eq!(
            *writes,
            vec![
                (EC_CMD_PORT, EC_CMD_FAN),
                (EC_DATA_PORT, EC_FAN_ARG_AUTO),
                (EC_DATA_PORT, 0),
            ]
        );
    }

    #[test]
    fn busy_ec_times_out() {
        let ports = FakePorts {
            busy: true,
            ..Default::default()
        };
        let mut ec = EcFanControl::with_ports(ports);

        assert!(matches!(ec.set_fan_speed(1, 40), Err(Error::EcTimeout(_))));
        assert!(ec.ports.writes.borrow().is_empty());
    }

    #[test]
    fn open_reports_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("port");
        let err = EcFanControl::open_at(&missing).err().unwrap();
        assert!(matches!(err, Error::DeviceOpen { .. }));
        assert!(err.to_string().starts_with("failed to open "));
    }
}
