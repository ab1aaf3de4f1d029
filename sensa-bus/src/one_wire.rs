//! One-wire via sysfs (`w1-gpio` + `w1-therm`)
//!
//! Cada dispositivo aparece como um diretório `<família>-<serial>` contendo
//! `w1_slave`. O diretório do mestre (`w1_bus_master*`) é ignorado.

use std::fs;
use std::path::PathBuf;

use tracing::trace;

use sensa_core::bus::OneWireBus;
use sensa_core::error::{BusError, BusResult};

/// Diretório padrão do kernel
pub const SYSFS_W1_DEVICES: &str = "/sys/bus/w1/devices";

const BUS_MASTER_PREFIX: &str = "w1_bus_master";

#[derive(Debug, Clone)]
pub struct SysfsOneWire {
    root: PathBuf,
}

impl Default for SysfsOneWire {
    fn default() -> Self {
        Self::new(SYSFS_W1_DEVICES)
    }
}

impl SysfsOneWire {
    /// Barramento com raiz customizada (útil em testes)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl OneWireBus for SysfsOneWire {
    fn list_devices(&mut self) -> BusResult<Vec<String>> {
        let mut ids: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with(BUS_MASTER_PREFIX))
            .collect();
        ids.sort();
        trace!(count = ids.len(), "one-wire devices listed");
        Ok(ids)
    }

    fn read_raw(&mut self, id: &str) -> BusResult<Vec<String>> {
        let path = self.root.join(id).join("w1_slave");
        if !path.exists() {
            return Err(BusError::DeviceNotFound(id.to_string()));
        }
        let text = fs::read_to_string(&path)?;
        Ok(text.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_bus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("w1_bus_master1")).unwrap();
        let sensor = dir.path().join("28-0316a2790cff");
        fs::create_dir(&sensor).unwrap();
        fs::write(
            sensor.join("w1_slave"),
            "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_list_devices_skips_master() {
        let dir = fake_bus();
        let mut bus = SysfsOneWire::new(dir.path());
        assert_eq!(bus.list_devices().unwrap(), vec!["28-0316a2790cff"]);
    }

    #[test]
    fn test_read_raw_lines() {
        let dir = fake_bus();
        let mut bus = SysfsOneWire::new(dir.path());
        let lines = bus.read_raw("28-0316a2790cff").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("YES"));
        assert!(lines[1].ends_with("t=23125"));
    }

    #[test]
    fn test_read_missing_device() {
        let dir = fake_bus();
        let mut bus = SysfsOneWire::new(dir.path());
        assert!(matches!(bus.read_raw("28-nothere"), Err(BusError::DeviceNotFound(_))));
    }
}
