//! ENS160 — qualidade do ar por óxido metálico (I2C 0x53)
//!
//! Publica AQI (1–5, escala UBA), TVOC em ppb e eCO2 em ppm. O modo de
//! operação é reenviado a cada amostra para sobreviver a resets do sensor.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::u16_le;
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, variable_or};

pub const CHIP_ID: u16 = 0x0160;

const REG_PART_ID: u8 = 0x00;
const REG_OPMODE: u8 = 0x10;
const REG_TEMP_IN: u8 = 0x13;
const REG_DATA: u8 = 0x21;

const MODE_WAIT: Duration = Duration::from_millis(20);

/// Modo de operação (registrador 0x10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperatingMode {
    DeepSleep = 0x00,
    Idle = 0x01,
    Standard = 0x02,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ens160Config {
    pub i2c_address: u8,
    /// Temperatura de compensação (°C)
    pub ambient_temperature: f64,
    /// Umidade de compensação (%RH)
    pub relative_humidity: f64,
}

impl Default for Ens160Config {
    fn default() -> Self {
        Self {
            i2c_address: 0x53,
            ambient_temperature: 25.0,
            relative_humidity: 50.0,
        }
    }
}

/// Bytes de compensação: T em Kelvin·64 e RH·512, ambos LE
///
/// Valores que não cabem nos registradores de 16 bits (ou RH fora de
/// 0–100 %) são rejeitados.
pub fn compensation_bytes(temperature: f64, humidity: f64) -> DeviceResult<[u8; 4]> {
    let t = ((temperature + 273.15) * 64.0 + 0.5).floor();
    if !(0.0..=f64::from(u16::MAX)).contains(&t) {
        return Err(DeviceError::InvalidConfig(format!(
            "{}: compensation temperature {} °C is out of range",
            Ens160::NAME,
            temperature
        )));
    }
    if !(0.0..=100.0).contains(&humidity) {
        return Err(DeviceError::InvalidConfig(format!(
            "{}: compensation humidity {} %RH is out of range",
            Ens160::NAME,
            humidity
        )));
    }
    let rh = (humidity * 512.0 + 0.5).floor();
    let [t0, t1] = (t as u16).to_le_bytes();
    let [h0, h1] = (rh as u16).to_le_bytes();
    Ok([t0, t1, h0, h1])
}

/// Leitura decodificada do bloco de dados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQuality {
    pub aqi: u8,
    pub tvoc: u16,
    pub eco2: u16,
}

pub fn decode_data(buf: &[u8]) -> DeviceResult<AirQuality> {
    expect_len(Ens160::NAME, buf, 5)?;
    Ok(AirQuality {
        aqi: buf[0],
        tvoc: u16_le(buf[1], buf[2]),
        eco2: u16_le(buf[3], buf[4]),
    })
}

#[derive(Debug)]
pub struct Ens160 {
    config: Ens160Config,
    eco2_variable: String,
    tvoc_variable: String,
    aqi_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl Ens160 {
    pub const NAME: &'static str = "ENS160";

    pub fn new(config: Ens160Config, variables: &Variables) -> DeviceResult<Self> {
        compensation_bytes(config.ambient_temperature, config.relative_humidity)?;
        Ok(Self {
            eco2_variable: variable_or(variables, "eCO2_var", "eCO2"),
            tvoc_variable: variable_or(variables, "TVOC_var", "TVOC"),
            aqi_variable: variable_or(variables, "AQI_var", "AQI"),
            config,
            bus: None,
        })
    }

    fn set_mode(&self, bus: &Bus<dyn I2cBus>, mode: OperatingMode) -> DeviceResult<()> {
        bus.borrow_mut()
            .write_register(self.config.i2c_address, &REG_OPMODE.into(), &[mode as u8])?;
        std::thread::sleep(MODE_WAIT);
        Ok(())
    }
}

impl Device for Ens160 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::I2c
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        let bus = bus.into_i2c(Self::NAME)?;
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &REG_PART_ID.into(),
            2,
            ReadOptions::COMBINED,
        )?;
        expect_len(Self::NAME, &buf, 2)?;
        let id = u16_le(buf[0], buf[1]);
        if id != CHIP_ID {
            return Err(DeviceError::DeviceMismatch {
                device: Self::NAME.into(),
                expected: format!("chip id 0x{:04X}", CHIP_ID),
                found: format!("chip id 0x{:04X}", id),
            });
        }

        self.set_mode(&bus, OperatingMode::Standard)?;
        let compensation = compensation_bytes(self.config.ambient_temperature, self.config.relative_humidity)?;
        bus.borrow_mut()
            .write_register(self.config.i2c_address, &REG_TEMP_IN.into(), &compensation)?;
        debug!(?compensation, "ENS160 compensation written");

        self.bus = Some(bus);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?;
        self.set_mode(bus, OperatingMode::Standard)?;
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &REG_DATA.into(),
            5,
            ReadOptions::COMBINED,
        )?;
        let data = decode_data(&buf)?;

        let mut board = Blackboard::new();
        board.insert(self.aqi_variable.as_str(), data.aqi);
        board.insert(self.tvoc_variable.as_str(), data.tvoc);
        board.insert(self.eco2_variable.as_str(), data.eco2);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensa_bus::mock::MockI2c;
    use sensa_core::Value;

    #[test]
    fn test_compensation_encoding() {
        // 298.15 · 64 = 19081.6 → 19082 = 0x4A8A; 50 · 512 = 25600 = 0x6400
        assert_eq!(compensation_bytes(25.0, 50.0).unwrap(), [0x8A, 0x4A, 0x00, 0x64]);
        // 100 %RH = 51200 = 0xC800
        assert_eq!(compensation_bytes(-273.15, 100.0).unwrap(), [0x00, 0x00, 0x00, 0xC8]);
    }

    #[test]
    fn test_compensation_out_of_range_is_rejected() {
        for (t, rh) in [(-300.0, 50.0), (800.0, 50.0), (25.0, -1.0), (25.0, 130.0), (f64::NAN, 50.0)] {
            assert!(
                matches!(compensation_bytes(t, rh), Err(DeviceError::InvalidConfig(_))),
                "T={} RH={}",
                t,
                rh
            );
        }
        let config = Ens160Config {
            relative_humidity: 150.0,
            ..Default::default()
        };
        assert!(Ens160::new(config, &Variables::new()).is_err());
    }

    #[test]
    fn test_decode_data() {
        let data = decode_data(&[2, 0x2C, 0x01, 0x90, 0x01]).unwrap();
        assert_eq!(data, AirQuality { aqi: 2, tvoc: 300, eco2: 400 });
        assert!(decode_data(&[2, 0, 0]).is_err());
    }

    #[test]
    fn test_chip_id_check() {
        let mock = MockI2c::new().with_register(0x53, &[0x00], &[0x61, 0x01]);
        let mut dev = Ens160::new(Ens160Config::default(), &Variables::new()).unwrap();
        assert!(matches!(
            dev.initialise(BusHandle::i2c(mock)),
            Err(DeviceError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_rewrites_mode() {
        let mock = MockI2c::new()
            .with_register(0x53, &[0x00], &[0x60, 0x01])
            .with_register(0x53, &[0x21], &[1, 0x10, 0x00, 0x20, 0x00])
            .shared();
        let mut dev = Ens160::new(Ens160Config::default(), &Variables::new()).unwrap();
        dev.initialise(BusHandle::shared_i2c(mock.clone())).unwrap();
        let board = dev.sample().unwrap();

        assert_eq!(board.get("AQI"), Some(Value::Int(1)));
        assert_eq!(board.get("TVOC"), Some(Value::Int(16)));
        assert_eq!(board.get("eCO2"), Some(Value::Int(32)));

        let writes = mock.borrow().writes_to(0x53);
        assert_eq!(
            writes,
            vec![
                vec![0x10, 0x02],
                vec![0x13, 0x8A, 0x4A, 0x00, 0x64],
                vec![0x10, 0x02],
            ]
        );
    }
}
