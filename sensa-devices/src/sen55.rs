//! # SEN55 — material particulado, VOC, NOx, temperatura e umidade
//!
//! Comandos de 16 bits; toda palavra lida vem como `MSB, LSB, CRC`.
//!
//! | Comando | Endereço | Resposta |
//! |:--------|:---------|:---------|
//! | Iniciar medição | 0x0021 | — (50 ms) |
//! | Parar medição | 0x0104 | — (200 ms) |
//! | Data-ready | 0x0202 | 3 bytes |
//! | Valores medidos | 0x03C4 | 24 bytes (8 palavras) |
//! | Nome do produto | 0xD014 | 48 bytes |
//! | Número de série | 0xD033 | 48 bytes |
//! | Firmware | 0xD100 | 3 bytes |

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions, RegisterAddress};
use sensa_core::codec::{ChecksumPolicy, i16_be, u16_be};
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, variable_or};

const CMD_START_MEASUREMENT: u16 = 0x0021;
const CMD_STOP_MEASUREMENT: u16 = 0x0104;
const CMD_DATA_READY: u16 = 0x0202;
const CMD_READ_VALUES: u16 = 0x03C4;
const CMD_PRODUCT_NAME: u16 = 0xD014;
const CMD_SERIAL_NUMBER: u16 = 0xD033;
const CMD_FIRMWARE: u16 = 0xD100;

const START_WAIT: Duration = Duration::from_millis(50);
const STOP_WAIT: Duration = Duration::from_millis(200);
const READ_DELAY: Duration = Duration::from_millis(20);

/// "SEN55" em ASCII com CRC a cada 2 bytes
pub const PRODUCT_NAME_PREFIX: [u8; 9] = [83, 69, 131, 78, 53, 85, 53, 0, 68];

const DATA_READY: [u8; 3] = [0, 1, 176];
const DATA_NOT_READY: [u8; 3] = [0, 0, 129];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sen55Config {
    pub i2c_address: u8,
    pub checksum: ChecksumPolicy,
    /// Espera antes da primeira transação (datasheet: > 1 s)
    pub startup_wait_secs: f64,
    /// Espera após iniciar a medição, até o primeiro dado
    pub first_measurement_wait_secs: f64,
}

impl Default for Sen55Config {
    fn default() -> Self {
        Self {
            i2c_address: 0x69,
            checksum: ChecksumPolicy::Warn,
            startup_wait_secs: 1.0,
            first_measurement_wait_secs: 2.0,
        }
    }
}

/// Oito grandezas do bloco de valores medidos
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sen55Reading {
    pub pm1_0: f64,
    pub pm2_5: f64,
    pub pm4_0: f64,
    pub pm10_0: f64,
    pub humidity: f64,
    pub temperature: f64,
    pub voc_index: f64,
    pub nox_index: f64,
}

const FIELDS: [&str; 8] = ["pm1_0", "pm2_5", "pm4_0", "pm10_0", "humidity", "temperature", "voc_index", "nox_index"];

/// Decodifica os 24 bytes (8 triplas MSB/LSB/CRC)
pub fn decode_values(buf: &[u8], policy: ChecksumPolicy) -> DeviceResult<Sen55Reading> {
    expect_len(Sen55::NAME, buf, 24)?;
    for (word, field) in buf.chunks_exact(3).zip(FIELDS) {
        policy.check(Sen55::NAME, field, &word[..2], word[2])?;
    }

    let unsigned = |i: usize| f64::from(u16_be(buf[3 * i], buf[3 * i + 1]));
    let signed = |i: usize| f64::from(i16_be(buf[3 * i], buf[3 * i + 1]));
    Ok(Sen55Reading {
        pm1_0: unsigned(0) / 10.0,
        pm2_5: unsigned(1) / 10.0,
        pm4_0: unsigned(2) / 10.0,
        pm10_0: unsigned(3) / 10.0,
        humidity: signed(4) / 100.0,
        temperature: signed(5) / 200.0,
        voc_index: signed(6) / 10.0,
        nox_index: signed(7) / 10.0,
    })
}

/// Interpreta a resposta de data-ready
pub fn decode_data_ready(buf: &[u8]) -> DeviceResult<bool> {
    if buf == DATA_READY {
        Ok(true)
    } else if buf == DATA_NOT_READY {
        Ok(false)
    } else {
        Err(DeviceError::Decode(format!(
            "{}: unexpected data-ready response {:?}, possible CRC failure",
            Sen55::NAME,
            buf
        )))
    }
}

/// Chaves do blackboard para as oito grandezas
#[derive(Debug, Clone)]
struct Sen55Variables {
    pm1_0: String,
    pm2_5: String,
    pm4_0: String,
    pm10_0: String,
    voc: String,
    nox: String,
    temperature: String,
    humidity: String,
}

#[derive(Debug)]
pub struct Sen55 {
    config: Sen55Config,
    variables: Sen55Variables,
    bus: Option<Bus<dyn I2cBus>>,
}

impl Sen55 {
    pub const NAME: &'static str = "SEN55";

    pub fn new(config: Sen55Config, variables: &Variables) -> DeviceResult<Self> {
        for wait in [config.startup_wait_secs, config.first_measurement_wait_secs] {
            if !(wait >= 0.0 && wait.is_finite()) {
                return Err(DeviceError::InvalidConfig(format!(
                    "{}: wait times must be non-negative, got {}",
                    Self::NAME,
                    wait
                )));
            }
        }
        Ok(Self {
            variables: Sen55Variables {
                pm1_0: variable_or(variables, "PM1_var", "mc_1p0"),
                pm2_5: variable_or(variables, "PM2.5_var", "mc_2p5"),
                pm4_0: variable_or(variables, "PM4_var", "mc_4p0"),
                pm10_0: variable_or(variables, "PM10_var", "mc_10p0"),
                voc: variable_or(variables, "voc_var", "voc_index"),
                nox: variable_or(variables, "nox_var", "nox_index"),
                temperature: variable_or(variables, "temperature_var", "ambient_t"),
                humidity: variable_or(variables, "relative_humidity_var", "ambient_rh"),
            },
            config,
            bus: None,
        })
    }

    fn read(&self, bus: &Bus<dyn I2cBus>, command: u16, len: usize) -> DeviceResult<Vec<u8>> {
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &RegisterAddress::from(command),
            len,
            ReadOptions::stop_then_wait(READ_DELAY),
        )?;
        expect_len(Self::NAME, &buf, len)?;
        Ok(buf)
    }

    fn command(&self, bus: &Bus<dyn I2cBus>, command: u16, wait: Duration) -> DeviceResult<()> {
        bus.borrow_mut()
            .write(self.config.i2c_address, RegisterAddress::from(command).as_bytes())?;
        std::thread::sleep(wait);
        Ok(())
    }

    /// Nome do produto com os bytes de CRC
    pub fn product_name(&self) -> DeviceResult<Vec<u8>> {
        self.read(bound(&self.bus, Self::NAME)?, CMD_PRODUCT_NAME, 48)
    }

    /// Número de série com os bytes de CRC
    pub fn serial_number(&self) -> DeviceResult<Vec<u8>> {
        self.read(bound(&self.bus, Self::NAME)?, CMD_SERIAL_NUMBER, 48)
    }

    pub fn firmware_version(&self) -> DeviceResult<u8> {
        Ok(self.read(bound(&self.bus, Self::NAME)?, CMD_FIRMWARE, 3)?[0])
    }

    pub fn data_ready(&self) -> DeviceResult<bool> {
        decode_data_ready(&self.read(bound(&self.bus, Self::NAME)?, CMD_DATA_READY, 3)?)
    }

    pub fn start_measurement(&self) -> DeviceResult<()> {
        self.command(bound(&self.bus, Self::NAME)?, CMD_START_MEASUREMENT, START_WAIT)
    }

    /// Volta ao modo ocioso
    pub fn stop_measurement(&self) -> DeviceResult<()> {
        self.command(bound(&self.bus, Self::NAME)?, CMD_STOP_MEASUREMENT, STOP_WAIT)
    }
}

impl Device for Sen55 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::I2c
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        let bus = bus.into_i2c(Self::NAME)?;
        std::thread::sleep(Duration::from_secs_f64(self.config.startup_wait_secs));

        let name = self.read(&bus, CMD_PRODUCT_NAME, 48)?;
        if !name.starts_with(&PRODUCT_NAME_PREFIX) {
            return Err(DeviceError::DeviceMismatch {
                device: Self::NAME.into(),
                expected: format!("product name {:?}", PRODUCT_NAME_PREFIX),
                found: format!("{:?}", &name[..PRODUCT_NAME_PREFIX.len()]),
            });
        }
        self.bus = Some(bus);

        info!(
            serial = ?self.serial_number()?,
            firmware = self.firmware_version()?,
            "SEN55 detected"
        );

        self.start_measurement()?;
        std::thread::sleep(Duration::from_secs_f64(self.config.first_measurement_wait_secs));
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        if !self.data_ready()? {
            return Err(DeviceError::NotReady(Self::NAME.into()));
        }
        let buf = self.read(bound(&self.bus, Self::NAME)?, CMD_READ_VALUES, 24)?;
        let reading = decode_values(&buf, self.config.checksum)?;
        debug!(?reading, "SEN55 sample");

        let vars = &self.variables;
        let mut board = Blackboard::new();
        board.insert(vars.pm1_0.as_str(), reading.pm1_0);
        board.insert(vars.pm2_5.as_str(), reading.pm2_5);
        board.insert(vars.pm4_0.as_str(), reading.pm4_0);
        board.insert(vars.pm10_0.as_str(), reading.pm10_0);
        board.insert(vars.voc.as_str(), reading.voc_index);
        board.insert(vars.nox.as_str(), reading.nox_index);
        board.insert(vars.temperature.as_str(), reading.temperature);
        board.insert(vars.humidity.as_str(), reading.humidity);
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

    /// PM 10.5/11.0/12.5/13.0, RH 45.5, T -5.0, VOC 25.0, NOx 1.0
    const VALUES: [u8; 24] = [
        0, 105, 178, 0, 110, 37, 0, 125, 53, 0, 130, 153, 17, 198, 250, 252, 24, 215, 0, 250, 216,
        0, 10, 90,
    ];

    fn no_wait() -> Sen55Config {
        Sen55Config {
            startup_wait_secs: 0.0,
            first_measurement_wait_secs: 0.0,
            ..Default::default()
        }
    }

    fn product_name() -> Vec<u8> {
        let mut name = PRODUCT_NAME_PREFIX.to_vec();
        name.resize(48, 0);
        name
    }

    fn sensor() -> MockI2c {
        MockI2c::new()
            .with_register(0x69, &[0xD0, 0x14], &product_name())
            .with_register(0x69, &[0xD1, 0x00], &[2, 0, 0])
            .with_register(0x69, &[0x02, 0x02], &DATA_READY)
            .with_register(0x69, &[0x03, 0xC4], &VALUES)
    }

    #[test]
    fn test_decode_values_signed_fields() {
        let r = decode_values(&VALUES, ChecksumPolicy::Reject).unwrap();
        assert_eq!(r.pm1_0, 10.5);
        assert_eq!(r.pm10_0, 13.0);
        assert_eq!(r.humidity, 45.5);
        assert_eq!(r.temperature, -5.0);
        assert_eq!(r.voc_index, 25.0);
        assert_eq!(r.nox_index, 1.0);
    }

    #[test]
    fn test_decode_values_crc_policy() {
        let mut corrupted = VALUES;
        corrupted[2] ^= 0xFF;
        assert!(matches!(
            decode_values(&corrupted, ChecksumPolicy::Reject),
            Err(DeviceError::ChecksumMismatch { .. })
        ));
        assert_eq!(decode_values(&corrupted, ChecksumPolicy::Warn).unwrap().pm1_0, 10.5);
    }

    #[test]
    fn test_data_ready_decode() {
        assert_eq!(decode_data_ready(&[0, 1, 176]), Ok(true));
        assert_eq!(decode_data_ready(&[0, 0, 129]), Ok(false));
        assert!(matches!(decode_data_ready(&[0, 1, 0]), Err(DeviceError::Decode(_))));
    }

    #[test]
    fn test_initialise_and_sample() {
        let mock = sensor().shared();
        let mut dev = Sen55::new(no_wait(), &Variables::new()).unwrap();
        dev.initialise(BusHandle::shared_i2c(mock.clone())).unwrap();
        assert!(mock.borrow().writes_to(0x69).contains(&vec![0x00, 0x21]));

        let board = dev.sample().unwrap();
        assert_eq!(board.get_f64("mc_2p5"), Some(11.0));
        assert_eq!(board.get_f64("ambient_t"), Some(-5.0));
        assert_eq!(board.get_f64("ambient_rh"), Some(45.5));
        assert_eq!(board.len(), 8);
    }

    #[test]
    fn test_product_name_mismatch() {
        let mock = sensor().with_register(0x69, &[0xD0, 0x14], &[0u8; 48]);
        let mut dev = Sen55::new(no_wait(), &Variables::new()).unwrap();
        assert!(matches!(
            dev.initialise(BusHandle::i2c(mock)),
            Err(DeviceError::DeviceMismatch { .. })
        ));
        assert!(!dev.is_initialised());
    }

    #[test]
    fn test_not_ready() {
        let mock = sensor().with_register(0x69, &[0x02, 0x02], &DATA_NOT_READY);
        let mut dev = Sen55::new(no_wait(), &Variables::new()).unwrap();
        dev.initialise(BusHandle::i2c(mock)).unwrap();
        assert!(matches!(dev.sample(), Err(DeviceError::NotReady(_))));
    }

    #[test]
    fn test_negative_wait_rejected() {
        let config = Sen55Config {
            startup_wait_secs: -1.0,
            ..Default::default()
        };
        assert!(Sen55::new(config, &Variables::new()).is_err());
    }
}
