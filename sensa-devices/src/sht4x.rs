//! SHT4x — temperatura e umidade relativa (I2C)
//!
//! Uma leitura são 6 bytes: `T_msb T_lsb T_crc RH_msb RH_lsb RH_crc`.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::{ChecksumPolicy, u16_be};
use sensa_core::error::DeviceResult;
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, required_variable};

pub const DEFAULT_ADDRESS: u8 = 0x44;

const MEASURE_DELAY: Duration = Duration::from_millis(10);

/// Precisão da medição (comando enviado)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    High,
    Med,
    Low,
}

impl Resolution {
    pub fn command(&self) -> u8 {
        match self {
            Resolution::High => 0xFD,
            Resolution::Med => 0xF6,
            Resolution::Low => 0xE0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sht4xConfig {
    pub i2c_address: u8,
    pub resolution: Resolution,
    pub checksum: ChecksumPolicy,
}

impl Default for Sht4xConfig {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_ADDRESS,
            resolution: Resolution::High,
            checksum: ChecksumPolicy::Warn,
        }
    }
}

/// `T = -45 + 175·S/65535`
pub fn temperature_from_ticks(ticks: u16) -> f64 {
    -45.0 + (175.0 * f64::from(ticks) / 65535.0)
}

/// `RH = -6 + 125·S/65535`
pub fn humidity_from_ticks(ticks: u16) -> f64 {
    -6.0 + (125.0 * f64::from(ticks) / 65535.0)
}

/// Decodifica o bloco de 6 bytes em `(°C, %RH)`
///
/// Com política `Warn` um CRC errado é registrado e o valor segue.
pub fn decode(buf: &[u8], policy: ChecksumPolicy) -> DeviceResult<(f64, f64)> {
    expect_len(Sht4x::NAME, buf, 6)?;
    policy.check(Sht4x::NAME, "temperature", &buf[0..2], buf[2])?;
    policy.check(Sht4x::NAME, "humidity", &buf[3..5], buf[5])?;
    Ok((
        temperature_from_ticks(u16_be(buf[0], buf[1])),
        humidity_from_ticks(u16_be(buf[3], buf[4])),
    ))
}

#[derive(Debug)]
pub struct Sht4x {
    address: u8,
    resolution: Resolution,
    checksum: ChecksumPolicy,
    humidity_variable: String,
    temperature_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl Sht4x {
    pub const NAME: &'static str = "SHT4x";

    pub fn new(config: Sht4xConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            address: config.i2c_address,
            resolution: config.resolution,
            checksum: config.checksum,
            humidity_variable: required_variable(variables, "RH", Self::NAME)?,
            temperature_variable: required_variable(variables, "T", Self::NAME)?,
            bus: None,
        })
    }
}

impl Device for Sht4x {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::I2c
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        self.bus = Some(bus.into_i2c(Self::NAME)?);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?;
        let buf = bus.borrow_mut().read_register(
            self.address,
            &self.resolution.command().into(),
            6,
            ReadOptions::stop_then_wait(MEASURE_DELAY),
        )?;
        let (temperature, humidity) = decode(&buf, self.checksum)?;
        if !(0.0..=100.0).contains(&humidity) {
            warn!(humidity, "SHT4x humidity outside 0..100 %RH");
        }
        debug!(temperature, humidity, "SHT4x sample");

        let mut board = Blackboard::new();
        board.insert(self.humidity_variable.as_str(), humidity);
        board.insert(self.temperature_variable.as_str(), temperature);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
