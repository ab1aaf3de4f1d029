//! MLX90614 — termômetro infravermelho (SMBus, máx. 100 kHz)

use serde::Deserialize;

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::u16_le;
use sensa_core::error::DeviceResult;
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, variable_or};

/// Temperatura do objeto, zona 1
const REG_TOBJ1: u8 = 0x07;
const KELVIN_PER_LSB: f64 = 0.02;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Mlx90614Config {
    pub i2c_address: u8,
}

impl Default for Mlx90614Config {
    fn default() -> Self {
        Self { i2c_address: 0x5A }
    }
}

/// °C com duas casas (o sensor resolve 0.02 K)
pub fn decode_temperature(lo: u8, hi: u8) -> f64 {
    let celsius = f64::from(u16_le(lo, hi)) * KELVIN_PER_LSB - 273.15;
    (celsius * 100.0).round() / 100.0
}

#[derive(Debug)]
pub struct Mlx90614 {
    config: Mlx90614Config,
    temperature_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl Mlx90614 {
    pub const NAME: &'static str = "MLX90614";

    pub fn new(config: Mlx90614Config, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            temperature_variable: variable_or(variables, "object_temperature", "temperature"),
            config,
            bus: None,
        })
    }
}

impl Device for Mlx90614 {
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
            self.config.i2c_address,
            &REG_TOBJ1.into(),
            2,
            ReadOptions::COMBINED,
        )?;
        expect_len(Self::NAME, &buf, 2)?;

        let mut board = Blackboard::new();
        board.insert(self.temperature_variable.as_str(), decode_temperature(buf[0], buf[1]));
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
