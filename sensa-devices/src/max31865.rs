//! MAX31865 — conversor RTD→resistência (SPI, modo 3)
//!
//! | Registrador | Leitura | Escrita |
//! |:------------|:--------|:--------|
//! | Config | 0x00 | 0x80 |
//! | RTD MSB/LSB | 0x01/0x02 | — |
//! | Fault status | 0x07 | — |
//!
//! O bit 0 do LSB do RTD é a flag de falha; o código tem 15 bits.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use sensa_core::bus::{Bus, BusHandle, BusKind, SpiBus, SpiMode};
use sensa_core::codec::u15_drop_flag;
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, variable_or};

const REG_CONFIG_READ: u8 = 0x00;
const REG_CONFIG_WRITE: u8 = 0x80;
const REG_RTD: u8 = 0x01;

const ONESHOT_BIT: u8 = 0b0010_0000;
const CONVERSION_WAIT: Duration = Duration::from_millis(100);

/// Só funciona com CPOL=1, CPHA=1; forçado em toda transferência
const MODE: SpiMode = SpiMode::MODE_3;

/// Divisor do código (32768, não 32767)
const FULL_SCALE: f64 = 32768.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum FilterFrequency {
    #[default]
    #[serde(rename = "50Hz")]
    Hz50,
    #[serde(rename = "60Hz")]
    Hz60,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Max31865Config {
    /// Resistor de referência (idealmente ~4× R0)
    #[serde(alias = "R_Ref")]
    pub r_ref: f64,
    pub filter_frequency: FilterFrequency,
    /// Conversão contínua (recomendado) ou one-shot por amostra
    #[serde(deserialize_with = "crate::common::flag")]
    pub continuous: bool,
    pub three_wire: bool,
}

impl Default for Max31865Config {
    fn default() -> Self {
        Self {
            r_ref: 430.0,
            filter_frequency: FilterFrequency::Hz50,
            continuous: true,
            three_wire: false,
        }
    }
}

/// Campos do registrador de configuração
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigRegister {
    pub vbias: bool,
    pub continuous: bool,
    pub oneshot: bool,
    pub three_wire: bool,
    /// Ciclo de detecção de falha (2 bits)
    pub fault_detect: u8,
    pub fault_clear: bool,
    pub filter_50hz: bool,
}

impl ConfigRegister {
    pub fn to_byte(&self) -> u8 {
        (u8::from(self.vbias) << 7)
            | (u8::from(self.continuous) << 6)
            | (u8::from(self.oneshot) << 5)
            | (u8::from(self.three_wire) << 4)
            | ((self.fault_detect & 0b11) << 2)
            | (u8::from(self.fault_clear) << 1)
            | u8::from(self.filter_50hz)
    }
}

/// `(resistência Ω, flag de falha)` a partir de `[msb, lsb]`
pub fn decode_resistance(buf: &[u8], r_ref: f64) -> DeviceResult<(f64, bool)> {
    expect_len(Max31865::NAME, buf, 2)?;
    let code = u15_drop_flag(buf[0], buf[1]);
    Ok((r_ref * f64::from(code) / FULL_SCALE, buf[1] & 1 != 0))
}

#[derive(Debug)]
pub struct Max31865 {
    config: Max31865Config,
    resistance_variable: String,
    bus: Option<Bus<dyn SpiBus>>,
}

impl Max31865 {
    pub const NAME: &'static str = "MAX31865";

    pub fn new(config: Max31865Config, variables: &Variables) -> DeviceResult<Self> {
        if config.r_ref <= 0.0 {
            return Err(DeviceError::InvalidConfig(format!(
                "{}: r_ref must be positive, got {}",
                Self::NAME,
                config.r_ref
            )));
        }
        Ok(Self {
            resistance_variable: variable_or(variables, "PT_RTD_resistance", "resistance"),
            config,
            bus: None,
        })
    }

    fn config_register(&self) -> ConfigRegister {
        ConfigRegister {
            // VBias ligado mesmo em one-shot
            vbias: true,
            continuous: self.config.continuous,
            three_wire: self.config.three_wire,
            filter_50hz: self.config.filter_frequency == FilterFrequency::Hz50,
            ..Default::default()
        }
    }

    fn oneshot(&self, bus: &Bus<dyn SpiBus>) -> DeviceResult<()> {
        let mut spi = bus.borrow_mut();
        let current = spi.read(&[REG_CONFIG_READ], 1, Some(MODE))?;
        expect_len(Self::NAME, &current, 1)?;
        spi.transfer(&[REG_CONFIG_WRITE, current[0] | ONESHOT_BIT], Some(MODE))?;
        Ok(())
    }
}

impl Device for Max31865 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::Spi
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        let bus = bus.into_spi(Self::NAME)?;
        let byte = self.config_register().to_byte();
        bus.borrow_mut().transfer(&[REG_CONFIG_WRITE, byte], Some(MODE))?;
        debug!(config = format_args!("0x{:02X}", byte), "MAX31865 configured");
        self.bus = Some(bus);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?;
        if !self.config.continuous {
            self.oneshot(bus)?;
            std::thread::sleep(CONVERSION_WAIT);
        }

        let buf = bus.borrow_mut().read(&[REG_RTD], 2, Some(MODE))?;
        let (resistance, fault) = decode_resistance(&buf, self.config.r_ref)?;
        if fault {
            warn!(resistance, "MAX31865 fault bit set");
        }

        let mut board = Blackboard::new();
        board.insert(self.resistance_variable.as_str(), resistance);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
