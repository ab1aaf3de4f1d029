//! ADS1115 — ADC de 16 bits com PGA (I2C 0x48)
//!
//! | Registrador | Conteúdo |
//! |:------------|:---------|
//! | 0x00 | Conversão (i16 BE, complemento de dois) |
//! | 0x01 | Configuração (MUX, PGA, modo, taxa, comparador) |
//!
//! A configuração é reenviada a cada amostra: sobrevive a hot-plug e a
//! resets do chip, e troca o multiplexador para o canal pedido.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::{ChannelRange, ChannelValue, i16_be, scale};
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, required_variable, validate_channel};

pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;
const CHANNELS: ChannelRange = ChannelRange::new(0, 3);

/// Código positivo máximo (complemento de dois)
const FULL_SCALE: f64 = 32767.0;

/// MUX single-ended: AINx contra GND
const MUX_SINGLE_ENDED: u8 = 0b100;
/// 128 amostras/s, comparador desligado
const CONFIG_LSB: u8 = (0b100 << 5) | 0b00011;
/// Uma conversão a 128 SPS, com folga
const CONVERSION_WAIT: Duration = Duration::from_millis(9);

/// Faixas do PGA: `(fundo de escala em V, bits do campo PGA)`
const PGA_RANGES: [(f64, u8); 6] = [
    (6.144, 0b000),
    (4.096, 0b001),
    (2.048, 0b010),
    (1.024, 0b011),
    (0.512, 0b100),
    (0.256, 0b101),
];

/// Bits do PGA para um fundo de escala suportado
pub fn pga_bits(full_scale_voltage: f64) -> Option<u8> {
    PGA_RANGES
        .iter()
        .find(|(volts, _)| (volts - full_scale_voltage).abs() < 1e-9)
        .map(|&(_, bits)| bits)
}

/// Palavra de configuração: conversão contínua single-ended em `channel`
pub fn config_word(channel: u8, pga: u8) -> [u8; 2] {
    let msb = ((MUX_SINGLE_ENDED | (channel & 0b11)) << 4) | ((pga & 0b111) << 1);
    [msb, CONFIG_LSB]
}

/// Tensão a partir do registrador de conversão
pub fn decode_voltage(buf: &[u8], full_scale_voltage: f64) -> DeviceResult<f64> {
    expect_len(Ads1115::NAME, buf, 2)?;
    let code = i16_be(buf[0], buf[1]);
    Ok(scale(f64::from(code), FULL_SCALE, full_scale_voltage))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ads1115Config {
    pub i2c_address: u8,
    pub adc_channel: Option<ChannelValue>,
    /// Fundo de escala do PGA: 6.144, 4.096, 2.048, 1.024, 0.512 ou 0.256 V
    pub full_scale_voltage: f64,
}

impl Default for Ads1115Config {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_ADDRESS,
            adc_channel: None,
            full_scale_voltage: 6.144,
        }
    }
}

#[derive(Debug)]
pub struct Ads1115 {
    config: Ads1115Config,
    pga: u8,
    voltage_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl Ads1115 {
    pub const NAME: &'static str = "ADS1115";

    pub fn new(config: Ads1115Config, variables: &Variables) -> DeviceResult<Self> {
        let pga = pga_bits(config.full_scale_voltage).ok_or_else(|| {
            DeviceError::InvalidConfig(format!(
                "{}: unsupported full scale voltage {} V",
                Self::NAME,
                config.full_scale_voltage
            ))
        })?;
        Ok(Self {
            voltage_variable: required_variable(variables, "v_in", Self::NAME)?,
            pga,
            config,
            bus: None,
        })
    }
}

impl Device for Ads1115 {
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
        let channel = validate_channel(Self::NAME, CHANNELS, self.config.adc_channel.as_ref())?;
        let address = self.config.i2c_address;

        let config = config_word(channel as u8, self.pga);
        bus.borrow_mut()
            .write_register(address, &REG_CONFIG.into(), &config)?;
        std::thread::sleep(CONVERSION_WAIT);

        let buf = bus
            .borrow_mut()
            .read_register(address, &REG_CONVERSION.into(), 2, ReadOptions::COMBINED)?;
        let voltage = decode_voltage(&buf, self.config.full_scale_voltage)?;
        debug!(channel, voltage, "ADS1115 sample");

        let mut board = Blackboard::new();
        board.insert(self.voltage_variable.as_str(), voltage);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
