//! MCP3008 / MCP3004 — ADC de 10 bits (SPI, modo 3)
//!
//! Os dois chips diferem apenas no número de canais.

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{Bus, BusHandle, BusKind, SpiBus, SpiMode};
use sensa_core::codec::{ChannelRange, ChannelValue, scale};
use sensa_core::error::DeviceResult;
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, required_variable, validate_channel};

const MODE: SpiMode = SpiMode::MODE_3;
const FULL_SCALE: f64 = 1024.0;
const START_BIT: u8 = 0x01;
const MODE_BIT: u8 = 0b1000;

/// Variante do chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mcp300xVariant {
    Mcp3008,
    Mcp3004,
}

impl Mcp300xVariant {
    pub fn channels(&self) -> ChannelRange {
        match self {
            Mcp300xVariant::Mcp3008 => ChannelRange::new(0, 7),
            Mcp300xVariant::Mcp3004 => ChannelRange::new(0, 3),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mcp300xVariant::Mcp3008 => "MCP3008",
            Mcp300xVariant::Mcp3004 => "MCP3004",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Mcp300xConfig {
    pub adc_channel: Option<ChannelValue>,
    pub differential: bool,
    pub v_ref: f64,
}

impl Default for Mcp300xConfig {
    fn default() -> Self {
        Self {
            adc_channel: None,
            differential: false,
            v_ref: 3.3,
        }
    }
}

/// Palavras do pedido: `[start, (diff << 3 | canal) << 4, 0]`
pub fn request(channel: u8, differential: bool) -> [u8; 3] {
    let mode = if differential { MODE_BIT } else { 0 };
    [START_BIT, (mode | (channel & 0b0111)) << 4, 0]
}

/// Código de 10 bits das palavras recebidas
pub fn decode_code(buf: &[u8]) -> DeviceResult<u16> {
    expect_len("MCP300x", buf, 3)?;
    Ok((u16::from(buf[1] & 0b11) << 8) + u16::from(buf[2]))
}

#[derive(Debug)]
pub struct Mcp300x {
    variant: Mcp300xVariant,
    config: Mcp300xConfig,
    voltage_variable: String,
    bus: Option<Bus<dyn SpiBus>>,
}

impl Mcp300x {
    pub fn new(variant: Mcp300xVariant, config: Mcp300xConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            variant,
            voltage_variable: required_variable(variables, "v_in", variant.name())?,
            config,
            bus: None,
        })
    }
}

impl Device for Mcp300x {
    fn name(&self) -> &str {
        self.variant.name()
    }

    fn interface(&self) -> BusKind {
        BusKind::Spi
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        self.bus = Some(bus.into_spi(self.variant.name())?);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, self.variant.name())?;
        let channel = validate_channel(
            self.variant.name(),
            self.variant.channels(),
            self.config.adc_channel.as_ref(),
        )?;

        let words = request(channel as u8, self.config.differential);
        let buf = bus.borrow_mut().transfer(&words, Some(MODE))?;
        let code = decode_code(&buf)?;
        let voltage = scale(f64::from(code), FULL_SCALE, self.config.v_ref);
        debug!(device = self.variant.name(), channel, code, voltage, "ADC sample");

        let mut board = Blackboard::new();
        board.insert(self.voltage_variable.as_str(), voltage);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensa_bus::mock::MockSpi;
    use sensa_core::error::{ChannelError, DeviceError};

    fn variables() -> Variables {
        [("v_in".to_string(), "voltage".to_string())].into_iter().collect()
    }

    fn device(variant: Mcp300xVariant, channel: ChannelValue, mock: &std::rc::Rc<std::cell::RefCell<MockSpi>>) -> Mcp300x {
        let config = Mcp300xConfig {
            adc_channel: Some(channel),
            ..Default::default()
        };
        let mut dev = Mcp300x::new(variant, config, &variables()).unwrap();
        dev.initialise(BusHandle::shared_spi(mock.clone())).unwrap();
        dev
    }

    #[test]
    fn test_request_words() {
        assert_eq!(request(0, false), [0x01, 0x00, 0x00]);
        assert_eq!(request(5, false), [0x01, 0x50, 0x00]);
        assert_eq!(request(2, true), [0x01, 0xA0, 0x00]);
    }

    #[test]
    fn test_decode_masks_high_bits() {
        assert_eq!(decode_code(&[0xFF, 0xFE, 0x00]).unwrap(), 0x200);
        assert_eq!(decode_code(&[0x00, 0x03, 0xFF]).unwrap(), 1023);
    }

    #[test]
    fn test_sample_voltage() {
        let mock = MockSpi::new().with_response(&[0x00, 0x02, 0x00]).shared();
        let mut dev = device(Mcp300xVariant::Mcp3008, ChannelValue::Integer(3), &mock);
        let board = dev.sample().unwrap();
        assert!((board.get_f64("voltage").unwrap() - 1.65).abs() < 1e-12);
        assert_eq!(mock.borrow().transfers()[0], (vec![0x01, 0x30, 0x00], Some(SpiMode::MODE_3)));
    }

    #[test]
    fn test_channel_bounds_per_variant() {
        let mock = MockSpi::new().shared();
        for ch in 0..=7 {
            assert!(device(Mcp300xVariant::Mcp3008, ChannelValue::Integer(ch), &mock).sample().is_ok());
        }
        for ch in [-1, 8] {
            let err = device(Mcp300xVariant::Mcp3008, ChannelValue::Integer(ch), &mock)
                .sample()
                .unwrap_err();
            assert!(matches!(err, DeviceError::InvalidChannel(ChannelError::OutOfRange { .. })));
        }
        for ch in 0..=3 {
            assert!(device(Mcp300xVariant::Mcp3004, ChannelValue::Integer(ch), &mock).sample().is_ok());
        }
        for ch in [-1, 4] {
            assert!(device(Mcp300xVariant::Mcp3004, ChannelValue::Integer(ch), &mock).sample().is_err());
        }
        let err = device(Mcp300xVariant::Mcp3004, ChannelValue::Float(1.0), &mock)
            .sample()
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidChannel(ChannelError::WrongType { .. })));
    }
}
