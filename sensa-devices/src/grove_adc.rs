//! Grove Base HAT — ADC de 12 bits do microcontrolador da placa (I2C 0x08)

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::{ChannelRange, ChannelValue, scale, u16_le};
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, required_variable, validate_channel};

pub const DEFAULT_ADDRESS: u8 = 0x08;
pub const DEVICE_ID: u16 = 4;

const REG_DEVICE_ID: u8 = 0x00;
const REG_RAW_BASE: u8 = 0x10;
const CHANNELS: ChannelRange = ChannelRange::new(0, 15);
const FULL_SCALE: f64 = 4096.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroveAdcConfig {
    pub i2c_address: u8,
    pub adc_channel: Option<ChannelValue>,
    pub v_ref: f64,
}

impl Default for GroveAdcConfig {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_ADDRESS,
            adc_channel: None,
            v_ref: 3.3,
        }
    }
}

/// Registrador do código bruto do canal
pub fn channel_register(channel: u8) -> u8 {
    REG_RAW_BASE | (channel & 0x0F)
}

#[derive(Debug)]
pub struct GroveAdcHat {
    config: GroveAdcConfig,
    voltage_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl GroveAdcHat {
    pub const NAME: &'static str = "GroveAdcHat";

    pub fn new(config: GroveAdcConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            voltage_variable: required_variable(variables, "v_in", Self::NAME)?,
            config,
            bus: None,
        })
    }

    fn read_word(&self, bus: &Bus<dyn I2cBus>, register: u8) -> DeviceResult<u16> {
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &register.into(),
            2,
            ReadOptions::with_stop(),
        )?;
        expect_len(Self::NAME, &buf, 2)?;
        Ok(u16_le(buf[0], buf[1]))
    }
}

impl Device for GroveAdcHat {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::I2c
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        let bus = bus.into_i2c(Self::NAME)?;
        let id = self.read_word(&bus, REG_DEVICE_ID)?;
        if id != DEVICE_ID {
            return Err(DeviceError::DeviceMismatch {
                device: Self::NAME.into(),
                expected: format!("device id {}", DEVICE_ID),
                found: format!("device id {}", id),
            });
        }
        self.bus = Some(bus);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?;
        let channel = validate_channel(Self::NAME, CHANNELS, self.config.adc_channel.as_ref())?;
        let code = self.read_word(bus, channel_register(channel as u8))?;
        let voltage = scale(f64::from(code), FULL_SCALE, self.config.v_ref);
        debug!(channel, code, voltage, "Grove ADC sample");

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
    use sensa_bus::mock::MockI2c;
    use sensa_core::error::ChannelError;

    fn variables() -> Variables {
        [("v_in".to_string(), "v".to_string())].into_iter().collect()
    }

    fn config(channel: i64) -> GroveAdcConfig {
        GroveAdcConfig {
            adc_channel: Some(ChannelValue::Integer(channel)),
            ..Default::default()
        }
    }

    #[test]
    fn test_channel_register() {
        assert_eq!(channel_register(0), 0x10);
        assert_eq!(channel_register(15), 0x1F);
    }

    #[test]
    fn test_device_id_mismatch_is_fatal() {
        let mock = MockI2c::new().with_register(0x08, &[0x00], &[0x05, 0x00]);
        let mut dev = GroveAdcHat::new(config(0), &variables()).unwrap();
        assert!(matches!(
            dev.initialise(BusHandle::i2c(mock)),
            Err(DeviceError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_little_endian() {
        let mock = MockI2c::new()
            .with_register(0x08, &[0x00], &[0x04, 0x00])
            .with_register(0x08, &[0x13], &[0x00, 0x08]);
        let mut dev = GroveAdcHat::new(config(3), &variables()).unwrap();
        dev.initialise(BusHandle::i2c(mock)).unwrap();
        let board = dev.sample().unwrap();
        // 0x0800 / 4096 * 3.3
        assert!((board.get_f64("v").unwrap() - 1.65).abs() < 1e-12);
    }

    #[test]
    fn test_channel_range() {
        for (channel, ok) in [(0, true), (15, true), (-1, false), (16, false)] {
            let mock = MockI2c::new().with_register(0x08, &[0x00], &[0x04, 0x00]);
            let mut dev = GroveAdcHat::new(config(channel), &variables()).unwrap();
            dev.initialise(BusHandle::i2c(mock)).unwrap();
            let result = dev.sample();
            assert_eq!(result.is_ok(), ok, "channel {}", channel);
            if !ok {
                assert!(matches!(
                    result,
                    Err(DeviceError::InvalidChannel(ChannelError::OutOfRange { .. }))
                ));
            }
        }
    }
}
