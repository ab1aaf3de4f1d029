//! BC Robotics ADC HAT — 16 canais de 10 bits (dois MCP3008 em CE0/CE1)
//!
//! Canais 0–7 ficam no chip do CE0 e 8–15 no chip do CE1. A decodificação é
//! a mesma do [`Mcp300x`](crate::mcp300x::Mcp300x); só a seleção de chip muda.

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{Bus, BusHandle, BusKind, SpiBus, SpiMode};
use sensa_core::codec::{ChannelRange, ChannelValue, scale};
use sensa_core::error::DeviceResult;
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, required_variable, validate_channel};
use crate::mcp300x::decode_code;

const MODE: SpiMode = SpiMode::MODE_0;
const CHANNELS: ChannelRange = ChannelRange::new(0, 15);
const CHANNELS_PER_CHIP: i64 = 8;
const FULL_SCALE: f64 = 1024.0;
/// SGL/DIFF = 1: entrada single-ended
const SINGLE_ENDED: u8 = 0b1000;

/// `(chip select, canal no chip)` de um canal da placa
pub fn route(channel: i64) -> (u8, u8) {
    (
        (channel / CHANNELS_PER_CHIP) as u8,
        (channel % CHANNELS_PER_CHIP) as u8,
    )
}

/// Palavras do pedido single-ended ao MCP3008
pub fn request(chip_channel: u8) -> [u8; 3] {
    [0x01, (SINGLE_ENDED | (chip_channel & 0b0111)) << 4, 0]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BcRoboticsAdcConfig {
    pub adc_channel: Option<ChannelValue>,
    pub v_ref: f64,
}

impl Default for BcRoboticsAdcConfig {
    fn default() -> Self {
        Self {
            adc_channel: None,
            v_ref: 3.3,
        }
    }
}

#[derive(Debug)]
pub struct BcRoboticsAdc16 {
    config: BcRoboticsAdcConfig,
    voltage_variable: String,
    bus: Option<Bus<dyn SpiBus>>,
}

impl BcRoboticsAdc16 {
    pub const NAME: &'static str = "BCRoboticsAdc16";

    pub fn new(config: BcRoboticsAdcConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            voltage_variable: required_variable(variables, "v_in", Self::NAME)?,
            config,
            bus: None,
        })
    }
}

impl Device for BcRoboticsAdc16 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::Spi
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        self.bus = Some(bus.into_spi(Self::NAME)?);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?;
        let channel = validate_channel(Self::NAME, CHANNELS, self.config.adc_channel.as_ref())?;
        let (chip_select, chip_channel) = route(channel);

        let buf = bus
            .borrow_mut()
            .transfer_on(chip_select, &request(chip_channel), Some(MODE))?;
        let code = decode_code(&buf)?;
        let voltage = scale(f64::from(code), FULL_SCALE, self.config.v_ref);
        debug!(channel, chip_select, code, voltage, "BC Robotics ADC sample");

        let mut board = Blackboard::new();
        board.insert(self.voltage_variable.as_str(), voltage);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
