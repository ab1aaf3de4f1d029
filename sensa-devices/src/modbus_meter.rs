//! Medidor multifunção via Modbus (registradores de entrada)
//!
//! Cada grandeza ocupa dois registradores: float32 IEEE-754 com a palavra
//! baixa primeiro. O mesmo decode atende o barramento síncrono e o
//! assíncrono.

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{AsyncModbusBus, Bus, BusHandle, BusKind, ModbusBus};
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, required_variable};

const WORDS_PER_VALUE: u16 = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModbusMeterConfig {
    pub slave_id: u8,
    pub register_voltage: u16,
    pub register_current: u16,
    #[serde(alias = "register_thd_V")]
    pub register_thd_v: u16,
    #[serde(alias = "register_thd_I")]
    pub register_thd_i: u16,
}

impl Default for ModbusMeterConfig {
    fn default() -> Self {
        Self {
            slave_id: 1,
            register_voltage: 0x0006,
            register_current: 0x000C,
            register_thd_v: 0x0054,
            register_thd_i: 0x005A,
        }
    }
}

/// float32 a partir de `[palavra baixa, palavra alta]`
pub fn decode_float(registers: &[u16]) -> DeviceResult<f32> {
    let [lo, hi] = registers else {
        return Err(DeviceError::Decode(format!(
            "{}: expected 2 registers, got {}",
            ModbusMeter::NAME,
            registers.len()
        )));
    };
    Ok(f32::from_bits((u32::from(*hi) << 16) | u32::from(*lo)))
}

#[derive(Debug)]
pub struct ModbusMeter {
    config: ModbusMeterConfig,
    /// `(registrador, chave)` na ordem de leitura
    points: Vec<(u16, String)>,
    bus: Option<Bus<dyn ModbusBus>>,
}

impl ModbusMeter {
    pub const NAME: &'static str = "ModbusMeter";

    pub fn new(config: ModbusMeterConfig, variables: &Variables) -> DeviceResult<Self> {
        let points = vec![
            (config.register_current, required_variable(variables, "I_in", Self::NAME)?),
            (config.register_voltage, required_variable(variables, "V_in", Self::NAME)?),
            (config.register_thd_v, required_variable(variables, "thd_v", Self::NAME)?),
            (config.register_thd_i, required_variable(variables, "thd_i", Self::NAME)?),
        ];
        Ok(Self {
            config,
            points,
            bus: None,
        })
    }

    /// Amostra por um barramento assíncrono
    pub async fn sample_async<B: AsyncModbusBus>(&self, bus: &mut B) -> DeviceResult<Blackboard> {
        let mut board = Blackboard::new();
        for (register, key) in &self.points {
            let words = bus
                .read_input_registers(self.config.slave_id, *register, WORDS_PER_VALUE)
                .await?;
            board.insert(key.as_str(), decode_float(&words)?);
        }
        debug!(slave = self.config.slave_id, "meter sampled (async)");
        Ok(board)
    }
}

impl Device for ModbusMeter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::Modbus
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        self.bus = Some(bus.into_modbus(Self::NAME)?);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?;
        let mut board = Blackboard::new();
        for (register, key) in &self.points {
            let words = bus
                .borrow_mut()
                .read_input_registers(self.config.slave_id, *register, WORDS_PER_VALUE)?;
            board.insert(key.as_str(), decode_float(&words)?);
        }
        debug!(slave = self.config.slave_id, "meter sampled");
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
