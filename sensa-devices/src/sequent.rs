//! # Sequent Microsystems HATs
//!
//! | Placa | Endereço | Canais | Dado |
//! |:------|:---------|:-------|:-----|
//! | [`SequentAdc16`] | 0x58 | 1–16 | mV em u16 LE (`code/10000 · 10 V`) |
//! | [`SequentRtd8`] | 0x40 | 1–8 | resistância em f32 LE |
//! | [`SequentDigitalInputs`] | 0x27 | 1–16 ou 1–8 | palavra de status invertida |
//!
//! Os canais seguem a serigrafia da placa (começam em 1).

use serde::Deserialize;
use tracing::debug;

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::{ChannelRange, ChannelValue, f32_le, scale, u16_le};
use sensa_core::error::{ChannelError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, required_variable, validate_channel, variable_or};

// ═══════════════════════════════════════════════════════════════════════════════
// ADC 16 CANAIS
// ═══════════════════════════════════════════════════════════════════════════════

const ADC_CHANNELS: ChannelRange = ChannelRange::new(1, 16);
const ADC_FULL_SCALE: f64 = 10000.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequentAdcConfig {
    pub i2c_address: u8,
    pub adc_channel: Option<ChannelValue>,
    pub v_ref: f64,
}

impl Default for SequentAdcConfig {
    fn default() -> Self {
        Self {
            i2c_address: 0x58,
            adc_channel: None,
            v_ref: 10.0,
        }
    }
}

/// Registrador do canal (2 bytes por canal a partir de 6)
pub fn adc_register(channel: u8) -> u8 {
    6 + (channel - 1) * 2
}

#[derive(Debug)]
pub struct SequentAdc16 {
    config: SequentAdcConfig,
    voltage_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl SequentAdc16 {
    pub const NAME: &'static str = "SequentAdc16";

    pub fn new(config: SequentAdcConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            voltage_variable: required_variable(variables, "v_in", Self::NAME)?,
            config,
            bus: None,
        })
    }
}

impl Device for SequentAdc16 {
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
        let channel = validate_channel(Self::NAME, ADC_CHANNELS, self.config.adc_channel.as_ref())?;

        // Transação combinada: com STOP a placa embaralha leituras simultâneas
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &adc_register(channel as u8).into(),
            2,
            ReadOptions::COMBINED,
        )?;
        expect_len(Self::NAME, &buf, 2)?;
        let code = u16_le(buf[0], buf[1]);
        let voltage = scale(f64::from(code), ADC_FULL_SCALE, self.config.v_ref);
        debug!(channel, code, voltage, "Sequent ADC sample");

        let mut board = Blackboard::new();
        board.insert(self.voltage_variable.as_str(), voltage);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RTD 8 CANAIS
// ═══════════════════════════════════════════════════════════════════════════════

const RTD_CHANNELS: ChannelRange = ChannelRange::new(1, 8);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequentRtdConfig {
    pub i2c_address: u8,
    pub channel: Option<ChannelValue>,
}

impl Default for SequentRtdConfig {
    fn default() -> Self {
        Self {
            i2c_address: 0x40,
            channel: None,
        }
    }
}

/// Registrador da resistência do canal (f32, 4 bytes por canal a partir de 59)
pub fn rtd_register(channel: u8) -> u8 {
    59 + 4 * (channel - 1)
}

/// Só aceita PT100; a conversão para temperatura fica no pipeline
#[derive(Debug)]
pub struct SequentRtd8 {
    config: SequentRtdConfig,
    resistance_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl SequentRtd8 {
    pub const NAME: &'static str = "SequentRtd8";

    pub fn new(config: SequentRtdConfig, variables: &Variables) -> DeviceResult<Self> {
        Ok(Self {
            resistance_variable: variable_or(variables, "PT_RTD_resistance", "resistance"),
            config,
            bus: None,
        })
    }

    /// Resistância do canal, em Ω
    pub fn read_resistance(&self, channel: &ChannelValue) -> DeviceResult<f64> {
        let bus = bound(&self.bus, Self::NAME)?;
        let channel = RTD_CHANNELS.validate(Self::NAME, channel)?;
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &rtd_register(channel as u8).into(),
            4,
            ReadOptions::COMBINED,
        )?;
        expect_len(Self::NAME, &buf, 4)?;
        Ok(f64::from(f32_le([buf[0], buf[1], buf[2], buf[3]])))
    }
}

impl Device for SequentRtd8 {
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
        bound(&self.bus, Self::NAME)?;
        let channel = self.config.channel.clone().ok_or_else(|| ChannelError::WrongType {
            device: Self::NAME.into(),
            value: "none".into(),
        })?;
        let resistance = self.read_resistance(&channel)?;
        debug!(%channel, resistance, "Sequent RTD sample");

        let mut board = Blackboard::new();
        board.insert(self.resistance_variable.as_str(), resistance);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRADAS DIGITAIS
// ═══════════════════════════════════════════════════════════════════════════════

const REG_INPUT_STATUS: u8 = 0x00;

/// Máscara de cada canal na palavra de status (canal 1 primeiro)
///
/// A ordem elétrica dos bits não segue a serigrafia; por isso a tabela.
pub const MAP_16_CHANNELS: [u16; 16] = [
    0x8000, 0x4000, 0x2000, 0x1000, 0x0800, 0x0400, 0x0200, 0x0100, 0x0080, 0x0040, 0x0020,
    0x0010, 0x0008, 0x0004, 0x0002, 0x0001,
];

pub const MAP_8_CHANNELS: [u16; 8] = [
    0x0800, 0x0400, 0x0200, 0x0100, 0x0010, 0x0020, 0x0040, 0x0080,
];

/// Variante da placa de entradas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalInputBoard {
    Inputs16,
    Inputs8,
}

impl DigitalInputBoard {
    pub fn channel_map(&self) -> &'static [u16] {
        match self {
            DigitalInputBoard::Inputs16 => &MAP_16_CHANNELS,
            DigitalInputBoard::Inputs8 => &MAP_8_CHANNELS,
        }
    }

    pub fn channels(&self) -> ChannelRange {
        ChannelRange::new(1, self.channel_map().len() as i64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigitalInputBoard::Inputs16 => "SequentDigitalInputs16",
            DigitalInputBoard::Inputs8 => "SequentDigitalInputs8",
        }
    }

    /// Estado do canal (1 = tensão alta); bit 0 na palavra significa ativo
    pub fn extract(&self, status: u16, channel: &ChannelValue) -> Result<u8, ChannelError> {
        let channel = self.channels().validate(self.name(), channel)?;
        let mask = self.channel_map()[(channel - 1) as usize];
        Ok(u8::from(status & mask == 0))
    }

    /// Todos os canais num inteiro; canal 1 é o bit menos significativo
    pub fn pack_all(&self, status: u16) -> u16 {
        self.channel_map()
            .iter()
            .enumerate()
            .filter(|(_, mask)| status & **mask == 0)
            .fold(0, |acc, (i, _)| acc | (1 << i))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequentDigitalInputsConfig {
    pub i2c_address: u8,
    pub gpio_channel: Option<ChannelValue>,
}

impl Default for SequentDigitalInputsConfig {
    fn default() -> Self {
        Self {
            i2c_address: 0x27,
            gpio_channel: None,
        }
    }
}

#[derive(Debug)]
pub struct SequentDigitalInputs {
    board: DigitalInputBoard,
    config: SequentDigitalInputsConfig,
    input_variable: String,
    bus: Option<Bus<dyn I2cBus>>,
}

impl SequentDigitalInputs {
    pub fn new(
        board: DigitalInputBoard,
        config: SequentDigitalInputsConfig,
        variables: &Variables,
    ) -> DeviceResult<Self> {
        Ok(Self {
            board,
            input_variable: required_variable(variables, "dig_in", board.name())?,
            config,
            bus: None,
        })
    }

    /// Palavra de status bruta (little-endian)
    fn read_status(&self) -> DeviceResult<u16> {
        let bus = bound(&self.bus, self.board.name())?;
        let buf = bus.borrow_mut().read_register(
            self.config.i2c_address,
            &REG_INPUT_STATUS.into(),
            2,
            ReadOptions::COMBINED,
        )?;
        expect_len(self.board.name(), &buf, 2)?;
        let status = u16_le(buf[0], buf[1]);
        debug!(status = format_args!("{:#018b}", status), "digital input status");
        Ok(status)
    }

    pub fn read_single_channel(&self, channel: &ChannelValue) -> DeviceResult<u8> {
        let status = self.read_status()?;
        Ok(self.board.extract(status, channel)?)
    }

    /// Vários canais com uma única transação, na ordem pedida
    pub fn read_multiple_channels(&self, channels: &[ChannelValue]) -> DeviceResult<Vec<u8>> {
        let status = self.read_status()?;
        channels
            .iter()
            .map(|ch| Ok(self.board.extract(status, ch)?))
            .collect()
    }

    pub fn read_all_channels(&self) -> DeviceResult<u16> {
        Ok(self.board.pack_all(self.read_status()?))
    }
}

impl Device for SequentDigitalInputs {
    fn name(&self) -> &str {
        self.board.name()
    }

    fn interface(&self) -> BusKind {
        BusKind::I2c
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        self.bus = Some(bus.into_i2c(self.board.name())?);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        bound(&self.bus, self.board.name())?;
        let channel = self.config.gpio_channel.clone().ok_or_else(|| ChannelError::WrongType {
            device: self.board.name().into(),
            value: "none".into(),
        })?;
        let state = self.read_single_channel(&channel)?;

        let mut board = Blackboard::new();
        board.insert(self.input_variable.as_str(), state);
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
    use sensa_core::error::DeviceError;

    fn vars(role: &str) -> Variables {
        [(role.to_string(), "x".to_string())].into_iter().collect()
    }

    #[test]
    fn test_adc_register_layout() {
        assert_eq!(adc_register(1), 6);
        assert_eq!(adc_register(16), 36);
        assert_eq!(rtd_register(1), 59);
        assert_eq!(rtd_register(8), 87);
    }

    #[test]
    fn test_adc_sample() {
        let mock = MockI2c::new().with_register(0x58, &[8], &[0x88, 0x13]);
        let config = SequentAdcConfig {
            adc_channel: Some(ChannelValue::Integer(2)),
            ..Default::default()
        };
        let mut dev = SequentAdc16::new(config, &vars("v_in")).unwrap();
        dev.initialise(BusHandle::i2c(mock)).unwrap();
        // 5000 mV
        assert!((dev.sample().unwrap().get_f64("x").unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_adc_channel_zero_rejected() {
        let mock = MockI2c::new().with_device(0x58);
        let config = SequentAdcConfig {
            adc_channel: Some(ChannelValue::Integer(0)),
            ..Default::default()
        };
        let mut dev = SequentAdc16::new(config, &vars("v_in")).unwrap();
        dev.initialise(BusHandle::i2c(mock)).unwrap();
        assert!(matches!(dev.sample(), Err(DeviceError::InvalidChannel(_))));
    }

    #[test]
    fn test_rtd_float_decode() {
        let mock = MockI2c::new().with_register(0x40, &[63], &138.5f32.to_le_bytes());
        let config = SequentRtdConfig {
            channel: Some(ChannelValue::Integer(2)),
            ..Default::default()
        };
        let mut dev = SequentRtd8::new(config, &Variables::new()).unwrap();
        dev.initialise(BusHandle::i2c(mock)).unwrap();
        assert_eq!(dev.sample().unwrap().get_f64("resistance"), Some(138.5));
        assert!(dev.read_resistance(&ChannelValue::Integer(9)).is_err());
    }

    #[test]
    fn test_all_inactive_and_all_active() {
        for board in [DigitalInputBoard::Inputs16, DigitalInputBoard::Inputs8] {
            let n = board.channel_map().len() as i64;
            for ch in 1..=n {
                let ch = ChannelValue::Integer(ch);
                assert_eq!(board.extract(0xFFFF, &ch), Ok(0));
                assert_eq!(board.extract(0x0000, &ch), Ok(1));
            }
            assert_eq!(board.pack_all(0xFFFF), 0);
            assert_eq!(board.pack_all(0x0000), ((1u32 << n) - 1) as u16);
        }
    }

    #[test]
    fn test_map_is_not_a_shift() {
        let board = DigitalInputBoard::Inputs8;
        // só o bit 0x0010 em zero: canal 5 ativo
        let status = !0x0010u16;
        assert_eq!(board.extract(status, &ChannelValue::Integer(5)), Ok(1));
        assert_eq!(board.extract(status, &ChannelValue::Integer(8)), Ok(0));
        assert_eq!(board.pack_all(status), 0b1_0000);
    }

    #[test]
    fn test_digital_channel_validation() {
        let board = DigitalInputBoard::Inputs16;
        assert!(board.extract(0, &ChannelValue::Integer(0)).is_err());
        assert!(board.extract(0, &ChannelValue::Integer(17)).is_err());
        assert!(matches!(
            board.extract(0, &ChannelValue::Text("1".into())),
            Err(ChannelError::WrongType { .. })
        ));
    }

    #[test]
    fn test_digital_reads() {
        // channel 1 (0x8000) ativo, resto inativo → status = 0x7FFF, LE = [0xFF, 0x7F]
        let mock = MockI2c::new().with_register(0x27, &[0x00], &[0xFF, 0x7F]);
        let config = SequentDigitalInputsConfig {
            gpio_channel: Some(ChannelValue::Integer(1)),
            ..Default::default()
        };
        let mut dev = SequentDigitalInputs::new(DigitalInputBoard::Inputs16, config, &vars("dig_in")).unwrap();
        dev.initialise(BusHandle::i2c(mock)).unwrap();

        assert_eq!(dev.sample().unwrap().get("x"), Some(sensa_core::Value::Int(1)));
        assert_eq!(
            dev.read_multiple_channels(&[ChannelValue::Integer(2), ChannelValue::Integer(1)])
                .unwrap(),
            vec![0, 1]
        );
        assert_eq!(dev.read_all_channels().unwrap(), 0x0001);
    }
}
