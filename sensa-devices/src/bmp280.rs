//! # BMP280 — pressão e temperatura (I2C)
//!
//! Padrões de configuração da tabela "handheld device low-power" do datasheet:
//!
//! | Modo | osrs_p | osrs_t | filtro IIR | t_standby |
//! |:-----|:-------|:-------|:-----------|:----------|
//! | Normal | ×16 | ×2 | 4 | 62.5 ms |
//!
//! A compensação segue o Apêndice 1 do datasheet (versão em ponto flutuante),
//! na mesma ordem de operações.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use sensa_core::bus::{Bus, BusHandle, BusKind, I2cBus, ReadOptions};
use sensa_core::codec::{i16_le, u16_le, u20_from_msb};
use sensa_core::error::{DeviceError, DeviceResult};
use sensa_core::{Blackboard, Device};

use crate::common::{Variables, bound, expect_len, required_variable};

pub const DEFAULT_ADDRESS: u8 = 0x76;
pub const CHIP_ID: u8 = 0x58;

const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_CALIBRATION: u8 = 0x88;
const REG_RESULT: u8 = 0xF7;

const RESET_VALUE: u8 = 0xB6;
const MODE_NORMAL: u8 = 0b11;
const CALIBRATION_LEN: usize = 24;

/// Código que o chip reporta antes da primeira conversão
pub const SKIPPED_CODE: u32 = 0x80000;

const SETTLE: Duration = Duration::from_millis(100);
const RESET_WAIT: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bmp280Config {
    pub i2c_address: u8,
    /// Oversampling de pressão: 0, 1, 2, 4, 8 ou 16
    pub osrs_p: u32,
    /// Oversampling de temperatura: 0, 1, 2, 4, 8 ou 16
    pub osrs_t: u32,
    /// Coeficiente do filtro IIR: 0, 2, 4, 8 ou 16
    pub filter: u32,
    /// Tempo de standby ("0.5ms" … "4000ms")
    pub t_sb: String,
}

impl Default for Bmp280Config {
    fn default() -> Self {
        Self {
            i2c_address: DEFAULT_ADDRESS,
            osrs_p: 16,
            osrs_t: 2,
            filter: 4,
            t_sb: "62.5ms".into(),
        }
    }
}

fn oversampling_bits(value: u32) -> Option<u8> {
    match value {
        0 => Some(0b000),
        1 => Some(0b001),
        2 => Some(0b010),
        4 => Some(0b011),
        8 => Some(0b100),
        16 => Some(0b101),
        _ => None,
    }
}

fn filter_bits(value: u32) -> Option<u8> {
    match value {
        0 => Some(0b000),
        2 => Some(0b001),
        4 => Some(0b010),
        8 => Some(0b011),
        16 => Some(0b100),
        _ => None,
    }
}

fn standby_bits(value: &str) -> Option<u8> {
    match value {
        "0.5ms" => Some(0b000),
        "62.5ms" => Some(0b001),
        "125ms" => Some(0b010),
        "250ms" => Some(0b011),
        "500ms" => Some(0b100),
        "1000ms" => Some(0b101),
        "2000ms" => Some(0b110),
        "4000ms" => Some(0b111),
        _ => None,
    }
}

/// Valor configurado ou, se inválido, o padrão com aviso
fn or_default<T: std::fmt::Display>(name: &str, value: T, bits: Option<u8>, default: u8, default_label: &str) -> u8 {
    bits.unwrap_or_else(|| {
        warn!(setting = name, %value, "Invalid {} set in config, using default of {}", name, default_label);
        default
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALIBRAÇÃO E COMPENSAÇÃO
// ═══════════════════════════════════════════════════════════════════════════════

/// Coeficientes de fábrica (0x88..0x9F, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    /// Decodifica o bloco de 24 bytes (T1 e P1 sem sinal, demais com sinal)
    pub fn from_bytes(buf: &[u8]) -> DeviceResult<Self> {
        expect_len("BMP280", buf, CALIBRATION_LEN)?;
        let s = |i: usize| i16_le(buf[i], buf[i + 1]);
        Ok(Self {
            t1: u16_le(buf[0], buf[1]),
            t2: s(2),
            t3: s(4),
            p1: u16_le(buf[6], buf[7]),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        })
    }

    /// Retorna `(temperatura °C, t_fine)`
    pub fn compensate_temperature(&self, adc_t: u32) -> (f64, f64) {
        let adc_t = f64::from(adc_t);
        let t1 = f64::from(self.t1);
        let var1 = ((adc_t / 16384.0) - (t1 / 1024.0)) * f64::from(self.t2);
        let var2 = (((adc_t / 131072.0) - (t1 / 8192.0)) * ((adc_t / 131072.0) - (t1 / 8192.0)))
            * f64::from(self.t3);
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressão em Pa; 0 quando o denominador zera
    pub fn compensate_pressure(&self, adc_p: u32, t_fine: f64) -> f64 {
        let mut var1 = (t_fine / 2.0) - 64000.0;
        let mut var2 = var1 * var1 * f64::from(self.p6) / 32768.0;
        var2 += var1 * f64::from(self.p5) * 2.0;
        var2 = (var2 / 4.0) + (f64::from(self.p4) * 65536.0);
        var1 = (f64::from(self.p3) * var1 * var1 / 524288.0 + f64::from(self.p2) * var1) / 524288.0;
        var1 = (1.0 + (var1 / 32768.0)) * f64::from(self.p1);
        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - f64::from(adc_p);
        p = (p - (var2 / 4096.0)) * 6250.0 / var1;
        let var1 = f64::from(self.p9) * p * p / 2147483648.0;
        let var2 = p * f64::from(self.p8) / 32768.0;
        p + (var1 + var2 + f64::from(self.p7)) / 16.0
    }
}

/// Separa os códigos de 20 bits `(pressão, temperatura)` do bloco 0xF7..0xFC
pub fn decode_raw(buf: &[u8]) -> DeviceResult<(u32, u32)> {
    expect_len("BMP280", buf, 6)?;
    Ok((
        u20_from_msb(buf[0], buf[1], buf[2]),
        u20_from_msb(buf[3], buf[4], buf[5]),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPOSITIVO
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Bmp280 {
    address: u8,
    config_byte: u8,
    control_byte: u8,
    pressure_variable: String,
    temperature_variable: String,
    calibration: Calibration,
    bus: Option<Bus<dyn I2cBus>>,
}

impl Bmp280 {
    pub const NAME: &'static str = "BMP280";

    pub fn new(config: Bmp280Config, variables: &Variables) -> DeviceResult<Self> {
        let osrs_p = or_default("osrs_p", config.osrs_p, oversampling_bits(config.osrs_p), 0b101, "16");
        let osrs_t = or_default("osrs_t", config.osrs_t, oversampling_bits(config.osrs_t), 0b010, "2");
        let filter = or_default("filter", config.filter, filter_bits(config.filter), 0b010, "4");
        let t_sb = or_default("t_sb", &config.t_sb, standby_bits(&config.t_sb), 0b001, "62.5ms");

        Ok(Self {
            address: config.i2c_address,
            config_byte: ((t_sb & 0b111) << 5) | ((filter & 0b111) << 2),
            control_byte: ((osrs_t & 0b111) << 5) | ((osrs_p & 0b111) << 2) | MODE_NORMAL,
            pressure_variable: required_variable(variables, "P", Self::NAME)?,
            temperature_variable: required_variable(variables, "T", Self::NAME)?,
            calibration: Calibration::default(),
            bus: None,
        })
    }

    /// Byte do registrador 0xF5 (`t_sb << 5 | filter << 2`)
    pub fn config_byte(&self) -> u8 {
        self.config_byte
    }

    /// Byte do registrador 0xF4 (`osrs_t << 5 | osrs_p << 2 | mode`)
    pub fn control_byte(&self) -> u8 {
        self.control_byte
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Lê calibração e grava configuração e controle
    fn configure(&mut self, bus: &Bus<dyn I2cBus>) -> DeviceResult<()> {
        let buf = bus.borrow_mut().read_register(
            self.address,
            &REG_CALIBRATION.into(),
            CALIBRATION_LEN,
            ReadOptions::COMBINED,
        )?;
        self.calibration = Calibration::from_bytes(&buf)?;
        debug!(calibration = ?self.calibration, "BMP280 calibration loaded");

        let mut i2c = bus.borrow_mut();
        i2c.write_register(self.address, &REG_CONFIG.into(), &[self.config_byte])?;
        i2c.write_register(self.address, &REG_CTRL_MEAS.into(), &[self.control_byte])?;
        drop(i2c);

        // tempo para encher o filtro IIR
        std::thread::sleep(SETTLE);
        Ok(())
    }

    fn read_codes(&self, bus: &Bus<dyn I2cBus>) -> DeviceResult<(u32, u32)> {
        let buf = bus
            .borrow_mut()
            .read_register(self.address, &REG_RESULT.into(), 6, ReadOptions::COMBINED)?;
        decode_raw(&buf)
    }
}

impl Device for Bmp280 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn interface(&self) -> BusKind {
        BusKind::I2c
    }

    fn initialise(&mut self, bus: BusHandle) -> DeviceResult<()> {
        let bus = bus.into_i2c(Self::NAME)?;
        let id = bus
            .borrow_mut()
            .read_register(self.address, &REG_CHIP_ID.into(), 1, ReadOptions::COMBINED)?;
        if id.first() != Some(&CHIP_ID) {
            return Err(DeviceError::DeviceMismatch {
                device: Self::NAME.into(),
                expected: format!("chip id 0x{:02X}", CHIP_ID),
                found: format!("{:02X?}", id),
            });
        }
        self.configure(&bus)?;
        self.bus = Some(bus);
        Ok(())
    }

    fn sample(&mut self) -> DeviceResult<Blackboard> {
        let bus = bound(&self.bus, Self::NAME)?.clone();
        let (mut raw_p, mut raw_t) = self.read_codes(&bus)?;

        if raw_p == SKIPPED_CODE || raw_t == SKIPPED_CODE {
            // Uma única tentativa: se continuar inválido, segue com o valor
            warn!(raw_p, raw_t, "Invalid reading - performing soft reset on BMP280");
            bus.borrow_mut()
                .write_register(self.address, &REG_RESET.into(), &[RESET_VALUE])?;
            std::thread::sleep(RESET_WAIT);
            self.configure(&bus)?;
            (raw_p, raw_t) = self.read_codes(&bus)?;
        }

        let (temperature, t_fine) = self.calibration.compensate_temperature(raw_t);
        let pressure = self.calibration.compensate_pressure(raw_p, t_fine);
        debug!(raw_p, raw_t, temperature, pressure, "BMP280 sample");

        let mut board = Blackboard::new();
        board.insert(self.pressure_variable.as_str(), pressure);
        board.insert(self.temperature_variable.as_str(), temperature);
        Ok(board)
    }

    fn is_initialised(&self) -> bool {
        self.bus.is_some()
    }
}
